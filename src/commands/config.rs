use tauri::command;

use super::CONFIG;
use crate::config::KioskConfig;

/// Get the effective kiosk configuration
#[command]
pub async fn get_config() -> Result<KioskConfig, String> {
    Ok(CONFIG.read().await.clone())
}

/// Replace the kiosk configuration and persist it
///
/// Takes effect for the next `start_kiosk`; a running session keeps the
/// configuration it was built with.
#[command]
pub async fn update_config(config: KioskConfig) -> Result<(), String> {
    config.validate()?;

    config
        .save_to_file(KioskConfig::default_path())
        .map_err(|e| format!("Failed to save config: {}", e))?;

    let mut current = CONFIG.write().await;
    *current = config;
    log::info!("Configuration updated");
    Ok(())
}

/// Reset the configuration to defaults and persist it
#[command]
pub async fn reset_config() -> Result<KioskConfig, String> {
    let config = KioskConfig::default();

    config
        .save_to_file(KioskConfig::default_path())
        .map_err(|e| format!("Failed to save config: {}", e))?;

    let mut current = CONFIG.write().await;
    *current = config.clone();
    log::info!("Configuration reset to defaults");
    Ok(config)
}
