use serde::{Deserialize, Serialize};
use tauri::command;

use crate::capture;

/// Camera visible to the kiosk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraInfo {
    pub id: String,
    pub name: String,
}

/// Plugin handshake payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskInfo {
    pub name: String,
    pub version: String,
    pub cameras: Vec<CameraInfo>,
    pub camera_available: bool,
}

/// Initialize the kiosk plugin and report device availability
#[command]
pub async fn initialize_kiosk() -> Result<KioskInfo, String> {
    log::info!("Initializing kiosk plugin");
    let cameras = enumerate_cameras()?;
    let camera_available = !cameras.is_empty();

    if !camera_available {
        log::warn!("No cameras visible to the kiosk");
    }

    Ok(KioskInfo {
        name: crate::NAME.to_string(),
        version: crate::VERSION.to_string(),
        cameras,
        camera_available,
    })
}

/// Get crate name and version
#[command]
pub async fn get_kiosk_info() -> Result<crate::CrateInfo, String> {
    Ok(crate::get_info())
}

/// List cameras available for scanning
#[command]
pub async fn list_cameras() -> Result<Vec<CameraInfo>, String> {
    enumerate_cameras()
}

/// Check whether a specific camera can be opened
#[command]
pub async fn check_camera(device_id: String) -> Result<bool, String> {
    log::info!("Checking camera: {}", device_id);

    let format = crate::types::CameraFormat::standard();
    // Open and immediately drop; this both validates the id and probes
    // the capture permission on platforms that gate enumeration.
    match tokio::task::spawn_blocking(move || {
        capture::NokhwaSource::new(&device_id, &format).map(|_| true)
    })
    .await
    {
        Ok(Ok(ok)) => Ok(ok),
        Ok(Err(e)) => {
            log::warn!("Camera check failed: {}", e);
            Ok(false)
        }
        Err(e) => Err(format!("Task join error: {}", e)),
    }
}

fn enumerate_cameras() -> Result<Vec<CameraInfo>, String> {
    match capture::list_cameras() {
        Ok(cameras) => Ok(cameras
            .into_iter()
            .map(|(id, name)| CameraInfo { id, name })
            .collect()),
        Err(e) => {
            log::error!("Camera enumeration failed: {}", e);
            Err(format!("Failed to list cameras: {}", e))
        }
    }
}
