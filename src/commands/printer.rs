use serde::{Deserialize, Serialize};
use tauri::command;

use crate::audio::{CpalFeedback, ToneKind};
use crate::types::{OrderItem, RedeemableOrder, ReceiptJob};

/// Observable printer flags for the operator UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterStatus {
    pub connected: bool,
    pub busy: bool,
}

/// Re-run the printer pairing handshake
#[command]
pub async fn connect_printer() -> Result<bool, String> {
    log::info!("Printer pairing requested");
    let runtime = super::active_runtime().await?;
    Ok(runtime.printer.connect().await)
}

/// Current printer flags
#[command]
pub async fn printer_status() -> Result<PrinterStatus, String> {
    let runtime = super::active_runtime().await?;
    Ok(PrinterStatus {
        connected: runtime.printer.is_connected(),
        busy: runtime.printer.is_busy(),
    })
}

/// Print a sample receipt to verify paper and pairing
#[command]
pub async fn test_print() -> Result<bool, String> {
    log::info!("Test print requested");
    let runtime = super::active_runtime().await?;
    let config = super::CONFIG.read().await.clone();

    let sample = RedeemableOrder {
        id: "test-print".to_string(),
        code: "TEST-0000".to_string(),
        items: vec![OrderItem {
            name: "Test item".to_string(),
            quantity: 1,
            unit_price: 0,
        }],
        total_amount: 0,
        collected: true,
        created_at: chrono::Utc::now(),
    };
    let job = ReceiptJob::for_order(&sample, &config.printer.header, &config.printer.footer);

    Ok(runtime.printer.print(&job).await)
}

/// Play a feedback tone, for speaker checks during kiosk setup
#[command]
pub async fn play_tone(tone: ToneKind) -> Result<(), String> {
    log::info!("Tone check requested: {:?}", tone);
    tokio::task::spawn_blocking(move || CpalFeedback::play_blocking(tone))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
        .map_err(|e| format!("Tone playback failed: {}", e))
}
