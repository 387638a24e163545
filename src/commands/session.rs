use std::sync::Arc;
use std::time::Duration;

use tauri::{command, AppHandle, Emitter, Runtime};

use super::{KioskRuntime, CONFIG, RUNTIME};
use crate::audio::{AudioFeedback, CpalFeedback, SilentFeedback};
use crate::capture::{CaptureLoop, NokhwaSource};
use crate::decoder::QrDecoder;
use crate::directory::HttpOrderDirectory;
use crate::engine::RedeemOutcome;
use crate::printer::{PrinterAdapter, TcpTransport};
use crate::session::KioskSession;
use crate::types::{CameraFormat, KioskState};

/// Start the kiosk session and stream state changes to the frontend
///
/// Builds the full stack from the effective configuration: camera capture
/// loop, QR decoder, order directory client, printer adapter, and audio
/// feedback. State transitions are emitted as `mealkiosk://state`.
#[command]
pub async fn start_kiosk<R: Runtime>(app: AppHandle<R>) -> Result<String, String> {
    log::info!("Starting kiosk session");

    {
        let runtime = RUNTIME.read().await;
        if runtime.is_some() {
            return Err("Kiosk session already running".to_string());
        }
    }

    let config = CONFIG.read().await.clone();
    config.validate()?;

    let format = CameraFormat::new(config.camera.resolution[0], config.camera.resolution[1], 30.0);
    let device_id = config.camera.device_id.clone();
    let source = tokio::task::spawn_blocking(move || NokhwaSource::new(&device_id, &format))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
        .map_err(|e| format!("Failed to open camera: {}", e))?;

    let capture = CaptureLoop::new(
        Box::new(source),
        Arc::new(QrDecoder::new()),
        Duration::from_millis(config.camera.frame_interval_ms),
        config.camera.max_frame_failures,
    );

    let directory = Arc::new(
        HttpOrderDirectory::new(&config.directory)
            .map_err(|e| format!("Failed to build directory client: {}", e))?,
    );

    let transport = TcpTransport::new(
        &config.printer.addr,
        Duration::from_millis(config.printer.timeout_ms),
    )
    .map_err(|e| format!("Invalid printer configuration: {}", e))?;
    let printer = Arc::new(PrinterAdapter::new(Arc::new(transport), config.printer.width));

    // Pairing is best-effort; a dark printer only disables receipts.
    printer.connect().await;

    let audio: Arc<dyn AudioFeedback> = if config.session.audio_enabled {
        Arc::new(CpalFeedback::new())
    } else {
        Arc::new(SilentFeedback)
    };

    let session = Arc::new(KioskSession::new(
        directory,
        capture,
        printer.clone(),
        audio,
        &config,
    ));

    session
        .start()
        .map_err(|e| format!("Failed to start session: {}", e))?;

    // Forward state transitions to the frontend until the channel closes.
    let mut state_rx = session.subscribe();
    let forwarder_app = app.clone();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            if let Err(e) = forwarder_app.emit("mealkiosk://state", &state) {
                log::warn!("Failed to emit kiosk state: {}", e);
            }
        }
        log::debug!("State forwarder finished");
    });

    let mut runtime = RUNTIME.write().await;
    if runtime.is_some() {
        // Lost the race to a concurrent start; tear our copy down.
        session.shutdown().await;
        return Err("Kiosk session already running".to_string());
    }
    *runtime = Some(Arc::new(KioskRuntime { session, printer }));

    Ok("Kiosk session started".to_string())
}

/// Stop the kiosk session and release the camera
#[command]
pub async fn stop_kiosk() -> Result<String, String> {
    log::info!("Stopping kiosk session");

    let runtime = {
        let mut slot = RUNTIME.write().await;
        slot.take()
    };

    match runtime {
        Some(runtime) => {
            runtime.session.shutdown().await;
            Ok("Kiosk session stopped".to_string())
        }
        None => Ok("No kiosk session was running".to_string()),
    }
}

/// Operator "scan next": skip the dwell or retry an error state
#[command]
pub async fn scan_next() -> Result<(), String> {
    let runtime = super::active_runtime().await?;
    runtime.session.scan_next();
    Ok(())
}

/// Current session state, for frontends that poll instead of listening
#[command]
pub async fn get_kiosk_state() -> Result<KioskState, String> {
    match RUNTIME.read().await.as_ref() {
        Some(runtime) => Ok(runtime.session.current_state()),
        None => Ok(KioskState::Idle),
    }
}

/// Staff fallback: redeem a token typed or pasted by hand
///
/// Runs the same engine as the camera path, so dedup and at-most-once
/// semantics are identical.
#[command]
pub async fn redeem_manual(token: String) -> Result<RedeemOutcome, String> {
    log::info!("Manual redemption requested");
    let runtime = super::active_runtime().await?;

    match runtime.session.redeem_manual(&token).await {
        Some(outcome) => Ok(outcome),
        None => Err("Another scan is being resolved".to_string()),
    }
}
