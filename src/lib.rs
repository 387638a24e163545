//! MealKiosk: order-redemption kiosk controller for Tauri applications
//!
//! This crate turns a scanned QR code into a single, irreversible
//! "collected" transition for a food order, while driving the camera
//! capture loop, audio feedback, receipt printing, and automatic session
//! recovery. No keyboard input is needed between scans.
//!
//! # Features
//! - Camera-driven scan loop with one detection per arm cycle
//! - At-most-once redemption against an external order directory
//! - ESC/POS receipt printing over TCP, always optional
//! - Synthesized success/error tones, no audio assets
//! - Automatic re-arm after each result, manual "scan next" override
//!
//! # Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! mealkiosk = "0.3"
//! tauri = { version = "2.0", features = ["protocol-asset"] }
//! ```
//!
//! Then in your Tauri app:
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(mealkiosk::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
pub mod audio;
pub mod capture;
pub mod commands;
pub mod config;
pub mod decoder;
pub mod directory;
pub mod engine;
pub mod errors;
pub mod printer;
pub mod receipt;
pub mod session;
pub mod types;

// Testing utilities - offline fakes for every hardware seam
pub mod testing;

// Re-exports for convenience
pub use capture::{CaptureEvent, CaptureLoop, FrameSource};
pub use directory::{MarkOutcome, OrderDirectory};
pub use engine::{RedeemOutcome, RedemptionEngine};
pub use errors::KioskError;
pub use session::KioskSession;
pub use types::{CameraFrame, KioskState, OrderItem, RedeemableOrder};

use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the MealKiosk plugin with all commands
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("mealkiosk")
        .invoke_handler(tauri::generate_handler![
            // Initialization commands
            commands::init::initialize_kiosk,
            commands::init::get_kiosk_info,
            commands::init::list_cameras,
            commands::init::check_camera,
            // Session commands
            commands::session::start_kiosk,
            commands::session::stop_kiosk,
            commands::session::scan_next,
            commands::session::get_kiosk_state,
            commands::session::redeem_manual,
            // Printer and audio commands
            commands::printer::connect_printer,
            commands::printer::printer_status,
            commands::printer::test_print,
            commands::printer::play_tone,
            // Configuration commands
            commands::config::get_config,
            commands::config::update_config,
            commands::config::reset_config,
        ])
        .build()
}

/// Initialize logging for the kiosk controller
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "mealkiosk=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "mealkiosk");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
