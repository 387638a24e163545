pub mod config;
pub mod init;
pub mod printer;
pub mod session;

pub use config::*;
pub use init::*;
pub use printer::*;
pub use session::*;

use crate::config::KioskConfig;
use crate::printer::PrinterAdapter;
use crate::session::KioskSession;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Everything one running kiosk needs, built by `start_kiosk`.
pub struct KioskRuntime {
    pub session: Arc<KioskSession>,
    pub printer: Arc<PrinterAdapter>,
}

lazy_static::lazy_static! {
    /// The active kiosk runtime, if a session is running.
    pub(crate) static ref RUNTIME: Arc<RwLock<Option<Arc<KioskRuntime>>>> =
        Arc::new(RwLock::new(None));

    /// Effective configuration, loaded once and editable at runtime.
    pub(crate) static ref CONFIG: Arc<RwLock<KioskConfig>> =
        Arc::new(RwLock::new(KioskConfig::load_or_default()));
}

pub(crate) async fn active_runtime() -> Result<Arc<KioskRuntime>, String> {
    RUNTIME
        .read()
        .await
        .clone()
        .ok_or_else(|| "No kiosk session running".to_string())
}
