use std::fmt;

#[derive(Debug)]
pub enum KioskError {
    CameraError(String),
    DecodeError(String),
    SessionError(String),
    DirectoryError(String),
    PrinterError(String),
    AudioError(String),
    ConfigError(String),
}

impl fmt::Display for KioskError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KioskError::CameraError(msg) => write!(f, "Camera error: {}", msg),
            KioskError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
            KioskError::SessionError(msg) => write!(f, "Session error: {}", msg),
            KioskError::DirectoryError(msg) => write!(f, "Order directory error: {}", msg),
            KioskError::PrinterError(msg) => write!(f, "Printer error: {}", msg),
            KioskError::AudioError(msg) => write!(f, "Audio error: {}", msg),
            KioskError::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for KioskError {}
