use mealkiosk::errors::KioskError;
use std::error::Error;

#[test]
fn test_camera_error_display() {
    let error = KioskError::CameraError("device busy".to_string());
    assert_eq!(error.to_string(), "Camera error: device busy");
}

#[test]
fn test_directory_error_display() {
    let error = KioskError::DirectoryError("timeout".to_string());
    assert!(error.to_string().contains("Order directory error"));
    assert!(error.to_string().contains("timeout"));
}

#[test]
fn test_error_debug_format() {
    let error = KioskError::PrinterError("out of paper".to_string());
    let debug_str = format!("{:?}", error);
    assert!(debug_str.contains("PrinterError"));
    assert!(debug_str.contains("out of paper"));
}

#[test]
fn test_error_implements_error_trait() {
    let error = KioskError::SessionError("already running".to_string());
    let _error_trait: &dyn Error = &error;
    assert!(error.source().is_none());
}

#[test]
fn test_all_error_variants() {
    let errors = vec![
        KioskError::CameraError("camera".to_string()),
        KioskError::DecodeError("decode".to_string()),
        KioskError::SessionError("session".to_string()),
        KioskError::DirectoryError("directory".to_string()),
        KioskError::PrinterError("printer".to_string()),
        KioskError::AudioError("audio".to_string()),
        KioskError::ConfigError("config".to_string()),
    ];

    for error in errors {
        let display_str = error.to_string();
        assert!(!display_str.is_empty());

        let debug_str = format!("{:?}", error);
        assert!(!debug_str.is_empty());
    }
}
