use std::sync::Arc;
use std::time::Duration;

use mealkiosk::capture::{CaptureEvent, CaptureLoop};
use mealkiosk::errors::KioskError;
use mealkiosk::testing::{ScriptedDecoder, ScriptedSource, StaticDecoder};
use mealkiosk::types::CameraFrame;
use tokio::sync::oneshot;

fn blank_frame() -> CameraFrame {
    CameraFrame::new(vec![0u8; 12], 2, 2, "scripted".to_string())
}

#[tokio::test]
async fn test_stream_released_after_detection() {
    let source = ScriptedSource::new(vec![Ok(blank_frame())]);
    let probe = source.stream_probe();
    let capture = CaptureLoop::new(
        Box::new(source),
        Arc::new(StaticDecoder::new(Some("TOKEN".to_string()))),
        Duration::from_millis(1),
        3,
    );

    let (tx, rx) = oneshot::channel();
    capture.start(tx).unwrap();

    // Detection arrives only after the loop tore the stream down.
    assert_eq!(
        rx.await.unwrap(),
        CaptureEvent::Detected("TOKEN".to_string())
    );
    assert!(!probe.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn test_repeated_stop_leaves_camera_released() {
    let source = ScriptedSource::new(vec![]);
    let probe = source.stream_probe();
    let capture = CaptureLoop::new(
        Box::new(source),
        Arc::new(StaticDecoder::new(None)),
        Duration::from_millis(1),
        3,
    );

    let (tx, _rx) = oneshot::channel();
    capture.start(tx).unwrap();
    assert!(capture.is_running());

    for _ in 0..3 {
        capture.stop();
        assert!(!capture.is_running());
        assert!(!probe.load(std::sync::atomic::Ordering::SeqCst));
    }
}

#[tokio::test]
async fn test_restart_after_detection() {
    // One decode per arm cycle; the loop must come back cleanly.
    let source = ScriptedSource::new(vec![]);
    let capture = CaptureLoop::new(
        Box::new(source),
        Arc::new(ScriptedDecoder::new(vec![
            Some("FIRST".to_string()),
            Some("SECOND".to_string()),
        ])),
        Duration::from_millis(1),
        3,
    );

    let (tx, rx) = oneshot::channel();
    capture.start(tx).unwrap();
    assert_eq!(
        rx.await.unwrap(),
        CaptureEvent::Detected("FIRST".to_string())
    );

    capture.stop();
    let (tx, rx) = oneshot::channel();
    capture.start(tx).unwrap();
    assert_eq!(
        rx.await.unwrap(),
        CaptureEvent::Detected("SECOND".to_string())
    );
}

#[tokio::test]
async fn test_decode_failures_keep_scanning() {
    // Frames that do not decode must not end the loop.
    let source = ScriptedSource::new(vec![Ok(blank_frame()), Ok(blank_frame())]);
    let capture = CaptureLoop::new(
        Box::new(source),
        Arc::new(ScriptedDecoder::new(vec![
            None,
            None,
            Some("LATE".to_string()),
        ])),
        Duration::from_millis(1),
        3,
    );

    let (tx, rx) = oneshot::channel();
    capture.start(tx).unwrap();
    assert_eq!(rx.await.unwrap(), CaptureEvent::Detected("LATE".to_string()));
}

#[tokio::test]
async fn test_intermittent_frame_errors_tolerated() {
    // A single bad frame resets nothing as long as the stream recovers.
    let source = ScriptedSource::new(vec![
        Err(KioskError::CameraError("hiccup".to_string())),
        Ok(blank_frame()),
    ]);
    let capture = CaptureLoop::new(
        Box::new(source),
        Arc::new(ScriptedDecoder::new(vec![Some("OK".to_string())])),
        Duration::from_millis(1),
        3,
    );

    let (tx, rx) = oneshot::channel();
    capture.start(tx).unwrap();
    assert_eq!(rx.await.unwrap(), CaptureEvent::Detected("OK".to_string()));
}

#[tokio::test]
async fn test_sustained_failures_report_camera_lost() {
    let source = ScriptedSource::new(
        (0..5)
            .map(|_| Err(KioskError::CameraError("unplugged".to_string())))
            .collect(),
    );
    let probe = source.stream_probe();
    let capture = CaptureLoop::new(
        Box::new(source),
        Arc::new(StaticDecoder::new(None)),
        Duration::from_millis(1),
        5,
    );

    let (tx, rx) = oneshot::channel();
    capture.start(tx).unwrap();

    assert!(matches!(rx.await.unwrap(), CaptureEvent::CameraLost(_)));
    assert!(!probe.load(std::sync::atomic::Ordering::SeqCst));
}
