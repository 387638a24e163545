//! Capture loop driver
//!
//! Owns the camera handle and the per-frame decode loop. The loop fires at
//! most one event per `start()`: on the first decoded code it tears the
//! stream down itself and only then reports the detection, so a second
//! detection can never race the resolution of the first. Re-arming the
//! camera is always an explicit act of the session controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use nokhwa::{
    pixel_format::RgbFormat,
    utils::{FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
    CallbackCamera,
};
use tokio::sync::oneshot;

use crate::decoder::FrameDecoder;
use crate::errors::KioskError;
use crate::types::{CameraFormat, CameraFrame};

/// The single event a capture loop run can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A code was decoded; the stream is already torn down.
    Detected(String),
    /// The stream failed repeatedly and was released.
    CameraLost(String),
}

/// Camera abstraction polled by the capture loop.
pub trait FrameSource: Send {
    fn start_stream(&mut self) -> Result<(), KioskError>;
    fn capture_frame(&mut self) -> Result<CameraFrame, KioskError>;
    fn stop_stream(&mut self) -> Result<(), KioskError>;
    fn device_id(&self) -> &str;
}

/// List cameras visible to the capture backend.
pub fn list_cameras() -> Result<Vec<(String, String)>, KioskError> {
    let cameras = nokhwa::query(nokhwa::utils::ApiBackend::Auto)
        .map_err(|e| KioskError::CameraError(format!("Failed to query cameras: {}", e)))?;

    Ok(cameras
        .into_iter()
        .map(|info| (info.index().to_string(), info.human_name()))
        .collect())
}

/// Hardware frame source over the nokhwa capture backend.
pub struct NokhwaSource {
    camera: CallbackCamera,
    device_id: String,
}

impl NokhwaSource {
    pub fn new(device_id: &str, format: &CameraFormat) -> Result<Self, KioskError> {
        let device_index = device_id
            .parse::<u32>()
            .map_err(|_| KioskError::CameraError(format!("Invalid device ID: {}", device_id)))?;

        // Bounded target resolution: the closest mode the device offers.
        let requested_format =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                nokhwa::utils::CameraFormat::new(
                    Resolution::new(format.width, format.height),
                    FrameFormat::MJPEG,
                    format.fps as u32,
                ),
            ));

        let camera = CallbackCamera::new(
            nokhwa::utils::CameraIndex::Index(device_index),
            requested_format,
            |_| {},
        )
        .map_err(|e| KioskError::CameraError(format!("Failed to open camera: {}", e)))?;

        Ok(Self {
            camera,
            device_id: device_id.to_string(),
        })
    }
}

impl FrameSource for NokhwaSource {
    fn start_stream(&mut self) -> Result<(), KioskError> {
        self.camera
            .open_stream()
            .map_err(|e| KioskError::CameraError(format!("Failed to start stream: {}", e)))
    }

    fn capture_frame(&mut self) -> Result<CameraFrame, KioskError> {
        let frame = self
            .camera
            .poll_frame()
            .map_err(|e| KioskError::CameraError(format!("Failed to capture frame: {}", e)))?;

        Ok(CameraFrame::new(
            frame.buffer_bytes().to_vec(),
            frame.resolution().width_x,
            frame.resolution().height_y,
            self.device_id.clone(),
        ))
    }

    fn stop_stream(&mut self) -> Result<(), KioskError> {
        self.camera
            .stop_stream()
            .map_err(|e| KioskError::CameraError(format!("Failed to stop stream: {}", e)))
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }
}

struct Inner {
    source: Mutex<Option<Box<dyn FrameSource>>>,
    decoder: Arc<dyn FrameDecoder>,
    frame_interval: Duration,
    max_frame_failures: u32,
    stop_flag: AtomicBool,
    running: AtomicBool,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

/// One camera-scan loop instance, restartable across scan cycles.
#[derive(Clone)]
pub struct CaptureLoop {
    inner: Arc<Inner>,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        decoder: Arc<dyn FrameDecoder>,
        frame_interval: Duration,
        max_frame_failures: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source: Mutex::new(Some(source)),
                decoder,
                frame_interval,
                max_frame_failures: max_frame_failures.max(1),
                stop_flag: AtomicBool::new(false),
                running: AtomicBool::new(false),
                thread: Mutex::new(None),
            }),
        }
    }

    /// True while the scan thread is alive.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Acquire the stream and start the scan thread.
    ///
    /// At most one `CaptureEvent` is delivered on `tx` per call. Stream
    /// acquisition failures are returned synchronously and leave the loop
    /// stopped, ready for a retry.
    pub fn start(&self, tx: oneshot::Sender<CaptureEvent>) -> Result<(), KioskError> {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Err(KioskError::SessionError(
                "capture loop already running".to_string(),
            ));
        }

        let mut source = match self.take_source() {
            Some(source) => source,
            None => {
                self.inner.running.store(false, Ordering::Release);
                return Err(KioskError::CameraError(
                    "camera handle not available".to_string(),
                ));
            }
        };

        if let Err(e) = source.start_stream() {
            self.return_source(source);
            self.inner.running.store(false, Ordering::Release);
            return Err(e);
        }

        self.inner.stop_flag.store(false, Ordering::Release);

        let inner = self.inner.clone();
        let handle = std::thread::Builder::new()
            .name("mealkiosk-capture".to_string())
            .spawn(move || scan_loop(inner, source, tx))
            .map_err(|e| KioskError::SessionError(format!("spawn failed: {}", e)))?;

        *self
            .inner
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);

        log::info!("Capture loop started");
        Ok(())
    }

    /// Stop the loop and release the camera.
    ///
    /// Idempotent: safe on an already-stopped or never-started loop. Never
    /// errors; a thread that refuses to exit in time is kept for a later
    /// retry and logged.
    pub fn stop(&self) {
        self.inner.stop_flag.store(true, Ordering::Release);

        let handle = self
            .inner
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(handle) = handle {
            let start = Instant::now();
            let mut handle = Some(handle);
            loop {
                if handle.as_ref().is_some_and(|h| h.is_finished()) {
                    let _ = handle.take().unwrap().join();
                    break;
                }
                if start.elapsed() >= Duration::from_secs(2) {
                    log::warn!("Capture thread did not exit in time");
                    *self
                        .inner
                        .thread
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner()) = handle.take();
                    return;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }

        log::debug!("Capture loop stopped");
    }

    fn take_source(&self) -> Option<Box<dyn FrameSource>> {
        self.inner
            .source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn return_source(&self, source: Box<dyn FrameSource>) {
        *self
            .inner
            .source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(source);
    }
}

fn scan_loop(inner: Arc<Inner>, mut source: Box<dyn FrameSource>, tx: oneshot::Sender<CaptureEvent>) {
    let mut consecutive_failures: u32 = 0;
    let mut outcome: Option<CaptureEvent> = None;

    loop {
        if inner.stop_flag.load(Ordering::Acquire) {
            break;
        }

        match source.capture_frame() {
            Ok(frame) => {
                consecutive_failures = 0;
                if let Some(token) = inner.decoder.decode(&frame) {
                    log::info!("Code detected, stopping capture loop");
                    outcome = Some(CaptureEvent::Detected(token));
                    break;
                }
            }
            Err(e) => {
                consecutive_failures += 1;
                log::debug!(
                    "Frame capture failed ({}/{}): {}",
                    consecutive_failures,
                    inner.max_frame_failures,
                    e
                );
                if consecutive_failures >= inner.max_frame_failures {
                    log::error!("Camera stream lost: {}", e);
                    outcome = Some(CaptureEvent::CameraLost(e.to_string()));
                    break;
                }
            }
        }

        std::thread::sleep(inner.frame_interval);
    }

    // Teardown happens before the event is delivered: by the time the
    // session controller hears about a detection, the camera is released
    // and a restart cannot stack on a live stream.
    if let Err(e) = source.stop_stream() {
        log::warn!("Stream teardown failed: {}", e);
    }
    *inner
        .source
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(source);
    inner.running.store(false, Ordering::Release);

    if let Some(event) = outcome {
        // The receiver may be gone if the session shut down mid-scan.
        let _ = tx.send(event);
    }
}
