//! Offline test doubles
//!
//! Fakes for every hardware and network seam so the whole kiosk loop can
//! run in CI with no camera, speaker, printer, or backend attached.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::audio::{AudioFeedback, ToneKind};
use crate::capture::FrameSource;
use crate::decoder::FrameDecoder;
use crate::directory::{DirectoryError, MarkOutcome, OrderDirectory};
use crate::errors::KioskError;
use crate::printer::ReceiptTransport;
use crate::types::{CameraFrame, RedeemableOrder};

/// In-memory order directory with a real compare-and-swap on `collected`,
/// plus fault injection and call counters.
pub struct MemoryDirectory {
    orders: Mutex<Vec<RedeemableOrder>>,
    find_calls: AtomicUsize,
    mark_calls: AtomicUsize,
    fail_find: AtomicBool,
    fail_mark: AtomicBool,
    conflict_on_mark: AtomicBool,
    find_delay_ms: AtomicU64,
}

impl MemoryDirectory {
    pub fn new(orders: Vec<RedeemableOrder>) -> Self {
        Self {
            orders: Mutex::new(orders),
            find_calls: AtomicUsize::new(0),
            mark_calls: AtomicUsize::new(0),
            fail_find: AtomicBool::new(false),
            fail_mark: AtomicBool::new(false),
            conflict_on_mark: AtomicBool::new(false),
            find_delay_ms: AtomicU64::new(0),
        }
    }

    pub fn insert(&self, order: RedeemableOrder) {
        self.lock_orders().push(order);
    }

    pub fn get(&self, order_id: &str) -> Option<RedeemableOrder> {
        self.lock_orders()
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn mark_calls(&self) -> usize {
        self.mark_calls.load(Ordering::SeqCst)
    }

    /// Make `find_by_code` fail with a transport error.
    pub fn set_fail_find(&self, fail: bool) {
        self.fail_find.store(fail, Ordering::SeqCst);
    }

    /// Make `mark_collected` fail with a transport error.
    pub fn set_fail_mark(&self, fail: bool) {
        self.fail_mark.store(fail, Ordering::SeqCst);
    }

    /// Force the next marks to report a conflict without mutating,
    /// simulating another kiosk winning the race.
    pub fn set_conflict_on_mark(&self, conflict: bool) {
        self.conflict_on_mark.store(conflict, Ordering::SeqCst);
    }

    /// Delay every lookup, to hold a resolution in flight.
    pub fn set_find_delay(&self, delay_ms: u64) {
        self.find_delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    fn lock_orders(&self) -> std::sync::MutexGuard<'_, Vec<RedeemableOrder>> {
        self.orders.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl OrderDirectory for MemoryDirectory {
    async fn find_by_code(&self, code: &str) -> Result<Option<RedeemableOrder>, DirectoryError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.find_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(DirectoryError::Transport("injected lookup fault".to_string()));
        }
        Ok(self.lock_orders().iter().find(|o| o.code == code).cloned())
    }

    async fn mark_collected(&self, order_id: &str) -> Result<MarkOutcome, DirectoryError> {
        self.mark_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mark.load(Ordering::SeqCst) {
            return Err(DirectoryError::Transport("injected mark fault".to_string()));
        }
        if self.conflict_on_mark.load(Ordering::SeqCst) {
            return Ok(MarkOutcome::Conflict);
        }

        let mut orders = self.lock_orders();
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| DirectoryError::Protocol(format!("unknown order: {}", order_id)))?;

        if order.collected {
            Ok(MarkOutcome::Conflict)
        } else {
            order.collected = true;
            Ok(MarkOutcome::Updated)
        }
    }
}

/// Frame source that replays a script, then repeats blank frames.
pub struct ScriptedSource {
    frames: VecDeque<Result<CameraFrame, KioskError>>,
    stream_open: Arc<AtomicBool>,
    device_id: String,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Result<CameraFrame, KioskError>>) -> Self {
        Self {
            frames: frames.into(),
            stream_open: Arc::new(AtomicBool::new(false)),
            device_id: "scripted".to_string(),
        }
    }

    /// Shared flag that mirrors whether the stream is currently open.
    pub fn stream_probe(&self) -> Arc<AtomicBool> {
        self.stream_open.clone()
    }
}

impl FrameSource for ScriptedSource {
    fn start_stream(&mut self) -> Result<(), KioskError> {
        self.stream_open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<CameraFrame, KioskError> {
        match self.frames.pop_front() {
            Some(scripted) => scripted,
            None => Ok(CameraFrame::new(
                vec![0u8; 12],
                2,
                2,
                self.device_id.clone(),
            )),
        }
    }

    fn stop_stream(&mut self) -> Result<(), KioskError> {
        self.stream_open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }
}

/// Frame source whose stream never opens, for camera-fault paths.
pub struct BrokenSource;

impl FrameSource for BrokenSource {
    fn start_stream(&mut self) -> Result<(), KioskError> {
        Err(KioskError::CameraError("no camera present".to_string()))
    }

    fn capture_frame(&mut self) -> Result<CameraFrame, KioskError> {
        Err(KioskError::CameraError("no camera present".to_string()))
    }

    fn stop_stream(&mut self) -> Result<(), KioskError> {
        Ok(())
    }

    fn device_id(&self) -> &str {
        "broken"
    }
}

/// Decoder that reports the same token for every frame (or never decodes).
pub struct StaticDecoder {
    token: Option<String>,
}

impl StaticDecoder {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl FrameDecoder for StaticDecoder {
    fn decode(&self, _frame: &CameraFrame) -> Option<String> {
        self.token.clone()
    }
}

/// Decoder that pops one scripted answer per frame, then stays quiet.
pub struct ScriptedDecoder {
    answers: Mutex<VecDeque<Option<String>>>,
}

impl ScriptedDecoder {
    pub fn new(answers: Vec<Option<String>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
        }
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn decode(&self, _frame: &CameraFrame) -> Option<String> {
        self.answers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .flatten()
    }
}

/// Audio sink that records tones instead of playing them.
#[derive(Default)]
pub struct RecordingFeedback {
    played: Mutex<Vec<ToneKind>>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<ToneKind> {
        self.played.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn count(&self, tone: ToneKind) -> usize {
        self.played().iter().filter(|t| **t == tone).count()
    }
}

impl AudioFeedback for RecordingFeedback {
    fn play(&self, tone: ToneKind) {
        self.played
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(tone);
    }
}

/// Printer transport that captures jobs in memory.
pub struct MemoryTransport {
    online: AtomicBool,
    fail_send: AtomicBool,
    jobs: Mutex<Vec<Vec<u8>>>,
}

impl MemoryTransport {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            fail_send: AtomicBool::new(false),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn jobs(&self) -> Vec<Vec<u8>> {
        self.jobs.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl ReceiptTransport for MemoryTransport {
    async fn send(&self, data: &[u8]) -> Result<(), KioskError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(KioskError::PrinterError("injected send fault".to_string()));
        }
        self.jobs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(data.to_vec());
        Ok(())
    }

    async fn probe(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
