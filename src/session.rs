//! Kiosk session controller
//!
//! Glues capture, redemption, audio, and printing into one operator-facing
//! loop: start capture, wait for a detection, resolve it, show the result,
//! re-arm. No keyboard input is needed between orders; error states that
//! may need a human hold until the operator taps "scan next".
//!
//! Per scan cycle the state machine is
//! `Idle -> Scanning -> {Verified | AlreadyUsed | NotFound | TransientError}
//! -> (dwell) -> Scanning`, with `CameraFault` reachable from any failed
//! re-arm. Every re-arm is stop-then-start, never start-on-top-of-start.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;

use crate::audio::{AudioFeedback, ToneKind};
use crate::capture::{CaptureEvent, CaptureLoop};
use crate::config::KioskConfig;
use crate::directory::OrderDirectory;
use crate::engine::{RedeemOutcome, RedemptionEngine};
use crate::errors::KioskError;
use crate::printer::PrinterAdapter;
use crate::types::{KioskState, ReceiptJob};

enum Pause {
    Resume,
    Shutdown,
}

struct SessionInner {
    engine: RedemptionEngine,
    capture: CaptureLoop,
    printer: Arc<PrinterAdapter>,
    audio: Arc<dyn AudioFeedback>,
    dwell: Duration,
    receipt_header: String,
    receipt_footer: String,
    state_tx: watch::Sender<KioskState>,
    advance: Notify,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionInner {
    fn set_state(&self, state: KioskState) {
        log::debug!("Session state -> {:?}", state);
        let _ = self.state_tx.send_replace(state);
    }

    /// Hold the current result screen for the dwell period, or until the
    /// operator advances, whichever comes first.
    async fn dwell_or_advance(&self, shutdown: &mut watch::Receiver<bool>) -> Pause {
        tokio::select! {
            _ = tokio::time::sleep(self.dwell) => Pause::Resume,
            _ = self.advance.notified() => {
                log::info!("Dwell short-circuited by operator");
                Pause::Resume
            }
            _ = shutdown.changed() => Pause::Shutdown,
        }
    }

    /// Hold a persistent error screen until the operator retries.
    async fn wait_for_operator(&self, shutdown: &mut watch::Receiver<bool>) -> Pause {
        tokio::select! {
            _ = self.advance.notified() => Pause::Resume,
            _ = shutdown.changed() => Pause::Shutdown,
        }
    }
}

/// One kiosk operating session, alive from view mount to unmount.
pub struct KioskSession {
    inner: Arc<SessionInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl KioskSession {
    pub fn new(
        directory: Arc<dyn OrderDirectory>,
        capture: CaptureLoop,
        printer: Arc<PrinterAdapter>,
        audio: Arc<dyn AudioFeedback>,
        config: &KioskConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(KioskState::Idle);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(SessionInner {
                engine: RedemptionEngine::new(directory, config.session.token_prefix.clone()),
                capture,
                printer,
                audio,
                dwell: Duration::from_millis(config.session.dwell_ms),
                receipt_header: config.printer.header.clone(),
                receipt_footer: config.printer.footer.clone(),
                state_tx,
                advance: Notify::new(),
                shutdown_tx,
            }),
            task: Mutex::new(None),
        }
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<KioskState> {
        self.inner.state_tx.subscribe()
    }

    /// Snapshot of the current state.
    pub fn current_state(&self) -> KioskState {
        self.inner.state_tx.borrow().clone()
    }

    /// Mirrors of the printer adapter flags.
    pub fn printer_connected(&self) -> bool {
        self.inner.printer.is_connected()
    }

    pub fn printer_busy(&self) -> bool {
        self.inner.printer.is_busy()
    }

    /// Direct engine access for the manual-entry fallback.
    pub async fn redeem_manual(&self, raw_token: &str) -> Option<RedeemOutcome> {
        self.inner.engine.redeem(raw_token).await
    }

    /// Spawn the operating loop. Errors if it is already running.
    pub fn start(&self) -> Result<(), KioskError> {
        let mut slot = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if slot.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(KioskError::SessionError(
                "session already running".to_string(),
            ));
        }

        let _ = self.inner.shutdown_tx.send_replace(false);
        let inner = self.inner.clone();
        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        *slot = Some(tokio::spawn(run(inner, shutdown_rx)));
        log::info!("Kiosk session started");
        Ok(())
    }

    /// Operator "scan next": short-circuits a dwell or retries a
    /// persistent error state.
    pub fn scan_next(&self) {
        self.inner.advance.notify_one();
    }

    /// Tear the session down: stops the loop, releases the camera, clears
    /// pending timers, and returns the state to idle. An in-flight print
    /// job may still complete device-side but no longer touches state.
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send_replace(true);
        self.inner.advance.notify_one();

        let handle = self
            .task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(Duration::from_secs(2), &mut handle)
                .await
                .is_err()
            {
                log::warn!("Session loop did not wind down, aborting");
                handle.abort();
            }
        }

        self.inner.capture.stop();
        self.inner.set_state(KioskState::Idle);
        log::info!("Kiosk session shut down");
    }
}

impl Drop for KioskSession {
    fn drop(&mut self) {
        // Backstop for callers that drop without shutting down: kill the
        // loop task and make sure the camera is released.
        if let Some(handle) = self
            .task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            handle.abort();
        }
        self.inner.capture.stop();
    }
}

async fn run(inner: Arc<SessionInner>, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        // Re-arm: always stop-then-start.
        inner.capture.stop();
        let (tx, rx) = oneshot::channel();
        if let Err(e) = inner.capture.start(tx) {
            log::error!("Camera re-arm failed: {}", e);
            inner.set_state(KioskState::CameraFault {
                message: e.to_string(),
            });
            match inner.wait_for_operator(&mut shutdown).await {
                Pause::Resume => continue,
                Pause::Shutdown => break,
            }
        }
        inner.set_state(KioskState::Scanning);

        let event = tokio::select! {
            event = rx => event,
            _ = shutdown.changed() => break,
        };

        let event = match event {
            Ok(event) => event,
            // Sender dropped without an event: the loop was stopped out
            // from under us (e.g. a concurrent shutdown); just re-arm.
            Err(_) => continue,
        };

        match event {
            CaptureEvent::CameraLost(message) => {
                inner.set_state(KioskState::CameraFault { message });
                match inner.wait_for_operator(&mut shutdown).await {
                    Pause::Resume => continue,
                    Pause::Shutdown => break,
                }
            }
            CaptureEvent::Detected(token) => {
                let outcome = match inner.engine.redeem(&token).await {
                    Some(outcome) => outcome,
                    // Overlapping resolution: ignored by design.
                    None => continue,
                };

                let pause = handle_outcome(&inner, &token, outcome, &mut shutdown).await;
                match pause {
                    Pause::Resume => continue,
                    Pause::Shutdown => break,
                }
            }
        }
    }

    inner.capture.stop();
    inner.set_state(KioskState::Idle);
}

async fn handle_outcome(
    inner: &SessionInner,
    token: &str,
    outcome: RedeemOutcome,
    shutdown: &mut watch::Receiver<bool>,
) -> Pause {
    match outcome {
        RedeemOutcome::Verified(order) => {
            inner.audio.play(ToneKind::Success);

            if inner.printer.is_connected() {
                inner.set_state(KioskState::Verified {
                    order: order.clone(),
                    printing: true,
                    print_failed: false,
                });
                let job = ReceiptJob::for_order(&order, &inner.receipt_header, &inner.receipt_footer);
                let printed = inner.printer.print(&job).await;
                inner.set_state(KioskState::Verified {
                    order,
                    printing: false,
                    print_failed: !printed,
                });
            } else {
                // No printer: the operator gets the manual-print
                // affordance, redemption is unaffected.
                inner.set_state(KioskState::Verified {
                    order,
                    printing: false,
                    print_failed: true,
                });
            }
            inner.dwell_or_advance(shutdown).await
        }
        RedeemOutcome::AlreadyUsed(order) => {
            inner.audio.play(ToneKind::Error);
            inner.set_state(KioskState::AlreadyUsed { order });
            inner.dwell_or_advance(shutdown).await
        }
        RedeemOutcome::NotFound => {
            inner.audio.play(ToneKind::Error);
            inner.set_state(KioskState::NotFound {
                token: token.to_string(),
            });
            inner.dwell_or_advance(shutdown).await
        }
        RedeemOutcome::Transient(message) => {
            // May need human intervention; no auto-dismiss.
            inner.set_state(KioskState::TransientError { message });
            inner.wait_for_operator(shutdown).await
        }
    }
}
