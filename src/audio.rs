//! Audio feedback for scan outcomes
//!
//! Synthesizes the two kiosk tones (success / error) directly into a cpal
//! output stream. No audio assets are shipped; each pattern is a short table
//! of sine-wave steps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::errors::KioskError;

/// Which feedback tone to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneKind {
    Success,
    Error,
}

/// Sink for feedback tones.
///
/// The session controller only ever fires tones; it never waits on them.
/// Implementations must be non-blocking and must swallow device failures.
pub trait AudioFeedback: Send + Sync {
    fn play(&self, tone: ToneKind);
}

#[derive(Clone, Copy)]
struct ToneStep {
    freq_hz: f32, // 0.0 == silence
    duration_ms: u32,
}

const STEPS_SUCCESS: &[ToneStep] = &[
    ToneStep {
        freq_hz: 1318.5,
        duration_ms: 90,
    },
    ToneStep {
        freq_hz: 0.0,
        duration_ms: 30,
    },
    ToneStep {
        freq_hz: 1760.0,
        duration_ms: 140,
    },
];

const STEPS_ERROR: &[ToneStep] = &[
    ToneStep {
        freq_hz: 220.0,
        duration_ms: 160,
    },
    ToneStep {
        freq_hz: 0.0,
        duration_ms: 70,
    },
    ToneStep {
        freq_hz: 220.0,
        duration_ms: 160,
    },
];

const AMPLITUDE: f32 = 0.4;
/// Attack/release ramp per step, keeps the speaker from clicking.
const RAMP_MS: u32 = 5;

fn steps_for(tone: ToneKind) -> &'static [ToneStep] {
    match tone {
        ToneKind::Success => STEPS_SUCCESS,
        ToneKind::Error => STEPS_ERROR,
    }
}

fn pattern_duration_ms(steps: &[ToneStep]) -> u64 {
    steps.iter().map(|s| s.duration_ms as u64).sum()
}

/// Sample value at absolute position `pos` within the rendered pattern.
fn sample_at(steps: &[(u64, f32, u64)], sample_rate: f32, pos: u64) -> f32 {
    for (start, freq, len) in steps {
        let end = start + len;
        if pos >= *start && pos < end {
            if *freq == 0.0 {
                return 0.0;
            }
            let local = pos - start;
            let t = local as f32 / sample_rate;
            let value = (2.0 * std::f32::consts::PI * freq * t).sin() * AMPLITUDE;

            // Linear ramp at both step edges.
            let ramp_samples = (sample_rate * RAMP_MS as f32 / 1000.0).max(1.0);
            let fade_in = (local as f32 / ramp_samples).min(1.0);
            let fade_out = ((len - local) as f32 / ramp_samples).min(1.0);
            return value * fade_in * fade_out;
        }
    }
    0.0
}

/// Tone playback through the system default output device.
pub struct CpalFeedback;

impl CpalFeedback {
    pub fn new() -> Self {
        Self
    }

    /// Synthesize and play one tone pattern, blocking until it finishes.
    pub fn play_blocking(tone: ToneKind) -> Result<(), KioskError> {
        let steps = steps_for(tone);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| KioskError::AudioError("No default output device".to_string()))?;

        let config = device
            .default_output_config()
            .map_err(|e| KioskError::AudioError(format!("No supported output config: {}", e)))?;

        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(KioskError::AudioError(format!(
                "Unsupported sample format: {:?}",
                config.sample_format()
            )));
        }

        let stream_config = config.config();
        let sample_rate = stream_config.sample_rate.0 as f32;
        let channels = stream_config.channels as usize;

        // Precompute step boundaries in samples.
        let mut layout = Vec::with_capacity(steps.len());
        let mut cursor: u64 = 0;
        for step in steps {
            let len = (sample_rate as f64 * step.duration_ms as f64 / 1000.0) as u64;
            layout.push((cursor, step.freq_hz, len));
            cursor += len;
        }
        let total_samples = cursor;

        let position = std::sync::Arc::new(AtomicU64::new(0));
        let position_cb = position.clone();
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position_cb.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let value = if pos < total_samples {
                            sample_at(&layout, sample_rate, pos)
                        } else {
                            0.0
                        };
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                        pos += 1;
                    }
                    position_cb.store(pos, Ordering::Relaxed);
                    if pos >= total_samples {
                        let _ = done_tx.try_send(());
                    }
                },
                move |err| {
                    log::error!("Audio playback error: {}", err);
                },
                None,
            )
            .map_err(|e| KioskError::AudioError(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| KioskError::AudioError(format!("Failed to start stream: {}", e)))?;

        // Wait until the pattern is rendered, with slack for device latency.
        let deadline = Duration::from_millis(pattern_duration_ms(steps) + 500);
        let _ = done_rx.recv_timeout(deadline);

        // Short tail so the ring buffer drains before teardown.
        std::thread::sleep(Duration::from_millis(60));
        drop(stream);
        Ok(())
    }
}

impl Default for CpalFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFeedback for CpalFeedback {
    fn play(&self, tone: ToneKind) {
        // Fire-and-forget; a missing or busy device must never stall a scan.
        std::thread::Builder::new()
            .name("mealkiosk-tone".to_string())
            .spawn(move || {
                if let Err(e) = Self::play_blocking(tone) {
                    log::warn!("Tone playback failed: {}", e);
                }
            })
            .map(|_| ())
            .unwrap_or_else(|e| log::warn!("Failed to spawn tone thread: {}", e));
    }
}

/// Feedback sink that drops every tone, for muted kiosks.
pub struct SilentFeedback;

impl AudioFeedback for SilentFeedback {
    fn play(&self, _tone: ToneKind) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_are_short() {
        // Feedback must not outlast the dwell screen.
        assert!(pattern_duration_ms(STEPS_SUCCESS) < 500);
        assert!(pattern_duration_ms(STEPS_ERROR) < 500);
    }

    #[test]
    fn test_sample_at_is_silent_outside_pattern() {
        let layout = vec![(0u64, 440.0f32, 100u64)];
        assert_eq!(sample_at(&layout, 48000.0, 100), 0.0);
        assert_eq!(sample_at(&layout, 48000.0, 5000), 0.0);
    }

    #[test]
    fn test_sample_at_silence_step() {
        let layout = vec![(0u64, 0.0f32, 100u64)];
        for pos in 0..100 {
            assert_eq!(sample_at(&layout, 48000.0, pos), 0.0);
        }
    }

    #[test]
    fn test_sample_amplitude_bounded() {
        let layout = vec![(0u64, 1318.5f32, 4800u64)];
        for pos in 0..4800 {
            let v = sample_at(&layout, 48000.0, pos);
            assert!(v.abs() <= AMPLITUDE + f32::EPSILON);
        }
    }
}
