//! Audio capture with cpal.
//!
//! Opens the microphone for one utterance at a time and captures 16kHz
//! mono f32 audio suitable for Whisper. Capture ends when:
//! - no speech has started within the timeout (error),
//! - the phrase time limit is reached after speech started, or
//! - speech is followed by enough trailing silence.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ListenConfig;
use crate::error::RecognitionError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tracks one capture. Fed by the audio callback, polled by the capture loop.
#[derive(Debug)]
pub struct CaptureState {
    buffer: Vec<f32>,
    max_samples: usize,
    threshold: f32,
    silence_duration: f64,
    speech_start: Option<Instant>,
    silence_start: Option<Instant>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CaptureProgress {
    Waiting,
    Speaking,
    Done,
}

impl CaptureState {
    pub fn new(config: &ListenConfig) -> Self {
        let max_samples =
            (config.phrase_time_limit().as_secs_f64() * config.sample_rate as f64) as usize;
        Self {
            buffer: Vec::with_capacity(max_samples),
            max_samples,
            threshold: config.silence_threshold,
            silence_duration: config.silence_duration_secs,
            speech_start: None,
            silence_start: None,
        }
    }

    /// Feed one callback's worth of samples.
    pub fn push(&mut self, data: &[f32], now: Instant) {
        let loud = rms_energy(data) >= self.threshold;

        if self.speech_start.is_none() {
            if !loud {
                return;
            }
            debug!("Speech started");
            self.speech_start = Some(now);
        }

        let remaining = self.max_samples.saturating_sub(self.buffer.len());
        let to_copy = data.len().min(remaining);
        self.buffer.extend_from_slice(&data[..to_copy]);

        if loud {
            self.silence_start = None;
        } else {
            self.silence_start.get_or_insert(now);
        }
    }

    pub fn progress(&self, now: Instant, phrase_limit: Duration) -> CaptureProgress {
        let Some(speech_start) = self.speech_start else {
            return CaptureProgress::Waiting;
        };
        if self.buffer.len() >= self.max_samples || now.duration_since(speech_start) >= phrase_limit {
            return CaptureProgress::Done;
        }
        match self.silence_start {
            Some(start) if now.duration_since(start).as_secs_f64() >= self.silence_duration => {
                CaptureProgress::Done
            }
            _ => CaptureProgress::Speaking,
        }
    }

    pub fn take_samples(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.buffer)
    }
}

/// Opens the default input device for each utterance.
pub struct AudioRecorder {
    config: ListenConfig,
}

impl AudioRecorder {
    pub fn new(config: ListenConfig) -> Self {
        Self { config }
    }

    /// Capture one utterance. Blocking: run it on a blocking thread.
    pub fn capture(&self) -> Result<Vec<f32>, RecognitionError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| RecognitionError::Device("No input audio device available".into()))?;

        debug!(
            "Using audio device: {}",
            device.name().unwrap_or("unknown".into())
        );

        let stream_config = StreamConfig {
            channels: self.config.channels,
            sample_rate: SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.config.chunk_size),
        };

        let state = Arc::new(Mutex::new(CaptureState::new(&self.config)));
        let callback_state = Arc::clone(&state);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    callback_state
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(data, Instant::now());
                },
                move |err| {
                    warn!("Audio stream error: {err}");
                },
                None, // timeout
            )
            .map_err(|e| RecognitionError::Device(format!("Failed to build input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| RecognitionError::Device(format!("Failed to start audio stream: {e}")))?;

        let timeout = self.config.timeout();
        let phrase_limit = self.config.phrase_time_limit();
        let started = Instant::now();
        info!("Listening (timeout {:.1}s)", timeout.as_secs_f64());

        loop {
            std::thread::sleep(POLL_INTERVAL);
            let now = Instant::now();
            let progress = state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .progress(now, phrase_limit);

            match progress {
                CaptureProgress::Waiting if now.duration_since(started) >= timeout => {
                    return Err(RecognitionError::Timeout(timeout.as_secs_f64()));
                }
                CaptureProgress::Done => break,
                _ => {}
            }
        }
        drop(stream);

        let samples = state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_samples();
        let duration = samples.len() as f64 / self.config.sample_rate as f64;
        info!("Captured {:.1}s of audio ({} samples)", duration, samples.len());
        Ok(samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

/// Calculate RMS energy of audio samples.
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ListenConfig {
        ListenConfig {
            sample_rate: 100,
            phrase_time_limit_secs: 5.0,
            silence_threshold: 0.1,
            silence_duration_secs: 1.0,
            ..ListenConfig::default()
        }
    }

    const LOUD: [f32; 10] = [0.5; 10];
    const QUIET: [f32; 10] = [0.0; 10];

    #[test]
    fn silence_before_speech_is_discarded() {
        let mut state = CaptureState::new(&config());
        let t0 = Instant::now();
        state.push(&QUIET, t0);
        assert_eq!(state.progress(t0, Duration::from_secs(5)), CaptureProgress::Waiting);
        assert!(state.take_samples().is_empty());
    }

    #[test]
    fn trailing_silence_ends_capture() {
        let mut state = CaptureState::new(&config());
        let t0 = Instant::now();
        let limit = Duration::from_secs(5);

        state.push(&LOUD, t0);
        assert_eq!(state.progress(t0, limit), CaptureProgress::Speaking);

        let t1 = t0 + Duration::from_millis(500);
        state.push(&QUIET, t1);
        assert_eq!(state.progress(t1, limit), CaptureProgress::Speaking);
        assert_eq!(
            state.progress(t1 + Duration::from_secs(1), limit),
            CaptureProgress::Done
        );
        assert_eq!(state.take_samples().len(), 20);
    }

    #[test]
    fn phrase_limit_ends_capture() {
        let mut state = CaptureState::new(&config());
        let t0 = Instant::now();
        state.push(&LOUD, t0);
        assert_eq!(
            state.progress(t0 + Duration::from_secs(5), Duration::from_secs(5)),
            CaptureProgress::Done
        );
    }

    #[test]
    fn buffer_is_capped_at_phrase_limit() {
        let mut state = CaptureState::new(&config());
        let t0 = Instant::now();
        for _ in 0..60 {
            state.push(&LOUD, t0);
        }
        assert_eq!(state.progress(t0, Duration::from_secs(5)), CaptureProgress::Done);
        assert_eq!(state.take_samples().len(), 500);
    }

    #[test]
    fn negative_phrase_limit_captures_nothing() {
        let mut state = CaptureState::new(&ListenConfig {
            phrase_time_limit_secs: -1.0,
            ..config()
        });
        let t0 = Instant::now();
        state.push(&LOUD, t0);
        assert_eq!(state.progress(t0, Duration::ZERO), CaptureProgress::Done);
        assert!(state.take_samples().is_empty());
    }

    #[test]
    fn rms_of_empty_is_zero() {
        assert_eq!(rms_energy(&[]), 0.0);
    }
}
