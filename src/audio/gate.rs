//! Trailing-silence gate.
//!
//! Decides whether an utterance has ended by splitting the trailing span of
//! the buffer into equal analysis windows and asking the voice-activity
//! engine for a speech probability per window. A single window at or above
//! the threshold keeps the gate open; the utterance only counts as ended
//! when every trailing window is sub-threshold.

use crate::audio::buffer::SampleBuffer;
use crate::defaults;
use crate::engines::VoiceActivityDetector;
use crate::error::Result;
use std::sync::Arc;

/// Configuration for the silence gate.
#[derive(Debug, Clone, Copy)]
pub struct SilenceGateConfig {
    /// Speech-probability threshold per analysis window.
    pub threshold: f32,
    /// Trailing span (ms) that must be silent.
    pub silence_duration_ms: u32,
    /// Number of equal analysis windows over the trailing span.
    pub analysis_windows: u32,
}

impl Default for SilenceGateConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::VAD_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
            analysis_windows: defaults::SILENCE_ANALYSIS_WINDOWS,
        }
    }
}

/// Silence gate over a voice-activity engine.
pub struct SilenceGate {
    config: SilenceGateConfig,
    detector: Arc<dyn VoiceActivityDetector>,
}

impl SilenceGate {
    /// Creates a gate with default configuration.
    pub fn new(detector: Arc<dyn VoiceActivityDetector>) -> Self {
        Self::with_config(SilenceGateConfig::default(), detector)
    }

    /// Creates a gate with custom configuration.
    pub fn with_config(config: SilenceGateConfig, detector: Arc<dyn VoiceActivityDetector>) -> Self {
        Self { config, detector }
    }

    /// Returns true when the trailing span of the buffer is entirely silent.
    ///
    /// A buffer shorter than the trailing span cannot prove silence and is
    /// treated as still speaking.
    pub async fn trailing_silence(&self, buffer: &SampleBuffer) -> Result<bool> {
        let sample_rate = buffer.sample_rate();
        let span_samples =
            (sample_rate as u64 * self.config.silence_duration_ms as u64 / 1000) as usize;
        if span_samples == 0 || buffer.len() < span_samples {
            return Ok(false);
        }

        let samples = buffer.samples();
        let tail = &samples[samples.len() - span_samples..];
        let window_len = span_samples / self.config.analysis_windows.max(1) as usize;
        if window_len == 0 {
            return Ok(false);
        }

        for window in tail.chunks(window_len) {
            let probability = self
                .detector
                .speech_probability(window, sample_rate)
                .await?;
            if probability >= self.config.threshold {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
