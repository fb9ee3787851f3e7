//! Per-session sample accumulator.
//!
//! Chunks are concatenated in arrival order, never reordered. The buffer
//! enforces a duration policy: below the minimum no transcription or
//! silence flush is attempted, above the maximum a flush is forced even
//! without detected silence.

use crate::defaults;

/// Configuration for the sample buffer duration policy.
#[derive(Debug, Clone, Copy)]
pub struct SampleBufferConfig {
    /// Sample rate for duration calculations.
    pub sample_rate: u32,
    /// Minimum buffered duration (ms) before processing is attempted.
    pub min_speech_ms: u32,
    /// Maximum buffered duration (ms) before a forced flush.
    pub max_buffer_ms: u32,
}

impl Default for SampleBufferConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::INPUT_SAMPLE_RATE,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            max_buffer_ms: defaults::MAX_BUFFER_MS,
        }
    }
}

/// Accumulates normalized float samples for one session.
#[derive(Debug)]
pub struct SampleBuffer {
    config: SampleBufferConfig,
    samples: Vec<f32>,
}

impl SampleBuffer {
    /// Creates an empty buffer with default policy.
    pub fn new() -> Self {
        Self::with_config(SampleBufferConfig::default())
    }

    /// Creates an empty buffer with custom policy.
    pub fn with_config(config: SampleBufferConfig) -> Self {
        Self {
            config,
            samples: Vec::new(),
        }
    }

    /// Appends a decoded chunk, preserving arrival order.
    pub fn append(&mut self, chunk: &[f32]) {
        self.samples.extend_from_slice(chunk);
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples are buffered.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Buffered duration in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        (self.samples.len() as u64 * 1000 / self.config.sample_rate as u64) as u32
    }

    /// Sample rate the duration policy is computed against.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Read-only view of the buffered samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// True once enough audio accumulated for transcription or a silence
    /// flush to be worth attempting.
    pub fn has_min_speech(&self) -> bool {
        self.duration_ms() >= self.config.min_speech_ms
    }

    /// True when the buffer exceeded its cap and must be flushed now.
    pub fn over_capacity(&self) -> bool {
        self.duration_ms() > self.config.max_buffer_ms
    }

    /// Removes and returns the first `n` samples (or fewer when the buffer
    /// is shorter).
    pub fn take(&mut self, n: usize) -> Vec<f32> {
        let n = n.min(self.samples.len());
        self.samples.drain(..n).collect()
    }

    /// Removes and returns all buffered samples.
    pub fn drain(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }

    /// Discards all buffered samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}
