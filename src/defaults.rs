//! Default configuration constants for voxrelay.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default input audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Default output (synthesized) audio sample rate in Hz.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Default speech-probability threshold for the silence gate.
///
/// An analysis window whose speech probability reaches this value keeps the
/// gate open. Lower = stricter (more confidence needed to count as speech).
pub const VAD_THRESHOLD: f32 = 0.3;

/// Default trailing silence duration in milliseconds before a buffer flush.
pub const SILENCE_DURATION_MS: u32 = 1000;

/// Number of equal analysis windows the trailing silence span is split into.
pub const SILENCE_ANALYSIS_WINDOWS: u32 = 4;

/// Minimum buffered speech in milliseconds before transcription or a
/// silence flush is attempted. Shorter bursts are treated as noise and
/// cleared without invoking any engine.
pub const MIN_SPEECH_MS: u32 = 1000;

/// Maximum buffered audio in milliseconds before a forced flush.
///
/// Recognition cost grows with buffer length; past this point the buffer is
/// flushed even without detected silence.
pub const MAX_BUFFER_MS: u32 = 15_000;

/// Interval of newly arrived audio (milliseconds) between interim
/// recognition passes in pipeline mode.
pub const ASR_INTERVAL_MS: u32 = 1000;

/// Minimum newly stable words before a span is released as a draft.
pub const STABLE_MIN_WORDS: usize = 5;

/// Completed drafts that trigger an automatic refine pass.
pub const DRAFTS_PER_REFINE: u32 = 3;

/// Maximum retained (source, translation) turns of refine context.
pub const MAX_CONTEXT_TURNS: usize = 3;

/// Seconds without an inbound message before pending drafts are refined.
pub const IDLE_REFINE_SECS: u64 = 3;

/// Seconds after which interim external text is released even below the
/// word-count threshold, provided at least two words accumulated.
pub const TEXT_RELEASE_TIMEOUT_SECS: u64 = 2;

/// Minimum word count for the timeout-based external text release.
pub const TEXT_RELEASE_TIMEOUT_MIN_WORDS: usize = 2;

/// Full-duplex frame rate in frames per second.
pub const DUPLEX_FRAME_RATE: f32 = 12.5;

/// Full-duplex audio sample rate in Hz.
pub const DUPLEX_SAMPLE_RATE: u32 = 24000;

/// Default translation target language.
pub const DEFAULT_TARGET_LANGUAGE: &str = "French";

/// Default recognition source language.
pub const DEFAULT_SOURCE_LANGUAGE: &str = "English";

/// Default server bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;
