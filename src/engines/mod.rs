//! Engine contracts.
//!
//! The relay core never performs inference itself; recognition, translation,
//! synthesis, voice activity, and the full-duplex codec/stepper pair are
//! collaborators behind these traits. Implementations are expected to run
//! heavy work off the session loop (for example via `spawn_blocking`).

pub mod mock;
pub mod slots;

use crate::error::Result;
use crate::translate::ContextTurn;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use slots::{EngineProvider, EngineSetKind, EngineSlots, EvictionPolicy};

/// Speech-to-text over a finished sample buffer.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe normalized float samples to text in the given language.
    async fn transcribe(&self, samples: &[f32], sample_rate: u32, language: &str)
    -> Result<String>;
}

/// Text translation, one-shot and streaming.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate text to the target language in one call.
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;

    /// Translate text to the target language, yielding fragments in order.
    ///
    /// The returned stream is finite and non-restartable; `context` carries
    /// prior conversation turns when present.
    async fn translate_stream(
        &self,
        text: &str,
        target_language: &str,
        context: Option<&[ContextTurn]>,
    ) -> Result<mpsc::Receiver<String>>;
}

/// Synthesized speech ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedSpeech {
    /// Base64 PCM16LE mono audio.
    pub data: String,
    /// Sample rate of the synthesized audio.
    pub sample_rate: u32,
}

/// Text-to-speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<SynthesizedSpeech>;
}

/// Per-window speech probability.
///
/// The silence gate composes utterance-end detection on top of this.
#[async_trait]
pub trait VoiceActivityDetector: Send + Sync {
    async fn speech_probability(&self, window: &[f32], sample_rate: u32) -> Result<f32>;
}

/// Streaming audio codec for the full-duplex path.
#[async_trait]
pub trait AudioCodec: Send + Sync {
    /// Encode one fixed-size frame into codes.
    async fn encode(&self, frame: &[f32]) -> Result<Vec<u32>>;

    /// Decode codes back into one frame of samples.
    async fn decode(&self, codes: &[u32]) -> Result<Vec<f32>>;

    /// Discard all internal streaming state.
    async fn reset(&self) -> Result<()>;
}

/// One step of the full-duplex language-model stepper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    /// Codes to decode into output audio, when the stepper produced any.
    pub output_codes: Option<Vec<u32>>,
    /// Text token emitted this step, when non-empty.
    pub text_token: Option<String>,
}

/// Frame-synchronous language-model stepper for the full-duplex path.
#[async_trait]
pub trait DuplexStepper: Send + Sync {
    /// Consume one frame's input codes, produce optional output codes and an
    /// optional text token.
    async fn step(&self, input_codes: &[u32]) -> Result<StepOutput>;

    /// Discard all internal streaming state.
    async fn reset(&self) -> Result<()>;

    /// Re-issue the persona/translation prompt for a new target language.
    async fn update_prompt(&self, target_language: &str) -> Result<()>;
}

/// Engine set for the batch and incremental pipeline modes.
#[derive(Clone)]
pub struct PipelineEngines {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub vad: Arc<dyn VoiceActivityDetector>,
}

/// Engine set for the full-duplex mode.
#[derive(Clone)]
pub struct DuplexEngines {
    pub codec: Arc<dyn AudioCodec>,
    pub stepper: Arc<dyn DuplexStepper>,
}
