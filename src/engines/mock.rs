//! Mock engines for testing.
//!
//! These allow exercising the session pipeline without any model runtime,
//! mirroring the builder style of the real implementations' configs.

use crate::audio::pcm::encode_pcm16_base64;
use crate::error::{RelayError, Result};
use crate::translate::ContextTurn;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::{
    AudioCodec, DuplexEngines, DuplexStepper, EngineProvider, PipelineEngines, SpeechRecognizer,
    SpeechSynthesizer, StepOutput, SynthesizedSpeech, Translator, VoiceActivityDetector,
};
use std::sync::Arc;

/// Mock recognizer returning scripted transcripts.
pub struct MockRecognizer {
    transcripts: Mutex<VecDeque<String>>,
    fallback: String,
    should_fail: bool,
    calls: Mutex<u32>,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self {
            transcripts: Mutex::new(VecDeque::new()),
            fallback: "mock transcript".to_string(),
            should_fail: false,
            calls: Mutex::new(0),
        }
    }

    /// Number of transcription calls made so far.
    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }

    /// Sets the transcript returned once the script is exhausted.
    pub fn with_transcript(mut self, text: &str) -> Self {
        self.fallback = text.to_string();
        self
    }

    /// Queues transcripts returned in order, one per call.
    pub fn with_transcripts(self, texts: &[&str]) -> Self {
        {
            let mut queue = self.transcripts.lock().unwrap();
            queue.extend(texts.iter().map(|t| t.to_string()));
        }
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn transcribe(
        &self,
        _samples: &[f32],
        _sample_rate: u32,
        _language: &str,
    ) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        if self.should_fail {
            return Err(RelayError::Inference {
                message: "mock recognition failure".to_string(),
            });
        }
        let next = self.transcripts.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Mock translator producing `[target] text`, streamed word by word.
pub struct MockTranslator {
    should_fail: bool,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    fn render(text: &str, target_language: &str) -> String {
        format!("[{}] {}", target_language, text.trim())
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        if self.should_fail {
            return Err(RelayError::Inference {
                message: "mock translation failure".to_string(),
            });
        }
        Ok(Self::render(text, target_language))
    }

    async fn translate_stream(
        &self,
        text: &str,
        target_language: &str,
        _context: Option<&[ContextTurn]>,
    ) -> Result<mpsc::Receiver<String>> {
        if self.should_fail {
            return Err(RelayError::Inference {
                message: "mock translation failure".to_string(),
            });
        }
        let rendered = Self::render(text, target_language);
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let words: Vec<String> = rendered.split_whitespace().map(str::to_string).collect();
            let last = words.len().saturating_sub(1);
            for (i, word) in words.into_iter().enumerate() {
                let fragment = if i == last { word } else { format!("{} ", word) };
                if tx.send(fragment).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

/// Mock synthesizer emitting a short silent clip.
pub struct MockSynthesizer {
    sample_rate: u32,
    should_fail: bool,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            sample_rate: 24000,
            should_fail: false,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str) -> Result<SynthesizedSpeech> {
        if self.should_fail {
            return Err(RelayError::Inference {
                message: "mock synthesis failure".to_string(),
            });
        }
        // One sample per character keeps the payload proportional to input
        let samples = vec![0.0f32; text.chars().count().max(1)];
        Ok(SynthesizedSpeech {
            data: encode_pcm16_base64(&samples),
            sample_rate: self.sample_rate,
        })
    }
}

/// Mock voice-activity detector.
///
/// Scripted probabilities are consumed one per call; without a script, a
/// window counts as speech (probability 1.0) when any sample magnitude
/// reaches 0.5.
pub struct MockVoiceActivity {
    probabilities: Mutex<VecDeque<f32>>,
    should_fail: bool,
    calls: Mutex<u32>,
}

impl MockVoiceActivity {
    pub fn new() -> Self {
        Self {
            probabilities: Mutex::new(VecDeque::new()),
            should_fail: false,
            calls: Mutex::new(0),
        }
    }

    /// Number of probability queries made so far.
    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }

    pub fn with_probabilities(self, probabilities: Vec<f32>) -> Self {
        {
            let mut queue = self.probabilities.lock().unwrap();
            queue.extend(probabilities);
        }
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Default for MockVoiceActivity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceActivityDetector for MockVoiceActivity {
    async fn speech_probability(&self, window: &[f32], _sample_rate: u32) -> Result<f32> {
        *self.calls.lock().unwrap() += 1;
        if self.should_fail {
            return Err(RelayError::Inference {
                message: "mock vad failure".to_string(),
            });
        }
        if let Some(probability) = self.probabilities.lock().unwrap().pop_front() {
            return Ok(probability);
        }
        let loud = window.iter().any(|s| s.abs() >= 0.5);
        Ok(if loud { 1.0 } else { 0.0 })
    }
}

/// Mock codec: int16 quantization packed into codes, invertible by `decode`.
pub struct MockCodec {
    resets: Mutex<u32>,
}

impl MockCodec {
    pub fn new() -> Self {
        Self {
            resets: Mutex::new(0),
        }
    }

    pub fn reset_count(&self) -> u32 {
        *self.resets.lock().unwrap()
    }
}

impl Default for MockCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioCodec for MockCodec {
    async fn encode(&self, frame: &[f32]) -> Result<Vec<u32>> {
        Ok(frame
            .iter()
            .map(|s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16 as u16 as u32)
            .collect())
    }

    async fn decode(&self, codes: &[u32]) -> Result<Vec<f32>> {
        Ok(codes
            .iter()
            .map(|&c| (c as u16 as i16) as f32 / 32768.0)
            .collect())
    }

    async fn reset(&self) -> Result<()> {
        *self.resets.lock().unwrap() += 1;
        Ok(())
    }
}

/// Mock stepper: echoes input codes, with optional scripted outputs.
pub struct MockStepper {
    scripted: Mutex<VecDeque<StepOutput>>,
    resets: Mutex<u32>,
    prompts: Mutex<Vec<String>>,
}

impl MockStepper {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            resets: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queues step outputs returned in order before falling back to echo.
    pub fn with_steps(self, steps: Vec<StepOutput>) -> Self {
        {
            let mut queue = self.scripted.lock().unwrap();
            queue.extend(steps);
        }
        self
    }

    pub fn reset_count(&self) -> u32 {
        *self.resets.lock().unwrap()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockStepper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DuplexStepper for MockStepper {
    async fn step(&self, input_codes: &[u32]) -> Result<StepOutput> {
        if let Some(output) = self.scripted.lock().unwrap().pop_front() {
            return Ok(output);
        }
        Ok(StepOutput {
            output_codes: Some(input_codes.to_vec()),
            text_token: None,
        })
    }

    async fn reset(&self) -> Result<()> {
        *self.resets.lock().unwrap() += 1;
        Ok(())
    }

    async fn update_prompt(&self, target_language: &str) -> Result<()> {
        self.prompts.lock().unwrap().push(target_language.to_string());
        Ok(())
    }
}

/// Provider assembling full mock engine sets.
///
/// Doubles as the binary's loopback runtime for exercising clients without
/// any model runtime linked in.
#[derive(Default)]
pub struct MockEngineProvider;

impl MockEngineProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EngineProvider for MockEngineProvider {
    async fn load_pipeline(&self) -> Result<PipelineEngines> {
        Ok(PipelineEngines {
            recognizer: Arc::new(MockRecognizer::new()),
            translator: Arc::new(MockTranslator::new()),
            synthesizer: Arc::new(MockSynthesizer::new()),
            vad: Arc::new(MockVoiceActivity::new()),
        })
    }

    async fn load_duplex(&self) -> Result<DuplexEngines> {
        Ok(DuplexEngines {
            codec: Arc::new(MockCodec::new()),
            stepper: Arc::new(MockStepper::new()),
        })
    }
}
