//! Fixed-rate full-duplex frame loop.
//!
//! The duplex engines operate at one-frame granularity (`sample_rate /
//! frame_rate` samples). Incoming audio accumulates until complete frames
//! are available; each frame is encoded, stepped, and any output decoded,
//! strictly in order. Partial residue stays buffered. There is no
//! draft/refine distinction — the stepper's output is already
//! token-incremental.

use crate::audio::buffer::{SampleBuffer, SampleBufferConfig};
use crate::config::DuplexConfig;
use crate::engines::DuplexEngines;
use crate::error::Result;

/// Output produced while stepping frames, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// Text token from the stepper.
    Text(String),
    /// Decoded output audio frame.
    Audio(Vec<f32>),
}

/// Drives the codec + stepper pair one frame at a time.
pub struct FrameLoop {
    frame_size: usize,
    buffer: SampleBuffer,
    engines: DuplexEngines,
}

impl FrameLoop {
    pub fn new(config: &DuplexConfig, engines: DuplexEngines) -> Self {
        let frame_size = config.frame_size();
        // The buffer's duration policy is unused here; frames are the only
        // slicing rule in duplex mode.
        let buffer = SampleBuffer::with_config(SampleBufferConfig {
            sample_rate: config.sample_rate,
            ..SampleBufferConfig::default()
        });
        Self {
            frame_size,
            buffer,
            engines,
        }
    }

    /// Samples per frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Samples currently held back as partial-frame residue.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Appends a chunk and steps every complete frame.
    ///
    /// A failing frame is logged and skipped; later frames still run so a
    /// single bad step cannot stall the stream.
    pub async fn push(&mut self, chunk: &[f32]) -> Vec<FrameEvent> {
        self.buffer.append(chunk);

        let mut events = Vec::new();
        while self.buffer.len() >= self.frame_size {
            let frame = self.buffer.take(self.frame_size);
            match self.step_frame(&frame).await {
                Ok(mut frame_events) => events.append(&mut frame_events),
                Err(error) => {
                    tracing::warn!(%error, "frame step failed, frame dropped");
                }
            }
        }
        events
    }

    async fn step_frame(&self, frame: &[f32]) -> Result<Vec<FrameEvent>> {
        let input_codes = self.engines.codec.encode(frame).await?;
        let step = self.engines.stepper.step(&input_codes).await?;

        let mut events = Vec::new();
        if let Some(token) = step.text_token
            && !token.is_empty()
        {
            events.push(FrameEvent::Text(token));
        }
        if let Some(codes) = step.output_codes {
            let samples = self.engines.codec.decode(&codes).await?;
            events.push(FrameEvent::Audio(samples));
        }
        Ok(events)
    }

    /// Re-issues the stepper prompt for a new target language, then fully
    /// resets stream state.
    pub async fn reconfigure(&mut self, target_language: &str) -> Result<()> {
        self.engines.stepper.update_prompt(target_language).await?;
        self.reset().await
    }

    /// Discards residue and all codec/stepper internal state.
    pub async fn reset(&mut self) -> Result<()> {
        self.buffer.clear();
        self.engines.codec.reset().await?;
        self.engines.stepper.reset().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::StepOutput;
    use crate::engines::mock::{MockCodec, MockStepper};
    use std::sync::Arc;

    fn small_config() -> DuplexConfig {
        DuplexConfig {
            sample_rate: 80,
            frame_rate: 10.0, // 8 samples per frame
        }
    }

    fn frame_loop_with(stepper: MockStepper) -> (FrameLoop, Arc<MockCodec>, Arc<MockStepper>) {
        let codec = Arc::new(MockCodec::new());
        let stepper = Arc::new(stepper);
        let engines = DuplexEngines {
            codec: codec.clone(),
            stepper: stepper.clone(),
        };
        (FrameLoop::new(&small_config(), engines), codec, stepper)
    }

    #[test]
    fn test_frame_size_from_config() {
        let (frame_loop, _, _) = frame_loop_with(MockStepper::new());
        assert_eq!(frame_loop.frame_size(), 8);

        let production = DuplexConfig::default();
        assert_eq!(production.frame_size(), 1920);
    }

    #[tokio::test]
    async fn test_partial_frame_held_back() {
        let (mut frame_loop, _, _) = frame_loop_with(MockStepper::new());

        let events = frame_loop.push(&[0.1; 5]).await;
        assert!(events.is_empty());
        assert_eq!(frame_loop.buffered(), 5);
    }

    #[tokio::test]
    async fn test_complete_frame_produces_audio() {
        let (mut frame_loop, _, _) = frame_loop_with(MockStepper::new());

        let input = [0.25f32; 8];
        let events = frame_loop.push(&input).await;
        assert_eq!(events.len(), 1);
        assert_eq!(frame_loop.buffered(), 0);

        match &events[0] {
            FrameEvent::Audio(samples) => {
                // Echo path: count preserved, lossy only by quantization
                assert_eq!(samples.len(), 8);
                for (a, b) in input.iter().zip(samples.iter()) {
                    assert!((a - b).abs() < 2.0 / 32768.0);
                }
            }
            other => panic!("expected audio event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_frames_single_chunk() {
        let (mut frame_loop, _, _) = frame_loop_with(MockStepper::new());

        // 2.5 frames in one push
        let events = frame_loop.push(&[0.1; 20]).await;
        assert_eq!(events.len(), 2);
        assert_eq!(frame_loop.buffered(), 4);

        // Residue completes with the next chunk
        let events = frame_loop.push(&[0.1; 4]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(frame_loop.buffered(), 0);
    }

    #[tokio::test]
    async fn test_text_token_emitted_before_audio() {
        let stepper = MockStepper::new().with_steps(vec![StepOutput {
            output_codes: Some(vec![0; 8]),
            text_token: Some("bonjour".to_string()),
        }]);
        let (mut frame_loop, _, _) = frame_loop_with(stepper);

        let events = frame_loop.push(&[0.0; 8]).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], FrameEvent::Text("bonjour".to_string()));
        assert!(matches!(events[1], FrameEvent::Audio(_)));
    }

    #[tokio::test]
    async fn test_empty_token_suppressed() {
        let stepper = MockStepper::new().with_steps(vec![StepOutput {
            output_codes: None,
            text_token: Some(String::new()),
        }]);
        let (mut frame_loop, _, _) = frame_loop_with(stepper);

        let events = frame_loop.push(&[0.0; 8]).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_silent_step_produces_nothing() {
        let stepper = MockStepper::new().with_steps(vec![StepOutput {
            output_codes: None,
            text_token: None,
        }]);
        let (mut frame_loop, _, _) = frame_loop_with(stepper);

        let events = frame_loop.push(&[0.0; 8]).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_reconfigure_reissues_prompt_and_resets() {
        let (mut frame_loop, codec, stepper) = frame_loop_with(MockStepper::new());

        frame_loop.push(&[0.1; 5]).await;
        assert_eq!(frame_loop.buffered(), 5);

        frame_loop.reconfigure("German").await.unwrap();
        assert_eq!(stepper.prompts(), vec!["German".to_string()]);
        assert_eq!(stepper.reset_count(), 1);
        assert_eq!(codec.reset_count(), 1);
        assert_eq!(frame_loop.buffered(), 0, "residue discarded on reset");
    }
}
