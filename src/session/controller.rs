//! Per-session orchestration.
//!
//! The controller is the composition root for one connection: it owns the
//! sample buffer, the stability trackers, both worker queues, and the
//! duplex frame loop, and dispatches inbound messages to them. All
//! collaborator calls are awaited at explicit suspension points; job-level
//! failures surface as non-fatal `error` messages and never tear the
//! session down.

use crate::audio::buffer::{SampleBuffer, SampleBufferConfig};
use crate::audio::gate::{SilenceGate, SilenceGateConfig};
use crate::audio::pcm::decode_pcm16_base64;
use crate::config::{AudioConfig, Config, DuplexConfig, PipelineConfig};
use crate::duplex::{FrameEvent, FrameLoop};
use crate::engines::{EngineSetKind, EngineSlots, PipelineEngines};
use crate::error::{RelayError, Result};
use crate::session::protocol::{AsrMode, ClientMessage, ServerMessage, StatusKind};
use crate::session::{SessionMode, SessionPhase};
use crate::text::filler::is_filler;
use crate::text::position::TextPositionTracker;
use crate::text::stable::StablePrefixTracker;
use crate::translate::scheduler::{SchedulerHandle, TranslateWorker, TranslateWorkerConfig};
use crate::translate::synthesis::{SynthesisJob, SynthesisWorker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Grace period for workers to drain their shutdown sentinel.
const WORKER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Per-session configuration slice.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub audio: AudioConfig,
    pub pipeline: PipelineConfig,
    pub duplex: DuplexConfig,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            audio: config.audio.clone(),
            pipeline: config.pipeline.clone(),
            duplex: config.duplex.clone(),
        }
    }
}

/// State owned by the batch and incremental modes.
struct PipelineState {
    engines: PipelineEngines,
    buffer: SampleBuffer,
    gate: SilenceGate,
    stable: StablePrefixTracker,
    position: TextPositionTracker,
    scheduler: SchedulerHandle,
    synthesis_tx: mpsc::UnboundedSender<SynthesisJob>,
    translate_task: JoinHandle<()>,
    synthesis_task: JoinHandle<()>,
    /// Buffer length at the last interim recognition pass.
    samples_at_last_asr: usize,
    /// Last interim transcript sent, to suppress repeats.
    last_interim: String,
}

/// State owned by the full-duplex mode.
struct DuplexState {
    frame_loop: FrameLoop,
}

/// Why the buffer is being flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushReason {
    /// Trailing silence detected.
    Silence,
    /// Buffer exceeded its duration cap.
    Capacity,
}

/// Orchestrates one relay session.
pub struct SessionController {
    mode: SessionMode,
    phase: SessionPhase,
    settings: SessionSettings,
    slots: Arc<EngineSlots>,
    outbound: mpsc::UnboundedSender<ServerMessage>,

    target_language: String,
    source_language: String,
    asr_mode: AsrMode,

    pipeline: Option<PipelineState>,
    duplex: Option<DuplexState>,
}

impl SessionController {
    pub fn new(
        mode: SessionMode,
        settings: SessionSettings,
        slots: Arc<EngineSlots>,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        let target_language = settings.pipeline.target_language.clone();
        let source_language = settings.pipeline.source_language.clone();
        Self {
            mode,
            phase: SessionPhase::Connecting,
            settings,
            slots,
            outbound,
            target_language,
            source_language,
            asr_mode: AsrMode::Local,
            pipeline: None,
            duplex: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Acquires the mode's engines and brings the session to `Ready`.
    ///
    /// Emits `loading_model` first when the engines are not yet resident.
    /// A load failure is fatal to the session; the caller should close the
    /// channel after the emitted error message.
    pub async fn start(&mut self) -> Result<()> {
        let kind = match self.mode {
            SessionMode::FullDuplex => EngineSetKind::Duplex,
            _ => EngineSetKind::Pipeline,
        };
        if !self.slots.is_resident(kind).await {
            self.set_phase(SessionPhase::Loading);
            self.send(ServerMessage::Status {
                data: StatusKind::LoadingModel,
            });
        }

        let result = match self.mode {
            SessionMode::FullDuplex => self.start_duplex().await,
            _ => self.start_pipeline().await,
        };
        if let Err(error) = result {
            tracing::error!(%error, mode = self.mode.as_str(), "engine acquisition failed");
            self.send(ServerMessage::Error {
                message: format!("Model load failed: {}", error),
            });
            self.set_phase(SessionPhase::Closed);
            return Err(error);
        }

        self.set_phase(SessionPhase::Ready);
        self.send(ServerMessage::Status {
            data: StatusKind::Ready,
        });
        Ok(())
    }

    async fn start_pipeline(&mut self) -> Result<()> {
        let engines = self.slots.acquire_pipeline().await?;

        let buffer = SampleBuffer::with_config(SampleBufferConfig {
            sample_rate: self.settings.audio.input_sample_rate,
            min_speech_ms: self.settings.audio.min_speech_ms,
            max_buffer_ms: self.settings.audio.max_buffer_ms,
        });
        let gate = SilenceGate::with_config(
            SilenceGateConfig {
                threshold: self.settings.audio.vad_threshold,
                silence_duration_ms: self.settings.audio.silence_duration_ms,
                ..SilenceGateConfig::default()
            },
            engines.vad.clone(),
        );

        let (synthesis_tx, synthesis_rx) = mpsc::unbounded_channel();
        let synthesis_worker = SynthesisWorker::new(engines.synthesizer.clone(), self.outbound.clone());
        let synthesis_task = tokio::spawn(synthesis_worker.run(synthesis_rx));

        let worker_config = TranslateWorkerConfig {
            target_language: self.target_language.clone(),
            drafts_per_refine: self.settings.pipeline.drafts_per_refine,
            max_context_turns: self.settings.pipeline.max_context_turns,
        };
        let (translate_worker, scheduler, jobs_rx) = TranslateWorker::new(
            engines.translator.clone(),
            worker_config,
            self.outbound.clone(),
            synthesis_tx.clone(),
        );
        let translate_task = tokio::spawn(translate_worker.run(jobs_rx));

        self.pipeline = Some(PipelineState {
            engines,
            buffer,
            gate,
            stable: StablePrefixTracker::new(),
            position: TextPositionTracker::new(),
            scheduler,
            synthesis_tx,
            translate_task,
            synthesis_task,
            samples_at_last_asr: 0,
            last_interim: String::new(),
        });
        Ok(())
    }

    async fn start_duplex(&mut self) -> Result<()> {
        let engines = self.slots.acquire_duplex().await?;
        let mut frame_loop = FrameLoop::new(&self.settings.duplex, engines);
        // Fresh stream state for the new session
        frame_loop.reset().await?;
        self.duplex = Some(DuplexState { frame_loop });
        Ok(())
    }

    /// Parses and dispatches one raw inbound message.
    ///
    /// Returns false when the session should close. Malformed messages are
    /// logged and ignored.
    pub async fn handle_raw(&mut self, raw: &str) -> bool {
        match ClientMessage::from_json(raw) {
            Ok(message) => self.handle_message(message).await,
            Err(error) => {
                tracing::warn!(%error, "malformed inbound message ignored");
                true
            }
        }
    }

    /// Dispatches one inbound message. Returns false on `stop`.
    pub async fn handle_message(&mut self, message: ClientMessage) -> bool {
        if !self.phase.accepts_messages() {
            tracing::warn!(phase = self.phase.as_str(), "message dropped outside ready/active");
            return !matches!(message, ClientMessage::Stop);
        }

        match message {
            ClientMessage::Config {
                target_language,
                source_language,
                asr_mode,
            } => {
                self.apply_config(target_language, source_language, asr_mode)
                    .await;
                true
            }
            ClientMessage::Audio { data } => {
                self.set_phase(SessionPhase::Active);
                match decode_pcm16_base64(&data) {
                    Ok(chunk) => self.handle_audio(&chunk).await,
                    Err(error) => {
                        tracing::warn!(%error, "undecodable audio chunk ignored");
                    }
                }
                true
            }
            ClientMessage::Text { data, is_final } => {
                self.set_phase(SessionPhase::Active);
                self.handle_text(&data, is_final);
                true
            }
            ClientMessage::Stop => {
                tracing::info!(mode = self.mode.as_str(), "stop received");
                false
            }
        }
    }

    /// Idle-receive timeout hook: refine pending drafts so trailing speech
    /// makes progress even without a detected silence boundary.
    pub async fn on_idle(&mut self) {
        if self.mode != SessionMode::IncrementalPipeline {
            return;
        }
        if let Some(pipeline) = &self.pipeline
            && pipeline.scheduler.queue_refine_if_pending()
        {
            tracing::debug!("idle timeout, refining pending drafts");
        }
    }

    /// Pushes shutdown sentinels and waits for the workers to drain them.
    pub async fn shutdown(&mut self) {
        self.set_phase(SessionPhase::Closing);
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.scheduler.shutdown();
            let _ = pipeline.synthesis_tx.send(SynthesisJob::Shutdown);

            for (name, task) in [
                ("translate", pipeline.translate_task),
                ("synthesis", pipeline.synthesis_task),
            ] {
                let abort = task.abort_handle();
                if tokio::time::timeout(WORKER_SHUTDOWN_GRACE, task).await.is_err() {
                    tracing::warn!(worker = name, "worker did not drain shutdown sentinel, aborting");
                    abort.abort();
                }
            }
        }
        self.duplex = None;
        self.set_phase(SessionPhase::Closed);
    }

    async fn apply_config(
        &mut self,
        target_language: Option<String>,
        source_language: Option<String>,
        asr_mode: Option<AsrMode>,
    ) {
        let mut target_changed = false;
        if let Some(target) = target_language
            && target != self.target_language
        {
            // Without an explicit source, flipping the direction swaps the pair
            if source_language.is_none() && target == self.source_language {
                self.source_language =
                    std::mem::replace(&mut self.target_language, target);
            } else {
                self.target_language = target;
            }
            target_changed = true;
        }
        if let Some(source) = source_language {
            self.source_language = source;
        }
        if let Some(mode) = asr_mode {
            self.asr_mode = mode;
        }
        tracing::info!(
            source = %self.source_language,
            target = %self.target_language,
            "session configured"
        );

        match self.mode {
            SessionMode::IncrementalPipeline | SessionMode::BatchTranslate => {
                if target_changed
                    && let Some(pipeline) = &self.pipeline
                {
                    pipeline.scheduler.queue_reconfigure(&self.target_language);
                }
            }
            SessionMode::FullDuplex => {
                // Any config re-issues the prompt and discards stream state
                let target = self.target_language.clone();
                if let Some(duplex) = self.duplex.as_mut() {
                    let result = duplex.frame_loop.reconfigure(&target).await;
                    if let Err(error) = result {
                        self.report_transient(error);
                    }
                }
            }
        }
    }

    async fn handle_audio(&mut self, chunk: &[f32]) {
        match self.mode {
            SessionMode::BatchTranslate => self.handle_audio_batch(chunk).await,
            SessionMode::IncrementalPipeline => self.handle_audio_incremental(chunk).await,
            SessionMode::FullDuplex => self.handle_audio_duplex(chunk).await,
        }
    }

    /// Batch mode: buffer the whole utterance, then recognize, translate and
    /// synthesize it in one pass once trailing silence is confirmed.
    async fn handle_audio_batch(&mut self, chunk: &[f32]) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        pipeline.buffer.append(chunk);
        if !pipeline.buffer.has_min_speech() {
            return;
        }

        let silent = match pipeline.gate.trailing_silence(&pipeline.buffer).await {
            Ok(silent) => silent,
            Err(error) => {
                self.report_transient(error);
                return;
            }
        };
        let forced = pipeline.buffer.over_capacity();
        if !silent && !forced {
            return;
        }

        self.send(ServerMessage::Status {
            data: StatusKind::Processing,
        });
        if let Err(error) = self.run_batch_pass().await {
            self.report_transient(error);
        }
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.buffer.clear();
        }
        self.send(ServerMessage::Status {
            data: StatusKind::Ready,
        });
    }

    async fn run_batch_pass(&mut self) -> Result<()> {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return Ok(());
        };
        let samples = pipeline.buffer.samples();
        let sample_rate = pipeline.buffer.sample_rate();

        let text = pipeline
            .engines
            .recognizer
            .transcribe(samples, sample_rate, &self.source_language)
            .await?;
        let text = text.trim().to_string();
        if text.is_empty() || is_filler(&text) {
            return Ok(());
        }
        self.send(ServerMessage::SourceText { data: text.clone() });

        let translation = pipeline
            .engines
            .translator
            .translate(&text, &self.target_language)
            .await?;
        let translation = translation.trim().to_string();
        self.send(ServerMessage::TranslatedText {
            data: translation.clone(),
        });

        if !translation.is_empty() {
            let speech = pipeline
                .engines
                .synthesizer
                .synthesize(&translation, &self.target_language)
                .await?;
            self.send(ServerMessage::Audio {
                data: speech.data,
                sample_rate: speech.sample_rate,
            });
        }
        Ok(())
    }

    /// Incremental mode: interim recognition feeds the stable-prefix
    /// tracker; silence or the buffer cap flush the utterance.
    async fn handle_audio_incremental(&mut self, chunk: &[f32]) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        pipeline.buffer.append(chunk);

        if self.asr_mode == AsrMode::Local {
            self.maybe_run_interim_asr().await;
        }

        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        if pipeline.buffer.has_min_speech() {
            match pipeline.gate.trailing_silence(&pipeline.buffer).await {
                Ok(true) => {
                    self.flush_utterance(FlushReason::Silence).await;
                    self.send(ServerMessage::Status {
                        data: StatusKind::Ready,
                    });
                    return;
                }
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(%error, "silence gate failed");
                }
            }
        }

        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        if pipeline.buffer.over_capacity() {
            tracing::info!("buffer exceeded cap, forcing flush");
            self.flush_utterance(FlushReason::Capacity).await;
        }
    }

    /// Runs an interim recognition pass when enough new audio accumulated.
    async fn maybe_run_interim_asr(&mut self) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        let interval_samples = (pipeline.buffer.sample_rate() as u64
            * self.settings.pipeline.asr_interval_ms as u64
            / 1000) as usize;
        let new_samples = pipeline.buffer.len() - pipeline.samples_at_last_asr;
        if new_samples < interval_samples {
            return;
        }

        let transcript = pipeline
            .engines
            .recognizer
            .transcribe(
                pipeline.buffer.samples(),
                pipeline.buffer.sample_rate(),
                &self.source_language,
            )
            .await;
        pipeline.samples_at_last_asr = pipeline.buffer.len();

        let text = match transcript {
            Ok(text) => text.trim().to_string(),
            Err(error) => {
                tracing::warn!(%error, "interim recognition failed");
                return;
            }
        };
        if text.is_empty() || text == pipeline.last_interim || is_filler(&text) {
            return;
        }
        pipeline.last_interim = text.clone();
        let _ = self.outbound.send(ServerMessage::SourceTextInterim {
            data: text.clone(),
        });

        let words: Vec<&str> = text.split_whitespace().collect();
        if let Some(span) = pipeline.stable.update(&words) {
            tracing::debug!(words = span.word_count, span = %span.text, "stable span released");
            pipeline.scheduler.queue_draft(&span.text);
        }
    }

    /// Finalizes the current buffer: final recognition, remaining words
    /// drafted, refine queued, all utterance state reset.
    async fn flush_utterance(&mut self, reason: FlushReason) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        if !pipeline.buffer.has_min_speech() {
            // Too short, just clear
            Self::reset_utterance_state(pipeline);
            return;
        }
        tracing::debug!(?reason, ms = pipeline.buffer.duration_ms(), "flushing utterance");

        let transcript = pipeline
            .engines
            .recognizer
            .transcribe(
                pipeline.buffer.samples(),
                pipeline.buffer.sample_rate(),
                &self.source_language,
            )
            .await;
        match transcript {
            Ok(text) => {
                let text = text.trim().to_string();
                if !text.is_empty() && !is_filler(&text) {
                    let _ = self
                        .outbound
                        .send(ServerMessage::SourceText { data: text.clone() });

                    // Queue whatever never stabilized as one final draft
                    let words: Vec<&str> = text.split_whitespace().collect();
                    let remaining = pipeline.stable.uncommitted_tail(&words).join(" ");
                    if !remaining.is_empty() && !is_filler(&remaining) {
                        pipeline.scheduler.queue_draft(&remaining);
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, "final recognition failed");
            }
        }

        pipeline.scheduler.queue_refine();
        Self::reset_utterance_state(pipeline);
    }

    fn reset_utterance_state(pipeline: &mut PipelineState) {
        pipeline.buffer.clear();
        pipeline.samples_at_last_asr = 0;
        pipeline.last_interim.clear();
        pipeline.stable.reset();
    }

    /// Caller-supplied transcript text (incremental mode, external ASR).
    fn handle_text(&mut self, data: &str, is_final: bool) {
        if self.mode != SessionMode::IncrementalPipeline {
            tracing::warn!(mode = self.mode.as_str(), "text message ignored in this mode");
            return;
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };

        if let Some(released) = pipeline.position.update(data, is_final) {
            tracing::debug!(final_text = is_final, span = %released, "external text released");
            pipeline.scheduler.queue_draft(&released);
        }
        if is_final {
            pipeline.scheduler.queue_refine();
        }
    }

    async fn handle_audio_duplex(&mut self, chunk: &[f32]) {
        let Some(duplex) = self.duplex.as_mut() else {
            return;
        };
        for event in duplex.frame_loop.push(chunk).await {
            match event {
                FrameEvent::Text(token) => {
                    let _ = self
                        .outbound
                        .send(ServerMessage::TranslatedText { data: token });
                }
                FrameEvent::Audio(samples) => {
                    let _ = self.outbound.send(ServerMessage::Audio {
                        data: crate::audio::pcm::encode_pcm16_base64(&samples),
                        sample_rate: self.settings.duplex.sample_rate,
                    });
                }
            }
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            tracing::debug!(from = self.phase.as_str(), to = phase.as_str(), "phase transition");
            self.phase = phase;
        }
    }

    fn send(&self, message: ServerMessage) {
        let _ = self.outbound.send(message);
    }

    fn report_transient(&self, error: RelayError) {
        tracing::warn!(%error, "transient session error");
        self.send(ServerMessage::Error {
            message: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::mock::{
        MockCodec, MockRecognizer, MockStepper, MockSynthesizer, MockTranslator, MockVoiceActivity,
    };
    use crate::engines::slots::EngineProvider;
    use crate::engines::{DuplexEngines, EvictionPolicy, StepOutput};
    use async_trait::async_trait;
    use tokio::time::timeout;

    /// Provider that hands out pre-built mock sets so tests can keep
    /// references to the mocks.
    struct FixedProvider {
        pipeline: PipelineEngines,
        duplex: DuplexEngines,
    }

    #[async_trait]
    impl EngineProvider for FixedProvider {
        async fn load_pipeline(&self) -> Result<PipelineEngines> {
            Ok(self.pipeline.clone())
        }

        async fn load_duplex(&self) -> Result<DuplexEngines> {
            Ok(self.duplex.clone())
        }
    }

    struct Harness {
        controller: SessionController,
        outbound_rx: mpsc::UnboundedReceiver<ServerMessage>,
        recognizer: Arc<MockRecognizer>,
        stepper: Arc<MockStepper>,
    }

    fn settings() -> SessionSettings {
        let mut settings = SessionSettings::from_config(&Config::default());
        // Tight limits keep tests fast: 8 kHz, 0.5 s minimum, 2 s cap
        settings.audio.input_sample_rate = 8000;
        settings.audio.min_speech_ms = 500;
        settings.audio.max_buffer_ms = 2000;
        settings.audio.silence_duration_ms = 500;
        settings.duplex.sample_rate = 80;
        settings.duplex.frame_rate = 10.0;
        settings
    }

    async fn harness(mode: SessionMode, recognizer: MockRecognizer) -> Harness {
        harness_with(mode, recognizer, settings()).await
    }

    async fn harness_with(
        mode: SessionMode,
        recognizer: MockRecognizer,
        settings: SessionSettings,
    ) -> Harness {
        let recognizer = Arc::new(recognizer);
        let stepper = Arc::new(MockStepper::new());
        let provider = FixedProvider {
            pipeline: PipelineEngines {
                recognizer: recognizer.clone(),
                translator: Arc::new(MockTranslator::new()),
                synthesizer: Arc::new(MockSynthesizer::new()),
                vad: Arc::new(MockVoiceActivity::new()),
            },
            duplex: DuplexEngines {
                codec: Arc::new(MockCodec::new()),
                stepper: stepper.clone(),
            },
        };
        let slots = Arc::new(EngineSlots::new(
            Arc::new(provider),
            EvictionPolicy::ExclusiveResidency,
        ));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let mut controller = SessionController::new(mode, settings, slots, outbound_tx);
        controller.start().await.unwrap();
        Harness {
            controller,
            outbound_rx,
            recognizer,
            stepper,
        }
    }

    async fn recv(h: &mut Harness) -> ServerMessage {
        timeout(Duration::from_secs(1), h.outbound_rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("outbound closed")
    }

    /// Receives until a message matching the predicate arrives.
    async fn recv_until<F: Fn(&ServerMessage) -> bool>(h: &mut Harness, pred: F) -> ServerMessage {
        loop {
            let message = recv(h).await;
            if pred(&message) {
                return message;
            }
        }
    }

    fn speech(seconds: f32, sample_rate: u32) -> Vec<f32> {
        vec![0.6; (seconds * sample_rate as f32) as usize]
    }

    fn silence(seconds: f32, sample_rate: u32) -> Vec<f32> {
        vec![0.0; (seconds * sample_rate as f32) as usize]
    }

    #[tokio::test]
    async fn test_start_reports_loading_then_ready() {
        let mut h = harness(SessionMode::IncrementalPipeline, MockRecognizer::new()).await;

        // Engines were not resident, so loading was announced first
        assert_eq!(
            recv(&mut h).await,
            ServerMessage::Status {
                data: StatusKind::LoadingModel
            }
        );
        assert_eq!(
            recv(&mut h).await,
            ServerMessage::Status {
                data: StatusKind::Ready
            }
        );
        assert_eq!(h.controller.phase(), SessionPhase::Ready);
    }

    #[tokio::test]
    async fn test_short_noise_burst_never_reaches_engines() {
        let mut h = harness(SessionMode::IncrementalPipeline, MockRecognizer::new()).await;
        recv(&mut h).await; // loading
        recv(&mut h).await; // ready

        // 0.4 s: below both the interim interval and the minimum duration
        let chunk = speech(0.4, 8000);
        h.controller
            .handle_message(ClientMessage::Audio {
                data: crate::audio::pcm::encode_pcm16_base64(&chunk),
            })
            .await;

        assert_eq!(h.recognizer.calls(), 0);
        assert!(h.outbound_rx.try_recv().is_err());
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_incremental_silence_flush_full_cycle() {
        let recognizer = MockRecognizer::new().with_transcript("hello over there friend.");
        let mut h = harness(SessionMode::IncrementalPipeline, recognizer).await;
        recv(&mut h).await;
        recv(&mut h).await;

        // One second of speech then a second of silence closes the utterance
        let mut audio = speech(1.0, 8000);
        audio.extend(silence(1.0, 8000));
        h.controller
            .handle_message(ClientMessage::Audio {
                data: crate::audio::pcm::encode_pcm16_base64(&audio),
            })
            .await;
        assert_eq!(h.controller.phase(), SessionPhase::Active);

        let source = recv_until(&mut h, |m| matches!(m, ServerMessage::SourceText { .. })).await;
        assert_eq!(
            source,
            ServerMessage::SourceText {
                data: "hello over there friend.".to_string()
            }
        );

        // The flushed text was drafted, then refined, then synthesized
        let final_text =
            recv_until(&mut h, |m| matches!(m, ServerMessage::TranslatedTextFinal { .. })).await;
        assert_eq!(
            final_text,
            ServerMessage::TranslatedTextFinal {
                data: "[French] hello over there friend.".to_string()
            }
        );
        let audio_msg = recv_until(&mut h, |m| matches!(m, ServerMessage::Audio { .. })).await;
        match audio_msg {
            ServerMessage::Audio { sample_rate, .. } => assert_eq!(sample_rate, 24000),
            _ => unreachable!(),
        }

        h.controller.shutdown().await;
        assert_eq!(h.controller.phase(), SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_forced_flush_over_capacity() {
        let mut custom = settings();
        // Disable interim passes so only the cap path runs recognition
        custom.pipeline.asr_interval_ms = 60_000;
        let recognizer = MockRecognizer::new().with_transcript("a very long unbroken sentence");
        let mut h =
            harness_with(SessionMode::IncrementalPipeline, recognizer, custom).await;
        recv(&mut h).await;
        recv(&mut h).await;

        // 2.5 s of continuous speech exceeds the 2 s cap with no silence
        h.controller
            .handle_message(ClientMessage::Audio {
                data: crate::audio::pcm::encode_pcm16_base64(&speech(2.5, 8000)),
            })
            .await;

        let source = recv_until(&mut h, |m| matches!(m, ServerMessage::SourceText { .. })).await;
        assert_eq!(
            source,
            ServerMessage::SourceText {
                data: "a very long unbroken sentence".to_string()
            }
        );
        // All of it was still uncommitted, so it is drafted whole and refined
        let final_text =
            recv_until(&mut h, |m| matches!(m, ServerMessage::TranslatedTextFinal { .. })).await;
        assert_eq!(
            final_text,
            ServerMessage::TranslatedTextFinal {
                data: "[French] a very long unbroken sentence".to_string()
            }
        );

        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_interim_asr_emits_and_drafts_stable_prefix() {
        let recognizer = MockRecognizer::new().with_transcripts(&[
            "one two three four five six",
            "one two three four five six seven",
        ]);
        let mut h = harness(SessionMode::IncrementalPipeline, recognizer).await;
        recv(&mut h).await;
        recv(&mut h).await;

        // Two separate seconds of speech trigger two interim passes; keep the
        // tail loud so the silence gate stays open
        for _ in 0..2 {
            h.controller
                .handle_message(ClientMessage::Audio {
                    data: crate::audio::pcm::encode_pcm16_base64(&speech(1.0, 8000)),
                })
                .await;
        }

        let interim =
            recv_until(&mut h, |m| matches!(m, ServerMessage::SourceTextInterim { .. })).await;
        assert_eq!(
            interim,
            ServerMessage::SourceTextInterim {
                data: "one two three four five six".to_string()
            }
        );
        let interim2 =
            recv_until(&mut h, |m| matches!(m, ServerMessage::SourceTextInterim { .. })).await;
        assert_eq!(
            interim2,
            ServerMessage::SourceTextInterim {
                data: "one two three four five six seven".to_string()
            }
        );

        // The six agreed words became a draft
        let draft =
            recv_until(&mut h, |m| matches!(m, ServerMessage::TranslatedTextDraft { .. })).await;
        match draft {
            ServerMessage::TranslatedTextDraft { data } => {
                assert!(data.starts_with("[French]"));
            }
            _ => unreachable!(),
        }

        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_external_text_drafts_and_refines_on_final() {
        let mut h = harness(SessionMode::IncrementalPipeline, MockRecognizer::new()).await;
        recv(&mut h).await;
        recv(&mut h).await;

        h.controller
            .handle_message(ClientMessage::Config {
                target_language: None,
                source_language: None,
                asr_mode: Some(AsrMode::External),
            })
            .await;

        h.controller
            .handle_message(ClientMessage::Text {
                data: "please translate this sentence now.".to_string(),
                is_final: true,
            })
            .await;

        let final_text =
            recv_until(&mut h, |m| matches!(m, ServerMessage::TranslatedTextFinal { .. })).await;
        assert_eq!(
            final_text,
            ServerMessage::TranslatedTextFinal {
                data: "[French] please translate this sentence now.".to_string()
            }
        );

        assert_eq!(h.recognizer.calls(), 0, "external mode bypasses local recognition");
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_batch_mode_single_pass() {
        let recognizer = MockRecognizer::new().with_transcript("good morning everyone");
        let mut h = harness(SessionMode::BatchTranslate, recognizer).await;
        recv(&mut h).await;
        recv(&mut h).await;

        let mut audio = speech(1.0, 8000);
        audio.extend(silence(0.6, 8000));
        h.controller
            .handle_message(ClientMessage::Audio {
                data: crate::audio::pcm::encode_pcm16_base64(&audio),
            })
            .await;

        assert_eq!(
            recv(&mut h).await,
            ServerMessage::Status {
                data: StatusKind::Processing
            }
        );
        assert_eq!(
            recv(&mut h).await,
            ServerMessage::SourceText {
                data: "good morning everyone".to_string()
            }
        );
        assert_eq!(
            recv(&mut h).await,
            ServerMessage::TranslatedText {
                data: "[French] good morning everyone".to_string()
            }
        );
        assert!(matches!(recv(&mut h).await, ServerMessage::Audio { .. }));
        assert_eq!(
            recv(&mut h).await,
            ServerMessage::Status {
                data: StatusKind::Ready
            }
        );

        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_batch_failure_is_nonfatal() {
        let mut h = harness(SessionMode::BatchTranslate, MockRecognizer::new().with_failure()).await;
        recv(&mut h).await;
        recv(&mut h).await;

        let mut audio = speech(1.0, 8000);
        audio.extend(silence(0.6, 8000));
        h.controller
            .handle_message(ClientMessage::Audio {
                data: crate::audio::pcm::encode_pcm16_base64(&audio),
            })
            .await;

        recv_until(&mut h, |m| matches!(m, ServerMessage::Error { .. })).await;
        // Session recovered to ready
        assert_eq!(
            recv(&mut h).await,
            ServerMessage::Status {
                data: StatusKind::Ready
            }
        );
        assert!(h.controller.phase().accepts_messages());

        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplex_frames_emit_tokens_and_audio() {
        let mut h = harness(SessionMode::FullDuplex, MockRecognizer::new()).await;
        recv(&mut h).await;
        recv(&mut h).await;

        // Frame size is 8 samples at the test rate; the mock stepper echoes
        h.controller
            .handle_message(ClientMessage::Audio {
                data: crate::audio::pcm::encode_pcm16_base64(&vec![0.25; 8]),
            })
            .await;

        let audio = recv_until(&mut h, |m| matches!(m, ServerMessage::Audio { .. })).await;
        match audio {
            ServerMessage::Audio { data, sample_rate } => {
                assert_eq!(sample_rate, 80);
                let samples = decode_pcm16_base64(&data).unwrap();
                assert_eq!(samples.len(), 8);
            }
            _ => unreachable!(),
        }

        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplex_config_reissues_prompt_and_resets() {
        let mut h = harness(SessionMode::FullDuplex, MockRecognizer::new()).await;
        recv(&mut h).await;
        recv(&mut h).await;
        let resets_after_start = h.stepper.reset_count();

        h.controller
            .handle_message(ClientMessage::Config {
                target_language: Some("German".to_string()),
                source_language: None,
                asr_mode: None,
            })
            .await;

        assert_eq!(h.stepper.prompts(), vec!["German".to_string()]);
        assert_eq!(h.stepper.reset_count(), resets_after_start + 1);

        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_language_swap_without_explicit_source() {
        let mut h = harness(SessionMode::IncrementalPipeline, MockRecognizer::new()).await;
        recv(&mut h).await;
        recv(&mut h).await;

        // Default pair is English → French; targeting English swaps them
        h.controller
            .handle_message(ClientMessage::Config {
                target_language: Some("English".to_string()),
                source_language: None,
                asr_mode: None,
            })
            .await;

        assert_eq!(h.controller.target_language, "English");
        assert_eq!(h.controller.source_language, "French");

        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_requests_close() {
        let mut h = harness(SessionMode::IncrementalPipeline, MockRecognizer::new()).await;
        recv(&mut h).await;
        recv(&mut h).await;

        assert!(!h.controller.handle_message(ClientMessage::Stop).await);
        h.controller.shutdown().await;
        assert_eq!(h.controller.phase(), SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_malformed_inbound_ignored() {
        let mut h = harness(SessionMode::IncrementalPipeline, MockRecognizer::new()).await;
        recv(&mut h).await;
        recv(&mut h).await;

        assert!(h.controller.handle_raw("not json").await);
        assert!(h.controller.handle_raw(r#"{"type":"bogus"}"#).await);
        assert!(h.outbound_rx.try_recv().is_err());

        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_idle_refines_pending_drafts() {
        let mut h = harness(SessionMode::IncrementalPipeline, MockRecognizer::new()).await;
        recv(&mut h).await;
        recv(&mut h).await;

        // External text below the refine triggers leaves a pending draft
        h.controller
            .handle_message(ClientMessage::Config {
                target_language: None,
                source_language: None,
                asr_mode: Some(AsrMode::External),
            })
            .await;
        h.controller
            .handle_message(ClientMessage::Text {
                data: "five words arriving right now".to_string(),
                is_final: false,
            })
            .await;
        // Draft streamed, but no refine yet
        recv_until(&mut h, |m| {
            matches!(m, ServerMessage::TranslatedTextDraft { data } if data == " ")
        })
        .await;

        h.controller.on_idle().await;
        let final_text =
            recv_until(&mut h, |m| matches!(m, ServerMessage::TranslatedTextFinal { .. })).await;
        assert_eq!(
            final_text,
            ServerMessage::TranslatedTextFinal {
                data: "[French] five words arriving right now".to_string()
            }
        );

        h.controller.shutdown().await;
    }
}
