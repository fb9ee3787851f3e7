//! Draft/refine translation scheduler.
//!
//! One worker per session consumes a strictly ordered job queue. Draft jobs
//! stream fast context-free translations; refine jobs collapse everything
//! drafted since the last refine into one context-aware translation that
//! replaces the drafts and is handed to synthesis. Jobs never run
//! concurrently within a session.

use crate::defaults;
use crate::engines::Translator;
use crate::error::RelayError;
use crate::session::protocol::ServerMessage;
use crate::text::filler::is_filler;
use crate::text::has_terminal_punctuation;
use crate::translate::context::ContextWindow;
use crate::translate::synthesis::SynthesisJob;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Jobs consumed by the translate worker, strictly FIFO.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslateJob {
    /// Fast, context-free translation of one stable span.
    Draft { text: String },
    /// Context-aware re-translation of all accumulated draft source text.
    ///
    /// Carries the draft-state generation observed at enqueue; a stale
    /// generation means the drafts were already consumed and the job is
    /// discarded.
    Refine { generation: u64 },
    /// Ordered language switch; clears the context window.
    Reconfigure { target_language: String },
    /// Shutdown sentinel; the worker drains it and terminates.
    Shutdown,
}

/// Draft accumulation shared between the session and its worker.
#[derive(Debug, Default)]
struct DraftState {
    chunks: Vec<String>,
    drafts_since_refine: u32,
    refine_queued: bool,
    generation: u64,
}

/// Configuration for the translate worker.
#[derive(Debug, Clone)]
pub struct TranslateWorkerConfig {
    pub target_language: String,
    pub drafts_per_refine: u32,
    pub max_context_turns: usize,
}

impl Default for TranslateWorkerConfig {
    fn default() -> Self {
        Self {
            target_language: defaults::DEFAULT_TARGET_LANGUAGE.to_string(),
            drafts_per_refine: defaults::DRAFTS_PER_REFINE,
            max_context_turns: defaults::MAX_CONTEXT_TURNS,
        }
    }
}

/// Session-side handle for enqueueing jobs and inspecting draft state.
#[derive(Clone)]
pub struct SchedulerHandle {
    jobs: mpsc::UnboundedSender<TranslateJob>,
    state: Arc<Mutex<DraftState>>,
}

impl SchedulerHandle {
    /// Queues a draft for the span unless it is empty or filler-only.
    pub fn queue_draft(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || is_filler(text) {
            return false;
        }
        self.jobs
            .send(TranslateJob::Draft {
                text: text.to_string(),
            })
            .is_ok()
    }

    /// Queues a refine unless one is already pending. Returns whether a job
    /// was enqueued.
    pub fn queue_refine(&self) -> bool {
        let generation = {
            let mut state = self.state.lock().unwrap();
            if state.refine_queued {
                return false;
            }
            state.refine_queued = true;
            state.generation
        };
        self.jobs.send(TranslateJob::Refine { generation }).is_ok()
    }

    /// Queues a refine only when unconsumed drafts exist (idle-timeout path).
    pub fn queue_refine_if_pending(&self) -> bool {
        if !self.has_pending_drafts() {
            return false;
        }
        self.queue_refine()
    }

    /// Switches the target language in queue order.
    pub fn queue_reconfigure(&self, target_language: &str) {
        let _ = self.jobs.send(TranslateJob::Reconfigure {
            target_language: target_language.to_string(),
        });
    }

    /// Pushes the shutdown sentinel.
    pub fn shutdown(&self) {
        let _ = self.jobs.send(TranslateJob::Shutdown);
    }

    /// True when draft text accumulated without a consuming refine.
    pub fn has_pending_drafts(&self) -> bool {
        !self.state.lock().unwrap().chunks.is_empty()
    }
}

/// Single consumer of a session's translate queue.
pub struct TranslateWorker {
    translator: Arc<dyn Translator>,
    config: TranslateWorkerConfig,
    context: ContextWindow,
    state: Arc<Mutex<DraftState>>,
    jobs_tx: mpsc::UnboundedSender<TranslateJob>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    synthesis: mpsc::UnboundedSender<SynthesisJob>,
}

impl TranslateWorker {
    /// Creates the worker plus its session-side handle and job receiver.
    ///
    /// The caller spawns `run` with the returned receiver.
    pub fn new(
        translator: Arc<dyn Translator>,
        config: TranslateWorkerConfig,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        synthesis: mpsc::UnboundedSender<SynthesisJob>,
    ) -> (Self, SchedulerHandle, mpsc::UnboundedReceiver<TranslateJob>) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(DraftState::default()));
        let context = ContextWindow::new(config.max_context_turns);
        let handle = SchedulerHandle {
            jobs: jobs_tx.clone(),
            state: state.clone(),
        };
        let worker = Self {
            translator,
            config,
            context,
            state,
            jobs_tx,
            outbound,
            synthesis,
        };
        (worker, handle, jobs_rx)
    }

    /// Processes jobs until the shutdown sentinel.
    ///
    /// Job failures are reported to the client and never stop the loop, so
    /// the sentinel is always eventually observed.
    pub async fn run(mut self, mut jobs: mpsc::UnboundedReceiver<TranslateJob>) {
        while let Some(job) = jobs.recv().await {
            match job {
                TranslateJob::Shutdown => break,
                TranslateJob::Reconfigure { target_language } => {
                    tracing::debug!(target = %target_language, "translate target switched");
                    self.config.target_language = target_language;
                    self.context.clear();
                }
                TranslateJob::Draft { text } => {
                    if let Err(e) = self.run_draft(&text).await {
                        self.report_failure(e);
                    }
                }
                TranslateJob::Refine { generation } => {
                    if let Err(e) = self.run_refine(generation).await {
                        self.report_failure(e);
                    }
                }
            }
        }
    }

    async fn run_draft(&mut self, text: &str) -> crate::error::Result<()> {
        let text = text.trim();
        tracing::debug!(span = %text, "draft translate");

        let mut fragments = self
            .translator
            .translate_stream(text, &self.config.target_language, None)
            .await?;
        while let Some(fragment) = fragments.recv().await {
            let _ = self
                .outbound
                .send(ServerMessage::TranslatedTextDraft { data: fragment });
        }

        let refine_generation = {
            let mut state = self.state.lock().unwrap();
            state.chunks.push(text.to_string());
            state.drafts_since_refine += 1;

            let due = state.drafts_since_refine >= self.config.drafts_per_refine
                || has_terminal_punctuation(text);
            if due && !state.refine_queued {
                state.refine_queued = true;
                Some(state.generation)
            } else {
                None
            }
        };
        if let Some(generation) = refine_generation {
            let _ = self.jobs_tx.send(TranslateJob::Refine { generation });
        }

        // Separator so consecutive drafts don't run together on the client
        let _ = self.outbound.send(ServerMessage::TranslatedTextDraft {
            data: " ".to_string(),
        });
        Ok(())
    }

    async fn run_refine(&mut self, generation: u64) -> crate::error::Result<()> {
        let source = {
            let mut state = self.state.lock().unwrap();
            state.refine_queued = false;
            if generation != state.generation {
                tracing::debug!(generation, current = state.generation, "stale refine discarded");
                return Ok(());
            }
            if state.chunks.is_empty() {
                return Ok(());
            }
            state.chunks.join(" ")
        };

        tracing::debug!(source = %source, context_turns = self.context.len(), "refine translate");
        let context = if self.context.is_empty() {
            None
        } else {
            Some(self.context.turns())
        };
        let mut fragments = self
            .translator
            .translate_stream(&source, &self.config.target_language, context)
            .await?;
        let mut translation = String::new();
        while let Some(fragment) = fragments.recv().await {
            translation.push_str(&fragment);
        }
        let translation = translation.trim().to_string();

        let _ = self.outbound.send(ServerMessage::TranslatedTextFinal {
            data: translation.clone(),
        });

        self.context.push(source, translation.clone());
        if !translation.is_empty() {
            let _ = self.synthesis.send(SynthesisJob::Speak {
                text: translation,
                language: self.config.target_language.clone(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.chunks.clear();
        state.drafts_since_refine = 0;
        state.generation += 1;
        Ok(())
    }

    fn report_failure(&self, error: RelayError) {
        tracing::warn!(%error, "translate job failed");
        let _ = self.outbound.send(ServerMessage::Error {
            message: format!("Translation failed: {}", error),
        });
    }
}
