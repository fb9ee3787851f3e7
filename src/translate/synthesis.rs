//! Serialized speech synthesis.
//!
//! Synthesis engines are not safely reentrant per session, so one worker
//! drains a FIFO queue and keeps exactly one call in flight. Speech is
//! best-effort: a failed job is logged and dropped rather than blocking the
//! pipeline.

use crate::engines::SpeechSynthesizer;
use crate::session::protocol::ServerMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Jobs consumed by the synthesis worker.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisJob {
    Speak { text: String, language: String },
    /// Shutdown sentinel; the worker drains it and terminates.
    Shutdown,
}

/// Single consumer of a session's synthesis queue.
pub struct SynthesisWorker {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

impl SynthesisWorker {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            synthesizer,
            outbound,
        }
    }

    /// Processes jobs until the shutdown sentinel.
    pub async fn run(self, mut jobs: mpsc::UnboundedReceiver<SynthesisJob>) {
        while let Some(job) = jobs.recv().await {
            match job {
                SynthesisJob::Shutdown => break,
                SynthesisJob::Speak { text, language } => {
                    tracing::debug!(chars = text.len(), "synthesizing");
                    match self.synthesizer.synthesize(&text, &language).await {
                        Ok(speech) => {
                            let _ = self.outbound.send(ServerMessage::Audio {
                                data: speech.data,
                                sample_rate: speech.sample_rate,
                            });
                        }
                        Err(error) => {
                            tracing::warn!(%error, "synthesis failed, job dropped");
                        }
                    }
                }
            }
        }
    }
}
