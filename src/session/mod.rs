//! Relay sessions.
//!
//! One session per connection. The controller owns all per-session state
//! (buffers, trackers, queues, context) and is the only component touching
//! the message channel:
//! ```text
//! inbound ──▶ SessionController ──▶ SampleBuffer ──▶ SilenceGate / frame slicing
//!                    │                    │
//!                    │              trackers (stable prefix / position)
//!                    │                    │
//!                    │              TranslateWorker ──▶ SynthesisWorker
//!                    └──────────────── outbound ◀─────────┘
//! ```

pub mod controller;
pub mod protocol;

pub use controller::{SessionController, SessionSettings};
pub use protocol::{AsrMode, ClientMessage, ServerMessage, StatusKind};

/// Streaming discipline of a session, fixed at connect time by endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Silence-gated: buffer a whole utterance, then recognize, translate
    /// and synthesize it in one pass.
    BatchTranslate,
    /// Incremental: interim recognition with stable-prefix draft/refine
    /// translation.
    IncrementalPipeline,
    /// Fixed-rate frame stepping through a codec + stepper pair.
    FullDuplex,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::BatchTranslate => "batch-translate",
            SessionMode::IncrementalPipeline => "incremental-pipeline",
            SessionMode::FullDuplex => "full-duplex",
        }
    }
}

/// Lifecycle of a session.
///
/// `Connecting → Loading → Ready → Active → Closing → Closed`; `Loading` is
/// skipped when the mode's engines are already resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Loading,
    Ready,
    Active,
    Closing,
    Closed,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::Loading => "loading",
            SessionPhase::Ready => "ready",
            SessionPhase::Active => "active",
            SessionPhase::Closing => "closing",
            SessionPhase::Closed => "closed",
        }
    }

    /// True when inbound traffic may be processed in this phase.
    pub fn accepts_messages(self) -> bool {
        matches!(self, SessionPhase::Ready | SessionPhase::Active)
    }
}
