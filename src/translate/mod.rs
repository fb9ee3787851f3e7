//! Draft/refine translation pipeline.
//!
//! Stable text spans become fast context-free *draft* translations shown
//! immediately; accumulated drafts are periodically collapsed into one
//! context-aware *refine* pass that replaces them and feeds synthesis:
//! ```text
//! stable span ──▶ Draft ──▶ translated_text_draft (streamed)
//!                   │ ×3 or sentence end
//!                   ▼
//!                Refine ──▶ translated_text_final ──▶ SynthesisWorker ──▶ audio
//!                   │
//!                   └─ ContextWindow (bounded history)
//! ```

pub mod context;
pub mod scheduler;
pub mod synthesis;

pub use context::{ContextTurn, ContextWindow};
pub use scheduler::{SchedulerHandle, TranslateJob, TranslateWorker, TranslateWorkerConfig};
pub use synthesis::{SynthesisJob, SynthesisWorker};
