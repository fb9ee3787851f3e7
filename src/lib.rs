//! voxrelay - Real-time bidirectional speech translation relay
//!
//! Audio arrives in small chunks over a WebSocket, is segmented into
//! utterances, transcribed, translated, and spoken back with incremental
//! draft/refine updates instead of waiting for full utterances.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod duplex;
pub mod engines;
pub mod error;
pub mod server;
pub mod session;
pub mod text;
pub mod translate;

// Collaborator traits (audio → text → translation → speech)
pub use engines::{
    AudioCodec, DuplexStepper, SpeechRecognizer, SpeechSynthesizer, Translator,
    VoiceActivityDetector,
};

// Engine residency
pub use engines::{EngineProvider, EngineSlots, EvictionPolicy};

// Sessions
pub use session::{SessionController, SessionMode, SessionSettings};

// Server
pub use server::serve;

// Error handling
pub use error::{RelayError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.0.1+abc1234"` when git hash is available, `"0.0.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
