//! Audio ingestion for relay sessions.
//!
//! Inbound chunks arrive as base64 PCM16LE, are decoded to normalized
//! float samples, accumulated per session, and gated on trailing silence:
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌─────────────┐
//! │ pcm      │───▶│ SampleBuffer │───▶│ SilenceGate │───▶ flush / keep buffering
//! │ (decode) │    │ (min/max)    │    │ (VAD)       │
//! └──────────┘    └──────────────┘    └─────────────┘
//! ```

pub mod buffer;
pub mod gate;
pub mod pcm;

pub use buffer::SampleBuffer;
pub use gate::{SilenceGate, SilenceGateConfig};
pub use pcm::{decode_pcm16_base64, encode_pcm16_base64};
