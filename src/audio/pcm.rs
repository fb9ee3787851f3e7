//! Base64 PCM16LE wire codec.
//!
//! The wire format for audio payloads is little-endian signed 16-bit mono
//! PCM, base64 encoded. Internally all audio is normalized `f32` in [-1, 1].

use crate::error::{RelayError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes a base64 PCM16LE payload to normalized float samples.
pub fn decode_pcm16_base64(data: &str) -> Result<Vec<f32>> {
    let raw = STANDARD.decode(data).map_err(|e| RelayError::AudioDecode {
        message: format!("invalid base64: {}", e),
    })?;

    if raw.len() % 2 != 0 {
        return Err(RelayError::AudioDecode {
            message: format!("odd PCM16 byte count: {}", raw.len()),
        });
    }

    let mut samples = Vec::with_capacity(raw.len() / 2);
    for chunk in raw.chunks_exact(2) {
        let value = i16::from_le_bytes([chunk[0], chunk[1]]);
        samples.push(value as f32 / 32768.0);
    }
    Ok(samples)
}

/// Encodes normalized float samples as base64 PCM16LE.
///
/// Samples are clamped to [-1, 1] before quantization; count and order are
/// preserved exactly.
pub fn encode_pcm16_base64(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    STANDARD.encode(&bytes)
}
