//! Shared PCM codec helpers.
//!
//! Every place that touches raw audio (capture forwarding, playback decode,
//! the wire frames) goes through this module so the sample-format rules live
//! in exactly one spot.

use anyhow::{bail, Result};
use base64::Engine;

/// Sample rate the live model expects for input audio (Hz).
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of audio fragments the live model sends back (Hz).
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Fixed capture processing block size, in samples.
pub const CAPTURE_BLOCK_SIZE: usize = 4096;

/// Convert float samples in [-1, 1] to signed 16-bit PCM.
///
/// Out-of-range input is clamped rather than wrapped.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

/// Convert signed 16-bit PCM to float samples in [-1, 1).
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Pack PCM16 samples as little-endian bytes.
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Unpack little-endian bytes into PCM16 samples.
pub fn bytes_to_pcm16(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        bail!("PCM16 payload has odd length: {} bytes", bytes.len());
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

/// Pack float32 samples as little-endian bytes (push-capture wire format).
pub fn f32_to_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Unpack little-endian bytes into float32 samples.
pub fn bytes_to_f32(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        bail!("float32 payload length {} is not a multiple of 4", bytes.len());
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Base64-encode an audio payload for the wire.
pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode a base64 audio payload from the wire.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    Ok(base64::engine::general_purpose::STANDARD.decode(data)?)
}

/// Duration in seconds of a mono buffer at the given sample rate.
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    sample_count as f64 / sample_rate as f64
}
