//! Tuning knobs for the vectored read path.

use serde::{Deserialize, Serialize};

/// Options controlling multirange dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VecConfig {
    /// Maximum length in bytes of a single `Range` header value.
    /// Header lines must stay under 8 KiB on Apache and nginx, and some S3
    /// implementations cap the whole header block at 4 KiB; 3900 leaves room
    /// for the header name and the rest of the request head.
    pub byte_range_header_budget: usize,
    /// A 200 answer larger than this many bytes is eligible for the
    /// overfetch guard.
    pub full_body_threshold: u64,
    /// A 200 answer is abandoned when its size exceeds both the threshold
    /// and `factor * total requested bytes`.
    pub full_body_overfetch_factor: u64,
}

impl Default for VecConfig {
    fn default() -> Self {
        Self {
            byte_range_header_budget: 3900,
            full_body_threshold: 1_000_000,
            full_body_overfetch_factor: 2,
        }
    }
}
