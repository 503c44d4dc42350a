//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

/// Timing and rendering parameters, fixed at engine construction and written
/// into snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeConfig {
    /// Ticks between extraction attempts and per hop in transit. The
    /// extraction cooldown is half of this; a freshly extracted unit spends
    /// one and a half operations on its first hop.
    pub ticks_per_operation: u32,
    /// How long a stuck unit waits before retrying its route.
    pub stuck_retry_ticks: u32,
    /// Stack-size cap per extraction attempt.
    pub max_extraction_per_operation: u64,
    /// Transits render only while their path is shorter than this.
    pub max_render_path_length: u32,
    /// Master switch for [`render_transits`](crate::PipeEngine::render_transits).
    pub render_items: bool,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            ticks_per_operation: 20,
            stuck_retry_ticks: 20,
            max_extraction_per_operation: 1,
            max_render_path_length: 64,
            render_items: true,
        }
    }
}

impl PipeConfig {
    pub fn cooldown_ticks(&self) -> u32 {
        self.ticks_per_operation / 2
    }

    /// First-hop travel time for a freshly extracted unit.
    pub fn extraction_transit_ticks(&self) -> u32 {
        self.ticks_per_operation * 3 / 2
    }
}
