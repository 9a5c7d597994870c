//! Resolution statistics (spec.md §4.3): counts per outcome and an EWMA of
//! resolution time.

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ResolutionStats {
    pub auto_resolved: u64,
    pub escalated: u64,
    pub failed: u64,
    pub avg_resolution_time_s: f64,
}

impl ResolutionStats {
    /// `new_avg = 0.9*old_avg + 0.1*sample` (spec.md §4.3).
    pub fn record_resolution_time(&mut self, sample_s: f64) {
        self.avg_resolution_time_s = 0.9 * self.avg_resolution_time_s + 0.1 * sample_s;
    }

    pub fn total(&self) -> u64 {
        self.auto_resolved + self.escalated + self.failed
    }

    pub fn auto_resolve_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.auto_resolved as f64 / self.total() as f64
        }
    }
}
