//! Call-site counters, gathered across both passes. Replaces the original's
//! `RTA_STATS`-gated global counters and unconditional `printf` summary.

use tracing::info;

/// Counts of call sites by kind, tallied during the analyzer walk and the
/// devirtualization pass. Always accumulated (the counters are cheap
/// integer increments), but only logged when
/// [`crate::config::AnalysisConfig::collect_stats`] is set; otherwise the
/// caller still gets the final `RtaStats` back from `rta_optimization`, it is
/// simply never written to the log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RtaStats {
    pub static_calls: u64,
    pub dynamic_calls: u64,
    pub interface_calls: u64,
    pub devirtualized_dynamic_calls: u64,
    pub devirtualized_interface_calls: u64,
    pub other_calls: u64,
}

impl RtaStats {
    pub fn log(&self) {
        info!(
            static_calls = self.static_calls,
            dynamic_calls = self.dynamic_calls,
            interface_calls = self.interface_calls,
            devirtualized_dynamic_calls = self.devirtualized_dynamic_calls,
            devirtualized_interface_calls = self.devirtualized_interface_calls,
            other_calls = self.other_calls,
            "rta summary"
        );
    }
}
