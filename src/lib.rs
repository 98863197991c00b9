//! Rapid Type Analysis: a whole-program, fixed-point call-graph analysis
//! that restricts virtual dispatch targets to methods of classes proven
//! instantiated, and devirtualizes any call site whose target set collapses
//! to one method.
//!
//! The analysis is generic over [`Ir`], a small adapter trait the embedding
//! compiler implements over its own intermediate representation; this crate
//! owns none of the IR's storage.

mod analyzer;
mod config;
mod devirtualize;
mod error;
mod hierarchy;
mod ir;
mod liveset;
mod stats;

#[cfg(test)]
mod fixture;

pub use config::AnalysisConfig;
pub use error::{Result, RtaError};
pub use ir::{CallCallee, ClassFlags, Ir, MethodFlags, NodeKind};
pub use stats::RtaStats;

/// Runs Rapid Type Analysis to a fixed point and devirtualizes every call
/// site the result proves monomorphic.
///
/// `entry_points` are methods assumed reachable regardless of any call
/// (`main`, exported symbols). `initial_live_classes` are classes assumed
/// instantiated before analysis starts (e.g. types the runtime allocates
/// without a visible constructor call in the program's own graphs).
///
/// Panics if the analyzer or devirtualizer detects an internally
/// inconsistent hierarchy (ambiguous inherited implementation, or any other
/// invariant violation). These are bugs in the host IR adapter, not
/// conditions a caller can recover from.
pub fn rta_optimization<I: Ir>(
    ir: &mut I,
    entry_points: &[I::Method],
    initial_live_classes: &[I::Class],
    config: &AnalysisConfig<I>,
) -> RtaStats {
    let (live, mut stats) =
        analyzer::rta_run(ir, entry_points, initial_live_classes, config).expect("rta analysis failed");
    devirtualize::rta_devirtualize_calls(ir, entry_points, &live, &mut stats)
        .expect("rta devirtualization failed");

    if config.collect_stats {
        stats.log();
    }

    stats
}
