//! The first pass: a fixed-point walk over every reachable method's graph
//! that grows the live-class/live-method sets and resolves dyncall targets
//! as new classes become provably instantiated.

use tracing::{debug, trace};

use crate::config::AnalysisConfig;
use crate::error::{Result, RtaError};
use crate::hierarchy::{collect_methods, collect_methods_cha};
use crate::ir::{CallCallee, ClassFlags, Ir, NodeKind};
use crate::liveset::LiveSet;
use crate::stats::RtaStats;

/// Runs the work-queue fixed point starting from `entry_points` and
/// `initial_live_classes`, returning the accumulated live-set and call
/// counters. Mirrors `rta_run` from the original implementation.
#[tracing::instrument(name = "rta.run", skip_all, fields(entry_points = entry_points.len()))]
pub fn rta_run<I: Ir>(
    ir: &I,
    entry_points: &[I::Method],
    initial_live_classes: &[I::Class],
    config: &AnalysisConfig<I>,
) -> Result<(LiveSet<I>, RtaStats)> {
    if entry_points.is_empty() {
        return Err(RtaError::PreconditionViolated("entry point list is empty"));
    }
    for entry in entry_points {
        if !ir.has_graph(*entry) {
            return Err(RtaError::PreconditionViolated("entry point has no graph"));
        }
    }

    let mut live = LiveSet::new();
    let mut stats = RtaStats::default();

    for class in initial_live_classes {
        live.add_new_live_class(ir, *class);
    }
    for method in entry_points {
        live.mark_live_method(*method);
        live.enqueue(*method);
    }

    while let Some(method) = live.pop_next() {
        if live.is_done(method) {
            continue;
        }
        live.mark_done(method);
        process_method(ir, &mut live, &mut stats, config, method)?;
    }

    Ok((live, stats))
}

fn process_method<I: Ir>(
    ir: &I,
    live: &mut LiveSet<I>,
    stats: &mut RtaStats,
    config: &AnalysisConfig<I>,
    method: I::Method,
) -> Result<()> {
    if !ir.has_graph(method) {
        process_graphless_method(ir, live, method);
        return Ok(());
    }

    trace!(method = ir.method_name(method), "walking graph");

    let mut error = None;
    ir.walk_graph(method, &mut |node| {
        if error.is_some() {
            return;
        }
        if let Err(e) = handle_node::<I>(ir, live, stats, config, node) {
            error = Some(e);
        }
    });
    if let Some(e) = error {
        return Err(e);
    }
    Ok(())
}

/// A method without a graph is either a genuine external stub, or a
/// frontend-specific ld-name redirect: when its link-name differs from its
/// name and matches some other entity's link-name that does carry a graph,
/// the analyzer treats a call to this method as reaching that entity
/// instead.
fn process_graphless_method<I: Ir>(ir: &I, live: &mut LiveSet<I>, method: I::Method) {
    let name = ir.method_name(method);
    let link_name = ir.method_link_name(method);
    if name == link_name {
        return;
    }
    if let Some(redirect) = ir.method_with_link_name(link_name) {
        if redirect != method {
            debug!(link_name, "ld-name redirect");
            live.mark_live_method(redirect);
            live.enqueue(redirect);
        }
    }
}

/// Marks `target` live and enqueues it, then asks `config`'s `detect_call`
/// hook whether this static call site also reaches a hidden callee (e.g. an
/// implicit class initializer) and does the same for it if so.
fn handle_static_call<I: Ir>(ir: &I, live: &mut LiveSet<I>, config: &AnalysisConfig<I>, target: I::Method) {
    live.mark_live_method(target);
    live.enqueue(target);
    if let Some(hidden) = config.detect_call(ir, target) {
        live.mark_live_method(hidden);
        live.enqueue(hidden);
    }
}

fn handle_node<I: Ir>(
    ir: &I,
    live: &mut LiveSet<I>,
    stats: &mut RtaStats,
    config: &AnalysisConfig<I>,
    node: NodeKind<I>,
) -> Result<()> {
    match node {
        NodeKind::Address(Some(target)) => {
            // An address-taken method may be invoked through any means the
            // frontend chooses (function pointer, reflection); treat it as
            // reachable the same as an entry point.
            debug!(method = ir.method_name(target), "address-taken method");
            live.mark_live_method(target);
            live.enqueue(target);
        }
        NodeKind::Address(None) => {}
        NodeKind::VptrIsSet(class) => {
            live.add_new_live_class(ir, class);
        }
        NodeKind::Call { callee, statically_bound } => match callee {
            CallCallee::Address(target) => {
                stats.static_calls += 1;
                handle_static_call(ir, live, config, target);
            }
            CallCallee::MethodSel { entity, site: _ } => {
                if statically_bound {
                    stats.static_calls += 1;
                    handle_static_call(ir, live, config, entity);
                } else {
                    if ir.class_flags(ir.method_owner(entity)).contains(ClassFlags::INTERFACE) {
                        stats.interface_calls += 1;
                    } else {
                        stats.dynamic_calls += 1;
                    }
                    if !live.dyncall_targets.contains_key(&entity) {
                        live.dyncall_targets.insert(entity, Default::default());
                        if config.just_cha {
                            collect_methods_cha(ir, live, entity);
                        } else {
                            collect_methods(ir, live, entity)?;
                        }
                    }
                }
            }
            CallCallee::Other => {
                stats.other_calls += 1;
            }
        },
        NodeKind::Other => {}
    }
    Ok(())
}
