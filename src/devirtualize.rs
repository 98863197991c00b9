//! The second pass: an independent walk from the same entry points, sharing
//! no mutable state with the analyzer, that rewrites any dyncall site whose
//! resolved target set has collapsed to exactly one method into a direct
//! call. Mirrors `rta_devirtualize_calls`.

use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::error::{Result, RtaError};
use crate::ir::{CallCallee, ClassFlags, Ir, MethodFlags, NodeKind};
use crate::liveset::LiveSet;
use crate::stats::RtaStats;

#[tracing::instrument(name = "rta.devirtualize", skip_all, fields(entry_points = entry_points.len()))]
pub fn rta_devirtualize_calls<I: Ir>(
    ir: &mut I,
    entry_points: &[I::Method],
    live: &LiveSet<I>,
    stats: &mut RtaStats,
) -> Result<()> {
    let mut queue: VecDeque<I::Method> = entry_points.iter().copied().collect();
    let mut done: BTreeSet<I::Method> = BTreeSet::new();

    while let Some(method) = queue.pop_front() {
        if done.contains(&method) {
            continue;
        }
        done.insert(method);

        if !ir.has_graph(method) {
            continue;
        }

        let mut calls = Vec::new();
        ir.walk_graph(method, &mut |node| {
            if let NodeKind::Call { callee, statically_bound } = node {
                calls.push((callee, statically_bound));
            }
        });

        for (callee, statically_bound) in calls {
            match callee {
                CallCallee::Address(target) => {
                    enqueue_once(&mut queue, &done, target);
                }
                CallCallee::MethodSel { entity, site } => {
                    if statically_bound {
                        enqueue_once(&mut queue, &done, entity);
                        continue;
                    }
                    let targets = live.dyncall_targets.get(&entity).ok_or(RtaError::InvariantViolated(
                        "dynamic call site has no dyncall_targets entry from the analyzer pass",
                    ))?;

                    if targets.len() == 1 {
                        let target = *targets.iter().next().expect("len checked above");
                        if is_devirtualizable(ir, target) {
                            let is_interface_call =
                                ir.class_flags(ir.method_owner(entity)).contains(ClassFlags::INTERFACE);
                            debug!(target = ir.method_name(target), "devirtualizing call");
                            ir.devirtualize_call(site, target);
                            if is_interface_call {
                                stats.devirtualized_interface_calls += 1;
                            } else {
                                stats.devirtualized_dynamic_calls += 1;
                            }
                        }
                    }

                    for target in targets.iter().copied().collect::<Vec<_>>() {
                        enqueue_once(&mut queue, &done, target);
                    }
                }
                CallCallee::Other => {}
            }
        }
    }

    Ok(())
}

fn enqueue_once<I: Ir>(queue: &mut VecDeque<I::Method>, done: &BTreeSet<I::Method>, method: I::Method) {
    if !done.contains(&method) {
        queue.push_back(method);
    }
}

/// Whether rewriting a dyncall to `target` is safe: the owner must not be
/// extern, unless the owner is final (no further unseen overrides possible)
/// or `target` itself is final.
fn is_devirtualizable<I: Ir>(ir: &I, target: I::Method) -> bool {
    let owner = ir.method_owner(target);
    let owner_flags = ir.class_flags(owner);
    !owner_flags.contains(ClassFlags::EXTERN)
        || owner_flags.contains(ClassFlags::FINAL)
        || ir.method_flags(target).contains(MethodFlags::FINAL)
}
