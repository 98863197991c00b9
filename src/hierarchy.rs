//! Resolves the method(s) a dynamically dispatched call entity might reach
//! at runtime, given the current (possibly partial) set of live classes.

use std::collections::BTreeSet;

use crate::error::{Result, RtaError};
use crate::ir::{ClassFlags, Ir, MethodFlags};
use crate::liveset::LiveSet;

/// Walks the subtype tree rooted at `owner(call_entity)`, registering
/// `call_entity` as a target of every override reachable through a live
/// subclass, and staging the rest in `live`'s `unused_targets` for later
/// activation.
///
/// `current` is threaded as a plain recursion parameter: a class that
/// overrides the member shadows it for its own subtree only, and each
/// recursive call owns its own copy, so sibling branches never see each
/// other's override. When `call_entity` itself dispatches an abstract
/// method and the member reachable at a given concrete, non-interface class
/// is still abstract there (no concrete override seen on the path from the
/// owner), the concrete implementation is found by ascending from that
/// class instead of treating the abstract declaration itself as a target.
pub fn collect_methods<I: Ir>(ir: &I, live: &mut LiveSet<I>, call_entity: I::Method) -> Result<BTreeSet<I::Method>> {
    let owner = ir.method_owner(call_entity);
    let name = ir.method_name(call_entity).to_string();
    let call_entity_is_abstract = ir.method_flags(call_entity).contains(MethodFlags::ABSTRACT);
    let mut result = BTreeSet::new();

    if is_resolvable_now(ir, live, owner) {
        register_live_target(
            ir,
            live,
            &mut result,
            owner,
            call_entity,
            call_entity,
            &name,
            call_entity_is_abstract,
        )?;
    }
    descend(ir, live, owner, call_entity, call_entity, &mut result, call_entity_is_abstract)?;
    Ok(result)
}

/// Whether `klass` should be treated as a valid resolution target right now:
/// either it is already proven live, or it is extern. An extern class's
/// instantiation can never be observed through a `VptrIsSet` node in this
/// program's own graphs, so the resolver treats it as live unconditionally
/// rather than staging its overrides in `unused_targets` forever.
fn is_resolvable_now<I: Ir>(ir: &I, live: &LiveSet<I>, klass: I::Class) -> bool {
    live.live_classes.contains(&klass) || ir.class_flags(klass).contains(ClassFlags::EXTERN)
}

/// Resolves the method actually reachable at `klass` given `current` (the
/// member inherited or overridden on the path from the owner): `current`
/// itself if concrete. If `current` is still abstract, an inherited concrete
/// implementation is looked up by ascending from `klass`, but only when the
/// originally dispatched `call_entity` was itself abstract and `klass` is a
/// concrete, non-interface class (matching a FIRM-less frontend's need to
/// reconstruct an interface method's implementation by hand). Outside that
/// case an abstract `current` resolves to no target, same as the original.
fn resolve_member<I: Ir>(
    ir: &I,
    klass: I::Class,
    current: I::Method,
    name: &str,
    call_entity_is_abstract: bool,
) -> Result<Option<I::Method>> {
    if ir.method_flags(current).contains(MethodFlags::ABSTRACT) {
        let flags = ir.class_flags(klass);
        if call_entity_is_abstract && !flags.contains(ClassFlags::ABSTRACT) && !flags.contains(ClassFlags::INTERFACE) {
            find_inherited_implementation(ir, klass, name)
        } else {
            Ok(None)
        }
    } else {
        Ok(Some(current))
    }
}

fn register_live_target<I: Ir>(
    ir: &I,
    live: &mut LiveSet<I>,
    result: &mut BTreeSet<I::Method>,
    klass: I::Class,
    current: I::Method,
    call_entity: I::Method,
    name: &str,
    call_entity_is_abstract: bool,
) -> Result<()> {
    if let Some(method) = resolve_member(ir, klass, current, name, call_entity_is_abstract)? {
        result.insert(method);
        live.dyncall_targets.entry(call_entity).or_default().insert(method);
        live.mark_live_method(method);
        live.enqueue(method);
    }
    Ok(())
}

fn descend<I: Ir>(
    ir: &I,
    live: &mut LiveSet<I>,
    klass: I::Class,
    current: I::Method,
    call_entity: I::Method,
    result: &mut BTreeSet<I::Method>,
    call_entity_is_abstract: bool,
) -> Result<()> {
    let name = ir.method_name(current).to_string();
    for subtype in ir.class_subtypes(klass).to_vec() {
        let current = ir.class_member_by_name(subtype, &name).unwrap_or(current);

        if is_resolvable_now(ir, live, subtype) {
            register_live_target(
                ir,
                live,
                result,
                subtype,
                current,
                call_entity,
                &name,
                call_entity_is_abstract,
            )?;
        } else if let Some(method) = resolve_member(ir, subtype, current, &name, call_entity_is_abstract)? {
            live.memorize_unused_target(subtype, method, call_entity);
        }

        descend(ir, live, subtype, current, call_entity, result, call_entity_is_abstract)?;
    }
    Ok(())
}

/// CHA variant of [`collect_methods`]: every concrete override reachable
/// anywhere in the subtype tree is a target, regardless of whether its class
/// has been proven instantiated. Used when
/// [`crate::config::AnalysisConfig::just_cha`] is set. Unlike `collect_methods`,
/// this coarse mode does not attempt to disambiguate a still-abstract
/// member by ascending; it simply skips it.
pub fn collect_methods_cha<I: Ir>(ir: &I, live: &mut LiveSet<I>, call_entity: I::Method) -> BTreeSet<I::Method> {
    let owner = ir.method_owner(call_entity);
    let mut result = BTreeSet::new();
    if !ir.method_flags(call_entity).contains(MethodFlags::ABSTRACT) {
        result.insert(call_entity);
        live.dyncall_targets
            .entry(call_entity)
            .or_default()
            .insert(call_entity);
        live.mark_live_method(call_entity);
        live.enqueue(call_entity);
    }
    descend_cha(ir, live, owner, call_entity, call_entity, &mut result);
    result
}

fn descend_cha<I: Ir>(
    ir: &I,
    live: &mut LiveSet<I>,
    klass: I::Class,
    current: I::Method,
    call_entity: I::Method,
    result: &mut BTreeSet<I::Method>,
) {
    let name = ir.method_name(current).to_string();
    for subtype in ir.class_subtypes(klass).to_vec() {
        let current = ir.class_member_by_name(subtype, &name).unwrap_or(current);
        if !ir.method_flags(current).contains(MethodFlags::ABSTRACT) {
            result.insert(current);
            live.dyncall_targets
                .entry(call_entity)
                .or_default()
                .insert(current);
            live.mark_live_method(current);
            live.enqueue(current);
        }
        descend_cha(ir, live, subtype, current, call_entity, result);
    }
}

/// Provenance of a candidate found while ascending the supertype chain, used
/// only to break ties per the class-beats-interface rule.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Provenance {
    Class,
    Interface,
}

/// Ascends from `klass` looking for a concrete (non-abstract) implementation
/// of `name`, used to resolve a call on an entity whose own class declares
/// the member abstractly.
///
/// A candidate found through a non-interface supertype always wins over one
/// found through an interface. Two candidates of the same provenance that
/// disagree is a fatal ambiguity: the hierarchy does not tell us which one
/// the runtime would actually pick.
pub fn find_inherited_implementation<I: Ir>(ir: &I, klass: I::Class, name: &str) -> Result<Option<I::Method>> {
    let mut best: Option<(I::Method, Provenance)> = None;
    for supertype in ir.class_supertypes(klass).to_vec() {
        ascend(ir, supertype, name, &mut best)?;
    }
    Ok(best.map(|(method, _)| method))
}

/// A member declared directly on `klass` is this branch's answer, whether
/// concrete (the candidate) or abstract (a dead end); either way the branch
/// stops here. Only when `klass` declares no member of this name at all does
/// the search continue into `klass`'s own supertypes.
fn ascend<I: Ir>(ir: &I, klass: I::Class, name: &str, best: &mut Option<(I::Method, Provenance)>) -> Result<()> {
    if let Some(candidate) = ir.class_member_by_name(klass, name) {
        if ir.method_flags(candidate).contains(MethodFlags::ABSTRACT) {
            return Ok(());
        }

        let provenance = if ir.class_flags(klass).contains(ClassFlags::INTERFACE) {
            Provenance::Interface
        } else {
            Provenance::Class
        };
        match best {
            None => *best = Some((candidate, provenance)),
            Some((existing, existing_provenance)) => {
                if *existing_provenance == Provenance::Interface && provenance == Provenance::Class {
                    *best = Some((candidate, provenance));
                } else if *existing_provenance == Provenance::Class && provenance == Provenance::Interface {
                    // existing class-sourced candidate stands
                } else if *existing != candidate {
                    return Err(RtaError::AmbiguousImplementation);
                }
            }
        }
        return Ok(());
    }

    for supertype in ir.class_supertypes(klass).to_vec() {
        ascend(ir, supertype, name, best)?;
    }
    Ok(())
}
