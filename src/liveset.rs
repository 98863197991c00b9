use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::ir::{ClassFlags, Ir};

/// Analysis state shared by both passes: live classes/methods, the resolved
/// dyncall target map, and the `unused_targets` staging area that lets a
/// class becoming live retroactively activate call edges discovered before
/// it was live.
pub struct LiveSet<I: Ir> {
    pub live_classes: BTreeSet<I::Class>,
    pub live_methods: BTreeSet<I::Method>,
    pub dyncall_targets: BTreeMap<I::Method, BTreeSet<I::Method>>,
    /// class -> (method -> call-site entities that would gain that method
    /// as a target once the class becomes live).
    unused_targets: BTreeMap<I::Class, BTreeMap<I::Method, BTreeSet<I::Method>>>,
    pub workqueue: VecDeque<I::Method>,
    done_set: BTreeSet<I::Method>,
}

impl<I: Ir> LiveSet<I> {
    pub fn new() -> Self {
        Self {
            live_classes: BTreeSet::new(),
            live_methods: BTreeSet::new(),
            dyncall_targets: BTreeMap::new(),
            unused_targets: BTreeMap::new(),
            workqueue: VecDeque::new(),
            done_set: BTreeSet::new(),
        }
    }

    /// Enqueues `method` for analysis unless it has already been visited in
    /// this pass. Marking-as-done happens when dequeued, not here, so
    /// recursive/repeated edges to the same method are harmless.
    pub fn enqueue(&mut self, method: I::Method) {
        if !self.done_set.contains(&method) {
            self.workqueue.push_back(method);
        }
    }

    pub fn mark_live_method(&mut self, method: I::Method) {
        self.live_methods.insert(method);
    }

    pub fn is_done(&self, method: I::Method) -> bool {
        self.done_set.contains(&method)
    }

    pub fn mark_done(&mut self, method: I::Method) {
        self.done_set.insert(method);
    }

    pub fn pop_next(&mut self) -> Option<I::Method> {
        self.workqueue.pop_front()
    }

    /// Records that `entity` would become a target of `call_entity` if
    /// `klass` ever becomes live.
    pub fn memorize_unused_target(&mut self, klass: I::Class, entity: I::Method, call_entity: I::Method) {
        self.unused_targets
            .entry(klass)
            .or_default()
            .entry(entity)
            .or_default()
            .insert(call_entity);
    }

    /// Adds `klass` to `live_classes` if it is eligible (not already live,
    /// not extern, not abstract), drains any `unused_targets` recorded
    /// against it into `dyncall_targets`, and runs the extern-superclass
    /// check so overrides reachable via an external vtable get marked live.
    pub fn add_new_live_class(&mut self, ir: &I, klass: I::Class) {
        if self.live_classes.contains(&klass) {
            return;
        }
        let flags = ir.class_flags(klass);
        if flags.contains(ClassFlags::EXTERN) || flags.contains(ClassFlags::ABSTRACT) {
            return;
        }

        self.live_classes.insert(klass);
        debug!(class = ir.class_name(klass), "new live class");

        // Remove the outer entry before iterating its contents so nothing
        // reads `unused_targets[klass]` through the map while it drains.
        if let Some(methods) = self.unused_targets.remove(&klass) {
            for (method, call_entities) in methods {
                for call_entity in call_entities {
                    self.dyncall_targets
                        .entry(call_entity)
                        .or_default()
                        .insert(method);
                    self.live_methods.insert(method);
                    self.enqueue(method);
                }
            }
        }

        self.check_extern_superclasses(ir, klass);
    }

    /// DFS up `klass`'s supertypes; whenever an extern supertype `S` is
    /// found, any non-final method of `S` that `klass` overrides by name is
    /// marked live, since external code could reach it through `S`'s vtable.
    ///
    /// Does not currently skip constructors (carried over unresolved from
    /// the original).
    pub fn check_extern_superclasses(&mut self, ir: &I, klass: I::Class) {
        let flags = ir.class_flags(klass);
        if flags.contains(ClassFlags::EXTERN) {
            return;
        }
        for supertype in ir.class_supertypes(klass) {
            self.check_extern_superclasses_recursive(ir, klass, *supertype);
        }
    }

    fn check_extern_superclasses_recursive(&mut self, ir: &I, klass: I::Class, superclass: I::Class) {
        let super_flags = ir.class_flags(superclass);
        if super_flags.contains(ClassFlags::EXTERN) {
            for member in ir.class_methods(superclass) {
                if ir.method_flags(*member).contains(crate::ir::MethodFlags::FINAL) {
                    continue;
                }
                let name = ir.method_name(*member).to_string();
                if let Some(overriding) = ir.class_member_by_name(klass, &name) {
                    if overriding != *member {
                        debug!(
                            class = ir.class_name(klass),
                            method = name,
                            "overrides extern superclass member, marking live"
                        );
                        self.mark_live_method(overriding);
                        self.enqueue(overriding);
                    }
                }
            }
        }
        for supertype in ir.class_supertypes(superclass) {
            self.check_extern_superclasses_recursive(ir, klass, *supertype);
        }
    }
}

impl<I: Ir> Default for LiveSet<I> {
    fn default() -> Self {
        Self::new()
    }
}
