//! A tiny in-memory `Ir` implementation used only by this crate's own
//! tests. Not part of the public API.

use std::cell::RefCell;

use crate::ir::{CallCallee, ClassFlags, Ir, MethodFlags, NodeKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClassId(pub usize);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MethodId(pub usize);

/// Identifies a `Call` node by the method whose graph holds it and the
/// node's position in that graph's instruction list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MethodSelSite(pub MethodId, pub usize);

#[derive(Clone, Debug)]
pub struct ClassDef {
    pub name: String,
    pub flags: ClassFlags,
    pub supertypes: Vec<ClassId>,
    pub subtypes: Vec<ClassId>,
    pub methods: Vec<MethodId>,
}

#[derive(Clone, Debug)]
pub struct FixtureNode {
    pub callee: FixtureCallee,
    pub statically_bound: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FixtureCallee {
    Address(MethodId),
    MethodSel(MethodId),
    Other,
}

#[derive(Clone, Debug)]
pub struct MethodDef {
    pub owner: ClassId,
    pub name: String,
    pub link_name: String,
    pub flags: MethodFlags,
    /// `Call` nodes making up this method's graph; `None` means the method
    /// has no graph at all (external or ld-name-redirect candidate).
    pub graph: Option<Vec<FixtureNode>>,
    /// A standalone `Address` of a method entity not wrapped in a `Call`
    /// (address-taken case).
    pub address_taken: Vec<MethodId>,
    /// `VptrIsSet` nodes appearing in this method's body.
    pub constructs: Vec<ClassId>,
}

impl MethodDef {
    pub fn new(owner: ClassId, name: &str) -> Self {
        Self {
            owner,
            name: name.to_string(),
            link_name: name.to_string(),
            flags: MethodFlags::empty(),
            graph: Some(Vec::new()),
            address_taken: Vec::new(),
            constructs: Vec::new(),
        }
    }

    pub fn no_graph(mut self) -> Self {
        self.graph = None;
        self
    }

    pub fn link_name(mut self, link_name: &str) -> Self {
        self.link_name = link_name.to_string();
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.flags |= MethodFlags::ABSTRACT;
        self
    }

    pub fn final_(mut self) -> Self {
        self.flags |= MethodFlags::FINAL;
        self
    }

    pub fn calls_static(mut self, target: MethodId) -> Self {
        self.graph.get_or_insert_with(Vec::new).push(FixtureNode {
            callee: FixtureCallee::Address(target),
            statically_bound: false,
        });
        self
    }

    pub fn calls_dynamic(mut self, entity: MethodId) -> Self {
        self.graph.get_or_insert_with(Vec::new).push(FixtureNode {
            callee: FixtureCallee::MethodSel(entity),
            statically_bound: false,
        });
        self
    }

    pub fn constructs(mut self, class: ClassId) -> Self {
        self.constructs.push(class);
        self
    }
}

#[derive(Default)]
pub struct FixtureIr {
    pub classes: Vec<ClassDef>,
    pub methods: Vec<RefCell<MethodDef>>,
    /// Names and link-names live outside the `RefCell` so `method_name`/
    /// `method_link_name` can hand back a `&str` tied to `self` without
    /// borrowing through it; they never change after `add_method`.
    names: Vec<String>,
    link_names: Vec<String>,
}

impl FixtureIr {
    pub fn add_class(&mut self, class: ClassDef) -> ClassId {
        let id = ClassId(self.classes.len());
        self.classes.push(class);
        id
    }

    pub fn add_method(&mut self, method: MethodDef) -> MethodId {
        let id = MethodId(self.methods.len());
        self.classes[method.owner.0].methods.push(id);
        self.names.push(method.name.clone());
        self.link_names.push(method.link_name.clone());
        self.methods.push(RefCell::new(method));
        id
    }

    pub fn link(&mut self, super_id: ClassId, sub_id: ClassId) {
        self.classes[sub_id.0].supertypes.push(super_id);
        self.classes[super_id.0].subtypes.push(sub_id);
    }

    pub fn method(&self, id: MethodId) -> std::cell::Ref<'_, MethodDef> {
        self.methods[id.0].borrow()
    }
}

impl Ir for FixtureIr {
    type Class = ClassId;
    type Method = MethodId;
    type MethodSelSite = MethodSelSite;

    fn class_flags(&self, class: Self::Class) -> ClassFlags {
        self.classes[class.0].flags
    }

    fn class_name(&self, class: Self::Class) -> &str {
        &self.classes[class.0].name
    }

    fn class_supertypes(&self, class: Self::Class) -> &[Self::Class] {
        &self.classes[class.0].supertypes
    }

    fn class_subtypes(&self, class: Self::Class) -> &[Self::Class] {
        &self.classes[class.0].subtypes
    }

    fn class_methods(&self, class: Self::Class) -> &[Self::Method] {
        &self.classes[class.0].methods
    }

    fn class_member_by_name(&self, class: Self::Class, name: &str) -> Option<Self::Method> {
        self.classes[class.0]
            .methods
            .iter()
            .copied()
            .find(|m| self.methods[m.0].borrow().name == name)
    }

    fn method_owner(&self, method: Self::Method) -> Self::Class {
        self.methods[method.0].borrow().owner
    }

    fn method_name(&self, method: Self::Method) -> &str {
        &self.names[method.0]
    }

    fn method_link_name(&self, method: Self::Method) -> &str {
        &self.link_names[method.0]
    }

    fn method_flags(&self, method: Self::Method) -> MethodFlags {
        self.methods[method.0].borrow().flags
    }

    fn has_graph(&self, method: Self::Method) -> bool {
        self.methods[method.0].borrow().graph.is_some()
    }

    fn method_with_link_name(&self, link_name: &str) -> Option<Self::Method> {
        self.methods.iter().enumerate().find_map(|(i, m)| {
            let m = m.borrow();
            if m.graph.is_some() && m.link_name == link_name {
                Some(MethodId(i))
            } else {
                None
            }
        })
    }

    fn walk_graph(&self, method: Self::Method, visit: &mut dyn FnMut(NodeKind<Self>)) {
        let def = self.methods[method.0].borrow();
        for target in &def.address_taken {
            visit(NodeKind::Address(Some(*target)));
        }
        for class in &def.constructs {
            visit(NodeKind::VptrIsSet(*class));
        }
        if let Some(graph) = &def.graph {
            for (index, node) in graph.iter().enumerate() {
                let callee = match node.callee {
                    FixtureCallee::Address(m) => CallCallee::Address(m),
                    FixtureCallee::MethodSel(entity) => CallCallee::MethodSel {
                        entity,
                        site: MethodSelSite(method, index),
                    },
                    FixtureCallee::Other => CallCallee::Other,
                };
                visit(NodeKind::Call {
                    callee,
                    statically_bound: node.statically_bound,
                });
            }
        }
    }

    fn devirtualize_call(&mut self, site: Self::MethodSelSite, target: Self::Method) {
        let mut def = self.methods[site.0 .0].borrow_mut();
        let graph = def.graph.as_mut().expect("devirtualized call has a graph");
        let node = &mut graph[site.1];
        node.callee = FixtureCallee::Address(target);
        node.statically_bound = true;
    }
}

/// Helper collecting every `Call` node whose callee is a `MethodSel`
/// targeting `entity`, across every method's graph. Used by tests to assert
/// devirtualization rewrote (or did not rewrite) a specific site.
pub fn dyncall_sites(ir: &FixtureIr, entity: MethodId) -> Vec<MethodSelSite> {
    let mut sites = Vec::new();
    for (i, method) in ir.methods.iter().enumerate() {
        let method = method.borrow();
        if let Some(graph) = &method.graph {
            for (j, node) in graph.iter().enumerate() {
                if node.callee == FixtureCallee::MethodSel(entity) {
                    sites.push(MethodSelSite(MethodId(i), j));
                }
            }
        }
    }
    sites
}

pub fn is_statically_bound(ir: &FixtureIr, site: MethodSelSite) -> bool {
    ir.methods[site.0 .0].borrow().graph.as_ref().unwrap()[site.1].statically_bound
}
