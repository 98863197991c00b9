use std::fmt::Debug;
use std::hash::Hash;

use bitflags::bitflags;

bitflags! {
    /// Flags carried by a class type.
    #[derive(Default)]
    pub struct ClassFlags: u8 {
        const EXTERN    = 0b0001;
        const ABSTRACT  = 0b0010;
        const INTERFACE = 0b0100;
        const FINAL     = 0b1000;
    }
}

bitflags! {
    /// Flags carried by a method entity.
    #[derive(Default)]
    pub struct MethodFlags: u8 {
        const ABSTRACT = 0b01;
        const FINAL    = 0b10;
    }
}

/// Shape of the callee input of a `Call` node, already resolved through any
/// intervening `Proj`/tuple plumbing by the adapter, so analyzer code never
/// has to walk that plumbing itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallCallee<M, S> {
    /// Statically known callee, e.g. a direct `Address` node.
    Address(M),
    /// Dynamically dispatched callee selected by a `MethodSel` node. `site`
    /// identifies that node for the devirtualizer's later rewrite.
    MethodSel { entity: M, site: S },
    /// Any other shape (indirect call via function pointer, etc).
    Other,
}

/// Node kinds the analyzer and devirtualizer classify during a graph walk.
pub enum NodeKind<I: Ir + ?Sized> {
    /// A node holding a direct reference to an entity. `None` when the
    /// referenced entity is not a method (e.g. a global/field address).
    Address(Option<I::Method>),
    Call {
        callee: CallCallee<I::Method, I::MethodSelSite>,
        statically_bound: bool,
    },
    /// Marks the point an object's vtable pointer is installed.
    VptrIsSet(I::Class),
    Other,
}

impl<I: Ir + ?Sized> Clone for NodeKind<I> {
    fn clone(&self) -> Self {
        match self {
            NodeKind::Address(m) => NodeKind::Address(*m),
            NodeKind::Call {
                callee,
                statically_bound,
            } => NodeKind::Call {
                callee: *callee,
                statically_bound: *statically_bound,
            },
            NodeKind::VptrIsSet(c) => NodeKind::VptrIsSet(*c),
            NodeKind::Other => NodeKind::Other,
        }
    }
}
impl<I: Ir + ?Sized> Copy for NodeKind<I> {}

/// Host-supplied contract over the compiler IR this analysis runs on.
///
/// Implemented by the embedding compiler; `crate::fixture` provides a small
/// in-memory implementation used by this crate's own tests.
pub trait Ir {
    /// Opaque handle to a class type. Stable for the lifetime of the
    /// analysis so it can key `BTreeMap`/`BTreeSet` directly.
    type Class: Copy + Eq + Ord + Hash + Debug;
    /// Opaque handle to a method entity.
    type Method: Copy + Eq + Ord + Hash + Debug;
    /// Opaque handle identifying a `MethodSel` node within some graph, used
    /// only by the devirtualizer to target a rewrite.
    type MethodSelSite: Copy + Debug;

    fn class_flags(&self, class: Self::Class) -> ClassFlags;
    fn class_name(&self, class: Self::Class) -> &str;
    fn class_supertypes(&self, class: Self::Class) -> &[Self::Class];
    fn class_subtypes(&self, class: Self::Class) -> &[Self::Class];
    /// Methods declared directly on `class` (not inherited ones).
    fn class_methods(&self, class: Self::Class) -> &[Self::Method];
    /// Member lookup by name identifier; signature is assumed mangled into
    /// the name so this alone determines overriding. Equivalent to scanning
    /// `class_methods` for a matching `method_name`, exposed separately
    /// because real IR adapters typically index this.
    fn class_member_by_name(&self, class: Self::Class, name: &str) -> Option<Self::Method>;

    fn method_owner(&self, method: Self::Method) -> Self::Class;
    fn method_name(&self, method: Self::Method) -> &str;
    fn method_link_name(&self, method: Self::Method) -> &str;
    fn method_flags(&self, method: Self::Method) -> MethodFlags;
    /// Whether this method entity has an associated graph to walk.
    fn has_graph(&self, method: Self::Method) -> bool;
    /// Looks up a method entity with a graph by its link-name. Used to
    /// resolve the ld-name redirect case for a graph-less entity whose name
    /// and link-name differ.
    fn method_with_link_name(&self, link_name: &str) -> Option<Self::Method>;

    /// Walks every node of `method`'s graph, invoking `visit` once per node.
    /// No-op if `method` has no graph.
    fn walk_graph(&self, method: Self::Method, visit: &mut dyn FnMut(NodeKind<Self>));

    /// Rewrites the `MethodSel` site identified by `site` into an `Address`
    /// referencing `target`, making the call statically bound.
    fn devirtualize_call(&mut self, site: Self::MethodSelSite, target: Self::Method);
}

impl<I: Ir + ?Sized> Debug for NodeKind<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Address(m) => f.debug_tuple("Address").field(m).finish(),
            NodeKind::Call {
                callee,
                statically_bound,
            } => f
                .debug_struct("Call")
                .field("callee", callee)
                .field("statically_bound", statically_bound)
                .finish(),
            NodeKind::VptrIsSet(c) => f.debug_tuple("VptrIsSet").field(c).finish(),
            NodeKind::Other => write!(f, "Other"),
        }
    }
}
