#![forbid(unsafe_code)]

//! The live presentation tree.
//!
//! An arena of mutable presentation nodes addressed by [`NodeId`].
//! Freed slots are recycled through a free list, so a long-lived tree
//! does not grow past its high-water mark.
//!
//! # Invariants
//!
//! 1. A node is owned by its parent: destroying a node destroys its
//!    entire subtree and recycles every slot in it.
//! 2. `children` and `parent` links agree: `tree.parent(c) == Some(p)`
//!    iff `c` appears in `tree.children(p)`.
//! 3. A [`NodeId`] is only valid between its creation and the
//!    destruction of its subtree; the reconciler never hands out stale
//!    ids, but foreign ids are detected (`contains`).

use std::collections::BTreeMap;
use std::fmt;

use scrim_core::component::ComponentHandle;
use scrim_core::key::Key;
use scrim_core::props::PropValue;
use smallvec::SmallVec;

/// Tag given to mount-point container nodes.
pub const MOUNT_TAG: &str = "#mount";

/// Composition units whose expansion produced a node, outermost first.
///
/// Empty for nodes described directly by a primitive tag.
pub(crate) type OriginChain = SmallVec<[ComponentHandle; 1]>;

/// Handle to one live presentation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
enum Body {
    Element {
        tag: String,
        key: Option<Key>,
        attrs: BTreeMap<String, PropValue>,
        children: Vec<NodeId>,
    },
    Text(String),
}

struct PNode {
    parent: Option<NodeId>,
    origin: OriginChain,
    body: Body,
}

impl fmt::Debug for PNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PNode")
            .field("parent", &self.parent)
            .field(
                "origin",
                &self.origin.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("body", &self.body)
            .finish()
    }
}

/// A forest of mount-point containers and the nodes rendered under them.
#[derive(Debug, Default)]
pub struct Tree {
    slots: Vec<Option<PNode>>,
    free: Vec<u32>,
    root: Option<NodeId>,
}

impl Tree {
    /// Create a tree with one default mount point (see [`Tree::root`]).
    #[must_use]
    pub fn new() -> Self {
        let mut tree = Self::default();
        tree.root = Some(tree.create_mount());
        tree
    }

    /// The default mount point.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root.expect("Tree::new always creates the default mount")
    }

    /// Create an additional, detached mount-point container.
    ///
    /// Each mount point hosts an independent rendered tree.
    pub fn create_mount(&mut self) -> NodeId {
        self.alloc(PNode {
            parent: None,
            origin: OriginChain::new(),
            body: Body::Element {
                tag: MOUNT_TAG.to_string(),
                key: None,
                attrs: BTreeMap::new(),
                children: Vec::new(),
            },
        })
    }

    /// Whether `id` currently names a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.slots
            .get(id.0 as usize)
            .is_some_and(Option::is_some)
    }

    /// Element tag, or `None` for text leaves and dead ids.
    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.body {
            Body::Element { tag, .. } => Some(tag),
            Body::Text(_) => None,
        }
    }

    /// Text content, or `None` for elements and dead ids.
    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.body {
            Body::Text(content) => Some(content),
            Body::Element { .. } => None,
        }
    }

    /// A single attribute value.
    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&PropValue> {
        self.attrs(id)?.get(name)
    }

    /// The full attribute mapping of an element.
    #[must_use]
    pub fn attrs(&self, id: NodeId) -> Option<&BTreeMap<String, PropValue>> {
        match &self.node(id)?.body {
            Body::Element { attrs, .. } => Some(attrs),
            Body::Text(_) => None,
        }
    }

    /// Identity key recorded for a node, if any.
    #[must_use]
    pub fn key(&self, id: NodeId) -> Option<&Key> {
        match &self.node(id)?.body {
            Body::Element { key, .. } => key.as_ref(),
            Body::Text(_) => None,
        }
    }

    /// Children in sibling order; empty for text leaves and dead ids.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id).map(|n| &n.body) {
            Some(Body::Element { children, .. }) => children,
            _ => &[],
        }
    }

    /// Owning parent, `None` for mount points and dead ids.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Number of live nodes, mount points included.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    // ------------------------------------------------------------------
    // Reconciler-facing mutators
    // ------------------------------------------------------------------

    pub(crate) fn create_element(
        &mut self,
        tag: String,
        key: Option<Key>,
        origin: OriginChain,
    ) -> NodeId {
        self.alloc(PNode {
            parent: None,
            origin,
            body: Body::Element {
                tag,
                key,
                attrs: BTreeMap::new(),
                children: Vec::new(),
            },
        })
    }

    pub(crate) fn create_text(&mut self, content: String, origin: OriginChain) -> NodeId {
        self.alloc(PNode {
            parent: None,
            origin,
            body: Body::Text(content),
        })
    }

    pub(crate) fn origin(&self, id: NodeId) -> &[ComponentHandle] {
        self.node(id).map_or(&[], |n| &n.origin)
    }

    pub(crate) fn set_attr(&mut self, id: NodeId, name: String, value: PropValue) {
        if let Some(Body::Element { attrs, .. }) = self.node_mut(id).map(|n| &mut n.body) {
            attrs.insert(name, value);
        }
    }

    pub(crate) fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(Body::Element { attrs, .. }) = self.node_mut(id).map(|n| &mut n.body) {
            attrs.remove(name);
        }
    }

    pub(crate) fn set_text(&mut self, id: NodeId, content: String) {
        if let Some(node) = self.node_mut(id)
            && let Body::Text(text) = &mut node.body
        {
            *text = content;
        }
    }

    /// Replace `parent`'s child list, fixing up parent links.
    pub(crate) fn set_children(&mut self, parent: NodeId, new_children: Vec<NodeId>) {
        for &child in &new_children {
            if let Some(node) = self.node_mut(child) {
                node.parent = Some(parent);
            }
        }
        if let Some(Body::Element { children, .. }) =
            self.node_mut(parent).map(|n| &mut n.body)
        {
            *children = new_children;
        }
    }

    /// Destroy a subtree, children first, recycling every slot.
    ///
    /// The caller is responsible for dropping the reference out of the
    /// parent's child list (normally via [`Tree::set_children`]).
    pub(crate) fn free_subtree(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.children(id).to_vec();
        for child in children {
            self.free_subtree(child);
        }
        if let Some(slot) = self.slots.get_mut(id.0 as usize)
            && slot.take().is_some()
        {
            self.free.push(id.0);
        }
    }

    // ------------------------------------------------------------------

    fn node(&self, id: NodeId) -> Option<&PNode> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut PNode> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    fn alloc(&mut self, node: PNode) -> NodeId {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(node);
            NodeId(index)
        } else {
            let index = u32::try_from(self.slots.len())
                .expect("presentation tree exceeds u32::MAX nodes");
            self.slots.push(Some(node));
            NodeId(index)
        }
    }
}
