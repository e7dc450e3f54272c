#![forbid(unsafe_code)]

//! The reconciler: minimal-mutation updates from description trees.
//!
//! [`Renderer::render`] walks the previous shape (held by the live tree
//! itself) and the next description together, applying only the changes
//! needed to make the tree match the description. Mutations apply in a
//! fixed depth-first, left-to-right order: within one sibling pass,
//! unmatched old children are removed first (children before parents),
//! then each new child is patched, created, or moved in order.
//!
//! # Invariants
//!
//! 1. Re-rendering an equal description yields an empty report.
//! 2. A node is reused in place only when its full composition origin
//!    chain and resolved kind both match; otherwise it is destroyed and
//!    rebuilt, never partially reused.
//! 3. Keyed siblings keep their identity across reorders: matched nodes
//!    move, they are not recreated.
//! 4. A malformed subtree is skipped without touching the tree at its
//!    position; siblings still reconcile, and the skip is reported.
//! 5. Fatal failures (a composition unit erroring, expansion depth
//!    exceeded) propagate immediately; mutations applied before the
//!    failure stay in effect. There is no rollback.

use std::borrow::Cow;
use std::rc::Rc;

use ahash::AHashMap;
use scrim_core::component::ComponentHandle;
use scrim_core::key::Key;
use scrim_core::node::{Element, Kind, Node};
use scrim_core::props::PropValue;

use crate::error::RenderError;
use crate::mutation::{Mutation, Report};
use crate::tree::{NodeId, OriginChain, Tree};

/// Default cap on how many composition units may expand in sequence at
/// one tree position before the render fails.
pub const DEFAULT_EXPANSION_LIMIT: usize = 64;

/// A fatal failure in flight, carrying the node (if any) that must stay
/// linked at the failing position so ancestors can repair their child
/// lists before propagating.
struct Fatal {
    error: RenderError,
    survivor: Option<NodeId>,
}

/// The reconciling renderer.
///
/// Owns no cross-call state; the last-rendered shape per mount point
/// lives in the presentation tree (tags, attributes, keys, and origin
/// chains). Concurrent renders into the same tree are ruled out by the
/// `&mut Tree` borrow.
#[derive(Debug, Clone)]
pub struct Renderer {
    expansion_limit: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            expansion_limit: DEFAULT_EXPANSION_LIMIT,
        }
    }

    /// Override the composition expansion depth cap.
    #[must_use]
    pub fn with_expansion_limit(mut self, limit: usize) -> Self {
        self.expansion_limit = limit;
        self
    }

    /// Reconcile the tree under `mount` to the shape implied by `desc`.
    ///
    /// Returns the mutation log for the pass. Malformed subtrees are
    /// skipped and surfaced in the report; composition failures abort
    /// the pass with already-applied mutations left in effect.
    pub fn render(
        &self,
        tree: &mut Tree,
        mount: NodeId,
        desc: &Node,
    ) -> Result<Report, RenderError> {
        if tree.tag(mount).is_none() {
            return Err(RenderError::UnknownNode { id: mount });
        }
        let mut report = Report::default();
        self.reconcile_children(tree, mount, std::slice::from_ref(desc), &mut report)?;
        tracing::debug!(
            %mount,
            mutations = report.len(),
            skipped = report.skipped().len(),
            "render pass complete"
        );
        Ok(report)
    }

    /// Destroy everything rendered under `mount`.
    pub fn unmount(&self, tree: &mut Tree, mount: NodeId) -> Result<Report, RenderError> {
        if tree.tag(mount).is_none() {
            return Err(RenderError::UnknownNode { id: mount });
        }
        let mut report = Report::default();
        self.reconcile_children(tree, mount, &[], &mut report)?;
        tracing::debug!(%mount, removed = report.removed(), "unmounted");
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Sibling reconciliation
    // ------------------------------------------------------------------

    /// Reconcile `parent`'s children to `new_children`.
    ///
    /// Matching: explicit keys first (through a key → old-position map
    /// built once per call), then positional identity among the unkeyed.
    /// Unmatched old children are destroyed before any new child is
    /// placed; matched keyed children that change relative order emit
    /// moves under the rising-watermark rule.
    fn reconcile_children(
        &self,
        tree: &mut Tree,
        parent: NodeId,
        new_children: &[Node],
        report: &mut Report,
    ) -> Result<(), RenderError> {
        let old_ids: Vec<NodeId> = tree.children(parent).to_vec();
        let old_keys: Vec<Option<Key>> =
            old_ids.iter().map(|&id| tree.key(id).cloned()).collect();

        let mut by_key: AHashMap<&Key, usize> = AHashMap::with_capacity(old_ids.len());
        for (pos, key) in old_keys.iter().enumerate() {
            if let Some(key) = key {
                use std::collections::hash_map::Entry;
                match by_key.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(pos);
                    }
                    Entry::Occupied(_) => {
                        tracing::warn!(%key, %parent, "duplicate key among siblings, keeping the first");
                    }
                }
            }
        }

        // Match pass: claim old positions for each new child.
        let mut claimed = vec![false; old_ids.len()];
        let mut matches: Vec<Option<usize>> = Vec::with_capacity(new_children.len());
        let mut next_positional = 0usize;
        for new in new_children {
            let slot = match new.key() {
                Some(key) => by_key.remove(key),
                None => {
                    while next_positional < old_ids.len()
                        && old_keys[next_positional].is_some()
                    {
                        next_positional += 1;
                    }
                    (next_positional < old_ids.len()).then(|| {
                        let pos = next_positional;
                        next_positional += 1;
                        pos
                    })
                }
            };
            if let Some(pos) = slot {
                claimed[pos] = true;
            }
            matches.push(slot);
        }

        // Unmatched old children go first, children before parents.
        for (pos, &id) in old_ids.iter().enumerate() {
            if !claimed[pos] {
                self.destroy(tree, id, report);
            }
        }

        // Placement pass, left to right.
        let mut placed: Vec<NodeId> = Vec::with_capacity(new_children.len());
        let mut last_pos = 0usize;
        for (index, new) in new_children.iter().enumerate() {
            let outcome = match matches[index] {
                Some(pos) => {
                    self.reconcile_node(tree, old_ids[pos], new, parent, placed.len(), report)
                }
                None => self.create_node(tree, parent, placed.len(), new, report),
            };
            match outcome {
                Ok(id) => {
                    if let Some(pos) = matches[index]
                        && id == old_ids[pos]
                    {
                        if pos < last_pos {
                            report.push(Mutation::MoveChild {
                                parent,
                                node: id,
                                to_index: placed.len(),
                            });
                        } else {
                            last_pos = pos;
                        }
                    }
                    placed.push(id);
                }
                Err(fatal) if fatal.error.is_contained() => {
                    report.skip(parent, index, fatal.error);
                    if let Some(id) = fatal.survivor {
                        // The old subtree stays, untouched, at this position.
                        if let Some(pos) = matches[index] {
                            if pos < last_pos {
                                report.push(Mutation::MoveChild {
                                    parent,
                                    node: id,
                                    to_index: placed.len(),
                                });
                            } else {
                                last_pos = pos;
                            }
                        }
                        placed.push(id);
                    }
                }
                Err(fatal) => {
                    // Keep everything that still exists linked, then bail.
                    if let Some(id) = fatal.survivor {
                        placed.push(id);
                    }
                    for later in matches.iter().skip(index + 1) {
                        if let Some(pos) = later {
                            placed.push(old_ids[*pos]);
                        }
                    }
                    tree.set_children(parent, placed);
                    return Err(fatal.error);
                }
            }
        }
        tree.set_children(parent, placed);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Per-node reconciliation
    // ------------------------------------------------------------------

    /// Reconcile one matched (old node, new description) pair. Returns
    /// the id now occupying the position: the old id when updated in
    /// place, a fresh id when replaced.
    fn reconcile_node(
        &self,
        tree: &mut Tree,
        old_id: NodeId,
        new: &Node,
        parent: NodeId,
        index: usize,
        report: &mut Report,
    ) -> Result<NodeId, Fatal> {
        let (origin, resolved) = match self.expand(new) {
            Ok(expanded) => expanded,
            Err(error) => {
                return Err(Fatal {
                    error,
                    survivor: Some(old_id),
                });
            }
        };
        let same_origin = origins_match(tree.origin(old_id), &origin);

        match resolved.as_ref() {
            Node::Text(content) => {
                if same_origin && tree.text(old_id).is_some() {
                    if tree.text(old_id) != Some(content.as_str()) {
                        tree.set_text(old_id, content.clone());
                        report.push(Mutation::SetText { node: old_id });
                    }
                    Ok(old_id)
                } else {
                    self.destroy(tree, old_id, report);
                    self.materialize(
                        tree,
                        parent,
                        index,
                        origin,
                        resolved.as_ref(),
                        new.key().cloned(),
                        report,
                    )
                }
            }
            Node::Element(element) => {
                let same_tag = matches!(
                    (element.kind(), tree.tag(old_id)),
                    (Kind::Tag(next), Some(prev)) if next.as_str() == prev
                );
                if same_origin && same_tag {
                    match self.patch_element(tree, old_id, element, report) {
                        Ok(()) => Ok(old_id),
                        Err(error) => Err(Fatal {
                            error,
                            survivor: Some(old_id),
                        }),
                    }
                } else {
                    self.destroy(tree, old_id, report);
                    self.materialize(
                        tree,
                        parent,
                        index,
                        origin,
                        resolved.as_ref(),
                        new.key().cloned(),
                        report,
                    )
                }
            }
        }
    }

    /// Update a same-kind element in place: diff attributes key-by-key
    /// (sorted merge walk, so application order is deterministic), then
    /// reconcile children.
    fn patch_element(
        &self,
        tree: &mut Tree,
        id: NodeId,
        element: &Element,
        report: &mut Report,
    ) -> Result<(), RenderError> {
        // New value means set, `None` means removal.
        let mut attr_ops: Vec<(String, Option<PropValue>)> = Vec::new();
        {
            let attrs = tree
                .attrs(id)
                .expect("patch target is always a live element");
            let mut old_iter = attrs.iter().peekable();
            let mut new_iter = element.props().iter().peekable();
            loop {
                match (old_iter.peek(), new_iter.peek()) {
                    (None, None) => break,
                    (Some((name, _)), None) => {
                        attr_ops.push(((*name).clone(), None));
                        old_iter.next();
                    }
                    (None, Some((name, value))) => {
                        attr_ops.push(((*name).clone(), Some((*value).clone())));
                        new_iter.next();
                    }
                    (Some((old_name, old_value)), Some((new_name, new_value))) => {
                        match old_name.cmp(new_name) {
                            std::cmp::Ordering::Less => {
                                attr_ops.push(((*old_name).clone(), None));
                                old_iter.next();
                            }
                            std::cmp::Ordering::Greater => {
                                attr_ops.push(((*new_name).clone(), Some((*new_value).clone())));
                                new_iter.next();
                            }
                            std::cmp::Ordering::Equal => {
                                if old_value != new_value {
                                    attr_ops.push((
                                        (*new_name).clone(),
                                        Some((*new_value).clone()),
                                    ));
                                }
                                old_iter.next();
                                new_iter.next();
                            }
                        }
                    }
                }
            }
        }
        for (name, op) in attr_ops {
            match op {
                Some(value) => {
                    tree.set_attr(id, name.clone(), value);
                    report.push(Mutation::SetAttr { node: id, name });
                }
                None => {
                    tree.remove_attr(id, &name);
                    report.push(Mutation::RemoveAttr { node: id, name });
                }
            }
        }
        self.reconcile_children(tree, id, element.child_nodes(), report)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Expand and build a fresh subtree for `desc`.
    fn create_node(
        &self,
        tree: &mut Tree,
        parent: NodeId,
        index: usize,
        desc: &Node,
        report: &mut Report,
    ) -> Result<NodeId, Fatal> {
        let (origin, resolved) = match self.expand(desc) {
            Ok(expanded) => expanded,
            Err(error) => {
                return Err(Fatal {
                    error,
                    survivor: None,
                });
            }
        };
        self.materialize(
            tree,
            parent,
            index,
            origin,
            resolved.as_ref(),
            desc.key().cloned(),
            report,
        )
    }

    /// Build the presentation subtree for an already-expanded node.
    ///
    /// Initial attributes are part of the creation, not separate
    /// mutations. A fatal failure inside a child leaves the partial
    /// subtree linked (no rollback) and propagates with this node as
    /// the survivor.
    fn materialize(
        &self,
        tree: &mut Tree,
        parent: NodeId,
        index: usize,
        origin: OriginChain,
        resolved: &Node,
        key: Option<Key>,
        report: &mut Report,
    ) -> Result<NodeId, Fatal> {
        match resolved {
            Node::Text(content) => {
                let id = tree.create_text(content.clone(), origin);
                report.push(Mutation::CreateText {
                    node: id,
                    parent,
                    index,
                });
                Ok(id)
            }
            Node::Element(element) => {
                let Kind::Tag(tag) = element.kind() else {
                    unreachable!("expand always resolves to a primitive tag or text");
                };
                let id = tree.create_element(tag.clone(), key, origin);
                report.push(Mutation::CreateElement {
                    node: id,
                    parent,
                    index,
                    tag: tag.clone(),
                });
                for (name, value) in element.props() {
                    tree.set_attr(id, name.clone(), value.clone());
                }
                let mut built: Vec<NodeId> = Vec::with_capacity(element.child_nodes().len());
                for (child_index, child) in element.child_nodes().iter().enumerate() {
                    match self.create_node(tree, id, built.len(), child, report) {
                        Ok(child_id) => built.push(child_id),
                        Err(fatal) if fatal.error.is_contained() => {
                            report.skip(id, child_index, fatal.error);
                        }
                        Err(fatal) => {
                            if let Some(child_id) = fatal.survivor {
                                built.push(child_id);
                            }
                            tree.set_children(id, built);
                            return Err(Fatal {
                                error: fatal.error,
                                survivor: Some(id),
                            });
                        }
                    }
                }
                tree.set_children(id, built);
                Ok(id)
            }
        }
    }

    // ------------------------------------------------------------------
    // Expansion
    // ------------------------------------------------------------------

    /// Resolve a description to a primitive tag or text leaf, invoking
    /// composition units as encountered and accumulating their
    /// identities outermost-first.
    fn expand<'a>(
        &self,
        desc: &'a Node,
    ) -> Result<(OriginChain, Cow<'a, Node>), RenderError> {
        let mut chain = OriginChain::new();
        let mut current: Cow<'a, Node> = Cow::Borrowed(desc);
        loop {
            let expanded: Option<Node> = match current.as_ref() {
                Node::Text(_) => None,
                Node::Element(element) => match element.kind() {
                    Kind::Tag(tag) => {
                        if tag.trim().is_empty() {
                            return Err(RenderError::MalformedNode { tag: tag.clone() });
                        }
                        None
                    }
                    Kind::Component(unit) => {
                        if chain.len() >= self.expansion_limit {
                            return Err(RenderError::ExpansionDepthExceeded {
                                unit: unit.name().to_string(),
                                limit: self.expansion_limit,
                            });
                        }
                        chain.push(Rc::clone(unit));
                        let replacement = unit
                            .render(element.props(), element.child_nodes())
                            .map_err(|source| RenderError::Composition {
                                unit: unit.name().to_string(),
                                source,
                            })?;
                        Some(replacement)
                    }
                },
            };
            match expanded {
                Some(next) => current = Cow::Owned(next),
                None => return Ok((chain, current)),
            }
        }
    }

    fn destroy(&self, tree: &mut Tree, id: NodeId, report: &mut Report) {
        report.push(Mutation::Remove { node: id });
        tree.free_subtree(id);
    }
}

fn origins_match(old: &[ComponentHandle], new: &[ComponentHandle]) -> bool {
    old.len() == new.len()
        && old
            .iter()
            .zip(new)
            .all(|(a, b)| Rc::ptr_eq(a, b))
}
