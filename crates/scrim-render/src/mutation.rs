#![forbid(unsafe_code)]

//! The mutation log a render pass produces.
//!
//! Every change the reconciler applies to the presentation tree is
//! recorded as one [`Mutation`], in the exact order it was applied
//! (depth-first, left-to-right over the description tree). A pass over
//! an already-up-to-date tree produces an empty report; that emptiness
//! is the library's idempotence observable.

use crate::error::RenderError;
use crate::tree::NodeId;

/// One applied change to the presentation tree.
///
/// Creating a node subsumes its initial attributes and text; only
/// post-creation changes appear as `SetAttr`/`RemoveAttr`/`SetText`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A fresh element was created and placed under `parent` at `index`.
    CreateElement {
        node: NodeId,
        parent: NodeId,
        index: usize,
        tag: String,
    },
    /// A fresh text leaf was created and placed under `parent` at `index`.
    CreateText {
        node: NodeId,
        parent: NodeId,
        index: usize,
    },
    /// An existing text leaf's content changed.
    SetText { node: NodeId },
    /// An attribute was added or its value changed.
    SetAttr { node: NodeId, name: String },
    /// An attribute present on the node was not requested anymore.
    RemoveAttr { node: NodeId, name: String },
    /// A surviving child changed sibling position under `parent`.
    MoveChild {
        parent: NodeId,
        node: NodeId,
        to_index: usize,
    },
    /// A node and its entire subtree were destroyed.
    Remove { node: NodeId },
}

/// A subtree the reconciler refused to touch.
///
/// Recorded when a description at `parent`/`index` was malformed; the
/// presentation tree at that position is exactly what it was before the
/// pass.
#[derive(Debug)]
pub struct Skipped {
    pub parent: NodeId,
    pub index: usize,
    pub error: RenderError,
}

/// Outcome of one render pass: the ordered mutation log plus any
/// subtrees skipped as malformed.
#[derive(Debug, Default)]
pub struct Report {
    mutations: Vec<Mutation>,
    skipped: Vec<Skipped>,
}

impl Report {
    /// All applied mutations, in application order.
    #[must_use]
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Subtrees skipped as malformed during this pass.
    #[must_use]
    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    /// Number of applied mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// True when the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Count of created nodes (elements and text leaves).
    #[must_use]
    pub fn created(&self) -> usize {
        self.count(|m| {
            matches!(
                m,
                Mutation::CreateElement { .. } | Mutation::CreateText { .. }
            )
        })
    }

    /// Count of destroyed subtree roots.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.count(|m| matches!(m, Mutation::Remove { .. }))
    }

    /// Count of sibling moves.
    #[must_use]
    pub fn moved(&self) -> usize {
        self.count(|m| matches!(m, Mutation::MoveChild { .. }))
    }

    /// Count of attribute writes.
    #[must_use]
    pub fn attrs_set(&self) -> usize {
        self.count(|m| matches!(m, Mutation::SetAttr { .. }))
    }

    /// Count of attribute removals.
    #[must_use]
    pub fn attrs_removed(&self) -> usize {
        self.count(|m| matches!(m, Mutation::RemoveAttr { .. }))
    }

    /// Count of text rewrites.
    #[must_use]
    pub fn texts_set(&self) -> usize {
        self.count(|m| matches!(m, Mutation::SetText { .. }))
    }

    pub(crate) fn push(&mut self, mutation: Mutation) {
        tracing::trace!(?mutation, "apply");
        self.mutations.push(mutation);
    }

    pub(crate) fn skip(&mut self, parent: NodeId, index: usize, error: RenderError) {
        tracing::debug!(%parent, index, %error, "subtree skipped");
        self.skipped.push(Skipped {
            parent,
            index,
            error,
        });
    }

    fn count(&self, pred: impl Fn(&Mutation) -> bool) -> usize {
        self.mutations.iter().filter(|m| pred(m)).count()
    }
}
