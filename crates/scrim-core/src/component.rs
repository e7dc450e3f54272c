#![forbid(unsafe_code)]

//! Composition units: reusable expansion rules from properties to nodes.
//!
//! A composition unit owns no mutable state. There is deliberately no
//! state-mutation entry point on the trait; state reaches a unit only
//! through the properties and children passed to [`Component::render`],
//! typically sourced from a store upstream.

use std::rc::Rc;

use crate::node::Node;
use crate::props::Props;

/// Error type composition units may fail with.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// A reusable, invocable expansion rule.
///
/// The reconciler invokes [`render`](Self::render) with the describing
/// node's properties and children and recurses into the replacement,
/// repeating until a primitive tag or text leaf is reached.
///
/// Plain functions and closures of shape `Fn(&Props, &[Node]) -> Node`
/// implement this trait via the blanket impl below.
pub trait Component {
    /// Diagnostic name, used in error reports and traces.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Expand into a replacement node description.
    fn render(&self, props: &Props, children: &[Node]) -> Result<Node, BoxError>;
}

impl<F> Component for F
where
    F: Fn(&Props, &[Node]) -> Node,
{
    fn render(&self, props: &Props, children: &[Node]) -> Result<Node, BoxError> {
        Ok(self(props, children))
    }
}

/// Shared handle to a composition unit.
///
/// Identity is pointer identity: two handles refer to the same unit iff
/// they point at the same allocation ([`Rc::ptr_eq`]). The reconciler
/// relies on this when deciding between in-place update and replacement.
pub type ComponentHandle = Rc<dyn Component>;

/// Wrap a composition unit into a shareable handle.
pub fn component<C: Component + 'static>(unit: C) -> ComponentHandle {
    Rc::new(unit)
}
