#![forbid(unsafe_code)]

//! Node descriptions: the immutable tree value the reconciler consumes.
//!
//! A description is pure data. Construction normalizes children (text
//! leaves from strings and numbers, one level of sequence flattening via
//! [`Element::children`]) and hoists a `"key"` property into the
//! element's key. Nothing here validates tags; an empty tag surfaces at
//! reconciliation time, not construction time.

use std::fmt;
use std::rc::Rc;

use crate::component::ComponentHandle;
use crate::key::Key;
use crate::props::{PropValue, Props};

/// What an element represents: a primitive tag or a composition unit.
///
/// Resolved by a single branch during reconciliation.
#[derive(Clone)]
pub enum Kind {
    /// A primitive presentation-tree element tag.
    Tag(String),
    /// A composition unit that expands into further descriptions.
    Component(ComponentHandle),
}

impl Kind {
    /// Whether two kinds denote the same renderable.
    ///
    /// Tags compare by name; composition units by pointer identity.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Tag(a), Self::Tag(b)) => a == b,
            (Self::Component(a), Self::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => f.debug_tuple("Tag").field(tag).finish(),
            Self::Component(unit) => f.debug_tuple("Component").field(&unit.name()).finish(),
        }
    }
}

/// One node in a description tree: an element or a text leaf.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Element(_) => None,
        }
    }

    /// Key of the node, if it is a keyed element.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.as_element().and_then(Element::key)
    }

    /// Kind of the node, if it is an element.
    #[must_use]
    pub fn kind(&self) -> Option<&Kind> {
        self.as_element().map(Element::kind)
    }
}

/// Build a text leaf.
#[must_use]
pub fn text(content: impl Into<String>) -> Node {
    Node::Text(content.into())
}

/// An element description under construction or finished.
///
/// `Element` doubles as its own builder: consuming methods add
/// properties and children, and the finished value converts into
/// [`Node`] via `From`.
#[derive(Debug, Clone)]
pub struct Element {
    kind: Kind,
    key: Option<Key>,
    props: Props,
    children: Vec<Node>,
}

impl Element {
    /// Start an element with a primitive tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            kind: Kind::Tag(tag.into()),
            key: None,
            props: Props::new(),
            children: Vec::new(),
        }
    }

    /// Start an element backed by a composition unit.
    #[must_use]
    pub fn component(unit: ComponentHandle) -> Self {
        Self {
            kind: Kind::Component(unit),
            key: None,
            props: Props::new(),
            children: Vec::new(),
        }
    }

    /// Set a property.
    ///
    /// A `"key"` property is hoisted into the element's key and does not
    /// appear in the applied property mapping.
    #[must_use]
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == "key" {
            self.key = Some(Key::from_prop(&value));
        } else {
            self.props.insert(name, value);
        }
        self
    }

    /// Set the identity key directly.
    #[must_use]
    pub fn keyed(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append one child. Strings and numbers become text leaves.
    #[must_use]
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append a sequence of children, flattened exactly one level.
    #[must_use]
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    #[must_use]
    pub fn props(&self) -> &Props {
        &self.props
    }

    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    #[must_use]
    pub fn child_nodes(&self) -> &[Node] {
        &self.children
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<&str> for Node {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Node {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for Node {
    fn from(v: i64) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<i32> for Node {
    fn from(v: i32) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<f64> for Node {
    fn from(v: f64) -> Self {
        Self::Text(v.to_string())
    }
}
