//! Tree nodes and the tree-building primitive.
//!
//! Elements are opaque to the core: it never looks inside one except through
//! the walker, and the walker treats an element as a black box.

use std::fmt;
use std::sync::Arc;

use super::host::{Component, NodeRef};
use crate::value::{Props, Value};

/// Reserved prop carrying the instance-acquisition callback.
pub const REF_PROP: &str = "ref";

/// What an element renders as.
#[derive(Clone)]
pub enum ElementType {
    /// A primitive render-target type, such as a DOM tag.
    Host(Arc<str>),
    /// A composite type rendered by the host runtime.
    Component(Arc<dyn Component>),
}

impl ElementType {
    pub fn host(tag: &str) -> Self {
        ElementType::Host(Arc::from(tag))
    }

    pub fn component(component: Arc<dyn Component>) -> Self {
        ElementType::Component(component)
    }

    pub fn is_host(&self) -> bool {
        matches!(self, ElementType::Host(_))
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            ElementType::Host(tag) => Some(tag),
            ElementType::Component(_) => None,
        }
    }

    /// Type identity as used by reconciliation.
    pub fn same(&self, other: &ElementType) -> bool {
        match (self, other) {
            (ElementType::Host(a), ElementType::Host(b)) => a == b,
            (ElementType::Component(a), ElementType::Component(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Host(tag) => write!(f, "Host({tag})"),
            ElementType::Component(component) => write!(f, "Component({})", component.name()),
        }
    }
}

/// A node produced by the tree-building primitive.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementData>,
}

struct ElementData {
    ty: ElementType,
    props: Props,
    children: Vec<Value>,
}

impl Element {
    pub fn new(ty: ElementType, props: Props, children: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(ElementData {
                ty,
                props,
                children,
            }),
        }
    }

    pub fn ty(&self) -> &ElementType {
        &self.inner.ty
    }

    pub fn props(&self) -> &Props {
        &self.inner.props
    }

    pub fn children(&self) -> &[Value] {
        &self.inner.children
    }

    pub fn node_ref(&self) -> Option<&NodeRef> {
        match self.inner.props.get(REF_PROP) {
            Some(Value::Ref(node_ref)) => Some(node_ref),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("ty", &self.inner.ty)
            .field("props", &self.inner.props.keys().collect::<Vec<_>>())
            .field("children", &self.inner.children.len())
            .finish()
    }
}

/// The declarative tree-building primitive.
///
/// Assumed pure and synchronous.
pub trait TreeBuilder: Send + Sync {
    fn build(&self, ty: ElementType, props: Props, children: Vec<Value>) -> Element;
}

/// The plain primitive: packs its arguments into an [`Element`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementBuilder;

impl TreeBuilder for ElementBuilder {
    fn build(&self, ty: ElementType, props: Props, children: Vec<Value>) -> Element {
        Element::new(ty, props, children)
    }
}

impl<B: TreeBuilder + ?Sized> TreeBuilder for Arc<B> {
    fn build(&self, ty: ElementType, props: Props, children: Vec<Value>) -> Element {
        (**self).build(ty, props, children)
    }
}
