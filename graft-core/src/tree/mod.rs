//! Tree model
//!
//! The declarative tree-building API as the core sees it: opaque elements,
//! the building primitive, the small slice of the host runtime the core
//! relies on, and the deep walker used to search props and children for
//! embedded signals.

mod element;
mod host;
pub mod walker;

pub use self::element::{Element, ElementBuilder, ElementType, TreeBuilder, REF_PROP};
pub use self::host::{Component, MountedComponent, NodeRef, RerenderHandle};
pub use self::walker::{
    fill_all_signal_values, find_all_signals, remove_all_signals, remove_signals,
};
