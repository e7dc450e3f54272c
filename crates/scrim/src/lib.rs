#![forbid(unsafe_code)]

//! Scrim public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub mod prelude {
    pub use scrim_core as core;
    pub use scrim_render as render;
    pub use scrim_runtime as runtime;

    pub use scrim_core::component::{Component, ComponentHandle, component};
    pub use scrim_core::key::Key;
    pub use scrim_core::node::{Element, Kind, Node, text};
    pub use scrim_core::props::{PropValue, Props};
    pub use scrim_render::error::RenderError;
    pub use scrim_render::mutation::{Mutation, Report};
    pub use scrim_render::reconcile::Renderer;
    pub use scrim_render::tree::{NodeId, Tree};
    pub use scrim_runtime::derived::Derived;
    pub use scrim_runtime::error::ReducerError;
    pub use scrim_runtime::store::{Store, Subscription};
}
