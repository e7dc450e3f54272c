#![forbid(unsafe_code)]

//! Render kernel: the live presentation tree, the mutation log, and the
//! reconciling renderer.

pub mod error;
pub mod mutation;
pub mod reconcile;
pub mod tree;
