#![forbid(unsafe_code)]

//! Runtime: the reducer-driven state container and derived projections.

pub mod derived;
pub mod error;
pub mod store;
