//! CLI command implementations.

pub mod cleanup;
pub mod favorite;
pub mod fetch;
pub mod remove;
pub mod tags;
pub mod validate;
