//! CLI command implementations.

pub mod engines;
pub mod render;
pub mod response;
