//! Shared building blocks for the storefront workspace: wire types,
//! runtime environment checks and logging setup.

pub mod types;
pub mod utils;
pub mod env;
