//! Storage abstractions for service layer
//!
//! File-backed JSON map store, id allocation and the record-level CRUD layer
//! shared by the product and user stores.

pub mod json_map_store;
pub mod identity;
pub mod collection;

pub use collection::{Collection, Record};
pub use identity::{IdSource, UuidIds};
pub use json_map_store::{JsonMapStore, StoreOptions};
