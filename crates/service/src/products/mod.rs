//! Product catalogue: domain types, the file-backed store and the
//! repository trait the HTTP layer talks to.

pub mod domain;
pub mod repository;
pub mod store;

pub use domain::{Product, ProductInput};
pub use repository::ProductRepository;
pub use store::ProductStore;
