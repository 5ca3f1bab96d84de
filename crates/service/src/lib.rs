//! Service layer: JSON file-backed stores for products and users.
//! - `storage` holds the generic map store, id allocation and record CRUD.
//! - `products` and `users` build the two resource stores on top of it.
//! - Not-found is `None`; storage faults are `ServiceError`.

pub mod errors;
pub mod runtime;
pub mod storage;
pub mod products;
pub mod users;
