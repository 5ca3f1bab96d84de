//! User accounts: domain types, password hashing, the file-backed store and
//! the repository trait the HTTP layer talks to.

pub mod credentials;
pub mod domain;
pub mod repository;
pub mod store;

pub use credentials::CredentialHasher;
pub use domain::{LoginInput, NewUser, PublicUser, User, UserPatch};
pub use repository::UserRepository;
pub use store::UserStore;
