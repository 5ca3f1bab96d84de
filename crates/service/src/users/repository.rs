use async_trait::async_trait;

use crate::errors::ServiceError;
use super::domain::{NewUser, User, UserPatch};

/// Boundary operations on users consumed by the request layer.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_all(&self) -> Vec<User>;
    async fn find_one(&self, id: &str) -> Option<User>;
    /// Insert without the duplicate-email check.
    async fn create(&self, input: NewUser) -> Result<User, ServiceError>;
    /// Insert, refusing with `Conflict` when the email is taken.
    async fn register(&self, input: NewUser) -> Result<User, ServiceError>;
    async fn update(&self, id: &str, patch: UserPatch) -> Result<Option<User>, ServiceError>;
    async fn remove(&self, id: &str) -> Result<bool, ServiceError>;
    async fn search(&self, name: Option<&str>, email: Option<&str>) -> Vec<User>;
    async fn find_by_email(&self, email: &str) -> Option<User>;
    async fn compare_password(&self, email: &str, plaintext: &str) -> Result<Option<User>, ServiceError>;
}
