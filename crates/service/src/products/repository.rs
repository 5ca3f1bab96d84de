use async_trait::async_trait;

use crate::errors::ServiceError;
use super::domain::{Product, ProductInput};

/// Boundary operations on products consumed by the request layer.
/// Absent ids are `None`/`false`; only storage faults are errors.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_all(&self) -> Vec<Product>;
    async fn find_one(&self, id: &str) -> Option<Product>;
    async fn create(&self, input: ProductInput) -> Result<Product, ServiceError>;
    async fn update(&self, id: &str, input: ProductInput) -> Result<Option<Product>, ServiceError>;
    async fn remove(&self, id: &str) -> Result<bool, ServiceError>;
}
