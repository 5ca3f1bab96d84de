use std::{path::PathBuf, sync::Arc};

use crate::errors::ServiceError;
use crate::storage::{Collection, IdSource, StoreOptions, UuidIds};
use super::domain::{Product, ProductInput};
use super::repository::ProductRepository;

/// File-backed product store (`products.json`).
pub struct ProductStore {
    records: Collection<Product>,
}

impl ProductStore {
    /// Open the store at `path` with random UUID ids.
    ///
    /// # Examples
    /// ```
    /// use service::products::{ProductInput, ProductStore};
    /// use service::storage::StoreOptions;
    /// let path = std::env::temp_dir().join(format!("doc_products_{}.json", uuid::Uuid::new_v4()));
    /// let store = tokio_test::block_on(ProductStore::open(&path, StoreOptions::default(), 16)).unwrap();
    /// let pen: ProductInput = serde_json::from_str(r#"{"name":"Pen","price":1,"quantity":100,"image":"pen.png"}"#).unwrap();
    /// let created = tokio_test::block_on(store.create(pen)).unwrap();
    /// assert_eq!(tokio_test::block_on(store.find_one(&created.id)), Some(created));
    /// ```
    pub async fn open<P: Into<PathBuf>>(path: P, options: StoreOptions, max_id_attempts: u32) -> Result<Arc<Self>, ServiceError> {
        Self::open_with_ids(path, options, Arc::new(UuidIds), max_id_attempts).await
    }

    pub async fn open_with_ids<P: Into<PathBuf>>(
        path: P,
        options: StoreOptions,
        ids: Arc<dyn IdSource>,
        max_id_attempts: u32,
    ) -> Result<Arc<Self>, ServiceError> {
        let records = Collection::open(path, options, ids, max_id_attempts).await?;
        Ok(Arc::new(Self { records }))
    }

    pub fn load_fault(&self) -> Option<&str> {
        self.records.store().load_fault()
    }

    pub fn save_count(&self) -> u64 {
        self.records.store().save_count()
    }

    pub async fn find_all(&self) -> Vec<Product> {
        self.records.find_all().await
    }

    pub async fn find_one(&self, id: &str) -> Option<Product> {
        self.records.find_one(id).await
    }

    pub async fn create(&self, input: ProductInput) -> Result<Product, ServiceError> {
        self.records.create(|id| input.into_product(id)).await
    }

    /// Replace every non-id attribute with `input`.
    pub async fn update(&self, id: &str, input: ProductInput) -> Result<Option<Product>, ServiceError> {
        self.records
            .update(id, |rec| *rec = input.into_product(rec.id.clone()))
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<bool, ServiceError> {
        self.records.remove(id).await
    }
}

#[async_trait::async_trait]
impl ProductRepository for ProductStore {
    async fn find_all(&self) -> Vec<Product> { self.find_all().await }
    async fn find_one(&self, id: &str) -> Option<Product> { self.find_one(id).await }
    async fn create(&self, input: ProductInput) -> Result<Product, ServiceError> { self.create(input).await }
    async fn update(&self, id: &str, input: ProductInput) -> Result<Option<Product>, ServiceError> { self.update(id, input).await }
    async fn remove(&self, id: &str) -> Result<bool, ServiceError> { self.remove(id).await }
}
