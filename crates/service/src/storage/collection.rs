use std::{collections::HashMap, path::PathBuf, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};

use crate::errors::ServiceError;
use super::identity::{allocate_id, IdSource, DEFAULT_MAX_ATTEMPTS};
use super::json_map_store::{JsonMapStore, StoreOptions};

/// A stored entity keyed by its own string id.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Resource name used in logs, e.g. `"product"`.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// Record-level CRUD over a [`JsonMapStore`] keyed by record id.
///
/// Every write keeps `key == record.id()`.
pub struct Collection<R: Record> {
    store: Arc<JsonMapStore<String, R>>,
    ids: Arc<dyn IdSource>,
    max_id_attempts: u32,
}

impl<R: Record> Collection<R> {
    pub async fn open<P: Into<PathBuf>>(
        path: P,
        options: StoreOptions,
        ids: Arc<dyn IdSource>,
        max_id_attempts: u32,
    ) -> Result<Self, ServiceError> {
        let store = JsonMapStore::<String, R>::open(path, options).await?;
        store
            .read(|m| {
                for (key, rec) in m.iter().filter(|(k, r)| k.as_str() != r.id()) {
                    warn!(kind = R::KIND, key = %key, id = %rec.id(), "stored key does not match record id");
                }
            })
            .await;
        let max_id_attempts = if max_id_attempts == 0 { DEFAULT_MAX_ATTEMPTS } else { max_id_attempts };
        Ok(Self { store, ids, max_id_attempts })
    }

    pub fn store(&self) -> &JsonMapStore<String, R> {
        &self.store
    }

    pub async fn find_all(&self) -> Vec<R> {
        self.store.values().await
    }

    pub async fn find_one(&self, id: &str) -> Option<R> {
        self.store.read(|m| m.get(id).cloned()).await
    }

    /// Linear scan returning every record matching `pred`.
    pub async fn filter<F>(&self, pred: F) -> Vec<R>
    where
        F: Fn(&R) -> bool,
    {
        self.store.read(|m| m.values().filter(|r| pred(r)).cloned().collect()).await
    }

    pub async fn find_first<F>(&self, pred: F) -> Option<R>
    where
        F: Fn(&R) -> bool,
    {
        self.store.read(|m| m.values().find(|r| pred(r)).cloned()).await
    }

    /// Allocate a fresh id, build the record with it, insert and persist.
    pub async fn create<F>(&self, build: F) -> Result<R, ServiceError>
    where
        F: FnOnce(String) -> R,
    {
        self.create_checked(|_, id| Ok(build(id))).await
    }

    /// Like [`Self::create`] but `build` also sees the current map and may
    /// refuse the insert. Check and insert happen under the same writer lock.
    pub async fn create_checked<F>(&self, build: F) -> Result<R, ServiceError>
    where
        F: FnOnce(&HashMap<String, R>, String) -> Result<R, ServiceError>,
    {
        let ids = Arc::clone(&self.ids);
        let max = self.max_id_attempts;
        let created = self
            .store
            .update_map(|m| {
                let id = allocate_id(ids.as_ref(), |id| m.contains_key(id), max)?;
                let rec = build(&*m, id.clone())?;
                debug_assert_eq!(rec.id(), id);
                m.insert(id, rec.clone());
                Ok(Some(rec))
            })
            .await?
            .ok_or_else(|| ServiceError::Storage(format!("{} insert produced no record", R::KIND)))?;
        info!(kind = R::KIND, id = %created.id(), "record created");
        Ok(created)
    }

    /// Mutate the record in place and persist. `None` when `id` is absent.
    pub async fn update<F>(&self, id: &str, apply: F) -> Result<Option<R>, ServiceError>
    where
        F: FnOnce(&mut R),
    {
        let updated = self
            .store
            .update_map(|m| {
                Ok(m.get_mut(id).map(|rec| {
                    apply(&mut *rec);
                    rec.clone()
                }))
            })
            .await?;
        if updated.is_some() {
            info!(kind = R::KIND, id = %id, "record updated");
        }
        Ok(updated)
    }

    /// Delete and persist. `false` (and no write) when `id` is absent.
    pub async fn remove(&self, id: &str) -> Result<bool, ServiceError> {
        let existed = self.store.remove(&id.to_string()).await?;
        if existed {
            info!(kind = R::KIND, id = %id, "record removed");
        }
        Ok(existed)
    }
}
