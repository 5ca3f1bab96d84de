use std::{
    collections::HashMap,
    hash::Hash,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
};
use tokio::{fs, sync::RwLock};
use tracing::{debug, error, warn};

use crate::errors::ServiceError;

/// How a store reads and writes its backing file.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Fail `open` on an unreadable/unparsable file instead of starting empty.
    pub strict_load: bool,
    /// Write a sibling temp file, fsync it, then rename over the target.
    pub atomic_writes: bool,
    pub pretty_json: bool,
}

/// Read the whole map from `path`.
///
/// A missing file is created (with its parent directory) holding `{}` and an
/// empty map is returned. Any other I/O or parse failure is a storage fault.
pub async fn load_all<K, V>(path: &Path) -> Result<HashMap<K, V>, ServiceError>
where
    K: Eq + Hash + serde::de::DeserializeOwned,
    V: serde::de::DeserializeOwned,
{
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| ServiceError::storage(path, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "backing file not found; creating an empty one");
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).await.map_err(|e| ServiceError::storage(parent, e))?;
            }
            fs::write(path, b"{}").await.map_err(|e| ServiceError::storage(path, e))?;
            Ok(HashMap::new())
        }
        Err(e) => Err(ServiceError::storage(path, e)),
    }
}

/// Serialize the whole map and overwrite `path` with it.
pub async fn save_all<K, V>(path: &Path, map: &HashMap<K, V>, options: StoreOptions) -> Result<(), ServiceError>
where
    K: Eq + Hash + serde::Serialize,
    V: serde::Serialize,
{
    let data = if options.pretty_json {
        serde_json::to_vec_pretty(map)
    } else {
        serde_json::to_vec(map)
    }
    .map_err(|e| ServiceError::storage(path, e))?;

    if !options.atomic_writes {
        return fs::write(path, data).await.map_err(|e| ServiceError::storage(path, e));
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let written = write_synced_then_rename(&tmp, path, &data).await;
    if written.is_err() {
        // never leave a half-written sibling behind
        let _ = fs::remove_file(&tmp).await;
    }
    written
}

async fn write_synced_then_rename(tmp: &Path, path: &Path, data: &[u8]) -> Result<(), ServiceError> {
    fs::write(tmp, data).await.map_err(|e| ServiceError::storage(tmp, e))?;
    fs::OpenOptions::new()
        .write(true)
        .open(tmp)
        .await
        .map_err(|e| ServiceError::storage(tmp, e))?
        .sync_all()
        .await
        .map_err(|e| ServiceError::storage(tmp, e))?;
    fs::rename(tmp, path).await.map_err(|e| ServiceError::storage(path, e))
}

/// Generic JSON file-backed key-value map store.
///
/// Holds a `HashMap<K, V>` in memory and rewrites the whole JSON file after
/// every mutation. Mutations keep the writer lock until the file write
/// finishes, so two overwrites never interleave. A failed write is reported
/// but the in-memory change stays applied.
pub struct JsonMapStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
    file_path: PathBuf,
    options: StoreOptions,
    load_fault: Option<String>,
    saves: AtomicU64,
}

impl<K, V> JsonMapStore<K, V>
where
    K: Eq + Hash + serde::Serialize + serde::de::DeserializeOwned + Clone,
    V: serde::Serialize + serde::de::DeserializeOwned + Clone,
{
    /// Open the store at `path`, creating the file with an empty map if missing.
    ///
    /// With `strict_load` a load fault is returned. Otherwise the store starts
    /// empty and the fault stays readable through [`Self::load_fault`].
    pub async fn open<P: Into<PathBuf>>(path: P, options: StoreOptions) -> Result<Arc<Self>, ServiceError> {
        let file_path = path.into();
        let (map, load_fault) = match load_all(&file_path).await {
            Ok(map) => (map, None),
            Err(e) if options.strict_load => {
                error!(path = %file_path.display(), error = %e, "failed to load backing file");
                return Err(e);
            }
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "failed to load backing file; starting empty");
                (HashMap::new(), Some(e.to_string()))
            }
        };
        debug!(path = %file_path.display(), entries = map.len(), "store loaded");

        Ok(Arc::new(Self {
            inner: RwLock::new(map),
            file_path,
            options,
            load_fault,
            saves: AtomicU64::new(0),
        }))
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// The fault swallowed by a lenient `open`, if any.
    pub fn load_fault(&self) -> Option<&str> {
        self.load_fault.as_deref()
    }

    /// Number of successful file writes since the store was opened.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    async fn save(&self, map: &HashMap<K, V>) -> Result<(), ServiceError> {
        match save_all(&self.file_path, map, self.options).await {
            Ok(()) => {
                self.saves.fetch_add(1, Ordering::Relaxed);
                debug!(path = %self.file_path.display(), entries = map.len(), "store saved");
                Ok(())
            }
            Err(e) => {
                error!(path = %self.file_path.display(), error = %e, "failed to save store; memory and disk now differ");
                Err(e)
            }
        }
    }

    /// List all values.
    pub async fn values(&self) -> Vec<V> {
        let map = self.inner.read().await;
        map.values().cloned().collect()
    }

    /// Get value by key.
    pub async fn get(&self, key: &K) -> Option<V> {
        let map = self.inner.read().await;
        map.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Run a read-only closure against the map.
    pub async fn read<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&HashMap<K, V>) -> T,
    {
        let map = self.inner.read().await;
        f(&*map)
    }

    /// Insert or replace a value by key and persist.
    pub async fn insert(&self, key: K, value: V) -> Result<(), ServiceError> {
        self.update_map(|m| {
            m.insert(key, value);
            Ok(Some(()))
        })
        .await
        .map(|_| ())
    }

    /// Remove a key; persists only if it existed. Returns whether it existed.
    pub async fn remove(&self, key: &K) -> Result<bool, ServiceError> {
        let removed = self.update_map(|m| Ok(m.remove(key).map(|_| ()))).await?;
        Ok(removed.is_some())
    }

    /// Apply a mutation to the underlying map and persist it.
    ///
    /// The closure returns `Ok(None)` to signal "nothing changed", in which
    /// case the file is left alone. An `Err` from the closure aborts before
    /// any write.
    pub async fn update_map<F, T>(&self, f: F) -> Result<Option<T>, ServiceError>
    where
        F: FnOnce(&mut HashMap<K, V>) -> Result<Option<T>, ServiceError>,
    {
        let mut map = self.inner.write().await;
        let Some(out) = f(&mut *map)? else {
            return Ok(None);
        };
        self.save(&map).await?;
        Ok(Some(out))
    }
}
