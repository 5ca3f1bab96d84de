use std::{path::PathBuf, sync::Arc};

use tracing::{debug, info, instrument};

use crate::errors::ServiceError;
use crate::storage::{Collection, IdSource, StoreOptions, UuidIds};
use super::credentials::CredentialHasher;
use super::domain::{NewUser, User, UserPatch};
use super::repository::UserRepository;

/// File-backed user store (`users.json`) with password hashing.
pub struct UserStore {
    records: Collection<User>,
    hasher: CredentialHasher,
}

impl UserStore {
    pub async fn open<P: Into<PathBuf>>(
        path: P,
        options: StoreOptions,
        max_id_attempts: u32,
        hasher: CredentialHasher,
    ) -> Result<Arc<Self>, ServiceError> {
        Self::open_with_ids(path, options, Arc::new(UuidIds), max_id_attempts, hasher).await
    }

    pub async fn open_with_ids<P: Into<PathBuf>>(
        path: P,
        options: StoreOptions,
        ids: Arc<dyn IdSource>,
        max_id_attempts: u32,
        hasher: CredentialHasher,
    ) -> Result<Arc<Self>, ServiceError> {
        let records = Collection::open(path, options, ids, max_id_attempts).await?;
        Ok(Arc::new(Self { records, hasher }))
    }

    pub fn load_fault(&self) -> Option<&str> {
        self.records.store().load_fault()
    }

    pub async fn find_all(&self) -> Vec<User> {
        self.records.find_all().await
    }

    pub async fn find_one(&self, id: &str) -> Option<User> {
        self.records.find_one(id).await
    }

    /// Hash the password and insert. Does not check for a duplicate email.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: NewUser) -> Result<User, ServiceError> {
        let password = self.hasher.hash(&input.password)?;
        self.records
            .create(|id| User { id, username: input.username, email: input.email, password })
            .await
    }

    /// Like [`Self::create`] but refuses a taken email. The email check and the
    /// insert share one writer lock.
    ///
    /// # Examples
    /// ```
    /// use service::users::{CredentialHasher, NewUser, UserStore};
    /// use service::storage::StoreOptions;
    /// let path = std::env::temp_dir().join(format!("doc_users_{}.json", uuid::Uuid::new_v4()));
    /// let hasher = CredentialHasher::new(64, 1, 1).unwrap();
    /// let store = tokio_test::block_on(UserStore::open(&path, StoreOptions::default(), 16, hasher)).unwrap();
    /// let alice = NewUser { username: "alice".into(), email: "a@x.com".into(), password: "secret".into() };
    /// let user = tokio_test::block_on(store.register(alice.clone())).unwrap();
    /// assert_ne!(user.password, "secret");
    /// assert!(tokio_test::block_on(store.register(alice)).is_err());
    /// ```
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: NewUser) -> Result<User, ServiceError> {
        if self.find_by_email(&input.email).await.is_some() {
            debug!("email already registered");
            return Err(ServiceError::Conflict("email already registered".into()));
        }
        let password = self.hasher.hash(&input.password)?;
        let user = self
            .records
            .create_checked(|m, id| {
                if m.values().any(|u| u.email == input.email) {
                    return Err(ServiceError::Conflict("email already registered".into()));
                }
                Ok(User { id, username: input.username, email: input.email, password })
            })
            .await?;
        info!(user_id = %user.id, "user_registered");
        Ok(user)
    }

    /// Shallow merge of the supplied fields; a new password gets a fresh salt.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: UserPatch) -> Result<Option<User>, ServiceError> {
        let password = match patch.password.as_deref() {
            Some(p) if !p.is_empty() => Some(self.hasher.hash(p)?),
            _ => None,
        };
        self.records
            .update(id, |u| {
                if let Some(username) = patch.username.filter(|v| !v.is_empty()) {
                    u.username = username;
                }
                if let Some(email) = patch.email.filter(|v| !v.is_empty()) {
                    u.email = email;
                }
                if let Some(password) = password {
                    u.password = password;
                }
            })
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<bool, ServiceError> {
        self.records.remove(id).await
    }

    /// Case-insensitive substring match on username and/or email; `None`
    /// filters match everything.
    pub async fn search(&self, name: Option<&str>, email: Option<&str>) -> Vec<User> {
        let name = name.map(str::to_lowercase);
        let email = email.map(str::to_lowercase);
        self.records
            .filter(|u| {
                name.as_deref().map_or(true, |n| u.username.to_lowercase().contains(n))
                    && email.as_deref().map_or(true, |e| u.email.to_lowercase().contains(e))
            })
            .await
    }

    /// Exact email match.
    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        self.records.find_first(|u| u.email == email).await
    }

    /// The user when `plaintext` matches the stored hash, `None` otherwise
    /// (including unknown email).
    #[instrument(skip(self, plaintext))]
    pub async fn compare_password(&self, email: &str, plaintext: &str) -> Result<Option<User>, ServiceError> {
        let Some(user) = self.find_by_email(email).await else {
            debug!("no user with this email");
            return Ok(None);
        };
        if self.hasher.verify(plaintext, &user.password)? {
            Ok(Some(user))
        } else {
            debug!(user_id = %user.id, "password mismatch");
            Ok(None)
        }
    }
}

#[async_trait::async_trait]
impl UserRepository for UserStore {
    async fn find_all(&self) -> Vec<User> { self.find_all().await }
    async fn find_one(&self, id: &str) -> Option<User> { self.find_one(id).await }
    async fn create(&self, input: NewUser) -> Result<User, ServiceError> { self.create(input).await }
    async fn register(&self, input: NewUser) -> Result<User, ServiceError> { self.register(input).await }
    async fn update(&self, id: &str, patch: UserPatch) -> Result<Option<User>, ServiceError> { self.update(id, patch).await }
    async fn remove(&self, id: &str) -> Result<bool, ServiceError> { self.remove(id).await }
    async fn search(&self, name: Option<&str>, email: Option<&str>) -> Vec<User> { self.search(name, email).await }
    async fn find_by_email(&self, email: &str) -> Option<User> { self.find_by_email(email).await }
    async fn compare_password(&self, email: &str, plaintext: &str) -> Result<Option<User>, ServiceError> {
        self.compare_password(email, plaintext).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn open_store() -> Result<(Arc<UserStore>, PathBuf), ServiceError> {
        let path = std::env::temp_dir().join(format!("svc_users_{}.json", Uuid::new_v4()));
        let hasher = CredentialHasher::new(64, 1, 1)?;
        let store = UserStore::open(&path, StoreOptions::default(), 16, hasher).await?;
        Ok((store, path))
    }

    fn new_user(username: &str, email: &str, password: &str) -> NewUser {
        NewUser { username: username.into(), email: email.into(), password: password.into() }
    }

    #[tokio::test]
    async fn register_and_login() -> Result<(), anyhow::Error> {
        let (store, path) = open_store().await?;
        let alice = store.register(new_user("alice", "a@x.com", "secret")).await?;
        assert_ne!(alice.password, "secret");
        assert_eq!(store.find_one(&alice.id).await, Some(alice.clone()));

        let ok = store.compare_password("a@x.com", "secret").await?;
        assert_eq!(ok.map(|u| u.id), Some(alice.id.clone()));
        assert!(store.compare_password("a@x.com", "wrong").await?.is_none());
        assert!(store.compare_password("nobody@x.com", "secret").await?.is_none());

        // plaintext never reaches the file
        let raw = tokio::fs::read_to_string(&path).await?;
        assert!(!raw.contains("\"secret\""));

        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_but_create_does_not() -> Result<(), anyhow::Error> {
        let (store, path) = open_store().await?;
        store.register(new_user("alice", "a@x.com", "secret")).await?;
        let dup = store.register(new_user("alice2", "a@x.com", "other")).await;
        assert!(matches!(dup, Err(ServiceError::Conflict(_))));
        assert_eq!(store.find_all().await.len(), 1);

        store.create(new_user("alice3", "a@x.com", "other")).await?;
        assert_eq!(store.find_all().await.len(), 2);

        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }

    #[tokio::test]
    async fn update_merges_and_rehashes() -> Result<(), anyhow::Error> {
        let (store, path) = open_store().await?;
        let alice = store.create(new_user("alice", "a@x.com", "secret")).await?;

        let renamed = store
            .update(&alice.id, UserPatch { username: Some("alicia".into()), ..Default::default() })
            .await?
            .expect("user exists");
        assert_eq!(renamed.username, "alicia");
        assert_eq!(renamed.email, "a@x.com");
        assert_eq!(renamed.password, alice.password);

        let repass = store
            .update(&alice.id, UserPatch { password: Some("fresh".into()), ..Default::default() })
            .await?
            .expect("user exists");
        assert_ne!(repass.password, alice.password);
        assert_ne!(repass.password, "fresh");
        assert!(store.compare_password("a@x.com", "fresh").await?.is_some());
        assert!(store.compare_password("a@x.com", "secret").await?.is_none());

        // empty strings count as not supplied
        let kept = store
            .update(&alice.id, UserPatch { username: Some(String::new()), password: Some("again".into()), ..Default::default() })
            .await?
            .expect("user exists");
        assert_eq!(kept.username, "alicia");
        assert!(store.compare_password("a@x.com", "again").await?.is_some());

        assert!(store.update("missing", UserPatch::default()).await?.is_none());

        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_anded() -> Result<(), anyhow::Error> {
        let (store, path) = open_store().await?;
        store.create(new_user("Alice", "alice@example.com", "p")).await?;
        store.create(new_user("alfred", "alf@other.org", "p")).await?;
        store.create(new_user("bob", "bob@example.com", "p")).await?;

        assert_eq!(store.search(None, None).await.len(), 3);
        assert_eq!(store.search(Some("AL"), None).await.len(), 2);
        assert_eq!(store.search(None, Some("EXAMPLE")).await.len(), 2);
        let both = store.search(Some("al"), Some("example")).await;
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].username, "Alice");
        assert!(store.search(Some("zed"), None).await.is_empty());

        assert!(store.find_by_email("bob@example.com").await.is_some());
        assert!(store.find_by_email("BOB@example.com").await.is_none());

        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_register_same_email_admits_one() -> Result<(), anyhow::Error> {
        let (store, path) = open_store().await?;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.register(new_user(&format!("user{i}"), "same@x.com", "p")).await })
            })
            .collect();
        let mut ok = 0;
        for task in tasks {
            match task.await? {
                Ok(_) => ok += 1,
                Err(ServiceError::Conflict(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.find_all().await.len(), 1);

        let on_disk: std::collections::HashMap<String, User> =
            serde_json::from_slice(&tokio::fs::read(&path).await?)?;
        assert_eq!(on_disk.len(), 1);

        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }

    #[tokio::test]
    async fn remove_then_absent() -> Result<(), anyhow::Error> {
        let (store, path) = open_store().await?;
        let bob = store.create(new_user("bob", "b@x.com", "p")).await?;
        assert!(store.remove(&bob.id).await?);
        assert!(!store.remove(&bob.id).await?);
        assert!(store.find_one(&bob.id).await.is_none());
        assert!(store.compare_password("b@x.com", "p").await?.is_none());

        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }
}
