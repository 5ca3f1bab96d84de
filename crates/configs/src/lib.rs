use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Where and how the JSON backing files are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_products_file")]
    pub products_file: String,
    #[serde(default = "default_users_file")]
    pub users_file: String,
    /// Abort startup when a backing file cannot be read or parsed.
    #[serde(default)]
    pub strict_load: bool,
    /// Write to a temp file and rename instead of overwriting in place.
    #[serde(default)]
    pub atomic_writes: bool,
    #[serde(default)]
    pub pretty_json: bool,
    #[serde(default = "default_max_id_attempts")]
    pub max_id_attempts: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            products_file: default_products_file(),
            users_file: default_users_file(),
            strict_load: false,
            atomic_writes: false,
            pretty_json: false,
            max_id_attempts: default_max_id_attempts(),
        }
    }
}

/// Argon2 cost parameters used when hashing user passwords.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

fn default_data_dir() -> String { "data".into() }
fn default_products_file() -> String { "products.json".into() }
fn default_users_file() -> String { "users.json".into() }
fn default_max_id_attempts() -> u32 { 16 }
// argon2 crate defaults (Params::DEFAULT)
fn default_memory_kib() -> u32 { 19 * 1024 }
fn default_iterations() -> u32 { 2 }
fn default_parallelism() -> u32 { 1 }

fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_default() -> Result<AppConfig> {
    load_from_file(&config_path())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Config file if present, otherwise defaults overridden by environment variables.
    pub fn load_or_env() -> Result<Self> {
        Self::load_or_env_from(&config_path())
    }

    /// Only a missing file falls back to defaults; a file that fails to
    /// parse or validate is an error.
    pub fn load_or_env_from(path: &str) -> Result<Self> {
        let mut cfg = match load_from_file(path) {
            Ok(cfg) => cfg,
            Err(e) if is_not_found(&e) => {
                let mut cfg = AppConfig::default();
                cfg.server.apply_env();
                cfg.storage.apply_env();
                cfg
            }
            Err(e) => return Err(e.context(format!("invalid config file {path}"))),
        };
        cfg.normalize_and_validate()
            .map_err(|e| e.context(format!("invalid config file {path}")))?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        // 归一化 server
        self.server.normalize()?;
        // 归一化 storage（支持从环境变量 DATA_DIR 填充目录）
        self.storage.normalize_from_env();
        self.storage.validate()?;
        self.credentials.validate()?;
        Ok(())
    }
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

impl ServerConfig {
    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StorageConfig {
    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("DATA_DIR") {
            self.data_dir = dir;
        }
    }

    pub fn normalize_from_env(&mut self) {
        if self.data_dir.trim().is_empty() {
            self.data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| default_data_dir());
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (key, name) in [("storage.products_file", &self.products_file), ("storage.users_file", &self.users_file)] {
            if name.trim().is_empty() {
                return Err(anyhow!("{key} must not be empty"));
            }
        }
        if self.products_file == self.users_file {
            return Err(anyhow!("storage.products_file and storage.users_file must differ"));
        }
        if self.max_id_attempts == 0 {
            return Err(anyhow!("storage.max_id_attempts must be >= 1"));
        }
        Ok(())
    }

    pub fn products_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.products_file)
    }

    pub fn users_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.users_file)
    }
}

impl CredentialConfig {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 || self.parallelism == 0 {
            return Err(anyhow!("credentials.iterations and credentials.parallelism must be >= 1"));
        }
        // argon2 requires at least 8 KiB per lane
        if self.memory_kib < 8 * self.parallelism {
            return Err(anyhow!("credentials.memory_kib must be >= 8 * parallelism"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let mut cfg = parse("").unwrap();
        cfg.storage.data_dir = "var/data".into();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.worker_threads, Some(4));
        assert_eq!(cfg.storage.max_id_attempts, 16);
        assert!(!cfg.storage.strict_load);
        assert_eq!(cfg.storage.products_path(), PathBuf::from("var/data").join("products.json"));
    }

    #[test]
    fn storage_section_is_read() {
        let cfg = parse(
            r#"
            [server]
            host = "0.0.0.0"
            port = 3000

            [storage]
            data_dir = "/srv/shop"
            users_file = "people.json"
            strict_load = true
            atomic_writes = true
            max_id_attempts = 4
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.bind_addr(), "0.0.0.0:3000");
        assert_eq!(cfg.storage.users_path(), PathBuf::from("/srv/shop/people.json"));
        assert!(cfg.storage.strict_load && cfg.storage.atomic_writes);
        assert_eq!(cfg.storage.max_id_attempts, 4);
    }

    fn tmp_config(tag: &str, content: &str) -> String {
        let path = std::env::temp_dir().join(format!("configs_{tag}_{}.toml", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn broken_config_file_is_not_replaced_by_defaults() {
        let path = tmp_config("invalid_values", "[storage]\nstrict_load = true\nmax_id_attempts = 0\n");
        assert!(AppConfig::load_or_env_from(&path).is_err());

        let path2 = tmp_config("bad_toml", "[storage\nstrict_load = ");
        assert!(AppConfig::load_or_env_from(&path2).is_err());

        let path3 = tmp_config("valid", "[storage]\nstrict_load = true\n");
        let cfg = AppConfig::load_or_env_from(&path3).unwrap();
        assert!(cfg.storage.strict_load);

        for p in [path, path2, path3] {
            let _ = std::fs::remove_file(p);
        }
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("configs_absent_{}.toml", std::process::id()));
        let cfg = AppConfig::load_or_env_from(&path.to_string_lossy()).unwrap();
        assert!(!cfg.storage.strict_load);
        assert_eq!(cfg.storage.max_id_attempts, 16);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut cfg = AppConfig::default();
        cfg.storage.max_id_attempts = 0;
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.storage.users_file = cfg.storage.products_file.clone();
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.credentials.memory_kib = 4;
        assert!(cfg.normalize_and_validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(cfg.normalize_and_validate().is_err());
    }
}
