use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const ENV_PREFIX: &str = "REPORTD_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub user_info: UserInfoConfig,

    pub reports: ReportsConfig,

    pub email: EmailConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human readable format.
    pub json_logs: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Public base address used to build report download links.
    pub service_address: String,

    /// Largest accepted upload, in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            service_address: "http://localhost:8000".to_string(),
            max_upload_mb: 50,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub const fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// Basic credential required to create reports. Both parts must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,

    #[serde(skip_serializing)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfoConfig {
    pub base_url: String,

    pub verify_tls: bool,

    /// Per-request timeout in seconds (default: 5)
    pub timeout_seconds: u64,

    pub health_timeout_seconds: u64,

    /// Bearer token attached to every request when set.
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// Users fetched concurrently per chunk (default: 20)
    pub chunk_size: usize,

    /// Pause between two chunks, in milliseconds (default: 1000)
    pub after_chunk_delay_ms: u64,
}

impl Default for UserInfoConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            verify_tls: true,
            timeout_seconds: 5,
            health_timeout_seconds: 3,
            token: None,
            chunk_size: 20,
            after_chunk_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Directory holding the generated archives.
    pub storage_dir: String,

    /// Deflate level of the archive, 0-9 (default: 1)
    pub compression_level: i64,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            storage_dir: "./tmp".to_string(),
            compression_level: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub host: String,

    pub port: u16,

    /// Upgrade the connection with STARTTLS.
    pub use_tls: bool,

    pub username: String,

    #[serde(skip_serializing)]
    pub password: String,

    pub sender: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            use_tls: false,
            username: String::new(),
            password: String::new(),
            sender: "no-reply@test.env".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "reportd".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    /// Loads `path` when given, otherwise the first config file found on the
    /// search path, otherwise defaults. Secret overrides from the environment
    /// are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load_from_search_path()?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_search_path() -> Result<Self> {
        for path in Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(&path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![Self::default_config_path()];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("reportd").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".reportd").join("config.toml"));
        }

        paths
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing(path: &Path) -> Result<bool> {
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Secrets are kept out of the config file where possible.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = var("BASIC_AUTH_USERNAME") {
            self.auth.username = value;
        }
        if let Some(value) = var("BASIC_AUTH_PASSWORD") {
            self.auth.password = value;
        }
        if let Some(value) = var("USER_INFO_TOKEN") {
            self.user_info.token = Some(value);
        }
        if let Some(value) = var("EMAIL_USERNAME") {
            self.email.username = value;
        }
        if let Some(value) = var("EMAIL_PASSWORD") {
            self.email.password = value;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_info.chunk_size == 0 {
            anyhow::bail!("user_info.chunk_size must be > 0");
        }

        if !(0..=9).contains(&self.reports.compression_level) {
            anyhow::bail!(
                "reports.compression_level must be between 0 and 9, got {}",
                self.reports.compression_level
            );
        }

        if self.server.service_address.trim().is_empty() {
            anyhow::bail!("server.service_address cannot be empty");
        }

        if self.auth.username.is_empty() {
            anyhow::bail!("auth.username cannot be empty");
        }

        if self.auth.password.is_empty() {
            anyhow::bail!("auth.password cannot be empty (set REPORTD_BASIC_AUTH_PASSWORD)");
        }

        url::Url::parse(&self.user_info.base_url).with_context(|| {
            format!("Invalid user_info.base_url: {}", self.user_info.base_url)
        })?;

        Ok(())
    }
}
