use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub mail: MailConfig,

    pub storage: StorageConfig,

    pub captcha: CaptchaConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_url: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/muralboard.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Public base URL of this instance, used when composing links in
    /// outgoing mail.
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 6780,
            cors_allowed_origins: vec![
                "http://localhost:6780".to_string(),
                "http://127.0.0.1:6780".to_string(),
            ],
            public_base_url: "http://localhost:6780".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Failed logins before the account is temporarily locked.
    pub max_failed_logins: i32,

    /// Lockout duration once the limit is hit.
    pub lockout_minutes: i64,

    /// Lifetime of a password reset token.
    pub reset_token_ttl_minutes: i64,

    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_failed_logins: 5,
            lockout_minutes: 15,
            reset_token_ttl_minutes: 30,
            min_password_len: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub enabled: bool,

    pub relay_url: String,

    pub from_address: String,

    /// Loaded from the MURALBOARD_MAIL_API_KEY environment variable, never
    /// from the config file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            relay_url: "http://localhost:2525/send".to_string(),
            from_address: "noreply@muralboard.local".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// "http" for the remote gateway, "memory" for local development.
    pub backend: String,

    pub base_url: String,

    /// Loaded from the MURALBOARD_STORAGE_API_KEY environment variable.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            base_url: "http://localhost:9000/muralboard".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    pub enabled: bool,

    pub verify_url: String,

    /// Loaded from the MURALBOARD_CAPTCHA_SECRET environment variable.
    #[serde(skip)]
    pub secret: Option<String>,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            verify_url: "https://hcaptcha.com/siteverify".to_string(),
            secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        let mut config = if path.exists() {
            info!("Loading config from: {}", path.display());
            Self::load_from_path(&path)?
        } else {
            info!("No config file found, using defaults");
            Self::default()
        };

        config.apply_env_secrets();
        Ok(config)
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

    fn config_path() -> PathBuf {
        std::env::var("MURALBOARD_CONFIG")
            .map_or_else(|_| PathBuf::from("config.toml"), PathBuf::from)
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Secrets only ever come from the environment.
    fn apply_env_secrets(&mut self) {
        self.mail.api_key = std::env::var("MURALBOARD_MAIL_API_KEY").ok();
        self.storage.api_key = std::env::var("MURALBOARD_STORAGE_API_KEY").ok();
        self.captcha.secret = std::env::var("MURALBOARD_CAPTCHA_SECRET").ok();
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.mail.enabled && self.mail.relay_url.is_empty() {
            anyhow::bail!("Mail relay URL cannot be empty when mail is enabled");
        }
        if self.storage.backend != "http" && self.storage.backend != "memory" {
            anyhow::bail!("Storage backend must be 'http' or 'memory'");
        }
        if self.storage.backend == "http" && self.storage.base_url.is_empty() {
            anyhow::bail!("Storage base URL cannot be empty with the http backend");
        }
        if self.captcha.enabled && self.captcha.secret.is_none() {
            anyhow::bail!("MURALBOARD_CAPTCHA_SECRET must be set when captcha is enabled");
        }
        if self.auth.max_failed_logins < 1 {
            anyhow::bail!("max_failed_logins must be at least 1");
        }

        Ok(())
    }
}
