//! Vault configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use attest_crypto::AppSecret;
use attest_store::StorageProvider;

use crate::error::{Result, VaultError};
use crate::types::MAX_PER_PAGE;

/// Top-level configuration.
///
/// ```toml
/// app_secret = "base64:..."
///
/// [database]
/// path = "/var/lib/attest/attest.db"
///
/// [storage]
/// provider = "local"
/// root = "/var/lib/attest/objects"
/// ```
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// `base64:`-prefixed or hex, at least 32 bytes decoded.
    pub app_secret: String,
    /// Dedicated audit signing key. Derived from `app_secret` when absent.
    #[serde(default)]
    pub signing_secret: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageProvider,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("has_app_secret", &!self.app_secret.is_empty())
            .field("has_signing_secret", &self.signing_secret.is_some())
            .field("database", &self.database)
            .field("storage", &self.storage)
            .field("audit", &self.audit)
            .field("archive", &self.archive)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_per_page: 25,
            max_per_page: MAX_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

impl From<Compression> for zip::CompressionMethod {
    fn from(value: Compression) -> Self {
        match value {
            Compression::Deflated => zip::CompressionMethod::Deflated,
            Compression::Stored => zip::CompressionMethod::Stored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    pub compression: Compression,
}

impl VaultConfig {
    /// Minimal config: the given secret, in-memory database and object store.
    pub fn new(app_secret: impl Into<String>) -> Self {
        Self {
            app_secret: app_secret.into(),
            signing_secret: None,
            database: DatabaseConfig::default(),
            storage: StorageProvider::default(),
            audit: AuditConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: VaultConfig =
            toml::from_str(raw).map_err(|e| VaultError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            VaultError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
            .map_err(|e| VaultError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Check secrets decode and pagination bounds are sane.
    pub fn validate(&self) -> Result<()> {
        self.app_secret()?;
        self.signing_secret()?;
        let audit = &self.audit;
        if audit.max_per_page == 0 || audit.max_per_page > MAX_PER_PAGE {
            return Err(VaultError::Config(format!(
                "audit.max_per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
        if audit.default_per_page == 0 || audit.default_per_page > audit.max_per_page {
            return Err(VaultError::Config(
                "audit.default_per_page must be between 1 and audit.max_per_page".into(),
            ));
        }
        Ok(())
    }

    pub fn app_secret(&self) -> Result<AppSecret> {
        AppSecret::parse(&self.app_secret)
            .map_err(|e| VaultError::Config(format!("app_secret: {}", e)))
    }

    pub fn signing_secret(&self) -> Result<Option<AppSecret>> {
        self.signing_secret
            .as_deref()
            .map(|raw| {
                AppSecret::parse(raw)
                    .map_err(|e| VaultError::Config(format!("signing_secret: {}", e)))
            })
            .transpose()
    }
}
