//! Wires every component from one [`VaultConfig`].

use std::sync::Arc;

use tracing::info;

use attest_crypto::{CryptoEnvelope, Signer};
use attest_store::{Capabilities, ObjectStore};

use crate::archive::ArchiveAssembler;
use crate::audit::AuditTrail;
use crate::config::VaultConfig;
use crate::db::Database;
use crate::error::Result;
use crate::evidence::EvidenceStore;

/// The evidentiary core: evidence store, audit trail and archive assembler
/// sharing one database, one object store and one application secret.
#[derive(Debug, Clone)]
pub struct Vault {
    evidence: Arc<EvidenceStore>,
    audit: Arc<AuditTrail>,
    archives: Arc<ArchiveAssembler>,
    capabilities: Capabilities,
}

impl Vault {
    /// Validate `config`, open the database and object store, derive keys.
    pub fn open(config: &VaultConfig) -> Result<Self> {
        config.validate()?;
        let db = Arc::new(Database::from_config(&config.database)?);
        let objects = config.storage.open()?;
        Self::with_components(config, db, objects)
    }

    /// Build over an existing database and object store.
    pub fn with_components(
        config: &VaultConfig,
        db: Arc<Database>,
        objects: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        let secret = config.app_secret()?;
        let signer = match config.signing_secret()? {
            Some(dedicated) => Signer::from_dedicated_secret(&dedicated),
            None => Signer::from_app_secret(&secret)?,
        };
        let envelope = Arc::new(CryptoEnvelope::new(&secret)?);
        let audit = Arc::new(AuditTrail::new(db.clone(), signer, config.audit));
        let evidence = Arc::new(EvidenceStore::new(
            db.clone(),
            objects.clone(),
            envelope.clone(),
            audit.clone(),
        ));
        let capabilities = objects.capabilities();
        let archives = Arc::new(ArchiveAssembler::new(
            db,
            evidence.clone(),
            objects,
            envelope,
            audit.clone(),
            config.archive.compression,
        ));
        info!(
            provider = capabilities.provider,
            dedicated_signing_key = config.signing_secret.is_some(),
            "vault ready"
        );
        Ok(Self {
            evidence,
            audit,
            archives,
            capabilities,
        })
    }

    pub fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn archives(&self) -> &ArchiveAssembler {
        &self.archives
    }

    /// Decided once at startup; callers branch on this rather than probing.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
