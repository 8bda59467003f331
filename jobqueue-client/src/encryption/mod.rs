//! Job object encryption
//!
//! Picks the scope of the generic encryption capability for job payloads.
//! [`JobObjectEncryptor`] works against one fixed capability;
//! [`DataPlaneJobObjectEncryptor`] resolves the capability per project from
//! its data plane on first use.

mod data_plane;

pub use data_plane::{DataPlaneJobObjectEncryptor, fetch_data_plane};

use std::sync::Arc;

use async_trait::async_trait;
use jobqueue_core::domain::job::BranchType;
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::services::{ObjectEncryptor, PROTECTED_DEFAULT_BRANCH_FEATURE};

/// Encrypts and decrypts job payloads
#[async_trait]
pub trait JobEncryptor: Send + Sync {
    /// Encrypt a payload for storing on a job
    ///
    /// # Arguments
    /// * `branch_type` - Required when the project has the protected default branch feature
    /// * `features` - Enabled features of the owning project
    async fn encrypt(
        &self,
        data: Value,
        component_id: &str,
        project_id: &str,
        branch_type: Option<BranchType>,
        features: &[String],
    ) -> Result<Value>;

    /// Decrypt a payload stored on a job
    ///
    /// With a `config_id` the configuration-scoped ciphers can be decoded
    /// as well.
    async fn decrypt(
        &self,
        data: Value,
        component_id: &str,
        project_id: &str,
        config_id: Option<&str>,
        branch_type: BranchType,
    ) -> Result<Value>;
}

/// Job encryptor backed by a single encryption capability
#[derive(Clone)]
pub struct JobObjectEncryptor {
    inner: Arc<dyn ObjectEncryptor>,
}

impl JobObjectEncryptor {
    pub fn new(inner: Arc<dyn ObjectEncryptor>) -> Self {
        Self { inner }
    }

    /// The wrapped capability, for non-job secrets
    pub fn object_encryptor(&self) -> &Arc<dyn ObjectEncryptor> {
        &self.inner
    }
}

#[async_trait]
impl JobEncryptor for JobObjectEncryptor {
    async fn encrypt(
        &self,
        data: Value,
        component_id: &str,
        project_id: &str,
        branch_type: Option<BranchType>,
        features: &[String],
    ) -> Result<Value> {
        let protected = features.iter().any(|f| f == PROTECTED_DEFAULT_BRANCH_FEATURE);

        match (protected, branch_type) {
            (true, None) => Err(ClientError::EncryptionConfig(format!(
                "Project \"{project_id}\" has the \"{PROTECTED_DEFAULT_BRANCH_FEATURE}\" feature, a branch type is required to encrypt job data"
            ))),
            (true, Some(branch_type)) => {
                debug!("Encrypting for project {} branch type {}", project_id, branch_type);
                self.inner
                    .encrypt_for_branch_type(data, component_id, project_id, branch_type)
                    .await
            }
            (false, _) => {
                debug!("Encrypting for project {}", project_id);
                self.inner.encrypt_for_project(data, component_id, project_id).await
            }
        }
    }

    async fn decrypt(
        &self,
        data: Value,
        component_id: &str,
        project_id: &str,
        config_id: Option<&str>,
        branch_type: BranchType,
    ) -> Result<Value> {
        match config_id {
            Some(config_id) => {
                self.inner
                    .decrypt_for_branch_type_configuration(data, component_id, project_id, config_id, branch_type)
                    .await
            }
            None => {
                self.inner
                    .decrypt_for_branch_type(data, component_id, project_id, branch_type)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeObjectEncryptor;
    use serde_json::json;

    fn protected() -> Vec<String> {
        vec![PROTECTED_DEFAULT_BRANCH_FEATURE.to_string()]
    }

    #[tokio::test]
    async fn test_protected_branch_requires_branch_type() {
        let inner = Arc::new(FakeObjectEncryptor::default());
        let encryptor = JobObjectEncryptor::new(inner.clone());

        let err = encryptor
            .encrypt(json!("secret"), "keboola.ex-db", "123", None, &protected())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::EncryptionConfig(_)));
        assert!(inner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_protected_branch_uses_branch_scope() {
        let inner = Arc::new(FakeObjectEncryptor::default());
        let encryptor = JobObjectEncryptor::new(inner.clone());

        let encrypted = encryptor
            .encrypt(json!("secret"), "keboola.ex-db", "123", Some(BranchType::Dev), &protected())
            .await
            .unwrap();

        assert_eq!(encrypted, json!("KBC::BranchTypeSecure::secret"));
        assert_eq!(inner.calls(), vec!["encrypt_for_branch_type:dev"]);
    }

    #[tokio::test]
    async fn test_unprotected_ignores_branch_type() {
        let inner = Arc::new(FakeObjectEncryptor::default());
        let encryptor = JobObjectEncryptor::new(inner.clone());

        for branch_type in [None, Some(BranchType::Default), Some(BranchType::Dev)] {
            encryptor
                .encrypt(json!({"#password": "pwd"}), "keboola.ex-db", "123", branch_type, &[])
                .await
                .unwrap();
        }

        assert_eq!(inner.calls(), vec!["encrypt_for_project"; 3]);
    }

    #[tokio::test]
    async fn test_decrypt_dispatch() {
        let inner = Arc::new(FakeObjectEncryptor::default());
        let encryptor = JobObjectEncryptor::new(inner.clone());

        let plain = encryptor
            .decrypt(
                json!("KBC::ProjectSecure::secret"),
                "keboola.ex-db",
                "123",
                Some("456"),
                BranchType::Default,
            )
            .await
            .unwrap();
        assert_eq!(plain, json!("secret"));

        encryptor
            .decrypt(json!("x"), "keboola.ex-db", "123", None, BranchType::Dev)
            .await
            .unwrap();

        assert_eq!(
            inner.calls(),
            vec!["decrypt_for_branch_type_configuration:456:default", "decrypt_for_branch_type:dev"]
        );
    }
}
