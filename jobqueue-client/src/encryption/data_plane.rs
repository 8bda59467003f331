//! Data-plane aware job encryption

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jobqueue_core::domain::data_plane::DataPlaneConfig;
use jobqueue_core::domain::job::BranchType;
use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::{JobEncryptor, JobObjectEncryptor};
use crate::error::{ClientError, Result, ResultExt};
use crate::services::{DataPlaneDirectory, ObjectEncryptorProvider};

/// Look up a data plane by id
///
/// A missing data plane is reported as [`ClientError::DataPlaneNotFound`].
pub async fn fetch_data_plane(directory: &dyn DataPlaneDirectory, data_plane_id: &str) -> Result<DataPlaneConfig> {
    match directory.get_data_plane(data_plane_id).await {
        Ok(config) => Ok(config),
        Err(e) if e.is_not_found() => Err(ClientError::DataPlaneNotFound(data_plane_id.to_string())),
        Err(e) => Err(e.context(format!("Loading data plane \"{data_plane_id}\""))),
    }
}

/// Job encryptor that routes each project to its data plane's key material
///
/// The data plane of a project is looked up on first use and the resulting
/// encryptor is kept for the lifetime of this instance. Lookups of different
/// projects do not wait on each other. Projects without a
/// data plane use the control-plane encryptor.
pub struct DataPlaneJobObjectEncryptor {
    control_plane: JobObjectEncryptor,
    directory: Option<Arc<dyn DataPlaneDirectory>>,
    provider: Arc<dyn ObjectEncryptorProvider>,
    resolved: Mutex<HashMap<String, Arc<OnceCell<JobObjectEncryptor>>>>,
}

impl DataPlaneJobObjectEncryptor {
    /// # Arguments
    /// * `control_plane` - Encryptor for projects without a data plane
    /// * `directory` - Data-plane directory; `None` on deployments without data planes
    /// * `provider` - Builds encryption capabilities from data-plane key material
    pub fn new(
        control_plane: JobObjectEncryptor,
        directory: Option<Arc<dyn DataPlaneDirectory>>,
        provider: Arc<dyn ObjectEncryptorProvider>,
    ) -> Self {
        Self {
            control_plane,
            directory,
            provider,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    fn directory(&self) -> Result<&Arc<dyn DataPlaneDirectory>> {
        self.directory.as_ref().ok_or_else(|| {
            ClientError::EncryptionConfig("Data planes are not supported on this deployment".to_string())
        })
    }

    async fn for_project(&self, project_id: &str) -> Result<JobObjectEncryptor> {
        let cell = self
            .resolved
            .lock()
            .await
            .entry(project_id.to_string())
            .or_default()
            .clone();

        cell.get_or_try_init(|| self.resolve(project_id)).await.cloned()
    }

    async fn resolve(&self, project_id: &str) -> Result<JobObjectEncryptor> {
        let data_plane = self
            .directory()?
            .project_data_plane(project_id)
            .await
            .with_context(|| format!("Resolving data plane of project \"{project_id}\""))?;

        match data_plane {
            Some(config) => {
                info!("Project {} uses data plane {}", project_id, config.id);
                let inner = self
                    .provider
                    .encryptor(&config.encryption)
                    .await
                    .with_context(|| format!("Building encryptor of data plane \"{}\"", config.id))?;
                Ok(JobObjectEncryptor::new(inner))
            }
            None => {
                debug!("Project {} has no data plane", project_id);
                Ok(self.control_plane.clone())
            }
        }
    }

    /// Data plane configuration by id
    pub async fn data_plane(&self, data_plane_id: &str) -> Result<DataPlaneConfig> {
        fetch_data_plane(self.directory()?.as_ref(), data_plane_id).await
    }

    /// Plain Kubernetes token of a data plane
    ///
    /// The token is stored with the generic, non-job encryption.
    pub async fn kubernetes_token(&self, config: &DataPlaneConfig) -> Result<String> {
        let token = self
            .control_plane
            .object_encryptor()
            .decrypt_generic(Value::String(config.kubernetes.token.clone()))
            .await
            .with_context(|| format!("Decrypting token of data plane \"{}\"", config.id))?;

        match token {
            Value::String(token) => Ok(token),
            _ => Err(ClientError::Encryption(format!(
                "Token of data plane \"{}\" did not decrypt to a string",
                config.id
            ))),
        }
    }
}

#[async_trait]
impl JobEncryptor for DataPlaneJobObjectEncryptor {
    async fn encrypt(
        &self,
        data: Value,
        component_id: &str,
        project_id: &str,
        branch_type: Option<BranchType>,
        features: &[String],
    ) -> Result<Value> {
        self.for_project(project_id)
            .await?
            .encrypt(data, component_id, project_id, branch_type, features)
            .await
    }

    async fn decrypt(
        &self,
        data: Value,
        component_id: &str,
        project_id: &str,
        config_id: Option<&str>,
        branch_type: BranchType,
    ) -> Result<Value> {
        self.for_project(project_id)
            .await?
            .decrypt(data, component_id, project_id, config_id, branch_type)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDataPlaneDirectory, FakeEncryptorProvider, FakeObjectEncryptor, data_plane_config};
    use serde_json::json;

    fn encryptor(
        directory: Option<Arc<FakeDataPlaneDirectory>>,
    ) -> (DataPlaneJobObjectEncryptor, Arc<FakeObjectEncryptor>, Arc<FakeEncryptorProvider>) {
        let control_plane = Arc::new(FakeObjectEncryptor::default());
        let provider = Arc::new(FakeEncryptorProvider::default());
        let encryptor = DataPlaneJobObjectEncryptor::new(
            JobObjectEncryptor::new(control_plane.clone()),
            directory.map(|d| d as Arc<dyn DataPlaneDirectory>),
            provider.clone(),
        );
        (encryptor, control_plane, provider)
    }

    #[tokio::test]
    async fn test_without_directory_fails_on_first_use() {
        let (encryptor, control_plane, _) = encryptor(None);

        let err = encryptor
            .encrypt(json!("secret"), "keboola.ex-db", "123", None, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::EncryptionConfig(_)));
        assert!(control_plane.calls().is_empty());
    }

    #[tokio::test]
    async fn test_project_without_data_plane_uses_control_plane() {
        let directory = Arc::new(FakeDataPlaneDirectory::default());
        let (encryptor, control_plane, provider) = encryptor(Some(directory.clone()));

        encryptor
            .encrypt(json!("secret"), "keboola.ex-db", "123", None, &[])
            .await
            .unwrap();

        assert_eq!(control_plane.calls(), vec!["encrypt_for_project"]);
        assert_eq!(provider.built(), 0);
    }

    #[tokio::test]
    async fn test_data_plane_resolved_once() {
        let directory = Arc::new(FakeDataPlaneDirectory::default().with_project("123", data_plane_config("dp-1")));
        let (encryptor, control_plane, provider) = encryptor(Some(directory.clone()));

        for _ in 0..3 {
            encryptor
                .decrypt(json!("KBC::ProjectSecure::x"), "keboola.ex-db", "123", None, BranchType::Default)
                .await
                .unwrap();
        }

        assert_eq!(directory.project_lookups(), 1);
        assert_eq!(provider.built(), 1);
        assert!(control_plane.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_data_plane() {
        let directory = Arc::new(FakeDataPlaneDirectory::default());
        let (encryptor, _, _) = encryptor(Some(directory));

        let err = encryptor.data_plane("dp-404").await.unwrap_err();
        assert!(matches!(err, ClientError::DataPlaneNotFound(ref id) if id == "dp-404"));
    }

    #[tokio::test]
    async fn test_kubernetes_token_uses_generic_decrypt() {
        let directory = Arc::new(FakeDataPlaneDirectory::default().with_data_plane(data_plane_config("dp-1")));
        let (encryptor, control_plane, _) = encryptor(Some(directory));

        let config = encryptor.data_plane("dp-1").await.unwrap();
        assert_eq!(encryptor.kubernetes_token(&config).await.unwrap(), "k8s-token");
        assert_eq!(control_plane.calls(), vec!["decrypt_generic"]);
    }

    /// Holds the lookup of project "slow" until released
    #[derive(Default)]
    struct GatedDirectory {
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl DataPlaneDirectory for GatedDirectory {
        async fn project_data_plane(&self, project_id: &str) -> Result<Option<DataPlaneConfig>> {
            if project_id == "slow" {
                self.gate.notified().await;
            }
            Ok(None)
        }

        async fn get_data_plane(&self, data_plane_id: &str) -> Result<DataPlaneConfig> {
            Err(ClientError::api_error(404, format!("Data plane \"{data_plane_id}\" not found")))
        }
    }

    #[tokio::test]
    async fn test_slow_lookup_does_not_block_other_projects() {
        let directory = Arc::new(GatedDirectory::default());
        let control_plane = Arc::new(FakeObjectEncryptor::default());
        let encryptor = DataPlaneJobObjectEncryptor::new(
            JobObjectEncryptor::new(control_plane.clone()),
            Some(directory.clone() as Arc<dyn DataPlaneDirectory>),
            Arc::new(FakeEncryptorProvider::default()),
        );

        let slow = encryptor.encrypt(json!("a"), "keboola.ex-db", "slow", None, &[]);
        let fast = async {
            let encrypted = encryptor.encrypt(json!("b"), "keboola.ex-db", "fast", None, &[]).await;
            directory.gate.notify_one();
            encrypted
        };

        let (slow, fast) = tokio::time::timeout(std::time::Duration::from_secs(5), async { tokio::join!(slow, fast) })
            .await
            .expect("lookup of one project held up another");

        assert_eq!(fast.unwrap(), json!("KBC::ProjectSecure::b"));
        assert_eq!(slow.unwrap(), json!("KBC::ProjectSecure::a"));
        assert_eq!(control_plane.calls().len(), 2);
    }
}
