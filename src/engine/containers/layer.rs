//! Committing a container's filesystem as a tagged image layer.

use std::collections::{BTreeMap, HashMap};

use bollard::models::ContainerConfig;
use bollard::query_parameters::CommitContainerOptionsBuilder;
use serde::{Deserialize, Serialize};

use crate::engine::client::ContainerLifecycle;
use crate::engine::connection::{EngineConnector, classify_operation_error};
use crate::engine::images::FINGERPRINT_LABEL_KEY;
use crate::engine::naming::ServiceNaming;
use crate::error::ConductorError;

const COMMIT_OPERATION: &str = "commit container";
const LAYER_COMMENT: &str = "Built with Ansible Container (https://github.com/ansible/ansible-container)";
const LAYER_TAG_FORMAT: &str = "%Y%m%d%H%M%S";

/// Runtime settings of a service, baked into a committed layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerMetadata {
    /// Default command.
    pub command: Option<Vec<String>>,
    /// Entrypoint.
    pub entrypoint: Option<Vec<String>>,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
    /// Image labels.
    pub labels: BTreeMap<String, String>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// User the service runs as.
    pub user: Option<String>,
}

impl LayerMetadata {
    /// Image configuration for a layer labelled with `fingerprint`.
    ///
    /// The fingerprint label replaces any label with the same key.
    #[must_use]
    pub fn to_container_config(&self, fingerprint: &str) -> ContainerConfig {
        let env = (!self.environment.is_empty()).then(|| {
            self.environment
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect()
        });

        let mut labels: HashMap<String, String> = self
            .labels
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        labels.insert(FINGERPRINT_LABEL_KEY.to_owned(), fingerprint.to_owned());

        ContainerConfig {
            cmd: self.command.clone(),
            entrypoint: self.entrypoint.clone(),
            env,
            labels: Some(labels),
            working_dir: self.working_dir.clone(),
            user: self.user.clone(),
            ..ContainerConfig::default()
        }
    }
}

/// A request to commit a service container as a new image layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerCommitRequest {
    container_id: String,
    service: String,
    fingerprint: String,
    metadata: LayerMetadata,
    tag: Option<String>,
}

impl LayerCommitRequest {
    /// Commit `container_id` as a layer of `service`.
    #[must_use]
    pub fn new(
        container_id: impl Into<String>,
        service: impl Into<String>,
        fingerprint: impl Into<String>,
        metadata: LayerMetadata,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            service: service.into(),
            fingerprint: fingerprint.into(),
            metadata,
            tag: None,
        }
    }

    /// Use `tag` instead of the current UTC timestamp.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Container being committed.
    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Service the layer belongs to.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    fn resolve_tag(&self) -> String {
        self.tag.clone().unwrap_or_else(|| {
            chrono::Utc::now().format(LAYER_TAG_FORMAT).to_string()
        })
    }
}

/// An image produced by committing a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedLayer {
    /// Engine identifier of the new image.
    pub image_id: String,
    /// Repository the image was committed to.
    pub repository: String,
    /// Tag of the new image.
    pub tag: String,
}

impl EngineConnector {
    /// Commit a service container as a new layer of the service's image.
    ///
    /// The layer is tagged with the request's tag or, by default, the current
    /// UTC time as `YYYYMMDDHHMMSS`, and labelled with the fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::OperationFailed` when the engine rejects the
    /// commit and `ContainerError::EngineUnavailable` when it cannot be
    /// reached.
    pub async fn commit_role_as_layer_async<C: ContainerLifecycle>(
        lifecycle: &C,
        naming: &ServiceNaming,
        request: &LayerCommitRequest,
    ) -> Result<CommittedLayer, ConductorError> {
        let repository = naming.image_name_for(&request.service);
        let tag = request.resolve_tag();
        let options = CommitContainerOptionsBuilder::default()
            .container(&request.container_id)
            .repo(&repository)
            .tag(&tag)
            .comment(LAYER_COMMENT)
            .build();
        let config = request.metadata.to_container_config(&request.fingerprint);

        let response = lifecycle
            .commit_container(options, config)
            .await
            .map_err(|error| {
                ConductorError::from(
                    classify_operation_error(error, COMMIT_OPERATION, &request.container_id)
                        .into_error(COMMIT_OPERATION, &request.container_id),
                )
            })?;

        tracing::info!(
            container = %request.container_id,
            image = %format!("{repository}:{tag}"),
            image_id = %response.id,
            "committed layer"
        );
        Ok(CommittedLayer {
            image_id: response.id,
            repository,
            tag,
        })
    }

    /// Blocking variant of [`Self::commit_role_as_layer_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::commit_role_as_layer_async`].
    pub fn commit_role_as_layer<C: ContainerLifecycle>(
        runtime: &tokio::runtime::Handle,
        lifecycle: &C,
        naming: &ServiceNaming,
        request: &LayerCommitRequest,
    ) -> Result<CommittedLayer, ConductorError> {
        runtime.block_on(Self::commit_role_as_layer_async(lifecycle, naming, request))
    }
}
