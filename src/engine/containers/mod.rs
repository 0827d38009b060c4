//! Container lifecycle operations.
//!
//! Stopping or deleting a container that does not exist, or stopping one
//! that is already stopped, succeeds without doing anything. Every other
//! engine failure is propagated.

mod layer;

use bollard::models::ContainerInspectResponse;
use bollard::query_parameters::{RemoveContainerOptionsBuilder, StopContainerOptions};

use super::client::ContainerLifecycle;
use super::connection::{EngineConnector, EngineFailure, classify_operation_error};
use super::naming::ServiceNaming;
use crate::error::ConductorError;

pub use layer::{CommittedLayer, LayerCommitRequest, LayerMetadata};

const STOP_OPERATION: &str = "stop container";
const REMOVE_OPERATION: &str = "remove container";
const INSPECT_OPERATION: &str = "inspect container";

impl EngineConnector {
    /// Stop `container`.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::EngineUnavailable` or
    /// `ContainerError::OperationFailed` for failures other than the
    /// container being absent or already stopped.
    pub async fn stop_container_async<C: ContainerLifecycle>(
        lifecycle: &C,
        container: &str,
    ) -> Result<(), ConductorError> {
        match lifecycle
            .stop_container(container, None::<StopContainerOptions>)
            .await
        {
            Ok(()) => {
                tracing::info!(container, "stopped container");
                Ok(())
            }
            Err(error) => match classify_operation_error(error, STOP_OPERATION, container) {
                EngineFailure::NotFound => {
                    tracing::warn!(container, "container not found; nothing to stop");
                    Ok(())
                }
                EngineFailure::NotModified => {
                    tracing::debug!(container, "container already stopped");
                    Ok(())
                }
                failure => Err(ConductorError::from(
                    failure.into_error(STOP_OPERATION, container),
                )),
            },
        }
    }

    /// Remove `container`.
    ///
    /// The container must already be stopped; running containers are not
    /// force-removed.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::EngineUnavailable` or
    /// `ContainerError::OperationFailed` for failures other than the
    /// container being absent.
    pub async fn delete_container_async<C: ContainerLifecycle>(
        lifecycle: &C,
        container: &str,
    ) -> Result<(), ConductorError> {
        let options = RemoveContainerOptionsBuilder::default().force(false).build();

        match lifecycle.remove_container(container, Some(options)).await {
            Ok(()) => {
                tracing::info!(container, "removed container");
                Ok(())
            }
            Err(error) => match classify_operation_error(error, REMOVE_OPERATION, container) {
                EngineFailure::NotFound => {
                    tracing::warn!(container, "container not found; nothing to remove");
                    Ok(())
                }
                failure => Err(ConductorError::from(
                    failure.into_error(REMOVE_OPERATION, container),
                )),
            },
        }
    }

    /// Inspect `container`, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::EngineUnavailable` or
    /// `ContainerError::OperationFailed` for failures other than the
    /// container being absent.
    pub async fn inspect_container_async<C: ContainerLifecycle>(
        lifecycle: &C,
        container: &str,
    ) -> Result<Option<ContainerInspectResponse>, ConductorError> {
        match lifecycle.inspect_container(container).await {
            Ok(details) => Ok(Some(details)),
            Err(error) => match classify_operation_error(error, INSPECT_OPERATION, container) {
                EngineFailure::NotFound => Ok(None),
                failure => Err(ConductorError::from(
                    failure.into_error(INSPECT_OPERATION, container),
                )),
            },
        }
    }

    /// Identifier of `service`'s container, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::inspect_container_async`].
    pub async fn container_id_for_service_async<C: ContainerLifecycle>(
        lifecycle: &C,
        naming: &ServiceNaming,
        service: &str,
    ) -> Result<Option<String>, ConductorError> {
        let name = naming.container_name_for(service);
        let details = Self::inspect_container_async(lifecycle, &name).await?;
        Ok(details.and_then(|found| found.id))
    }

    /// Blocking variant of [`Self::stop_container_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::stop_container_async`].
    pub fn stop_container<C: ContainerLifecycle>(
        runtime: &tokio::runtime::Handle,
        lifecycle: &C,
        container: &str,
    ) -> Result<(), ConductorError> {
        runtime.block_on(Self::stop_container_async(lifecycle, container))
    }

    /// Blocking variant of [`Self::delete_container_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::delete_container_async`].
    pub fn delete_container<C: ContainerLifecycle>(
        runtime: &tokio::runtime::Handle,
        lifecycle: &C,
        container: &str,
    ) -> Result<(), ConductorError> {
        runtime.block_on(Self::delete_container_async(lifecycle, container))
    }

    /// Blocking variant of [`Self::inspect_container_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::inspect_container_async`].
    pub fn inspect_container<C: ContainerLifecycle>(
        runtime: &tokio::runtime::Handle,
        lifecycle: &C,
        container: &str,
    ) -> Result<Option<ContainerInspectResponse>, ConductorError> {
        runtime.block_on(Self::inspect_container_async(lifecycle, container))
    }

    /// Blocking variant of [`Self::container_id_for_service_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::container_id_for_service_async`].
    pub fn container_id_for_service<C: ContainerLifecycle>(
        runtime: &tokio::runtime::Handle,
        lifecycle: &C,
        naming: &ServiceNaming,
        service: &str,
    ) -> Result<Option<String>, ConductorError> {
        runtime.block_on(Self::container_id_for_service_async(
            lifecycle, naming, service,
        ))
    }
}

#[cfg(test)]
mod tests;
