//! Engine health check and connect-and-verify helpers.

use std::time::Duration;

use bollard::Docker;

use super::{EngineConnector, HEALTH_CHECK_TIMEOUT_SECS, SocketResolver};
use crate::error::{ConductorError, ContainerError};

impl EngineConnector {
    /// Verify the container engine answers a ping within the health check
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::HealthCheckFailed` if the engine does not
    /// respond correctly, or `ContainerError::HealthCheckTimeout` if it does
    /// not respond in time.
    pub async fn health_check_async(docker: &Docker) -> Result<(), ConductorError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

        tokio::time::timeout(timeout, docker.ping())
            .await
            .map_err(|_| {
                ConductorError::from(ContainerError::HealthCheckTimeout {
                    seconds: HEALTH_CHECK_TIMEOUT_SECS,
                })
            })?
            .map_err(|error| {
                ConductorError::from(ContainerError::HealthCheckFailed {
                    message: error.to_string(),
                })
            })?;
        Ok(())
    }

    /// Connect using fallback resolution, then verify the engine responds.
    ///
    /// # Errors
    ///
    /// Returns connection errors from [`Self::connect`] and health check
    /// errors from [`Self::health_check_async`].
    pub async fn connect_and_verify_async<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> Result<Docker, ConductorError> {
        let docker = Self::connect_with_fallback(config_socket, resolver)?;
        Self::health_check_async(&docker).await?;
        Ok(docker)
    }

    /// Blocking variant of [`Self::connect_and_verify_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::connect_and_verify_async`].
    pub fn connect_and_verify<E: mockable::Env>(
        runtime: &tokio::runtime::Handle,
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> Result<Docker, ConductorError> {
        runtime.block_on(Self::connect_and_verify_async(config_socket, resolver))
    }

    /// Create a Tokio runtime for callers without one.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RuntimeCreationFailed` if the runtime cannot
    /// be created.
    pub fn create_runtime() -> Result<tokio::runtime::Runtime, ConductorError> {
        tokio::runtime::Runtime::new().map_err(|error| {
            ConductorError::from(ContainerError::RuntimeCreationFailed {
                message: error.to_string(),
            })
        })
    }
}
