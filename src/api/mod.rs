//! Orchestration API for conductor-engine commands.
//!
//! One function per command: [`build_conductor`], [`stop_container`],
//! [`remove_container`], [`inspect_container`] and [`find_image`]. They hold
//! the logic the CLI adapter calls, so library embedders get the same
//! behaviour.
//!
//! All functions accept library-owned types (not clap types), take the engine
//! client as an explicit argument and return [`crate::error::Result`]. None of
//! them print or exit the process.

mod build;

pub use build::{BuildConductorParams, build_conductor};

use bollard::models::ContainerInspectResponse;

use crate::config::AppConfig;
use crate::engine::{ContainerLifecycle, EngineConnector, ImageLookup};
use crate::error::Result as ConductorResult;

/// How a command refers to a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerTarget {
    /// A container name or identifier, used as given.
    Name(String),
    /// A service of the configured project.
    Service(String),
}

impl ContainerTarget {
    /// The engine-side container name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` for a service target when no
    /// project name is configured.
    pub fn resolve(&self, config: &AppConfig) -> ConductorResult<String> {
        match self {
            Self::Name(name) => Ok(name.clone()),
            Self::Service(service) => Ok(config.naming()?.container_name_for(service)),
        }
    }
}

/// How a command looks up an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageQuery {
    /// The single image labelled with this fingerprint.
    Fingerprint(String),
    /// A `repository:tag` reference.
    Tag(String),
    /// The `latest` image of a service of the configured project.
    Service(String),
}

/// Stop a container. Absent or already stopped containers are not an error.
///
/// # Errors
///
/// Returns engine failures from [`EngineConnector::stop_container`] and
/// configuration errors from [`ContainerTarget::resolve`].
pub fn stop_container<C: ContainerLifecycle>(
    config: &AppConfig,
    target: &ContainerTarget,
    client: &C,
    runtime_handle: &tokio::runtime::Handle,
) -> ConductorResult<String> {
    let name = target.resolve(config)?;
    EngineConnector::stop_container(runtime_handle, client, &name)?;
    Ok(name)
}

/// Remove a stopped container. Absent containers are not an error.
///
/// # Errors
///
/// Returns engine failures from [`EngineConnector::delete_container`] and
/// configuration errors from [`ContainerTarget::resolve`].
pub fn remove_container<C: ContainerLifecycle>(
    config: &AppConfig,
    target: &ContainerTarget,
    client: &C,
    runtime_handle: &tokio::runtime::Handle,
) -> ConductorResult<String> {
    let name = target.resolve(config)?;
    EngineConnector::delete_container(runtime_handle, client, &name)?;
    Ok(name)
}

/// Inspect a container, returning `None` if it does not exist.
///
/// # Errors
///
/// Returns engine failures from [`EngineConnector::inspect_container`] and
/// configuration errors from [`ContainerTarget::resolve`].
pub fn inspect_container<C: ContainerLifecycle>(
    config: &AppConfig,
    target: &ContainerTarget,
    client: &C,
    runtime_handle: &tokio::runtime::Handle,
) -> ConductorResult<Option<ContainerInspectResponse>> {
    let name = target.resolve(config)?;
    EngineConnector::inspect_container(runtime_handle, client, &name)
}

/// Resolve an image identifier, returning `None` when nothing matches.
///
/// # Errors
///
/// Returns `ImageError::AmbiguousFingerprint` when a fingerprint matches
/// several images, `ConfigError::MissingRequired` for a service query without
/// a project name, and engine failures from the lookup.
pub fn find_image<L: ImageLookup>(
    config: &AppConfig,
    query: &ImageQuery,
    client: &L,
    runtime_handle: &tokio::runtime::Handle,
) -> ConductorResult<Option<String>> {
    match query {
        ImageQuery::Fingerprint(fingerprint) => {
            EngineConnector::image_id_by_fingerprint(runtime_handle, client, fingerprint)
        }
        ImageQuery::Tag(reference) => {
            EngineConnector::image_id_by_tag(runtime_handle, client, reference)
        }
        ImageQuery::Service(service) => {
            let naming = config.naming()?;
            EngineConnector::latest_image_id_for_service(runtime_handle, client, &naming, service)
        }
    }
}
