//! Conductor image build orchestration.

use camino::Utf8Path;

use crate::config::AppConfig;
use crate::engine::{
    BuiltImage, ConductorBuildRequest, ContextAssembler, EngineConnector, ImageBuilder,
    ImageLookup,
};
use crate::error::Result as ConductorResult;

/// Parameters for building the conductor image.
pub struct BuildConductorParams<'a, C> {
    /// Application configuration (project name and conductor settings).
    pub config: &'a AppConfig,
    /// Directory holding the project's optional configuration files.
    pub source_dir: &'a Utf8Path,
    /// Fingerprint label applied to the built image.
    pub fingerprint: Option<String>,
    /// Engine client the build is submitted to.
    pub client: &'a C,
    /// Tokio runtime handle for blocking execution.
    pub runtime_handle: &'a tokio::runtime::Handle,
}

/// Assemble the conductor build context and build the conductor image.
///
/// # Errors
///
/// Returns `ConfigError::MissingRequired` without a project name, the
/// `BuildError` variants for assembly and build failures, and
/// `ContainerError::EngineUnavailable` when the engine cannot be reached.
pub fn build_conductor<C: ImageBuilder + ImageLookup>(
    params: BuildConductorParams<'_, C>,
) -> ConductorResult<BuiltImage> {
    let BuildConductorParams {
        config,
        source_dir,
        fingerprint,
        client,
        runtime_handle,
    } = params;

    let naming = config.naming()?;
    let assembler = ContextAssembler::new(config.conductor.assets());
    let request = ConductorBuildRequest::new(naming, source_dir, &config.conductor.base_image)
        .with_remove_intermediate(config.conductor.remove_intermediate)
        .with_fingerprint(fingerprint);

    EngineConnector::build_conductor_image(runtime_handle, client, &assembler, &request)
}
