//! Container engine connection and management.
//!
//! The socket endpoint is resolved through a priority-based fallback chain:
//!
//! 1. CLI argument (`--engine-socket`)
//! 2. `CONDUCTOR_ENGINE_SOCKET` environment variable
//! 3. Config file (`engine_socket` in TOML)
//! 4. `DOCKER_HOST`, `CONTAINER_HOST`, then `PODMAN_HOST`
//! 5. Platform default (`/var/run/docker.sock` on Unix)
//!
//! Once connected, the engine is driven through the capability traits in
//! [`client`](self) so that every operation can be exercised against a mock.

mod build;
mod client;
mod connection;
mod containers;
mod context;
mod images;
mod naming;
mod template;
#[cfg(test)]
pub(crate) mod test_support;

pub use build::{BuildEvent, BuildEventStream, BuildOptions, BuiltImage, ConductorBuildRequest};
pub use client::{
    BuildInfoStream, ContainerLifecycle, EngineClient, EngineFuture, ImageBuilder, ImageLookup,
};
pub use connection::{EngineConnector, SocketResolver};
pub use containers::{CommittedLayer, LayerCommitRequest, LayerMetadata};
pub use context::{
    BuildContext, CONDUCTOR_DOCKERFILE_TEMPLATE, ConductorAssets, ContextAssembler, ContextEntry,
    ContextEntryKind, OPTIONAL_CONFIG_FILES,
};
pub use images::{FINGERPRINT_LABEL_KEY, FingerprintMatch};
pub use naming::{CONDUCTOR_SERVICE, CONDUCTOR_TAG, ServiceNaming};
pub use template::{PlaceholderRenderer, RenderRequest, RenderVariables, TemplateRenderer};
