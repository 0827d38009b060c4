//! Semantic error types for the conductor engine adapter.
//!
//! This module defines the error hierarchy for the crate, following the
//! principle of using semantic error enums (via `thiserror`) for conditions the
//! caller might inspect or retry, while reserving opaque errors
//! (`eyre::Report`) for the application boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the expected path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path where the configuration file was expected.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while assembling a build context or running an image build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A required build input was missing or unreadable.
    #[error("failed to assemble build context from '{path}': {message}")]
    AssemblyFailed {
        /// The input path that could not be used.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The build recipe template could not be rendered.
    #[error("failed to render template '{template}': {message}")]
    TemplateRenderFailed {
        /// The template name.
        template: String,
        /// A description of the rendering failure.
        message: String,
    },

    /// The engine ran the build and the recipe failed.
    ///
    /// The message is the engine's own error text, unmodified.
    #[error("build of image '{image}' failed: {message}")]
    BuildFailed {
        /// The `repository:tag` being built.
        image: String,
        /// The error reported inside the build event stream.
        message: String,
    },
}

/// Errors that can occur during container engine operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// Health check failed - engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// Failed to create the Tokio runtime used by synchronous helpers.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the runtime failure.
        message: String,
    },

    /// The engine daemon could not be reached while performing an operation.
    #[error("container engine unavailable during {operation}: {message}")]
    EngineUnavailable {
        /// The operation being attempted.
        operation: String,
        /// A description of the transport failure.
        message: String,
    },

    /// The engine rejected an operation.
    #[error("{operation} failed for '{target}': {message}")]
    OperationFailed {
        /// The operation being attempted.
        operation: String,
        /// The container or image the operation targeted.
        target: String,
        /// The engine's error message.
        message: String,
    },
}

/// Errors that can occur during image lookups.
#[derive(Debug, Error)]
pub enum ImageError {
    /// More than one image carries the same fingerprint label.
    #[error(
        "fingerprint '{fingerprint}' matches {} images: {}",
        .image_ids.len(),
        .image_ids.join(", ")
    )]
    AmbiguousFingerprint {
        /// The fingerprint that was looked up.
        fingerprint: String,
        /// Identifiers of every matching image.
        image_ids: Vec<String>,
    },

    /// An image expected to exist could not be resolved to an identifier,
    /// either because the engine no longer knows the reference (for example
    /// right after a build reported success) or because it reported the
    /// image without an identifier.
    #[error("image '{reference}' could not be resolved: {message}")]
    LookupFailed {
        /// The tag or filter used for the lookup.
        reference: String,
        /// A description of the failure.
        message: String,
    },
}

/// Top-level error type for the crate.
///
/// This enum aggregates all domain-specific errors into a single type. At the
/// application boundary (main.rs), these errors are converted to
/// `eyre::Report` for human-readable error reporting.
#[derive(Debug, Error)]
pub enum ConductorError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred while assembling or building an image.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// An error occurred during container engine operations.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// An error occurred during an image lookup.
    #[error(transparent)]
    Image(#[from] ImageError),
}

impl ConductorError {
    /// Whether the caller may reasonably retry the failed operation.
    ///
    /// Only engine reachability failures qualify. Local assembly and template
    /// problems, failed build recipes, and rejected operations need a fix
    /// before another attempt can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Container(
                ContainerError::ConnectionFailed { .. }
                    | ContainerError::EngineUnavailable { .. }
                    | ContainerError::HealthCheckFailed { .. }
                    | ContainerError::HealthCheckTimeout { .. }
            )
        )
    }
}

/// A specialised `Result` type for conductor engine operations.
pub type Result<T> = std::result::Result<T, ConductorError>;
