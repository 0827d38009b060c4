//! Socket resolution and container engine connection.
//!
//! Resolves the engine endpoint from configuration, environment variables or
//! the platform default, and opens a `Bollard` client against it.

mod error_classification;
mod health_check;

use bollard::Docker;

use crate::error::ConductorError;
use error_classification::classify_connection_error;
pub(crate) use error_classification::{EngineFailure, classify_operation_error};

/// Environment variable names checked in fallback order after configuration sources.
const FALLBACK_ENV_VARS: &[&str] = &["DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

/// Request timeout in seconds; covers a full conductor image build.
const CONNECTION_TIMEOUT_SECS: u64 = 600;

/// Timeout in seconds for health check operations.
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

#[cfg(unix)]
const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

#[cfg(windows)]
const DEFAULT_SOCKET: &str = "npipe:////./pipe/docker_engine";

/// Resolves container engine socket endpoints from environment variables.
///
/// The environment provider is injected through `mockable::Env` so that
/// resolution can be tested without touching the process environment.
pub struct SocketResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> SocketResolver<'a, E> {
    /// Creates a new socket resolver with the given environment provider.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Returns the first non-empty value of `DOCKER_HOST`, `CONTAINER_HOST`
    /// or `PODMAN_HOST`.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|var_name| self.env.string(var_name))
            .find(|value| !value.is_empty())
    }

    /// Returns the platform default socket path.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }
}

/// How an endpoint string should be handed to `Bollard`.
enum EndpointKind {
    /// `unix://` or `npipe://` URI.
    Socket,
    /// `tcp://`, `http://` or `https://` URI. `tcp://` is rewritten to HTTP.
    Http,
    /// A path without any scheme.
    BarePath,
}

impl EndpointKind {
    fn classify(socket: &str) -> Self {
        if socket.starts_with("unix://") || socket.starts_with("npipe://") {
            Self::Socket
        } else if ["tcp://", "http://", "https://"]
            .iter()
            .any(|scheme| socket.starts_with(scheme))
        {
            Self::Http
        } else {
            Self::BarePath
        }
    }
}

/// Entry point for every engine operation.
///
/// Connection helpers live here alongside the build, lookup and container
/// lifecycle operations, all of which take the engine client as an explicit
/// capability argument.
pub struct EngineConnector;

impl EngineConnector {
    /// Connect to the container engine at the specified endpoint.
    ///
    /// Accepts `unix://`, `npipe://`, `tcp://`, `http://` and `https://`
    /// URIs as well as bare paths. Bare paths starting with `\\` or `//` are
    /// treated as Windows named pipes; all others as Unix sockets.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ConnectionFailed`, `SocketNotFound` or
    /// `PermissionDenied` if the client cannot be created.
    pub fn connect(socket: &str) -> Result<Docker, ConductorError> {
        let result = match EndpointKind::classify(socket) {
            EndpointKind::Socket => Docker::connect_with_socket(
                socket,
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
            EndpointKind::Http => Docker::connect_with_http(
                &socket.replacen("tcp://", "http://", 1),
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
            EndpointKind::BarePath => Docker::connect_with_socket(
                &Self::normalize_bare_path(socket),
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
        };

        result.map_err(|error| ConductorError::from(classify_connection_error(&error, socket)))
    }

    fn normalize_bare_path(path: &str) -> String {
        if path.starts_with("\\\\") || path.starts_with("//") {
            format!("npipe://{path}")
        } else {
            format!("unix://{path}")
        }
    }

    /// Connect using the socket resolved from configuration and environment.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::connect`].
    pub fn connect_with_fallback<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> Result<Docker, ConductorError> {
        let socket = Self::resolve_socket(config_socket, resolver);
        tracing::debug!(socket = %socket, "connecting to container engine");
        Self::connect(&socket)
    }

    /// Resolves the socket endpoint without establishing a connection.
    ///
    /// Resolution order: a non-empty `config_socket`, then the fallback
    /// environment variables, then the platform default.
    #[must_use]
    pub fn resolve_socket<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> String {
        config_socket
            .filter(|socket| !socket.is_empty())
            .map(String::from)
            .or_else(|| resolver.resolve_from_env())
            .unwrap_or_else(|| SocketResolver::<E>::default_socket().to_owned())
    }
}
