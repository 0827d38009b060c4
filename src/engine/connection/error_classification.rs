//! Classification of `Bollard` errors into semantic errors.
//!
//! Connection failures are mapped onto socket-specific variants so the user
//! sees which endpoint is missing or unreadable. Operation failures are split
//! into the soft outcomes the lookup and lifecycle operations absorb (not
//! found, not modified) and the failures they propagate.

use std::io;
use std::path::Path;

use crate::error::ContainerError;

/// Outcome of classifying an engine error raised by an operation.
#[derive(Debug)]
pub(crate) enum EngineFailure {
    /// The engine answered `404 Not Found`.
    NotFound,
    /// The engine answered `304 Not Modified`; the target is already in the
    /// requested state.
    NotModified,
    /// Any other failure, mapped to the error the caller receives.
    Other(ContainerError),
}

impl EngineFailure {
    /// Convert into the propagated error, treating soft outcomes as rejections.
    pub(crate) fn into_error(self, operation: &str, target: &str) -> ContainerError {
        match self {
            Self::NotFound => ContainerError::OperationFailed {
                operation: operation.to_owned(),
                target: target.to_owned(),
                message: String::from("not found"),
            },
            Self::NotModified => ContainerError::OperationFailed {
                operation: operation.to_owned(),
                target: target.to_owned(),
                message: String::from("not modified"),
            },
            Self::Other(error) => error,
        }
    }
}

/// Classify an error raised while performing `operation` against `target`.
///
/// Daemon responses are the engine rejecting the request; everything else is
/// treated as the daemon being unreachable, which callers may retry.
pub(crate) fn classify_operation_error(
    error: bollard::errors::Error,
    operation: &str,
    target: &str,
) -> EngineFailure {
    match error {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => EngineFailure::NotFound,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304, ..
        } => EngineFailure::NotModified,
        bollard::errors::Error::DockerResponseServerError { message, .. }
        | bollard::errors::Error::DockerStreamError { error: message } => {
            EngineFailure::Other(ContainerError::OperationFailed {
                operation: operation.to_owned(),
                target: target.to_owned(),
                message,
            })
        }
        other => EngineFailure::Other(ContainerError::EngineUnavailable {
            operation: operation.to_owned(),
            message: other.to_string(),
        }),
    }
}

/// Extract the filesystem path from a socket URI.
///
/// HTTP endpoints and bare paths yield `None`.
pub(super) fn extract_socket_path(socket_uri: &str) -> Option<&Path> {
    socket_uri
        .strip_prefix("unix://")
        .or_else(|| socket_uri.strip_prefix("npipe://"))
        .map(Path::new)
}

fn classify_io_error_kind(
    kind: io::ErrorKind,
    socket_path: Option<&Path>,
    error_msg: String,
) -> ContainerError {
    match (kind, socket_path) {
        (io::ErrorKind::PermissionDenied, Some(path)) => ContainerError::PermissionDenied {
            path: path.to_path_buf(),
        },
        (io::ErrorKind::NotFound, Some(path)) => ContainerError::SocketNotFound {
            path: path.to_path_buf(),
        },
        _ => ContainerError::ConnectionFailed { message: error_msg },
    }
}

/// Classify a `Bollard` connection error for the endpoint `socket_uri`.
pub(super) fn classify_connection_error(
    bollard_error: &bollard::errors::Error,
    socket_uri: &str,
) -> ContainerError {
    let socket_path = extract_socket_path(socket_uri);
    let error_msg = bollard_error.to_string();

    if let (bollard::errors::Error::SocketNotFoundError(_), Some(path)) =
        (bollard_error, socket_path)
    {
        return ContainerError::SocketNotFound {
            path: path.to_path_buf(),
        };
    }

    let kind = match bollard_error {
        bollard::errors::Error::IOError { err } => {
            Some(io_error_kind_in_chain(err).unwrap_or_else(|| err.kind()))
        }
        _ => io_error_kind_in_chain(bollard_error),
    };

    match kind {
        Some(found) => classify_io_error_kind(found, socket_path, error_msg),
        None => ContainerError::ConnectionFailed { message: error_msg },
    }
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<io::ErrorKind> {
    let mut current = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
