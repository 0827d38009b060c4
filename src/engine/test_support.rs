//! Shared engine doubles for unit tests.

use bollard::models::{
    BuildInfo, ContainerConfig, ContainerInspectResponse, IdResponse, ImageInspect, ImageSummary,
};
use bollard::query_parameters::{
    BuildImageOptions, CommitContainerOptions, ListImagesOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use mockall::mock;

use super::client::{BuildInfoStream, ContainerLifecycle, EngineFuture, ImageBuilder, ImageLookup};

mock! {
    #[derive(Debug)]
    pub Engine {}

    impl ImageLookup for Engine {
        fn list_images(&self, options: Option<ListImagesOptions>) -> EngineFuture<'_, Vec<ImageSummary>>;
        fn inspect_image(&self, image: &str) -> EngineFuture<'_, ImageInspect>;
    }

    impl ContainerLifecycle for Engine {
        fn inspect_container(&self, container: &str) -> EngineFuture<'_, ContainerInspectResponse>;
        fn stop_container(
            &self,
            container: &str,
            options: Option<StopContainerOptions>,
        ) -> EngineFuture<'_, ()>;
        fn remove_container(
            &self,
            container: &str,
            options: Option<RemoveContainerOptions>,
        ) -> EngineFuture<'_, ()>;
        fn commit_container(
            &self,
            options: CommitContainerOptions,
            config: ContainerConfig,
        ) -> EngineFuture<'_, IdResponse>;
    }

    impl ImageBuilder for Engine {
        fn build_image(&self, options: BuildImageOptions, context: Vec<u8>) -> BuildInfoStream<'_>;
    }
}

/// An already-completed engine future.
pub(crate) fn ready<'a, T: Send + 'a>(result: Result<T, bollard::errors::Error>) -> EngineFuture<'a, T> {
    Box::pin(async move { result })
}

/// A daemon response with the given status code.
pub(crate) fn server_error(status_code: u16, message: &str) -> bollard::errors::Error {
    bollard::errors::Error::DockerResponseServerError {
        status_code,
        message: String::from(message),
    }
}

/// A transport-level failure.
pub(crate) fn transport_error() -> bollard::errors::Error {
    bollard::errors::Error::IOError {
        err: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
    }
}

/// A build event carrying only output text.
pub(crate) fn stream_event(text: &str) -> BuildInfo {
    BuildInfo {
        stream: Some(String::from(text)),
        ..BuildInfo::default()
    }
}

/// An image with the given identifier.
pub(crate) fn image_summary(id: &str) -> ImageSummary {
    ImageSummary {
        id: String::from(id),
        ..ImageSummary::default()
    }
}

pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
}
