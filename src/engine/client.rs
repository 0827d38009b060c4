//! Capability traits over the container engine client.
//!
//! Each trait covers one concern of the engine API and is implemented for
//! `bollard::Docker`. Operations take these traits as explicit arguments, so
//! tests drive them with `mockall` doubles instead of a running daemon.

use std::future::Future;
use std::pin::Pin;

use bollard::models::{
    BuildInfo, ContainerConfig, ContainerInspectResponse, IdResponse, ImageInspect, ImageSummary,
};
use bollard::query_parameters::{
    BuildImageOptions, CommitContainerOptions, InspectContainerOptions, ListImagesOptions,
    RemoveContainerOptions, StopContainerOptions,
};
use bollard::{Docker, body_full};
use futures_util::Stream;

/// Boxed future type returned by the capability traits.
pub type EngineFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, bollard::errors::Error>> + Send + 'a>>;

/// Boxed, single-pass stream of raw build-progress events.
pub type BuildInfoStream<'a> =
    Pin<Box<dyn Stream<Item = Result<BuildInfo, bollard::errors::Error>> + Send + 'a>>;

/// Image listing and inspection.
pub trait ImageLookup {
    /// List images matching `options`.
    fn list_images(&self, options: Option<ListImagesOptions>) -> EngineFuture<'_, Vec<ImageSummary>>;

    /// Inspect a single image by name, tag or identifier.
    fn inspect_image(&self, image: &str) -> EngineFuture<'_, ImageInspect>;
}

/// Container inspection, shutdown, removal and commit.
pub trait ContainerLifecycle {
    /// Inspect a container by name or identifier.
    fn inspect_container(&self, container: &str) -> EngineFuture<'_, ContainerInspectResponse>;

    /// Stop a running container.
    fn stop_container(
        &self,
        container: &str,
        options: Option<StopContainerOptions>,
    ) -> EngineFuture<'_, ()>;

    /// Remove a container.
    fn remove_container(
        &self,
        container: &str,
        options: Option<RemoveContainerOptions>,
    ) -> EngineFuture<'_, ()>;

    /// Commit a container's filesystem as a new image.
    fn commit_container(
        &self,
        options: CommitContainerOptions,
        config: ContainerConfig,
    ) -> EngineFuture<'_, IdResponse>;
}

/// Image builds from a tar build context.
pub trait ImageBuilder {
    /// Submit `context` (a tar archive) to the engine's build endpoint.
    ///
    /// The returned stream yields the engine's progress events in order and
    /// ends when the build finishes.
    fn build_image(&self, options: BuildImageOptions, context: Vec<u8>) -> BuildInfoStream<'_>;
}

/// Every capability the conductor adapter needs from an engine client.
pub trait EngineClient: ImageLookup + ContainerLifecycle + ImageBuilder {}

impl<T: ImageLookup + ContainerLifecycle + ImageBuilder> EngineClient for T {}

impl ImageLookup for Docker {
    fn list_images(&self, options: Option<ListImagesOptions>) -> EngineFuture<'_, Vec<ImageSummary>> {
        Box::pin(async move { Self::list_images(self, options).await })
    }

    fn inspect_image(&self, image: &str) -> EngineFuture<'_, ImageInspect> {
        let image_owned = String::from(image);
        Box::pin(async move { Self::inspect_image(self, &image_owned).await })
    }
}

impl ContainerLifecycle for Docker {
    fn inspect_container(&self, container: &str) -> EngineFuture<'_, ContainerInspectResponse> {
        let container_owned = String::from(container);
        Box::pin(async move {
            Self::inspect_container(self, &container_owned, None::<InspectContainerOptions>).await
        })
    }

    fn stop_container(
        &self,
        container: &str,
        options: Option<StopContainerOptions>,
    ) -> EngineFuture<'_, ()> {
        let container_owned = String::from(container);
        Box::pin(async move { Self::stop_container(self, &container_owned, options).await })
    }

    fn remove_container(
        &self,
        container: &str,
        options: Option<RemoveContainerOptions>,
    ) -> EngineFuture<'_, ()> {
        let container_owned = String::from(container);
        Box::pin(async move { Self::remove_container(self, &container_owned, options).await })
    }

    fn commit_container(
        &self,
        options: CommitContainerOptions,
        config: ContainerConfig,
    ) -> EngineFuture<'_, IdResponse> {
        Box::pin(async move { Self::commit_container(self, options, config).await })
    }
}

impl ImageBuilder for Docker {
    fn build_image(&self, options: BuildImageOptions, context: Vec<u8>) -> BuildInfoStream<'_> {
        Box::pin(Self::build_image(
            self,
            options,
            None,
            Some(body_full(context.into())),
        ))
    }
}
