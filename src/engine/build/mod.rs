//! Image builds from an assembled build context.
//!
//! A build is exposed as a lazy, single-pass [`BuildEventStream`]. The engine
//! reports recipe failures inside the event stream rather than through the
//! HTTP status, so the stream inspects every event and ends with
//! `BuildError::BuildFailed` as soon as one carries an error.

use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use bollard::models::BuildInfo;
use bollard::query_parameters::{BuildImageOptions, BuildImageOptionsBuilder};
use camino::{Utf8Path, Utf8PathBuf};
use futures_util::{Stream, StreamExt};

use super::client::{BuildInfoStream, ImageBuilder, ImageLookup};
use super::connection::{EngineConnector, EngineFailure, classify_operation_error};
use super::context::{BuildContext, ContextAssembler};
use super::images::FINGERPRINT_LABEL_KEY;
use super::naming::ServiceNaming;
use super::template::TemplateRenderer;
use crate::error::{BuildError, ConductorError, ContainerError, ImageError};

const BUILD_OPERATION: &str = "build image";
const DOCKERFILE: &str = "Dockerfile";

/// One progress event reported by the engine during a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEvent {
    /// Build output text.
    pub stream: Option<String>,
    /// Status line, typically from base image pulls.
    pub status: Option<String>,
    /// Image identifier reported once the image exists.
    pub image_id: Option<String>,
    /// Error reported by the engine.
    pub error: Option<String>,
}

impl From<BuildInfo> for BuildEvent {
    fn from(info: BuildInfo) -> Self {
        Self {
            stream: info.stream,
            status: info.status,
            image_id: info.aux.and_then(|aux| aux.id),
            error: info.error_detail.and_then(|detail| detail.message),
        }
    }
}

/// Parameters of a single image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    repo_tag: String,
    remove_intermediate: bool,
    fingerprint: Option<String>,
}

impl BuildOptions {
    /// Build `repo_tag`, removing intermediate containers.
    #[must_use]
    pub fn new(repo_tag: impl Into<String>) -> Self {
        Self {
            repo_tag: repo_tag.into(),
            remove_intermediate: true,
            fingerprint: None,
        }
    }

    /// Choose whether intermediate containers are removed after a
    /// successful build.
    #[must_use]
    pub const fn with_remove_intermediate(mut self, remove_intermediate: bool) -> Self {
        self.remove_intermediate = remove_intermediate;
        self
    }

    /// Label the built image with `fingerprint`.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// The `repository:tag` being built.
    #[must_use]
    pub fn repo_tag(&self) -> &str {
        &self.repo_tag
    }

    /// Whether intermediate containers are removed.
    #[must_use]
    pub const fn remove_intermediate(&self) -> bool {
        self.remove_intermediate
    }

    /// Fingerprint label value, if any.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    fn to_engine_options(&self) -> BuildImageOptions {
        let builder = BuildImageOptionsBuilder::default()
            .dockerfile(DOCKERFILE)
            .t(&self.repo_tag)
            .rm(self.remove_intermediate);

        match &self.fingerprint {
            Some(fingerprint) => {
                let labels = HashMap::from([(FINGERPRINT_LABEL_KEY, fingerprint.as_str())]);
                builder.labels(&labels).build()
            }
            None => builder.build(),
        }
    }
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    /// Engine identifier of the built image.
    pub image_id: String,
    /// The `repository:tag` applied to the image.
    pub repo_tag: String,
}

/// Everything needed to build a project's conductor image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConductorBuildRequest {
    naming: ServiceNaming,
    source_dir: Utf8PathBuf,
    base_image: String,
    options: BuildOptions,
}

impl ConductorBuildRequest {
    /// Build the conductor image of `naming`'s project from `source_dir` on
    /// top of `base_image`.
    #[must_use]
    pub fn new(
        naming: ServiceNaming,
        source_dir: impl Into<Utf8PathBuf>,
        base_image: impl Into<String>,
    ) -> Self {
        let options = BuildOptions::new(naming.conductor_image());
        Self {
            naming,
            source_dir: source_dir.into(),
            base_image: base_image.into(),
            options,
        }
    }

    /// Choose whether intermediate containers are removed.
    #[must_use]
    pub fn with_remove_intermediate(mut self, remove_intermediate: bool) -> Self {
        self.options = self.options.with_remove_intermediate(remove_intermediate);
        self
    }

    /// Label the conductor image with `fingerprint`.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.options = self.options.with_fingerprint(fingerprint);
        self
    }

    /// Naming scheme of the project.
    #[must_use]
    pub const fn naming(&self) -> &ServiceNaming {
        &self.naming
    }

    /// Directory holding the project's optional configuration files.
    #[must_use]
    pub fn source_dir(&self) -> &Utf8Path {
        &self.source_dir
    }

    /// Base image the conductor is layered on.
    #[must_use]
    pub fn base_image(&self) -> &str {
        &self.base_image
    }

    /// Build parameters.
    #[must_use]
    pub const fn options(&self) -> &BuildOptions {
        &self.options
    }
}

/// Lazy, single-pass stream of build events.
///
/// Yields `Ok` for each progress event. The first embedded build error or
/// engine failure is yielded as `Err`, after which the stream is exhausted.
/// Dropping the stream abandons the build's output.
pub struct BuildEventStream<'a> {
    inner: BuildInfoStream<'a>,
    repo_tag: String,
    finished: bool,
}

impl<'a> BuildEventStream<'a> {
    fn new(inner: BuildInfoStream<'a>, repo_tag: String) -> Self {
        Self {
            inner,
            repo_tag,
            finished: false,
        }
    }

    fn fail(&mut self, error: ConductorError) -> Poll<Option<Result<BuildEvent, ConductorError>>> {
        self.finished = true;
        tracing::info!(image = %self.repo_tag, error = %error, "image build failed");
        Poll::Ready(Some(Err(error)))
    }

    fn build_failed(&self, message: String) -> ConductorError {
        ConductorError::from(BuildError::BuildFailed {
            image: self.repo_tag.clone(),
            message,
        })
    }

    fn map_engine_error(&self, error: bollard::errors::Error) -> ConductorError {
        match classify_operation_error(error, BUILD_OPERATION, &self.repo_tag) {
            EngineFailure::Other(ContainerError::OperationFailed { message, .. }) => {
                self.build_failed(message)
            }
            failure => ConductorError::from(failure.into_error(BUILD_OPERATION, &self.repo_tag)),
        }
    }
}

impl Stream for BuildEventStream<'_> {
    type Item = Result<BuildEvent, ConductorError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(engine_error))) => {
                let error = this.map_engine_error(engine_error);
                this.fail(error)
            }
            Poll::Ready(Some(Ok(info))) => {
                let mut event = BuildEvent::from(info);
                if let Some(message) = event.error.take() {
                    let error = this.build_failed(message);
                    return this.fail(error);
                }
                log_event(&this.repo_tag, &event);
                Poll::Ready(Some(Ok(event)))
            }
        }
    }
}

fn log_event(repo_tag: &str, event: &BuildEvent) {
    if let Some(text) = event.stream.as_deref().map(str::trim_end).filter(|t| !t.is_empty()) {
        tracing::info!(image = %repo_tag, "{text}");
    }
    if let Some(status) = &event.status {
        tracing::info!(image = %repo_tag, status = %status, "build status");
    }
    if let Some(image_id) = &event.image_id {
        tracing::info!(image = %repo_tag, image_id = %image_id, "image built");
    }
}

impl EngineConnector {
    /// Submit `context` to the engine and return the build's event stream.
    ///
    /// Nothing is sent until the stream is first polled.
    pub fn stream_build<'a, B: ImageBuilder>(
        builder: &'a B,
        context: BuildContext,
        options: &BuildOptions,
    ) -> BuildEventStream<'a> {
        tracing::info!(
            image = %options.repo_tag(),
            entries = context.manifest().len(),
            digest = %context.digest(),
            "submitting image build"
        );
        let inner = builder.build_image(options.to_engine_options(), context.into_archive());
        BuildEventStream::new(inner, options.repo_tag().to_owned())
    }

    /// Build an image and wait for the build to finish.
    ///
    /// The image identifier is taken from the last event reporting one; if
    /// the engine reports none, the image is inspected by tag.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::BuildFailed` when the recipe fails,
    /// `ContainerError::EngineUnavailable` when the engine cannot be reached,
    /// and `ImageError::LookupFailed` when the built image cannot be resolved.
    pub async fn build_image_async<C: ImageBuilder + ImageLookup>(
        client: &C,
        context: BuildContext,
        options: &BuildOptions,
    ) -> Result<BuiltImage, ConductorError> {
        let mut events = Self::stream_build(client, context, options);
        let mut reported_id = None;

        while let Some(event) = events.next().await {
            if let Some(id) = event?.image_id {
                reported_id = Some(id);
            }
        }

        let image_id = match reported_id {
            Some(id) => id,
            None => Self::resolve_built_image_id(client, options.repo_tag()).await?,
        };

        Ok(BuiltImage {
            image_id,
            repo_tag: options.repo_tag().to_owned(),
        })
    }

    async fn resolve_built_image_id<L: ImageLookup>(
        lookup: &L,
        repo_tag: &str,
    ) -> Result<String, ConductorError> {
        let lookup_failed = |message: &str| {
            ConductorError::from(ImageError::LookupFailed {
                reference: repo_tag.to_owned(),
                message: message.to_owned(),
            })
        };

        match lookup.inspect_image(repo_tag).await {
            Ok(inspect) => inspect
                .id
                .ok_or_else(|| lookup_failed("engine reported no image identifier")),
            Err(error) => match classify_operation_error(error, "inspect image", repo_tag) {
                EngineFailure::NotFound => {
                    Err(lookup_failed("image missing after a successful build"))
                }
                failure => Err(ConductorError::from(
                    failure.into_error("inspect image", repo_tag),
                )),
            },
        }
    }

    /// Blocking variant of [`Self::build_image_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::build_image_async`].
    pub fn build_image<C: ImageBuilder + ImageLookup>(
        runtime: &tokio::runtime::Handle,
        client: &C,
        context: BuildContext,
        options: &BuildOptions,
    ) -> Result<BuiltImage, ConductorError> {
        runtime.block_on(Self::build_image_async(client, context, options))
    }

    /// Assemble the conductor build context and build the conductor image.
    ///
    /// # Errors
    ///
    /// Returns assembly and template errors from
    /// [`ContextAssembler::assemble`], plus the errors of
    /// [`Self::build_image_async`]. Nothing is sent to the engine when
    /// assembly fails.
    pub async fn build_conductor_image_async<C, R>(
        client: &C,
        assembler: &ContextAssembler<R>,
        request: &ConductorBuildRequest,
    ) -> Result<BuiltImage, ConductorError>
    where
        C: ImageBuilder + ImageLookup,
        R: TemplateRenderer,
    {
        tracing::info!(
            project = request.naming().project_name(),
            base_image = request.base_image(),
            "building conductor image"
        );
        let context = assembler.assemble(request.source_dir(), request.base_image())?;
        Self::build_image_async(client, context, request.options()).await
    }

    /// Blocking variant of [`Self::build_conductor_image_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::build_conductor_image_async`].
    pub fn build_conductor_image<C, R>(
        runtime: &tokio::runtime::Handle,
        client: &C,
        assembler: &ContextAssembler<R>,
        request: &ConductorBuildRequest,
    ) -> Result<BuiltImage, ConductorError>
    where
        C: ImageBuilder + ImageLookup,
        R: TemplateRenderer,
    {
        runtime.block_on(Self::build_conductor_image_async(client, assembler, request))
    }
}
