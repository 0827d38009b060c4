//! Image identity lookups.

use std::collections::HashMap;

use bollard::query_parameters::ListImagesOptionsBuilder;

use super::client::ImageLookup;
use super::connection::{EngineConnector, EngineFailure, classify_operation_error};
use super::naming::ServiceNaming;
use crate::error::{ConductorError, ImageError};

/// Label key carrying the content-derived fingerprint of a build.
pub const FINGERPRINT_LABEL_KEY: &str = "com.ansible.container.fingerprint";

/// Outcome of looking up images by fingerprint label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintMatch {
    /// No image carries the fingerprint.
    None,
    /// Exactly one image carries the fingerprint.
    One(String),
    /// Several images carry the fingerprint.
    Many(Vec<String>),
}

impl FingerprintMatch {
    fn from_ids(mut ids: Vec<String>) -> Self {
        match ids.len() {
            0 => Self::None,
            1 => ids.pop().map_or(Self::None, Self::One),
            _ => Self::Many(ids),
        }
    }

    /// Collapse the match into a single identifier.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::AmbiguousFingerprint` for [`Self::Many`].
    pub fn into_unique(self, fingerprint: &str) -> Result<Option<String>, ImageError> {
        match self {
            Self::None => Ok(None),
            Self::One(id) => Ok(Some(id)),
            Self::Many(image_ids) => Err(ImageError::AmbiguousFingerprint {
                fingerprint: fingerprint.to_owned(),
                image_ids,
            }),
        }
    }
}

impl EngineConnector {
    /// List every image, intermediate layers included, labelled with
    /// `fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::EngineUnavailable` or
    /// `ContainerError::OperationFailed` when the listing fails.
    pub async fn find_images_by_fingerprint_async<L: ImageLookup>(
        lookup: &L,
        fingerprint: &str,
    ) -> Result<FingerprintMatch, ConductorError> {
        let label_filter = format!("{FINGERPRINT_LABEL_KEY}={fingerprint}");
        let filters = HashMap::from([("label", vec![label_filter.as_str()])]);
        let options = ListImagesOptionsBuilder::default()
            .all(true)
            .filters(&filters)
            .build();

        let images = lookup.list_images(Some(options)).await.map_err(|error| {
            ConductorError::from(
                classify_operation_error(error, "list images", &label_filter)
                    .into_error("list images", &label_filter),
            )
        })?;

        let found = FingerprintMatch::from_ids(images.into_iter().map(|image| image.id).collect());
        tracing::debug!(fingerprint, ?found, "looked up images by fingerprint");
        Ok(found)
    }

    /// Identifier of the single image labelled with `fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::AmbiguousFingerprint` when several images match,
    /// plus the errors of [`Self::find_images_by_fingerprint_async`].
    pub async fn image_id_by_fingerprint_async<L: ImageLookup>(
        lookup: &L,
        fingerprint: &str,
    ) -> Result<Option<String>, ConductorError> {
        let found = Self::find_images_by_fingerprint_async(lookup, fingerprint).await?;
        found
            .into_unique(fingerprint)
            .map_err(ConductorError::from)
    }

    /// Identifier of the image tagged `reference`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::EngineUnavailable` or
    /// `ContainerError::OperationFailed` when the inspection fails for a
    /// reason other than the image not existing.
    pub async fn image_id_by_tag_async<L: ImageLookup>(
        lookup: &L,
        reference: &str,
    ) -> Result<Option<String>, ConductorError> {
        match lookup.inspect_image(reference).await {
            Ok(inspect) => {
                tracing::debug!(reference, id = ?inspect.id, "resolved image by tag");
                Ok(inspect.id)
            }
            Err(error) => match classify_operation_error(error, "inspect image", reference) {
                EngineFailure::NotFound => {
                    tracing::debug!(reference, "image not found");
                    Ok(None)
                }
                failure => Err(ConductorError::from(
                    failure.into_error("inspect image", reference),
                )),
            },
        }
    }

    /// Identifier of `service`'s `latest` image, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::image_id_by_tag_async`].
    pub async fn latest_image_id_for_service_async<L: ImageLookup>(
        lookup: &L,
        naming: &ServiceNaming,
        service: &str,
    ) -> Result<Option<String>, ConductorError> {
        Self::image_id_by_tag_async(lookup, &naming.latest_image_for(service)).await
    }

    /// Blocking variant of [`Self::image_id_by_fingerprint_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::image_id_by_fingerprint_async`].
    pub fn image_id_by_fingerprint<L: ImageLookup>(
        runtime: &tokio::runtime::Handle,
        lookup: &L,
        fingerprint: &str,
    ) -> Result<Option<String>, ConductorError> {
        runtime.block_on(Self::image_id_by_fingerprint_async(lookup, fingerprint))
    }

    /// Blocking variant of [`Self::image_id_by_tag_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::image_id_by_tag_async`].
    pub fn image_id_by_tag<L: ImageLookup>(
        runtime: &tokio::runtime::Handle,
        lookup: &L,
        reference: &str,
    ) -> Result<Option<String>, ConductorError> {
        runtime.block_on(Self::image_id_by_tag_async(lookup, reference))
    }

    /// Blocking variant of [`Self::latest_image_id_for_service_async`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::latest_image_id_for_service_async`].
    pub fn latest_image_id_for_service<L: ImageLookup>(
        runtime: &tokio::runtime::Handle,
        lookup: &L,
        naming: &ServiceNaming,
        service: &str,
    ) -> Result<Option<String>, ConductorError> {
        runtime.block_on(Self::latest_image_id_for_service_async(
            lookup, naming, service,
        ))
    }
}
