//! Deterministic container and image names for project services.

use crate::error::{ConductorError, ConfigError};

/// Logical service name of the conductor.
pub const CONDUCTOR_SERVICE: &str = "conductor";

/// Tag applied to every conductor image build.
pub const CONDUCTOR_TAG: &str = "conductor";

/// Derives engine-side names from a project name.
///
/// Containers are named `{project}_{service}` and image repositories
/// `{project}-{service}`. For a fixed service both mappings are injective in
/// the project name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNaming {
    project_name: String,
}

impl ServiceNaming {
    /// Create a naming scheme for `project_name`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when the project name is empty
    /// or whitespace-only.
    pub fn new(project_name: impl Into<String>) -> Result<Self, ConductorError> {
        let raw: String = project_name.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(ConductorError::from(ConfigError::MissingRequired {
                field: String::from("project_name"),
            }));
        }

        Ok(Self {
            project_name: String::from(trimmed),
        })
    }

    /// Return the project name.
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Container name for `service`.
    #[must_use]
    pub fn container_name_for(&self, service: &str) -> String {
        format!("{}_{service}", self.project_name)
    }

    /// Image repository name for `service`.
    #[must_use]
    pub fn image_name_for(&self, service: &str) -> String {
        format!("{}-{service}", self.project_name)
    }

    /// `repository:latest` reference for `service`.
    #[must_use]
    pub fn latest_image_for(&self, service: &str) -> String {
        format!("{}:latest", self.image_name_for(service))
    }

    /// `repository:tag` reference of the conductor image.
    #[must_use]
    pub fn conductor_image(&self) -> String {
        format!("{}:{CONDUCTOR_TAG}", self.image_name_for(CONDUCTOR_SERVICE))
    }
}
