//! Configuration data types for the conductor engine adapter.

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::engine::{ConductorAssets, ServiceNaming};
use crate::error::{ConductorError, ConfigError};

/// Default base image of the conductor.
pub const DEFAULT_BASE_IMAGE: &str = "centos:7";

/// Default location of the conductor assets.
pub const DEFAULT_ASSETS_DIR: &str = "/usr/share/conductor-engine";

/// Conductor image build configuration.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Image the conductor is layered on.
    #[default(String::from(DEFAULT_BASE_IMAGE))]
    pub base_image: String,

    /// Root of the template, support script and conductor source assets.
    #[default(Utf8PathBuf::from(DEFAULT_ASSETS_DIR))]
    pub assets_dir: Utf8PathBuf,

    /// Remove intermediate containers after a successful build.
    #[default(true)]
    pub remove_intermediate: bool,
}

impl ConductorConfig {
    /// Asset layout rooted at [`Self::assets_dir`].
    #[must_use]
    pub fn assets(&self) -> ConductorAssets {
        ConductorAssets::new(self.assets_dir.clone())
    }
}

/// Root application configuration.
///
/// Loaded from defaults, a configuration file, environment variables and
/// command-line arguments, in increasing order of precedence.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `CONDUCTOR_CONFIG_PATH`
/// 2. `.conductor-engine.toml` in the current working directory
/// 3. `.conductor-engine.toml` in the home directory
/// 4. `~/.config/conductor-engine/config.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "CONDUCTOR",
    post_merge_hook,
    discovery(
        app_name = "conductor-engine",
        env_var = "CONDUCTOR_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".conductor-engine.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// Project whose containers and images are managed.
    pub project_name: Option<String>,

    /// Conductor image build configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub conductor: ConductorConfig,
}

impl AppConfig {
    /// Naming scheme for the configured project.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when no project name is set.
    pub fn naming(&self) -> Result<ServiceNaming, ConductorError> {
        let project = self.project_name.as_deref().ok_or_else(|| {
            ConductorError::from(ConfigError::MissingRequired {
                field: String::from("project_name"),
            })
        })?;
        ServiceNaming::new(project)
    }
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        self.engine_socket = non_blank(self.engine_socket.take());
        self.project_name = non_blank(self.project_name.take());
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}
