//! Configuration system for conductor-engine.
//!
//! Configuration is merged by `ortho_config` with the precedence CLI flags >
//! environment variables > configuration file > defaults.
//!
//! The configuration file is expected at
//! `~/.config/conductor-engine/config.toml` by default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///var/run/docker.sock"
//! project_name = "shop"
//!
//! [conductor]
//! base_image = "centos:7"
//! assets_dir = "/usr/share/conductor-engine"
//! remove_intermediate = true
//! ```

mod cli;
mod loader;
mod types;


pub use cli::{BuildConductorArgs, Cli, Commands, ContainerArgs, FindImageArgs};
pub use loader::{env_var_names, load_config, load_config_with_env};
pub use types::{AppConfig, ConductorConfig, DEFAULT_ASSETS_DIR, DEFAULT_BASE_IMAGE};
