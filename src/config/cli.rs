//! Command-line argument definitions for `conductor-engine`.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Command-line interface for `conductor-engine`.
#[derive(Debug, Parser)]
#[command(name = "conductor-engine")]
#[command(
    author,
    version,
    about = "Drive a container engine for a conductor-managed project"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long, global = true)]
    pub engine_socket: Option<String>,

    /// Project name.
    #[arg(long, global = true)]
    pub project: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the project's conductor image.
    BuildConductor(BuildConductorArgs),

    /// Stop a container.
    Stop(ContainerArgs),

    /// Remove a stopped container.
    Rm(ContainerArgs),

    /// Show a container's engine details.
    Inspect(ContainerArgs),

    /// Resolve an image identifier.
    FindImage(FindImageArgs),
}

/// Arguments for the `build-conductor` subcommand.
#[derive(Debug, Parser)]
pub struct BuildConductorArgs {
    /// Directory holding the project's optional configuration files.
    #[arg(default_value = ".")]
    pub source_dir: Utf8PathBuf,

    /// Base image for the conductor.
    #[arg(long)]
    pub base_image: Option<String>,

    /// Root directory of the conductor assets.
    #[arg(long)]
    pub assets_dir: Option<Utf8PathBuf>,

    /// Fingerprint label applied to the built image.
    #[arg(long)]
    pub fingerprint: Option<String>,

    /// Keep intermediate build containers.
    #[arg(long)]
    pub keep_intermediate: bool,
}

/// Arguments identifying a container.
#[derive(Debug, Parser)]
pub struct ContainerArgs {
    /// Container name or identifier, or a service name with `--service`.
    #[arg(required = true)]
    pub container: String,

    /// Treat the argument as a service of the configured project.
    #[arg(long)]
    pub service: bool,
}

/// Arguments for the `find-image` subcommand.
#[derive(Debug, Parser)]
#[group(required = true, multiple = false)]
pub struct FindImageArgs {
    /// Find the image labelled with this fingerprint.
    #[arg(long)]
    pub fingerprint: Option<String>,

    /// Find the image with this `repository:tag`.
    #[arg(long)]
    pub tag: Option<String>,

    /// Find the `latest` image of this service.
    #[arg(long)]
    pub service: Option<String>,
}
