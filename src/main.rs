//! `conductor-engine` application entry point.
//!
//! Drives a Docker-compatible engine on behalf of a conductor-managed
//! project. `eyre` reports errors at the application boundary, converting
//! domain errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/conductor-engine/config.toml` or path from
//!    `CONDUCTOR_CONFIG_PATH`)
//! 3. Environment variables (`CONDUCTOR_*`)
//! 4. Command-line arguments
//!
//! Log verbosity follows `RUST_LOG` and defaults to `info`.

use bollard::Docker;
use clap::Parser;
use conductor_engine::api::{
    self, BuildConductorParams, ContainerTarget, ImageQuery, build_conductor,
};
use conductor_engine::config::{
    AppConfig, BuildConductorArgs, Cli, Commands, ContainerArgs, FindImageArgs, load_config,
};
use conductor_engine::engine::{EngineConnector, SocketResolver};
use conductor_engine::error::Result as ConductorResult;
use eyre::{Report, Result as EyreResult};
use mockable::DefaultEnv;
use tracing_subscriber::EnvFilter;

fn main() -> EyreResult<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli).map_err(Report::from)?;

    run(&cli, &config).map_err(Report::from)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Connect to the engine and execute the CLI command.
///
/// Keeps semantic errors inside the run loop so the CLI boundary owns
/// conversion to `eyre::Report`.
fn run(cli: &Cli, config: &AppConfig) -> ConductorResult<()> {
    let runtime = EngineConnector::create_runtime()?;
    let env = DefaultEnv::new();
    let resolver = SocketResolver::new(&env);
    let docker = EngineConnector::connect_and_verify(
        runtime.handle(),
        config.engine_socket.as_deref(),
        &resolver,
    )?;
    let session = Session {
        config,
        docker: &docker,
        runtime: runtime.handle(),
    };

    match &cli.command {
        Commands::BuildConductor(args) => session.build_conductor(args),
        Commands::Stop(args) => session.stop(args),
        Commands::Rm(args) => session.remove(args),
        Commands::Inspect(args) => session.inspect(args),
        Commands::FindImage(args) => session.find_image(args),
    }
}

struct Session<'a> {
    config: &'a AppConfig,
    docker: &'a Docker,
    runtime: &'a tokio::runtime::Handle,
}

impl Session<'_> {
    #[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
    fn build_conductor(&self, args: &BuildConductorArgs) -> ConductorResult<()> {
        let built = build_conductor(BuildConductorParams {
            config: self.config,
            source_dir: &args.source_dir,
            fingerprint: args.fingerprint.clone(),
            client: self.docker,
            runtime_handle: self.runtime,
        })?;
        println!("{} {}", built.repo_tag, built.image_id);
        Ok(())
    }

    #[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
    fn stop(&self, args: &ContainerArgs) -> ConductorResult<()> {
        let name = api::stop_container(self.config, &target(args), self.docker, self.runtime)?;
        println!("{name}");
        Ok(())
    }

    #[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
    fn remove(&self, args: &ContainerArgs) -> ConductorResult<()> {
        let name = api::remove_container(self.config, &target(args), self.docker, self.runtime)?;
        println!("{name}");
        Ok(())
    }

    #[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
    fn inspect(&self, args: &ContainerArgs) -> ConductorResult<()> {
        let details =
            api::inspect_container(self.config, &target(args), self.docker, self.runtime)?;
        match details {
            Some(found) => println!(
                "{} {}",
                found.id.as_deref().unwrap_or("-"),
                found
                    .state
                    .and_then(|state| state.status)
                    .map_or_else(|| String::from("unknown"), |status| status.to_string())
            ),
            None => println!("not found"),
        }
        Ok(())
    }

    #[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
    fn find_image(&self, args: &FindImageArgs) -> ConductorResult<()> {
        let query = args
            .fingerprint
            .clone()
            .map(ImageQuery::Fingerprint)
            .or_else(|| args.tag.clone().map(ImageQuery::Tag))
            .unwrap_or_else(|| ImageQuery::Service(args.service.clone().unwrap_or_default()));
        let found = api::find_image(self.config, &query, self.docker, self.runtime)?;
        println!("{}", found.as_deref().unwrap_or("not found"));
        Ok(())
    }
}

fn target(args: &ContainerArgs) -> ContainerTarget {
    if args.service {
        ContainerTarget::Service(args.container.clone())
    } else {
        ContainerTarget::Name(args.container.clone())
    }
}
