//! Given/when step definitions for conductor build scenarios.

use std::sync::{Arc, Mutex};

use bollard::models::{BuildInfo, ErrorDetail, ImageId, ImageInspect, ImageSummary};
use bollard::query_parameters::{BuildImageOptions, ListImagesOptions};
use conductor_engine::api::{BuildConductorParams, build_conductor};
use conductor_engine::config::{AppConfig, ConductorConfig};
use conductor_engine::engine::{
    BuildInfoStream, CONDUCTOR_DOCKERFILE_TEMPLATE, EngineFuture, ImageBuilder, ImageLookup,
};
use conductor_engine::error::{BuildError, ConductorError, ConfigError};
use mockall::mock;
use rstest_bdd_macros::{given, when};

use super::state::{
    BuildOutcome, ConductorBuildState, EngineBehaviour, FailureKind, ScenarioDir, StepResult,
};

mock! {
    Engine {}

    impl ImageBuilder for Engine {
        fn build_image(&self, options: BuildImageOptions, context: Vec<u8>) -> BuildInfoStream<'_>;
    }

    impl ImageLookup for Engine {
        fn list_images(&self, options: Option<ListImagesOptions>) -> EngineFuture<'_, Vec<ImageSummary>>;
        fn inspect_image(&self, image: &str) -> EngineFuture<'_, ImageInspect>;
    }
}

#[derive(Default)]
struct Captured {
    call_count: usize,
    tag: Option<String>,
    paths: Vec<String>,
}

#[given("a project named {name}")]
fn project_named(conductor_build_state: &ConductorBuildState, name: String) {
    conductor_build_state.project.set(Some(name));
}

#[given("conductor assets are available")]
fn conductor_assets_available(conductor_build_state: &ConductorBuildState) -> StepResult<()> {
    let assets = ScenarioDir::new()?;
    let files = [
        (
            format!("templates/{CONDUCTOR_DOCKERFILE_TEMPLATE}"),
            "FROM {{ conductor_base }}\nCOPY build-src /build-src\n",
        ),
        (String::from("files/get-pip.py"), "print('pip')\n"),
        (String::from("conductor/__init__.py"), ""),
        (String::from("conductor-setup.py"), "setup()\n"),
        (String::from("conductor-requirements.txt"), "pyyaml\n"),
    ];
    for (relative, contents) in files {
        write_file(&assets, &relative, contents)?;
    }
    conductor_build_state.assets.set(assets);
    Ok(())
}

#[given("conductor assets are missing")]
fn conductor_assets_missing(conductor_build_state: &ConductorBuildState) -> StepResult<()> {
    conductor_build_state.assets.set(ScenarioDir::new()?);
    Ok(())
}

#[given("the project provides {file}")]
fn project_provides(conductor_build_state: &ConductorBuildState, file: String) -> StepResult<()> {
    let source = source_dir(conductor_build_state)?;
    write_file(&source, &file, "# provided by the project\n")
}

#[given("the engine reports image {image_id}")]
fn engine_reports_image(conductor_build_state: &ConductorBuildState, image_id: String) {
    conductor_build_state
        .behaviour
        .set(EngineBehaviour::Succeeds(image_id));
}

#[given("the engine reports a build error")]
fn engine_reports_build_error(conductor_build_state: &ConductorBuildState) {
    conductor_build_state
        .behaviour
        .set(EngineBehaviour::ReportsBuildError);
}

#[given("the engine is unreachable")]
fn engine_is_unreachable(conductor_build_state: &ConductorBuildState) {
    conductor_build_state
        .behaviour
        .set(EngineBehaviour::Unreachable);
}

#[when("the conductor image is built")]
fn conductor_image_is_built(conductor_build_state: &ConductorBuildState) -> StepResult<()> {
    let source = source_dir(conductor_build_state)?;
    let assets = match conductor_build_state.assets.get() {
        Some(assets) => assets,
        None => ScenarioDir::new()?,
    };
    let config = AppConfig {
        project_name: conductor_build_state.project.get().flatten(),
        conductor: ConductorConfig {
            assets_dir: assets.path.clone(),
            ..ConductorConfig::default()
        },
        ..AppConfig::default()
    };

    let captured = Arc::new(Mutex::new(Captured::default()));
    let behaviour = conductor_build_state
        .behaviour
        .get()
        .ok_or_else(|| String::from("engine behaviour should be set"))?;
    let engine = setup_engine(behaviour, &captured);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|_| String::from("failed to create tokio runtime for scenario"))?;
    let result = build_conductor(BuildConductorParams {
        config: &config,
        source_dir: &source.path,
        fingerprint: None,
        client: &engine,
        runtime_handle: runtime.handle(),
    });

    let captured_locked = captured
        .lock()
        .map_err(|_| String::from("capture mutex is poisoned"))?;
    conductor_build_state
        .engine_call_count
        .set(captured_locked.call_count);
    conductor_build_state
        .captured_tag
        .set(captured_locked.tag.clone());
    conductor_build_state
        .captured_paths
        .set(captured_locked.paths.clone());

    conductor_build_state.outcome.set(match result {
        Ok(built) => BuildOutcome::Built {
            image_id: built.image_id,
        },
        Err(error) => BuildOutcome::Failed {
            kind: classify_failure_kind(&error),
            message: error.to_string(),
        },
    });
    Ok(())
}

fn setup_engine(behaviour: EngineBehaviour, captured: &Arc<Mutex<Captured>>) -> MockEngine {
    let mut engine = MockEngine::new();
    let captured_for_closure = Arc::clone(captured);
    engine
        .expect_build_image()
        .returning(move |options, context| {
            if let Ok(mut locked) = captured_for_closure.lock() {
                locked.call_count += 1;
                locked.tag = options.t;
                locked.paths = archive_paths(&context);
            }

            let events: Vec<Result<BuildInfo, bollard::errors::Error>> = match &behaviour {
                EngineBehaviour::Succeeds(image_id) => vec![
                    Ok(BuildInfo {
                        stream: Some(String::from("Step 1/1 : FROM centos:7\n")),
                        ..BuildInfo::default()
                    }),
                    Ok(BuildInfo {
                        aux: Some(ImageId {
                            id: Some(image_id.clone()),
                        }),
                        ..BuildInfo::default()
                    }),
                ],
                EngineBehaviour::ReportsBuildError => vec![Ok(BuildInfo {
                    error_detail: Some(ErrorDetail {
                        message: Some(String::from("yum install failed")),
                        ..ErrorDetail::default()
                    }),
                    ..BuildInfo::default()
                })],
                EngineBehaviour::Unreachable => vec![Err(bollard::errors::Error::IOError {
                    err: std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    ),
                })],
            };
            Box::pin(futures_util::stream::iter(events))
        });
    engine
}

fn archive_paths(context: &[u8]) -> Vec<String> {
    let mut archive = tar::Archive::new(context);
    let Ok(entries) = archive.entries() else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            entry
                .path()
                .ok()
                .map(|path| path.to_string_lossy().into_owned())
        })
        .collect()
}

fn source_dir(conductor_build_state: &ConductorBuildState) -> StepResult<ScenarioDir> {
    if let Some(existing) = conductor_build_state.source.get() {
        return Ok(existing);
    }
    let created = ScenarioDir::new()?;
    conductor_build_state.source.set(created.clone());
    Ok(created)
}

fn write_file(dir: &ScenarioDir, relative: &str, contents: &str) -> StepResult<()> {
    let path = dir.path.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|error| format!("failed to create {parent}: {error}"))?;
    }
    std::fs::write(&path, contents).map_err(|error| format!("failed to write {path}: {error}"))
}

fn classify_failure_kind(error: &ConductorError) -> FailureKind {
    if error.is_retryable() {
        return FailureKind::Retryable;
    }
    match error {
        ConductorError::Build(BuildError::AssemblyFailed { .. }) => FailureKind::Assembly,
        ConductorError::Build(BuildError::BuildFailed { .. }) => FailureKind::Build,
        ConductorError::Config(ConfigError::MissingRequired { field }) if field == "project_name" => {
            FailureKind::MissingProject
        }
        _ => FailureKind::Other,
    }
}
