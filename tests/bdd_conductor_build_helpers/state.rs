//! Shared behavioural-test state for conductor build scenarios.

use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use tempfile::TempDir;

/// Step result type for conductor build BDD tests.
pub type StepResult<T> = Result<T, String>;

/// A temporary directory kept alive for the whole scenario.
#[derive(Clone)]
pub struct ScenarioDir {
    pub(crate) _temp_dir: Arc<TempDir>,
    pub(crate) path: Utf8PathBuf,
}

impl ScenarioDir {
    pub(crate) fn new() -> StepResult<Self> {
        let temp_dir = tempfile::tempdir()
            .map_err(|error| format!("failed to create temporary directory: {error}"))?;
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf())
            .map_err(|_| String::from("temporary directory path should be valid UTF-8"))?;
        Ok(Self {
            _temp_dir: Arc::new(temp_dir),
            path,
        })
    }
}

/// How the mocked engine answers the build request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineBehaviour {
    /// The build succeeds and reports this image identifier.
    Succeeds(String),
    /// The build stream carries an embedded error.
    ReportsBuildError,
    /// The engine cannot be reached.
    Unreachable,
}

/// Categorised outcome of a build attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The image was built.
    Built {
        /// Identifier reported for the image.
        image_id: String,
    },
    /// The build failed.
    Failed {
        /// The failure category.
        kind: FailureKind,
        /// Human-readable error message.
        message: String,
    },
}

/// Failure categories asserted by the scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Build context assembly failed.
    Assembly,
    /// The engine reported a failed build.
    Build,
    /// No project name was configured.
    MissingProject,
    /// A retryable engine failure.
    Retryable,
    /// Any other failure.
    Other,
}

/// Shared scenario state for conductor build behavioural tests.
#[derive(Default, ScenarioState)]
pub struct ConductorBuildState {
    /// Configured project name.
    pub(crate) project: Slot<Option<String>>,
    /// Conductor asset root.
    pub(crate) assets: Slot<ScenarioDir>,
    /// Project source directory.
    pub(crate) source: Slot<ScenarioDir>,
    /// Engine behaviour for the build call.
    pub(crate) behaviour: Slot<EngineBehaviour>,
    /// Outcome of the most recent build.
    pub(crate) outcome: Slot<BuildOutcome>,
    /// Repository tag sent to the engine.
    pub(crate) captured_tag: Slot<Option<String>>,
    /// Archive paths of the context sent to the engine.
    pub(crate) captured_paths: Slot<Vec<String>>,
    /// Number of engine build calls.
    pub(crate) engine_call_count: Slot<usize>,
}

/// Fixture providing fresh state for each conductor build scenario.
#[fixture]
pub fn conductor_build_state() -> ConductorBuildState {
    let state = ConductorBuildState::default();
    state.project.set(None);
    state
        .behaviour
        .set(EngineBehaviour::Succeeds(String::from("sha256:default")));
    state.captured_paths.set(Vec::new());
    state.engine_call_count.set(0);
    state
}
