//! Then-step assertions for conductor build scenarios.

use rstest_bdd_macros::then;

use super::state::{BuildOutcome, ConductorBuildState, FailureKind, StepResult};

fn outcome(conductor_build_state: &ConductorBuildState) -> StepResult<BuildOutcome> {
    conductor_build_state
        .outcome
        .get()
        .ok_or_else(|| String::from("build outcome should be set"))
}

fn expect_failure(conductor_build_state: &ConductorBuildState, expected: FailureKind) -> StepResult<()> {
    match outcome(conductor_build_state)? {
        BuildOutcome::Failed { kind, .. } if kind == expected => Ok(()),
        BuildOutcome::Failed { kind, message } => Err(format!(
            "expected {expected:?} failure, got {kind:?}: {message}"
        )),
        BuildOutcome::Built { image_id } => {
            Err(format!("expected {expected:?} failure, got image {image_id}"))
        }
    }
}

fn context_paths(conductor_build_state: &ConductorBuildState) -> Vec<String> {
    conductor_build_state.captured_paths.get().unwrap_or_default()
}

#[then("the build succeeds with image {image_id}")]
fn build_succeeds_with_image(
    conductor_build_state: &ConductorBuildState,
    image_id: String,
) -> StepResult<()> {
    match outcome(conductor_build_state)? {
        BuildOutcome::Built { image_id: built } if built == image_id => Ok(()),
        BuildOutcome::Built { image_id: built } => {
            Err(format!("expected image {image_id}, got {built}"))
        }
        BuildOutcome::Failed { message, .. } => {
            Err(format!("expected success, got failure: {message}"))
        }
    }
}

#[then("the engine build is tagged {tag}")]
fn engine_build_is_tagged(conductor_build_state: &ConductorBuildState, tag: String) -> StepResult<()> {
    let captured = conductor_build_state.captured_tag.get().flatten();
    if captured.as_deref() == Some(tag.as_str()) {
        return Ok(());
    }
    Err(format!("expected build tag {tag}, got {captured:?}"))
}

#[then("the build context contains {path}")]
fn build_context_contains(conductor_build_state: &ConductorBuildState, path: String) -> StepResult<()> {
    let paths = context_paths(conductor_build_state);
    if paths.contains(&path) {
        return Ok(());
    }
    Err(format!("expected {path} in build context, found {paths:?}"))
}

#[then("the build context does not contain {path}")]
fn build_context_does_not_contain(
    conductor_build_state: &ConductorBuildState,
    path: String,
) -> StepResult<()> {
    let paths = context_paths(conductor_build_state);
    if paths.contains(&path) {
        return Err(format!("did not expect {path} in build context"));
    }
    Ok(())
}

#[then("the build fails with a build error")]
fn build_fails_with_build_error(conductor_build_state: &ConductorBuildState) -> StepResult<()> {
    expect_failure(conductor_build_state, FailureKind::Build)
}

#[then("the build fails with an assembly error")]
fn build_fails_with_assembly_error(conductor_build_state: &ConductorBuildState) -> StepResult<()> {
    expect_failure(conductor_build_state, FailureKind::Assembly)
}

#[then("the build fails with a retryable error")]
fn build_fails_with_retryable_error(conductor_build_state: &ConductorBuildState) -> StepResult<()> {
    expect_failure(conductor_build_state, FailureKind::Retryable)
}

#[then("the build fails with a missing project name")]
fn build_fails_with_missing_project(conductor_build_state: &ConductorBuildState) -> StepResult<()> {
    expect_failure(conductor_build_state, FailureKind::MissingProject)
}

#[then("the engine was not contacted")]
fn engine_was_not_contacted(conductor_build_state: &ConductorBuildState) -> StepResult<()> {
    let calls = conductor_build_state.engine_call_count.get().unwrap_or(0);
    if calls == 0 {
        return Ok(());
    }
    Err(format!("expected no engine calls, got {calls}"))
}
