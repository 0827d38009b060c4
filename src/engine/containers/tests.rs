//! Unit tests for container lifecycle operations and layer commits.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use bollard::models::{ContainerConfig, IdResponse};
use bollard::query_parameters::CommitContainerOptions;
use rstest::rstest;

use super::*;
use crate::engine::images::FINGERPRINT_LABEL_KEY;
use crate::engine::test_support::{MockEngine, ready, runtime, server_error, transport_error};
use crate::error::ContainerError;

fn naming() -> ServiceNaming {
    ServiceNaming::new("demo").expect("valid project")
}

fn engine_stopping(result: fn() -> Result<(), bollard::errors::Error>) -> MockEngine {
    let mut engine = MockEngine::new();
    engine
        .expect_stop_container()
        .times(1)
        .returning(move |_, _| ready(result()));
    engine
}

fn engine_removing(result: fn() -> Result<(), bollard::errors::Error>) -> MockEngine {
    let mut engine = MockEngine::new();
    engine
        .expect_remove_container()
        .times(1)
        .returning(move |_, _| ready(result()));
    engine
}

#[rstest]
#[case::stopped(|| Ok(()))]
#[case::missing(|| Err(server_error(404, "no such container")))]
#[case::already_stopped(|| Err(server_error(304, "")))]
fn stop_is_a_no_op_for_absent_or_stopped_containers(
    #[case] result: fn() -> Result<(), bollard::errors::Error>,
) -> std::io::Result<()> {
    let engine = engine_stopping(result);
    runtime()?
        .block_on(EngineConnector::stop_container_async(&engine, "demo_web"))
        .expect("stop should succeed");
    Ok(())
}

#[rstest]
fn stop_propagates_daemon_failures() -> std::io::Result<()> {
    let engine = engine_stopping(|| Err(server_error(500, "cannot kill container")));
    let result = runtime()?.block_on(EngineConnector::stop_container_async(&engine, "demo_web"));

    assert!(matches!(
        result,
        Err(ConductorError::Container(ContainerError::OperationFailed { ref target, ref message, .. }))
            if target == "demo_web" && message == "cannot kill container"
    ));
    Ok(())
}

#[rstest]
fn stop_reports_unreachable_engine_as_retryable() -> std::io::Result<()> {
    let engine = engine_stopping(|| Err(transport_error()));
    let error = runtime()?
        .block_on(EngineConnector::stop_container_async(&engine, "demo_web"))
        .expect_err("transport failure should propagate");
    assert!(error.is_retryable());
    Ok(())
}

#[rstest]
#[case::removed(|| Ok(()))]
#[case::missing(|| Err(server_error(404, "no such container")))]
fn delete_is_a_no_op_for_absent_containers(
    #[case] result: fn() -> Result<(), bollard::errors::Error>,
) -> std::io::Result<()> {
    let engine = engine_removing(result);
    runtime()?
        .block_on(EngineConnector::delete_container_async(&engine, "demo_web"))
        .expect("delete should succeed");
    Ok(())
}

#[rstest]
fn delete_propagates_conflicts() -> std::io::Result<()> {
    let engine = engine_removing(|| Err(server_error(409, "container is running")));
    let result =
        runtime()?.block_on(EngineConnector::delete_container_async(&engine, "demo_web"));

    assert!(matches!(
        result,
        Err(ConductorError::Container(ContainerError::OperationFailed { ref message, .. }))
            if message == "container is running"
    ));
    Ok(())
}

#[rstest]
fn delete_does_not_force_removal() -> std::io::Result<()> {
    let mut engine = MockEngine::new();
    engine
        .expect_remove_container()
        .times(1)
        .returning(|container, options| {
            assert_eq!(container, "demo_web");
            assert!(!options.is_some_and(|captured| captured.force));
            ready(Ok(()))
        });

    runtime()?
        .block_on(EngineConnector::delete_container_async(&engine, "demo_web"))
        .expect("delete should succeed");
    Ok(())
}

#[rstest]
fn inspect_returns_none_for_missing_container() -> std::io::Result<()> {
    let mut engine = MockEngine::new();
    engine
        .expect_inspect_container()
        .returning(|_| ready(Err(server_error(404, "no such container"))));

    let found = runtime()?
        .block_on(EngineConnector::inspect_container_async(&engine, "demo_web"))
        .expect("missing container should not be an error");
    assert!(found.is_none());
    Ok(())
}

#[rstest]
fn inspect_propagates_transport_failures() -> std::io::Result<()> {
    let mut engine = MockEngine::new();
    engine
        .expect_inspect_container()
        .returning(|_| ready(Err(transport_error())));

    let result =
        runtime()?.block_on(EngineConnector::inspect_container_async(&engine, "demo_web"));
    assert!(matches!(
        result,
        Err(ConductorError::Container(ContainerError::EngineUnavailable { .. }))
    ));
    Ok(())
}

#[rstest]
fn container_id_for_service_inspects_the_derived_name() -> std::io::Result<()> {
    let mut engine = MockEngine::new();
    engine
        .expect_inspect_container()
        .times(1)
        .returning(|container| {
            assert_eq!(container, "demo_web");
            ready(Ok(bollard::models::ContainerInspectResponse {
                id: Some(String::from("c0ffee")),
                ..Default::default()
            }))
        });

    let found = runtime()?
        .block_on(EngineConnector::container_id_for_service_async(
            &engine,
            &naming(),
            "web",
        ))
        .expect("lookup should succeed");
    assert_eq!(found.as_deref(), Some("c0ffee"));
    Ok(())
}

#[derive(Debug, Default)]
struct CapturedCommit {
    options: Option<CommitContainerOptions>,
    config: Option<ContainerConfig>,
}

fn committing_engine() -> (MockEngine, Arc<Mutex<CapturedCommit>>) {
    let mut engine = MockEngine::new();
    let captured = Arc::new(Mutex::new(CapturedCommit::default()));
    let captured_for_closure = Arc::clone(&captured);
    engine
        .expect_commit_container()
        .times(1)
        .returning(move |options, config| {
            let mut captured_locked = captured_for_closure
                .lock()
                .expect("mock capture lock should succeed");
            captured_locked.options = Some(options);
            captured_locked.config = Some(config);
            ready(Ok(IdResponse {
                id: String::from("sha256:layer"),
            }))
        });
    (engine, captured)
}

fn metadata() -> LayerMetadata {
    LayerMetadata {
        command: Some(vec![String::from("nginx"), String::from("-g")]),
        environment: BTreeMap::from([
            (String::from("B"), String::from("2")),
            (String::from("A"), String::from("1")),
        ]),
        labels: BTreeMap::from([
            (String::from("team"), String::from("web")),
            (String::from(FINGERPRINT_LABEL_KEY), String::from("stale")),
        ]),
        working_dir: Some(String::from("/srv")),
        ..LayerMetadata::default()
    }
}

#[rstest]
fn commit_uses_service_repository_and_requested_tag() -> std::io::Result<()> {
    let (engine, captured) = committing_engine();
    let request =
        LayerCommitRequest::new("c0ffee", "web", "fp-1", metadata()).with_tag("20240102030405");

    let layer = runtime()?
        .block_on(EngineConnector::commit_role_as_layer_async(
            &engine,
            &naming(),
            &request,
        ))
        .expect("commit should succeed");

    assert_eq!(
        layer,
        CommittedLayer {
            image_id: String::from("sha256:layer"),
            repository: String::from("demo-web"),
            tag: String::from("20240102030405"),
        }
    );

    let captured_locked = captured.lock().expect("capture lock");
    let options = captured_locked.options.clone().expect("options captured");
    assert_eq!(options.container.as_deref(), Some("c0ffee"));
    assert_eq!(options.repo.as_deref(), Some("demo-web"));
    assert_eq!(options.tag.as_deref(), Some("20240102030405"));
    assert_eq!(
        options.comment.as_deref(),
        Some("Built with Ansible Container (https://github.com/ansible/ansible-container)")
    );
    Ok(())
}

#[rstest]
fn commit_defaults_to_a_utc_timestamp_tag() -> std::io::Result<()> {
    let (engine, _) = committing_engine();
    let request = LayerCommitRequest::new("c0ffee", "web", "fp-1", LayerMetadata::default());

    let layer = runtime()?
        .block_on(EngineConnector::commit_role_as_layer_async(
            &engine,
            &naming(),
            &request,
        ))
        .expect("commit should succeed");

    assert_eq!(layer.tag.len(), 14);
    assert!(layer.tag.chars().all(|c| c.is_ascii_digit()));
    Ok(())
}

#[rstest]
fn metadata_becomes_image_config_with_fingerprint_label() {
    let config = metadata().to_container_config("fp-1");

    assert_eq!(
        config.cmd,
        Some(vec![String::from("nginx"), String::from("-g")])
    );
    assert_eq!(
        config.env,
        Some(vec![String::from("A=1"), String::from("B=2")])
    );
    assert_eq!(config.working_dir.as_deref(), Some("/srv"));
    let labels = config.labels.expect("labels should be set");
    assert_eq!(labels.get(FINGERPRINT_LABEL_KEY).map(String::as_str), Some("fp-1"));
    assert_eq!(labels.get("team").map(String::as_str), Some("web"));
}

#[rstest]
fn empty_metadata_leaves_environment_unset() {
    let config = LayerMetadata::default().to_container_config("fp-1");
    assert!(config.env.is_none());
    assert!(config.cmd.is_none());
}

#[rstest]
fn metadata_deserialises_with_missing_fields() {
    let metadata: LayerMetadata =
        serde_json::from_str(r#"{"command": ["run"], "user": "app"}"#).expect("valid metadata");
    assert_eq!(metadata.command, Some(vec![String::from("run")]));
    assert_eq!(metadata.user.as_deref(), Some("app"));
    assert!(metadata.environment.is_empty());
}

#[rstest]
fn commit_rejection_propagates() -> std::io::Result<()> {
    let mut engine = MockEngine::new();
    engine
        .expect_commit_container()
        .returning(|_, _| ready(Err(server_error(404, "no such container"))));
    let request = LayerCommitRequest::new("gone", "web", "fp-1", LayerMetadata::default());

    let result = runtime()?.block_on(EngineConnector::commit_role_as_layer_async(
        &engine,
        &naming(),
        &request,
    ));
    assert!(matches!(
        result,
        Err(ConductorError::Container(ContainerError::OperationFailed { ref target, .. }))
            if target == "gone"
    ));
    Ok(())
}
