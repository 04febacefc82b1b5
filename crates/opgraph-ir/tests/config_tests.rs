use opgraph_ir::{EngineConfig, ExecutionMode};
use opgraph_ops::DispatchPolicy;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn config_survives_a_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("opgraph.toml");

    let config = EngineConfig::default()
        .with_execution_mode(ExecutionMode::Eager)
        .with_dispatch_policy(DispatchPolicy::Strict)
        .with_refine_timeout_ms(1_500);
    config.to_toml_file(&path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("execution_mode = \"eager\""));
    assert!(written.contains("policy = \"strict\""));

    assert_eq!(EngineConfig::from_toml_file(&path).unwrap(), config);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(EngineConfig::from_toml_file(dir.path().join("absent.toml")).is_err());
}
