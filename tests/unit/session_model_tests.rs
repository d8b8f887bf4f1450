use std::time::Duration;

use shell_mcp_server::session::{SessionParams, ShellSession};
use shell_mcp_server::AppError;

#[test]
fn default_params_match_contract() {
    let params = SessionParams::default();
    assert_eq!(params.shell_command, "/bin/bash");
    assert_eq!(params.output_settle, Duration::from_millis(200));
    assert_eq!(params.timeout, Duration::from_millis(120_000));
    assert_eq!(params.sentinel, "<<exit>>");
}

#[test]
fn new_session_is_dead_until_started() {
    let mut session = ShellSession::new(SessionParams::default());
    assert!(!session.started());
    assert!(session.is_dead());
    assert!(!session.timed_out());
}

#[tokio::test]
async fn stop_before_start_fails_with_not_started() {
    let mut session = ShellSession::new(SessionParams::default());
    match session.stop().await {
        Err(AppError::NotStarted) => {}
        other => panic!("expected NotStarted, got {other:?}"),
    }
}

#[tokio::test]
async fn run_before_start_fails_with_not_started() {
    let mut session = ShellSession::new(SessionParams::default());
    match session.run("echo hi").await {
        Err(AppError::NotStarted) => {}
        other => panic!("expected NotStarted, got {other:?}"),
    }
}
