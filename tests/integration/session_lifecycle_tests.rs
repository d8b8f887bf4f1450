//! Session lifecycle integration tests against a real shell process.
//!
//! Validates start/stop state transitions, forced restart, and the
//! idempotence of stopping a session whose process already exited.

#![cfg(unix)]

use shell_mcp_server::session::{SessionParams, ShellSession};
use shell_mcp_server::AppError;

fn test_session() -> ShellSession {
    ShellSession::new(SessionParams::default())
}

#[tokio::test]
async fn start_then_stop_round_trip() {
    let mut session = test_session();
    session.start(false).await.expect("start");
    assert!(session.started());
    assert!(!session.is_dead());

    session.stop().await.expect("stop");
    assert!(!session.started());
    assert!(session.is_dead());
}

#[tokio::test]
async fn double_start_without_force_fails() {
    let mut session = test_session();
    session.start(false).await.expect("start");

    match session.start(false).await {
        Err(AppError::AlreadyStarted) => {}
        other => panic!("expected AlreadyStarted, got {other:?}"),
    }

    session.stop().await.expect("stop");
}

#[tokio::test]
async fn forced_start_replaces_live_process() {
    let mut session = test_session();
    session.start(false).await.expect("start");
    session
        .run("REPLACED=yes")
        .await
        .expect("set marker variable");

    session.start(true).await.expect("forced restart");

    // The replacement shell must not see state from the old one.
    let out = session.run("echo \"marker:$REPLACED\"").await.expect("run");
    assert_eq!(out.output.expect("stdout").trim(), "marker:");

    session.stop().await.expect("stop");
}

#[tokio::test]
async fn double_stop_fails_with_not_started() {
    let mut session = test_session();
    session.start(false).await.expect("start");
    session.stop().await.expect("first stop");

    match session.stop().await {
        Err(AppError::NotStarted) => {}
        other => panic!("expected NotStarted, got {other:?}"),
    }
}

#[tokio::test]
async fn stopping_an_exited_process_is_a_no_op() {
    let mut session = test_session();
    session.start(false).await.expect("start");

    // Kill the shell from inside, then give it a moment to die.
    let _ = session.run("exit 0").await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(session.is_dead());

    session.stop().await.expect("stop after exit");
    assert!(!session.started());
}

#[tokio::test]
async fn run_after_shell_exit_reports_process_exited() {
    let mut session = test_session();
    session.start(false).await.expect("start");

    let _ = session.run("exit 3").await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    match session.run("echo hi").await {
        Err(AppError::ProcessExited(code)) => assert_eq!(code, 3),
        other => panic!("expected ProcessExited, got {other:?}"),
    }
}
