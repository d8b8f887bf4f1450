//! Integration tests for the session controller and its request state
//! machine, driving real shell processes end to end.

#![cfg(unix)]

use std::sync::Arc;

use shell_mcp_server::config::GlobalConfig;
use shell_mcp_server::controller::{SessionController, ShellRequest};
use shell_mcp_server::AppError;

fn controller() -> SessionController {
    SessionController::new(&GlobalConfig::default())
}

fn command(cmd: &str) -> ShellRequest {
    ShellRequest {
        command: Some(cmd.to_owned()),
        ..ShellRequest::default()
    }
}

#[tokio::test]
async fn empty_request_is_a_caller_error() {
    let controller = controller();
    match controller.handle(ShellRequest::default()).await {
        Err(AppError::NoCommandProvided) => {}
        other => panic!("expected NoCommandProvided, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_command_is_treated_as_absent() {
    let controller = controller();
    match controller.handle(command("   ")).await {
        Err(AppError::NoCommandProvided) => {}
        other => panic!("expected NoCommandProvided, got {other:?}"),
    }
}

#[tokio::test]
async fn stop_without_session_is_informational() {
    let controller = controller();
    let response = controller
        .handle(ShellRequest {
            stop: true,
            ..ShellRequest::default()
        })
        .await
        .expect("stop dispatch");

    assert_eq!(response.blocks, vec!["no session to stop".to_owned()]);
}

#[tokio::test]
async fn restart_always_confirms() {
    let controller = controller();

    // Restart with no prior session.
    let response = controller
        .handle(ShellRequest {
            restart: true,
            ..ShellRequest::default()
        })
        .await
        .expect("restart");
    assert_eq!(response.blocks, vec!["tool has been restarted".to_owned()]);

    // Restart again over the live session.
    let response = controller
        .handle(ShellRequest {
            restart: true,
            ..ShellRequest::default()
        })
        .await
        .expect("second restart");
    assert_eq!(response.blocks, vec!["tool has been restarted".to_owned()]);
}

#[tokio::test]
async fn first_command_spawns_a_session() {
    let controller = controller();
    let response = controller
        .handle(command("echo 'Hello, World!'"))
        .await
        .expect("run");

    assert_eq!(response.blocks, vec!["Hello, World!".to_owned()]);
}

#[tokio::test]
async fn state_persists_until_restart() {
    let controller = controller();
    controller.handle(command("PERSIST=42")).await.expect("set");
    let response = controller
        .handle(command("echo $PERSIST"))
        .await
        .expect("read");
    assert_eq!(response.blocks, vec!["42".to_owned()]);

    controller
        .handle(ShellRequest {
            restart: true,
            ..ShellRequest::default()
        })
        .await
        .expect("restart");

    let response = controller
        .handle(command("echo \"after:$PERSIST\""))
        .await
        .expect("read after restart");
    assert_eq!(response.blocks, vec!["after:".to_owned()]);
}

#[tokio::test]
async fn banned_command_is_refused_without_side_effects() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("fetched.txt");
    let controller = controller();

    let response = controller
        .handle(command(&format!(
            "curl -o {} https://example.com",
            target.display()
        )))
        .await
        .expect("dispatch");

    assert_eq!(response.blocks.len(), 2);
    assert!(
        response.blocks[0].contains("banned command"),
        "unexpected refusal: {}",
        response.blocks[0]
    );
    assert!(response.blocks[1].starts_with("banned commands: "));
    assert!(response.blocks[1].contains("curl"));
    assert!(!target.exists(), "banned command must not execute");
}

#[tokio::test]
async fn configured_additions_are_listed_and_enforced() {
    let config = GlobalConfig {
        banned_commands: vec!["scp".to_owned()],
        ..GlobalConfig::default()
    };
    let controller = SessionController::new(&config);

    let response = controller
        .handle(command("scp file host:"))
        .await
        .expect("dispatch");
    assert_eq!(response.blocks.len(), 2);
    assert!(response.blocks[1].contains("scp"));
}

#[tokio::test]
async fn unknown_command_reports_error_text() {
    let controller = controller();
    let response = controller
        .handle(command("nonexistentcommand"))
        .await
        .expect("dispatch");

    assert_eq!(response.blocks.len(), 2);
    assert!(
        response.blocks[0].contains("command not found"),
        "unexpected primary block: {}",
        response.blocks[0]
    );
    assert!(response.blocks[1].starts_with("error: "));
}

#[tokio::test]
async fn command_with_stop_tears_the_session_down() {
    let controller = controller();
    controller.handle(command("TEARDOWN=1")).await.expect("set");

    let response = controller
        .handle(ShellRequest {
            command: Some("echo done".to_owned()),
            stop: true,
            ..ShellRequest::default()
        })
        .await
        .expect("run with stop");
    assert_eq!(response.blocks, vec!["done".to_owned()]);

    // The next stop has nothing left to stop.
    let response = controller
        .handle(ShellRequest {
            stop: true,
            ..ShellRequest::default()
        })
        .await
        .expect("stop dispatch");
    assert_eq!(response.blocks, vec!["no session to stop".to_owned()]);

    // A new command sees a fresh shell.
    let response = controller
        .handle(command("echo \"fresh:$TEARDOWN\""))
        .await
        .expect("run after stop");
    assert_eq!(response.blocks, vec!["fresh:".to_owned()]);
}

#[tokio::test]
async fn bare_stop_on_live_session_confirms() {
    let controller = controller();
    controller.handle(command("echo up")).await.expect("spawn");

    let response = controller
        .handle(ShellRequest {
            stop: true,
            ..ShellRequest::default()
        })
        .await
        .expect("stop");
    assert_eq!(response.blocks, vec!["session has been stopped".to_owned()]);
}

#[tokio::test]
#[serial_test::serial]
async fn overlapping_commands_fail_with_session_busy() {
    let controller = Arc::new(controller());
    controller.handle(command("echo warm")).await.expect("warm up");

    let background = Arc::clone(&controller);
    let long_running =
        tokio::spawn(async move { background.handle(command("sleep 2")).await });

    // Give the long command time to acquire the session.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    match controller.handle(command("echo overlap")).await {
        Err(AppError::SessionBusy) => {}
        other => panic!("expected SessionBusy, got {other:?}"),
    }

    long_running.await.expect("join").expect("long command");
}

#[tokio::test]
async fn sessions_are_isolated_by_id() {
    let controller = controller();

    let for_session = |id: &str, cmd: &str| ShellRequest {
        command: Some(cmd.to_owned()),
        session_id: Some(id.to_owned()),
        ..ShellRequest::default()
    };

    controller
        .handle(for_session("alpha", "WHO=alpha"))
        .await
        .expect("set alpha");
    controller
        .handle(for_session("beta", "WHO=beta"))
        .await
        .expect("set beta");

    let response = controller
        .handle(for_session("alpha", "echo $WHO"))
        .await
        .expect("read alpha");
    assert_eq!(response.blocks, vec!["alpha".to_owned()]);

    let response = controller
        .handle(for_session("beta", "echo $WHO"))
        .await
        .expect("read beta");
    assert_eq!(response.blocks, vec!["beta".to_owned()]);
}

#[tokio::test]
async fn dead_session_is_replaced_transparently() {
    let controller = controller();
    controller.handle(command("echo up")).await.expect("spawn");

    // Kill the shell from inside; the next command must get a fresh one.
    let _ = controller.handle(command("exit 7")).await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let response = controller
        .handle(command("echo recovered"))
        .await
        .expect("run after death");
    assert_eq!(response.blocks, vec!["recovered".to_owned()]);
}
