use std::time::Duration;

use shell_mcp_server::config::GlobalConfig;

fn sample_toml() -> &'static str {
    r#"
shell_command = "/bin/zsh"
timeout_ms = 60000
output_settle_ms = 150
sentinel = "<<done>>"
banned_commands = ["scp", "rsync"]
http_port = 4000
"#
}

#[test]
fn parses_full_config() {
    let config = GlobalConfig::from_toml_str(sample_toml()).expect("config parses");

    assert_eq!(config.shell_command, "/bin/zsh");
    assert_eq!(config.timeout_ms, 60_000);
    assert_eq!(config.output_settle_ms, 150);
    assert_eq!(config.sentinel, "<<done>>");
    assert_eq!(config.banned_commands, vec!["scp", "rsync"]);
    assert_eq!(config.http_port, 4000);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("config parses");

    assert_eq!(config.shell_command, "/bin/bash");
    assert_eq!(config.timeout_ms, 120_000);
    assert_eq!(config.output_settle_ms, 200);
    assert_eq!(config.sentinel, "<<exit>>");
    assert!(config.banned_commands.is_empty());
    assert_eq!(config.http_port, 3000);
}

#[test]
fn default_matches_empty_toml() {
    let from_empty = GlobalConfig::from_toml_str("").expect("config parses");
    assert_eq!(from_empty, GlobalConfig::default());
}

#[test]
fn session_params_convert_durations() {
    let config = GlobalConfig::from_toml_str(sample_toml()).expect("config parses");
    let params = config.session_params();

    assert_eq!(params.timeout, Duration::from_millis(60_000));
    assert_eq!(params.output_settle, Duration::from_millis(150));
    assert_eq!(params.sentinel, "<<done>>");
    assert_eq!(params.shell_command, "/bin/zsh");
}

#[test]
fn rejects_zero_timeout() {
    let err = GlobalConfig::from_toml_str("timeout_ms = 0").expect_err("must fail");
    assert!(err.to_string().contains("timeout_ms"));
}

#[test]
fn rejects_settle_longer_than_timeout() {
    let toml = "timeout_ms = 100\noutput_settle_ms = 100";
    let err = GlobalConfig::from_toml_str(toml).expect_err("must fail");
    assert!(err.to_string().contains("output_settle_ms"));
}

#[test]
fn rejects_empty_sentinel() {
    let err = GlobalConfig::from_toml_str(r#"sentinel = """#).expect_err("must fail");
    assert!(err.to_string().contains("sentinel"));
}

#[test]
fn rejects_sentinel_with_quote() {
    let err = GlobalConfig::from_toml_str(r#"sentinel = "<<'exit'>>""#).expect_err("must fail");
    assert!(err.to_string().contains("sentinel"));
}

#[test]
fn rejects_sentinel_with_whitespace() {
    let err = GlobalConfig::from_toml_str(r#"sentinel = "<< exit >>""#).expect_err("must fail");
    assert!(err.to_string().contains("sentinel"));
}

#[test]
fn rejects_empty_shell_command() {
    let err = GlobalConfig::from_toml_str(r#"shell_command = """#).expect_err("must fail");
    assert!(err.to_string().contains("shell_command"));
}

#[test]
fn load_from_path_reads_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, sample_toml()).expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.http_port, 4000);
}

#[test]
fn load_from_missing_path_fails() {
    let err = GlobalConfig::load_from_path("/nonexistent/config.toml").expect_err("must fail");
    assert!(err.to_string().starts_with("config:"));
}
