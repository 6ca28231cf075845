//! Test plan for the `parley-config` crate.
//!
//! These tests exercise the configuration loader across default handling,
//! file discovery, environment overrides, and validation behaviour.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

use parley_config::{load, AppConfig, CollaborationConfig, ConversationConfig, DatabaseConfig};

const ENV_VARS_TO_RESET: &[&str] = &[
    "PARLEY_CONFIG",
    "PARLEY__CONVERSATION__SCOPE",
    "PARLEY__CONVERSATION__MAX_MESSAGE_LENGTH",
    "PARLEY__CONVERSATION__MIN_SEND_INTERVAL_MS",
    "PARLEY__COLLABORATION__LOG_INTERVAL_MS",
    "PARLEY__COLLABORATION__TANDEM_DELAY_MS",
    "PARLEY__COLLABORATION__TEAM_DELAY_MS",
    "PARLEY__COLLABORATION__CLOSE_DELAY_MS",
    "PARLEY__COLLABORATION__LOG_WINDOW",
    "PARLEY__DATABASE__URL",
    "PARLEY__DATABASE__MAX_CONNECTIONS",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(&path, contents).expect("failed to write config file");
    path
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.conversation.scope, defaults.conversation.scope);
    assert_eq!(
        config.conversation.max_message_length,
        defaults.conversation.max_message_length
    );
    assert_eq!(
        config.conversation.min_send_interval_ms,
        defaults.conversation.min_send_interval_ms
    );
    assert_eq!(
        config.collaboration.close_delay_ms,
        defaults.collaboration.close_delay_ms
    );
    assert_eq!(config.collaboration.log_window, defaults.collaboration.log_window);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(
        config.database.max_connections,
        defaults.database.max_connections
    );
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parley.toml",
        r#"
        [conversation]
        scope = "first"
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/parley.toml",
        r#"
        [conversation]
        scope = "second"
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.conversation.scope, "first");
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parley.toml",
        r#"
        [collaboration]
        log_window = 8

        [database]
        max_connections = 2
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.collaboration.log_window, 8);
    assert_eq!(
        config.collaboration.tandem_delay_ms,
        defaults.collaboration.tandem_delay_ms
    );
    assert_eq!(config.database.max_connections, 2);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(
        config.conversation.max_message_length,
        defaults.conversation.max_message_length
    );
}

#[test]
#[serial]
fn load_honours_explicit_config_path() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    let path = write_config_file(
        temp_dir.path(),
        "elsewhere/custom.toml",
        r#"
        [conversation]
        min_send_interval_ms = 250
        "#,
    );
    ctx.set_var("PARLEY_CONFIG", path.display().to_string());

    let config = load().expect("configuration load should read PARLEY_CONFIG");
    assert_eq!(config.conversation.min_send_interval_ms, 250);
    assert_eq!(
        config.conversation.min_send_interval(),
        Duration::from_millis(250)
    );
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parley.toml",
        r#"
        [conversation]
        max_message_length = 300
        "#,
    );

    ctx.set_var("PARLEY__CONVERSATION__MAX_MESSAGE_LENGTH", "500");
    ctx.set_var("PARLEY__DATABASE__URL", "sqlite://:memory:");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.conversation.max_message_length, 500);
    assert_eq!(config.database.url, "sqlite://:memory:");
}

#[test]
#[serial]
fn load_rejects_out_of_order_collaboration_delays() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parley.toml",
        r#"
        [collaboration]
        tandem_delay_ms = 4000
        team_delay_ms = 3500
        "#,
    );

    let error = load().expect_err("team before tandem should be rejected");
    let message = format!("{error:#}");
    assert!(
        message.contains("strictly increasing"),
        "unexpected error message: {message}"
    );
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "parley.toml",
        r#"
        [conversation]
        max_message_length = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn validate_rejects_zero_length_limit() {
    let mut config = AppConfig::default();
    config.conversation.max_message_length = 0;
    assert!(config.validate().is_err());
}

#[test]
fn conversation_config_defaults_match_admission_limits() {
    let defaults = ConversationConfig::default();
    assert_eq!(defaults.scope, "default");
    assert_eq!(defaults.max_message_length, 2000);
    assert_eq!(defaults.min_send_interval(), Duration::from_secs(1));
}

#[test]
fn collaboration_config_defaults_describe_the_staged_run() {
    let defaults = CollaborationConfig::default();
    assert_eq!(defaults.log_interval(), Duration::from_millis(1200));
    assert_eq!(defaults.tandem_delay(), Duration::from_millis(1500));
    assert_eq!(defaults.team_delay(), Duration::from_millis(3500));
    assert_eq!(defaults.close_delay(), Duration::from_millis(7000));
    assert_eq!(defaults.log_window, 5);
}

#[test]
fn database_config_defaults_to_local_sqlite_file() {
    let defaults = DatabaseConfig::default();
    assert_eq!(defaults.url, "sqlite://parley.db");
    assert_eq!(defaults.max_connections, 5);
}
