use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "parley.toml",
    "config/parley.toml",
    "crates/config/parley.toml",
    "../parley.toml",
    "../config/parley.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub collaboration: CollaborationConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Reject combinations the conversation core cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.conversation.scope.trim().is_empty(),
            "conversation.scope must not be empty"
        );
        ensure!(
            self.conversation.max_message_length > 0,
            "conversation.max_message_length must be greater than zero"
        );

        let collaboration = &self.collaboration;
        ensure!(
            collaboration.log_window > 0,
            "collaboration.log_window must be greater than zero"
        );
        ensure!(
            collaboration.log_interval_ms > 0,
            "collaboration.log_interval_ms must be greater than zero"
        );
        ensure!(
            collaboration.tandem_delay_ms < collaboration.team_delay_ms
                && collaboration.team_delay_ms < collaboration.close_delay_ms,
            "collaboration delays must be strictly increasing (tandem < team < close)"
        );
        Ok(())
    }
}

/// Admission and scoping settings for the conversation channel.
///
/// ```
/// use parley_config::ConversationConfig;
///
/// let conversation = ConversationConfig::default();
/// assert_eq!(conversation.max_message_length, 2000);
/// assert_eq!(conversation.min_send_interval_ms, 1000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "ConversationConfig::default_scope")]
    pub scope: String,
    #[serde(default = "ConversationConfig::default_max_message_length")]
    pub max_message_length: usize,
    #[serde(default = "ConversationConfig::default_min_send_interval")]
    pub min_send_interval_ms: u64,
}

impl ConversationConfig {
    fn default_scope() -> String {
        "default".to_string()
    }

    const fn default_max_message_length() -> usize {
        2000
    }

    const fn default_min_send_interval() -> u64 {
        1000
    }

    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            scope: Self::default_scope(),
            max_message_length: Self::default_max_message_length(),
            min_send_interval_ms: Self::default_min_send_interval(),
        }
    }
}

/// Timing of the simulated collaboration run. Every delay is measured from
/// the moment the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationConfig {
    #[serde(default = "CollaborationConfig::default_log_interval")]
    pub log_interval_ms: u64,
    #[serde(default = "CollaborationConfig::default_tandem_delay")]
    pub tandem_delay_ms: u64,
    #[serde(default = "CollaborationConfig::default_team_delay")]
    pub team_delay_ms: u64,
    #[serde(default = "CollaborationConfig::default_close_delay")]
    pub close_delay_ms: u64,
    #[serde(default = "CollaborationConfig::default_log_window")]
    pub log_window: usize,
}

impl CollaborationConfig {
    const fn default_log_interval() -> u64 {
        1200
    }

    const fn default_tandem_delay() -> u64 {
        1500
    }

    const fn default_team_delay() -> u64 {
        3500
    }

    const fn default_close_delay() -> u64 {
        7000
    }

    const fn default_log_window() -> usize {
        5
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_interval_ms)
    }

    pub fn tandem_delay(&self) -> Duration {
        Duration::from_millis(self.tandem_delay_ms)
    }

    pub fn team_delay(&self) -> Duration {
        Duration::from_millis(self.team_delay_ms)
    }

    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        Self {
            log_interval_ms: Self::default_log_interval(),
            tandem_delay_ms: Self::default_tandem_delay(),
            team_delay_ms: Self::default_team_delay(),
            close_delay_ms: Self::default_close_delay(),
            log_window: Self::default_log_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://parley.db".to_string(),
            max_connections: 5,
        }
    }
}

fn as_i64<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use parley_config::load;
///
/// std::env::remove_var("PARLEY_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.conversation.scope.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("conversation.scope", defaults.conversation.scope.clone())?
        .set_default(
            "conversation.max_message_length",
            as_i64(defaults.conversation.max_message_length),
        )?
        .set_default(
            "conversation.min_send_interval_ms",
            as_i64(defaults.conversation.min_send_interval_ms),
        )?
        .set_default(
            "collaboration.log_interval_ms",
            as_i64(defaults.collaboration.log_interval_ms),
        )?
        .set_default(
            "collaboration.tandem_delay_ms",
            as_i64(defaults.collaboration.tandem_delay_ms),
        )?
        .set_default(
            "collaboration.team_delay_ms",
            as_i64(defaults.collaboration.team_delay_ms),
        )?
        .set_default(
            "collaboration.close_delay_ms",
            as_i64(defaults.collaboration.close_delay_ms),
        )?
        .set_default(
            "collaboration.log_window",
            as_i64(defaults.collaboration.log_window),
        )?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?;

    let environment_overrides = config::Environment::with_prefix("PARLEY").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("PARLEY_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via PARLEY_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    config.validate().context("invalid configuration")?;

    debug!(?config, "loaded parley configuration");
    Ok(config)
}
