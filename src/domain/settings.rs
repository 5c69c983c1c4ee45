//! Typed configuration, resolved once at start-up by
//! [`config_validation::load_app_config`](crate::domain::config_validation::load_app_config).

use crate::domain::daylight::Location;
use crate::domain::decision::{DecisionStrategy, ModePolicy};
use crate::domain::payload::PayloadFormat;
use chrono::TimeDelta;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_KEY_PREFIX: &str = "prices";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_NOTIFY_RETRIES: u32 = 3;
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
pub const DEFAULT_TRANSITION_WINDOW_MINS: i64 = 30;
pub const DEFAULT_ACTUATOR_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_UNCHANGED_EXIT_CODE: i32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Local {
        root: PathBuf,
    },
    Object {
        endpoint: String,
        bucket: String,
        token: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub key_prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub url: String,
    pub format: PayloadFormat,
    /// Timezone the upstream's local dates and times are expressed in.
    pub timezone: Tz,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionSettings {
    pub policy: ModePolicy,
    pub strategy: DecisionStrategy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyChannel {
    Log,
    Telegram {
        bot_token: String,
        chat_id: String,
        retries: u32,
        api_base: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifySettings {
    pub channel: NotifyChannel,
    /// Errors this close to a low-mode boundary are always reported.
    pub transition_window: TimeDelta,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorSettings {
    DryRun,
    Command {
        program: String,
        args: Vec<String>,
        timeout: Duration,
        unchanged_exit_code: i32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub storage: StorageSettings,
    pub source: SourceSettings,
    pub decision: DecisionSettings,
    pub location: Location,
    pub notify: NotifySettings,
    pub actuator: ActuatorSettings,
}
