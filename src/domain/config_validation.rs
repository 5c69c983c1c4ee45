//! Configuration validation.
//!
//! Every field is checked and converted before anything runs; the result is
//! plain data handed down to the rest of the crate.

use crate::domain::daylight::Location;
use crate::domain::decision::{DecisionStrategy, ModePolicy, Setting};
use crate::domain::error::PriceGateError;
use crate::domain::payload::PayloadFormat;
use crate::domain::settings::*;
use crate::ports::config_port::ConfigPort;
use chrono::TimeDelta;
use chrono_tz::Tz;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const KNOWN_SECTIONS: [&str; 6] = [
    "storage", "source", "decision", "location", "notify", "actuator",
];

pub fn load_app_config(config: &dyn ConfigPort) -> Result<AppConfig, PriceGateError> {
    for section in config.sections() {
        if !KNOWN_SECTIONS.contains(&section.as_str()) {
            warn!(%section, "ignoring unknown config section");
        }
    }

    Ok(AppConfig {
        storage: validate_storage_config(config)?,
        source: validate_source_config(config)?,
        decision: validate_decision_config(config)?,
        location: validate_location_config(config)?,
        notify: validate_notify_config(config)?,
        actuator: validate_actuator_config(config)?,
    })
}

pub fn validate_storage_config(config: &dyn ConfigPort) -> Result<StorageSettings, PriceGateError> {
    let kind = require(config, "storage", "kind")?;
    let backend = match kind.to_lowercase().as_str() {
        "local" => StorageBackend::Local {
            root: PathBuf::from(require(config, "storage", "root")?),
        },
        "object" => {
            let endpoint = require(config, "storage", "endpoint")?;
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(invalid("storage", "endpoint", "must be an http(s) URL"));
            }
            StorageBackend::Object {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                bucket: require(config, "storage", "bucket")?,
                token: config.get_non_empty("storage", "token"),
            }
        }
        other => {
            return Err(invalid(
                "storage",
                "kind",
                format!("unknown storage kind '{other}' (expected local or object)"),
            ));
        }
    };

    let key_prefix = config
        .get_non_empty("storage", "key_prefix")
        .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
    if key_prefix.contains('/') {
        return Err(invalid("storage", "key_prefix", "must not contain '/'"));
    }

    Ok(StorageSettings {
        backend,
        key_prefix,
    })
}

pub fn validate_source_config(config: &dyn ConfigPort) -> Result<SourceSettings, PriceGateError> {
    let url = require(config, "source", "url")?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(invalid("source", "url", "must be an http(s) URL"));
    }
    let format: PayloadFormat = parse_or(config, "source", "format", PayloadFormat::Csv)?;
    let timezone: Tz = parse_required(config, "source", "timezone")?;
    let timeout_secs: u64 = parse_or(config, "source", "timeout_secs", DEFAULT_FETCH_TIMEOUT_SECS)?;
    if timeout_secs == 0 {
        return Err(invalid("source", "timeout_secs", "must be positive"));
    }

    Ok(SourceSettings {
        url,
        format,
        timezone,
        timeout: Duration::from_secs(timeout_secs),
    })
}

pub fn validate_decision_config(
    config: &dyn ConfigPort,
) -> Result<DecisionSettings, PriceGateError> {
    let threshold: f64 = parse_required(config, "decision", "threshold")?;
    if !threshold.is_finite() {
        return Err(invalid("decision", "threshold", "must be a finite number"));
    }
    let low_setting: Setting = parse_required(config, "decision", "low_setting")?;
    let high_setting: Setting = parse_required(config, "decision", "high_setting")?;
    let strategy = parse_or(
        config,
        "decision",
        "strategy",
        DecisionStrategy::HourlyAverage,
    )?;

    Ok(DecisionSettings {
        policy: ModePolicy {
            threshold,
            low_setting,
            high_setting,
        },
        strategy,
    })
}

pub fn validate_location_config(config: &dyn ConfigPort) -> Result<Location, PriceGateError> {
    let latitude: f64 = parse_required(config, "location", "latitude")?;
    let longitude: f64 = parse_required(config, "location", "longitude")?;
    let timezone: Tz = parse_required(config, "location", "timezone")?;

    Location::new(latitude, longitude, timezone).map_err(|e| {
        let key = if (-90.0..=90.0).contains(&latitude) {
            "longitude"
        } else {
            "latitude"
        };
        invalid("location", key, e)
    })
}

pub fn validate_notify_config(config: &dyn ConfigPort) -> Result<NotifySettings, PriceGateError> {
    let kind = config
        .get_non_empty("notify", "kind")
        .unwrap_or_else(|| "log".to_string());
    let channel = match kind.to_lowercase().as_str() {
        "log" => NotifyChannel::Log,
        "telegram" => NotifyChannel::Telegram {
            bot_token: require(config, "notify", "bot_token")?,
            chat_id: require(config, "notify", "chat_id")?,
            retries: parse_or(config, "notify", "retries", DEFAULT_NOTIFY_RETRIES)?,
            api_base: config
                .get_non_empty("notify", "api_base")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string())
                .trim_end_matches('/')
                .to_string(),
        },
        other => {
            return Err(invalid(
                "notify",
                "kind",
                format!("unknown notify kind '{other}' (expected log or telegram)"),
            ));
        }
    };

    let window: i64 = parse_or(
        config,
        "notify",
        "transition_window_mins",
        DEFAULT_TRANSITION_WINDOW_MINS,
    )?;
    if !(0..=1440).contains(&window) {
        return Err(invalid(
            "notify",
            "transition_window_mins",
            "must be between 0 and 1440",
        ));
    }

    Ok(NotifySettings {
        channel,
        transition_window: TimeDelta::minutes(window),
    })
}

pub fn validate_actuator_config(
    config: &dyn ConfigPort,
) -> Result<ActuatorSettings, PriceGateError> {
    let kind = config
        .get_non_empty("actuator", "kind")
        .unwrap_or_else(|| "dry_run".to_string());
    match kind.to_lowercase().as_str() {
        "dry_run" => Ok(ActuatorSettings::DryRun),
        "command" => {
            let program = require(config, "actuator", "program")?;
            let args = config
                .get_non_empty("actuator", "args")
                .map(|a| a.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|| vec!["{setting}".to_string()]);
            let timeout_secs: u64 = parse_or(
                config,
                "actuator",
                "timeout_secs",
                DEFAULT_ACTUATOR_TIMEOUT_SECS,
            )?;
            if timeout_secs == 0 {
                return Err(invalid("actuator", "timeout_secs", "must be positive"));
            }
            let unchanged_exit_code: i32 = parse_or(
                config,
                "actuator",
                "unchanged_exit_code",
                DEFAULT_UNCHANGED_EXIT_CODE,
            )?;
            if unchanged_exit_code == 0 {
                return Err(invalid(
                    "actuator",
                    "unchanged_exit_code",
                    "0 already means the setting was changed",
                ));
            }
            Ok(ActuatorSettings::Command {
                program,
                args,
                timeout: Duration::from_secs(timeout_secs),
                unchanged_exit_code,
            })
        }
        other => Err(invalid(
            "actuator",
            "kind",
            format!("unknown actuator kind '{other}' (expected dry_run or command)"),
        )),
    }
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, PriceGateError> {
    config
        .get_non_empty(section, key)
        .ok_or_else(|| PriceGateError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn parse_required<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<T, PriceGateError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = require(config, section, key)?;
    raw.parse::<T>()
        .map_err(|e| invalid(section, key, format!("'{raw}': {e}")))
}

fn parse_or<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, PriceGateError>
where
    T: FromStr,
    T::Err: Display,
{
    match config.get_non_empty(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| invalid(section, key, format!("'{raw}': {e}"))),
    }
}

fn invalid(section: &str, key: &str, reason: impl ToString) -> PriceGateError {
    PriceGateError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
