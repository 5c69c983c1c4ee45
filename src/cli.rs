//! CLI definition and dispatch.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;

use crate::adapters::command_actuator::CommandActuator;
use crate::adapters::dry_run_actuator::DryRunActuator;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::local_blob_store::LocalBlobStore;
use crate::adapters::log_notifier::LogNotifier;
use crate::domain::config_validation::load_app_config;
use crate::domain::daylight::{SunPhase, is_daylight};
use crate::domain::error::PriceGateError;
use crate::domain::pipeline::{Pipeline, TickOutcome};
use crate::domain::repository::PriceRepository;
use crate::domain::settings::{
    ActuatorSettings, AppConfig, NotifyChannel, NotifySettings, SourceSettings, StorageBackend,
    StorageSettings,
};
use crate::domain::storage_key::KeyScheme;
use crate::ports::actuator::Actuator;
use crate::ports::blob_store::BlobStore;
use crate::ports::notifier::Notifier;
use crate::ports::price_source::PriceSource;

#[derive(Parser, Debug)]
#[command(
    name = "pricegate",
    version,
    about = "Price-driven low/high mode switching"
)]
pub struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one decision tick
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Evaluate at this instant (RFC 3339) instead of now
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<FixedOffset>>,
        /// Report failures even away from a mode transition
        #[arg(long)]
        force_notify: bool,
    },
    /// Prefetch and store tomorrow's prices
    FetchNextDay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<FixedOffset>>,
    },
    /// Print the low-mode intervals of a day
    Intervals {
        #[arg(short, long)]
        config: PathBuf,
        /// Day to inspect (YYYY-MM-DD), defaults to today
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Print sunrise, sunset and the daylight gate
    Daylight {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<FixedOffset>>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn execute(cli: Cli) -> Result<(), PriceGateError> {
    match cli.command {
        Command::Run {
            config,
            at,
            force_notify,
        } => run_tick(&config, at, force_notify),
        Command::FetchNextDay { config, at } => run_fetch_next_day(&config, at),
        Command::Intervals { config, date } => run_intervals(&config, date),
        Command::Daylight { config, at } => run_daylight(&config, at),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<AppConfig, PriceGateError> {
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| PriceGateError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load_app_config(&adapter)
}

fn run_tick(
    config_path: &Path,
    at: Option<DateTime<FixedOffset>>,
    force_notify: bool,
) -> Result<(), PriceGateError> {
    let app = load_config(config_path)?;
    let now = at.unwrap_or_else(|| local_now(&app));

    with_pipeline(&app, |pipeline| {
        match pipeline.run_tick(now, force_notify)? {
            TickOutcome::Night { window } => println!(
                "outside daylight (sunrise {}, sunset {})",
                window.sunrise.format("%H:%M"),
                window.sunset.format("%H:%M")
            ),
            TickOutcome::Applied { decision } => println!(
                "applied {} mode, setting {} (price {:.2})",
                decision.mode, decision.setting, decision.price
            ),
            TickOutcome::AlreadyApplied { decision } => println!(
                "{} mode already in place, setting {} (price {:.2})",
                decision.mode, decision.setting, decision.price
            ),
        }
        Ok(())
    })
}

fn run_fetch_next_day(
    config_path: &Path,
    at: Option<DateTime<FixedOffset>>,
) -> Result<(), PriceGateError> {
    let app = load_config(config_path)?;
    let now = at.unwrap_or_else(|| local_now(&app));

    with_pipeline(&app, |pipeline| {
        let series = pipeline.fetch_next_day(now)?;
        println!(
            "{} prices stored for {}",
            series.len(),
            series.date_of()?
        );
        Ok(())
    })
}

fn run_intervals(config_path: &Path, date: Option<NaiveDate>) -> Result<(), PriceGateError> {
    let app = load_config(config_path)?;

    with_pipeline(&app, |pipeline| {
        let date = date.unwrap_or_else(|| pipeline.market_date(local_now(&app)));
        let intervals = pipeline.intervals_for_date(date)?;
        if intervals.is_empty() {
            println!(
                "{date}: no prices below {:.2}",
                app.decision.policy.threshold
            );
        }
        for interval in &intervals {
            println!("{date} {interval}");
        }
        Ok(())
    })
}

fn run_daylight(
    config_path: &Path,
    at: Option<DateTime<FixedOffset>>,
) -> Result<(), PriceGateError> {
    let app = load_config(config_path)?;
    let now = at.unwrap_or_else(|| local_now(&app));
    let window = is_daylight(now, &app.location)?;

    let phase = match window.phase {
        SunPhase::Regular => "",
        SunPhase::PolarDay => " (polar day)",
        SunPhase::PolarNight => " (polar night)",
    };
    println!("sunrise:  {}", window.sunrise.format("%Y-%m-%d %H:%M:%S %:z"));
    println!("sunset:   {}", window.sunset.format("%Y-%m-%d %H:%M:%S %:z"));
    println!("daylight: {}{phase}", window.is_daylight);
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), PriceGateError> {
    let app = load_config(config_path)?;
    println!("Configuration is valid.");
    println!("  storage:  {}", describe_storage(&app.storage));
    println!("  source:   {} ({})", app.source.url, app.source.format);
    println!(
        "  decision: threshold {:.2}, low {}, high {}",
        app.decision.policy.threshold,
        app.decision.policy.low_setting,
        app.decision.policy.high_setting
    );
    Ok(())
}

fn describe_storage(storage: &StorageSettings) -> String {
    match &storage.backend {
        StorageBackend::Local { root } => format!("local {}", root.display()),
        StorageBackend::Object {
            endpoint, bucket, ..
        } => format!("object {endpoint}/{bucket}"),
    }
}

/// Builds every adapter named in `app` and runs `f` against a pipeline over
/// them.
fn with_pipeline<T>(
    app: &AppConfig,
    f: impl FnOnce(&Pipeline<'_>) -> Result<T, PriceGateError>,
) -> Result<T, PriceGateError> {
    let store = build_store(&app.storage, app.source.timeout)?;
    let source = build_source(&app.source)?;
    let notifier = build_notifier(&app.notify)?;
    let actuator = build_actuator(&app.actuator);

    let repository = PriceRepository::new(
        store.as_ref(),
        source.as_ref(),
        KeyScheme::new(app.storage.key_prefix.clone()),
        app.source.timezone,
    );
    let pipeline = Pipeline::new(
        repository,
        actuator.as_ref(),
        notifier.as_ref(),
        app.location.clone(),
        app.decision.clone(),
        app.notify.transition_window,
    );
    f(&pipeline)
}

pub fn build_store(
    storage: &StorageSettings,
    timeout: std::time::Duration,
) -> Result<Box<dyn BlobStore>, PriceGateError> {
    match &storage.backend {
        StorageBackend::Local { root } => Ok(Box::new(LocalBlobStore::new(root.clone()))),
        #[cfg(feature = "http")]
        StorageBackend::Object {
            endpoint,
            bucket,
            token,
        } => Ok(Box::new(
            crate::adapters::object_blob_store::ObjectBlobStore::new(
                endpoint.clone(),
                bucket.clone(),
                token.clone(),
                timeout,
            )?,
        )),
        #[cfg(not(feature = "http"))]
        StorageBackend::Object { .. } => {
            let _ = timeout;
            Err(without_http("storage", "kind"))
        }
    }
}

pub fn build_source(source: &SourceSettings) -> Result<Box<dyn PriceSource>, PriceGateError> {
    #[cfg(feature = "http")]
    {
        Ok(Box::new(
            crate::adapters::http_price_source::HttpPriceSource::new(
                source.url.clone(),
                source.format,
                source.timeout,
            )?,
        ))
    }
    #[cfg(not(feature = "http"))]
    {
        let _ = source;
        Err(without_http("source", "url"))
    }
}

pub fn build_notifier(notify: &NotifySettings) -> Result<Box<dyn Notifier>, PriceGateError> {
    match &notify.channel {
        NotifyChannel::Log => Ok(Box::new(LogNotifier)),
        #[cfg(feature = "http")]
        NotifyChannel::Telegram {
            bot_token,
            chat_id,
            retries,
            api_base,
        } => Ok(Box::new(
            crate::adapters::telegram_notifier::TelegramNotifier::new(
                api_base,
                bot_token,
                chat_id.clone(),
                *retries,
            )?,
        )),
        #[cfg(not(feature = "http"))]
        NotifyChannel::Telegram { .. } => Err(without_http("notify", "kind")),
    }
}

pub fn build_actuator(actuator: &ActuatorSettings) -> Box<dyn Actuator> {
    match actuator {
        ActuatorSettings::DryRun => Box::new(DryRunActuator),
        ActuatorSettings::Command {
            program,
            args,
            timeout,
            unchanged_exit_code,
        } => Box::new(CommandActuator::new(
            program.clone(),
            args.clone(),
            *timeout,
            *unchanged_exit_code,
        )),
    }
}

#[cfg(not(feature = "http"))]
fn without_http(section: &str, key: &str) -> PriceGateError {
    PriceGateError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: "pricegate was built without the http feature".to_string(),
    }
}

/// Current time in the market timezone.
fn local_now(app: &AppConfig) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&app.source.timezone).fixed_offset()
}

fn parse_instant(s: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(s).map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}
