//! Domain error types.

use chrono::{DateTime, FixedOffset, NaiveDate};

/// Errors raised by queries on a [`PriceSeries`](crate::domain::price::PriceSeries).
#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error("price series has no samples")]
    EmptySeries,

    #[error("price series spans multiple dates ({first} and {other})")]
    MultiDateSeries { first: NaiveDate, other: NaiveDate },

    #[error("no price samples available")]
    NoSamples,

    #[error("no price samples in the hour starting {hour_start}")]
    NoSamplesInHour { hour_start: DateTime<FixedOffset> },

    #[error("invalid price series document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while turning a raw upstream payload into a series.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed payload: {reason}")]
    Malformed { reason: String },

    #[error("no price entries could be parsed ({rejected} rows rejected)")]
    NoEntries { rejected: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error(
        "closest price sample at {sample_time} is {distance_minutes} minutes away from {now}"
    )]
    StaleData {
        sample_time: DateTime<FixedOffset>,
        now: DateTime<FixedOffset>,
        distance_minutes: i64,
    },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

#[derive(Debug, thiserror::Error)]
pub enum DaylightError {
    #[error("latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    InvalidLongitude(f64),

    #[error("solar event for {date} is not representable")]
    OutOfRange { date: NaiveDate },
}

/// Top-level error type for pricegate.
#[derive(Debug, thiserror::Error)]
pub enum PriceGateError {
    #[error("price fetch failed: {reason}")]
    Fetch { reason: String },

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("storage error on {key}: {reason}")]
    Storage { key: String, reason: String },

    #[error("stored prices for {date} ({key}) differ from freshly fetched prices")]
    StoredDataMismatch { date: NaiveDate, key: String },

    #[error("no price data for {requested} (upstream currently publishes {fetched})")]
    NoDataForDate {
        requested: NaiveDate,
        fetched: NaiveDate,
    },

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error(transparent)]
    Daylight(#[from] DaylightError),

    #[error("actuator failed: {reason}")]
    Actuator { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PriceGateError {
    /// True when the failure happened before any series could be obtained.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(
            self,
            PriceGateError::Fetch { .. }
                | PriceGateError::Payload(_)
                | PriceGateError::Storage { .. }
                | PriceGateError::StoredDataMismatch { .. }
                | PriceGateError::NoDataForDate { .. }
                | PriceGateError::Series(_)
        )
    }
}

impl From<&PriceGateError> for std::process::ExitCode {
    fn from(err: &PriceGateError) -> Self {
        let code: u8 = match err {
            PriceGateError::Io(_) => 1,
            PriceGateError::ConfigParse { .. }
            | PriceGateError::ConfigMissing { .. }
            | PriceGateError::ConfigInvalid { .. } => 2,
            PriceGateError::Storage { .. } | PriceGateError::StoredDataMismatch { .. } => 3,
            PriceGateError::Fetch { .. } | PriceGateError::Payload(_) => 4,
            PriceGateError::NoDataForDate { .. }
            | PriceGateError::Series(_)
            | PriceGateError::Decision(_)
            | PriceGateError::Daylight(_) => 5,
            PriceGateError::Actuator { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
