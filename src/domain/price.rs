//! Price samples and the single-day price series built from them.
//!
//! This module has no dependencies on the rest of the crate so that the
//! repository and the decision engine can both build on it.

use crate::domain::error::SeriesError;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One (timestamp, price) observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    #[serde(rename = "time")]
    pub timestamp: DateTime<FixedOffset>,
    pub price: f64,
}

impl PriceSample {
    pub fn new(timestamp: DateTime<FixedOffset>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

impl fmt::Display for PriceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {:.2}",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.price
        )
    }
}

/// Samples for one calendar day, kept sorted by timestamp.
///
/// Serializes to the persisted document format:
/// `{"entries": [{"time": ..., "price": ...}], "fetchTime": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SeriesDocument")]
pub struct PriceSeries {
    #[serde(rename = "entries")]
    samples: Vec<PriceSample>,
    #[serde(rename = "fetchTime")]
    fetched_at: DateTime<FixedOffset>,
}

#[derive(Deserialize)]
struct SeriesDocument {
    entries: Vec<PriceSample>,
    #[serde(rename = "fetchTime")]
    fetch_time: DateTime<FixedOffset>,
}

impl From<SeriesDocument> for PriceSeries {
    fn from(doc: SeriesDocument) -> Self {
        PriceSeries::new(doc.entries, doc.fetch_time)
    }
}

impl PriceSeries {
    pub fn new(mut samples: Vec<PriceSample>, fetched_at: DateTime<FixedOffset>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self {
            samples,
            fetched_at,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SeriesError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SeriesError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn samples(&self) -> &[PriceSample] {
        &self.samples
    }

    pub fn fetched_at(&self) -> DateTime<FixedOffset> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Re-expresses every timestamp in `tz`. Instants are unchanged.
    pub fn with_timezone<Z: TimeZone>(self, tz: &Z) -> Self {
        let samples = self
            .samples
            .into_iter()
            .map(|s| PriceSample {
                timestamp: s.timestamp.with_timezone(tz).fixed_offset(),
                price: s.price,
            })
            .collect();
        Self {
            samples,
            fetched_at: self.fetched_at.with_timezone(tz).fixed_offset(),
        }
    }

    /// The calendar date shared by every sample.
    pub fn date_of(&self) -> Result<NaiveDate, SeriesError> {
        let first = self
            .samples
            .first()
            .ok_or(SeriesError::EmptySeries)?
            .timestamp
            .date_naive();

        match self
            .samples
            .iter()
            .map(|s| s.timestamp.date_naive())
            .find(|d| *d != first)
        {
            Some(other) => Err(SeriesError::MultiDateSeries { first, other }),
            None => Ok(first),
        }
    }

    /// Sample with the smallest absolute distance to `t`, looking both
    /// backwards and forwards. Ties go to the earlier sample.
    pub fn closest_sample(&self, t: DateTime<FixedOffset>) -> Result<&PriceSample, SeriesError> {
        let mut best: Option<(&PriceSample, TimeDelta)> = None;
        for sample in &self.samples {
            let distance = (sample.timestamp - t).abs();
            match best {
                Some((_, d)) if distance >= d => {}
                _ => best = Some((sample, distance)),
            }
        }
        best.map(|(s, _)| s).ok_or(SeriesError::NoSamples)
    }

    /// Unweighted mean of the samples in `[floor_to_hour(t), floor_to_hour(t) + 1h)`.
    pub fn hourly_average(&self, t: DateTime<FixedOffset>) -> Result<f64, SeriesError> {
        let hour_start = floor_to_hour(t);
        let hour_end = hour_start + TimeDelta::hours(1);

        let (sum, count) = self
            .samples
            .iter()
            .filter(|s| s.timestamp >= hour_start && s.timestamp < hour_end)
            .fold((0.0, 0usize), |(sum, n), s| (sum + s.price, n + 1));

        if count == 0 {
            return Err(SeriesError::NoSamplesInHour { hour_start });
        }
        Ok(sum / count as f64)
    }

    /// Smallest positive gap between consecutive samples.
    pub fn cadence(&self) -> Option<TimeDelta> {
        self.samples
            .windows(2)
            .map(|w| w[1].timestamp - w[0].timestamp)
            .filter(|gap| *gap > TimeDelta::zero())
            .min()
    }
}

impl fmt::Display for PriceSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, fetched at {}",
            self.samples.len(),
            self.fetched_at.format("%Y-%m-%d %H:%M:%S %:z")
        )?;
        for sample in &self.samples {
            write!(f, "\n{sample}")?;
        }
        Ok(())
    }
}

/// Truncates `t` to the start of its hour in its own offset.
pub fn floor_to_hour(t: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let into_hour = TimeDelta::minutes(i64::from(t.minute()))
        + TimeDelta::seconds(i64::from(t.second()))
        + TimeDelta::nanoseconds(i64::from(t.nanosecond()));
    t - into_hour
}
