//! Raw upstream payloads and their conversion into a [`PriceSeries`].
//!
//! Each record carries a local date, a local time and a price. Records that
//! cannot be read are logged and dropped; a payload with no usable record at
//! all is rejected.

use crate::domain::error::PayloadError;
use crate::domain::price::{PriceSample, PriceSeries};
use chrono::{DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Csv,
    Json,
}

impl PayloadFormat {
    pub fn extension(self) -> &'static str {
        match self {
            PayloadFormat::Csv => "csv",
            PayloadFormat::Json => "json",
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(PayloadFormat::Csv),
            "json" => Ok(PayloadFormat::Json),
            other => Err(format!("unknown payload format '{other}' (expected csv or json)")),
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Body of one upstream response, kept verbatim for the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    pub body: String,
    pub format: PayloadFormat,
}

impl RawPayload {
    pub fn new(body: impl Into<String>, format: PayloadFormat) -> Self {
        Self {
            body: body.into(),
            format,
        }
    }
}

struct RawRecord {
    row: usize,
    date: String,
    time: String,
    price: String,
}

/// Parses `payload`, interpreting local dates and times in `tz`.
pub fn parse_payload(
    payload: &RawPayload,
    tz: &Tz,
    fetched_at: DateTime<FixedOffset>,
) -> Result<PriceSeries, PayloadError> {
    let (records, mut rejected) = match payload.format {
        PayloadFormat::Csv => read_csv(&payload.body),
        PayloadFormat::Json => read_json(&payload.body)?,
    };

    let mut seen = HashSet::new();
    let mut samples = Vec::with_capacity(records.len());

    for record in records {
        match to_sample(&record, tz, &seen) {
            Ok(sample) => {
                debug!(row = record.row, %sample, "parsed price entry");
                seen.insert(sample.timestamp);
                samples.push(sample);
            }
            Err(reason) => {
                warn!(row = record.row, %reason, "dropping malformed price row");
                rejected += 1;
            }
        }
    }

    if samples.is_empty() {
        return Err(PayloadError::NoEntries { rejected });
    }

    info!(
        entries = samples.len(),
        rejected,
        format = %payload.format,
        "parsed price payload"
    );
    Ok(PriceSeries::new(samples, fetched_at))
}

fn read_csv(body: &str) -> (Vec<RawRecord>, usize) {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    let mut rejected = 0;

    for (idx, result) in rdr.records().enumerate() {
        let row = idx + 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(row, error = %e, "dropping unreadable CSV row");
                rejected += 1;
                continue;
            }
        };

        match (record.get(0), record.get(1), record.get(2)) {
            (Some(date), Some(time), Some(price)) => records.push(RawRecord {
                row,
                date: date.to_string(),
                time: time.to_string(),
                price: price.to_string(),
            }),
            _ => {
                warn!(row, columns = record.len(), "dropping short CSV row");
                rejected += 1;
            }
        }
    }

    (records, rejected)
}

fn read_json(body: &str) -> Result<(Vec<RawRecord>, usize), PayloadError> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| PayloadError::Malformed {
            reason: format!("expected a JSON array of records: {e}"),
        })?;

    let mut records = Vec::with_capacity(values.len());
    let mut rejected = 0;

    for (idx, value) in values.iter().enumerate() {
        let row = idx + 1;
        let date = value.get("date").and_then(|v| v.as_str());
        let time = value.get("time").and_then(|v| v.as_str());
        let price = value.get("price").and_then(|v| match v {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        });

        match (date, time, price) {
            (Some(date), Some(time), Some(price)) => records.push(RawRecord {
                row,
                date: date.to_string(),
                time: time.to_string(),
                price,
            }),
            _ => {
                warn!(row, record = %value, "dropping incomplete JSON record");
                rejected += 1;
            }
        }
    }

    Ok((records, rejected))
}

fn to_sample(
    record: &RawRecord,
    tz: &Tz,
    seen: &HashSet<DateTime<FixedOffset>>,
) -> Result<PriceSample, String> {
    let date = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {e}", record.date))?;
    let time = NaiveTime::parse_from_str(&record.time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&record.time, "%H:%M"))
        .map_err(|e| format!("invalid time '{}': {e}", record.time))?;
    let price: f64 = record
        .price
        .parse()
        .map_err(|e| format!("invalid price '{}': {e}", record.price))?;
    if !price.is_finite() {
        return Err(format!("non-finite price '{}'", record.price));
    }

    let timestamp = localize(tz, date.and_time(time), seen)
        .ok_or_else(|| format!("{} {} does not exist in {}", record.date, record.time, tz))?;

    Ok(PriceSample::new(timestamp, price))
}

/// Wall-clock times repeated by a DST fall-back map to the earlier offset the
/// first time they appear and to the later one on repetition.
fn localize(
    tz: &Tz,
    naive: NaiveDateTime,
    seen: &HashSet<DateTime<FixedOffset>>,
) -> Option<DateTime<FixedOffset>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.fixed_offset()),
        LocalResult::Ambiguous(earlier, later) => {
            let earlier = earlier.fixed_offset();
            if seen.contains(&earlier) {
                Some(later.fixed_offset())
            } else {
                Some(earlier)
            }
        }
        LocalResult::None => None,
    }
}
