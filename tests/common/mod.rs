#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Europe::Sofia;
use pricegate::domain::decision::Setting;
use pricegate::domain::error::PriceGateError;
use pricegate::domain::payload::{PayloadFormat, RawPayload};
use pricegate::ports::actuator::{Actuator, ApplyOutcome};
use pricegate::ports::blob_store::BlobStore;
use pricegate::ports::notifier::Notifier;
use pricegate::ports::price_source::PriceSource;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub struct MemoryBlobStore {
    pub blobs: RefCell<HashMap<String, Vec<u8>>>,
    pub failing_prefix: Option<String>,
    pub writes: Cell<usize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RefCell::new(HashMap::new()),
            failing_prefix: None,
            writes: Cell::new(0),
        }
    }

    /// Writes to keys starting with `prefix` report failure.
    pub fn failing_writes(mut self, prefix: &str) -> Self {
        self.failing_prefix = Some(prefix.to_string());
        self
    }

    pub fn with_text(self, key: &str, text: &str) -> Self {
        self.blobs
            .borrow_mut()
            .insert(key.to_string(), text.as_bytes().to_vec());
        self
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.blobs
            .borrow()
            .get(key)
            .map(|b| String::from_utf8(b.clone()).unwrap())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl BlobStore for MemoryBlobStore {
    fn write_binary(&self, key: &str, bytes: &[u8]) -> bool {
        if let Some(prefix) = &self.failing_prefix {
            if key.starts_with(prefix.as_str()) {
                return false;
            }
        }
        self.writes.set(self.writes.get() + 1);
        self.blobs
            .borrow_mut()
            .insert(key.to_string(), bytes.to_vec());
        true
    }

    fn read_binary(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.borrow().get(key).cloned()
    }

    fn exists(&self, key: &str) -> bool {
        self.blobs.borrow().contains_key(key)
    }
}

/// Serves a fixed payload and counts how often it was asked to.
pub struct StaticPriceSource {
    pub body: RefCell<String>,
    pub format: PayloadFormat,
    pub error: Option<String>,
    pub fetches: Cell<usize>,
}

impl StaticPriceSource {
    pub fn csv(body: impl Into<String>) -> Self {
        Self {
            body: RefCell::new(body.into()),
            format: PayloadFormat::Csv,
            error: None,
            fetches: Cell::new(0),
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            format: PayloadFormat::Json,
            ..Self::csv(body)
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            error: Some(reason.to_string()),
            ..Self::csv("")
        }
    }

    /// Simulates the upstream republishing different content.
    pub fn set_body(&self, body: impl Into<String>) {
        *self.body.borrow_mut() = body.into();
    }
}

impl PriceSource for StaticPriceSource {
    fn fetch(&self) -> Result<RawPayload, PriceGateError> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(reason) = &self.error {
            return Err(PriceGateError::Fetch {
                reason: reason.clone(),
            });
        }
        Ok(RawPayload::new(self.body.borrow().clone(), self.format))
    }
}

pub struct RecordingNotifier {
    pub messages: RefCell<Vec<String>>,
    pub deliver: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            messages: RefCell::new(Vec::new()),
            deliver: true,
        }
    }

    pub fn undeliverable() -> Self {
        Self {
            deliver: false,
            ..Self::new()
        }
    }

    pub fn count(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn last(&self) -> Option<String> {
        self.messages.borrow().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, message: &str) -> bool {
        self.messages.borrow_mut().push(message.to_string());
        self.deliver
    }
}

pub struct RecordingActuator {
    pub applied: RefCell<Vec<Setting>>,
    pub outcome: ApplyOutcome,
    pub error: Option<String>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self {
            applied: RefCell::new(Vec::new()),
            outcome: ApplyOutcome::Changed,
            error: None,
        }
    }

    pub fn already_applied() -> Self {
        Self {
            outcome: ApplyOutcome::AlreadyApplied,
            ..Self::new()
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            error: Some(reason.to_string()),
            ..Self::new()
        }
    }
}

impl Actuator for RecordingActuator {
    fn apply(&self, setting: &Setting) -> Result<ApplyOutcome, PriceGateError> {
        self.applied.borrow_mut().push(setting.clone());
        match &self.error {
            Some(reason) => Err(PriceGateError::Actuator {
                reason: reason.clone(),
            }),
            None => Ok(self.outcome),
        }
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Local wall-clock time in Europe/Sofia.
pub fn sofia(s: &str) -> DateTime<FixedOffset> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap();
    Sofia.from_local_datetime(&naive).unwrap().fixed_offset()
}

/// CSV payload with one row per hour starting at 00:00.
pub fn hourly_csv(day: &str, prices: &[f64]) -> String {
    let mut body = String::from("date,time,price\n");
    for (hour, price) in prices.iter().enumerate() {
        body.push_str(&format!("{day},{hour:02}:00,{price}\n"));
    }
    body
}

/// CSV payload with four rows per hour; `price_for_hour` gives each hour's price.
pub fn quarter_hourly_csv(day: &str, price_for_hour: impl Fn(u32) -> f64) -> String {
    let mut body = String::from("date,time,price\n");
    for hour in 0..24 {
        for minute in [0, 15, 30, 45] {
            let price = price_for_hour(hour);
            body.push_str(&format!("{day},{hour:02}:{minute:02},{price}\n"));
        }
    }
    body
}

/// 24 hourly prices: `low` during `low_hours`, `high` otherwise.
pub fn day_prices(low_hours: std::ops::Range<usize>, low: f64, high: f64) -> Vec<f64> {
    (0..24)
        .map(|h| if low_hours.contains(&h) { low } else { high })
        .collect()
}
