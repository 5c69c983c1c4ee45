//! Fetch-or-use-cached access to daily price series.
//!
//! The blob store is the source of truth once a date has been written. A
//! fresh fetch never overwrites a stored series with different samples.

use crate::domain::error::PriceGateError;
use crate::domain::payload::parse_payload;
use crate::domain::price::PriceSeries;
use crate::domain::storage_key::KeyScheme;
use crate::ports::blob_store::BlobStore;
use crate::ports::price_source::PriceSource;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{error, info, warn};

/// Where a returned series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesOrigin {
    Stored,
    /// Fetched from upstream by this call and newly persisted.
    Fetched,
}

pub struct PriceRepository<'a> {
    store: &'a dyn BlobStore,
    source: &'a dyn PriceSource,
    keys: KeyScheme,
    tz: Tz,
}

impl<'a> PriceRepository<'a> {
    /// `tz` is the market timezone: upstream local times are read in it and
    /// calendar dates are counted in it.
    pub fn new(
        store: &'a dyn BlobStore,
        source: &'a dyn PriceSource,
        keys: KeyScheme,
        tz: Tz,
    ) -> Self {
        Self {
            store,
            source,
            keys,
            tz,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Returns the stored series for `date`, fetching and persisting the
    /// upstream payload first when nothing usable is stored.
    pub fn get_series_for_date(&self, date: NaiveDate) -> Result<PriceSeries, PriceGateError> {
        self.load_series_for_date(date).map(|(series, _)| series)
    }

    /// Like [`get_series_for_date`](Self::get_series_for_date), also telling
    /// whether the series had to be fetched.
    pub fn load_series_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<(PriceSeries, SeriesOrigin), PriceGateError> {
        if let Some(series) = self.load_stored(date) {
            info!(%date, entries = series.len(), "using stored price series");
            return Ok((series, SeriesOrigin::Stored));
        }

        info!(%date, "no stored price series, fetching");
        let fetched = self.fetch_and_store()?;

        match self.load_stored(date) {
            Some(series) => Ok((series, SeriesOrigin::Fetched)),
            None if fetched == date => Err(PriceGateError::Storage {
                key: self.keys.parsed(date).to_string(),
                reason: "stored series could not be read back".to_string(),
            }),
            None => {
                warn!(requested = %date, %fetched, "upstream does not publish the requested date");
                Err(PriceGateError::NoDataForDate {
                    requested: date,
                    fetched,
                })
            }
        }
    }

    /// Existence probe only; never fetches. A present but unreadable document
    /// still counts.
    pub fn series_exists_for_date(&self, date: NaiveDate) -> bool {
        self.store.exists(self.keys.parsed(date).as_str())
    }

    /// Fetches, parses and persists whatever upstream publishes. Returns the
    /// date the payload actually covers.
    fn fetch_and_store(&self) -> Result<NaiveDate, PriceGateError> {
        let payload = self.source.fetch()?;
        let fetched_at = Utc::now().with_timezone(&self.tz).fixed_offset();
        let series = parse_payload(&payload, &self.tz, fetched_at)?;
        let date = series.date_of()?;
        let key = self.keys.parsed(date);

        if let Some(existing) = self.load_stored(date) {
            if existing.samples() == series.samples() {
                info!(%date, %key, "fetched prices match stored series");
                return Ok(date);
            }
            error!(%date, %key, "fetched prices differ from stored series");
            return Err(PriceGateError::StoredDataMismatch {
                date,
                key: key.to_string(),
            });
        }

        let document = series.to_json()?;
        if !self.store.write_text(key.as_str(), &document) {
            return Err(PriceGateError::Storage {
                key: key.to_string(),
                reason: "write failed".to_string(),
            });
        }
        info!(%date, %key, entries = series.len(), "stored price series");

        let raw_key = self.keys.raw(date, payload.format.extension());
        if !self.store.write_text(raw_key.as_str(), &payload.body) {
            warn!(%date, key = %raw_key, "could not store raw payload");
        }

        Ok(date)
    }

    /// A stored document that is unreadable or covers another date counts
    /// as absent.
    fn load_stored(&self, date: NaiveDate) -> Option<PriceSeries> {
        let key = self.keys.parsed(date);
        let text = self.store.read_text(key.as_str())?;

        let series = match PriceSeries::from_json(&text) {
            Ok(series) => series.with_timezone(&self.tz),
            Err(e) => {
                warn!(%key, error = %e, "ignoring unreadable stored series");
                return None;
            }
        };

        match series.date_of() {
            Ok(d) if d == date => Some(series),
            Ok(d) => {
                warn!(%key, stored = %d, "stored series covers a different date");
                None
            }
            Err(e) => {
                warn!(%key, error = %e, "ignoring invalid stored series");
                None
            }
        }
    }
}
