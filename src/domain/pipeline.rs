//! One scheduling tick: load today's prices, check daylight, decide, actuate,
//! report.

use crate::domain::daylight::{DaylightWindow, Location, is_daylight};
use crate::domain::decision::{
    Decision, LowModeInterval, decide, is_near_transition, low_mode_intervals,
};
use crate::domain::error::PriceGateError;
use crate::domain::price::PriceSeries;
use crate::domain::repository::{PriceRepository, SeriesOrigin};
use crate::domain::settings::DecisionSettings;
use crate::ports::actuator::{Actuator, ApplyOutcome};
use crate::ports::notifier::Notifier;
use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeDelta};
use std::fmt::Write as _;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Outside daylight; nothing was decided or applied.
    Night { window: DaylightWindow },
    Applied { decision: Decision },
    AlreadyApplied { decision: Decision },
}

pub struct Pipeline<'a> {
    repository: PriceRepository<'a>,
    actuator: &'a dyn Actuator,
    notifier: &'a dyn Notifier,
    location: Location,
    decision: DecisionSettings,
    transition_window: TimeDelta,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        repository: PriceRepository<'a>,
        actuator: &'a dyn Actuator,
        notifier: &'a dyn Notifier,
        location: Location,
        decision: DecisionSettings,
        transition_window: TimeDelta,
    ) -> Self {
        Self {
            repository,
            actuator,
            notifier,
            location,
            decision,
            transition_window,
        }
    }

    pub fn repository(&self) -> &PriceRepository<'a> {
        &self.repository
    }

    /// Calendar date of `now` in the market timezone.
    pub fn market_date(&self, now: DateTime<FixedOffset>) -> NaiveDate {
        self.market_time(now).date_naive()
    }

    /// `now` re-expressed in the market timezone, where hour buckets are cut.
    pub fn market_time(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.repository.timezone()).fixed_offset()
    }

    /// Runs one tick at `now`.
    ///
    /// Failures are reported through the notifier when `force_notify` is set,
    /// when no series could be loaded, or when `now` is close to a low-mode
    /// boundary. Otherwise they are only logged. The error is returned in
    /// every case.
    pub fn run_tick(
        &self,
        now: DateTime<FixedOffset>,
        force_notify: bool,
    ) -> Result<TickOutcome, PriceGateError> {
        let now = self.market_time(now);
        let date = now.date_naive();
        let series = match self.repository.get_series_for_date(date) {
            Ok(series) => series,
            Err(err) => {
                error!(%date, error = %err, "could not load price series");
                self.report_failure(now, &err);
                return Err(err);
            }
        };

        match self.decide_and_apply(now, &series) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(%now, error = %err, "tick failed");
                let intervals = low_mode_intervals(&series, self.decision.policy.threshold);
                if force_notify
                    || err.is_data_unavailable()
                    || is_near_transition(&intervals, now, self.transition_window)
                {
                    self.report_failure(now, &err);
                } else {
                    warn!("failure not reported, no mode transition nearby");
                }
                Err(err)
            }
        }
    }

    fn decide_and_apply(
        &self,
        now: DateTime<FixedOffset>,
        series: &PriceSeries,
    ) -> Result<TickOutcome, PriceGateError> {
        let window = is_daylight(now, &self.location)?;
        if !window.is_daylight {
            info!(
                sunrise = %window.sunrise,
                sunset = %window.sunset,
                "outside daylight, skipping"
            );
            return Ok(TickOutcome::Night { window });
        }

        let decision = decide(self.decision.strategy, series, now, &self.decision.policy)?;

        match self.actuator.apply(&decision.setting)? {
            ApplyOutcome::Changed => {
                info!(mode = %decision.mode, setting = %decision.setting, "setting applied");
                let message = format!(
                    "{} mode at {}: price {:.2} vs threshold {:.2}, setting {}",
                    decision.mode,
                    now.format("%Y-%m-%d %H:%M"),
                    decision.price,
                    self.decision.policy.threshold,
                    decision.setting
                );
                self.deliver(&message);
                Ok(TickOutcome::Applied { decision })
            }
            ApplyOutcome::AlreadyApplied => {
                info!(setting = %decision.setting, "setting already in place");
                Ok(TickOutcome::AlreadyApplied { decision })
            }
        }
    }

    /// Prefetches tomorrow's series. Announces its low-mode intervals the
    /// first time the day is stored.
    pub fn fetch_next_day(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<PriceSeries, PriceGateError> {
        let now = self.market_time(now);
        let tomorrow = now.date_naive() + Days::new(1);

        let (series, origin) = match self.repository.load_series_for_date(tomorrow) {
            Ok(loaded) => loaded,
            Err(err @ PriceGateError::NoDataForDate { .. }) => {
                warn!(date = %tomorrow, error = %err, "next day not published yet");
                return Err(err);
            }
            Err(err) => {
                error!(date = %tomorrow, error = %err, "next day prefetch failed");
                self.report_failure(now, &err);
                return Err(err);
            }
        };

        if origin == SeriesOrigin::Fetched {
            let intervals = low_mode_intervals(&series, self.decision.policy.threshold);
            info!(date = %tomorrow, intervals = intervals.len(), "stored next day prices");
            self.deliver(&next_day_message(
                tomorrow,
                &intervals,
                self.decision.policy.threshold,
            ));
        }
        Ok(series)
    }

    pub fn intervals_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<LowModeInterval>, PriceGateError> {
        let series = self.repository.get_series_for_date(date)?;
        Ok(low_mode_intervals(&series, self.decision.policy.threshold))
    }

    fn report_failure(&self, now: DateTime<FixedOffset>, err: &PriceGateError) {
        self.deliver(&format!(
            "pricegate failed at {}: {err}",
            now.format("%Y-%m-%d %H:%M %:z")
        ));
    }

    fn deliver(&self, message: &str) {
        if !self.notifier.send(message) {
            error!("notification could not be delivered");
        }
    }
}

fn next_day_message(date: NaiveDate, intervals: &[LowModeInterval], threshold: f64) -> String {
    if intervals.is_empty() {
        return format!("Prices for {date}: no prices below {threshold:.2}");
    }
    let mut message = format!("Prices for {date}: below {threshold:.2} during");
    for interval in intervals {
        let _ = write!(message, "\n{interval}");
    }
    message
}
