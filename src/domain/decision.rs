//! Decision engine: price series + instant -> operating setting, and the
//! contiguous low-mode windows of a day.
//!
//! Everything here is a pure function of its inputs.

use crate::domain::error::DecisionError;
use crate::domain::price::{PriceSeries, floor_to_hour};
use chrono::{DateTime, FixedOffset, TimeDelta};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Maximum distance between "now" and the sample a decision is based on.
pub const STALE_TOLERANCE_MINUTES: i64 = 120;

/// Cadence assumed for a series too short to infer one.
pub const DEFAULT_CADENCE_MINUTES: i64 = 60;

/// Value handed to the actuator: a power limit in kW, or no limit at all.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Limit(f64),
    NoLimit,
}

impl FromStr for Setting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "none" | "unlimited" | "no_limit" | "no limit" => Ok(Setting::NoLimit),
            _ => {
                let value: f64 = trimmed
                    .parse()
                    .map_err(|_| format!("'{trimmed}' is neither a number nor 'none'"))?;
                if !value.is_finite() || value < 0.0 {
                    return Err(format!("limit must be a non-negative number, got {trimmed}"));
                }
                Ok(Setting::Limit(value))
            }
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Limit(kw) => write!(f, "{kw:.3}"),
            Setting::NoLimit => f.write_str("none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Low,
    High,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Low => f.write_str("low"),
            Mode::High => f.write_str("high"),
        }
    }
}

/// Which price a decision is based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionStrategy {
    Nearest,
    HourlyAverage,
}

impl FromStr for DecisionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nearest" => Ok(DecisionStrategy::Nearest),
            "hourly_average" => Ok(DecisionStrategy::HourlyAverage),
            other => Err(format!(
                "unknown strategy '{other}' (expected nearest or hourly_average)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModePolicy {
    pub threshold: f64,
    pub low_setting: Setting,
    pub high_setting: Setting,
}

impl ModePolicy {
    /// Strictly below the threshold is low; everything else is high.
    pub fn mode_for(&self, price: f64) -> Mode {
        if price < self.threshold {
            Mode::Low
        } else {
            Mode::High
        }
    }

    pub fn setting_for(&self, mode: Mode) -> &Setting {
        match mode {
            Mode::Low => &self.low_setting,
            Mode::High => &self.high_setting,
        }
    }

    fn decide(&self, price: f64, basis: PriceBasis) -> Decision {
        let mode = self.mode_for(price);
        let setting = self.setting_for(mode).clone();
        info!(
            price,
            threshold = self.threshold,
            %mode,
            %setting,
            "price decision"
        );
        Decision {
            mode,
            setting,
            price,
            basis,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBasis {
    Sample { at: DateTime<FixedOffset> },
    HourlyAverage { hour_start: DateTime<FixedOffset> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub mode: Mode,
    pub setting: Setting,
    pub price: f64,
    pub basis: PriceBasis,
}

/// Decides from the sample closest to `now`, refusing samples more than
/// [`STALE_TOLERANCE_MINUTES`] away.
pub fn decide_mode(
    series: &PriceSeries,
    now: DateTime<FixedOffset>,
    policy: &ModePolicy,
) -> Result<Decision, DecisionError> {
    let sample = series.closest_sample(now)?;
    let distance = (sample.timestamp - now).abs();
    if distance > TimeDelta::minutes(STALE_TOLERANCE_MINUTES) {
        return Err(DecisionError::StaleData {
            sample_time: sample.timestamp,
            now,
            distance_minutes: distance.num_minutes(),
        });
    }
    Ok(policy.decide(sample.price, PriceBasis::Sample { at: sample.timestamp }))
}

/// Decides from the mean price of the hour containing `now`.
pub fn decide_mode_by_hourly_average(
    series: &PriceSeries,
    now: DateTime<FixedOffset>,
    policy: &ModePolicy,
) -> Result<Decision, DecisionError> {
    let average = series.hourly_average(now)?;
    Ok(policy.decide(
        average,
        PriceBasis::HourlyAverage {
            hour_start: floor_to_hour(now),
        },
    ))
}

pub fn decide(
    strategy: DecisionStrategy,
    series: &PriceSeries,
    now: DateTime<FixedOffset>,
    policy: &ModePolicy,
) -> Result<Decision, DecisionError> {
    match strategy {
        DecisionStrategy::Nearest => decide_mode(series, now, policy),
        DecisionStrategy::HourlyAverage => decide_mode_by_hourly_average(series, now, policy),
    }
}

/// Half-open window `[start, end)` during which prices are below threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowModeInterval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl LowModeInterval {
    pub fn contains(&self, t: DateTime<FixedOffset>) -> bool {
        t >= self.start && t < self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

impl fmt::Display for LowModeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Merges consecutive low samples into windows.
///
/// Two low samples belong to the same window when their gap does not exceed
/// the series cadence; a window ends one cadence after its last sample.
pub fn low_mode_intervals(series: &PriceSeries, threshold: f64) -> Vec<LowModeInterval> {
    let cadence = series
        .cadence()
        .unwrap_or_else(|| TimeDelta::minutes(DEFAULT_CADENCE_MINUTES));

    let mut intervals = Vec::new();
    let mut open: Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> = None;

    for sample in series.samples() {
        let ts = sample.timestamp;
        let is_low = sample.price < threshold;
        open = match (open, is_low) {
            // a zero gap is a duplicate timestamp and stays in the window
            (Some((start, last)), true) if ts - last <= cadence => Some((start, ts)),
            (Some((start, last)), true) => {
                intervals.push(LowModeInterval {
                    start,
                    end: last + cadence,
                });
                Some((ts, ts))
            }
            (Some((start, last)), false) => {
                intervals.push(LowModeInterval {
                    start,
                    end: last + cadence,
                });
                None
            }
            (None, true) => Some((ts, ts)),
            (None, false) => None,
        };
    }

    if let Some((start, last)) = open {
        intervals.push(LowModeInterval {
            start,
            end: last + cadence,
        });
    }
    intervals
}

/// True when `now` is within `window` of any interval boundary.
pub fn is_near_transition(
    intervals: &[LowModeInterval],
    now: DateTime<FixedOffset>,
    window: TimeDelta,
) -> bool {
    intervals
        .iter()
        .flat_map(|i| [i.start, i.end])
        .any(|edge| (edge - now).abs() <= window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::SeriesError;
    use crate::domain::price::PriceSample;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn hourly(prices: &[(u32, f64)]) -> PriceSeries {
        let samples = prices
            .iter()
            .map(|(h, p)| PriceSample::new(at(&format!("2025-02-14T{h:02}:00:00+02:00")), *p))
            .collect();
        PriceSeries::new(samples, at("2025-02-13T14:00:00+02:00"))
    }

    fn policy() -> ModePolicy {
        ModePolicy {
            threshold: 15.0,
            low_setting: Setting::Limit(5.0),
            high_setting: Setting::NoLimit,
        }
    }

    #[test]
    fn setting_parse_and_display() {
        assert_eq!("5".parse::<Setting>().unwrap(), Setting::Limit(5.0));
        assert_eq!("None".parse::<Setting>().unwrap(), Setting::NoLimit);
        assert_eq!("unlimited".parse::<Setting>().unwrap(), Setting::NoLimit);
        assert!("-1".parse::<Setting>().is_err());
        assert!("fast".parse::<Setting>().is_err());
        assert_eq!(Setting::Limit(5.0).to_string(), "5.000");
        assert_eq!(Setting::NoLimit.to_string(), "none");
    }

    #[test]
    fn decide_mode_below_threshold_is_low() {
        let s = hourly(&[(10, 14.99)]);
        let d = decide_mode(&s, at("2025-02-14T10:20:00+02:00"), &policy()).unwrap();
        assert_eq!(d.mode, Mode::Low);
        assert_eq!(d.setting, Setting::Limit(5.0));
        assert_eq!(
            d.basis,
            PriceBasis::Sample {
                at: at("2025-02-14T10:00:00+02:00")
            }
        );
    }

    #[test]
    fn decide_mode_at_threshold_is_high() {
        let s = hourly(&[(10, 15.0)]);
        let d = decide_mode(&s, at("2025-02-14T10:00:00+02:00"), &policy()).unwrap();
        assert_eq!(d.mode, Mode::High);
        assert_eq!(d.setting, Setting::NoLimit);
    }

    #[test]
    fn decide_mode_stale_regardless_of_price() {
        for price in [-50.0, 0.0, 500.0] {
            let s = hourly(&[(10, price)]);
            let err = decide_mode(&s, at("2025-02-14T12:00:01+02:00"), &policy()).unwrap_err();
            assert!(matches!(
                err,
                DecisionError::StaleData {
                    distance_minutes: 120,
                    ..
                }
            ));
        }
    }

    #[test]
    fn decide_mode_exactly_two_hours_is_accepted() {
        let s = hourly(&[(10, 1.0)]);
        assert!(decide_mode(&s, at("2025-02-14T12:00:00+02:00"), &policy()).is_ok());
        // a past sample satisfies the tolerance the same way a future one does
        assert!(decide_mode(&s, at("2025-02-14T08:00:00+02:00"), &policy()).is_ok());
    }

    #[test]
    fn decide_mode_empty_series() {
        let s = hourly(&[]);
        let err = decide_mode(&s, at("2025-02-14T10:00:00+02:00"), &policy()).unwrap_err();
        assert!(matches!(err, DecisionError::Series(SeriesError::NoSamples)));
    }

    #[test]
    fn hourly_average_smooths_spikes() {
        let samples = vec![
            PriceSample::new(at("2025-02-14T10:00:00+02:00"), 30.0),
            PriceSample::new(at("2025-02-14T10:15:00+02:00"), 2.0),
            PriceSample::new(at("2025-02-14T10:30:00+02:00"), 2.0),
            PriceSample::new(at("2025-02-14T10:45:00+02:00"), 2.0),
        ];
        let s = PriceSeries::new(samples, at("2025-02-13T14:00:00+02:00"));
        let now = at("2025-02-14T10:05:00+02:00");

        assert_eq!(decide_mode(&s, now, &policy()).unwrap().mode, Mode::High);
        let d = decide_mode_by_hourly_average(&s, now, &policy()).unwrap();
        assert_eq!(d.mode, Mode::Low);
        assert!((d.price - 9.0).abs() < 1e-9);
        assert_eq!(
            d.basis,
            PriceBasis::HourlyAverage {
                hour_start: at("2025-02-14T10:00:00+02:00")
            }
        );
    }

    #[test]
    fn hourly_average_propagates_empty_hour() {
        let s = hourly(&[(10, 1.0)]);
        let err =
            decide_mode_by_hourly_average(&s, at("2025-02-14T11:30:00+02:00"), &policy())
                .unwrap_err();
        assert!(matches!(
            err,
            DecisionError::Series(SeriesError::NoSamplesInHour { .. })
        ));
    }

    #[test]
    fn decide_dispatches_on_strategy() {
        let s = hourly(&[(10, 1.0)]);
        let now = at("2025-02-14T10:00:00+02:00");
        let a = decide(DecisionStrategy::Nearest, &s, now, &policy()).unwrap();
        let b = decide(DecisionStrategy::HourlyAverage, &s, now, &policy()).unwrap();
        assert!(matches!(a.basis, PriceBasis::Sample { .. }));
        assert!(matches!(b.basis, PriceBasis::HourlyAverage { .. }));
    }

    #[test]
    fn intervals_merge_consecutive_low_samples() {
        let s = hourly(&[(0, 20.0), (1, 10.0), (2, 10.0), (3, 20.0)]);
        let intervals = low_mode_intervals(&s, 15.0);
        assert_eq!(
            intervals,
            vec![LowModeInterval {
                start: at("2025-02-14T01:00:00+02:00"),
                end: at("2025-02-14T03:00:00+02:00"),
            }]
        );
    }

    #[test]
    fn intervals_all_high() {
        let s = hourly(&[(0, 20.0), (1, 30.0), (2, 15.0)]);
        assert!(low_mode_intervals(&s, 15.0).is_empty());
    }

    #[test]
    fn intervals_empty_series() {
        assert!(low_mode_intervals(&hourly(&[]), 15.0).is_empty());
    }

    #[test]
    fn intervals_single_low_sample() {
        let s = hourly(&[(14, 1.0)]);
        assert_eq!(
            low_mode_intervals(&s, 15.0),
            vec![LowModeInterval {
                start: at("2025-02-14T14:00:00+02:00"),
                end: at("2025-02-14T15:00:00+02:00"),
            }]
        );
    }

    #[test]
    fn intervals_split_on_gap_larger_than_cadence() {
        // 03:00 missing entirely: the window closes one cadence after 02:00
        let s = hourly(&[(1, 1.0), (2, 1.0), (4, 1.0), (5, 20.0)]);
        let intervals = low_mode_intervals(&s, 15.0);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].end, at("2025-02-14T03:00:00+02:00"));
        assert_eq!(intervals[1].start, at("2025-02-14T04:00:00+02:00"));
        assert_eq!(intervals[1].end, at("2025-02-14T05:00:00+02:00"));
    }

    #[test]
    fn intervals_follow_quarter_hour_cadence() {
        let samples = (0..8)
            .map(|i| {
                let price = if (2..5).contains(&i) { 1.0 } else { 50.0 };
                PriceSample::new(at("2025-02-14T10:00:00+02:00") + TimeDelta::minutes(15 * i), price)
            })
            .collect();
        let s = PriceSeries::new(samples, at("2025-02-13T14:00:00+02:00"));
        let intervals = low_mode_intervals(&s, 15.0);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start, at("2025-02-14T10:30:00+02:00"));
        assert_eq!(intervals[0].end, at("2025-02-14T11:15:00+02:00"));
        assert_eq!(intervals[0].duration(), TimeDelta::minutes(45));
        assert_eq!(intervals[0].to_string(), "10:30 - 11:15");
    }

    #[test]
    fn intervals_keep_duplicate_timestamps_in_one_window() {
        let s = hourly(&[(10, 1.0), (10, 2.0), (11, 1.0), (12, 20.0)]);
        assert_eq!(
            low_mode_intervals(&s, 15.0),
            vec![LowModeInterval {
                start: at("2025-02-14T10:00:00+02:00"),
                end: at("2025-02-14T12:00:00+02:00"),
            }]
        );
    }

    #[test]
    fn interval_is_half_open() {
        let i = LowModeInterval {
            start: at("2025-02-14T01:00:00+02:00"),
            end: at("2025-02-14T03:00:00+02:00"),
        };
        assert!(i.contains(at("2025-02-14T01:00:00+02:00")));
        assert!(i.contains(at("2025-02-14T02:59:59+02:00")));
        assert!(!i.contains(at("2025-02-14T03:00:00+02:00")));
    }

    #[test]
    fn near_transition_checks_both_edges() {
        let intervals = vec![LowModeInterval {
            start: at("2025-02-14T11:00:00+02:00"),
            end: at("2025-02-14T14:00:00+02:00"),
        }];
        let window = TimeDelta::minutes(30);
        assert!(is_near_transition(&intervals, at("2025-02-14T10:30:00+02:00"), window));
        assert!(is_near_transition(&intervals, at("2025-02-14T14:20:00+02:00"), window));
        assert!(!is_near_transition(&intervals, at("2025-02-14T12:30:00+02:00"), window));
        assert!(!is_near_transition(&[], at("2025-02-14T11:00:00+02:00"), window));
    }
}
