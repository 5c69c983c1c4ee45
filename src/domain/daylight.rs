//! Sunrise/sunset gate for the configured site.
//!
//! Uses the standard sunrise equation with the -0.833° horizon correction for
//! refraction and the solar disc. Accurate to about a minute at mid latitudes.

use crate::domain::error::DaylightError;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;
const J2000: f64 = 2_451_545.0;
const DAYS_FROM_CE_TO_UNIX_EPOCH: i32 = 719_163;
const AXIAL_TILT_DEG: f64 = 23.4397;
const HORIZON_DEG: f64 = -0.833;

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    latitude: f64,
    longitude: f64,
    tz: Tz,
}

impl Location {
    /// Latitude in degrees north, longitude in degrees east.
    pub fn new(latitude: f64, longitude: f64, tz: Tz) -> Result<Self, DaylightError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(DaylightError::InvalidLatitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(DaylightError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
            tz,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }
}

/// How the sun behaves over one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SunPhase {
    Regular,
    /// The sun never sets.
    PolarDay,
    /// The sun never rises.
    PolarNight,
}

/// Result of a daylight check, expressed in the site's local time.
///
/// For a polar day the window spans the whole local day. For a polar night
/// sunrise and sunset both sit at solar noon and the window is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaylightWindow {
    pub is_daylight: bool,
    pub sunrise: DateTime<FixedOffset>,
    pub sunset: DateTime<FixedOffset>,
    pub phase: SunPhase,
}

/// Sun events for `date` at the site, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunEvents {
    pub phase: SunPhase,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub solar_noon: DateTime<Utc>,
}

pub fn sun_events(date: NaiveDate, location: &Location) -> Result<SunEvents, DaylightError> {
    let out_of_range = || DaylightError::OutOfRange { date };

    let days_since_epoch = f64::from(date.num_days_from_ce() - DAYS_FROM_CE_TO_UNIX_EPOCH);
    let julian_midnight = days_since_epoch + UNIX_EPOCH_JULIAN_DAY;
    let n = (julian_midnight - J2000 + 0.0008).ceil();

    let mean_solar_time = n - location.longitude / 360.0;
    let anomaly = (357.5291 + 0.985_600_28 * mean_solar_time).rem_euclid(360.0);
    let m = anomaly.to_radians();
    let center = 1.9148 * m.sin() + 0.0200 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin();
    let ecliptic_longitude = (anomaly + center + 180.0 + 102.9372).rem_euclid(360.0);
    let lambda = ecliptic_longitude.to_radians();

    let transit = J2000 + mean_solar_time + 0.0053 * m.sin() - 0.0069 * (2.0 * lambda).sin();

    let sin_declination = lambda.sin() * AXIAL_TILT_DEG.to_radians().sin();
    let cos_declination = sin_declination.asin().cos();
    let phi = location.latitude.to_radians();
    let cos_hour_angle = (HORIZON_DEG.to_radians().sin() - phi.sin() * sin_declination)
        / (phi.cos() * cos_declination);

    let solar_noon = julian_to_utc(transit).ok_or_else(out_of_range)?;

    if cos_hour_angle > 1.0 {
        return Ok(SunEvents {
            phase: SunPhase::PolarNight,
            sunrise: solar_noon,
            sunset: solar_noon,
            solar_noon,
        });
    }
    if cos_hour_angle < -1.0 {
        return Ok(SunEvents {
            phase: SunPhase::PolarDay,
            sunrise: solar_noon,
            sunset: solar_noon,
            solar_noon,
        });
    }

    let half_day = cos_hour_angle.acos().to_degrees() / 360.0;
    Ok(SunEvents {
        phase: SunPhase::Regular,
        sunrise: julian_to_utc(transit - half_day).ok_or_else(out_of_range)?,
        sunset: julian_to_utc(transit + half_day).ok_or_else(out_of_range)?,
        solar_noon,
    })
}

/// Whether `now` falls between sunrise and sunset (both inclusive) on its
/// local calendar day at `location`.
pub fn is_daylight(
    now: DateTime<FixedOffset>,
    location: &Location,
) -> Result<DaylightWindow, DaylightError> {
    let tz = location.tz;
    let date = now.with_timezone(&tz).date_naive();
    let events = sun_events(date, location)?;

    let (sunrise, sunset) = match events.phase {
        SunPhase::Regular | SunPhase::PolarNight => (
            events.sunrise.with_timezone(&tz).fixed_offset(),
            events.sunset.with_timezone(&tz).fixed_offset(),
        ),
        SunPhase::PolarDay => {
            let start = local_midnight(&tz, date);
            let next = date.succ_opt().ok_or(DaylightError::OutOfRange { date })?;
            (start, local_midnight(&tz, next) - TimeDelta::seconds(1))
        }
    };

    let is_daylight = match events.phase {
        SunPhase::PolarNight => false,
        _ => now >= sunrise && now <= sunset,
    };

    debug!(
        %now,
        %sunrise,
        %sunset,
        phase = ?events.phase,
        is_daylight,
        "daylight check"
    );

    Ok(DaylightWindow {
        is_daylight,
        sunrise,
        sunset,
        phase: events.phase,
    })
}

fn local_midnight(tz: &Tz, date: NaiveDate) -> DateTime<FixedOffset> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
        .fixed_offset()
}

fn julian_to_utc(julian: f64) -> Option<DateTime<Utc>> {
    let seconds = ((julian - UNIX_EPOCH_JULIAN_DAY) * 86_400.0).round();
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp(seconds as i64, 0)
}
