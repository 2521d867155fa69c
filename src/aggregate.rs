//! Interval aggregation: min/max of a numeric sensor over a time window.
//!
//! Two window flavours exist, matching the two ways the history pages ask
//! for data:
//!
//! - [`Window::Period`] is calendar aligned. `day` starts at local midnight,
//!   `week` on Monday 00:00, `month` on the 1st at 00:00.
//! - [`Window::Trailing`] is a rolling interval ending now, written as
//!   `"3 day"`, `"week"` or `"2 month"`.
//!
//! Both end at `now` and include it, so a window is `[start, now]`.

use std::fmt;

use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc,
};
use serde::Serialize;
use tracing::debug;

use crate::error::{QueryError, Result};
use crate::models::{SensorId, SensorKind, SensorReading};
use crate::store::{ReadingStore, TimeRange};

// ---

/// Longest accepted trailing interval, in days.
const MAX_TRAILING_DAYS: u64 = 100 * 366;

/// How far past a DST gap to look for the next valid local time.
const MAX_GAP_MINUTES: i64 = 180;

/// Calendar period used by aligned windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "day" | "days" => Some(Period::Day),
            "week" | "weeks" => Some(Period::Week),
            "month" | "months" => Some(Period::Month),
            _ => None,
        }
    }

    /// Upper bound of the unit's length in days.
    fn max_days(self) -> u64 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 31,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }
}

/// Time window for an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// From the start of the current calendar period until now.
    Period(Period),
    /// The last `count` units until now.
    Trailing { count: u32, unit: Period },
}

impl Window {
    /// Parse a calendar-aligned period: `day`, `week` or `month`.
    pub fn parse_period(s: &str) -> Result<Self> {
        Period::parse(s.trim())
            .map(Window::Period)
            .ok_or_else(|| QueryError::InvalidWindow(s.to_string()))
    }

    /// Parse a trailing interval: `"<N> <unit>"` or a bare unit meaning one.
    pub fn parse_interval(s: &str) -> Result<Self> {
        // ---
        let invalid = || QueryError::InvalidWindow(s.to_string());
        let mut parts = s.split_whitespace();

        let (count, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(count), Some(unit), None) => (count.parse::<u32>().map_err(|_| invalid())?, unit),
            _ => return Err(invalid()),
        };

        let unit = Period::parse(unit).ok_or_else(invalid)?;
        if count == 0 || u64::from(count) * unit.max_days() > MAX_TRAILING_DAYS {
            return Err(invalid());
        }

        Ok(Window::Trailing { count, unit })
    }

    /// First instant of the window, given the current local time.
    pub fn start<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Utc> {
        // ---
        match *self {
            Window::Period(period) => {
                let today = now.date_naive();
                let first_day = match period {
                    Period::Day => today,
                    Period::Week => {
                        today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
                    }
                    Period::Month => today.with_day(1).unwrap_or(today),
                };
                local_midnight(&now.timezone(), first_day)
            }
            Window::Trailing { count, unit } => {
                // Day and week steps are exact durations; months follow the calendar
                let now_utc = now.with_timezone(&Utc);
                let start = match unit {
                    Period::Day => Duration::try_days(i64::from(count))
                        .and_then(|span| now_utc.checked_sub_signed(span)),
                    Period::Week => Duration::try_weeks(i64::from(count))
                        .and_then(|span| now_utc.checked_sub_signed(span)),
                    Period::Month => now
                        .naive_local()
                        .checked_sub_months(Months::new(count))
                        .map(|naive| resolve_local(&now.timezone(), naive)),
                };
                start.unwrap_or(DateTime::<Utc>::MIN_UTC)
            }
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Period(period) => f.write_str(period.as_str()),
            Window::Trailing { count, unit } => write!(f, "{} {}", count, unit.as_str()),
        }
    }
}

/// Local midnight at the start of `date`, as UTC.
pub(crate) fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    resolve_local(tz, date.and_time(NaiveTime::MIN))
}

/// Resolve a local wall-clock time to an instant.
///
/// Ambiguous times take the earlier instant. A time inside a DST gap moves
/// forward to the first local time after the gap.
pub(crate) fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    // ---
    let first_valid = (0..=MAX_GAP_MINUTES).find_map(|minutes| {
        let candidate = naive.checked_add_signed(Duration::minutes(minutes))?;
        tz.from_local_datetime(&candidate).earliest()
    });

    match first_valid {
        Some(dt) => dt.with_timezone(&Utc),
        None => {
            // No valid time nearby, apply the offset in effect at that instant
            let offset = tz.offset_from_utc_datetime(&naive).fix();
            let utc = naive - Duration::seconds(i64::from(offset.local_minus_utc()));
            Utc.from_utc_datetime(&utc)
        }
    }
}

// ---

/// A value together with the time it was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extreme {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Minimum and maximum of one sensor over a window.
///
/// `min` and `max` are both `None` when the window holds no readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinMaxResult {
    pub sensor: SensorId,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub min: Option<Extreme>,
    pub max: Option<Extreme>,
}

impl MinMaxResult {
    /// Whether this is the no-data result.
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Scan readings for their extremes.
///
/// Readings must be in chronological order. On ties the earliest reading
/// wins. Non-numeric and non-finite values are skipped.
pub fn min_max(sensor: SensorId, range: TimeRange, readings: &[SensorReading]) -> MinMaxResult {
    // ---
    let mut min: Option<Extreme> = None;
    let mut max: Option<Extreme> = None;

    for reading in readings {
        let Some(value) = reading.value.as_f64().filter(|v| v.is_finite()) else {
            continue;
        };
        let candidate = Extreme {
            value,
            timestamp: reading.timestamp,
        };

        if min.map_or(true, |m| value < m.value) {
            min = Some(candidate);
        }
        if max.map_or(true, |m| value > m.value) {
            max = Some(candidate);
        }
    }

    MinMaxResult {
        sensor,
        window_start: range.start,
        window_end: range.end,
        min,
        max,
    }
}

/// Min/max of `sensor` over `window`, evaluated at `now`.
pub async fn get_min_max<S, Tz>(
    store: &S,
    sensor: SensorId,
    window: &Window,
    now: &DateTime<Tz>,
) -> Result<MinMaxResult>
where
    S: ReadingStore + ?Sized,
    Tz: TimeZone,
{
    // ---
    if sensor.kind() != SensorKind::Numeric {
        return Err(QueryError::NotNumeric(sensor));
    }

    let range = TimeRange::closed(window.start(now), now.with_timezone(&Utc));
    let readings = store.readings_in(sensor, range).await?;
    let result = min_max(sensor, range, &readings);

    debug!(
        "min/max {} over {} ({} readings): {:?} / {:?}",
        sensor,
        window,
        readings.len(),
        result.min.map(|e| e.value),
        result.max.map(|e| e.value)
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::SensorValue;
    use crate::store::MemoryStore;
    use chrono::FixedOffset;

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, h, 0, 0).unwrap()
    }

    fn numeric(sensor: SensorId, ts: DateTime<Utc>, v: f64) -> SensorReading {
        SensorReading {
            sensor,
            timestamp: ts,
            value: SensorValue::Numeric(v),
        }
    }

    #[test]
    fn test_parse_period() {
        // ---
        assert_eq!(Window::parse_period("day").unwrap(), Window::Period(Period::Day));
        assert_eq!(Window::parse_period("month").unwrap(), Window::Period(Period::Month));
        assert!(matches!(
            Window::parse_period("3 day"),
            Err(QueryError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_parse_interval() {
        // ---
        assert_eq!(
            Window::parse_interval("3 day").unwrap(),
            Window::Trailing { count: 3, unit: Period::Day }
        );
        assert_eq!(
            Window::parse_interval("week").unwrap(),
            Window::Trailing { count: 1, unit: Period::Week }
        );
        assert!(Window::parse_interval("0 day").is_err());
        assert!(Window::parse_interval("three day").is_err());
        assert!(Window::parse_interval("3 fortnight").is_err());
        assert!(Window::parse_interval("1 day extra").is_err());
        assert!(Window::parse_interval("").is_err());
    }

    #[test]
    fn test_period_starts_are_calendar_aligned() {
        // ---
        // Wednesday 2025-01-15 14:30 UTC
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap();

        assert_eq!(Window::Period(Period::Day).start(&now), utc(15, 0));
        assert_eq!(Window::Period(Period::Week).start(&now), utc(13, 0));
        assert_eq!(Window::Period(Period::Month).start(&now), utc(1, 0));
    }

    #[test]
    fn test_period_start_uses_local_midnight() {
        // ---
        let cet = FixedOffset::east_opt(3600).unwrap();
        let now = cet.with_ymd_and_hms(2025, 1, 15, 0, 30, 0).unwrap();

        // Local midnight in UTC+1 is 23:00 UTC the previous day
        assert_eq!(
            Window::Period(Period::Day).start(&now),
            Utc.with_ymd_and_hms(2025, 1, 14, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_trailing_starts() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();

        let three_days = Window::parse_interval("3 day").unwrap();
        assert_eq!(
            three_days.start(&now),
            Utc.with_ymd_and_hms(2025, 3, 28, 12, 0, 0).unwrap()
        );

        let week = Window::parse_interval("week").unwrap();
        assert_eq!(week.start(&now), Utc.with_ymd_and_hms(2025, 3, 24, 12, 0, 0).unwrap());

        // Clamped to the last day of February
        let month = Window::parse_interval("month").unwrap();
        assert_eq!(month.start(&now), Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_outdoor_temperature_day_scenario() {
        // ---
        let store = MemoryStore::with_readings(vec![
            numeric(SensorId::OutdoorTemp, utc(10, 8), 5.0),
            numeric(SensorId::OutdoorTemp, utc(10, 12), 15.0),
            numeric(SensorId::OutdoorTemp, utc(10, 18), 9.0),
        ])
        .unwrap();
        let now = utc(10, 20);

        let result = tokio_test::block_on(get_min_max(
            &store,
            SensorId::OutdoorTemp,
            &Window::Period(Period::Day),
            &now,
        ))
        .unwrap();

        assert_eq!(result.min, Some(Extreme { value: 5.0, timestamp: utc(10, 8) }));
        assert_eq!(result.max, Some(Extreme { value: 15.0, timestamp: utc(10, 12) }));
        assert_eq!(result.window_start, utc(10, 0));
        assert_eq!(result.window_end, now);
    }

    #[test]
    fn test_tie_break_prefers_first_occurrence() {
        // ---
        let readings = vec![
            numeric(SensorId::RoomActualTemp, utc(2, 1), 3.0),
            numeric(SensorId::RoomActualTemp, utc(2, 2), 5.0),
            numeric(SensorId::RoomActualTemp, utc(2, 3), 5.0),
            numeric(SensorId::RoomActualTemp, utc(2, 4), 3.0),
        ];
        let range = TimeRange::closed(utc(2, 0), utc(2, 5));
        let result = min_max(SensorId::RoomActualTemp, range, &readings);

        assert_eq!(result.max.unwrap().timestamp, utc(2, 2));
        assert_eq!(result.min.unwrap().timestamp, utc(2, 1));
    }

    #[test]
    fn test_bounds_hold_for_every_value() {
        // ---
        let values = [4.2, -3.1, 7.7, 0.0, 7.7, -3.1, 2.5];
        let readings: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, v)| numeric(SensorId::BoilerActualTemp, utc(3, i as u32), *v))
            .collect();
        let result = min_max(
            SensorId::BoilerActualTemp,
            TimeRange::closed(utc(3, 0), utc(3, 23)),
            &readings,
        );

        let (lo, hi) = (result.min.unwrap().value, result.max.unwrap().value);
        assert!(values.iter().all(|v| lo <= *v && *v <= hi));
        assert_eq!((lo, hi), (-3.1, 7.7));
    }

    #[test]
    fn test_non_finite_values_are_ignored() {
        // ---
        let readings = vec![
            numeric(SensorId::OutdoorTemp, utc(4, 1), f64::NAN),
            numeric(SensorId::OutdoorTemp, utc(4, 2), 1.5),
            numeric(SensorId::OutdoorTemp, utc(4, 3), f64::INFINITY),
        ];
        let result = min_max(
            SensorId::OutdoorTemp,
            TimeRange::closed(utc(4, 0), utc(4, 4)),
            &readings,
        );
        assert_eq!(result.min.unwrap().value, 1.5);
        assert_eq!(result.max.unwrap().value, 1.5);
    }

    #[test]
    fn test_empty_window_is_sentinel() {
        // ---
        let store = MemoryStore::with_readings(vec![numeric(SensorId::OutdoorTemp, utc(1, 8), 2.0)])
            .unwrap();
        let now = utc(20, 12);

        let result = tokio_test::block_on(get_min_max(
            &store,
            SensorId::OutdoorTemp,
            &Window::Period(Period::Day),
            &now,
        ))
        .unwrap();

        assert!(result.is_empty());
    }

    #[test]
    fn test_window_start_is_inclusive() {
        // ---
        let store = MemoryStore::with_readings(vec![
            numeric(SensorId::OutdoorTemp, utc(9, 23), -8.0),
            numeric(SensorId::OutdoorTemp, utc(10, 0), -2.0),
            numeric(SensorId::OutdoorTemp, utc(10, 6), 1.0),
        ])
        .unwrap();
        let now = utc(10, 6);

        let result = tokio_test::block_on(get_min_max(
            &store,
            SensorId::OutdoorTemp,
            &Window::Period(Period::Day),
            &now,
        ))
        .unwrap();

        // Midnight reading counts, the one before it does not, and `now` is included
        assert_eq!(result.min.unwrap().value, -2.0);
        assert_eq!(result.max.unwrap().timestamp, now);
    }

    #[test]
    fn test_repeated_queries_are_identical() {
        // ---
        let store = MemoryStore::with_readings(vec![
            numeric(SensorId::OutdoorTemp, utc(10, 8), 5.0),
            numeric(SensorId::OutdoorTemp, utc(10, 9), 6.0),
        ])
        .unwrap();
        let now = utc(10, 12);
        let window = Window::parse_interval("3 day").unwrap();

        let first =
            tokio_test::block_on(get_min_max(&store, SensorId::OutdoorTemp, &window, &now)).unwrap();
        let second =
            tokio_test::block_on(get_min_max(&store, SensorId::OutdoorTemp, &window, &now)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_non_numeric_sensor_is_rejected() {
        // ---
        let store = MemoryStore::new();
        let now = utc(10, 12);

        let err = tokio_test::block_on(get_min_max(
            &store,
            SensorId::Burner,
            &Window::Period(Period::Day),
            &now,
        ))
        .unwrap_err();
        assert!(matches!(err, QueryError::NotNumeric(SensorId::Burner)));
    }

    #[test]
    fn test_interval_length_is_bounded() {
        // ---
        assert!(Window::parse_interval("1000 month").is_ok());
        assert!(Window::parse_interval("4000000000 month").is_err());
        assert!(Window::parse_interval("100000 week").is_err());
    }

    #[test]
    fn test_trailing_start_lands_in_spring_gap() {
        // ---
        let tz = chrono_tz::Europe::Berlin;

        // One week back is 2025-03-30 02:30 local, which was skipped
        let now = tz.with_ymd_and_hms(2025, 4, 6, 2, 30, 0).unwrap();
        let start = Window::parse_interval("week").unwrap().start(&now);
        assert_ne!(start, DateTime::<Utc>::MIN_UTC);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 30, 0, 30, 0).unwrap());

        let now = tz.with_ymd_and_hms(2025, 4, 2, 2, 30, 0).unwrap();
        let start = Window::parse_interval("3 day").unwrap().start(&now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 30, 0, 30, 0).unwrap());

        // A calendar month back resolves to the first time after the gap
        let now = tz.with_ymd_and_hms(2025, 4, 30, 2, 30, 0).unwrap();
        let start = Window::parse_interval("month").unwrap().start(&now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 30, 1, 0, 0).unwrap());
    }

    #[test]
    fn test_trailing_start_lands_in_autumn_overlap() {
        // ---
        let tz = chrono_tz::Europe::Berlin;

        // One week back is 2025-10-26 02:30 local, which happened twice
        let now = tz.with_ymd_and_hms(2025, 11, 2, 2, 30, 0).unwrap();
        let start = Window::parse_interval("week").unwrap().start(&now);
        assert_ne!(start, DateTime::<Utc>::MIN_UTC);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 10, 26, 1, 30, 0).unwrap());

        // Calendar month back takes the earlier of the two instants
        let now = tz.with_ymd_and_hms(2025, 11, 26, 2, 30, 0).unwrap();
        let start = Window::parse_interval("month").unwrap().start(&now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 10, 26, 0, 30, 0).unwrap());
    }

    #[test]
    fn test_period_start_on_dst_change_day() {
        // ---
        let berlin = chrono_tz::Europe::Berlin;
        let now = berlin.with_ymd_and_hms(2025, 3, 30, 12, 0, 0).unwrap();
        assert_eq!(
            Window::Period(Period::Day).start(&now),
            Utc.with_ymd_and_hms(2025, 3, 29, 23, 0, 0).unwrap()
        );

        // Midnight itself was skipped: the day starts at 01:00 local (UTC-2)
        let sao_paulo = chrono_tz::America::Sao_Paulo;
        let now = sao_paulo.with_ymd_and_hms(2018, 11, 4, 12, 0, 0).unwrap();
        assert_eq!(
            Window::Period(Period::Day).start(&now),
            Utc.with_ymd_and_hms(2018, 11, 4, 3, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_local_midnight_in_gap_moves_forward() {
        // ---
        let sao_paulo = chrono_tz::America::Sao_Paulo;
        let day = NaiveDate::from_ymd_opt(2018, 11, 4).unwrap();
        let midnight = local_midnight(&sao_paulo, day);

        // 01:00 local at UTC-2, the first instant of the day
        assert_eq!(midnight, Utc.with_ymd_and_hms(2018, 11, 4, 3, 0, 0).unwrap());
        assert_eq!(midnight.with_timezone(&sao_paulo).date_naive(), day);
    }
}
