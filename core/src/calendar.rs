//! Service-day arithmetic.
//!
//! The duplicate-boarding policy is "one boarding per rider per route per
//! calendar day", where the calendar day is taken in the service time zone
//! (the zone the shuttles actually run in), not UTC and not the host's
//! local zone. [`ServiceCalendar`] converts instants to service days and
//! back to half-open UTC windows `[start, end)`.

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// First instant of the day (inclusive).
    pub start: DateTime<Utc>,
    /// First instant of the next day (exclusive).
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Whether `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Calendar in the service time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceCalendar {
    tz: Tz,
}

impl ServiceCalendar {
    /// Create a calendar for the given IANA time zone.
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parse an IANA zone name (e.g. `"Asia/Seoul"`).
    ///
    /// # Errors
    ///
    /// Returns the offending name if it is not a known zone.
    pub fn from_zone_name(name: &str) -> Result<Self, String> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|_| format!("unknown time zone: {name}"))
    }

    /// The configured zone.
    #[must_use]
    pub const fn time_zone(&self) -> Tz {
        self.tz
    }

    /// The service day an instant belongs to.
    #[must_use]
    pub fn service_day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    /// The UTC window covering a service day.
    #[must_use]
    pub fn day_window(&self, day: NaiveDate) -> DayWindow {
        let start = self.start_of(day);
        let end = day
            .checked_add_days(Days::new(1))
            .map_or(DateTime::<Utc>::MAX_UTC, |next| self.start_of(next));
        DayWindow { start, end }
    }

    /// The UTC window of the service day containing `at`.
    #[must_use]
    pub fn window_containing(&self, at: DateTime<Utc>) -> DayWindow {
        self.day_window(self.service_day(at))
    }

    /// First instant of `day` in the service zone.
    ///
    /// Midnight can be skipped by a DST transition in some zones; the day
    /// then starts at the first local time that exists.
    fn start_of(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(NaiveTime::MIN);
        for minutes in [0_i64, 30, 60, 90, 120] {
            let candidate = midnight + chrono::Duration::minutes(minutes);
            if let Some(start) = self.resolve(candidate) {
                return start;
            }
        }
        Utc.from_utc_datetime(&midnight)
    }

    fn resolve(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => None,
        }
    }
}
