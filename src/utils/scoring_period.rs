use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday,
};
use chrono_tz::America::New_York;

/// Hour (Eastern wall clock) at which a new scoring week begins on Tuesday
const WEEK_START_HOUR: u32 = 3;

/// A half-open weekly window `[start, end)` in which a user may hold one lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScoringPeriod {
    /// The scoring week containing `at`: Tuesday 03:00 US Eastern through the next Tuesday 03:00
    pub fn containing(at: DateTime<Utc>) -> Self {
        let local = at.with_timezone(&New_York);

        let mut days_back = (local.weekday().num_days_from_monday() + 6) % 7;
        if local.weekday() == Weekday::Tue && local.hour() < WEEK_START_HOUR {
            days_back = 7;
        }

        let start_date = local.date_naive() - Duration::days(days_back as i64);
        let end_date = start_date + Duration::days(7);

        Self {
            start: week_start_to_utc(start_date),
            end: week_start_to_utc(end_date),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

pub fn same_scoring_period(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    ScoringPeriod::containing(a) == ScoringPeriod::containing(b)
}

/// Tuesday 03:00 Eastern on `date`, expressed in UTC
fn week_start_to_utc(date: NaiveDate) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN + Duration::hours(WEEK_START_HOUR as i64));
    New_York
        .from_local_datetime(&local)
        .earliest()
        // Skipped wall-clock hour: read it as standard time
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| (local + Duration::hours(5)).and_utc())
}
