use chrono::{Datelike, Duration, NaiveDate};
use chrono_tz::America::New_York;

/// Current calendar date in US Eastern time, which is how slates are dated.
pub fn today_et() -> NaiveDate {
    chrono::Utc::now().with_timezone(&New_York).date_naive()
}

fn season_start_year(date: NaiveDate) -> i32 {
    if date.month() >= 10 {
        date.year()
    } else {
        date.year() - 1
    }
}

/// Season label such as `2025-26` for any date within that season.
pub fn season_label_for_date(date: NaiveDate) -> String {
    let start = season_start_year(date);
    format!("{}-{:02}", start, (start + 1).rem_euclid(100))
}

/// Inclusive (Oct 1, Jun 30) window of the season containing `date`.
pub fn season_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = season_start_year(date);
    // Oct 1 and Jun 30 exist in every year
    let begin = NaiveDate::from_ymd_opt(start, 10, 1).unwrap_or(date);
    let end = NaiveDate::from_ymd_opt(start + 1, 6, 30).unwrap_or(date);
    (begin, end)
}

/// Games strictly before the slate date are counted.
pub fn as_of_for_slate(slate_date: NaiveDate) -> NaiveDate {
    slate_date - Duration::days(1)
}
