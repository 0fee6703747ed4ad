use chrono::{Datelike, Duration, NaiveDate};

/// Monday and Sunday of the ISO week containing `reference`.
pub fn week_bounds(reference: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = reference - Duration::days(reference.weekday().num_days_from_monday() as i64);
    (start, start + Duration::days(6))
}
