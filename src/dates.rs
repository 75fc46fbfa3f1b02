use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone};

/// Date window covered by one report run, as local-time epoch milliseconds.
#[derive(Debug, Clone)]
pub struct ReportWindow {
    start: DateTime<Local>,
    end: DateTime<Local>,
    label: String,
}

impl ReportWindow {
    /// Window for the full calendar month before `selected_month` of the
    /// current year. Selecting January reaches back into December of the
    /// previous year.
    pub fn previous_month(selected_month: u32) -> Option<Self> {
        let year = Local::now().year();
        let (start_date, end_date) = previous_month_bounds(year, selected_month)?;
        Some(Self::from_bounds(start_date, end_date))
    }

    pub fn from_bounds(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        let start = local_datetime(start_date, 0, 0, 0);
        let end = local_datetime(end_date, 23, 59, 59);
        let label = if start_date == end_date {
            format!("{}", start_date.format("%Y-%m-%d"))
        } else {
            format!(
                "{} → {}",
                start_date.format("%Y-%m-%d"),
                end_date.format("%Y-%m-%d")
            )
        };
        Self { start, end, label }
    }

    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// First and last day of the month preceding `selected_month` in `year`.
fn previous_month_bounds(year: i32, selected_month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first_of_selected = NaiveDate::from_ymd_opt(year, selected_month, 1)?;
    let last_of_previous = first_of_selected - Duration::days(1);
    let first_of_previous = last_of_previous.with_day(1)?;
    Some((first_of_previous, last_of_previous))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| "Invalid date format. Use YYYY-MM-DD.".to_string())
}

fn local_datetime(date: NaiveDate, hour: u32, minute: u32, second: u32) -> DateTime<Local> {
    let result = Local.with_ymd_and_hms(date.year(), date.month(), date.day(), hour, minute, second);
    result
        .earliest()
        .or_else(|| result.latest())
        .unwrap_or_else(Local::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_month_bounds_mid_year() {
        let (start, end) = previous_month_bounds(2026, 8).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 7, 31).unwrap());
    }

    #[test]
    fn previous_month_bounds_crosses_year_boundary() {
        let (start, end) = previous_month_bounds(2026, 1).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn previous_month_bounds_handles_leap_february() {
        let (start, end) = previous_month_bounds(2024, 3).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn previous_month_bounds_rejects_invalid_month() {
        assert!(previous_month_bounds(2026, 0).is_none());
        assert!(previous_month_bounds(2026, 13).is_none());
    }

    #[test]
    fn window_is_ordered_and_labeled() {
        let start = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        let window = ReportWindow::from_bounds(start, end);
        assert!(window.start_ms() < window.end_ms());
        assert!(window.label().contains("2026-07-01"));
        assert!(window.label().contains("2026-07-31"));
    }

    #[test]
    fn parse_date_valid() {
        let date = parse_date("2026-02-03").unwrap();
        assert_eq!(date.year(), 2026);
        assert_eq!(date.month(), 2);
        assert_eq!(date.day(), 3);
    }

    #[test]
    fn parse_date_invalid() {
        assert!(parse_date("02-03-2026").is_err());
    }
}
