//! Human-facing time formatting shared by the TUI and stintctl.

use chrono::{DateTime, Local, NaiveTime, TimeZone};

/// `HH:MM:SS`, floored to whole seconds. Hours are not wrapped at 24.
pub fn format_duration(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Local time of day, e.g. `1:31:30 PM`.
pub fn format_time_of_day(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%-I:%M:%S %p").to_string(),
        None => "--:--:--".to_string(),
    }
}

/// Local 24h `HH:MM:SS`, the form accepted back by [`parse_time_of_day`].
pub fn format_time_24h(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

/// Parses `HH:MM:SS` or `HH:MM` (24h) onto the local calendar date of `base_ms`.
pub fn parse_time_of_day(base_ms: i64, input: &str) -> Option<i64> {
    let input = input.trim();
    let time = NaiveTime::parse_from_str(input, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M"))
        .ok()?;
    let base = Local.timestamp_millis_opt(base_ms).single()?;
    let naive = base.date_naive().and_time(time);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// Accepts epoch milliseconds, RFC 3339, or a time of day relative to `base_ms`.
pub fn parse_timestamp(input: &str, base_ms: i64) -> Option<i64> {
    let input = input.trim();
    if let Ok(ms) = input.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp_millis());
    }
    parse_time_of_day(base_ms, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // 2024-03-14T12:00:00Z
    const BASE: i64 = 1_710_417_600_000;

    #[test]
    fn durations_floor_to_seconds() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(999), "00:00:00");
        assert_eq!(format_duration(5_000), "00:00:05");
        assert_eq!(format_duration(3_723_500), "01:02:03");
        assert_eq!(format_duration(100 * 3_600_000), "100:00:00");
    }

    #[test]
    fn negative_durations_clamp_to_zero() {
        assert_eq!(format_duration(-5_000), "00:00:00");
    }

    #[test]
    fn time_of_day_lands_on_base_date() {
        let parsed = parse_time_of_day(BASE, "13:31:30").unwrap();
        let dt = Local.timestamp_millis_opt(parsed).single().unwrap();
        let base = Local.timestamp_millis_opt(BASE).single().unwrap();

        assert_eq!(dt.format("%H:%M:%S").to_string(), "13:31:30");
        assert_eq!(dt.date_naive(), base.date_naive());
    }

    #[test]
    fn time_of_day_accepts_minutes_only() {
        let parsed = parse_time_of_day(BASE, " 09:05 ").unwrap();
        let dt = Local.timestamp_millis_opt(parsed).single().unwrap();
        assert_eq!(dt.format("%H:%M:%S").to_string(), "09:05:00");
    }

    #[test]
    fn formatted_time_parses_back_to_the_same_instant() {
        let formatted = format_time_24h(BASE + 4_000);
        assert_eq!(parse_time_of_day(BASE, &formatted), Some(BASE + 4_000));
    }

    #[test]
    fn garbage_time_of_day_is_rejected() {
        assert_eq!(parse_time_of_day(BASE, "25:00"), None);
        assert_eq!(parse_time_of_day(BASE, "noon"), None);
    }

    #[test]
    fn timestamps_accept_epoch_and_rfc3339() {
        assert_eq!(parse_timestamp("1710417600000", 0), Some(BASE));
        assert_eq!(parse_timestamp("2024-03-14T12:00:00Z", 0), Some(BASE));
        assert_eq!(parse_timestamp("2024-03-14T13:00:00+01:00", 0), Some(BASE));
    }
}
