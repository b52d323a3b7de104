//! Common utility functions used across modules.
//!
//! - [`format_count`] - Format counts with K/M suffix (1.5K, 2.3M)
//! - [`truncate`] - Truncate strings with ellipsis
//! - [`source_label`] - Short label for a source URL
//! - [`moscow_now`] / [`format_timestamp`] - Run timestamps

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Moscow has been on UTC+3 year-round since 2014.
const MOSCOW_OFFSET_SECS: i32 = 3 * 3600;

/// Format a count with K/M suffix for compact display.
///
/// # Examples
/// ```
/// use wlmerge::utils::format_count;
/// assert_eq!(format_count(500), "500");
/// assert_eq!(format_count(1500), "1.5K");
/// assert_eq!(format_count(1_500_000), "1.5M");
/// ```
pub fn format_count(count: usize) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Truncate a string to at most `max_chars` characters, adding "..." if truncated.
///
/// # Examples
/// ```
/// use wlmerge::utils::truncate;
/// assert_eq!(truncate("short", 10), "short");
/// assert_eq!(truncate("this is long", 10), "this is...");
/// ```
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else if max_chars <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_chars - 3).collect();
        format!("{}...", head)
    }
}

/// Short label for a source URL: its fourth `/`-separated segment, which is
/// the repository owner for `raw.githubusercontent.com` URLs.
///
/// # Examples
/// ```
/// use wlmerge::utils::source_label;
/// assert_eq!(source_label("https://raw.githubusercontent.com/zieng2/wl/main/a.txt"), "zieng2");
/// assert_eq!(source_label("no-slashes"), "unknown");
/// ```
pub fn source_label(url: &str) -> String {
    url.split('/')
        .nth(3)
        .filter(|segment| !segment.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Current time in Moscow.
pub fn moscow_now() -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(MOSCOW_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset)
}

/// `HH:MM | DD.MM.YYYY`, the timestamp format used in file headers and commits.
pub fn format_timestamp(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%H:%M | %d.%m.%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1.0K");
        assert_eq!(format_count(1_000_000), "1.0M");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("test", 3), "...");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("ошибка загрузки", 9), "ошибка...");
    }

    #[test]
    fn test_source_label() {
        assert_eq!(
            source_label("https://raw.githubusercontent.com/zieng2/wl/main/vless_lite.txt"),
            "zieng2"
        );
        assert_eq!(source_label("https://example.com/"), "unknown");
        assert_eq!(source_label(""), "unknown");
    }

    #[test]
    fn test_format_timestamp() {
        let offset = FixedOffset::east_opt(MOSCOW_OFFSET_SECS).unwrap();
        let dt = offset.with_ymd_and_hms(2026, 3, 7, 9, 5, 0).unwrap();
        assert_eq!(format_timestamp(&dt), "09:05 | 07.03.2026");
    }

    #[test]
    fn test_moscow_now_offset() {
        assert_eq!(moscow_now().offset().local_minus_utc(), MOSCOW_OFFSET_SECS);
    }
}
