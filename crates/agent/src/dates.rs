//! Natural-language date resolution.
//!
//! Turns phrases like "내일", "이번 주말" or "next week friday" into an ISO
//! date relative to a base date. Resolution is total: unrecognized input
//! resolves to the base date.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

static NEXT_WEEK_KO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"다음주\s*([월화수목금토일])").expect("valid regex"));

static NEXT_WEEK_EN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bnext\s+(?:week\s+)?(mon|tues|wednes|thurs|fri|satur|sun)day\b")
        .expect("valid regex")
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid regex"));

/// Today's date in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Resolve a date phrase to `YYYY-MM-DD`.
///
/// Rules, first match wins:
/// 1. tomorrow: base + 1
/// 2. day after tomorrow: base + 2
/// 3. weekend: the next Saturday, inclusive of base
/// 4. next week + weekday: that weekday in the following week
/// 5. a literal ISO date: returned verbatim
/// 6. today, or anything else: base
pub fn parse_natural_date(text: &str, base: NaiveDate) -> String {
    let text = text.trim();
    let lower = text.to_lowercase();
    let iso = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
    let weekday = base.weekday().num_days_from_monday() as i64;

    let day_after = text.contains("모레") || lower.contains("day after tomorrow");
    if text.contains("내일") || (lower.contains("tomorrow") && !day_after) {
        return iso(base + Duration::days(1));
    }
    if day_after {
        return iso(base + Duration::days(2));
    }
    if text.contains("주말") || lower.contains("weekend") {
        return iso(base + Duration::days((5 - weekday).rem_euclid(7)));
    }
    if let Some(target) = next_week_target(text) {
        return iso(base + Duration::days(7 - weekday + target));
    }
    if let Some(m) = ISO_DATE.find(text) {
        return m.as_str().to_string();
    }
    iso(base)
}

/// Monday-based index of the weekday named after "다음주" / "next week".
fn next_week_target(text: &str) -> Option<i64> {
    if let Some(c) = NEXT_WEEK_KO.captures(text) {
        return "월화수목금토일"
            .chars()
            .position(|d| c[1].starts_with(d))
            .map(|i| i as i64);
    }
    let c = NEXT_WEEK_EN.captures(text)?;
    ["mon", "tues", "wednes", "thurs", "fri", "satur", "sun"]
        .iter()
        .position(|d| c[1].eq_ignore_ascii_case(d))
        .map(|i| i as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn tomorrow_and_day_after() {
        let base = date("2025-09-27");
        assert_eq!(parse_natural_date("내일", base), "2025-09-28");
        assert_eq!(parse_natural_date("tomorrow", base), "2025-09-28");
        assert_eq!(parse_natural_date("모레", base), "2025-09-29");
        assert_eq!(parse_natural_date("the day after tomorrow", base), "2025-09-29");
    }

    #[test]
    fn weekend_is_next_saturday_inclusive() {
        // Wednesday
        assert_eq!(parse_natural_date("이번 주말", date("2025-09-24")), "2025-09-27");
        // Saturday resolves to itself
        assert_eq!(parse_natural_date("주말", date("2025-09-27")), "2025-09-27");
        // Sunday rolls forward to the following Saturday
        assert_eq!(parse_natural_date("this weekend", date("2025-09-28")), "2025-10-04");
    }

    #[test]
    fn next_week_weekday() {
        // Wednesday 2025-09-24; next week's Monday is 2025-09-29
        let base = date("2025-09-24");
        assert_eq!(parse_natural_date("다음주 월", base), "2025-09-29");
        assert_eq!(parse_natural_date("다음주금", base), "2025-10-03");
        assert_eq!(parse_natural_date("next week friday", base), "2025-10-03");
        assert_eq!(parse_natural_date("Next Sunday", base), "2025-10-05");
    }

    #[test]
    fn iso_date_is_returned_verbatim() {
        let base = date("2025-09-24");
        assert_eq!(parse_natural_date("2025-12-25에 뭐하지", base), "2025-12-25");
        assert_eq!(parse_natural_date("2025-13-45", base), "2025-13-45");
    }

    #[test]
    fn today_and_unknown_fall_back_to_base() {
        let base = date("2025-09-24");
        assert_eq!(parse_natural_date("오늘", base), "2025-09-24");
        assert_eq!(parse_natural_date("today", base), "2025-09-24");
        assert_eq!(parse_natural_date("언젠가", base), "2025-09-24");
        assert_eq!(parse_natural_date("", base), "2025-09-24");
    }

    #[test]
    fn tomorrow_outranks_later_phrases() {
        let base = date("2025-09-24");
        assert_eq!(parse_natural_date("내일 아니면 주말", base), "2025-09-25");
    }
}
