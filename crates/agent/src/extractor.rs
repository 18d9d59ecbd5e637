//! Keyword and date-phrase extraction from raw user text.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::dates::parse_natural_date;

/// Date-phrase patterns in priority order: weekend, tomorrow, day after
/// tomorrow, next-week weekday, ISO date, today.
static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"이번 주말|(?i:\bthis\s+weekend\b)",
        r"내일|(?i:\bday\s+after\s+tomorrow\b|\btomorrow\b)",
        r"모레|(?i:\bday\s+after\s+tomorrow\b)",
        r"다음주\s*[월화수목금토일]|(?i:\bnext\s+(?:week\s+)?(?:mon|tues|wednes|thurs|fri|satur|sun)day\b)",
        r"\d{4}-\d{2}-\d{2}",
        r"오늘|(?i:\btoday\b)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// What the extractor found in one message. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedIntent {
    pub location: Option<String>,
    pub date_phrase: Option<String>,
    pub resolved_date: Option<String>,
}

impl ExtractedIntent {
    /// Both a location and a date were recognized.
    pub fn is_resolved(&self) -> bool {
        self.location.is_some() && self.resolved_date.is_some()
    }
}

/// Scans text for gazetteer names and date phrases.
pub struct KeywordExtractor {
    locations: Vec<String>,
}

impl KeywordExtractor {
    /// Build with an explicit candidate list; iteration order is match priority.
    pub fn new<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locations: locations.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from the built-in gazetteer.
    pub fn with_gazetteer() -> Self {
        Self::new(smartday_tools::gazetteer::location_keywords())
    }

    /// First candidate that occurs as a substring of `text`.
    pub fn find_location(&self, text: &str) -> Option<&str> {
        self.locations
            .iter()
            .find(|loc| text.contains(loc.as_str()))
            .map(String::as_str)
    }

    /// Text of the first pattern, in priority order, that matches anywhere.
    pub fn find_date_phrase<'t>(&self, text: &'t str) -> Option<&'t str> {
        DATE_PATTERNS
            .iter()
            .find_map(|re| re.find(text).map(|m| m.as_str()))
    }

    /// Extract location and date phrase, resolving the phrase against `base`.
    pub fn extract(&self, text: &str, base: NaiveDate) -> ExtractedIntent {
        let location = self.find_location(text).map(str::to_string);
        let date_phrase = self.find_date_phrase(text).map(str::to_string);
        let resolved_date = date_phrase
            .as_deref()
            .map(|phrase| parse_natural_date(phrase, base));
        ExtractedIntent {
            location,
            date_phrase,
            resolved_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 27).unwrap()
    }

    #[test]
    fn seoul_tomorrow() {
        let ex = KeywordExtractor::with_gazetteer();
        let intent = ex.extract("내일 서울 날씨 어때?", base());
        assert_eq!(intent.location.as_deref(), Some("서울"));
        assert_eq!(intent.date_phrase.as_deref(), Some("내일"));
        assert_eq!(intent.resolved_date.as_deref(), Some("2025-09-28"));
        assert!(intent.is_resolved());
    }

    #[test]
    fn first_gazetteer_entry_wins() {
        let ex = KeywordExtractor::new(["서울", "강남"]);
        assert_eq!(ex.find_location("강남이랑 서울"), Some("서울"));
        let ex = KeywordExtractor::new(["강남", "서울"]);
        assert_eq!(ex.find_location("강남이랑 서울"), Some("강남"));
    }

    #[test]
    fn district_keywords_are_candidates() {
        let ex = KeywordExtractor::with_gazetteer();
        assert_eq!(ex.find_location("판교에서 점심"), Some("판교"));
    }

    #[test]
    fn match_word_is_not_a_location() {
        let ex = KeywordExtractor::with_gazetteer();
        assert_eq!(ex.find_location("내일 축구 경기 보러 갈까?"), None);
        assert_eq!(ex.find_location("내일 경기도 날씨"), Some("경기도"));
    }

    #[test]
    fn date_patterns_follow_priority_not_position() {
        let ex = KeywordExtractor::with_gazetteer();
        // "오늘" appears first in the text but "내일" has priority
        assert_eq!(ex.find_date_phrase("오늘 말고 내일"), Some("내일"));
        assert_eq!(ex.find_date_phrase("다음주 토요일 부산"), Some("다음주 토"));
        assert_eq!(ex.find_date_phrase("2025-10-03 일정"), Some("2025-10-03"));
    }

    #[test]
    fn english_phrases() {
        let ex = KeywordExtractor::with_gazetteer();
        let intent = ex.extract("Boston the day after tomorrow?", base());
        assert_eq!(intent.location.as_deref(), Some("Boston"));
        assert_eq!(intent.date_phrase.as_deref(), Some("day after tomorrow"));
        assert_eq!(intent.resolved_date.as_deref(), Some("2025-09-29"));
    }

    #[test]
    fn absence_is_not_an_error() {
        let ex = KeywordExtractor::with_gazetteer();
        let intent = ex.extract("맛집 추천해줘", base());
        assert_eq!(intent, ExtractedIntent::default());
        assert!(!intent.is_resolved());

        let only_location = ex.extract("부산 맛집", base());
        assert!(only_location.location.is_some());
        assert!(!only_location.is_resolved());
    }
}
