//! `smartday resolve-date`: resolve a date phrase against a base date.

use chrono::NaiveDate;
use smartday_agent::{parse_natural_date, today_in};
use smartday_config::{AppConfig, ChatConfig};

pub fn run(phrase: &str, base: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Config unavailable, using the default timezone");
        AppConfig::default()
    });
    println!("{}", resolve(phrase, base.as_deref(), &config.chat)?);
    Ok(())
}

fn resolve(phrase: &str, base: Option<&str>, chat: &ChatConfig) -> Result<String, String> {
    let base = match base {
        Some(b) => NaiveDate::parse_from_str(b, "%Y-%m-%d")
            .map_err(|e| format!("Invalid base date '{b}': {e}"))?,
        None => today_in(chat.tz()),
    };
    Ok(parse_natural_date(phrase, base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_against_given_base() {
        let chat = ChatConfig::default();
        assert_eq!(resolve("내일", Some("2025-09-27"), &chat).unwrap(), "2025-09-28");
        assert_eq!(resolve("이번 주말", Some("2025-09-24"), &chat).unwrap(), "2025-09-27");
    }

    #[test]
    fn rejects_bad_base() {
        assert!(resolve("내일", Some("27/09/2025"), &ChatConfig::default()).is_err());
    }

    #[test]
    fn defaults_to_today_in_configured_timezone() {
        let chat = ChatConfig {
            timezone: "Pacific/Kiritimati".into(),
            ..ChatConfig::default()
        };
        assert_ne!(chat.tz(), ChatConfig::default().tz());
        assert_eq!(
            resolve("오늘", None, &chat).unwrap(),
            today_in(chat.tz()).format("%Y-%m-%d").to_string()
        );
    }
}
