use chrono::Utc;

/// RFC3339 timestamp in UTC (stored with custom commands).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

/// Shorten `s` to `max_len` characters for log lines.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(30);
        let t = truncate_text(&s, 10);
        assert_eq!(t, format!("{}...", "a".repeat(10)));
    }

    #[test]
    fn truncate_text_keeps_short_strings() {
        assert_eq!(truncate_text("héllo", 5), "héllo");
    }

    #[test]
    fn timestamps_parse_back() {
        let ts = iso_timestamp_utc();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
