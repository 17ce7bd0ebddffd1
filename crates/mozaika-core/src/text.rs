//! Pure text utilities for the ingestion pipeline.
//!
//! Normalization runs before extraction and fingerprinting, so two scrapes
//! of the same announcement that differ only in whitespace or bullet style
//! produce the same stored text and the same fingerprint.

use std::sync::OnceLock;

use regex::Regex;

// Patterns compile once; normalize runs for every queued message.
fn inner_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:[-–—*]|[•·∙◦▪▫]|\d+[.)])\s+").unwrap())
}

fn gap_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").unwrap())
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

/// Normalize raw message text.
///
/// Passes run in a fixed order:
/// 1. line breaks unified to `\n`
/// 2. each line trimmed, inner whitespace collapsed, bullets unified to `• `
/// 3. duplicate URLs removed (first occurrence kept), spaces and tabs left
///    in the gap collapsed
/// 4. runs of 3+ line breaks collapsed to a single blank line
///
/// The function is idempotent: `normalize(normalize(s)) == normalize(s)`.
/// Line structure is preserved through URL removal; only horizontal
/// whitespace around the removed URL is collapsed.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let lines: Vec<String> = text
        .split('\n')
        .map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return String::new();
            }
            let line = inner_ws_re().replace_all(line, " ");
            bullet_re().replace(&line, "• ").into_owned()
        })
        .collect();
    let text = lines.join("\n");

    let text = remove_duplicate_urls(&text);

    // URL removal can leave doubled or dangling spaces; collapse horizontal
    // whitespace only, keeping line structure intact.
    let text = gap_re().replace_all(&text, " ");
    let lines: Vec<&str> = text.split('\n').map(|l| l.trim()).collect();
    let text = lines.join("\n");

    // Collapse blank-line runs last: line trimming and URL removal can
    // both produce fresh empty lines.
    let text = blank_run_re().replace_all(&text, "\n\n");

    text.trim().to_string()
}

/// Remove repeated URLs, keeping the first occurrence of each.
fn remove_duplicate_urls(text: &str) -> String {
    let mut seen: Vec<&str> = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for m in url_re().find_iter(text) {
        out.push_str(&text[last..m.start()]);
        if seen.contains(&m.as_str()) {
            // drop the duplicate
        } else {
            seen.push(m.as_str());
            out.push_str(m.as_str());
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Extract unique URLs from text, preserving first-occurrence order.
pub fn extract_urls(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut urls: Vec<String> = Vec::new();
    for m in url_re().find_iter(text) {
        if !urls.iter().any(|u| u == m.as_str()) {
            urls.push(m.as_str().to_string());
        }
    }
    urls
}

/// Truncate text to `max_chars` characters, breaking at a word boundary
/// where possible and appending `...`.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    const SUFFIX: &str = "...";
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let budget = max_chars.saturating_sub(SUFFIX.len());
    let truncated: String = text.chars().take(budget).collect();
    match truncated.rfind(' ') {
        Some(pos) if pos > 0 => format!("{}{}", &truncated[..pos], SUFFIX),
        _ => format!("{}{}", truncated, SUFFIX),
    }
}

/// Normalize a language tag to an ISO-639-1 code, defaulting to Ukrainian.
pub fn normalize_language_code(code: &str) -> String {
    let code = code.trim().to_lowercase();
    if code.is_empty() {
        return "uk".to_string();
    }
    match code.as_str() {
        "ukr" | "ukrainian" => "uk".to_string(),
        "eng" | "english" => "en".to_string(),
        "pol" | "polish" => "pl".to_string(),
        "rus" | "russian" => "ru".to_string(),
        _ if code.len() == 2 => code,
        _ => "uk".to_string(),
    }
}

/// Normalize a country tag to an ISO-3166-1 alpha-2 code.
///
/// Returns `None` when the value cannot be mapped. Note that the tag "UK"
/// maps to "GB": users write "UK" for the United Kingdom far more often
/// than ISO does.
pub fn normalize_country_code(code: &str) -> Option<String> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return None;
    }
    match code.as_str() {
        "UKR" | "UKRAINE" => Some("UA".to_string()),
        "POL" | "POLAND" => Some("PL".to_string()),
        "USA" | "UNITED STATES" => Some("US".to_string()),
        "GBR" | "UK" | "UNITED KINGDOM" => Some("GB".to_string()),
        _ if code.len() == 2 => Some(code),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\n  "), "");
    }

    #[test]
    fn normalize_unifies_line_breaks() {
        assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn normalize_collapses_blank_runs() {
        assert_eq!(normalize("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn normalize_collapses_inner_whitespace() {
        assert_eq!(normalize("hello   \t world"), "hello world");
    }

    #[test]
    fn normalize_unifies_bullets() {
        assert_eq!(normalize("- first\n* second\n1. third\n2) fourth"),
            "• first\n• second\n• third\n• fourth");
    }

    #[test]
    fn normalize_keeps_standard_bullet() {
        assert_eq!(normalize("• item"), "• item");
    }

    #[test]
    fn normalize_removes_duplicate_urls() {
        let input = "Apply: https://example.com/x\nAgain https://example.com/x here";
        let out = normalize(input);
        assert_eq!(out.matches("https://example.com/x").count(), 1);
        assert!(out.contains("Again here"));
    }

    #[test]
    fn normalize_keeps_distinct_urls() {
        let input = "https://a.example https://b.example";
        let out = normalize(input);
        assert!(out.contains("https://a.example"));
        assert!(out.contains("https://b.example"));
    }

    #[test]
    fn normalize_preserves_lines_after_url_removal() {
        let input = "line one https://e.com/x\nline two https://e.com/x";
        let out = normalize(input);
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "- a\n\n\n* b https://e.com https://e.com",
            "  padded   text  \r\n\r\n\r\nmore ",
            "1. x\n2) y\n• z",
            "",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn extract_urls_unique_in_order() {
        let urls = extract_urls("see https://b.example and https://a.example and https://b.example");
        assert_eq!(urls, vec!["https://b.example", "https://a.example"]);
    }

    #[test]
    fn extract_urls_empty() {
        assert!(extract_urls("").is_empty());
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn truncate_breaks_at_word_boundary() {
        let out = truncate_text("the quick brown fox jumps", 15);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 15);
        assert!(!out.contains("brow..."));
    }

    #[test]
    fn language_code_mappings() {
        assert_eq!(normalize_language_code("UKR"), "uk");
        assert_eq!(normalize_language_code("English"), "en");
        assert_eq!(normalize_language_code("de"), "de");
        assert_eq!(normalize_language_code(""), "uk");
        assert_eq!(normalize_language_code("klingon"), "uk");
    }

    #[test]
    fn country_code_mappings() {
        assert_eq!(normalize_country_code("Ukraine").as_deref(), Some("UA"));
        assert_eq!(normalize_country_code("uk").as_deref(), Some("GB"));
        assert_eq!(normalize_country_code("de").as_deref(), Some("DE"));
        assert_eq!(normalize_country_code(""), None);
        assert_eq!(normalize_country_code("atlantis"), None);
    }
}
