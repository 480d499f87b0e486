//! Keyword lines with optional search-volume annotations.
//!
//! Briefs list keywords one per line with the monthly search volume in a
//! trailing parenthesis, e.g. `hearing aid repair (1.5K)`.

use regex::Regex;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedKeyword {
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
}

static VOLUME_REGEX: OnceLock<Regex> = OnceLock::new();

fn volume_regex() -> &'static Regex {
    VOLUME_REGEX.get_or_init(|| Regex::new(r"\(([^()]*)\)\s*$").expect("valid volume regex"))
}

/// Split a keyword line into the keyword and its trailing volume annotation.
///
/// The parenthesized token is always removed from the keyword; the volume is
/// only set when the token is numeric (`20`, `1,500`, `1.5K`).
pub fn parse_keyword_with_volume(text: &str) -> ParsedKeyword {
    let text = text.trim();

    match volume_regex().captures(text) {
        Some(caps) => {
            let whole = caps.get(0).map(|m| m.start()).unwrap_or(text.len());
            let keyword = text[..whole].trim().to_string();
            let volume = caps.get(1).and_then(|m| parse_volume(m.as_str()));
            ParsedKeyword { keyword, volume }
        }
        None => ParsedKeyword {
            keyword: text.to_string(),
            volume: None,
        },
    }
}

fn parse_volume(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }

    let (number, multiplier) = match cleaned.strip_suffix(['K', 'k']) {
        Some(stripped) => (stripped, 1000.0),
        None => (cleaned.as_str(), 1.0),
    };

    let value = number.trim().parse::<f64>().ok()? * multiplier;
    if value.is_finite() && value >= 0.0 {
        Some(value.round() as u64)
    } else {
        None
    }
}

/// Parse a multi-line keyword block.
///
/// Blank lines and lines opening with `[` (pure link lines) are dropped.
pub fn parse_keyword_list(block: &str) -> Vec<ParsedKeyword> {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('['))
        .map(parse_keyword_with_volume)
        .filter(|parsed| !parsed.keyword.is_empty())
        .collect()
}
