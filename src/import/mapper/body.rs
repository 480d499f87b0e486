//! Card description → rich-text editor blocks.

use regex::Regex;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const EDITOR_VERSION: &str = "2.28.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum BodyBlock {
    Header { text: String, level: u8 },
    Paragraph { text: String },
}

/// Editor document without its timestamp; the sink stamps `time` on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Body {
    pub blocks: Vec<BodyBlock>,
    pub version: String,
}

struct BlockPatterns {
    bold_heading: Regex,
    outline_h2: Regex,
    outline_h3: Regex,
    link: Regex,
    bold_stars: Regex,
    bold_underscores: Regex,
}

static PATTERNS: OnceLock<BlockPatterns> = OnceLock::new();

fn patterns() -> &'static BlockPatterns {
    PATTERNS.get_or_init(|| BlockPatterns {
        bold_heading: Regex::new(r"^\*\*([^*]+)\*\*:?$").expect("valid heading regex"),
        outline_h2: Regex::new(r"(?i)^(?:[-*]\s*)?H2:\s*(.+)$").expect("valid h2 regex"),
        outline_h3: Regex::new(r"(?i)^(?:[-*]\s*)?H3:\s*(.+)$").expect("valid h3 regex"),
        link: Regex::new(r#"\[([^\]]+)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#).expect("valid link regex"),
        bold_stars: Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold regex"),
        bold_underscores: Regex::new(r"__([^_]+)__").expect("valid bold regex"),
    })
}

fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}' | '\u{00AD}')
}

/// Inline markdown links and bold to editor HTML, invisible characters removed.
pub fn inline_html(text: &str) -> String {
    let patterns = patterns();
    let html = patterns.link.replace_all(text, r#"<a href="$2">$1</a>"#);
    let html = patterns.bold_stars.replace_all(&html, "<b>$1</b>");
    let html = patterns.bold_underscores.replace_all(&html, "<b>$1</b>");
    html.chars()
        .filter(|c| !is_invisible(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// `None` when nothing visible is left after conversion.
fn line_to_block(line: &str) -> Option<BodyBlock> {
    let patterns = patterns();

    let block = if let Some(caps) = patterns.bold_heading.captures(line) {
        BodyBlock::Header {
            text: inline_html(caps[1].trim().trim_end_matches(':')),
            level: 2,
        }
    } else if let Some(caps) = patterns.outline_h2.captures(line) {
        BodyBlock::Header {
            text: inline_html(caps[1].trim()),
            level: 2,
        }
    } else if let Some(caps) = patterns.outline_h3.captures(line) {
        BodyBlock::Header {
            text: inline_html(caps[1].trim()),
            level: 3,
        }
    } else {
        BodyBlock::Paragraph {
            text: inline_html(line),
        }
    };

    let text = match &block {
        BodyBlock::Header { text, .. } | BodyBlock::Paragraph { text } => text,
    };
    (!text.is_empty()).then_some(block)
}

/// One block per visible line. `None` when the description has no content.
pub fn description_to_body(description: &str) -> Option<Body> {
    let blocks: Vec<BodyBlock> = description
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(line_to_block)
        .collect();

    (!blocks.is_empty()).then(|| Body {
        blocks,
        version: EDITOR_VERSION.to_string(),
    })
}
