//! Labeled-field extraction.
//!
//! A labeled field is a value introduced by a recognizable prefix such as
//! `**Primary keyword:**`, a bold section header `**Keywords**`, or a plain
//! `Slug:` line. Each prefix form is an independent [`Strategy`]; extraction
//! walks [`STRATEGIES`] in order and the first strategy yielding a non-empty
//! value wins.
//!
//! Multi-line values run until the next boundary: a line opening with a bold
//! label, a markdown heading, or the end of the text. The plain form also
//! stops at the next plain `Label:` line. Single-line values stop at the end
//! of the label's line.

use regex::Regex;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    SingleLine,
    MultiLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabeledField {
    SeoTitle,
    H1,
    Slug,
    PrimaryKeyword,
    SecondaryKeywords,
    Keywords,
    SearchQueries,
    OtherSearchQueries,
    Faqs,
    PotentialFaqs,
    Brief,
    ProposedOutline,
    InternalLinks,
    ForumResources,
    ExternalResources,
    Competitors,
}

impl LabeledField {
    pub const ALL: [LabeledField; 16] = [
        LabeledField::SeoTitle,
        LabeledField::H1,
        LabeledField::Slug,
        LabeledField::PrimaryKeyword,
        LabeledField::SecondaryKeywords,
        LabeledField::Keywords,
        LabeledField::SearchQueries,
        LabeledField::OtherSearchQueries,
        LabeledField::Faqs,
        LabeledField::PotentialFaqs,
        LabeledField::Brief,
        LabeledField::ProposedOutline,
        LabeledField::InternalLinks,
        LabeledField::ForumResources,
        LabeledField::ExternalResources,
        LabeledField::Competitors,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LabeledField::SeoTitle => "SEO title",
            LabeledField::H1 => "H1",
            LabeledField::Slug => "Slug",
            LabeledField::PrimaryKeyword => "Primary keyword",
            LabeledField::SecondaryKeywords => "Secondary keywords",
            LabeledField::Keywords => "Keywords",
            LabeledField::SearchQueries => "Search queries",
            LabeledField::OtherSearchQueries => "Other search queries",
            LabeledField::Faqs => "FAQs",
            LabeledField::PotentialFaqs => "Potential FAQs",
            LabeledField::Brief => "Brief",
            LabeledField::ProposedOutline => "Proposed Outline",
            LabeledField::InternalLinks => "Internal links",
            LabeledField::ForumResources => "Forum resources",
            LabeledField::ExternalResources => "External resources",
            LabeledField::Competitors => "Competitors",
        }
    }

    pub fn mode(self) -> FieldMode {
        match self {
            LabeledField::SeoTitle
            | LabeledField::H1
            | LabeledField::Slug
            | LabeledField::PrimaryKeyword => FieldMode::SingleLine,
            _ => FieldMode::MultiLine,
        }
    }
}

/// Byte ranges of one labeled-field occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    /// Label plus value, the range removed when building notes.
    pub span: Range<usize>,
    pub value: Range<usize>,
}

impl FieldMatch {
    pub fn value<'t>(&self, text: &'t str) -> &'t str {
        text[self.value.clone()].trim()
    }
}

fn label_fragment(label: &str) -> String {
    regex::escape(label).replace(' ', r"[ \t]+")
}

/// Compiled prefix patterns for one label, one per strategy.
#[derive(Debug, Clone)]
pub struct LabelPatterns {
    bold_colon: Regex,
    bold_header: Regex,
    plain_colon: Regex,
}

impl LabelPatterns {
    pub fn new(label: &str) -> Self {
        let label = label_fragment(label);
        Self {
            bold_colon: Regex::new(&format!(r"(?i)\*\*{label}(?::\*\*|\*\*:)"))
                .expect("valid bold-with-colon pattern"),
            bold_header: Regex::new(&format!(r"(?i)\*\*{label}\*\*"))
                .expect("valid bold-header pattern"),
            plain_colon: Regex::new(&format!(r"(?im)^[ \t]*{label}[ \t]*:"))
                .expect("valid plain-colon pattern"),
        }
    }
}

/// Where multi-line values end.
#[derive(Debug, Clone)]
pub struct Boundaries {
    bold: Regex,
    plain: Regex,
}

impl Boundaries {
    /// `labels` are the recognized labels; a plain `Label:` line for any of
    /// them ends a plain-form value. Other one-word `Word:` lines end it too,
    /// but only when the colon closes the word, so `https://` lines do not.
    pub fn new(labels: &[&str]) -> Self {
        let known = labels
            .iter()
            .map(|label| label_fragment(label))
            .collect::<Vec<_>>()
            .join("|");

        Self {
            bold: Regex::new(r"\n(?:\*\*[A-Za-z]|##)").expect("valid bold boundary"),
            plain: Regex::new(&format!(
                r"(?im)\n(?:\*\*[A-Za-z]|##|[ \t]*(?:{known})[ \t]*:|[ \t]*[A-Za-z]+:(?:[ \t]|$))"
            ))
            .expect("valid plain boundary"),
        }
    }

    fn end_from(regex: &Regex, text: &str, from: usize) -> usize {
        regex
            .find_at(text, from)
            .map(|found| found.start())
            .unwrap_or(text.len())
    }
}

impl Default for Boundaries {
    fn default() -> Self {
        let labels: Vec<&str> = LabeledField::ALL.iter().map(|field| field.label()).collect();
        Self::new(&labels)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `**Label:**` (or `**Label**:`) followed by the value.
    BoldWithColon,
    /// `**Label**` heading a block; in multi-line mode the label must be
    /// alone on its line.
    BoldHeader,
    /// `Label:` at the start of a line.
    PlainColon,
}

pub const STRATEGIES: [Strategy; 3] = [
    Strategy::BoldWithColon,
    Strategy::BoldHeader,
    Strategy::PlainColon,
];

fn line_end(text: &str, from: usize) -> usize {
    text[from..]
        .find('\n')
        .map(|offset| from + offset)
        .unwrap_or(text.len())
}

impl Strategy {
    fn pattern<'p>(self, patterns: &'p LabelPatterns) -> &'p Regex {
        match self {
            Strategy::BoldWithColon => &patterns.bold_colon,
            Strategy::BoldHeader => &patterns.bold_header,
            Strategy::PlainColon => &patterns.plain_colon,
        }
    }

    fn boundary<'b>(self, boundaries: &'b Boundaries) -> &'b Regex {
        match self {
            Strategy::BoldWithColon | Strategy::BoldHeader => &boundaries.bold,
            Strategy::PlainColon => &boundaries.plain,
        }
    }

    /// Find the first occurrence at or after `start`, empty values included.
    pub fn find_at(
        self,
        text: &str,
        patterns: &LabelPatterns,
        boundaries: &Boundaries,
        mode: FieldMode,
        start: usize,
    ) -> Option<FieldMatch> {
        let regex = self.pattern(patterns);
        let mut pos = start;

        while pos <= text.len() {
            let found = regex.find_at(text, pos)?;
            let label_end = found.end();

            if self == Strategy::BoldHeader && mode == FieldMode::MultiLine {
                let rest = &text[label_end..line_end(text, label_end)];
                if !rest.trim().is_empty() {
                    pos = label_end;
                    continue;
                }
            }

            let end = match mode {
                FieldMode::SingleLine => line_end(text, label_end),
                FieldMode::MultiLine => {
                    Boundaries::end_from(self.boundary(boundaries), text, label_end)
                }
            };

            return Some(FieldMatch {
                span: found.start()..end,
                value: label_end..end,
            });
        }

        None
    }

    /// First occurrence with a non-empty value.
    pub fn extract(
        self,
        text: &str,
        patterns: &LabelPatterns,
        boundaries: &Boundaries,
        mode: FieldMode,
    ) -> Option<FieldMatch> {
        let mut pos = 0;
        while let Some(found) = self.find_at(text, patterns, boundaries, mode, pos) {
            if !found.value(text).is_empty() {
                return Some(found);
            }
            pos = found.span.end.max(found.span.start + 1);
            if pos > text.len() {
                break;
            }
        }
        None
    }
}

pub fn bold_with_colon(
    text: &str,
    patterns: &LabelPatterns,
    boundaries: &Boundaries,
    mode: FieldMode,
) -> Option<FieldMatch> {
    Strategy::BoldWithColon.extract(text, patterns, boundaries, mode)
}

pub fn bold_header(
    text: &str,
    patterns: &LabelPatterns,
    boundaries: &Boundaries,
    mode: FieldMode,
) -> Option<FieldMatch> {
    Strategy::BoldHeader.extract(text, patterns, boundaries, mode)
}

pub fn plain_colon(
    text: &str,
    patterns: &LabelPatterns,
    boundaries: &Boundaries,
    mode: FieldMode,
) -> Option<FieldMatch> {
    Strategy::PlainColon.extract(text, patterns, boundaries, mode)
}

/// Run the strategies in order; the first one with a non-empty value wins.
pub fn extract_field(
    text: &str,
    patterns: &LabelPatterns,
    boundaries: &Boundaries,
    mode: FieldMode,
) -> Option<FieldMatch> {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy.extract(text, patterns, boundaries, mode))
}

/// Remove every occurrence of the label, in every form, together with its value.
pub fn strip_field(
    text: &str,
    patterns: &LabelPatterns,
    boundaries: &Boundaries,
    mode: FieldMode,
) -> String {
    let mut current = text.to_string();

    for strategy in STRATEGIES {
        let mut spans = Vec::new();
        let mut pos = 0;
        while let Some(found) = strategy.find_at(&current, patterns, boundaries, mode, pos) {
            pos = found.span.end.max(found.span.start + 1);
            spans.push(found.span);
            if pos > current.len() {
                break;
            }
        }

        for span in spans.into_iter().rev() {
            current.replace_range(span, "");
        }
    }

    current
}
