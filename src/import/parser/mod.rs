//! Recovers structured brief fields from a card's free-text description.
//!
//! Parsing never fails: anything the parser does not recognize ends up in
//! [`ParsedDescription::notes`].

pub mod fields;
pub mod keywords;
pub mod urls;

pub use fields::{FieldMode, LabeledField};
pub use keywords::{ParsedKeyword, parse_keyword_list, parse_keyword_with_volume};
pub use urls::{ParsedUrl, UrlKind, UrlRules, extract_urls};

use fields::{Boundaries, LabelPatterns, extract_field, strip_field};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDescription {
    pub seo_title: Option<String>,
    pub h1: Option<String>,
    pub slug: Option<String>,
    pub primary_keyword: Option<ParsedKeyword>,
    pub secondary_keywords: Vec<ParsedKeyword>,
    pub search_queries: Vec<ParsedKeyword>,
    pub faqs: Vec<ParsedKeyword>,
    pub internal_links: Vec<ParsedUrl>,
    pub forum_resources: Vec<ParsedUrl>,
    pub external_resources: Vec<ParsedUrl>,
    /// Every URL in the description, deduplicated, first-seen order.
    pub all_urls: Vec<ParsedUrl>,
    pub brief: Option<String>,
    pub outline: Option<String>,
    pub notes: String,
    pub storyblok_url: Option<String>,
    pub live_url: Option<String>,
}

/// Description parser with its label patterns compiled once.
#[derive(Debug, Clone)]
pub struct DescriptionParser {
    rules: UrlRules,
    boundaries: Boundaries,
    patterns: Vec<LabelPatterns>,
}

impl Default for DescriptionParser {
    fn default() -> Self {
        Self::new(UrlRules::default())
    }
}

impl DescriptionParser {
    pub fn new(rules: UrlRules) -> Self {
        let patterns = LabeledField::ALL
            .iter()
            .map(|field| LabelPatterns::new(field.label()))
            .collect();

        Self {
            rules,
            boundaries: Boundaries::default(),
            patterns,
        }
    }

    fn field<'t>(&self, text: &'t str, field: LabeledField) -> Option<&'t str> {
        extract_field(
            text,
            &self.patterns[field as usize],
            &self.boundaries,
            field.mode(),
        )
        .map(|found| found.value(text))
        .filter(|value| !value.is_empty())
    }

    fn scalar(&self, text: &str, field: LabeledField) -> Option<String> {
        self.field(text, field).map(str::to_string)
    }

    fn keywords(&self, text: &str, field: LabeledField) -> Vec<ParsedKeyword> {
        self.field(text, field)
            .map(parse_keyword_list)
            .unwrap_or_default()
    }

    fn urls(&self, text: &str, field: LabeledField) -> Vec<ParsedUrl> {
        self.field(text, field)
            .map(|block| extract_urls(block, &self.rules))
            .unwrap_or_default()
    }

    pub fn parse(&self, description: &str) -> ParsedDescription {
        if description.trim().is_empty() {
            return ParsedDescription::default();
        }

        let all_urls = extract_urls(description, &self.rules);
        let first_of = |kind: UrlKind| {
            all_urls
                .iter()
                .find(|url| url.kind == kind)
                .map(|url| url.url.clone())
        };
        let storyblok_url = first_of(UrlKind::Storyblok);
        let live_url = first_of(UrlKind::Internal);

        let primary_keyword = self
            .field(description, LabeledField::PrimaryKeyword)
            .map(parse_keyword_with_volume)
            .filter(|keyword| !keyword.keyword.is_empty());

        let mut secondary_keywords = self.keywords(description, LabeledField::SecondaryKeywords);
        secondary_keywords.extend(self.keywords(description, LabeledField::Keywords));

        let mut search_queries = self.keywords(description, LabeledField::SearchQueries);
        search_queries.extend(self.keywords(description, LabeledField::OtherSearchQueries));

        let mut faqs = self.keywords(description, LabeledField::Faqs);
        faqs.extend(self.keywords(description, LabeledField::PotentialFaqs));

        let mut external_resources = self.urls(description, LabeledField::ExternalResources);
        external_resources.extend(self.urls(description, LabeledField::Competitors));

        let mut forum_resources = self.urls(description, LabeledField::ForumResources);
        for url in all_urls.iter().filter(|url| url.kind == UrlKind::Forum) {
            if !forum_resources.iter().any(|known| known.url == url.url) {
                forum_resources.push(url.clone());
            }
        }

        ParsedDescription {
            seo_title: self.scalar(description, LabeledField::SeoTitle),
            h1: self.scalar(description, LabeledField::H1),
            slug: self.scalar(description, LabeledField::Slug),
            primary_keyword,
            secondary_keywords,
            search_queries,
            faqs,
            internal_links: self.urls(description, LabeledField::InternalLinks),
            forum_resources,
            external_resources,
            brief: self.scalar(description, LabeledField::Brief),
            outline: self.scalar(description, LabeledField::ProposedOutline),
            notes: self.notes(description),
            storyblok_url,
            live_url,
            all_urls,
        }
    }

    /// Whatever is left once labeled fields, links and URLs are removed.
    fn notes(&self, description: &str) -> String {
        let mut remaining = description.to_string();
        for field in LabeledField::ALL {
            remaining = strip_field(
                &remaining,
                &self.patterns[field as usize],
                &self.boundaries,
                field.mode(),
            );
        }

        let remaining = urls::markdown_link_regex().replace_all(&remaining, "");
        let remaining = urls::plain_url_regex().replace_all(&remaining, "");

        remaining
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse with the default URL rules.
pub fn parse_description(description: &str) -> ParsedDescription {
    DescriptionParser::default().parse(description)
}
