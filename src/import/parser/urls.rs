//! URL discovery and classification.

use regex::Regex;
use reqwest::Url;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UrlKind {
    Storyblok,
    Internal,
    Forum,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedUrl {
    pub url: String,
    pub kind: UrlKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Host rules used to classify URLs, checked in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlRules {
    pub storyblok_domain: String,
    pub forum_domain: String,
    pub site_domain: String,
}

impl Default for UrlRules {
    fn default() -> Self {
        Self {
            storyblok_domain: "app.storyblok.com".into(),
            forum_domain: "forum.hearingtracker.com".into(),
            site_domain: "hearingtracker.com".into(),
        }
    }
}

impl UrlRules {
    pub fn classify(&self, url: &str) -> UrlKind {
        let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
            Some(host) => host,
            None => return UrlKind::External,
        };

        if host_matches(&host, &self.storyblok_domain) {
            UrlKind::Storyblok
        } else if host_matches(&host, &self.forum_domain) {
            UrlKind::Forum
        } else if host_matches(&host, &self.site_domain) {
            UrlKind::Internal
        } else {
            UrlKind::External
        }
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().to_lowercase();
    !domain.is_empty()
        && (host == domain
            || host
                .strip_suffix(domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.')))
}

static MARKDOWN_LINK: OnceLock<Regex> = OnceLock::new();
static PLAIN_URL: OnceLock<Regex> = OnceLock::new();

/// `[label](url)` or `[label](url "title")`.
pub(crate) fn markdown_link_regex() -> &'static Regex {
    MARKDOWN_LINK.get_or_init(|| {
        Regex::new(r#"\[([^\]]*)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#).expect("valid markdown link regex")
    })
}

pub(crate) fn plain_url_regex() -> &'static Regex {
    PLAIN_URL.get_or_init(|| Regex::new(r#"https?://[^\s)\]"]+"#).expect("valid url regex"))
}

/// Extract every URL from `text`, markdown links first, then bare URLs that
/// sit outside any markdown link. Duplicates keep their first occurrence.
pub fn extract_urls(text: &str, rules: &UrlRules) -> Vec<ParsedUrl> {
    let mut urls = Vec::new();
    let mut seen = HashSet::new();
    let mut link_spans: Vec<Range<usize>> = Vec::new();

    for caps in markdown_link_regex().captures_iter(text) {
        let (Some(whole), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        link_spans.push(whole.range());

        let url = url.as_str();
        if seen.insert(url.to_string()) {
            let label = label.as_str().trim();
            urls.push(ParsedUrl {
                url: url.to_string(),
                kind: rules.classify(url),
                title: (!label.is_empty() && label != url).then(|| label.to_string()),
            });
        }
    }

    for found in plain_url_regex().find_iter(text) {
        if link_spans.iter().any(|span| span.contains(&found.start())) {
            continue;
        }

        let url = found.as_str();
        if seen.insert(url.to_string()) {
            urls.push(ParsedUrl {
                url: url.to_string(),
                kind: rules.classify(url),
                title: None,
            });
        }
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_and_bare_copies_of_one_url_collapse() {
        let text = "See [the guide](https://example.com/guide) or https://example.com/guide";
        let urls = extract_urls(text, &UrlRules::default());
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].title.as_deref(), Some("the guide"));
    }

    #[test]
    fn smart_card_links_use_the_target_url() {
        let text = r#"[https://forum.hearingtracker.com/t/x/1](https://forum.hearingtracker.com/t/x/1 "smartCard-inline")"#;
        let urls = extract_urls(text, &UrlRules::default());
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].url, "https://forum.hearingtracker.com/t/x/1");
        assert_eq!(urls[0].kind, UrlKind::Forum);
        assert_eq!(urls[0].title, None);
    }

    #[test]
    fn keeps_first_seen_order() {
        let text = "https://b.example.org then [a](https://a.example.org)";
        let urls: Vec<_> = extract_urls(text, &UrlRules::default())
            .into_iter()
            .map(|u| u.url)
            .collect();
        assert_eq!(urls, vec!["https://a.example.org", "https://b.example.org"]);
    }

    #[test]
    fn classifies_by_ordered_host_rules() {
        let rules = UrlRules::default();
        assert_eq!(rules.classify("https://app.storyblok.com/#/me/spaces/1"), UrlKind::Storyblok);
        assert_eq!(rules.classify("https://forum.hearingtracker.com/t/1"), UrlKind::Forum);
        assert_eq!(rules.classify("https://www.hearingtracker.com/hearing-aids"), UrlKind::Internal);
        assert_eq!(rules.classify("https://hearingtracker.com/"), UrlKind::Internal);
        assert_eq!(rules.classify("https://nothearingtracker.com/"), UrlKind::External);
        assert_eq!(rules.classify("not a url"), UrlKind::External);
    }
}
