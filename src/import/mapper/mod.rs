//! Card → stage-specific pipeline record.
//!
//! Mapping is pure: the same card and mapping tables always produce the same
//! record, and nothing here touches the network or the database.

pub mod body;

pub use body::{Body, BodyBlock, description_to_body};

use crate::board::RawCard;
use crate::import::mapping::{ImportMappings, ListRoute};
use crate::import::parser::{DescriptionParser, ParsedDescription, ParsedKeyword, ParsedUrl};
use crate::models::{ContentLink, ContentStage, Effort, Priority};
use chrono::NaiveDate;
use reqwest::Url;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use thiserror::Error;

pub const SOURCE_CARD_ID_KEY: &str = "source_card_id";
pub const SOURCE_CARD_URL_KEY: &str = "source_card_url";

const IDEA_STATUS: &str = "submitted";
const BRIEF_STATUS: &str = "draft";
const DEFAULT_WORKFLOW_STATUS: &str = "draft";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("list {list_id} is not mapped to a pipeline stage")]
    UnmappedList { list_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdeaDraft {
    pub status: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub potential_keywords: Vec<ParsedKeyword>,
    pub target_audience: Option<String>,
    pub estimated_effort: Option<Effort>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefDraft {
    pub status: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub primary_keyword: Option<String>,
    pub secondary_keywords: Vec<String>,
    pub outline: Option<String>,
    pub internal_links: Vec<String>,
    pub external_references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentDraft {
    pub workflow_status_slug: String,
    pub slug: Option<String>,
    pub body: Option<Body>,
    pub storyblok_url: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub member_usernames: Vec<String>,
    pub primary_keyword: Option<String>,
    pub secondary_keywords: Vec<String>,
    pub internal_links: Vec<String>,
    pub external_references: Vec<String>,
    pub links: Vec<ContentLink>,
}

/// Fields owned by exactly one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum StageDetail {
    Idea(IdeaDraft),
    Brief(BriefDraft),
    Content(ContentDraft),
}

impl StageDetail {
    pub fn stage(&self) -> ContentStage {
        match self {
            StageDetail::Idea(_) => ContentStage::Idea,
            StageDetail::Brief(_) => ContentStage::Brief,
            StageDetail::Content(_) => ContentStage::Content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedContent {
    pub title: String,
    pub content_type_slug: Option<String>,
    pub priority: Option<Priority>,
    pub notes: String,
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    pub detail: StageDetail,
}

impl MappedContent {
    pub fn stage(&self) -> ContentStage {
        self.detail.stage()
    }

    pub fn source_card_id(&self) -> Option<&str> {
        self.metadata.get(SOURCE_CARD_ID_KEY).and_then(Value::as_str)
    }
}

/// Keyword and link fields shared by briefs and content.
struct SeoFields {
    primary_keyword: Option<String>,
    secondary_keywords: Vec<String>,
    internal_links: Vec<String>,
    external_references: Vec<String>,
}

impl SeoFields {
    fn from_parsed(parsed: &ParsedDescription) -> Self {
        let urls = |list: &[ParsedUrl]| list.iter().map(|u| u.url.clone()).collect::<Vec<_>>();

        Self {
            primary_keyword: parsed.primary_keyword.as_ref().map(|k| k.keyword.clone()),
            secondary_keywords: parsed
                .secondary_keywords
                .iter()
                .chain(&parsed.search_queries)
                .map(|k| k.keyword.clone())
                .collect(),
            internal_links: urls(&parsed.internal_links),
            external_references: parsed
                .external_resources
                .iter()
                .chain(&parsed.forum_resources)
                .map(|u| u.url.clone())
                .collect(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Last non-empty path segment of a URL, e.g. the slug of a live article.
fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

pub struct ContentMapper {
    mappings: Arc<ImportMappings>,
    parser: DescriptionParser,
}

impl ContentMapper {
    pub fn new(mappings: Arc<ImportMappings>) -> Self {
        let parser = DescriptionParser::new(mappings.url_rules.clone());
        Self { mappings, parser }
    }

    pub fn mappings(&self) -> &ImportMappings {
        &self.mappings
    }

    pub fn route(&self, card: &RawCard) -> Option<&ListRoute> {
        self.mappings.route_for(&card.id_list)
    }

    pub fn map_card(&self, card: &RawCard) -> Result<MappedContent, MapError> {
        let route = self.route(card).ok_or_else(|| MapError::UnmappedList {
            list_id: card.id_list.clone(),
        })?;

        let parsed = self.parser.parse(&card.description);

        let mut metadata = Map::new();
        metadata.insert(SOURCE_CARD_ID_KEY.into(), Value::String(card.id.clone()));
        metadata.insert(SOURCE_CARD_URL_KEY.into(), Value::String(card.url.clone()));

        let detail = match route.stage {
            ContentStage::Idea => self.idea_detail(card, &parsed, &mut metadata),
            ContentStage::Brief => self.brief_detail(card, &parsed, &mut metadata),
            ContentStage::Content => self.content_detail(card, route, &parsed),
        };

        Ok(MappedContent {
            title: card.name.clone(),
            content_type_slug: self
                .mappings
                .content_type_for(card.label_names())
                .map(str::to_string),
            priority: self.mappings.priority_for(card.label_names()),
            notes: parsed.notes.clone(),
            metadata,
            detail,
        })
    }

    fn idea_detail(
        &self,
        card: &RawCard,
        parsed: &ParsedDescription,
        metadata: &mut Map<String, Value>,
    ) -> StageDetail {
        if !parsed.forum_resources.is_empty() {
            let links: Vec<&str> = parsed.forum_resources.iter().map(|u| u.url.as_str()).collect();
            metadata.insert("forum_links".into(), json!(links));
        }

        StageDetail::Idea(IdeaDraft {
            status: IDEA_STATUS.to_string(),
            description: parsed.brief.clone().or_else(|| non_empty(&parsed.notes)),
            source: self
                .mappings
                .source_for(card.label_names())
                .map(str::to_string),
            potential_keywords: parsed
                .primary_keyword
                .iter()
                .chain(&parsed.search_queries)
                .cloned()
                .collect(),
            target_audience: None,
            estimated_effort: None,
        })
    }

    fn brief_detail(
        &self,
        card: &RawCard,
        parsed: &ParsedDescription,
        metadata: &mut Map<String, Value>,
    ) -> StageDetail {
        self.insert_seo_metadata(card, parsed, metadata);
        let seo = SeoFields::from_parsed(parsed);

        StageDetail::Brief(BriefDraft {
            status: BRIEF_STATUS.to_string(),
            slug: parsed.slug.clone(),
            description: parsed.seo_title.clone().or_else(|| parsed.brief.clone()),
            primary_keyword: seo.primary_keyword,
            secondary_keywords: seo.secondary_keywords,
            outline: parsed.outline.clone(),
            internal_links: seo.internal_links,
            external_references: seo.external_references,
        })
    }

    fn insert_seo_metadata(
        &self,
        card: &RawCard,
        parsed: &ParsedDescription,
        metadata: &mut Map<String, Value>,
    ) {
        if let Some(seo_title) = &parsed.seo_title {
            metadata.insert("seo_title".into(), json!(seo_title));
        }
        if let Some(h1) = &parsed.h1 {
            metadata.insert("h1".into(), json!(h1));
        }
        metadata.insert("faqs".into(), json!(parsed.faqs));
        metadata.insert(
            "is_update".into(),
            json!(card.has_label(&self.mappings.update_label)),
        );
        if let Some(live_url) = &parsed.live_url {
            metadata.insert("live_url".into(), json!(live_url));
        }
    }

    fn content_detail(
        &self,
        card: &RawCard,
        route: &ListRoute,
        parsed: &ParsedDescription,
    ) -> StageDetail {
        let seo = SeoFields::from_parsed(parsed);

        StageDetail::Content(ContentDraft {
            workflow_status_slug: route
                .status
                .clone()
                .unwrap_or_else(|| DEFAULT_WORKFLOW_STATUS.to_string()),
            slug: parsed
                .slug
                .clone()
                .or_else(|| parsed.live_url.as_deref().and_then(last_path_segment)),
            body: description_to_body(&card.description),
            storyblok_url: parsed.storyblok_url.clone(),
            due_date: card.due.map(|due| due.date_naive()),
            member_usernames: card.members.iter().map(|m| m.username.clone()).collect(),
            primary_keyword: seo.primary_keyword,
            secondary_keywords: seo.secondary_keywords,
            internal_links: seo.internal_links,
            external_references: seo.external_references,
            links: vec![ContentLink {
                url: card.url.clone(),
                name: Some("Trello Card".to_string()),
                link_type: "trello".to_string(),
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardLabel, BoardMember};
    use chrono::{TimeZone, Utc};

    const IDEA_LIST: &str = "list-idea";
    const BRIEF_LIST: &str = "list-brief";
    const REVIEW_LIST: &str = "list-review";
    const DRAFT_LIST: &str = "list-draft";

    fn mapper() -> ContentMapper {
        let mut mappings = ImportMappings::default();
        mappings.lists.clear();
        mappings.lists.insert(IDEA_LIST.into(), ListRoute::stage(ContentStage::Idea));
        mappings.lists.insert(BRIEF_LIST.into(), ListRoute::stage(ContentStage::Brief));
        mappings.lists.insert(REVIEW_LIST.into(), ListRoute::content("in_review"));
        mappings.lists.insert(DRAFT_LIST.into(), ListRoute::stage(ContentStage::Content));
        ContentMapper::new(Arc::new(mappings))
    }

    fn label(name: &str) -> BoardLabel {
        BoardLabel {
            id: format!("label-{name}"),
            id_board: "board".into(),
            name: name.into(),
            color: None,
        }
    }

    fn card(list: &str, description: &str, labels: &[&str]) -> RawCard {
        RawCard {
            id: "card-1".into(),
            name: "Hearing aid batteries".into(),
            description: description.into(),
            due: None,
            id_list: list.into(),
            id_labels: labels.iter().map(|l| format!("label-{l}")).collect(),
            labels: labels.iter().map(|l| label(l)).collect(),
            id_members: Vec::new(),
            members: Vec::new(),
            closed: false,
            url: "https://trello.com/c/abc/1-card".into(),
            short_url: None,
            date_last_activity: None,
        }
    }

    #[test]
    fn unmapped_list_is_refused() {
        let err = mapper().map_card(&card("elsewhere", "", &[])).unwrap_err();
        assert_eq!(err, MapError::UnmappedList { list_id: "elsewhere".into() });
    }

    #[test]
    fn first_label_in_card_order_wins() {
        let mapped = mapper()
            .map_card(&card(BRIEF_LIST, "", &["Opinion", "Urgent", "Best List", "low priority"]))
            .expect("mapped");
        assert_eq!(mapped.content_type_slug.as_deref(), Some("opinion"));
        assert_eq!(mapped.priority, Some(Priority::Urgent));

        let mapped = mapper()
            .map_card(&card(BRIEF_LIST, "", &["low priority", "Resource", "Urgent"]))
            .expect("mapped");
        assert_eq!(mapped.content_type_slug.as_deref(), Some("resource"));
        assert_eq!(mapped.priority, Some(Priority::Low));
    }

    #[test]
    fn stage_follows_list_route() {
        let mapper = mapper();
        for (list, stage) in [
            (IDEA_LIST, ContentStage::Idea),
            (BRIEF_LIST, ContentStage::Brief),
            (REVIEW_LIST, ContentStage::Content),
        ] {
            let mapped = mapper.map_card(&card(list, "text", &[])).expect("mapped");
            assert_eq!(mapped.stage(), stage);
            assert_eq!(mapped.source_card_id(), Some("card-1"));
            assert_eq!(
                mapped.metadata.get(SOURCE_CARD_URL_KEY),
                Some(&json!("https://trello.com/c/abc/1-card"))
            );
        }
    }

    #[test]
    fn idea_takes_brief_keywords_and_forum_source() {
        let mapped = mapper()
            .map_card(&card(
                IDEA_LIST,
                "Thread: https://forum.hearingtracker.com/t/wax/9\n\
                 **Primary keyword:** ear wax (2K)\n**Search queries:**\nhow to remove ear wax",
                &["Forum Idea"],
            ))
            .expect("mapped");

        let StageDetail::Idea(idea) = &mapped.detail else {
            panic!("expected idea, got {:?}", mapped.detail);
        };
        assert_eq!(idea.status, "submitted");
        assert_eq!(idea.source.as_deref(), Some("forum"));
        let keywords: Vec<_> = idea.potential_keywords.iter().map(|k| k.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["ear wax", "how to remove ear wax"]);
        assert_eq!(idea.potential_keywords[0].volume, Some(2000));
        assert_eq!(idea.description.as_deref(), Some("Thread:"));
        assert_eq!(
            mapped.metadata.get("forum_links"),
            Some(&json!(["https://forum.hearingtracker.com/t/wax/9"]))
        );
    }

    #[test]
    fn brief_collects_seo_fields_and_metadata() {
        let mapped = mapper()
            .map_card(&card(
                BRIEF_LIST,
                "**SEO title:** Best Batteries 2025\n**H1:** Best Batteries\n**Slug:** best-batteries\n\
                 **Primary keyword:** best batteries (900)\n**Secondary keywords:**\nzinc air\n\
                 **Search queries:**\nwhich battery lasts longest\n\
                 **External resources:**\nhttps://example.org/review\n\
                 **Forum resources:**\nhttps://forum.hearingtracker.com/t/b/3\n\
                 **FAQs:**\nhow long do batteries last",
                &["Update"],
            ))
            .expect("mapped");

        let StageDetail::Brief(brief) = &mapped.detail else {
            panic!("expected brief");
        };
        assert_eq!(brief.status, "draft");
        assert_eq!(brief.slug.as_deref(), Some("best-batteries"));
        assert_eq!(brief.description.as_deref(), Some("Best Batteries 2025"));
        assert_eq!(brief.primary_keyword.as_deref(), Some("best batteries"));
        assert_eq!(brief.secondary_keywords, vec!["zinc air", "which battery lasts longest"]);
        assert_eq!(
            brief.external_references,
            vec!["https://example.org/review", "https://forum.hearingtracker.com/t/b/3"]
        );
        assert_eq!(mapped.metadata.get("seo_title"), Some(&json!("Best Batteries 2025")));
        assert_eq!(mapped.metadata.get("h1"), Some(&json!("Best Batteries")));
        assert_eq!(mapped.metadata.get("is_update"), Some(&json!(true)));
        assert_eq!(
            mapped.metadata.get("faqs"),
            Some(&json!([{"keyword": "how long do batteries last"}]))
        );
    }

    #[test]
    fn content_slug_falls_back_to_live_url() {
        let mut raw = card(
            REVIEW_LIST,
            "Live: https://www.hearingtracker.com/hearing-aids/battery-guide/\nSome paragraph",
            &[],
        );
        raw.due = Some(Utc.with_ymd_and_hms(2025, 3, 14, 23, 30, 0).unwrap());
        raw.members = vec![BoardMember {
            id: "m1".into(),
            full_name: "Ed Itor".into(),
            username: "editor".into(),
        }];

        let mapped = mapper().map_card(&raw).expect("mapped");
        let StageDetail::Content(content) = &mapped.detail else {
            panic!("expected content");
        };
        assert_eq!(content.workflow_status_slug, "in_review");
        assert_eq!(content.slug.as_deref(), Some("battery-guide"));
        assert_eq!(content.due_date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(content.member_usernames, vec!["editor"]);
        assert_eq!(content.links.len(), 1);
        assert_eq!(content.links[0].link_type, "trello");
        assert_eq!(content.links[0].name.as_deref(), Some("Trello Card"));
        assert_eq!(content.body.as_ref().map(|b| b.blocks.len()), Some(2));
    }

    #[test]
    fn content_without_status_defaults_to_draft_and_empty_body() {
        let mapped = mapper().map_card(&card(DRAFT_LIST, "", &[])).expect("mapped");
        let StageDetail::Content(content) = &mapped.detail else {
            panic!("expected content");
        };
        assert_eq!(content.workflow_status_slug, "draft");
        assert!(content.body.is_none());
        assert!(content.slug.is_none());
        assert_eq!(mapped.notes, "");
    }
}
