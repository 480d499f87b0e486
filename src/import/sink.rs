//! Persistence for imported cards.
//!
//! The engine only talks to [`ContentSink`]; [`PgContentSink`] is the
//! PostgreSQL implementation used by the server and the CLI.

use crate::import::mapper::{MappedContent, SOURCE_CARD_ID_KEY, StageDetail};
use crate::models::{ContentAssignment, ContentLink, ContentStage, ExistingImport};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::types::Json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored row {id} has unknown stage `{stage}`")]
    UnknownStage { id: i64, stage: String },
}

/// A mapped card with its lookups resolved, ready to insert.
#[derive(Debug, Clone, Copy)]
pub struct NewContent<'a> {
    pub mapped: &'a MappedContent,
    pub content_type_id: Option<i32>,
    pub workflow_status_id: Option<i32>,
}

#[async_trait]
pub trait ContentSink: Send + Sync {
    /// Row previously imported from `card_id`, if any.
    async fn find_imported(&self, card_id: &str) -> Result<Option<ExistingImport>, SinkError>;

    /// Insert the primary content row and return its id.
    async fn insert_content(&self, content: &NewContent<'_>) -> Result<i64, SinkError>;

    async fn insert_links(&self, content_id: i64, links: &[ContentLink]) -> Result<(), SinkError>;

    async fn insert_assignments(
        &self,
        content_id: i64,
        assignments: &[ContentAssignment],
    ) -> Result<(), SinkError>;
}

/// Column values for one `content` row; stage columns not owned by the
/// mapped stage stay null.
#[derive(Debug, Default)]
struct ContentRow {
    idea_status: Option<String>,
    description: Option<String>,
    source: Option<String>,
    potential_keywords: Option<Value>,
    target_audience: Option<String>,
    estimated_effort: Option<String>,
    brief_status: Option<String>,
    slug: Option<String>,
    primary_keyword: Option<String>,
    secondary_keywords: Vec<String>,
    outline: Option<String>,
    internal_links: Vec<String>,
    external_references: Vec<String>,
    body: Option<Value>,
    storyblok_url: Option<String>,
    due_date: Option<NaiveDate>,
}

impl ContentRow {
    fn from_detail(detail: &StageDetail) -> Self {
        match detail {
            StageDetail::Idea(idea) => Self {
                idea_status: Some(idea.status.clone()),
                description: idea.description.clone(),
                source: idea.source.clone(),
                potential_keywords: Some(json!(idea.potential_keywords)),
                target_audience: idea.target_audience.clone(),
                estimated_effort: idea.estimated_effort.map(|e| e.as_str().to_string()),
                ..Self::default()
            },
            StageDetail::Brief(brief) => Self {
                brief_status: Some(brief.status.clone()),
                slug: brief.slug.clone(),
                description: brief.description.clone(),
                primary_keyword: brief.primary_keyword.clone(),
                secondary_keywords: brief.secondary_keywords.clone(),
                outline: brief.outline.clone(),
                internal_links: brief.internal_links.clone(),
                external_references: brief.external_references.clone(),
                ..Self::default()
            },
            StageDetail::Content(content) => Self {
                slug: content.slug.clone(),
                primary_keyword: content.primary_keyword.clone(),
                secondary_keywords: content.secondary_keywords.clone(),
                internal_links: content.internal_links.clone(),
                external_references: content.external_references.clone(),
                body: content.body.as_ref().map(|body| {
                    json!({
                        "time": Utc::now().timestamp_millis(),
                        "blocks": body.blocks,
                        "version": body.version,
                    })
                }),
                storyblok_url: content.storyblok_url.clone(),
                due_date: content.due_date,
                ..Self::default()
            },
        }
    }
}

#[derive(Clone)]
pub struct PgContentSink {
    pool: PgPool,
}

impl PgContentSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentSink for PgContentSink {
    async fn find_imported(&self, card_id: &str) -> Result<Option<ExistingImport>, SinkError> {
        let filter = Json(json!({ SOURCE_CARD_ID_KEY: card_id }));
        let row: Option<(i64, String)> = sqlx::query_as(
            "SELECT id, stage::text FROM content WHERE metadata @> $1 ORDER BY id LIMIT 1",
        )
        .bind(filter)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, stage)| match ContentStage::parse(&stage) {
            Some(stage) => Ok(ExistingImport { id, stage }),
            None => Err(SinkError::UnknownStage { id, stage }),
        })
        .transpose()
    }

    async fn insert_content(&self, content: &NewContent<'_>) -> Result<i64, SinkError> {
        let mapped = content.mapped;
        let row = ContentRow::from_detail(&mapped.detail);
        let notes = (!mapped.notes.is_empty()).then(|| mapped.notes.clone());

        let (id,): (i64,) = sqlx::query_as(
            r#"INSERT INTO content (
                   title, stage, content_type_id, priority, notes, metadata,
                   idea_status, description, source, potential_keywords,
                   target_audience, estimated_effort,
                   brief_status, slug, primary_keyword, secondary_keywords, outline,
                   internal_links, external_references,
                   workflow_status_id, body, storyblok_url, due_date
               )
               VALUES (
                   $1, $2::content_stage, $3, $4::content_priority, $5, $6,
                   $7, $8, $9, $10, $11, $12,
                   $13, $14, $15, $16, $17, $18, $19,
                   $20, $21, $22, $23
               )
               RETURNING id"#,
        )
        .bind(&mapped.title)
        .bind(mapped.stage().as_str())
        .bind(content.content_type_id)
        .bind(mapped.priority.unwrap_or_default().as_str())
        .bind(notes)
        .bind(Json(&mapped.metadata))
        .bind(row.idea_status)
        .bind(row.description)
        .bind(row.source)
        .bind(row.potential_keywords.map(Json))
        .bind(row.target_audience)
        .bind(row.estimated_effort)
        .bind(row.brief_status)
        .bind(row.slug)
        .bind(row.primary_keyword)
        .bind(row.secondary_keywords)
        .bind(row.outline)
        .bind(row.internal_links)
        .bind(row.external_references)
        .bind(content.workflow_status_id)
        .bind(row.body.map(Json))
        .bind(row.storyblok_url)
        .bind(row.due_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_links(&self, content_id: i64, links: &[ContentLink]) -> Result<(), SinkError> {
        if links.is_empty() {
            return Ok(());
        }

        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        let names: Vec<Option<&str>> = links.iter().map(|l| l.name.as_deref()).collect();
        let types: Vec<&str> = links.iter().map(|l| l.link_type.as_str()).collect();
        let orders: Vec<i32> = (0..links.len() as i32).collect();

        sqlx::query(
            r#"INSERT INTO content_links (content_id, url, name, link_type, display_order)
               SELECT $1, url, name, link_type, display_order
               FROM UNNEST($2::text[], $3::text[], $4::text[], $5::int4[])
                    AS t(url, name, link_type, display_order)"#,
        )
        .bind(content_id)
        .bind(&urls)
        .bind(&names)
        .bind(&types)
        .bind(&orders)
        .execute(&self.pool)
        .await?;

        log::trace!("inserted {} links for content {}", links.len(), content_id);
        Ok(())
    }

    async fn insert_assignments(
        &self,
        content_id: i64,
        assignments: &[ContentAssignment],
    ) -> Result<(), SinkError> {
        if assignments.is_empty() {
            return Ok(());
        }

        let users: Vec<Uuid> = assignments.iter().map(|a| a.user_id).collect();
        let roles: Vec<&str> = assignments.iter().map(|a| a.role.as_str()).collect();

        sqlx::query(
            r#"INSERT INTO content_assignments (content_id, user_id, role)
               SELECT $1, user_id, role
               FROM UNNEST($2::uuid[], $3::text[]) AS t(user_id, role)
               ON CONFLICT (content_id, user_id, role) DO NOTHING"#,
        )
        .bind(content_id)
        .bind(&users)
        .bind(&roles)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
