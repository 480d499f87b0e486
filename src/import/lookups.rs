//! Slug and email lookup tables resolved once per import run.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup query failed: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTables {
    pub content_types: HashMap<String, i32>,
    pub workflow_statuses: HashMap<String, i32>,
    /// Keyed by lowercased email.
    pub users_by_email: HashMap<String, Uuid>,
}

impl LookupTables {
    pub fn content_type_id(&self, slug: &str) -> Option<i32> {
        self.content_types.get(slug).copied()
    }

    pub fn workflow_status_id(&self, slug: &str) -> Option<i32> {
        self.workflow_statuses.get(slug).copied()
    }

    pub fn user_id_for_email(&self, email: &str) -> Option<Uuid> {
        self.users_by_email.get(&email.trim().to_lowercase()).copied()
    }
}

/// Where lookup tables come from.
#[async_trait]
pub trait LookupSource: Send + Sync {
    async fn content_types(&self) -> Result<HashMap<String, i32>, LookupError>;
    async fn workflow_statuses(&self) -> Result<HashMap<String, i32>, LookupError>;
    async fn users_by_email(&self) -> Result<HashMap<String, Uuid>, LookupError>;
}

/// Load the three tables concurrently; any failure aborts the load.
pub async fn load_lookups<S>(source: &S) -> Result<LookupTables, LookupError>
where
    S: LookupSource + ?Sized,
{
    let (content_types, workflow_statuses, users_by_email) = tokio::try_join!(
        source.content_types(),
        source.workflow_statuses(),
        source.users_by_email(),
    )?;

    log::debug!(
        "loaded lookups: {} content types, {} workflow statuses, {} users",
        content_types.len(),
        workflow_statuses.len(),
        users_by_email.len()
    );

    Ok(LookupTables {
        content_types,
        workflow_statuses,
        users_by_email,
    })
}

#[derive(Clone)]
pub struct PgLookupSource {
    pool: PgPool,
}

impl PgLookupSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LookupSource for PgLookupSource {
    async fn content_types(&self) -> Result<HashMap<String, i32>, LookupError> {
        let rows: Vec<(String, i32)> =
            sqlx::query_as("SELECT slug, id FROM content_types WHERE is_active")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn workflow_statuses(&self) -> Result<HashMap<String, i32>, LookupError> {
        let rows: Vec<(String, i32)> = sqlx::query_as("SELECT slug, id FROM workflow_statuses")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn users_by_email(&self) -> Result<HashMap<String, Uuid>, LookupError> {
        let rows: Vec<(String, Uuid)> = sqlx::query_as(
            "SELECT LOWER(email), id FROM app_users WHERE email IS NOT NULL AND email <> ''",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}
