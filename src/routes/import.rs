//! Admin-only endpoints that run the board import.

use crate::auth::RequireAdmin;
use crate::board::BoardSource;
use crate::error::ApiError;
use crate::import::{
    CardImportResult, ContentSink, ImportEngine, ImportMappings, ImportOptions, ImportResult,
    LookupSource,
};
use rocket::State;
use rocket::serde::json::{self, Json};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything a request needs to build an [`ImportEngine`].
#[derive(Clone)]
pub struct ImportContext {
    pub board: Arc<dyn BoardSource>,
    pub lookups: Arc<dyn LookupSource>,
    pub sink: Arc<dyn ContentSink>,
    pub mappings: Arc<ImportMappings>,
    pub default_board_id: String,
}

impl ImportContext {
    pub fn engine(&self) -> ImportEngine {
        ImportEngine::new(self.board.clone(), self.lookups.clone(), self.sink.clone())
            .with_mappings(self.mappings.clone())
    }

    fn options(
        &self,
        dry_run: bool,
        skip_existing: bool,
        list_filter: Option<Vec<String>>,
    ) -> ImportOptions {
        ImportOptions {
            board_id: self.default_board_id.clone(),
            dry_run,
            skip_existing,
            list_filter,
        }
    }
}

fn default_skip_existing() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportBoardRequest {
    /// Map and report without writing anything.
    #[serde(default)]
    pub dry_run: bool,
    /// Skip cards that were imported by an earlier run.
    #[serde(default = "default_skip_existing")]
    pub skip_existing: bool,
    /// Only import cards from these list ids.
    #[serde(default)]
    pub list_filter: Option<Vec<String>>,
}

impl Default for ImportBoardRequest {
    fn default() -> Self {
        Self {
            dry_run: false,
            skip_existing: default_skip_existing(),
            list_filter: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_cards: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportBoardResponse {
    pub success: bool,
    pub dry_run: bool,
    pub summary: ImportSummary,
    pub results: Vec<CardImportResult>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSummary {
    pub total_cards: usize,
    pub would_import: usize,
    pub would_skip: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub success: bool,
    pub summary: PreviewSummary,
    pub results: Vec<CardImportResult>,
}

/// An empty body means all defaults. A body that does not parse is rejected
/// rather than defaulted, so a broken `dryRun` request never writes.
fn import_request(
    request: Result<Json<ImportBoardRequest>, json::Error<'_>>,
) -> Result<ImportBoardRequest, ApiError> {
    match request {
        Ok(payload) => Ok(payload.into_inner()),
        Err(json::Error::Parse(raw, _)) if raw.trim().is_empty() => Ok(ImportBoardRequest::default()),
        Err(json::Error::Parse(_, err)) => Err(ApiError::BadRequest(format!(
            "invalid import request: {err}"
        ))),
        Err(json::Error::Io(err)) => Err(ApiError::BadRequest(format!(
            "failed to read import request: {err}"
        ))),
    }
}

impl ImportBoardResponse {
    fn from_result(result: ImportResult, dry_run: bool) -> Self {
        Self {
            success: result.success,
            dry_run,
            summary: ImportSummary {
                total_cards: result.total_cards,
                imported: result.imported,
                skipped: result.skipped,
                errors: result.errors,
            },
            results: result.results,
        }
    }
}

/// Import the board into the editorial pipeline.
#[openapi(tag = "Import")]
#[post("/import/board", data = "<request>")]
pub async fn import_board(
    admin: RequireAdmin,
    request: Result<Json<ImportBoardRequest>, json::Error<'_>>,
    context: &State<ImportContext>,
) -> Result<Json<ImportBoardResponse>, ApiError> {
    let payload = import_request(request)?;
    log::info!(
        "board import requested by {} (dry run: {}, skip existing: {})",
        admin.0.email,
        payload.dry_run,
        payload.skip_existing
    );

    let options = context.options(payload.dry_run, payload.skip_existing, payload.list_filter);
    let engine = context.engine();
    let result = if options.dry_run {
        engine.preview(&options).await?
    } else {
        engine.run(&options).await?
    };

    Ok(Json(ImportBoardResponse::from_result(result, options.dry_run)))
}

/// Show what an import would do without writing anything.
#[openapi(tag = "Import")]
#[get("/import/board/preview?<skip_existing>")]
pub async fn preview_import(
    _admin: RequireAdmin,
    skip_existing: Option<bool>,
    context: &State<ImportContext>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let options = context.options(true, skip_existing.unwrap_or(true), None);
    let result = context.engine().preview(&options).await?;

    Ok(Json(PreviewResponse {
        success: result.success,
        summary: PreviewSummary {
            total_cards: result.total_cards,
            would_import: result.imported,
            would_skip: result.skipped,
            errors: result.errors,
        },
        results: result.results,
    }))
}
