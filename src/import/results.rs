//! Per-card outcomes and run summaries.

use crate::models::ContentStage;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::Serialize;
use std::fmt;

/// Entity id reported for cards that would have been inserted in a dry run.
pub const DRY_RUN_ENTITY_ID: i64 = -1;

/// Why a card was intentionally not inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ListNotMapped,
    AlreadyImported { stage: ContentStage, id: i64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ListNotMapped => f.write_str("List not mapped"),
            SkipReason::AlreadyImported { stage, id } => {
                write!(f, "Already imported as {stage} #{id}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardImportResult {
    pub card_id: String,
    pub card_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<ContentStage>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl CardImportResult {
    pub fn imported(card_id: &str, card_name: &str, stage: ContentStage, entity_id: i64) -> Self {
        Self {
            card_id: card_id.to_string(),
            card_name: card_name.to_string(),
            stage: Some(stage),
            success: true,
            entity_id: Some(entity_id),
            error: None,
            skipped: false,
            skip_reason: None,
        }
    }

    pub fn skipped(
        card_id: &str,
        card_name: &str,
        stage: Option<ContentStage>,
        reason: SkipReason,
    ) -> Self {
        let entity_id = match reason {
            SkipReason::AlreadyImported { id, .. } => Some(id),
            SkipReason::ListNotMapped => None,
        };

        Self {
            card_id: card_id.to_string(),
            card_name: card_name.to_string(),
            stage,
            success: true,
            entity_id,
            error: None,
            skipped: true,
            skip_reason: Some(reason.to_string()),
        }
    }

    pub fn failed(card_id: &str, card_name: &str, stage: ContentStage, error: String) -> Self {
        Self {
            card_id: card_id.to_string(),
            card_name: card_name.to_string(),
            stage: Some(stage),
            success: false,
            entity_id: None,
            error: Some(error),
            skipped: false,
            skip_reason: None,
        }
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub total_cards: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
    pub results: Vec<CardImportResult>,
}

impl ImportResult {
    /// Tally per-card outcomes. `total_cards` is the number of candidates
    /// after filtering, so it always equals `results.len()`.
    pub fn from_results(results: Vec<CardImportResult>) -> Self {
        let skipped = results.iter().filter(|r| r.skipped).count();
        let errors = results.iter().filter(|r| r.is_error()).count();
        let imported = results.len() - skipped - errors;

        Self {
            success: errors == 0,
            total_cards: results.len(),
            imported,
            skipped,
            errors,
            results,
        }
    }
}
