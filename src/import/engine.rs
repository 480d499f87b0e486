//! Batch import of one board.
//!
//! A run fetches the board, resolves lookups, then walks the open cards one at
//! a time: unmapped lists and already-imported cards are skipped, everything
//! else is mapped and inserted. A failing card never aborts the batch; only
//! the fetch and lookup phases are fatal.
//!
//! The already-imported check reads before it writes, so two overlapping runs
//! on the same board can both insert a card. Runs are expected to be
//! serialized by whoever triggers them.

use crate::board::{BoardError, BoardSource, RawCard, fetch_board_data};
use crate::import::lookups::{LookupError, LookupSource, LookupTables, load_lookups};
use crate::import::mapper::{ContentDraft, ContentMapper, StageDetail};
use crate::import::mapping::ImportMappings;
use crate::import::results::{CardImportResult, DRY_RUN_ENTITY_ID, ImportResult, SkipReason};
use crate::import::sink::{ContentSink, NewContent};
use crate::models::ContentAssignment;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub const AUTHOR_ROLE: &str = "author";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to fetch board: {0}")]
    Board(#[from] BoardError),
    #[error("failed to load lookup tables: {0}")]
    Lookup(#[from] LookupError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Fetching,
    ResolvingLookups,
    ProcessingCards,
    Summarizing,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportPhase::Fetching => "fetching",
            ImportPhase::ResolvingLookups => "resolving lookups",
            ImportPhase::ProcessingCards => "processing cards",
            ImportPhase::Summarizing => "summarizing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub board_id: String,
    pub dry_run: bool,
    pub skip_existing: bool,
    /// Only cards in these lists are candidates. `None` or empty means all.
    pub list_filter: Option<Vec<String>>,
}

impl ImportOptions {
    pub fn new(board_id: impl Into<String>) -> Self {
        Self {
            board_id: board_id.into(),
            dry_run: false,
            skip_existing: true,
            list_filter: None,
        }
    }

    fn allows_list(&self, list_id: &str) -> bool {
        match &self.list_filter {
            Some(lists) if !lists.is_empty() => lists.iter().any(|id| id == list_id),
            _ => true,
        }
    }
}

pub struct ImportEngine {
    board: Arc<dyn BoardSource>,
    lookups: Arc<dyn LookupSource>,
    sink: Arc<dyn ContentSink>,
    mapper: ContentMapper,
}

impl ImportEngine {
    pub fn new(
        board: Arc<dyn BoardSource>,
        lookups: Arc<dyn LookupSource>,
        sink: Arc<dyn ContentSink>,
    ) -> Self {
        Self {
            board,
            lookups,
            sink,
            mapper: ContentMapper::new(Arc::new(ImportMappings::default())),
        }
    }

    pub fn with_mappings(mut self, mappings: Arc<ImportMappings>) -> Self {
        self.mapper = ContentMapper::new(mappings);
        self
    }

    pub fn mappings(&self) -> &ImportMappings {
        self.mapper.mappings()
    }

    /// Dry run honoring `skip_existing`, for showing what a run would do.
    pub async fn preview(&self, options: &ImportOptions) -> Result<ImportResult, ImportError> {
        let options = ImportOptions {
            dry_run: true,
            ..options.clone()
        };
        self.run(&options).await
    }

    pub async fn run(&self, options: &ImportOptions) -> Result<ImportResult, ImportError> {
        log::info!(
            "import of board {} started ({})",
            options.board_id,
            if options.dry_run { "dry run" } else { "live" }
        );

        log::info!("phase: {}", ImportPhase::Fetching);
        let board = fetch_board_data(self.board.as_ref(), &options.board_id).await?;
        log::info!(
            "fetched {} lists, {} cards, {} labels, {} members",
            board.lists.len(),
            board.cards.len(),
            board.labels.len(),
            board.members.len()
        );

        log::info!("phase: {}", ImportPhase::ResolvingLookups);
        let lookups = load_lookups(self.lookups.as_ref()).await?;

        let candidates: Vec<RawCard> = board
            .cards
            .into_iter()
            .filter(|card| !card.closed && options.allows_list(&card.id_list))
            .collect();

        log::info!(
            "phase: {} ({} candidate cards)",
            ImportPhase::ProcessingCards,
            candidates.len()
        );
        let mut results = Vec::with_capacity(candidates.len());
        for card in &candidates {
            let result = self.process_card(card, &lookups, options).await;
            log_card_result(&result);
            results.push(result);
        }

        log::info!("phase: {}", ImportPhase::Summarizing);
        let summary = ImportResult::from_results(results);
        log::info!(
            "import finished: {} total, {} imported, {} skipped, {} errors",
            summary.total_cards,
            summary.imported,
            summary.skipped,
            summary.errors
        );

        Ok(summary)
    }

    async fn process_card(
        &self,
        card: &RawCard,
        lookups: &LookupTables,
        options: &ImportOptions,
    ) -> CardImportResult {
        let Some(route) = self.mapper.route(card) else {
            return CardImportResult::skipped(&card.id, &card.name, None, SkipReason::ListNotMapped);
        };
        let stage = route.stage;

        if options.skip_existing {
            match self.sink.find_imported(&card.id).await {
                Ok(Some(existing)) => {
                    return CardImportResult::skipped(
                        &card.id,
                        &card.name,
                        Some(stage),
                        SkipReason::AlreadyImported {
                            stage: existing.stage,
                            id: existing.id,
                        },
                    );
                }
                Ok(None) => {}
                Err(err) => {
                    return CardImportResult::failed(&card.id, &card.name, stage, err.to_string());
                }
            }
        }

        let mapped = match self.mapper.map_card(card) {
            Ok(mapped) => mapped,
            Err(err) => return CardImportResult::failed(&card.id, &card.name, stage, err.to_string()),
        };

        if options.dry_run {
            return CardImportResult::imported(&card.id, &card.name, stage, DRY_RUN_ENTITY_ID);
        }

        let content_type_id = mapped
            .content_type_slug
            .as_deref()
            .and_then(|slug| resolve(lookups.content_type_id(slug), "content type", slug, card));
        let workflow_status_id = match &mapped.detail {
            StageDetail::Content(draft) => resolve(
                lookups.workflow_status_id(&draft.workflow_status_slug),
                "workflow status",
                &draft.workflow_status_slug,
                card,
            ),
            _ => None,
        };

        let new_content = NewContent {
            mapped: &mapped,
            content_type_id,
            workflow_status_id,
        };

        let content_id = match self.sink.insert_content(&new_content).await {
            Ok(id) => id,
            Err(err) => return CardImportResult::failed(&card.id, &card.name, stage, err.to_string()),
        };

        if let StageDetail::Content(draft) = &mapped.detail {
            self.write_secondary(content_id, card, draft, lookups).await;
        }

        CardImportResult::imported(&card.id, &card.name, stage, content_id)
    }

    /// Links and author assignments. Failures only warn; the content row stays.
    async fn write_secondary(
        &self,
        content_id: i64,
        card: &RawCard,
        draft: &ContentDraft,
        lookups: &LookupTables,
    ) {
        if let Err(err) = self.sink.insert_links(content_id, &draft.links).await {
            log::warn!("card {}: failed to insert links: {}", card.id, err);
        }

        let assignments = self.author_assignments(card, &draft.member_usernames, lookups);
        if let Err(err) = self.sink.insert_assignments(content_id, &assignments).await {
            log::warn!("card {}: failed to insert assignments: {}", card.id, err);
        }
    }

    fn author_assignments(
        &self,
        card: &RawCard,
        usernames: &[String],
        lookups: &LookupTables,
    ) -> Vec<ContentAssignment> {
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut assignments = Vec::new();

        for username in usernames {
            let Some(email) = self.mapper.mappings().email_for(username) else {
                log::warn!("card {}: no roster entry for board member {}", card.id, username);
                continue;
            };
            let Some(user_id) = lookups.user_id_for_email(email) else {
                log::warn!("card {}: no user with email {} ({})", card.id, email, username);
                continue;
            };
            if seen.insert(user_id) {
                assignments.push(ContentAssignment {
                    user_id,
                    role: AUTHOR_ROLE.to_string(),
                });
            }
        }

        assignments
    }
}

fn resolve(id: Option<i32>, kind: &str, slug: &str, card: &RawCard) -> Option<i32> {
    if id.is_none() {
        log::warn!("card {}: unknown {} `{}`, leaving it empty", card.id, kind, slug);
    }
    id
}

fn log_card_result(result: &CardImportResult) {
    let stage = result.stage.map(|s| s.as_str()).unwrap_or("-");
    if result.skipped {
        log::info!(
            "SKIP  {} [{}] {}: {}",
            result.card_id,
            stage,
            result.card_name,
            result.skip_reason.as_deref().unwrap_or_default()
        );
    } else if result.success {
        log::info!(
            "OK    {} [{}] {} -> #{}",
            result.card_id,
            stage,
            result.card_name,
            result.entity_id.unwrap_or_default()
        );
    } else {
        log::error!(
            "ERROR {} [{}] {}: {}",
            result.card_id,
            stage,
            result.card_name,
            result.error.as_deref().unwrap_or_default()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_filter_allows_everything() {
        let mut options = ImportOptions::new("board");
        assert!(options.allows_list("any"));
        options.list_filter = Some(Vec::new());
        assert!(options.allows_list("any"));
        options.list_filter = Some(vec!["a".into()]);
        assert!(options.allows_list("a"));
        assert!(!options.allows_list("b"));
    }

    #[test]
    fn new_options_skip_existing_by_default() {
        let options = ImportOptions::new("board");
        assert!(options.skip_existing);
        assert!(!options.dry_run);
    }
}
