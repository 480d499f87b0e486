//! Task-board source: the Trello REST client and the trait the import engine
//! reads boards through.

pub mod client;
pub mod models;

pub use client::{BoardClient, BoardConfig};
pub use models::{BoardData, BoardLabel, BoardList, BoardMember, RawCard};

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

/// Board imported when neither `BOARD_ID` nor an explicit id is given.
pub const DEFAULT_BOARD_ID: &str = "66f358bba2848a046daa5e45";

pub fn board_id_from_env() -> String {
    std::env::var("BOARD_ID")
        .ok()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BOARD_ID.to_string())
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("board configuration error: {0}")]
    Config(String),
    #[error("board API returned status {status}: {body}")]
    Network { status: StatusCode, body: String },
    #[error("board HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode board response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Read access to a single task board.
#[async_trait]
pub trait BoardSource: Send + Sync {
    async fn fetch_me(&self) -> Result<BoardMember, BoardError>;
    async fn fetch_lists(&self, board_id: &str) -> Result<Vec<BoardList>, BoardError>;
    async fn fetch_cards(&self, board_id: &str) -> Result<Vec<RawCard>, BoardError>;
    async fn fetch_labels(&self, board_id: &str) -> Result<Vec<BoardLabel>, BoardError>;
    async fn fetch_members(&self, board_id: &str) -> Result<Vec<BoardMember>, BoardError>;
}

/// Fetch lists, cards, labels and members of a board concurrently.
///
/// The first failing request aborts the whole fetch.
pub async fn fetch_board_data<S>(source: &S, board_id: &str) -> Result<BoardData, BoardError>
where
    S: BoardSource + ?Sized,
{
    let (lists, cards, labels, members) = tokio::try_join!(
        source.fetch_lists(board_id),
        source.fetch_cards(board_id),
        source.fetch_labels(board_id),
        source.fetch_members(board_id),
    )?;

    Ok(BoardData {
        lists,
        cards,
        labels,
        members,
    })
}
