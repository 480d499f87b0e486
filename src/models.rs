use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use std::fmt;

// ===== Pipeline Enums =====

/// Editorial pipeline phase a card is imported into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentStage {
    Idea,
    Brief,
    Content,
}

impl ContentStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStage::Idea => "idea",
            ContentStage::Brief => "brief",
            ContentStage::Content => "content",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "idea" => Some(ContentStage::Idea),
            "brief" => Some(ContentStage::Brief),
            "content" => Some(ContentStage::Content),
            _ => None,
        }
    }
}

impl fmt::Display for ContentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }
}

// ===== Persisted Rows =====

/// A previously imported row located by its source card id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingImport {
    pub id: i64,
    pub stage: ContentStage,
}

/// Link row attached to a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLink {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub link_type: String,
}

/// Author/editor assignment row for a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentAssignment {
    pub user_id: uuid::Uuid,
    pub role: String,
}
