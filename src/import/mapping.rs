//! Board-to-pipeline mapping tables.
//!
//! Which list feeds which stage, which labels carry a content type or a
//! priority, and who on the board maps to which editor account. Loaded from a
//! TOML file so a board reorganization does not need a rebuild; the built-in
//! defaults mirror the production board.

use crate::import::parser::UrlRules;
use crate::models::{ContentStage, Priority};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAPPINGS_PATH_ENV: &str = "IMPORT_MAPPINGS_PATH";

#[derive(Debug, Error)]
pub enum MappingConfigError {
    #[error("failed to read mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid mapping file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Stage and optional workflow status a board list imports into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRoute {
    pub stage: ContentStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ListRoute {
    pub fn stage(stage: ContentStage) -> Self {
        Self {
            stage,
            status: None,
        }
    }

    pub fn content(status: &str) -> Self {
        Self {
            stage: ContentStage::Content,
            status: Some(status.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportMappings {
    /// Board list id → route.
    pub lists: HashMap<String, ListRoute>,
    /// Label name → content type slug.
    pub content_types: HashMap<String, String>,
    /// Label name → priority.
    pub priorities: HashMap<String, Priority>,
    /// Board username → editor email.
    pub roster: HashMap<String, String>,
    /// Label name → idea source.
    pub source_labels: HashMap<String, String>,
    /// Label marking a brief as an update of a live article.
    pub update_label: String,
    pub url_rules: UrlRules,
}

impl Default for ImportMappings {
    fn default() -> Self {
        let lists = [
            ("66f358dc6c4988996773f6d8", ListRoute::stage(ContentStage::Brief)),
            ("66fc535b0c087b59ad9b3a15", ListRoute::stage(ContentStage::Brief)),
            ("68dc7e7ab3259474182f307d", ListRoute::stage(ContentStage::Idea)),
            ("66f358e065cc3ec20689f1be", ListRoute::content("draft")),
            ("66f358e7c333ae6838219277", ListRoute::content("in_review")),
            ("66f3594f320b66bf10668426", ListRoute::content("published")),
            ("66f45bbd7444d2113f283a68", ListRoute::content("published")),
            ("670ef3c92f32149ba5ac5ee1", ListRoute::content("archived")),
        ]
        .into_iter()
        .map(|(id, route)| (id.to_string(), route))
        .collect();

        let content_types = [
            ("Best List", "best-list"),
            ("Resource", "resource"),
            ("Product Page", "product-page"),
            ("Brand Page", "brand-page"),
            ("Opinion", "opinion"),
        ]
        .into_iter()
        .map(|(label, slug)| (label.to_string(), slug.to_string()))
        .collect();

        let priorities = [("Urgent", Priority::Urgent), ("low priority", Priority::Low)]
            .into_iter()
            .map(|(label, priority)| (label.to_string(), priority))
            .collect();

        let source_labels = [("Forum Idea".to_string(), "forum".to_string())]
            .into_iter()
            .collect();

        Self {
            lists,
            content_types,
            priorities,
            roster: HashMap::new(),
            source_labels,
            update_label: "Update".to_string(),
            url_rules: UrlRules::default(),
        }
    }
}

impl ImportMappings {
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self, MappingConfigError> {
        toml::from_str(raw).map_err(|source| MappingConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, MappingConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| MappingConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    /// Explicit path first, then `IMPORT_MAPPINGS_PATH`, then the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, MappingConfigError> {
        let from_env = std::env::var(MAPPINGS_PATH_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let mappings = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                log::info!("Loading import mappings from {}", path.display());
                Self::from_path(&path)?
            }
            None => Self::default(),
        };

        if let Some(warning) = mappings.roster_warning() {
            log::warn!("{}", warning);
        }
        Ok(mappings)
    }

    /// Set when no board member can ever be assigned as an author.
    pub fn roster_warning(&self) -> Option<String> {
        self.roster.is_empty().then(|| {
            format!(
                "import mappings have an empty roster; author assignments will be skipped \
                 (set [roster] in a mapping file or {MAPPINGS_PATH_ENV})"
            )
        })
    }

    pub fn route_for(&self, list_id: &str) -> Option<&ListRoute> {
        self.lists.get(list_id)
    }

    /// First label, in card order, with a content type.
    pub fn content_type_for<'a, I>(&self, labels: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels
            .into_iter()
            .find_map(|label| self.content_types.get(label))
            .map(String::as_str)
    }

    /// First label, in card order, with a priority.
    pub fn priority_for<'a, I>(&self, labels: I) -> Option<Priority>
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels
            .into_iter()
            .find_map(|label| self.priorities.get(label).copied())
    }

    pub fn source_for<'a, I>(&self, labels: I) -> Option<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels
            .into_iter()
            .find_map(|label| self.source_labels.get(label))
            .map(String::as_str)
    }

    pub fn email_for(&self, username: &str) -> Option<&str> {
        self.roster.get(username).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_route_known_lists() {
        let mappings = ImportMappings::default();
        assert_eq!(
            mappings.route_for("68dc7e7ab3259474182f307d"),
            Some(&ListRoute::stage(ContentStage::Idea))
        );
        assert_eq!(
            mappings.route_for("66f358e7c333ae6838219277"),
            Some(&ListRoute::content("in_review"))
        );
        assert!(mappings.route_for("unknown").is_none());
    }

    #[test]
    fn first_matching_label_wins() {
        let mappings = ImportMappings::default();
        let labels = ["Opinion", "Urgent", "Best List", "low priority"];
        assert_eq!(mappings.content_type_for(labels), Some("opinion"));
        assert_eq!(mappings.priority_for(labels), Some(Priority::Urgent));
        assert_eq!(mappings.priority_for(["Misc"]), None);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let raw = r#"
            update_label = "Refresh"

            [lists.list-a]
            stage = "content"
            status = "in_review"

            [lists.list-b]
            stage = "idea"

            [roster]
            jdoe = "jdoe@example.com"

            [priorities]
            "Hot" = "high"
        "#;

        let mappings = ImportMappings::from_toml_str(raw, Path::new("test.toml")).expect("parse");
        assert_eq!(mappings.lists.len(), 2);
        assert_eq!(mappings.route_for("list-a"), Some(&ListRoute::content("in_review")));
        assert_eq!(mappings.email_for("jdoe"), Some("jdoe@example.com"));
        assert_eq!(mappings.priority_for(["Hot"]), Some(Priority::High));
        assert_eq!(mappings.update_label, "Refresh");
        assert_eq!(mappings.content_type_for(["Resource"]), Some("resource"));
        assert_eq!(mappings.url_rules, UrlRules::default());
    }

    #[test]
    fn empty_roster_is_reported() {
        assert!(ImportMappings::default().roster_warning().is_some());

        let mut mappings = ImportMappings::default();
        mappings
            .roster
            .insert("kimw".into(), "kim@example.com".into());
        assert!(mappings.roster_warning().is_none());
    }

    #[test]
    fn invalid_toml_reports_the_path() {
        let err = ImportMappings::from_toml_str("lists = 3", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn checked_in_mapping_file_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/import-mappings.toml");
        let mappings = ImportMappings::from_path(&path).expect("mapping file");
        assert_eq!(mappings.lists.len(), ImportMappings::default().lists.len());
        assert_eq!(mappings.email_for("editor"), Some("editor@example.com"));
    }
}
