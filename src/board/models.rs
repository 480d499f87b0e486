//! Trello API response shapes consumed by the importer.
//!
//! Only the fields the pipeline reads are declared; unknown fields are ignored
//! so API additions never break deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMember {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardLabel {
    pub id: String,
    #[serde(default)]
    pub id_board: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pos: f64,
    #[serde(default)]
    pub closed: bool,
}

/// A card as fetched from the board. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCard {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
    pub id_list: String,
    #[serde(default)]
    pub id_labels: Vec<String>,
    #[serde(default)]
    pub labels: Vec<BoardLabel>,
    #[serde(default)]
    pub id_members: Vec<String>,
    #[serde(default)]
    pub members: Vec<BoardMember>,
    #[serde(default)]
    pub closed: bool,
    pub url: String,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub date_last_activity: Option<DateTime<Utc>>,
}

impl RawCard {
    /// Label names in the order the board returned them.
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|label| label.name.as_str())
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.label_names().any(|label| label == name)
    }
}

/// Everything fetched from one board in a single run.
#[derive(Debug, Clone, Default)]
pub struct BoardData {
    pub lists: Vec<BoardList>,
    pub cards: Vec<RawCard>,
    pub labels: Vec<BoardLabel>,
    pub members: Vec<BoardMember>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_card_with_embedded_labels_and_members() {
        let payload = r#"{
            "id": "c1",
            "name": "Battery drain guide",
            "desc": "**Slug:** battery-drain",
            "due": "2024-10-01T16:00:00.000Z",
            "dueComplete": false,
            "idList": "list-1",
            "idLabels": ["l1"],
            "labels": [{"id": "l1", "idBoard": "b1", "name": "Urgent", "color": "red", "uses": 3}],
            "idMembers": ["m1"],
            "members": [{"id": "m1", "fullName": "Kim Writer", "username": "kimw"}],
            "closed": false,
            "url": "https://trello.com/c/abc/1-battery"
        }"#;

        let card: RawCard = serde_json::from_str(payload).expect("card json");
        assert_eq!(card.description, "**Slug:** battery-drain");
        assert_eq!(card.id_list, "list-1");
        assert_eq!(card.label_names().collect::<Vec<_>>(), vec!["Urgent"]);
        assert_eq!(card.members[0].username, "kimw");
        assert_eq!(
            card.due.map(|due| due.date_naive().to_string()).as_deref(),
            Some("2024-10-01")
        );
    }

    #[test]
    fn tolerates_null_due_and_missing_members() {
        let payload = r#"{"id": "c2", "name": "x", "desc": "", "due": null, "idList": "l", "url": "u"}"#;
        let card: RawCard = serde_json::from_str(payload).expect("card json");
        assert!(card.due.is_none());
        assert!(card.members.is_empty());
        assert!(!card.closed);
    }
}
