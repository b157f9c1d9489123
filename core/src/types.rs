//! Kobo asset DTOs.
//!
//! # Design
//! Kobo assets carry dozens of fields this tool never looks at. Only the
//! handful the sync reads are typed; the rest ride along in `extra` so a
//! returned asset can still be dumped or inspected in full.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One answer option of a select question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, deserialize_with = "label_text")]
    pub label: String,
    #[serde(default, deserialize_with = "label_text")]
    pub name: String,
    /// Stamped by `KoboClient`; callers leave it empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
}

impl Choice {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            name: name.into(),
            list_name: None,
        }
    }
}

/// The single question row of a block's `content.survey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyEntry {
    #[serde(rename = "type", default)]
    pub question_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_from_list_name: Option<String>,
    #[serde(default, deserialize_with = "label_text")]
    pub label: String,
    #[serde(default, deserialize_with = "flag")]
    pub required: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `content` of an asset. Only blocks sent by this tool are guaranteed to
/// have exactly one survey entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockContent {
    #[serde(default)]
    pub survey: Vec<SurveyEntry>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub settings: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockContent {
    /// `select_from_list_name` of the first survey entry.
    pub fn list_name(&self) -> Option<&str> {
        self.survey
            .first()
            .and_then(|entry| entry.select_from_list_name.as_deref())
    }
}

/// A Kobo asset (collection, block, question, template, survey).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub uid: String,
    #[serde(
        rename = "owner__username",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<BlockContent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of `GET /api/v2/assets/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPage {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<Asset>,
}

/// Request body for creating or replacing a question block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockPayload {
    pub content: BlockContent,
    pub asset_type: &'static str,
    pub parent: String,
}

/// Labelled value used by collection settings (`country`, `sector`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledValue {
    pub value: String,
    pub label: String,
}

/// Descriptive settings attached to a new collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSettings {
    pub organization: String,
    pub country: Vec<LabeledValue>,
    pub sector: LabeledValue,
    pub description: String,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        let placeholder = || LabeledValue {
            value: "XXX".to_string(),
            label: "XXX".to_string(),
        };
        Self {
            organization: "XXX".to_string(),
            country: vec![placeholder()],
            sector: placeholder(),
            description: "XXX".to_string(),
        }
    }
}

/// Request body for creating a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionPayload {
    pub name: String,
    pub asset_type: &'static str,
    pub settings: CollectionSettings,
    /// Comma separated tags.
    pub tag_string: String,
}

/// Question options shared by create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSpec {
    pub label: String,
    pub question_type: String,
    pub required: bool,
}

impl QuestionSpec {
    pub fn select_one(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            question_type: "select_one".to_string(),
            required: false,
        }
    }
}

/// Kobo returns translated labels as arrays (`["France"]`); the first
/// translation is the default one.
fn label_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Array(items) => Ok(items
            .into_iter()
            .find_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .unwrap_or_default()),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// XLSForm-style flags come as booleans or as `"true"`/`"yes"` strings.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(value) => value,
        Value::String(text) => {
            matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1")
        }
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}
