// ABOUTME: Structured shapes the model is asked to return for each assistant call
// ABOUTME: Lenient deserialization plus the fallback used when the reply is not JSON

use droneguide_core::{deserialize_components, Component};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn default_success() -> String {
    "success".to_string()
}

fn default_warning() -> String {
    "warning".to_string()
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Accepts a list, a single string, or nothing
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(value_to_text)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

/// Accepts any scalar and renders it as text
fn loose_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(value_to_text)
        .unwrap_or_default())
}

/// Accepts booleans and their common string spellings
fn loose_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        _ => false,
    })
}

/// Review of a camera frame against the current assembly step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyAnalysis {
    #[serde(default = "default_success", deserialize_with = "loose_text")]
    pub status: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub feedback: String,
    #[serde(default, deserialize_with = "string_list")]
    pub warnings: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub next_steps: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub misalignments: Vec<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub progress: String,
    #[serde(default, deserialize_with = "loose_bool")]
    pub can_proceed: bool,
    #[serde(default, deserialize_with = "deserialize_components")]
    pub identified_components: Vec<Component>,
}

impl AssemblyAnalysis {
    pub fn fallback(raw: String) -> Self {
        Self {
            status: default_warning(),
            feedback: raw,
            warnings: Vec::new(),
            next_steps: Vec::new(),
            misalignments: Vec::new(),
            progress: "0".to_string(),
            can_proceed: false,
            identified_components: Vec::new(),
        }
    }
}

/// Answer to a spoken question about the frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceAnswer {
    #[serde(default = "default_success", deserialize_with = "loose_text")]
    pub status: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub answer: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub details: String,
    #[serde(default, deserialize_with = "string_list")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub warnings: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_components")]
    pub identified_components: Vec<Component>,
}

impl VoiceAnswer {
    pub fn fallback(raw: String) -> Self {
        Self {
            status: default_warning(),
            answer: raw,
            details: String::new(),
            recommendations: Vec::new(),
            warnings: Vec::new(),
            identified_components: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInstructions {
    #[serde(default, deserialize_with = "loose_text")]
    pub step_title: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub overview: String,
    #[serde(default, deserialize_with = "string_list")]
    pub tools: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub components: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub steps: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub safety_notes: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub tips: Vec<String>,
}

impl StepInstructions {
    pub fn fallback(step: u32, raw: String) -> Self {
        Self {
            step_title: format!("Step {}", step),
            overview: raw,
            tools: Vec::new(),
            components: Vec::new(),
            steps: Vec::new(),
            safety_notes: Vec::new(),
            tips: Vec::new(),
        }
    }
}

/// Inventory of the parts visible in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartsIdentification {
    #[serde(
        default,
        alias = "identifiedComponents",
        deserialize_with = "deserialize_components"
    )]
    pub identified_parts: Vec<Component>,
    #[serde(default, deserialize_with = "string_list")]
    pub missing_components: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub concerns: Vec<String>,
}

impl PartsIdentification {
    pub fn fallback(raw: String) -> Self {
        Self {
            identified_parts: Vec::new(),
            missing_components: Vec::new(),
            recommendations: vec![raw],
            concerns: Vec::new(),
        }
    }
}
