// ABOUTME: Shared domain types for assembly projects
// ABOUTME: Components, completed steps, projects and the context projection handed to the model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A drone part tracked on a project.
///
/// Two components are the same part when their lower-cased names match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Component {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            purpose: None,
            condition: None,
            notes: None,
        }
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Case-insensitive identity key
    pub fn identity(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Loose object form of a component as it arrives from clients or the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Component as accepted at an ingress boundary: a bare name or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentInput {
    Name(String),
    Detailed(ComponentFields),
}

impl ComponentInput {
    /// Convert into the canonical shape. Entries without a usable name yield `None`.
    pub fn normalize(self) -> Option<Component> {
        let fields = match self {
            ComponentInput::Name(name) => ComponentFields {
                name: Some(name),
                ..Default::default()
            },
            ComponentInput::Detailed(fields) => fields,
        };

        let name = fields.name.filter(|n| !n.trim().is_empty())?;
        Some(Component {
            name,
            purpose: fields.purpose,
            condition: fields.condition,
            notes: fields.notes,
        })
    }

    /// Interpret an arbitrary JSON value. Anything that is neither a string
    /// nor an object is rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(ComponentInput::Name(s.clone())),
            Value::Object(_) => serde_json::from_value(value.clone())
                .ok()
                .map(ComponentInput::Detailed),
            _ => None,
        }
    }
}

impl From<Component> for ComponentInput {
    fn from(component: Component) -> Self {
        ComponentInput::Detailed(ComponentFields {
            name: Some(component.name),
            purpose: component.purpose,
            condition: component.condition,
            notes: component.notes,
        })
    }
}

impl From<&str> for ComponentInput {
    fn from(name: &str) -> Self {
        ComponentInput::Name(name.to_string())
    }
}

/// Normalize a list of raw JSON values into canonical components, dropping
/// anything unusable.
pub fn normalize_components(values: &[Value]) -> Vec<Component> {
    values
        .iter()
        .filter_map(ComponentInput::from_value)
        .filter_map(ComponentInput::normalize)
        .collect()
}

/// Serde helper for component lists coming from untrusted sources.
///
/// Accepts a missing field, `null`, or an array of mixed strings and objects.
/// Malformed entries are skipped rather than failing the whole document.
pub fn deserialize_components<'de, D>(deserializer: D) -> Result<Vec<Component>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => normalize_components(&items),
        _ => Vec::new(),
    })
}

/// A completed assembly step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub step_number: u32,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: String,
}

impl Step {
    pub fn new(step_number: u32, title: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            step_number,
            title: title.into(),
            timestamp: Utc::now(),
            details: details.into(),
        }
    }

    /// Step recorded automatically when an analysis says the user can move on.
    pub fn completed(step_number: u32, details: impl Into<String>) -> Self {
        Self::new(step_number, format!("Step {} completed", step_number), details)
    }
}

/// Persistent state of one assembly project, keyed by `(user_id, project_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: String,
    pub user_id: String,
    pub project_name: String,
    pub current_step: u32,
    #[serde(default)]
    pub drone_type: Option<String>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub completed_steps: Vec<Step>,
    pub last_interaction: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn context(&self) -> ProjectContext {
        ProjectContext {
            project_id: self.project_id.clone(),
            project_name: self.project_name.clone(),
            current_step: self.current_step,
            components: self.components.clone(),
            completed_steps: self.completed_steps.clone(),
            drone_type: self.drone_type.clone(),
            last_interaction: self.last_interaction,
        }
    }
}

/// Read-only projection of a project used for prompts and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub project_id: String,
    pub project_name: String,
    pub current_step: u32,
    pub components: Vec<Component>,
    pub completed_steps: Vec<Step>,
    pub drone_type: Option<String>,
    pub last_interaction: DateTime<Utc>,
}

/// Default display name for a project created without one.
pub fn default_project_name(now: DateTime<Utc>) -> String {
    format!("Drone Project {}", now.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_string_normalizes_to_component() {
        let component = ComponentInput::Name("Battery".to_string()).normalize();
        assert_eq!(component, Some(Component::named("Battery")));
    }

    #[test]
    fn test_blank_names_are_dropped() {
        assert_eq!(ComponentInput::Name("   ".to_string()).normalize(), None);
        assert_eq!(
            ComponentInput::Detailed(ComponentFields::default()).normalize(),
            None
        );
    }

    #[test]
    fn test_normalize_mixed_values() {
        let values = vec![
            json!("ESC"),
            json!({"name": "Motor", "purpose": "thrust"}),
            json!({"purpose": "nameless"}),
            json!(42),
            json!(null),
        ];

        let components = normalize_components(&values);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].name, "ESC");
        assert_eq!(components[1].purpose.as_deref(), Some("thrust"));
    }

    #[test]
    fn test_lenient_deserializer_tolerates_garbage() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "deserialize_components")]
            parts: Vec<Component>,
        }

        let holder: Holder = serde_json::from_value(json!({"parts": "not a list"})).unwrap();
        assert!(holder.parts.is_empty());

        let holder: Holder = serde_json::from_value(json!({})).unwrap();
        assert!(holder.parts.is_empty());

        let holder: Holder =
            serde_json::from_value(json!({"parts": ["Frame", {"name": 3}]})).unwrap();
        assert_eq!(holder.parts, vec![Component::named("Frame")]);
    }

    #[test]
    fn test_completed_step_title() {
        let step = Step::completed(3, "looks good");
        assert_eq!(step.title, "Step 3 completed");
        assert_eq!(step.details, "looks good");
    }

    #[test]
    fn test_component_serializes_camel_case_without_nulls() {
        let value = serde_json::to_value(Component::named("Prop")).unwrap();
        assert_eq!(value, json!({"name": "Prop"}));
    }
}
