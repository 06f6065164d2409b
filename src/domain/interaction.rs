//! User interaction requests — the "UIP" (Universal Interaction Protocol)
//! request side.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The shape of input an interaction collects from the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Select,
    Confirm,
    Input,
    Composite,
}

/// Why the agent is asking — lets the UI render risky-tool confirmations
/// differently from plain informational prompts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    ChooseStrategy,
    RequestInfo,
    ConfirmRiskyAction,
    AssignSubtask,
    Generic,
}

/// Display copy for an interaction prompt.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InteractionDisplay {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    /// Carries the confirmation binding for risky-tool interactions:
    /// `metadata["toolCallId"]` pins the one tool call this interaction may
    /// authorize.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// One selectable option in a `Select`/`Confirm` interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionOption {
    pub id: String,
    pub label: String,
    pub style: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Validation rules for free-text `Input` interactions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Validation {
    pub regex: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A request for user confirmation or input, bound to a single task
///.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub interaction_id: String,
    pub kind: InteractionKind,
    pub purpose: Purpose,
    pub display: InteractionDisplay,
    #[serde(default)]
    pub options: Vec<InteractionOption>,
    pub validation: Option<Validation>,
}

impl Interaction {
    /// The `toolCallId` this interaction is bound to, if it was created to
    /// confirm a risky tool call.
    pub fn bound_tool_call_id(&self) -> Option<&str> {
        self.display.metadata.get("toolCallId").map(|s| s.as_str())
    }

    /// Build a risky-tool confirmation interaction bound to `tool_call_id`,
    /// matching the shape used by scenario 2 of
    pub fn confirm_risky_tool(
        interaction_id: impl Into<String>,
        tool_name: &str,
        tool_call_id: &str,
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("toolCallId".to_string(), tool_call_id.to_string());
        Interaction {
            interaction_id: interaction_id.into(),
            kind: InteractionKind::Confirm,
            purpose: Purpose::ConfirmRiskyAction,
            display: InteractionDisplay {
                title: format!("Allow {} to run?", tool_name),
                description: Some(format!(
                    "The agent wants to execute the risky tool \"{}\". Approve to continue.",
                    tool_name
                )),
                content: None,
                metadata,
            },
            options: vec![
                InteractionOption {
                    id: "approve".to_string(),
                    label: "Approve".to_string(),
                    style: Some("primary".to_string()),
                    is_default: false,
                },
                InteractionOption {
                    id: "reject".to_string(),
                    label: "Reject".to_string(),
                    style: Some("danger".to_string()),
                    is_default: false,
                },
            ],
            validation: None,
        }
    }
}

/// The caller-facing response to a pending [`Interaction`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionResponse {
    pub interaction_id: String,
    pub selected_option_id: Option<String>,
    pub input_value: Option<String>,
    pub comment: Option<String>,
}
