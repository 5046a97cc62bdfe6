//! Hook event envelope and the closed set of tools that can appear in it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Envelope posted to `/intent` by the host assistant's hooks.
///
/// `tool` is `"Prompt"` for prompt-submit events and a tool name for
/// tool-use-post events; `session-start` arrives with tool `"SessionStart"`
/// and no input. Unknown tools deserialize fine and map to
/// [`ToolKind::Other`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentEvent {
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    /// Only present on prompt-submit events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub session_id: String,
    /// Host correlation key, e.g. `toolu_...`; optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    /// Epoch milliseconds.
    pub timestamp: u64,
    /// Project uuid; when absent the active project is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl IntentEvent {
    #[must_use]
    pub fn kind(&self) -> ToolKind {
        ToolKind::from_name(&self.tool)
    }

    /// File paths this event touches, per the tool's extraction rules.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        match &self.tool_input {
            Some(input) => self.kind().extract_paths(input),
            None => Vec::new(),
        }
    }
}

/// The tools that can appear in an intent event.
///
/// Each variant knows how to pull file paths out of its input and which
/// synthetic tag it contributes; nothing here needs dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Read,
    Edit,
    Write,
    Grep,
    Glob,
    Bash,
    Prompt,
    SessionStart,
    Other,
}

impl ToolKind {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "Read" => ToolKind::Read,
            "Edit" | "MultiEdit" => ToolKind::Edit,
            "Write" => ToolKind::Write,
            "Grep" | "Search" => ToolKind::Grep,
            "Glob" => ToolKind::Glob,
            "Bash" => ToolKind::Bash,
            "Prompt" | "UserPromptSubmit" => ToolKind::Prompt,
            "SessionStart" => ToolKind::SessionStart,
            _ => ToolKind::Other,
        }
    }

    /// Synthetic tag describing the action itself, independent of content.
    #[must_use]
    pub fn synthetic_tag(self) -> Option<&'static str> {
        match self {
            ToolKind::Read => Some("#reading"),
            ToolKind::Edit => Some("#editing"),
            ToolKind::Write => Some("#creating"),
            ToolKind::Grep | ToolKind::Glob => Some("#searching"),
            ToolKind::Bash => Some("#running"),
            ToolKind::Prompt | ToolKind::SessionStart | ToolKind::Other => None,
        }
    }

    /// Whether accesses from this tool count as "reads" for prediction
    /// hit attribution.
    #[must_use]
    pub fn resolves_predictions(self) -> bool {
        matches!(self, ToolKind::Read)
    }

    /// Extract file paths from a tool input object.
    ///
    /// Bash deliberately yields nothing: command strings associate with
    /// the whole repository, not a file.
    #[must_use]
    pub fn extract_paths(self, input: &serde_json::Value) -> Vec<String> {
        let mut paths = Vec::new();
        match self {
            ToolKind::Read | ToolKind::Edit | ToolKind::Write => {
                for key in ["file_path", "path", "notebook_path"] {
                    if let Some(value) = input.get(key).and_then(|v| v.as_str()) {
                        if !value.is_empty() {
                            paths.push(value.to_string());
                            break;
                        }
                    }
                }
            }
            ToolKind::Grep | ToolKind::Glob => {
                // Directory-level association only.
                for key in ["path", "include"] {
                    if let Some(value) = input.get(key).and_then(|v| v.as_str()) {
                        if !value.is_empty() {
                            paths.push(value.to_string());
                            break;
                        }
                    }
                }
            }
            ToolKind::Bash
            | ToolKind::Prompt
            | ToolKind::SessionStart
            | ToolKind::Other => {}
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(tool: &str, input: serde_json::Value) -> IntentEvent {
        IntentEvent {
            tool: tool.to_string(),
            tool_input: Some(input),
            prompt: None,
            session_id: "s1".to_string(),
            tool_use_id: None,
            timestamp: 1_700_000_000_000,
            project: None,
        }
    }

    #[test]
    fn read_extracts_file_path() {
        let ev = event("Read", json!({"file_path": "/src/auth.rs"}));
        assert_eq!(ev.paths(), vec!["/src/auth.rs".to_string()]);
        assert_eq!(ev.kind().synthetic_tag(), Some("#reading"));
    }

    #[test]
    fn grep_extracts_directory_scope() {
        let ev = event("Grep", json!({"pattern": "fn main", "path": "src/"}));
        assert_eq!(ev.paths(), vec!["src/".to_string()]);
        assert_eq!(ev.kind().synthetic_tag(), Some("#searching"));
    }

    #[test]
    fn bash_has_no_file_association() {
        let ev = event("Bash", json!({"command": "cat /etc/hosts"}));
        assert!(ev.paths().is_empty());
        assert_eq!(ev.kind().synthetic_tag(), Some("#running"));
    }

    #[test]
    fn unknown_tool_maps_to_other() {
        assert_eq!(ToolKind::from_name("WebFetch"), ToolKind::Other);
        assert_eq!(ToolKind::from_name("WebFetch").synthetic_tag(), None);
    }

    #[test]
    fn only_reads_resolve_predictions() {
        assert!(ToolKind::Read.resolves_predictions());
        assert!(!ToolKind::Edit.resolves_predictions());
        assert!(!ToolKind::Grep.resolves_predictions());
    }
}
