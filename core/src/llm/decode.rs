//! Decoding of structured completion payloads.
//!
//! Backends in JSON mode usually return a bare object, but some wrap it in a
//! markdown fence or prepend prose. [`decode_json`] accepts all of these and
//! reports anything else as [`UxsimError::Decode`].

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::types::{Action, ActionKind};
use crate::{Result, UxsimError};

/// Slice out the first balanced `{...}` object in `text`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode a completion into `T`, tolerating fences and surrounding prose.
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }
    let object = extract_json_object(trimmed).ok_or_else(|| {
        UxsimError::Decode(format!("no JSON object in response: {}", preview(trimmed)))
    })?;
    serde_json::from_str(object).map_err(|e| UxsimError::Decode(e.to_string()))
}

fn preview(text: &str) -> String {
    const MAX: usize = 80;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}...")
    }
}

/// Render a JSON value as plain text: strings as-is, everything else compact.
fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim().to_string();
            (!s.is_empty()).then_some(s)
        }
        other => Some(other.to_string()),
    }
}

fn lenient_text_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.into_iter().filter_map(value_to_text).collect(),
        Some(other) => value_to_text(other).into_iter().collect(),
        None => Vec::new(),
    })
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => value_to_text(other).unwrap_or_default(),
        None => String::new(),
    })
}

/// Perception phase output: salient facts about the page
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PerceptionPayload {
    #[serde(default, deserialize_with = "lenient_text_list")]
    pub observations: Vec<String>,
}

/// Feedback phase output: thoughts about the outcome of the previous action
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ThoughtsPayload {
    #[serde(default, deserialize_with = "lenient_text_list")]
    pub thoughts: Vec<String>,
}

/// Planning phase output
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlanPayload {
    #[serde(default, deserialize_with = "lenient_text")]
    pub plan: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub rationale: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub next_step: String,
}

/// Reflection phase output
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InsightsPayload {
    #[serde(default, deserialize_with = "lenient_text_list")]
    pub insights: Vec<String>,
}

/// Importance scoring output on a 1-10 scale
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ImportancePayload {
    #[serde(alias = "importance")]
    pub score: f64,
}

/// One proposed action as the model wrote it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type", alias = "action")]
    pub kind: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Acting phase output. Accepts `{"actions": [...]}` or a single
/// `{"action": ..., "parameters": ...}` object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawActionPayload")]
pub struct ActionPayload {
    pub actions: Vec<ActionSpec>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawActionPayload {
    List { actions: Vec<ActionSpec> },
    Single(ActionSpec),
}

impl From<RawActionPayload> for ActionPayload {
    fn from(raw: RawActionPayload) -> Self {
        match raw {
            RawActionPayload::List { actions } => Self { actions },
            RawActionPayload::Single(spec) => Self {
                actions: vec![spec],
            },
        }
    }
}

/// Canonical parameter name and the names models commonly use for it.
type ParamAliases = &'static [(&'static str, &'static [&'static str])];

const ELEMENT_ALIASES: &[&str] = &["element_id", "selector", "id"];
const SEARCH_PARAMS: ParamAliases = &[("query", &["query", "text", "search_term"])];
const CLICK_PARAMS: ParamAliases = &[("element_id", ELEMENT_ALIASES)];
const TYPE_PARAMS: ParamAliases = &[("element_id", ELEMENT_ALIASES), ("text", &["text", "value"])];
const SELECT_PARAMS: ParamAliases = &[
    ("element_id", ELEMENT_ALIASES),
    ("value", &["value", "option", "text"]),
];
const WAIT_PARAMS: ParamAliases = &[("seconds", &["seconds", "time", "duration"])];

impl ActionSpec {
    fn first_param(&self, keys: &[&str]) -> Option<Value> {
        keys.iter()
            .find_map(|k| self.parameters.get(*k).filter(|v| !v.is_null()))
            .cloned()
    }

    /// Map the model's parameter names onto the canonical ones and validate.
    pub fn into_action(self) -> Result<Action> {
        let kind = ActionKind::from_str(&self.kind)?;

        let mapping = match kind {
            ActionKind::Search => SEARCH_PARAMS,
            ActionKind::Click => CLICK_PARAMS,
            ActionKind::Type => TYPE_PARAMS,
            ActionKind::Select => SELECT_PARAMS,
            ActionKind::Wait => WAIT_PARAMS,
            ActionKind::Stop => {
                let reason = self
                    .first_param(&["reason", "description", "message"])
                    .and_then(value_to_text)
                    .or(self.reasoning)
                    .unwrap_or_default();
                return Ok(Action::stop(reason));
            }
        };

        let mut parameters = BTreeMap::new();
        for (canonical, aliases) in mapping {
            if let Some(value) = self.first_param(aliases) {
                let value = match (*canonical, value) {
                    ("seconds", Value::String(s)) => s
                        .trim()
                        .parse::<f64>()
                        .map(Value::from)
                        .unwrap_or(Value::String(s)),
                    ("seconds", v) => v,
                    (_, Value::Number(n)) => Value::String(n.to_string()),
                    (_, v) => v,
                };
                parameters.insert(canonical.to_string(), value);
            }
        }

        let action = Action::new(kind, parameters);
        action.validate()?;
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_fenced_text() {
        let text = "Sure!\n```json\n{\"a\": {\"b\": \"}\"}}\n```";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": \"}\"}}"));
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{ unbalanced"), None);
    }

    #[test]
    fn test_decode_garbage_is_error() {
        let err = decode_json::<PlanPayload>("I cannot help with that").unwrap_err();
        assert!(matches!(err, UxsimError::Decode(_)));
    }

    #[test]
    fn test_lenient_lists() {
        let payload: PerceptionPayload =
            decode_json(r#"{"observations": ["a", "", {"k": 1}, null]}"#).unwrap();
        assert_eq!(payload.observations, vec!["a".to_string(), "{\"k\":1}".to_string()]);

        let payload: InsightsPayload = decode_json(r#"{"insights": "single"}"#).unwrap();
        assert_eq!(payload.insights, vec!["single".to_string()]);

        let payload: ThoughtsPayload = decode_json("{}").unwrap();
        assert!(payload.thoughts.is_empty());
    }

    #[test]
    fn test_plan_accepts_list() {
        let payload: PlanPayload =
            decode_json(r#"{"plan": ["search", "compare"], "rationale": "cheap"}"#).unwrap();
        assert_eq!(payload.plan, "search\ncompare");
        assert_eq!(payload.rationale, "cheap");
        assert_eq!(payload.next_step, "");
    }

    #[test]
    fn test_action_payload_shapes() {
        let list: ActionPayload = decode_json(
            r#"{"actions": [{"type": "click", "parameters": {"selector": "buy"}}]}"#,
        )
        .unwrap();
        assert_eq!(list.actions.len(), 1);

        let single: ActionPayload = decode_json(
            r#"{"action": "search", "parameters": {"text": "tea"}, "reasoning": "start"}"#,
        )
        .unwrap();
        let action = single.actions[0].clone().into_action().unwrap();
        assert_eq!(action, Action::search("tea"));

        let empty: ActionPayload = decode_json(r#"{"actions": []}"#).unwrap();
        assert!(empty.actions.is_empty());
    }

    #[test]
    fn test_into_action_maps_aliases() {
        let spec: ActionSpec =
            serde_json::from_str(r#"{"type": "wait", "parameters": {"time": "2"}}"#).unwrap();
        assert_eq!(spec.into_action().unwrap(), Action::wait(2.0));

        let spec: ActionSpec = serde_json::from_str(
            r#"{"type": "stop", "parameters": {"description": "done shopping"}}"#,
        )
        .unwrap();
        assert_eq!(spec.into_action().unwrap().reason(), Some("done shopping"));

        let spec: ActionSpec =
            serde_json::from_str(r#"{"type": "stop", "reasoning": "nothing left"}"#).unwrap();
        assert_eq!(spec.into_action().unwrap().reason(), Some("nothing left"));
    }

    #[test]
    fn test_into_action_rejects_malformed() {
        let spec: ActionSpec =
            serde_json::from_str(r#"{"type": "click", "parameters": {}}"#).unwrap();
        assert!(matches!(spec.into_action(), Err(UxsimError::InvalidAction(_))));

        let spec: ActionSpec =
            serde_json::from_str(r#"{"type": "teleport", "parameters": {}}"#).unwrap();
        assert!(matches!(spec.into_action(), Err(UxsimError::InvalidAction(_))));
    }
}
