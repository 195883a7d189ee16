//! Shared data model: persona, observation, action and plan.
//!
//! Observations are produced by an [`Environment`](crate::Environment) and
//! consumed by the agent; actions flow the other way. Both serialize to the
//! shapes recorded in run traces.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, UxsimError};

// ============================================================================
// Persona
// ============================================================================

/// Immutable behavioural profile driving one simulated user.
///
/// There are no setters: the `with_*` builders consume the value and are meant
/// for construction only. Once handed to an [`Agent`](crate::Agent) the persona
/// is read-only for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    name: String,
    background: String,
    intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    income: Option<(u32, u32)>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    demographics: BTreeMap<String, Value>,
}

impl Persona {
    pub fn new(
        name: impl Into<String>,
        background: impl Into<String>,
        intent: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            background: background.into(),
            intent: intent.into(),
            age: None,
            gender: None,
            income: None,
            demographics: BTreeMap::new(),
        }
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_income(mut self, low: u32, high: u32) -> Self {
        self.income = Some((low.min(high), low.max(high)));
        self
    }

    pub fn with_demographic(mut self, key: impl Into<String>, value: Value) -> Self {
        self.demographics.insert(key.into(), value);
        self
    }

    /// Build a persona from a JSON object.
    ///
    /// Accepts the plain shape (`name`, `background`, `intent`, ...) and the
    /// narrative shape where the whole profile lives under `"persona"` and the
    /// display name is its first line (minus a leading `Persona: `).
    /// Unknown keys are kept as demographics.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(UxsimError::Config(
                "persona definition must be a JSON object".to_string(),
            ));
        };

        let (name, background) = match map.remove("persona") {
            Some(Value::String(narrative)) => {
                let first_line = narrative.lines().next().unwrap_or_default();
                let name = first_line.trim_start_matches("Persona: ").trim().to_string();
                map.remove("name");
                map.remove("background");
                (name, narrative)
            }
            _ => (
                take_string(&mut map, "name").unwrap_or_default(),
                take_string(&mut map, "background").unwrap_or_default(),
            ),
        };
        let name = if name.is_empty() {
            "Unknown".to_string()
        } else {
            name
        };

        let intent = take_string(&mut map, "intent").unwrap_or_default();
        let age = map
            .remove("age")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok());
        let gender = take_string(&mut map, "gender");
        let income = map.remove("income").and_then(|v| {
            let range = v.as_array()?;
            let low = u32::try_from(range.first()?.as_u64()?).ok()?;
            let high = u32::try_from(range.get(1)?.as_u64()?).ok()?;
            Some((low.min(high), low.max(high)))
        });

        Ok(Self {
            name,
            background,
            intent,
            age,
            gender,
            income,
            demographics: map.into_iter().collect(),
        })
    }

    /// Parse a persona definition from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn background(&self) -> &str {
        &self.background
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    pub fn age(&self) -> Option<u32> {
        self.age
    }

    pub fn gender(&self) -> Option<&str> {
        self.gender.as_deref()
    }

    pub fn income(&self) -> Option<(u32, u32)> {
        self.income
    }

    pub fn demographics(&self) -> &BTreeMap<String, Value> {
        &self.demographics
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

// ============================================================================
// Observation
// ============================================================================

/// A clickable element with a stable identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clickable {
    pub id: String,
    #[serde(default)]
    pub text: String,
}

/// A text input field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    pub id: String,
    /// Input type as reported by the page (`text`, `search`, ...)
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub placeholder: String,
}

/// A dropdown with its selectable options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectField {
    pub id: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// One snapshot of environment-perceivable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Page or location identifier
    pub url: String,
    #[serde(default)]
    pub page_content: String,
    #[serde(default)]
    pub clickables: Vec<Clickable>,
    #[serde(default)]
    pub inputs: Vec<InputField>,
    #[serde(default)]
    pub selects: Vec<SelectField>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Observation {
    pub fn new(url: impl Into<String>, page_content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page_content: page_content.into(),
            ..Default::default()
        }
    }

    /// Well-formed observation reporting an adapter failure.
    pub fn error(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_clickable(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.clickables.push(Clickable {
            id: id.into(),
            text: text.into(),
        });
        self
    }

    pub fn with_input(mut self, id: impl Into<String>, placeholder: impl Into<String>) -> Self {
        self.inputs.push(InputField {
            id: id.into(),
            kind: "text".to_string(),
            placeholder: placeholder.into(),
        });
        self
    }

    pub fn with_select(mut self, id: impl Into<String>, options: Vec<String>) -> Self {
        self.selects.push(SelectField {
            id: id.into(),
            options,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}

// ============================================================================
// Action
// ============================================================================

/// Variant tag of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Search,
    Click,
    Type,
    Select,
    Wait,
    Stop,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Search => "search",
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Select => "select",
            ActionKind::Wait => "wait",
            ActionKind::Stop => "stop",
        }
    }

    /// Parameters that must be present for this variant.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            ActionKind::Search => &["query"],
            ActionKind::Click => &["element_id"],
            ActionKind::Type => &["element_id", "text"],
            ActionKind::Select => &["element_id", "value"],
            ActionKind::Wait => &["seconds"],
            ActionKind::Stop => &["reason"],
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = UxsimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(ActionKind::Search),
            "click" => Ok(ActionKind::Click),
            "type" => Ok(ActionKind::Type),
            "select" => Ok(ActionKind::Select),
            "wait" => Ok(ActionKind::Wait),
            "stop" => Ok(ActionKind::Stop),
            other => Err(UxsimError::InvalidAction(format!(
                "unknown action type '{other}'"
            ))),
        }
    }
}

/// One tagged operation issued against the environment.
///
/// The typed constructors always produce well-formed actions. Actions built
/// with [`Action::new`] (e.g. decoded from a completion) must pass
/// [`Action::validate`] before they reach an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

const DEFAULT_STOP_REASON: &str = "Agent decided to stop";

impl Action {
    pub fn new(kind: ActionKind, parameters: BTreeMap<String, Value>) -> Self {
        Self { kind, parameters }
    }

    pub fn search(query: impl Into<String>) -> Self {
        Self::with_params(ActionKind::Search, [("query", Value::String(query.into()))])
    }

    pub fn click(element_id: impl Into<String>) -> Self {
        Self::with_params(
            ActionKind::Click,
            [("element_id", Value::String(element_id.into()))],
        )
    }

    pub fn type_text(element_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_params(
            ActionKind::Type,
            [
                ("element_id", Value::String(element_id.into())),
                ("text", Value::String(text.into())),
            ],
        )
    }

    pub fn select(element_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_params(
            ActionKind::Select,
            [
                ("element_id", Value::String(element_id.into())),
                ("value", Value::String(value.into())),
            ],
        )
    }

    /// Non-finite durations become zero; JSON has no NaN or infinity.
    pub fn wait(seconds: f64) -> Self {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        Self::with_params(ActionKind::Wait, [("seconds", Value::from(seconds))])
    }

    /// Stop action. An empty reason is replaced with a generic one so the
    /// result is always well-formed.
    pub fn stop(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            DEFAULT_STOP_REASON.to_string()
        } else {
            reason
        };
        Self::with_params(ActionKind::Stop, [("reason", Value::String(reason))])
    }

    fn with_params<const N: usize>(kind: ActionKind, params: [(&str, Value); N]) -> Self {
        Self {
            kind,
            parameters: params
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Check that every parameter required by the variant is present.
    ///
    /// String parameters must be non-empty (`text` for `type` may be empty);
    /// `seconds` must be a non-negative number.
    pub fn validate(&self) -> Result<()> {
        for key in self.kind.required_params() {
            let value = self.parameters.get(*key).ok_or_else(|| {
                UxsimError::InvalidAction(format!(
                    "{} action is missing parameter '{}'",
                    self.kind, key
                ))
            })?;

            let ok = match (*key, value) {
                ("seconds", v) => v.as_f64().map(|s| s >= 0.0).unwrap_or(false),
                ("text", Value::String(_)) if self.kind == ActionKind::Type => true,
                (_, Value::String(s)) => !s.trim().is_empty(),
                _ => false,
            };
            if !ok {
                return Err(UxsimError::InvalidAction(format!(
                    "{} action has an invalid '{}' parameter: {}",
                    self.kind, key, value
                )));
            }
        }
        Ok(())
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    pub fn is_stop(&self) -> bool {
        self.kind == ActionKind::Stop
    }

    /// Stop reason, if this is a stop action.
    pub fn reason(&self) -> Option<&str> {
        if self.is_stop() {
            self.param_str("reason")
        } else {
            None
        }
    }

    /// Short human-readable summary used in memory and logs.
    pub fn describe(&self) -> String {
        match self.kind {
            ActionKind::Search => format!("search for '{}'", self.param_str("query").unwrap_or("")),
            ActionKind::Click => format!("click '{}'", self.param_str("element_id").unwrap_or("")),
            ActionKind::Type => format!(
                "type '{}' into '{}'",
                self.param_str("text").unwrap_or(""),
                self.param_str("element_id").unwrap_or("")
            ),
            ActionKind::Select => format!(
                "select '{}' in '{}'",
                self.param_str("value").unwrap_or(""),
                self.param_str("element_id").unwrap_or("")
            ),
            ActionKind::Wait => format!(
                "wait {}s",
                self.parameters
                    .get("seconds")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0)
            ),
            ActionKind::Stop => format!("stop: {}", self.param_str("reason").unwrap_or("")),
        }
    }
}

// ============================================================================
// Plan
// ============================================================================

/// The agent's single live intention. Replaced wholesale on every planning phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub text: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub next_step: String,
}

impl Plan {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}
