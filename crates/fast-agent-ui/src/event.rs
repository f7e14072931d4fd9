use std::path::PathBuf;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Token accounting reported by the agent for one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

/// One tool invocation requested by the model during an action step.
///
/// `arguments` is either a JSON string or a JSON object; anything else is
/// rendered by stringifying it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanningStep {
    pub plan: String,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
    /// Wall-clock seconds spent on the step.
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub step_number: u32,
    #[serde(default)]
    pub model_output: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Raw execution log text, usually prefixed with `Execution logs:`.
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub observation_images: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswerStep {
    pub output: TypedAnswer,
}

/// Final output of a run, typed by media kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TypedAnswer {
    Text(String),
    Image(PathBuf),
    Audio(PathBuf),
    Other(Value),
}

impl TypedAnswer {
    /// Returns the answer as display text (paths for media answers).
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Image(path) | Self::Audio(path) => path.display().to_string(),
            Self::Other(Value::String(text)) => text.clone(),
            Self::Other(value) => value.to_string(),
        }
    }
}

/// One discrete unit of agent progress.
///
/// `Unsupported` carries step kinds decoded from the wire that this front end
/// does not know how to render; classifying one fails the turn.
#[derive(Clone, Debug, PartialEq)]
pub enum StepEvent {
    Planning(PlanningStep),
    Action(ActionStep),
    FinalAnswer(FinalAnswerStep),
    Unsupported { kind: String, payload: Value },
}

impl StepEvent {
    /// Returns the wire tag of this step kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::Planning(_) => "planning",
            Self::Action(_) => "action",
            Self::FinalAnswer(_) => "final_answer",
            Self::Unsupported { kind, .. } => kind,
        }
    }

    /// Decodes a `"type"`-tagged JSON object. Unknown tags become `Unsupported`.
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        let kind = take_type_tag(&mut value)?;
        match kind.as_str() {
            "planning" => Ok(Self::Planning(serde_json::from_value(value)?)),
            "action" => Ok(Self::Action(serde_json::from_value(value)?)),
            "final_answer" => Ok(Self::FinalAnswer(serde_json::from_value(value)?)),
            _ => Ok(Self::Unsupported {
                kind,
                payload: value,
            }),
        }
    }
}

impl<'de> Deserialize<'de> for StepEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

impl From<PlanningStep> for StepEvent {
    fn from(step: PlanningStep) -> Self {
        Self::Planning(step)
    }
}

impl From<ActionStep> for StepEvent {
    fn from(step: ActionStep) -> Self {
        Self::Action(step)
    }
}

impl From<FinalAnswerStep> for StepEvent {
    fn from(step: FinalAnswerStep) -> Self {
        Self::FinalAnswer(step)
    }
}

/// A partial, not-yet-finalized text chunk streamed before a step completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDelta {
    pub fragment: String,
}

impl TextDelta {
    pub fn new(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
        }
    }
}

/// Item of an agent event stream: step events interleaved with text deltas.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentEvent {
    Step(StepEvent),
    Delta(TextDelta),
}

impl AgentEvent {
    pub fn delta(fragment: impl Into<String>) -> Self {
        Self::Delta(TextDelta::new(fragment))
    }

    /// Decodes a `"type"`-tagged JSON object; `"delta"` is a text delta, every
    /// other tag is a step event.
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if value.get("type").and_then(Value::as_str) == Some("delta") {
            take_type_tag(&mut value)?;
            return Ok(Self::Delta(serde_json::from_value(value)?));
        }
        StepEvent::from_value(value).map(Self::Step)
    }
}

impl<'de> Deserialize<'de> for AgentEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

impl From<StepEvent> for AgentEvent {
    fn from(step: StepEvent) -> Self {
        Self::Step(step)
    }
}

impl From<PlanningStep> for AgentEvent {
    fn from(step: PlanningStep) -> Self {
        Self::Step(step.into())
    }
}

impl From<ActionStep> for AgentEvent {
    fn from(step: ActionStep) -> Self {
        Self::Step(step.into())
    }
}

impl From<FinalAnswerStep> for AgentEvent {
    fn from(step: FinalAnswerStep) -> Self {
        Self::Step(step.into())
    }
}

impl From<TextDelta> for AgentEvent {
    fn from(delta: TextDelta) -> Self {
        Self::Delta(delta)
    }
}

fn take_type_tag(value: &mut Value) -> Result<String, serde_json::Error> {
    let Some(object) = value.as_object_mut() else {
        return Err(serde_json::Error::custom("agent event must be a JSON object"));
    };
    match object.remove("type") {
        Some(Value::String(kind)) => Ok(kind),
        Some(_) => Err(serde_json::Error::custom("`type` tag must be a string")),
        None => Err(serde_json::Error::custom("missing `type` tag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_action_step_with_defaults() {
        let event: AgentEvent = serde_json::from_value(json!({
            "type": "action",
            "step_number": 2,
            "tool_calls": [{"name": "add", "arguments": {"a": 1, "b": 2}}]
        }))
        .expect("action step");

        let AgentEvent::Step(StepEvent::Action(step)) = event else {
            panic!("expected action step");
        };
        assert_eq!(step.step_number, 2);
        assert_eq!(step.tool_calls[0].name, "add");
        assert!(step.observation_images.is_empty());
        assert_eq!(step.token_usage, None);
    }

    #[test]
    fn decodes_delta_and_final_answer() {
        let delta: AgentEvent =
            serde_json::from_value(json!({"type": "delta", "fragment": "Hel"})).expect("delta");
        assert_eq!(delta, AgentEvent::delta("Hel"));

        let answer: AgentEvent = serde_json::from_value(json!({
            "type": "final_answer",
            "output": {"kind": "image", "value": "out/plot.png"}
        }))
        .expect("final answer");
        assert_eq!(
            answer,
            AgentEvent::Step(StepEvent::FinalAnswer(FinalAnswerStep {
                output: TypedAnswer::Image(PathBuf::from("out/plot.png")),
            }))
        );
    }

    #[test]
    fn unknown_step_tag_decodes_as_unsupported() {
        let step: StepEvent =
            serde_json::from_value(json!({"type": "memory_step", "note": "x"})).expect("step");
        assert_eq!(step.kind(), "memory_step");
        assert!(matches!(step, StepEvent::Unsupported { payload, .. } if payload["note"] == "x"));
    }

    #[test]
    fn missing_tag_is_a_decode_error() {
        let result: Result<AgentEvent, _> = serde_json::from_value(json!({"plan": "p"}));
        let err = result.expect_err("untagged event must fail");
        assert!(err.to_string().contains("missing `type` tag"));
    }

    #[test]
    fn other_answer_stringifies_non_string_values() {
        assert_eq!(
            TypedAnswer::Other(json!({"total": 3})).to_display_string(),
            r#"{"total":3}"#
        );
        assert_eq!(TypedAnswer::Other(json!("plain")).to_display_string(), "plain");
    }
}
