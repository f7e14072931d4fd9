//! Step classification: one agent step event in, an ordered list of transcript
//! messages out. Everything here is pure; the session controller decides when
//! the produced messages are appended.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::errors::ClassifyError;
use crate::event::{ActionStep, PlanningStep, StepEvent, TokenUsage, ToolCall, TypedAnswer};
use crate::transcript::TranscriptMessage;

/// Tool whose arguments are source code and get rendered as a code block.
pub const CODE_TOOL_NAME: &str = "python_interpreter";
/// Message closing every planning and action step.
pub const STEP_SEPARATOR: &str = "-----";
pub const PLANNING_LABEL: &str = "Planning step";

static FENCE_THEN_END_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```\s*<end_code>").expect("static pattern"));
static END_CODE_THEN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<end_code>\s*```").expect("static pattern"));
static FENCE_NEWLINE_END_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```\s*\n\s*<end_code>").expect("static pattern"));
static FENCE_OPENER: Lazy<Regex> = Lazy::new(|| Regex::new(r"```.*?\n").expect("static pattern"));
static END_CODE_PADDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*<end_code>\s*").expect("static pattern"));
static EXECUTION_LOG_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Execution logs:\s*").expect("static pattern"));

/// Maps one step event to the transcript messages that render it.
///
/// `suppress_model_text` is set when the agent already streamed its model
/// output as deltas, so headers and model text are not shown twice.
pub fn classify(
    step: &StepEvent,
    suppress_model_text: bool,
) -> Result<Vec<TranscriptMessage>, ClassifyError> {
    match step {
        StepEvent::Planning(planning) => Ok(planning_messages(planning, suppress_model_text)),
        StepEvent::Action(action) => Ok(action_messages(action, suppress_model_text)),
        StepEvent::FinalAnswer(answer) => Ok(vec![final_answer_message(&answer.output)]),
        StepEvent::Unsupported { kind, .. } => Err(ClassifyError::UnsupportedStepKind {
            kind: kind.clone(),
        }),
    }
}

fn planning_messages(step: &PlanningStep, suppress_model_text: bool) -> Vec<TranscriptMessage> {
    let mut messages = Vec::with_capacity(4);
    if !suppress_model_text {
        messages.push(TranscriptMessage::assistant(PLANNING_LABEL));
        messages.push(TranscriptMessage::assistant(step.plan.clone()));
    }
    messages.push(TranscriptMessage::assistant(step_footnote(
        PLANNING_LABEL,
        step.token_usage.as_ref(),
        step.duration,
    )));
    messages.push(TranscriptMessage::assistant(STEP_SEPARATOR));
    messages
}

fn action_messages(step: &ActionStep, suppress_model_text: bool) -> Vec<TranscriptMessage> {
    let label = format!("Step {}", step.step_number);
    let mut messages = Vec::new();

    if !suppress_model_text {
        messages.push(TranscriptMessage::assistant(label.clone()));
        if let Some(output) = step.model_output.as_deref().filter(|o| !o.is_empty()) {
            messages.push(TranscriptMessage::assistant(clean_model_output(output)));
        }
    }

    // Only the first call is shown even when the model requested several.
    if let Some(call) = step.tool_calls.first() {
        let mut content = tool_call_display(call);
        if call.name == CODE_TOOL_NAME {
            content = format_code_content(&content);
        }
        messages.push(
            TranscriptMessage::assistant(content).with_title(format!("Used tool {}", call.name)),
        );
    }

    // Execution logs are read but intentionally not rendered.
    if let Some(log) = execution_log(step) {
        debug!(
            event = "classify.execution_log_suppressed",
            domain = "classify",
            step_number = step.step_number,
            log_len = log.len() as u64
        );
    }

    for image in &step.observation_images {
        messages.push(
            TranscriptMessage::media(image.clone(), image_mime_type(image))
                .with_title("Output Image"),
        );
    }

    if let Some(error) = step.error.as_deref() {
        messages.push(TranscriptMessage::assistant(error).with_title("Error"));
    }

    messages.push(TranscriptMessage::assistant(step_footnote(
        &label,
        step.token_usage.as_ref(),
        step.duration,
    )));
    messages.push(TranscriptMessage::assistant(STEP_SEPARATOR));
    messages
}

fn final_answer_message(answer: &TypedAnswer) -> TranscriptMessage {
    match answer {
        TypedAnswer::Text(text) => TranscriptMessage::assistant(format!("Final answer:\n{text}\n")),
        TypedAnswer::Image(path) => {
            TranscriptMessage::media(path.display().to_string(), "image/png")
        }
        TypedAnswer::Audio(path) => {
            TranscriptMessage::media(path.display().to_string(), "audio/wav")
        }
        TypedAnswer::Other(_) => {
            TranscriptMessage::assistant(format!("Final answer: {}", answer.to_display_string()))
        }
    }
}

/// Builds the `<label> | Input tokens: .. | Output tokens: .. | Duration: ..s` line.
pub fn step_footnote(label: &str, usage: Option<&TokenUsage>, duration: Option<f64>) -> String {
    let mut footnote = label.to_string();
    if let Some(usage) = usage {
        footnote.push_str(&format!(
            " | Input tokens: {} | Output tokens: {}",
            group_thousands(usage.input_tokens),
            group_thousands(usage.output_tokens)
        ));
    }
    if let Some(seconds) = duration.and_then(format_duration) {
        footnote.push_str(&format!(" | Duration: {seconds}s"));
    }
    footnote
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index).is_multiple_of(3) {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Rounds to two decimals, keeping at least one fractional digit. Zero and
/// non-finite durations are not shown.
fn format_duration(seconds: f64) -> Option<String> {
    if seconds == 0.0 || !seconds.is_finite() {
        return None;
    }
    let rounded = (seconds * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        Some(format!("{rounded:.1}"))
    } else {
        Some(format!("{rounded}"))
    }
}

/// Trims model output and collapses `<end_code>` markers glued to a closing
/// code fence into a bare fence.
pub fn clean_model_output(model_output: &str) -> String {
    let cleaned = model_output.trim();
    let cleaned = FENCE_THEN_END_CODE.replace_all(cleaned, "```");
    let cleaned = END_CODE_THEN_FENCE.replace_all(&cleaned, "```");
    let cleaned = FENCE_NEWLINE_END_CODE.replace_all(&cleaned, "```");
    cleaned.trim().to_string()
}

/// Re-wraps code tool arguments as a `python` fenced block, dropping any
/// fences or `<end_code>` markers already present.
pub fn format_code_content(content: &str) -> String {
    let stripped = FENCE_OPENER.replace_all(content.trim(), "");
    let stripped = END_CODE_PADDED.replace_all(&stripped, "");
    let body = stripped.trim().trim_end_matches("```").trim_end();
    format!("```python\n{body}\n```")
}

fn tool_call_display(call: &ToolCall) -> String {
    match &call.arguments {
        Value::Object(arguments) => match arguments.get("answer") {
            Some(answer) => value_display(answer),
            None => call.arguments.to_string(),
        },
        other => value_display(other).trim().to_string(),
    }
}

fn value_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn execution_log(step: &ActionStep) -> Option<String> {
    let raw = step.observations.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(EXECUTION_LOG_PREFIX.replace(raw, "").into_owned())
}

fn image_mime_type(path: &str) -> String {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "png".to_string());
    format!("image/{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FinalAnswerStep;
    use crate::transcript::{MessageContent, MessageStatus};
    use serde_json::json;
    use std::path::PathBuf;

    fn texts(messages: &[TranscriptMessage]) -> Vec<&str> {
        messages.iter().filter_map(TranscriptMessage::text).collect()
    }

    fn action(tool_calls: Vec<ToolCall>) -> StepEvent {
        StepEvent::Action(ActionStep {
            step_number: 1,
            tool_calls,
            ..ActionStep::default()
        })
    }

    #[test]
    fn action_step_renders_only_first_tool_call() {
        let step = action(vec![
            ToolCall::new("add", json!({"answer": "3"})),
            ToolCall::new("multiply", json!({"answer": "9"})),
            ToolCall::new("divide", json!("1 / 0")),
        ]);
        let messages = classify(&step, false).expect("classify");

        let tool_messages: Vec<_> = messages
            .iter()
            .filter(|m| m.title.as_deref().is_some_and(|t| t.starts_with("Used tool")))
            .collect();
        assert_eq!(tool_messages.len(), 1);
        assert_eq!(tool_messages[0].title.as_deref(), Some("Used tool add"));
        assert_eq!(tool_messages[0].text(), Some("3"));
    }

    #[test]
    fn action_step_emits_header_tool_footnote_separator_in_order() {
        let messages = classify(&action(vec![ToolCall::new("add", json!({"answer": "3"}))]), false)
            .expect("classify");
        assert_eq!(texts(&messages), vec!["Step 1", "3", "Step 1", STEP_SEPARATOR]);
        assert!(messages.iter().all(|m| m.status == MessageStatus::Done));
    }

    #[test]
    fn tool_arguments_without_answer_stringify_whole_mapping() {
        let messages = classify(&action(vec![ToolCall::new("add", json!({"a": 1}))]), true)
            .expect("classify");
        assert_eq!(messages[0].text(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn string_tool_arguments_are_trimmed() {
        let messages = classify(&action(vec![ToolCall::new("search", json!("  rust  "))]), true)
            .expect("classify");
        assert_eq!(messages[0].text(), Some("rust"));
    }

    #[test]
    fn code_tool_arguments_become_python_block() {
        let code = "```py\nresult = add(1, 2)\nprint(result)\n```<end_code>";
        let messages = classify(&action(vec![ToolCall::new(CODE_TOOL_NAME, json!(code))]), true)
            .expect("classify");
        assert_eq!(
            messages[0].text(),
            Some("```python\nresult = add(1, 2)\nprint(result)\n```")
        );
    }

    #[test]
    fn suppressed_model_text_hides_header_and_model_output() {
        let step = StepEvent::Action(ActionStep {
            step_number: 4,
            model_output: Some("thinking".into()),
            ..ActionStep::default()
        });
        let messages = classify(&step, true).expect("classify");
        assert_eq!(texts(&messages), vec!["Step 4", STEP_SEPARATOR]);

        let messages = classify(&step, false).expect("classify");
        assert_eq!(
            texts(&messages),
            vec!["Step 4", "thinking", "Step 4", STEP_SEPARATOR]
        );
    }

    #[test]
    fn execution_logs_are_not_rendered() {
        let step = StepEvent::Action(ActionStep {
            step_number: 1,
            observations: Some("Execution logs:\n3".into()),
            ..ActionStep::default()
        });
        let messages = classify(&step, true).expect("classify");
        assert_eq!(messages.len(), 2);
        assert_eq!(
            execution_log(&ActionStep {
                observations: Some("Execution logs:\n3".into()),
                ..ActionStep::default()
            }),
            Some("3".to_string())
        );
    }

    #[test]
    fn observation_images_and_error_get_titled_messages() {
        let step = StepEvent::Action(ActionStep {
            step_number: 2,
            observation_images: vec!["plots/a.JPEG".into(), "plots/b".into()],
            error: Some("division by zero".into()),
            ..ActionStep::default()
        });
        let messages = classify(&step, true).expect("classify");

        assert_eq!(
            messages[0].content,
            MessageContent::Media {
                path: "plots/a.JPEG".into(),
                mime_type: "image/jpeg".into()
            }
        );
        assert_eq!(messages[0].title.as_deref(), Some("Output Image"));
        assert_eq!(
            messages[1].content,
            MessageContent::Media {
                path: "plots/b".into(),
                mime_type: "image/png".into()
            }
        );
        assert_eq!(messages[2].title.as_deref(), Some("Error"));
        assert_eq!(messages[2].text(), Some("division by zero"));
    }

    #[test]
    fn planning_step_messages() {
        let step = StepEvent::Planning(PlanningStep {
            plan: "1. add\n2. answer".into(),
            token_usage: Some(TokenUsage::new(1200, 34)),
            duration: Some(1.234),
        });
        let messages = classify(&step, false).expect("classify");
        assert_eq!(
            texts(&messages),
            vec![
                "Planning step",
                "1. add\n2. answer",
                "Planning step | Input tokens: 1,200 | Output tokens: 34 | Duration: 1.23s",
                STEP_SEPARATOR
            ]
        );

        let messages = classify(&step, true).expect("classify");
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn footnote_omits_absent_clauses() {
        let footnote = step_footnote("Step 3", None, None);
        assert_eq!(footnote, "Step 3");
        assert!(!footnote.contains("tokens"));
        assert!(!footnote.contains("Duration"));

        let footnote = step_footnote("Step 3", None, Some(0.0));
        assert!(!footnote.contains("Duration"));

        let footnote = step_footnote("Step 3", Some(&TokenUsage::new(5, 6)), Some(2.0));
        assert_eq!(
            footnote,
            "Step 3 | Input tokens: 5 | Output tokens: 6 | Duration: 2.0s"
        );
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn final_answer_variants() {
        let text = StepEvent::FinalAnswer(FinalAnswerStep {
            output: TypedAnswer::Text("42".into()),
        });
        assert_eq!(texts(&classify(&text, false).expect("text")), vec!["Final answer:\n42\n"]);

        let image = StepEvent::FinalAnswer(FinalAnswerStep {
            output: TypedAnswer::Image(PathBuf::from("out/chart.png")),
        });
        let messages = classify(&image, false).expect("image");
        assert_eq!(
            messages[0].content,
            MessageContent::Media {
                path: "out/chart.png".into(),
                mime_type: "image/png".into()
            }
        );

        let audio = StepEvent::FinalAnswer(FinalAnswerStep {
            output: TypedAnswer::Audio(PathBuf::from("out/a.mp3")),
        });
        assert!(matches!(
            &classify(&audio, true).expect("audio")[0].content,
            MessageContent::Media { mime_type, .. } if mime_type == "audio/wav"
        ));

        let other = StepEvent::FinalAnswer(FinalAnswerStep {
            output: TypedAnswer::Other(json!([1, 2])),
        });
        assert_eq!(texts(&classify(&other, false).expect("other")), vec!["Final answer: [1,2]"]);
    }

    #[test]
    fn unsupported_step_kind_fails() {
        let step = StepEvent::Unsupported {
            kind: "memory_step".into(),
            payload: json!({}),
        };
        assert_eq!(
            classify(&step, false),
            Err(ClassifyError::UnsupportedStepKind {
                kind: "memory_step".into()
            })
        );
    }

    #[test]
    fn cleaning_collapses_end_code_after_fence() {
        assert_eq!(
            clean_model_output("```python\nprint(1)\n```\n<end_code>"),
            "```python\nprint(1)\n```"
        );
        assert_eq!(clean_model_output("  x\n```<end_code>  "), "x\n```");
        assert_eq!(clean_model_output("x\n<end_code>```"), "x\n```");
        assert!(!clean_model_output("```\n  <end_code>").contains("<end_code>"));
    }
}
