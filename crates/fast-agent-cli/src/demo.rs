use fast_agent_ui::{AgentError, Script};

/// Built-in agent used when no `--script` is given.
const DEMO_SCRIPT: &str = r#"{
  "name": "math_agent",
  "description": "Demo agent that adds numbers with a code tool",
  "stream_outputs": false,
  "event_delay_ms": 60,
  "tools": [
    {"name": "add", "description": "Adds two integers"},
    {"name": "python_interpreter", "description": "Runs Python code"}
  ],
  "turns": [
    [
      {"type": "planning", "plan": "1. Add the numbers with the code tool.\n2. Report the sum.",
       "token_usage": {"input_tokens": 1320, "output_tokens": 42}, "duration": 0.81},
      {"type": "delta", "fragment": "Thought: I will "},
      {"type": "delta", "fragment": "call add "},
      {"type": "delta", "fragment": "from code."},
      {"type": "action", "step_number": 1,
       "model_output": "Thought: I will call add from code.\n```py\nresult = add(1, 2)\nprint(result)\n```<end_code>",
       "tool_calls": [{"name": "python_interpreter",
                       "arguments": "```py\nresult = add(1, 2)\nprint(result)\n```<end_code>"}],
       "observations": "Execution logs:\n3",
       "token_usage": {"input_tokens": 2048, "output_tokens": 57}, "duration": 1.5},
      {"type": "final_answer", "output": {"kind": "text", "value": "3"}}
    ],
    [
      {"type": "delta", "fragment": "Thought: the answer is known."},
      {"type": "action", "step_number": 1,
       "tool_calls": [{"name": "final_answer", "arguments": {"answer": "Done."}}],
       "duration": 0.4},
      {"type": "final_answer", "output": {"kind": "text", "value": "Done."}}
    ]
  ]
}"#;

pub fn demo_script() -> Result<Script, AgentError> {
    Script::from_json_str(DEMO_SCRIPT)
}
