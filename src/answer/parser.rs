//! Answer response parsing
//!
//! Models asked for JSON do not always send bare JSON: replies arrive
//! wrapped in code fences or with prose around the object. The parser
//! locates the first complete top-level object by brace matching (string
//! and escape aware) and reads `answer` / `reasoning_steps` from it.

use serde_json::Value;

use super::GeneratedAnswer;
use crate::errors::{BenchError, Result};
use crate::types::Configuration;

/// Interpret a raw model reply for `configuration`.
///
/// The reasoning configuration requires both fields. The others accept a
/// plain-text reply as the answer when no JSON object is present.
pub fn parse_answer(configuration: Configuration, raw: &str) -> Result<GeneratedAnswer> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(BenchError::MalformedResponse("empty reply".to_string()));
    }

    let object = find_json_object(raw).and_then(|(start, end)| {
        serde_json::from_str::<Value>(&raw[start..=end])
            .ok()
            .filter(Value::is_object)
    });

    match object {
        Some(object) => from_object(configuration, &object),
        None if configuration.expects_reasoning() => Err(BenchError::MalformedResponse(
            "reasoning reply is not a JSON object".to_string(),
        )),
        None => Ok(GeneratedAnswer {
            answer: raw.to_string(),
            reasoning_steps: None,
        }),
    }
}

fn from_object(configuration: Configuration, object: &Value) -> Result<GeneratedAnswer> {
    let answer = object
        .get("answer")
        .and_then(text_field)
        .filter(|answer| !answer.trim().is_empty())
        .ok_or_else(|| BenchError::MalformedResponse("reply has no 'answer' field".to_string()))?;

    let reasoning_steps = object.get("reasoning_steps").and_then(text_field);
    if configuration.expects_reasoning() && reasoning_steps.is_none() {
        return Err(BenchError::MalformedResponse(
            "reply has no 'reasoning_steps' field".to_string(),
        ));
    }

    Ok(GeneratedAnswer {
        answer,
        reasoning_steps: if configuration.expects_reasoning() {
            reasoning_steps
        } else {
            None
        },
    })
}

/// Strings as-is; arrays of steps joined by newlines
fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let steps: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            Some(steps.join("\n"))
        }
        _ => None,
    }
}

/// Byte range of the first complete top-level `{...}` in `text`
fn find_json_object(text: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if in_string {
            match ch {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if start.is_some() => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| (s, i));
                }
            }
            _ => {}
        }
    }

    None
}
