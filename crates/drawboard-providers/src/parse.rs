//! Turning model output into drawing actions.
//!
//! Models wrap JSON in code fences, add trailing commas, or answer with a
//! command list where a single stroke was asked for. Parsing is lenient
//! about all of that; geometry is checked later when the action is appended.

use serde_json::Value;

use drawboard_canvas::{DrawingAction, Point};

use crate::error::{ProviderError, excerpt};

/// Remove a surrounding Markdown code fence, with or without a language tag.
pub fn strip_fences(text: &str) -> &str {
    let mut body = text.trim();
    if body.starts_with("```") {
        body = match body.split_once('\n') {
            Some((_, rest)) => rest,
            None => &body[3..],
        };
    }
    if let Some(stripped) = body.trim_end().strip_suffix("```") {
        body = stripped;
    }
    body.trim()
}

/// Parse JSON strictly, then as JSON5.
pub fn parse_json(text: &str) -> Result<Value, ProviderError> {
    let body = strip_fences(text);
    serde_json::from_str::<Value>(body)
        .or_else(|_| json5::from_str(body))
        .map_err(|e| {
            ProviderError::MalformedResponse(format!(
                "not JSON ({e}); response starts with {:?}",
                excerpt(body, 120)
            ))
        })
}

/// Interpret a single-stroke answer.
///
/// Accepted shapes: `{points, color?, width?}`, a tagged action object, or an
/// array whose first element is a `path` or `line`.
pub fn parse_stroke(text: &str) -> Result<DrawingAction, ProviderError> {
    let value = parse_json(text)?;
    match &value {
        Value::Object(map) if map.get("points").is_some_and(has_items) => bare_stroke(&value),
        Value::Object(map) if map.contains_key("type") => tagged(value.clone()),
        Value::Array(items) => match items.first() {
            Some(first) if first.get("type").and_then(Value::as_str) == Some("path") => {
                bare_stroke(first)
            }
            Some(first) if first.get("type").and_then(Value::as_str) == Some("line") => {
                tagged(first.clone())
            }
            _ => Err(no_stroke()),
        },
        _ => Err(no_stroke()),
    }
}

/// Interpret a one-shot answer as a list of raw commands. Each command still
/// has to pass validation.
pub fn parse_commands(text: &str) -> Result<Vec<Value>, ProviderError> {
    match parse_json(text)? {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("commands") {
            Some(Value::Array(items)) => Ok(items),
            _ => Ok(vec![Value::Object(map)]),
        },
        _ => Err(ProviderError::MalformedResponse(
            "expected a JSON array of commands".into(),
        )),
    }
}

fn has_items(v: &Value) -> bool {
    v.as_array().is_some_and(|a| !a.is_empty())
}

fn no_stroke() -> ProviderError {
    ProviderError::MalformedResponse("AI did not return a valid stroke".into())
}

fn bare_stroke(value: &Value) -> Result<DrawingAction, ProviderError> {
    let points: Vec<Point> = value
        .get("points")
        .cloned()
        .map(serde_json::from_value::<Vec<Point>>)
        .transpose()
        .map_err(|e| ProviderError::MalformedResponse(format!("bad points: {e}")))?
        .unwrap_or_default();
    if points.is_empty() {
        return Err(no_stroke());
    }

    Ok(DrawingAction::Path {
        points,
        color: value
            .get("color")
            .and_then(Value::as_str)
            .unwrap_or("#000000")
            .to_string(),
        width: value.get("width").and_then(Value::as_f64).unwrap_or(2.0),
        close: value.get("close").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn tagged(value: Value) -> Result<DrawingAction, ProviderError> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::MalformedResponse(format!("bad action: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_fences("  [1]  "), "[1]");
    }

    #[test]
    fn test_bare_stroke() {
        let action = parse_stroke(
            r##"{"points": [{"x": 10, "y": 20}, {"x": 30, "y": 40}], "color": "#ff0000", "width": 5}"##,
        )
        .unwrap();
        assert_eq!(
            action,
            DrawingAction::Path {
                points: vec![Point::new(10.0, 20.0), Point::new(30.0, 40.0)],
                color: "#ff0000".into(),
                width: 5.0,
                close: false,
            }
        );
    }

    #[test]
    fn test_bare_stroke_defaults_and_fence() {
        let action = parse_stroke("```json\n{\"points\": [{\"x\": 1, \"y\": 2}]}\n```").unwrap();
        assert_eq!(action.color(), Some("#000000"));
        assert!(matches!(action, DrawingAction::Path { width, .. } if width == 2.0));
    }

    #[test]
    fn test_array_with_line_first() {
        let action =
            parse_stroke(r#"[{"type": "line", "x1": 0, "y1": 0, "x2": 100, "y2": 100}, {"type": "path"}]"#)
                .unwrap();
        assert_eq!(action.kind(), "line");
        assert_eq!(action.terminal_point(), Some(Point::new(100.0, 100.0)));
    }

    #[test]
    fn test_array_with_path_first() {
        let action =
            parse_stroke(r#"[{"type": "path", "points": [{"x": 5, "y": 5}], "width": 4}]"#).unwrap();
        assert_eq!(action.kind(), "path");
    }

    #[test]
    fn test_tagged_object() {
        let action =
            parse_stroke(r#"{"type": "circle", "x": 50, "y": 50, "r": 10}"#).unwrap();
        assert_eq!(action.kind(), "circle");
    }

    #[test]
    fn test_json5_tolerated() {
        let action = parse_stroke("{points: [{x: 1, y: 2},], color: '#00ff00',}").unwrap();
        assert_eq!(action.color(), Some("#00ff00"));
    }

    #[test]
    fn test_rejects_prose_and_empty() {
        assert!(matches!(
            parse_stroke("Sure! Here is a lovely sun."),
            Err(ProviderError::MalformedResponse(_))
        ));
        assert!(parse_stroke(r#"{"points": []}"#).is_err());
        assert!(parse_stroke("[]").is_err());
        assert!(parse_stroke(r#"[{"type": "circle", "x": 1, "y": 1, "r": 1}]"#).is_err());
    }

    #[test]
    fn test_parse_commands() {
        let cmds = parse_commands(r#"[{"type": "line"}, {"type": "clear"}]"#).unwrap();
        assert_eq!(cmds.len(), 2);

        let cmds = parse_commands(r#"{"commands": [{"type": "path"}]}"#).unwrap();
        assert_eq!(cmds.len(), 1);

        let cmds = parse_commands(r#"{"type": "line"}"#).unwrap();
        assert_eq!(cmds[0]["type"], "line");

        assert!(parse_commands("42").is_err());
    }
}
