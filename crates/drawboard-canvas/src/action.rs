//! Drawing primitives and the validation gate every externally supplied
//! action passes before it reaches the event log.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canvas width in canvas units.
pub const CANVAS_WIDTH: f64 = 15000.0;
/// Canvas height in canvas units.
pub const CANVAS_HEIGHT: f64 = 8000.0;

const ACTION_KINDS: [&str; 5] = ["line", "circle", "rect", "path", "clear"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A single drawing command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawingAction {
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        #[serde(default = "default_color")]
        color: String,
        #[serde(default = "default_width")]
        width: f64,
    },
    Circle {
        x: f64,
        y: f64,
        r: f64,
        #[serde(default = "default_color")]
        color: String,
        #[serde(default = "default_width")]
        width: f64,
        #[serde(default)]
        fill: bool,
    },
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        #[serde(default = "default_color")]
        color: String,
        #[serde(default = "default_width")]
        width: f64,
        #[serde(default)]
        fill: bool,
    },
    Path {
        points: Vec<Point>,
        #[serde(default = "default_color")]
        color: String,
        #[serde(default = "default_width")]
        width: f64,
        #[serde(default)]
        close: bool,
    },
    /// Full-canvas white-out.
    Clear,
}

fn default_color() -> String {
    "#000000".into()
}

fn default_width() -> f64 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown action type: {0}")]
    UnknownKind(String),

    #[error("malformed action: {0}")]
    Malformed(String),

    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },

    #[error("{field}={value} is outside the {CANVAS_WIDTH}x{CANVAS_HEIGHT} canvas")]
    OutOfBounds { field: &'static str, value: f64 },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("path needs at least one point")]
    EmptyPath,

    #[error("invalid color token: {0:?}")]
    InvalidColor(String),

    #[error("clearing the shared canvas is disabled")]
    ClearDisabled,
}

/// Parse and validate a raw JSON action.
pub fn validate(raw: &serde_json::Value) -> Result<DrawingAction, ValidationError> {
    let kind = raw
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| ValidationError::Malformed("missing \"type\" field".into()))?;
    if !ACTION_KINDS.contains(&kind) {
        return Err(ValidationError::UnknownKind(kind.to_string()));
    }

    let action: DrawingAction = serde_json::from_value(raw.clone())
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;
    action.validate()?;
    Ok(action)
}

impl DrawingAction {
    /// Check geometry, widths and colors against the canvas rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            DrawingAction::Line {
                x1,
                y1,
                x2,
                y2,
                color,
                width,
            } => {
                check_x("x1", *x1)?;
                check_y("y1", *y1)?;
                check_x("x2", *x2)?;
                check_y("y2", *y2)?;
                check_stroke(color, *width)
            }
            DrawingAction::Circle {
                x,
                y,
                r,
                color,
                width,
                ..
            } => {
                check_x("x", *x)?;
                check_y("y", *y)?;
                check_positive("r", *r)?;
                check_stroke(color, *width)
            }
            DrawingAction::Rect {
                x,
                y,
                w,
                h,
                color,
                width,
                ..
            } => {
                check_x("x", *x)?;
                check_y("y", *y)?;
                check_positive("w", *w)?;
                check_positive("h", *h)?;
                check_x("x+w", x + w)?;
                check_y("y+h", y + h)?;
                check_stroke(color, *width)
            }
            DrawingAction::Path {
                points,
                color,
                width,
                ..
            } => {
                if points.is_empty() {
                    return Err(ValidationError::EmptyPath);
                }
                for p in points {
                    check_x("points.x", p.x)?;
                    check_y("points.y", p.y)?;
                }
                check_stroke(color, *width)
            }
            DrawingAction::Clear => Ok(()),
        }
    }

    /// Wire tag of this action.
    pub fn kind(&self) -> &'static str {
        match self {
            DrawingAction::Line { .. } => "line",
            DrawingAction::Circle { .. } => "circle",
            DrawingAction::Rect { .. } => "rect",
            DrawingAction::Path { .. } => "path",
            DrawingAction::Clear => "clear",
        }
    }

    pub fn color(&self) -> Option<&str> {
        match self {
            DrawingAction::Line { color, .. }
            | DrawingAction::Circle { color, .. }
            | DrawingAction::Rect { color, .. }
            | DrawingAction::Path { color, .. } => Some(color),
            DrawingAction::Clear => None,
        }
    }

    /// White strokes act as an eraser on the shared canvas.
    pub fn is_eraser(&self) -> bool {
        self.color()
            .map(|c| c.trim().to_ascii_lowercase())
            .is_some_and(|c| c == "#fff" || c == "#ffffff" || c == "white")
    }

    /// Where a pen drawing this action ends up.
    pub fn terminal_point(&self) -> Option<Point> {
        match self {
            DrawingAction::Line { x2, y2, .. } => Some(Point::new(*x2, *y2)),
            DrawingAction::Circle { x, y, .. } => Some(Point::new(*x, *y)),
            DrawingAction::Rect { x, y, w, h, .. } => Some(Point::new(x + w, y + h)),
            DrawingAction::Path { points, .. } => points.last().copied(),
            DrawingAction::Clear => None,
        }
    }

    /// Split a multi-point path into consecutive line segments. Anything else
    /// is returned unchanged.
    pub fn into_segments(self) -> Vec<DrawingAction> {
        match self {
            DrawingAction::Path {
                points,
                color,
                width,
                close,
            } if points.len() >= 2 => {
                let mut chain = points.clone();
                if close && points.len() >= 3 {
                    chain.push(points[0]);
                }
                chain
                    .windows(2)
                    .map(|pair| DrawingAction::Line {
                        x1: pair[0].x,
                        y1: pair[0].y,
                        x2: pair[1].x,
                        y2: pair[1].y,
                        color: color.clone(),
                        width,
                    })
                    .collect()
            }
            other => vec![other],
        }
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite { field })
    }
}

fn check_x(field: &'static str, value: f64) -> Result<(), ValidationError> {
    check_finite(field, value)?;
    if (0.0..=CANVAS_WIDTH).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfBounds { field, value })
    }
}

fn check_y(field: &'static str, value: f64) -> Result<(), ValidationError> {
    check_finite(field, value)?;
    if (0.0..=CANVAS_HEIGHT).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfBounds { field, value })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    check_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NonPositive { field, value })
    }
}

fn check_stroke(color: &str, width: f64) -> Result<(), ValidationError> {
    check_positive("width", width)?;
    if is_valid_color(color) {
        Ok(())
    } else {
        Err(ValidationError::InvalidColor(color.to_string()))
    }
}

/// `#rgb`, `#rrggbb`, `#rrggbbaa`, or a CSS color keyword.
pub fn is_valid_color(token: &str) -> bool {
    match token.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => {
            !token.is_empty() && token.len() <= 20 && token.chars().all(|c| c.is_ascii_alphabetic())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_line_defaults() {
        let action = validate(&json!({"type": "line", "x1": 0, "y1": 0, "x2": 100, "y2": 100}))
            .unwrap();
        assert_eq!(
            action,
            DrawingAction::Line {
                x1: 0.0,
                y1: 0.0,
                x2: 100.0,
                y2: 100.0,
                color: "#000000".into(),
                width: 2.0,
            }
        );
    }

    #[test]
    fn test_negative_radius_rejected() {
        let err = validate(&json!({"type": "circle", "x": 10, "y": 10, "r": -5})).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonPositive {
                field: "r",
                value: -5.0
            }
        );
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let err = validate(&json!({"type": "line", "x1": 0, "y1": 0, "x2": 15001, "y2": 10}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfBounds { field: "x2", .. }));

        let err = validate(&json!({"type": "line", "x1": 0, "y1": -1, "x2": 1, "y2": 1}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfBounds { field: "y1", .. }));
    }

    #[test]
    fn test_canvas_edges_are_inside() {
        assert!(validate(&json!({"type": "line", "x1": 0, "y1": 0, "x2": 15000, "y2": 8000}))
            .is_ok());
    }

    #[test]
    fn test_rect_must_fit() {
        let err = validate(&json!({"type": "rect", "x": 14900, "y": 0, "w": 200, "h": 10}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfBounds { field: "x+w", .. }));
        assert!(validate(&json!({"type": "rect", "x": 10, "y": 10, "w": 0, "h": 10})).is_err());
    }

    #[test]
    fn test_zero_width_rejected() {
        let err = validate(&json!({"type": "line", "x1": 0, "y1": 0, "x2": 1, "y2": 1, "width": 0}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::NonPositive { field: "width", .. }));
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = validate(&json!({"type": "path", "points": []})).unwrap_err();
        assert_eq!(err, ValidationError::EmptyPath);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = validate(&json!({"type": "triangle"})).unwrap_err();
        assert_eq!(err, ValidationError::UnknownKind("triangle".into()));
        assert!(matches!(
            validate(&json!({"x": 1})).unwrap_err(),
            ValidationError::Malformed(_)
        ));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let err = validate(&json!({"type": "circle", "x": 1, "y": 1})).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }

    #[test]
    fn test_non_finite_rejected() {
        let action = DrawingAction::Circle {
            x: f64::NAN,
            y: 1.0,
            r: 1.0,
            color: "#000".into(),
            width: 1.0,
            fill: false,
        };
        assert_eq!(
            action.validate().unwrap_err(),
            ValidationError::NonFinite { field: "x" }
        );
    }

    #[test]
    fn test_color_tokens() {
        assert!(is_valid_color("#fff"));
        assert!(is_valid_color("#FF00aa"));
        assert!(is_valid_color("#ff00aa80"));
        assert!(is_valid_color("rebeccapurple"));
        assert!(!is_valid_color("#ff00a"));
        assert!(!is_valid_color("#gggggg"));
        assert!(!is_valid_color("rgb(1,2,3)"));
        assert!(!is_valid_color(""));
    }

    #[test]
    fn test_clear_parses() {
        assert_eq!(validate(&json!({"type": "clear"})).unwrap(), DrawingAction::Clear);
    }

    #[test]
    fn test_terminal_points() {
        let path = DrawingAction::Path {
            points: vec![Point::new(1.0, 2.0), Point::new(30.0, 40.0)],
            color: "#000".into(),
            width: 2.0,
            close: false,
        };
        assert_eq!(path.terminal_point(), Some(Point::new(30.0, 40.0)));

        let rect = DrawingAction::Rect {
            x: 10.0,
            y: 20.0,
            w: 5.0,
            h: 6.0,
            color: "#000".into(),
            width: 1.0,
            fill: true,
        };
        assert_eq!(rect.terminal_point(), Some(Point::new(15.0, 26.0)));
        assert_eq!(DrawingAction::Clear.terminal_point(), None);
    }

    #[test]
    fn test_into_segments_closes_shape() {
        let path = DrawingAction::Path {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
            ],
            color: "#123456".into(),
            width: 4.0,
            close: true,
        };
        let segments = path.into_segments();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2].terminal_point(), Some(Point::new(0.0, 0.0)));
        assert!(segments.iter().all(|s| s.color() == Some("#123456")));
    }

    #[test]
    fn test_eraser_detection() {
        let line = |color: &str| DrawingAction::Line {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
            color: color.into(),
            width: 2.0,
        };
        assert!(line("#FFFFFF").is_eraser());
        assert!(line("#fff").is_eraser());
        assert!(!line("#000").is_eraser());
        assert!(!DrawingAction::Clear.is_eraser());
    }
}
