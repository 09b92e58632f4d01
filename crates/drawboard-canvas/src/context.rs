//! Plain-text summary of the canvas handed to drawing providers.

use std::fmt::Write;

use crate::action::{CANVAS_HEIGHT, CANVAS_WIDTH, DrawingAction};
use crate::event_log::CanvasEvent;

/// Padding around the drawn area in the "keep it connected" hint.
pub const CONTEXT_PAD: f64 = 200.0;

/// Axis-aligned bounds in canvas units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }
}

/// Bounds of everything drawn by `events`, grown by `pad` and clamped to the canvas.
pub fn bounding_box(events: &[CanvasEvent], pad: f64) -> Option<BoundingBox> {
    let mut bbox: Option<BoundingBox> = None;
    let mut add = |x: f64, y: f64| match bbox.as_mut() {
        Some(b) => b.include(x, y),
        None => {
            bbox = Some(BoundingBox {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            })
        }
    };

    for event in events {
        match &event.action {
            DrawingAction::Line { x1, y1, x2, y2, .. } => {
                add(*x1, *y1);
                add(*x2, *y2);
            }
            DrawingAction::Circle { x, y, r, .. } => {
                add(x - r, y - r);
                add(x + r, y + r);
            }
            DrawingAction::Rect { x, y, w, h, .. } => {
                add(*x, *y);
                add(x + w, y + h);
            }
            DrawingAction::Path { points, .. } => {
                for p in points {
                    add(p.x, p.y);
                }
            }
            DrawingAction::Clear => {}
        }
    }

    bbox.map(|b| BoundingBox {
        min_x: (b.min_x - pad).max(0.0),
        min_y: (b.min_y - pad).max(0.0),
        max_x: (b.max_x + pad).min(CANVAS_WIDTH),
        max_y: (b.max_y + pad).min(CANVAS_HEIGHT),
    })
}

/// Describe the visible drawing: only events after the last clear count,
/// and at most `max_items` of them are listed, newest first.
pub fn summarize(events: &[CanvasEvent], max_items: usize) -> String {
    let start = events
        .iter()
        .rposition(|e| matches!(e.action, DrawingAction::Clear))
        .map_or(0, |i| i + 1);
    let visible = &events[start..];
    if visible.is_empty() {
        return "(canvas is empty)".to_string();
    }

    let recent = &visible[visible.len().saturating_sub(max_items)..];
    let mut out = String::new();
    if let Some(b) = bounding_box(recent, CONTEXT_PAD) {
        let _ = writeln!(
            out,
            "Existing drawing occupies x {:.0}..{:.0}, y {:.0}..{:.0}. Keep new strokes connected to it.",
            b.min_x, b.max_x, b.min_y, b.max_y
        );
    }
    let _ = writeln!(
        out,
        "Recent strokes ({} of {}, newest first):",
        recent.len(),
        visible.len()
    );
    for event in recent.iter().rev() {
        let _ = writeln!(out, "- [{}] {}", event.agent_name, describe(&event.action));
    }
    out.truncate(out.trim_end().len());
    out
}

fn describe(action: &DrawingAction) -> String {
    match action {
        DrawingAction::Line {
            x1,
            y1,
            x2,
            y2,
            color,
            width,
        } => format!("line from ({x1:.0},{y1:.0}) to ({x2:.0},{y2:.0}) color={color} width={width}"),
        DrawingAction::Circle {
            x,
            y,
            r,
            color,
            fill,
            ..
        } => format!(
            "circle at ({x:.0},{y:.0}) r={r:.0} color={color}{}",
            if *fill { " filled" } else { "" }
        ),
        DrawingAction::Rect {
            x,
            y,
            w,
            h,
            color,
            fill,
            ..
        } => format!(
            "rect at ({x:.0},{y:.0}) size {w:.0}x{h:.0} color={color}{}",
            if *fill { " filled" } else { "" }
        ),
        DrawingAction::Path { points, color, .. } => {
            let (min_x, max_x) = span(points.iter().map(|p| p.x));
            let (min_y, max_y) = span(points.iter().map(|p| p.y));
            format!(
                "path with {} points, x {min_x:.0}..{max_x:.0}, y {min_y:.0}..{max_y:.0} color={color}",
                points.len()
            )
        }
        DrawingAction::Clear => "clear".to_string(),
    }
}

fn span(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}
