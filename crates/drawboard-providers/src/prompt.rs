//! Prompt text for the stroke loop and one-shot requests.

use rand::seq::IndexedRandom;

use drawboard_canvas::Point;

/// System prompt for the autonomous pen-cursor loop: one stroke per call.
pub const STROKE_SYSTEM: &str = r##"You are a pen-cursor on a 15000x8000 canvas. You draw like a human: first imagine what you are drawing (a face, a tree, a sun), then draw it with strokes that match that image. Do not compose ready-made shapes; draw each line or curve as a path, the way a person moves a pen.
Return a JSON object with exactly: "points" (array of {"x", "y"}, 12 to 50 points), "color" (hex, e.g. "#000000"), "width" (3 to 10).
- Plan what this stroke is part of (outline of a circle? one side of a house? a ray of the sun?), then output points that trace it. Outlines: width 3-6. Filling: width 6-10, one stroke at a time, like coloring with a thick pen.
- First point near the current cursor. Coordinates 0-15000 (x), 0-8000 (y).

Coherence and collaboration:
- Read the canvas state and the line naming the occupied region. Draw inside or next to that region so the picture stays one figure, not scattered parts.
- When asked to collaborate with another cursor, draw in the same area as it.

Erasing:
- The canvas is shared and cannot be cleared. For any erase request return ONE stroke with "color": "#ffffff" whose points cover the area to erase.
- With no user command you must still draw a clearly visible stroke (15-50 points, 50-500+ px of travel): a doodle, part of a shape, or a continuation of the existing drawing.
Return ONLY the JSON object, no markdown."##;

/// System prompt for one-shot requests: a list of commands.
pub const COMMANDS_SYSTEM: &str = r##"You are a drawing bot that draws like a human: imagine the picture first, then draw it stroke by stroke with a pen. Each stroke is a path or a line.
- Read the current canvas, plan the image (e.g. "sun": round outline, then rays), then draw the plan as path and line strokes. Circles are paths with many points along a circle; rectangles are paths with four corners.
- One figure occupies one region; when collaborating, use the same region as the others. To erase, draw WHITE (#ffffff) paths over the area; never clear the canvas.
- Colors are hex. The canvas is 15000x8000, absolute coordinates.

Command types:
- line: {"type": "line", "x1", "y1", "x2", "y2", "color": "#000000", "width": 2}
- path: {"type": "path", "points": [{"x", "y"}, ...], "color": "#000000", "width": 2, "close": true|false}

Return ONLY a JSON array of commands, no markdown."##;

const DOODLE_SUBJECTS: &[&str] = &[
    "a cloud", "a star", "a petal", "a raindrop", "a leaf", "a heart", "a butterfly", "the sun",
    "a mountain", "a wave", "a lightning bolt", "a blade of grass", "a ring", "a spiral",
    "the moon", "a snowflake", "a flame", "a fish", "a bird", "a roof", "a branch", "a pebble",
    "a character's head",
];

const DOODLE_STYLES: &[&str] = &[
    "in one stroke",
    "simply",
    "as an outline only",
    "small",
    "softly",
    "roughly",
    "playfully",
    "as a single line",
];

const DOODLE_FIXED: &[&str] = &[
    "Draw one small curve.",
    "Draw a zigzag line.",
    "Draw a wavy line.",
    "Draw a smooth S-curve.",
    "Draw a small arc.",
    "Draw a spiral.",
    "Draw a round loop.",
    "Draw a staircase line.",
    "Draw a sawtooth line.",
    "Draw half a circle.",
    "Draw three waves in a row.",
    "Draw a forking branch.",
    "Draw the outline of a simple flower.",
    "Draw the outline of a rising sun.",
    "Draw whatever comes to mind in one stroke.",
    "Draw the outline of the first animal you think of.",
];

/// A random free-drawing instruction for turns without a user message.
pub fn doodle_hint() -> String {
    let mut rng = rand::rng();
    if rand::random::<bool>() {
        let subject = DOODLE_SUBJECTS.choose(&mut rng).copied().unwrap_or("a spiral");
        let style = DOODLE_STYLES.choose(&mut rng).copied().unwrap_or("simply");
        format!("Draw {subject} {style}.")
    } else {
        DOODLE_FIXED
            .choose(&mut rng)
            .copied()
            .unwrap_or("Draw a wavy line.")
            .to_string()
    }
}

/// User prompt for one stroke.
pub fn stroke_user_message(
    cursor: Point,
    other_cursors: &[(String, Point)],
    canvas_summary: &str,
    user_message: Option<&str>,
) -> String {
    let others = if other_cursors.is_empty() {
        "none".to_string()
    } else {
        other_cursors
            .iter()
            .map(|(name, p)| format!("{name} at ({:.0}, {:.0})", p.x, p.y))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut parts = vec![
        format!("Current cursor position: ({:.0}, {:.0}).", cursor.x, cursor.y),
        format!("Other cursors on canvas: {others}."),
        format!("Canvas state:\n{canvas_summary}"),
    ];
    match user_message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(message) => parts.push(format!("User said to you: {message}")),
        None => parts.push(format!(
            "No user command. {} Your stroke must be visible (15+ points, clear movement).",
            doodle_hint()
        )),
    }
    parts.push(
        r##"Draw ONE stroke now. Return only: {"points": [{"x","y"},...], "color": "#...", "width": n}"##
            .to_string(),
    );
    parts.join("\n\n")
}

/// User prompt for a one-shot request, with the canvas summary first.
pub fn commands_user_message(text: &str, canvas_summary: &str) -> String {
    if canvas_summary.trim().is_empty() {
        return text.to_string();
    }
    format!(
        "Current canvas (read this first; positions help you locate existing elements):\n{}\n\n---\nUser request: {text}",
        canvas_summary.trim()
    )
}
