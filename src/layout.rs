//! Layout value types for overlay positioning.
//!
//! Anchors and margins come straight from YAML config and resolve to the
//! pixel coordinates burned into filter-graph `overlay=` expressions, so
//! the arithmetic here must be exact.

use serde::Deserialize;

pub const BASE_WIDTH: u32 = 1920;
pub const BASE_HEIGHT: u32 = 1080;

/// Horizontal anchor component: a named edge or a literal pixel offset.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Horizontal {
    Named(HorizontalEdge),
    Offset(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalEdge {
    Left,
    Center,
    Right,
}

/// Vertical anchor component: a named edge or a literal pixel offset.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Vertical {
    Named(VerticalEdge),
    Offset(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalEdge {
    Top,
    Center,
    Bottom,
}

/// An overlay anchor, written in config as `[horizontal, vertical]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "AnchorRepr")]
pub struct Anchor {
    pub horizontal: Horizontal,
    pub vertical: Vertical,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnchorRepr {
    Pair(Horizontal, Vertical),
    Single(Horizontal),
}

impl From<AnchorRepr> for Anchor {
    fn from(repr: AnchorRepr) -> Self {
        match repr {
            AnchorRepr::Pair(horizontal, vertical) => Self {
                horizontal,
                vertical,
            },
            // A single value anchors both axes to the same named edge
            // where that makes sense; offsets repeat on both axes.
            AnchorRepr::Single(horizontal) => Self {
                horizontal,
                vertical: match horizontal {
                    Horizontal::Named(HorizontalEdge::Center) => {
                        Vertical::Named(VerticalEdge::Center)
                    }
                    Horizontal::Named(_) => Vertical::Named(VerticalEdge::Top),
                    Horizontal::Offset(value) => Vertical::Offset(value),
                },
            },
        }
    }
}

impl Anchor {
    pub fn new(horizontal: Horizontal, vertical: Vertical) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub fn bottom_right() -> Self {
        Self::new(
            Horizontal::Named(HorizontalEdge::Right),
            Vertical::Named(VerticalEdge::Bottom),
        )
    }
}

/// Four-sided spacing, constructible from CSS-style shorthand:
/// one value applies to all sides, two are `[vertical, horizontal]`,
/// three are `[top, horizontal, bottom]`, four are explicit
/// `[top, right, bottom, left]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "SpacingRepr")]
pub struct Spacing {
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub left: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpacingRepr {
    Uniform(i64),
    Shorthand(Vec<i64>),
}

impl From<SpacingRepr> for Spacing {
    fn from(repr: SpacingRepr) -> Self {
        match repr {
            SpacingRepr::Uniform(value) => Self::uniform(value),
            SpacingRepr::Shorthand(values) => Self::from_shorthand(&values),
        }
    }
}

impl Spacing {
    pub fn uniform(value: i64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    pub fn from_shorthand(values: &[i64]) -> Self {
        match *values {
            [] => Self::uniform(0),
            [all] => Self::uniform(all),
            [vertical, horizontal] => Self {
                top: vertical,
                right: horizontal,
                bottom: vertical,
                left: horizontal,
            },
            [top, horizontal, bottom] => Self {
                top,
                right: horizontal,
                bottom,
                left: horizontal,
            },
            [top, right, bottom, left, ..] => Self {
                top,
                right,
                bottom,
                left,
            },
        }
    }

    pub fn horizontal(&self) -> i64 {
        self.left + self.right
    }
}

impl Default for Spacing {
    fn default() -> Self {
        Self::uniform(0)
    }
}

/// Resolve an anchor and margin to the top-left pixel position for an
/// overlay of `width`x`height` on a `base_width`x`base_height` canvas.
pub fn calculate_position(
    anchor: Anchor,
    margin: Spacing,
    width: u32,
    height: u32,
    base_width: u32,
    base_height: u32,
) -> (i64, i64) {
    let x = match anchor.horizontal {
        Horizontal::Named(HorizontalEdge::Left) => margin.left,
        Horizontal::Named(HorizontalEdge::Center) => {
            ((f64::from(base_width) - f64::from(width)) / 2.0).round() as i64
        }
        Horizontal::Named(HorizontalEdge::Right) => {
            i64::from(base_width) - i64::from(width) - margin.right
        }
        Horizontal::Offset(offset) => offset + margin.left,
    };

    let y = match anchor.vertical {
        Vertical::Named(VerticalEdge::Top) => margin.top,
        Vertical::Named(VerticalEdge::Center) => {
            ((f64::from(base_height) - f64::from(height)) / 2.0).round() as i64
        }
        Vertical::Named(VerticalEdge::Bottom) => {
            i64::from(base_height) - i64::from(height) - margin.bottom
        }
        Vertical::Offset(offset) => offset + margin.top,
    };

    (x, y)
}

/// [`calculate_position`] against the fixed 1920x1080 render canvas.
pub fn calculate_base_position(
    anchor: Anchor,
    margin: Spacing,
    width: u32,
    height: u32,
) -> (i64, i64) {
    calculate_position(anchor, margin, width, height, BASE_WIDTH, BASE_HEIGHT)
}
