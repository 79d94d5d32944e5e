//! Where marks go on the watermark layer
//!
//! Positions are top-left corners in layer pixels and may be negative or past
//! the far edge; the compositor clips.

use crate::config::Placement;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Layer size needed so that rotating it by `degrees` still covers `page`
///
/// Unrotated layers are page-sized. Rotated layers are a square with the
/// page's diagonal as side, so no corner of the page is left uncovered.
pub fn layer_size(page: Size, degrees: f32) -> Size {
    if is_upright(degrees) {
        return page;
    }
    let diagonal = ((page.width as f64).powi(2) + (page.height as f64).powi(2))
        .sqrt()
        .ceil() as u32;
    Size::new(diagonal.max(page.width), diagonal.max(page.height))
}

/// Whether a rotation leaves the layer unchanged
pub fn is_upright(degrees: f32) -> bool {
    let turn = degrees.rem_euclid(360.0);
    turn < 1e-3 || 360.0 - turn < 1e-3
}

/// Top-left corner of a single mark anchored at `placement`
///
/// `margin` keeps the mark away from the edges it is anchored to.
pub fn anchor_position(placement: Placement, area: Size, mark: Size, margin: u32) -> (i32, i32) {
    let w = area.width as i64;
    let h = area.height as i64;
    let mw = mark.width as i64;
    let mh = mark.height as i64;
    let m = margin as i64;

    let left = m;
    let center_x = (w - mw) / 2;
    let right = w - mw - m;
    let top = m;
    let center_y = (h - mh) / 2;
    let bottom = h - mh - m;

    let (x, y) = match placement {
        Placement::TopLeft => (left, top),
        Placement::TopCenter => (center_x, top),
        Placement::TopRight => (right, top),
        Placement::CenterLeft => (left, center_y),
        Placement::Center => (center_x, center_y),
        Placement::CenterRight => (right, center_y),
        Placement::BottomLeft => (left, bottom),
        Placement::BottomCenter => (center_x, bottom),
        Placement::BottomRight => (right, bottom),
    };
    (to_i32(x), to_i32(y))
}

/// Grid of mark positions covering `area`
///
/// The step is the mark size plus `padding` on both axes. The grid starts one
/// step before the top-left corner and ends one step past the far edges, and
/// every other row is shifted left by half a step.
pub fn tile_positions(area: Size, mark: Size, padding: u32) -> Vec<(i32, i32)> {
    let step_x = (mark.width as i64 + padding as i64).max(1);
    let step_y = (mark.height as i64 + padding as i64).max(1);
    let end_x = area.width as i64 + step_x;
    let end_y = area.height as i64 + step_y;
    let stagger = step_x / 2;

    let mut positions = Vec::new();
    let mut y = -step_y;
    let mut row = 0;
    while y < end_y {
        let mut x = -step_x - if row % 2 == 1 { stagger } else { 0 };
        while x < end_x {
            positions.push((to_i32(x), to_i32(y)));
            x += step_x;
        }
        y += step_y;
        row += 1;
    }

    positions
}

/// Positions far off the layer are clamped; the compositor clips them anyway
fn to_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
