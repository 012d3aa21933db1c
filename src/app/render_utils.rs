use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

use crate::flow::NodeKind;

use super::NodeSizing;

pub(super) const ROOT_RADIUS: f32 = 30.0;
pub(super) const TERMINATION_RADIUS: f32 = 7.5;

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.center_top() + pan;

    let mut x = origin.x.rem_euclid(step);
    while x < rect.right() {
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
            Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70)),
        );
        x += step;
    }

    let mut y = origin.y.rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment(
            [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
            Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70)),
        );
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    !(max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom())
}

/// The world origin sits at the top center of the canvas; flows grow
/// downward from there.
pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center_top() + pan + world * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center_top() - pan) / zoom
}

fn normalize_log(value: u64, min: u64, max: u64) -> f32 {
    let min = min.max(1) as f64;
    let max = max.max(min as u64) as f64;
    let value = value.max(1) as f64;

    if (max - min).abs() < f64::EPSILON {
        return 0.5;
    }

    let denominator = max.ln() - min.ln();
    if denominator.abs() < f64::EPSILON {
        return 0.5;
    }

    ((value.ln() - min.ln()) / denominator).clamp(0.0, 1.0) as f32
}

pub(super) fn node_radius(
    sizing: NodeSizing,
    kind: NodeKind,
    is_group: bool,
    depth: usize,
    count: u64,
    max_count: u64,
) -> f32 {
    match kind {
        NodeKind::Root => ROOT_RADIUS,
        NodeKind::Termination => TERMINATION_RADIUS,
        NodeKind::Ordinary => match sizing {
            NodeSizing::Depth => {
                let base = (26.0 - (depth as f32 * 2.2)).clamp(11.0, 26.0);
                if is_group { base + 2.0 } else { base }
            }
            NodeSizing::Volume => 9.0 + (normalize_log(count, 1, max_count) * 23.0),
        },
    }
}

/// Repulsion weight fed into the n-body simulation. The root pushes the
/// starting row apart; terminations barely push at all.
pub(super) fn node_charge(kind: NodeKind, is_group: bool, base_radius: f32) -> f32 {
    match kind {
        NodeKind::Root => 9.0,
        NodeKind::Termination => 1.6,
        NodeKind::Ordinary => {
            if is_group {
                4.6
            } else {
                2.6 + (base_radius * 0.045)
            }
        }
    }
}

pub(super) fn node_fill(kind: NodeKind, is_group: bool, is_starting: bool) -> Color32 {
    match kind {
        NodeKind::Root => Color32::from_rgb(104, 128, 176),
        NodeKind::Termination => Color32::from_rgb(204, 92, 92),
        NodeKind::Ordinary => {
            if is_group {
                Color32::from_rgb(162, 118, 208)
            } else if is_starting {
                Color32::from_rgb(96, 178, 128)
            } else {
                Color32::from_rgb(86, 148, 210)
            }
        }
    }
}

pub(super) fn truncate_label(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_owned();
    }

    let mut truncated = name
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    truncated.push('…');
    truncated
}
