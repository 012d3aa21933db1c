use std::time::Instant;

use eframe::egui::{self, Align2, Color32, FontId, Sense, Stroke, Ui, Vec2, vec2};

use crate::flow::NodeKind;
use crate::util::{format_count, format_minutes};

use super::super::highlight::build_highlight_state_for_selected_id;
use super::super::physics::step_physics;
use super::super::render_utils::{
    blend_color, dim_color, draw_background, edge_visible, node_fill, screen_to_world,
    truncate_label, world_to_screen,
};
use super::super::{PhysicsConfig, ViewModel};

impl ViewModel {
    fn update_screen_space(
        rect: egui::Rect,
        pan: Vec2,
        zoom: f32,
        cache: &mut super::super::RenderGraph,
    ) {
        cache.view_scratch.screen_positions.clear();
        cache.view_scratch.screen_radii.clear();
        for render_node in &cache.nodes {
            cache.view_scratch.screen_positions.push(world_to_screen(
                rect,
                pan,
                zoom,
                render_node.world_pos,
            ));
            cache
                .view_scratch
                .screen_radii
                .push((render_node.base_radius * zoom.powf(0.40)).clamp(2.5, 52.0));
        }
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        if self.graph_dirty {
            self.rebuild_render_graph();
        }

        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        draw_background(&painter, rect, self.pan, self.zoom);

        self.handle_graph_zoom(ui, rect, &response);
        self.handle_graph_pan(&response);

        let pan = self.pan;
        let zoom = self.zoom;
        let interaction_active = response.dragged();
        let frame_delta_seconds = ui
            .ctx()
            .input(|input| input.stable_dt)
            .clamp(1.0 / 240.0, 1.0 / 20.0);
        let physics = PhysicsConfig {
            intensity: self.physics_intensity,
            link_scale: self.physics_link_scale,
            charge_scale: self.physics_charge_scale,
            collision_scale: self.physics_collision_scale,
            delta_seconds: frame_delta_seconds,
        };
        let settling = self
            .settle_until
            .is_some_and(|deadline| Instant::now() < deadline);

        let Some(cache) = self.graph_cache.as_mut() else {
            ui.label("No flow loaded.");
            return;
        };

        let mut physics_moving = false;
        if settling {
            physics_moving = step_physics(cache, physics);
            if !physics_moving {
                // Fully at rest: stop burning frames before the budget runs out.
                self.settle_until = None;
            }
        }

        if physics_moving || interaction_active {
            ui.ctx().request_repaint();
        }

        Self::update_screen_space(rect, pan, zoom, cache);
        Self::visible_indices_into(
            rect,
            &cache.view_scratch.screen_positions,
            &cache.view_scratch.screen_radii,
            &mut cache.view_scratch.visible_indices,
        );
        self.visible_node_count = cache.view_scratch.visible_indices.len();

        let hovered = Self::hovered_index(
            ui,
            &cache.view_scratch.visible_indices,
            &cache.view_scratch.screen_positions,
            &cache.view_scratch.screen_radii,
        );

        if hovered.is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
        }

        let mut pending_pin: Option<(String, (f32, f32))> = None;
        if response.drag_started_by(egui::PointerButton::Primary) {
            self.dragging = hovered
                .map(|(index, _distance)| index)
                .filter(|&index| Some(index) != cache.root_index);
        }
        if response.dragged_by(egui::PointerButton::Primary)
            && let Some(index) = self.dragging
            && let Some(pointer) = response.interact_pointer_pos()
            && let Some(node) = cache.nodes.get_mut(index)
        {
            let world = screen_to_world(rect, pan, zoom, pointer);
            node.world_pos = world;
            node.velocity = Vec2::ZERO;
            node.pinned = true;
            pending_pin = Some((node.id.clone(), (world.x, world.y)));
        }
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            self.dragging = None;
        }

        let pending_selection = if response.clicked_by(egui::PointerButton::Primary) {
            Some(hovered.and_then(|(index, _distance)| {
                cache.nodes.get(index).map(|node| node.id.clone())
            }))
        } else {
            None
        };

        let hovered_index = hovered.map(|(index, _distance)| index);
        let highlight = self
            .selected
            .as_ref()
            .and_then(|id| build_highlight_state_for_selected_id(&self.tree, cache, id));
        let selection_active = highlight.is_some();

        let zoom_sqrt = zoom.sqrt();
        let mut visible_edge_count = 0usize;
        for &(parent, child) in &cache.edges {
            if parent >= cache.nodes.len() || child >= cache.nodes.len() {
                continue;
            }

            let start = cache.view_scratch.screen_positions[parent];
            let end = cache.view_scratch.screen_positions[child];
            if !edge_visible(rect, start, end, 2.5) {
                continue;
            }

            let (on_root_path, to_child) = if let Some(state) = &highlight {
                (
                    state.root_path_edges.contains(&(parent, child)),
                    state.child_edges.contains(&(parent, child)),
                )
            } else {
                (false, false)
            };

            let (line_width, line_color) = if on_root_path {
                (
                    (3.3 * zoom_sqrt).clamp(1.7, 5.8),
                    Color32::from_rgb(246, 206, 104),
                )
            } else if to_child {
                (
                    (2.5 * zoom_sqrt).clamp(1.2, 4.4),
                    Color32::from_rgb(241, 146, 94),
                )
            } else if selection_active {
                (
                    (0.82 * zoom_sqrt).clamp(0.45, 2.0),
                    Color32::from_rgba_unmultiplied(80, 90, 104, 150),
                )
            } else {
                (
                    (1.18 * zoom_sqrt).clamp(0.60, 3.4),
                    Color32::from_rgba_unmultiplied(96, 104, 116, 190),
                )
            };

            painter.line_segment([start, end], Stroke::new(line_width, line_color));
            visible_edge_count += 1;
        }
        self.visible_edge_count = visible_edge_count;

        let selected_color = Color32::from_rgb(245, 206, 93);
        let pulse_time = ui.input(|input| input.time) as f32;
        let mut selection_animating = false;

        for &index in &cache.view_scratch.visible_indices {
            let render_node = &cache.nodes[index];
            let position = cache.view_scratch.screen_positions[index];
            let radius = cache.view_scratch.screen_radii[index];

            let is_selected = self.selected.as_deref() == Some(render_node.id.as_str());
            let is_hovered = hovered_index == Some(index);
            let on_root_path = highlight
                .as_ref()
                .is_some_and(|state| state.root_path_nodes.contains(&index));
            let is_child = highlight
                .as_ref()
                .is_some_and(|state| state.child_nodes.contains(&index));

            let base_color = node_fill(
                render_node.kind,
                render_node.is_group,
                render_node.is_starting,
            );
            let unselected_color = if is_hovered {
                blend_color(base_color, Color32::WHITE, 0.22)
            } else if on_root_path {
                blend_color(base_color, Color32::from_rgb(247, 194, 111), 0.45)
            } else if is_child {
                blend_color(base_color, Color32::from_rgb(246, 137, 92), 0.35)
            } else if selection_active {
                dim_color(base_color, 0.45)
            } else {
                base_color
            };

            let selection_mix = ui.ctx().animate_bool(
                ui.make_persistent_id(("node-selection", render_node.id.as_str())),
                is_selected,
            );
            if selection_mix > 0.0 && selection_mix < 1.0 {
                selection_animating = true;
            }

            let color = blend_color(unselected_color, selected_color, selection_mix);

            painter.circle_filled(position, radius, color);
            if selection_mix > 0.0 {
                let halo_strength = (selection_mix * (1.0 - selection_mix) * 4.0).clamp(0.0, 1.0);
                let halo_alpha = (30.0 + (halo_strength * 145.0)) as u8;
                painter.circle_stroke(
                    position,
                    radius + 4.0 + ((1.0 - selection_mix) * 6.0),
                    Stroke::new(
                        1.0 + (halo_strength * 1.6),
                        Color32::from_rgba_unmultiplied(245, 206, 93, halo_alpha),
                    ),
                );
            }

            if self.in_flight.contains_key(render_node.id.as_str()) {
                let pulse = ((pulse_time * 4.2).sin() * 0.5) + 0.5;
                painter.circle_stroke(
                    position,
                    radius + 3.0 + (pulse * 2.5),
                    Stroke::new(
                        1.4,
                        Color32::from_rgba_unmultiplied(
                            120,
                            200,
                            255,
                            (90.0 + (pulse * 120.0)) as u8,
                        ),
                    ),
                );
            }

            // Collapsed nodes that can still expand get a heavier rim so
            // there is something left to click on.
            let expandable = render_node.has_children && !render_node.expanded;
            let stroke_width = if expandable { 1.6 } else { 1.0 } + (selection_mix * 1.2);
            painter.circle_stroke(
                position,
                radius,
                Stroke::new(
                    stroke_width,
                    Color32::from_rgba_unmultiplied(15, 15, 15, 190),
                ),
            );

            if render_node.pinned {
                painter.circle_filled(
                    position - vec2(0.0, radius),
                    2.2,
                    Color32::from_gray(220),
                );
            }

            let highlighted = is_selected || on_root_path || is_child;
            let should_draw_label = highlighted
                || is_hovered
                || render_node.kind == NodeKind::Root
                || radius > 17.0
                || zoom > 0.55;
            if should_draw_label {
                let mut label = truncate_label(&render_node.name, 28);
                if render_node.is_group
                    && let Some(node) = self.tree.node(&render_node.id)
                    && let Some(activities) = node.activity_count
                {
                    label.push_str(&format!(" · {activities} activities"));
                }

                painter.text(
                    position + vec2(radius + 5.0, -6.0),
                    Align2::LEFT_CENTER,
                    label,
                    FontId::proportional(12.0),
                    Color32::from_gray(238),
                );
                painter.text(
                    position + vec2(radius + 5.0, 7.0),
                    Align2::LEFT_CENTER,
                    format_count(render_node.count),
                    FontId::proportional(10.0),
                    Color32::from_gray(170),
                );
            }
        }

        if selection_animating || !self.in_flight.is_empty() {
            ui.ctx().request_repaint();
        }

        if let Some((hovered_idx, _distance)) = hovered
            && let Some(node) = self.tree.node(&cache.nodes[hovered_idx].id)
        {
            let mut overlay = format!(
                "{}  |  {} claims ({:.1}%)",
                node.name,
                format_count(node.count),
                node.percentage
            );
            if let Some(avg) = node.stats.avg_duration {
                overlay.push_str(&format!("  |  avg {}", format_minutes(avg)));
            }
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                overlay,
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }

        if let Some((id, position)) = pending_pin {
            self.tree.set_pin(&id, Some(position));
            self.reheat();
        }

        match pending_selection {
            Some(Some(id)) => {
                self.set_selected(Some(id.clone()));
                self.toggle_node(&id);
            }
            Some(None) => self.set_selected(None),
            None => {}
        }
    }
}
