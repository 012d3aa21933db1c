use eframe::egui::{self, Color32, Key, Response, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::flow::{FlowLevel, FlowMode};

use super::super::{NodeSizing, ViewModel};

const SLIDER_KEY_BASE_RATE: f32 = 10.0;
const SLIDER_KEY_ACCEL_PER_SEC: f32 = 9.0;
const SLIDER_KEY_ACCEL_MAX: f32 = 40.0;
const CLAIM_SUGGESTION_LIMIT: usize = 8;

#[derive(Clone, Copy, Default)]
struct SliderKeyHoldState {
    positive_secs: f32,
    negative_secs: f32,
}

fn slider_key_accel_multiplier(hold_secs: f32) -> f32 {
    let ramp = hold_secs * SLIDER_KEY_ACCEL_PER_SEC;
    (1.0 + ramp + ramp * ramp * 0.15).min(SLIDER_KEY_ACCEL_MAX)
}

fn default_slider_key_step(min: f32, max: f32) -> f32 {
    ((max - min) / 200.0).max(0.0005)
}

/// Holding an arrow key on a focused slider ramps the step rate up, so a
/// long press sweeps the range instead of crawling through it.
fn apply_slider_arrow_acceleration(
    ui: &Ui,
    response: &Response,
    value: &mut f32,
    min: f32,
    max: f32,
) -> bool {
    let state_id = response.id.with("arrow_key_hold_state");
    let mut hold_state = ui.ctx().data(|data| {
        data.get_temp::<SliderKeyHoldState>(state_id)
            .unwrap_or_default()
    });

    if !response.has_focus() {
        hold_state = SliderKeyHoldState::default();
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, hold_state));
        return false;
    }

    let (delta_time, increase_down, decrease_down) = ui.input(|input| {
        (
            input.stable_dt.min(0.1),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });

    if increase_down {
        hold_state.positive_secs += delta_time;
    } else {
        hold_state.positive_secs = 0.0;
    }

    if decrease_down {
        hold_state.negative_secs += delta_time;
    } else {
        hold_state.negative_secs = 0.0;
    }

    let direction = (increase_down as i8) - (decrease_down as i8);
    if direction == 0 {
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, hold_state));
        return false;
    }

    let hold_secs = if direction > 0 {
        hold_state.positive_secs
    } else {
        hold_state.negative_secs
    };
    let speed = SLIDER_KEY_BASE_RATE * slider_key_accel_multiplier(hold_secs);
    let step = default_slider_key_step(min, max);
    let delta = direction as f32 * step * speed * delta_time;

    let old_value = *value;
    *value = (*value + delta).clamp(min, max);
    let changed = (*value - old_value).abs() > f32::EPSILON;

    if increase_down || decrease_down {
        ui.ctx().request_repaint();
    }

    ui.ctx()
        .data_mut(|data| data.insert_temp(state_id, hold_state));
    changed
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(
        &mut self,
        ui: &mut Ui,
        reload_requested: &mut Option<(FlowLevel, FlowMode)>,
    ) {
        ui.heading("Flow Controls");
        ui.separator();
        ui.add_space(4.0);

        // Switching level or mode restarts the session from new starting
        // nodes, so the choice goes out as a reload request rather than
        // mutating the live model.
        ui.label("Flow level");
        ui.horizontal(|ui| {
            let mut level = self.level;
            ui.selectable_value(&mut level, FlowLevel::Process, FlowLevel::Process.label())
                .on_hover_text("One node per process step.");
            ui.selectable_value(&mut level, FlowLevel::Activity, FlowLevel::Activity.label())
                .on_hover_text("One node per activity, bucketed by owning process.");
            if level != self.level {
                *reload_requested = Some((level, self.mode));
            }
        });

        ui.label("Claim counting");
        ui.horizontal(|ui| {
            let mut mode = self.mode;
            ui.selectable_value(&mut mode, FlowMode::Detailed, FlowMode::Detailed.label())
                .on_hover_text("Count every claim journey, repeats included.");
            ui.selectable_value(&mut mode, FlowMode::Aggregated, FlowMode::Aggregated.label())
                .on_hover_text("Count each distinct step sequence once.");
            if mode != self.mode {
                *reload_requested = Some((self.level, mode));
            }
        });

        ui.separator();

        let mut sizing_changed = false;
        ui.label("Node sizing");
        ui.horizontal(|ui| {
            sizing_changed |= ui
                .selectable_value(&mut self.node_sizing, NodeSizing::Depth, "By depth")
                .on_hover_text("Shrink nodes gradually with tree depth.")
                .changed();
            sizing_changed |= ui
                .selectable_value(&mut self.node_sizing, NodeSizing::Volume, "By volume")
                .on_hover_text("Scale nodes by their claim count.")
                .changed();
        });

        let mut layout_changed = false;
        ui.collapsing("Layout tuning", |ui| {
            let intensity_slider = ui
                .add(
                    egui::Slider::new(&mut self.physics_intensity, 0.2..=2.5)
                        .text("Intensity")
                        .clamping(egui::SliderClamping::Always),
                )
                .on_hover_text("Overall strength applied to all layout forces.");
            if intensity_slider.hovered() {
                intensity_slider.request_focus();
            }
            layout_changed |= intensity_slider.changed();
            layout_changed |= apply_slider_arrow_acceleration(
                ui,
                &intensity_slider,
                &mut self.physics_intensity,
                0.2,
                2.5,
            );

            let link_slider = ui
                .add(
                    egui::Slider::new(&mut self.physics_link_scale, 0.5..=2.0)
                        .text("Link distance")
                        .clamping(egui::SliderClamping::Always),
                )
                .on_hover_text("Preferred distance between a step and its children.");
            if link_slider.hovered() {
                link_slider.request_focus();
            }
            layout_changed |= link_slider.changed();
            layout_changed |= apply_slider_arrow_acceleration(
                ui,
                &link_slider,
                &mut self.physics_link_scale,
                0.5,
                2.0,
            );

            let charge_slider = ui
                .add(
                    egui::Slider::new(&mut self.physics_charge_scale, 0.25..=2.5)
                        .text("Repulsion")
                        .clamping(egui::SliderClamping::Always),
                )
                .on_hover_text("How strongly steps push away from each other.");
            if charge_slider.hovered() {
                charge_slider.request_focus();
            }
            layout_changed |= charge_slider.changed();
            layout_changed |= apply_slider_arrow_acceleration(
                ui,
                &charge_slider,
                &mut self.physics_charge_scale,
                0.25,
                2.5,
            );

            let collision_slider = ui
                .add(
                    egui::Slider::new(&mut self.physics_collision_scale, 0.2..=2.0)
                        .text("Collision")
                        .clamping(egui::SliderClamping::Always),
                )
                .on_hover_text("Extra separation to keep overlapping steps apart.");
            if collision_slider.hovered() {
                collision_slider.request_focus();
            }
            layout_changed |= collision_slider.changed();
            layout_changed |= apply_slider_arrow_acceleration(
                ui,
                &collision_slider,
                &mut self.physics_collision_scale,
                0.2,
                2.0,
            );
        });

        if ui
            .button("Reset layout")
            .on_hover_text("Release every pinned step and reseed positions.")
            .clicked()
        {
            self.tree.clear_pins();
            self.graph_cache = None;
            sizing_changed = true;
        }

        if sizing_changed {
            self.mark_mutated();
        } else if layout_changed {
            self.reheat();
        }

        ui.separator();

        ui.label("Claim lookup");
        let query_response = ui
            .text_edit_singleline(&mut self.claim_query)
            .on_hover_text("Enter a claim number to trace its journey; digits are zero-padded.");
        let submitted =
            query_response.lost_focus() && ui.input(|input| input.key_pressed(Key::Enter));
        if submitted && !self.claim_query.trim().is_empty() {
            let query = self.claim_query.trim().to_owned();
            self.open_claim_lookup(&query);
        }

        self.draw_claim_suggestions(ui);

        if !self.notices.is_empty() {
            ui.separator();
            for notice in &self.notices {
                ui.colored_label(Color32::from_rgb(235, 180, 94), notice);
            }
            if ui.button("Dismiss").clicked() {
                self.notices.clear();
            }
        }
    }

    fn draw_claim_suggestions(&mut self, ui: &mut Ui) {
        let query = self.claim_query.trim();
        if query.is_empty() || self.claim_numbers.is_empty() {
            return;
        }

        let matcher = SkimMatcherV2::default();
        let mut scored = self
            .claim_numbers
            .iter()
            .filter_map(|number| {
                matcher
                    .fuzzy_match(number, query)
                    .map(|score| (score, number))
            })
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let mut open = None;
        for (_score, number) in scored.into_iter().take(CLAIM_SUGGESTION_LIMIT) {
            if ui.link(number.as_str()).clicked() {
                open = Some(number.clone());
            }
        }

        if let Some(number) = open {
            self.claim_query = number.clone();
            self.open_claim_lookup(&number);
        }
    }
}
