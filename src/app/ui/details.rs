use eframe::egui::{self, Color32, RichText, Ui};
use serde_json::Value;

use crate::flow::NodeKind;
use crate::util::{format_count, format_minutes};

use super::super::{ClaimLookup, ClaimsState, ViewModel};

fn json_scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "—".to_owned(),
        other => other.to_string(),
    }
}

/// Joins a step path for display, eliding the middle of long chains.
fn path_text(path: &[String]) -> String {
    if path.len() <= 6 {
        return path.join(" → ");
    }

    let head = path[..3].join(" → ");
    let tail = path[path.len() - 2..].join(" → ");
    format!("{head} → … → {tail}")
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        self.draw_selection_section(ui);

        if self.claim_lookup.is_some() {
            ui.separator();
            self.draw_claim_timeline(ui);
        }
    }

    fn draw_selection_section(&mut self, ui: &mut Ui) {
        ui.heading("Step Details");
        ui.add_space(6.0);

        let Some(selected_id) = self.selected.clone() else {
            ui.label("Click a step in the flow to inspect it.");
            return;
        };
        let Some(node) = self.tree.node(&selected_id) else {
            ui.label("The selected step is no longer part of the flow.");
            return;
        };

        let name = node.name.clone();
        let internal_key = node.internal_key.clone();
        let path = node.path.clone();
        let count = node.count;
        let percentage = node.percentage;
        let depth = node.depth;
        let kind = node.kind;
        let is_starting = node.is_starting;
        let is_group = node.is_group;
        let activity_count = node.activity_count;
        let stats = node.stats.clone();
        let pinned = node.pin.is_some();
        let total_claims = self.tree.total_claims();

        ui.label(RichText::new(name).strong());
        if let Some(key) = internal_key {
            ui.small(key);
        }
        if !path.is_empty() {
            ui.small(path_text(&path));
        }
        ui.add_space(6.0);

        let share_of_total = if total_claims > 0 {
            (count as f64 / total_claims as f64) * 100.0
        } else {
            0.0
        };
        ui.label(format!(
            "{} claims · {percentage:.1}% of parent · {share_of_total:.1}% of all",
            format_count(count)
        ));
        ui.label(format!("Depth: {depth}"));
        if kind == NodeKind::Termination {
            ui.small("Claims that leave the flow here.");
        } else if is_starting && !is_group {
            ui.small("Starting step");
        }
        if is_group && let Some(activities) = activity_count {
            ui.label(format!("{activities} bundled activities"));
        }

        let stat_lines: [(&str, Option<f64>); 5] = [
            ("Avg step duration", stats.avg_duration),
            ("Median step duration", stats.median_duration),
            ("Max step duration", stats.max_duration),
            ("Avg time to reach", stats.mean_cumulative),
            ("Median time to reach", stats.median_cumulative),
        ];
        if stat_lines.iter().any(|(_label, value)| value.is_some()) {
            ui.add_space(4.0);
            for (label, value) in stat_lines {
                if let Some(minutes) = value {
                    ui.label(format!("{label}: {}", format_minutes(minutes)));
                }
            }
        }
        if let Some(remaining) = stats.avg_remaining_steps {
            ui.label(format!("Avg remaining steps: {remaining:.1}"));
        }

        if pinned {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.label("Pinned in place");
                if ui.small_button("Unpin").clicked() {
                    self.tree.set_pin(&selected_id, None);
                    self.mark_mutated();
                }
            });
        }

        self.draw_claims_section(ui, &selected_id);
    }

    fn draw_claims_section(&mut self, ui: &mut Ui, selected_id: &str) {
        let Some(panel) = &self.claims else {
            return;
        };
        if panel.node_id != selected_id {
            return;
        }

        ui.separator();
        ui.label(RichText::new("Claims at this step").strong());

        let mut open_claim = None;
        let mut load_more = false;

        match &panel.state {
            ClaimsState::Loading => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading claims...");
                });
            }
            ClaimsState::Failed(message) => {
                ui.colored_label(Color32::from_rgb(222, 110, 110), message);
            }
            ClaimsState::Ready(claims) => {
                if claims.is_empty() {
                    ui.label("No claims listed for this step.");
                } else {
                    ui.small(format!("{} claims", format_count(claims.len() as u64)));
                    let row_count = claims.len().min(panel.rows_visible);

                    egui::ScrollArea::vertical()
                        .id_salt("claims_at_step_scroll")
                        .max_height(280.0)
                        .auto_shrink([false, false])
                        .show_rows(ui, 22.0, row_count, |ui, row_range| {
                            if row_range.end + Self::CLAIM_PREFETCH_MARGIN >= row_count {
                                load_more = true;
                            }

                            for index in row_range {
                                let Some(claim) = claims.get(index) else {
                                    continue;
                                };

                                ui.horizontal(|ui| {
                                    if ui
                                        .link(claim.claim_number.as_str())
                                        .on_hover_text("Open this claim's journey.")
                                        .clicked()
                                    {
                                        open_claim = Some(claim.claim_number.clone());
                                    }
                                    ui.with_layout(
                                        egui::Layout::right_to_left(egui::Align::Center),
                                        |ui| {
                                            ui.label(format!(
                                                "{} left",
                                                format_minutes(claim.remaining_duration)
                                            ));
                                        },
                                    );
                                });
                            }
                        });
                }
            }
        }

        if load_more
            && let Some(panel) = self.claims.as_mut()
            && let ClaimsState::Ready(claims) = &panel.state
            && panel.rows_visible < claims.len()
        {
            panel.rows_visible = (panel.rows_visible + Self::CLAIM_PAGE_ROWS).min(claims.len());
        }

        if let Some(number) = open_claim {
            self.claim_query = number.clone();
            self.open_claim_lookup(&number);
        }
    }

    fn draw_claim_timeline(&mut self, ui: &mut Ui) {
        let Some(lookup) = &self.claim_lookup else {
            return;
        };

        let mut close = false;
        ui.horizontal(|ui| {
            ui.heading(format!("Claim {}", lookup.claim_number()));
            // No dismissal mid-flight: the serial guard expects a pending
            // lookup to resolve before it can be replaced.
            if !matches!(lookup, ClaimLookup::Loading { .. })
                && ui.small_button("Close").clicked()
            {
                close = true;
            }
        });

        match lookup {
            ClaimLookup::Loading { .. } => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Tracing journey...");
                });
            }
            ClaimLookup::Failed { message, .. } => {
                ui.colored_label(Color32::from_rgb(222, 110, 110), message);
            }
            ClaimLookup::Ready { payload, .. } => {
                if let Some(Value::Object(info)) = &payload.claim_info {
                    for (key, value) in info {
                        ui.small(format!("{key}: {}", json_scalar_text(value)));
                    }
                }
                ui.label(format!("{} steps", payload.total_steps));
                if !payload.exposures.is_empty() {
                    ui.label(format!("{} exposures", payload.exposures.len()));
                }
                ui.add_space(4.0);

                let steps = &payload.path;
                egui::ScrollArea::vertical()
                    .id_salt("claim_timeline_scroll")
                    .max_height(320.0)
                    .auto_shrink([false, false])
                    .show_rows(ui, 22.0, steps.len(), |ui, row_range| {
                        for index in row_range {
                            let Some(step) = steps.get(index) else {
                                continue;
                            };

                            let step_name = match &step.activity {
                                Some(activity) => format!("{} | {activity}", step.process),
                                None => step.process.clone(),
                            };
                            ui.horizontal(|ui| {
                                ui.label(format!("{}. {step_name}", index + 1))
                                    .on_hover_text(step.timestamp.as_str());
                                ui.with_layout(
                                    egui::Layout::right_to_left(egui::Align::Center),
                                    |ui| {
                                        ui.label(format_minutes(step.active_minutes));
                                    },
                                );
                            });
                        }
                    });
            }
        }

        if close {
            self.claim_lookup = None;
        }
    }
}
