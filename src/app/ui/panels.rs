use std::collections::{HashMap, VecDeque};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use eframe::egui::{self, Align, Context, Layout, Vec2};

use crate::flow::{FlowLevel, FlowMode, FlowTree, NodeKind};
use crate::util::format_count;

use super::super::{ClaimLookup, ClaimsState, NodeSizing, SETTLE_BUDGET, SessionSeed, ViewModel};

impl ViewModel {
    pub(in crate::app) const INITIAL_CLAIM_ROWS: usize = 40;
    pub(in crate::app) const CLAIM_PAGE_ROWS: usize = 40;
    pub(in crate::app) const CLAIM_PREFETCH_MARGIN: usize = 6;

    pub(in crate::app) fn new(client: crate::api::ApiClient, seed: SessionSeed) -> Self {
        // Pad width for numeric claim lookups comes from the catalog, so a
        // query like "4521" can match a zero-padded "00004521".
        let claim_pad_width = seed
            .claim_numbers
            .iter()
            .filter(|number| !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()))
            .map(|number| number.len())
            .max()
            .unwrap_or(0);

        let tree = FlowTree::build_root(seed.total_claims, seed.starting);
        let (expansion_tx, expansion_rx) = mpsc::channel();
        let (claims_tx, claims_rx) = mpsc::channel();
        let (claim_lookup_tx, claim_lookup_rx) = mpsc::channel();

        Self {
            client,
            level: seed.level,
            mode: seed.mode,
            tree,
            claim_numbers: seed.claim_numbers,
            claim_pad_width,
            selected: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            node_sizing: NodeSizing::Depth,
            physics_intensity: 1.0,
            physics_link_scale: 1.0,
            physics_charge_scale: 1.0,
            physics_collision_scale: 1.0,
            graph_dirty: true,
            graph_cache: None,
            settle_until: Some(Instant::now() + SETTLE_BUDGET),
            dragging: None,
            expansion_serial: 0,
            in_flight: HashMap::new(),
            expansion_tx,
            expansion_rx,
            claims: None,
            claims_serial: 0,
            claims_tx,
            claims_rx,
            claim_query: String::new(),
            claim_lookup: None,
            claim_lookup_serial: 0,
            claim_lookup_tx,
            claim_lookup_rx,
            notices: VecDeque::new(),
            visible_node_count: 0,
            visible_edge_count: 0,
        }
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        reload_requested: &mut Option<(FlowLevel, FlowMode)>,
        is_loading: bool,
    ) {
        self.poll_expansions();
        self.poll_claims();
        self.poll_claim_lookup();

        let awaiting_claims = self
            .claims
            .as_ref()
            .is_some_and(|panel| matches!(panel.state, ClaimsState::Loading));
        let awaiting_lookup = matches!(self.claim_lookup, Some(ClaimLookup::Loading { .. }));
        if !self.in_flight.is_empty() || awaiting_claims || awaiting_lookup || is_loading {
            ctx.request_repaint_after(Duration::from_millis(120));
        }

        if self.graph_dirty {
            self.rebuild_render_graph();
        }

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("flowlens");
                    ui.separator();
                    ui.label(format!(
                        "{} claims",
                        format_count(self.tree.total_claims())
                    ));
                    ui.label(self.level.label());
                    ui.label(self.mode.label());
                    let reload_button = ui.add_enabled(!is_loading, egui::Button::new("Reload"));
                    if reload_button.clicked() {
                        *reload_requested = Some((self.level, self.mode));
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(format!(
                            "{} steps · {} links",
                            self.visible_node_count, self.visible_edge_count
                        ));
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(330.0)
            .show(ctx, |ui| self.draw_controls(ui, reload_requested));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(380.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            if is_loading {
                ui.vertical_centered(|ui| {
                    ui.add_space(120.0);
                    ui.heading("Reloading claim flows...");
                    ui.add_space(8.0);
                    ui.spinner();
                });
            } else {
                self.draw_graph(ui);
            }
        });
    }

    /// Selection drives the details panel; selecting a concrete step also
    /// kicks off the claims listing for it. Groups are a visual bucket with
    /// no step of their own, so they get no listing.
    pub(in crate::app) fn set_selected(&mut self, selected: Option<String>) {
        if self.selected == selected {
            return;
        }

        self.selected = selected;
        self.claims = None;

        if let Some(id) = self.selected.clone()
            && let Some(node) = self.tree.node(&id)
            && !node.is_group
            && matches!(node.kind, NodeKind::Ordinary | NodeKind::Termination)
        {
            let path = node.path.clone();
            self.spawn_claims_fetch(&id, path);
        }
    }
}
