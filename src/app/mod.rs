use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use eframe::egui::{self, Context, Pos2, Vec2};
use tracing::{debug, warn};

use crate::api::types::{ClaimAtStep, ClaimPathPayload, NextStepsPayload, StepEntry};
use crate::api::{ApiClient, ApiError};
use crate::flow::{FlowLevel, FlowMode, FlowTree, NodeKind};

mod graph;
mod highlight;
mod physics;
mod render_utils;
mod ui;

/// How long the force simulation keeps running after the graph changed.
const SETTLE_BUDGET: Duration = Duration::from_millis(3200);

pub struct FlowLensApp {
    client: ApiClient,
    level: FlowLevel,
    mode: FlowMode,
    state: AppState,
    reload_rx: Option<Receiver<Result<SessionSeed, String>>>,
}

enum AppState {
    Loading {
        rx: Receiver<Result<SessionSeed, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

/// Everything fetched up front for a fresh exploration session.
struct SessionSeed {
    level: FlowLevel,
    mode: FlowMode,
    total_claims: u64,
    starting: Vec<StepEntry>,
    claim_numbers: Vec<String>,
}

struct ViewModel {
    client: ApiClient,
    level: FlowLevel,
    mode: FlowMode,
    tree: FlowTree,
    claim_numbers: Vec<String>,
    claim_pad_width: usize,

    selected: Option<String>,
    pan: Vec2,
    zoom: f32,
    node_sizing: NodeSizing,

    physics_intensity: f32,
    physics_link_scale: f32,
    physics_charge_scale: f32,
    physics_collision_scale: f32,

    graph_dirty: bool,
    graph_cache: Option<RenderGraph>,
    settle_until: Option<Instant>,
    dragging: Option<usize>,

    expansion_serial: u64,
    in_flight: HashMap<String, u64>,
    expansion_tx: Sender<ExpansionMessage>,
    expansion_rx: Receiver<ExpansionMessage>,

    claims: Option<ClaimsPanel>,
    claims_serial: u64,
    claims_tx: Sender<ClaimsMessage>,
    claims_rx: Receiver<ClaimsMessage>,

    claim_query: String,
    claim_lookup: Option<ClaimLookup>,
    claim_lookup_serial: u64,
    claim_lookup_tx: Sender<ClaimLookupMessage>,
    claim_lookup_rx: Receiver<ClaimLookupMessage>,

    notices: VecDeque<String>,
    visible_node_count: usize,
    visible_edge_count: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NodeSizing {
    Depth,
    Volume,
}

struct RenderGraph {
    nodes: Vec<RenderNode>,
    edges: Vec<(usize, usize)>,
    index_by_id: HashMap<String, usize>,
    root_index: Option<usize>,
    physics_scratch: PhysicsScratch,
    view_scratch: ViewScratch,
}

struct RenderNode {
    id: String,
    name: String,
    world_pos: Vec2,
    velocity: Vec2,
    depth: usize,
    count: u64,
    base_radius: f32,
    charge: f32,
    child_count: usize,
    kind: NodeKind,
    is_group: bool,
    is_starting: bool,
    has_children: bool,
    expanded: bool,
    pinned: bool,
}

struct PhysicsScratch {
    forces: Vec<Vec2>,
    positions: Vec<Vec2>,
    radii: Vec<f32>,
    charges: Vec<f32>,
}

struct ViewScratch {
    screen_positions: Vec<Pos2>,
    screen_radii: Vec<f32>,
    visible_indices: Vec<usize>,
}

struct HighlightState {
    root_path_nodes: std::collections::HashSet<usize>,
    root_path_edges: std::collections::HashSet<(usize, usize)>,
    child_nodes: std::collections::HashSet<usize>,
    child_edges: std::collections::HashSet<(usize, usize)>,
}

#[derive(Clone, Copy)]
struct PhysicsConfig {
    intensity: f32,
    link_scale: f32,
    charge_scale: f32,
    collision_scale: f32,
    delta_seconds: f32,
}

struct ExpansionMessage {
    node_id: String,
    serial: u64,
    result: Result<NextStepsPayload, ApiError>,
}

struct ClaimsMessage {
    node_id: String,
    serial: u64,
    result: Result<Vec<ClaimAtStep>, ApiError>,
}

struct ClaimLookupMessage {
    claim_number: String,
    serial: u64,
    result: Result<ClaimPathPayload, ApiError>,
}

struct ClaimsPanel {
    node_id: String,
    serial: u64,
    state: ClaimsState,
    rows_visible: usize,
}

enum ClaimsState {
    Loading,
    Failed(String),
    Ready(Vec<ClaimAtStep>),
}

enum ClaimLookup {
    Loading {
        claim_number: String,
    },
    Failed {
        claim_number: String,
        message: String,
    },
    Ready {
        claim_number: String,
        payload: Box<ClaimPathPayload>,
    },
}

impl ClaimLookup {
    fn claim_number(&self) -> &str {
        match self {
            Self::Loading { claim_number }
            | Self::Failed { claim_number, .. }
            | Self::Ready { claim_number, .. } => claim_number,
        }
    }
}

fn load_session(
    client: &ApiClient,
    level: FlowLevel,
    mode: FlowMode,
) -> anyhow::Result<SessionSeed> {
    let (total_claims, starting) = client
        .starting(level, mode)
        .context("fetch starting nodes")?;

    // The number list only feeds autocomplete; a failure degrades it.
    let claim_numbers = client.claim_numbers().unwrap_or_else(|error| {
        warn!(%error, "claim number catalog unavailable");
        Vec::new()
    });

    Ok(SessionSeed {
        level,
        mode,
        total_claims,
        starting,
        claim_numbers,
    })
}

impl FlowLensApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        client: ApiClient,
        level: FlowLevel,
        mode: FlowMode,
    ) -> Self {
        let state = Self::start_load(client.clone(), level, mode);
        Self {
            client,
            level,
            mode,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(
        client: ApiClient,
        level: FlowLevel,
        mode: FlowMode,
    ) -> Receiver<Result<SessionSeed, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_session(&client, level, mode).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(client: ApiClient, level: FlowLevel, mode: FlowMode) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(client, level, mode),
        }
    }
}

impl eframe::App for FlowLensApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result {
                        Ok(seed) => {
                            AppState::Ready(Box::new(ViewModel::new(self.client.clone(), seed)))
                        }
                        Err(error) => AppState::Error(error),
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading claim flows...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load claim flow data");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition =
                            Some(Self::start_load(self.client.clone(), self.level, self.mode));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = None;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &mut reload_requested, is_reloading);

                if let Some((level, mode)) = reload_requested
                    && self.reload_rx.is_none()
                {
                    self.level = level;
                    self.mode = mode;
                    self.reload_rx = Some(Self::spawn_load(self.client.clone(), level, mode));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(result) => {
                            transition = Some(match result {
                                Ok(seed) => AppState::Ready(Box::new(ViewModel::new(
                                    self.client.clone(),
                                    seed,
                                ))),
                                Err(error) => AppState::Error(error),
                            });
                        }
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition =
                                Some(AppState::Error("Background load worker disconnected".to_owned()));
                        }
                    }
                }
            }
        }

        if let Some(next_state) = transition {
            self.reload_rx = None;
            self.state = next_state;
        }
    }
}

impl ViewModel {
    /// Kicks the simulation back into its settle window without touching the
    /// graph structure.
    fn reheat(&mut self) {
        self.settle_until = Some(Instant::now() + SETTLE_BUDGET);
    }

    /// The tree changed shape: rebuild the render graph and let the layout
    /// settle again.
    fn mark_mutated(&mut self) {
        self.graph_dirty = true;
        self.reheat();
    }

    fn push_notice(&mut self, text: String) {
        while self.notices.len() >= 4 {
            self.notices.pop_front();
        }
        self.notices.push_back(text);
    }

    /// Starts a background fetch for the children of `node_id`. Duplicate
    /// requests for a node that is already loading are dropped here; the
    /// serial recorded per node is what lets late responses be discarded.
    fn request_expand(&mut self, node_id: &str) {
        let Some(node) = self.tree.node(node_id) else {
            return;
        };
        if node.expanded || !node.has_children || self.in_flight.contains_key(node_id) {
            return;
        }

        if node.is_group {
            // Group members were captured with the group; no fetch needed.
            let added = self.tree.promote_group(node_id);
            if added > 0 {
                self.mark_mutated();
            }
            return;
        }

        self.expansion_serial += 1;
        let serial = self.expansion_serial;
        self.in_flight.insert(node_id.to_owned(), serial);
        debug!(node = node_id, serial, "expansion requested");

        let client = self.client.clone();
        let tx = self.expansion_tx.clone();
        let level = self.level;
        let mode = self.mode;
        let path = node.path.clone();
        let id = node_id.to_owned();
        thread::spawn(move || {
            let result = client.next_steps(level, mode, &path);
            let _ = tx.send(ExpansionMessage {
                node_id: id,
                serial,
                result,
            });
        });
    }

    fn poll_expansions(&mut self) {
        while let Ok(message) = self.expansion_rx.try_recv() {
            if self.in_flight.get(&message.node_id) != Some(&message.serial) {
                debug!(node = %message.node_id, "discarding stale expansion response");
                continue;
            }
            self.in_flight.remove(&message.node_id);

            match message.result {
                Ok(payload) => {
                    let added = self.tree.apply_expansion(&message.node_id, &payload);
                    if added > 0 {
                        self.mark_mutated();
                    }
                }
                Err(error) => {
                    warn!(node = %message.node_id, %error, "expansion fetch failed");
                    let name = self
                        .tree
                        .node(&message.node_id)
                        .map(|node| node.name.clone())
                        .unwrap_or(message.node_id);
                    self.push_notice(format!("Could not expand {name}: {error}"));
                }
            }
        }
    }

    /// Click behavior for a node: expanded nodes collapse, collapsed nodes
    /// with children expand, leaves do nothing.
    fn toggle_node(&mut self, node_id: &str) {
        let Some(node) = self.tree.node(node_id) else {
            return;
        };

        if node.expanded {
            let removed = self.tree.collapse(node_id);
            if !removed.is_empty() {
                self.after_subtree_removed(&removed);
                self.mark_mutated();
            }
        } else if node.has_children {
            self.request_expand(node_id);
        }
    }

    /// Drops every piece of per-node state that referred to a removed id. A
    /// response still in flight for one of these ids will fail the serial
    /// check when it arrives.
    fn after_subtree_removed(&mut self, removed: &[String]) {
        let mut clear_selection = false;
        for id in removed {
            self.in_flight.remove(id);
            if self.selected.as_deref() == Some(id.as_str()) {
                clear_selection = true;
            }
            if self
                .claims
                .as_ref()
                .is_some_and(|panel| panel.node_id == *id)
            {
                self.claims = None;
            }
        }
        if clear_selection {
            self.set_selected(None);
        }
    }

    fn spawn_claims_fetch(&mut self, node_id: &str, path: Vec<String>) {
        self.claims_serial += 1;
        let serial = self.claims_serial;
        self.claims = Some(ClaimsPanel {
            node_id: node_id.to_owned(),
            serial,
            state: ClaimsState::Loading,
            rows_visible: Self::INITIAL_CLAIM_ROWS,
        });

        let client = self.client.clone();
        let tx = self.claims_tx.clone();
        let level = self.level;
        let mode = self.mode;
        let id = node_id.to_owned();
        thread::spawn(move || {
            let result = client.claims_at_step(level, mode, &path);
            let _ = tx.send(ClaimsMessage {
                node_id: id,
                serial,
                result,
            });
        });
    }

    fn poll_claims(&mut self) {
        while let Ok(message) = self.claims_rx.try_recv() {
            let Some(panel) = self.claims.as_mut() else {
                continue;
            };
            if panel.serial != message.serial || panel.node_id != message.node_id {
                continue;
            }
            panel.state = match message.result {
                Ok(claims) => ClaimsState::Ready(claims),
                Err(error) => ClaimsState::Failed(error.to_string()),
            };
        }
    }

    fn open_claim_lookup(&mut self, claim_number: &str) {
        let normalized = crate::util::normalize_claim_query(claim_number, self.claim_pad_width);
        if normalized.is_empty() {
            return;
        }

        self.claim_lookup_serial += 1;
        let serial = self.claim_lookup_serial;
        self.claim_lookup = Some(ClaimLookup::Loading {
            claim_number: normalized.clone(),
        });

        let client = self.client.clone();
        let tx = self.claim_lookup_tx.clone();
        let mode = self.mode;
        thread::spawn(move || {
            let result = client.claim_path(&normalized, mode);
            let _ = tx.send(ClaimLookupMessage {
                claim_number: normalized,
                serial,
                result,
            });
        });
    }

    fn poll_claim_lookup(&mut self) {
        while let Ok(message) = self.claim_lookup_rx.try_recv() {
            if message.serial != self.claim_lookup_serial {
                continue;
            }
            self.claim_lookup = Some(match message.result {
                Ok(payload) => ClaimLookup::Ready {
                    claim_number: message.claim_number,
                    payload: Box::new(payload),
                },
                Err(ApiError::NotFound) => ClaimLookup::Failed {
                    message: format!("No claim {} in the current dataset", message.claim_number),
                    claim_number: message.claim_number,
                },
                Err(error) => ClaimLookup::Failed {
                    claim_number: message.claim_number,
                    message: error.to_string(),
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, count: u64, percentage: f32) -> StepEntry {
        StepEntry {
            node_name: Some(name.to_owned()),
            count,
            percentage,
            ..StepEntry::default()
        }
    }

    fn group(name: &str, count: u64, members: Vec<StepEntry>) -> StepEntry {
        StepEntry {
            node_name: Some(name.to_owned()),
            count,
            is_group: true,
            activity_count: Some(members.len()),
            children: members,
            ..StepEntry::default()
        }
    }

    fn payload(steps: Vec<StepEntry>) -> NextStepsPayload {
        NextStepsPayload {
            next_steps: steps,
            ..NextStepsPayload::default()
        }
    }

    pub(in crate::app) fn model_with(starting: Vec<StepEntry>) -> ViewModel {
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        ViewModel::new(
            client,
            SessionSeed {
                level: FlowLevel::Process,
                mode: FlowMode::Detailed,
                total_claims: 100,
                starting,
                claim_numbers: Vec::new(),
            },
        )
    }

    #[test]
    fn stale_expansion_responses_are_discarded() {
        let mut model = model_with(vec![entry("A", 60, 60.0), entry("B", 40, 40.0)]);
        let node_id = model.tree.root().unwrap().children[0].clone();

        model.in_flight.insert(node_id.clone(), 7);

        // An older request resolving now must not mutate the tree.
        model
            .expansion_tx
            .send(ExpansionMessage {
                node_id: node_id.clone(),
                serial: 3,
                result: Ok(payload(vec![entry("C", 60, 100.0)])),
            })
            .unwrap();
        model.poll_expansions();

        assert!(!model.tree.node(&node_id).unwrap().expanded);
        assert_eq!(model.in_flight.get(&node_id), Some(&7));

        model
            .expansion_tx
            .send(ExpansionMessage {
                node_id: node_id.clone(),
                serial: 7,
                result: Ok(payload(vec![entry("C", 60, 100.0)])),
            })
            .unwrap();
        model.poll_expansions();

        assert!(model.tree.node(&node_id).unwrap().expanded);
        assert!(model.in_flight.is_empty());
    }

    #[test]
    fn failed_expansion_clears_in_flight_and_leaves_a_notice() {
        let mut model = model_with(vec![entry("A", 100, 100.0)]);
        let node_id = model.tree.root().unwrap().children[0].clone();

        model.in_flight.insert(node_id.clone(), 1);
        model
            .expansion_tx
            .send(ExpansionMessage {
                node_id: node_id.clone(),
                serial: 1,
                result: Err(ApiError::Status { status: 500 }),
            })
            .unwrap();
        model.poll_expansions();

        assert!(model.in_flight.is_empty());
        assert!(!model.tree.node(&node_id).unwrap().expanded);
        assert_eq!(model.notices.len(), 1);
        assert!(model.notices[0].contains('A'));
    }

    #[test]
    fn group_toggle_promotes_without_a_request() {
        let mut model = model_with(vec![group(
            "Intake",
            100,
            vec![
                entry("Intake | Open", 70, 70.0),
                entry("Intake | Call", 30, 30.0),
            ],
        )]);
        let group_id = model.tree.root().unwrap().children[0].clone();

        model.toggle_node(&group_id);

        assert!(model.in_flight.is_empty());
        let group_node = model.tree.node(&group_id).unwrap();
        assert!(group_node.expanded);
        assert_eq!(group_node.children.len(), 2);
    }

    #[test]
    fn collapsing_drops_selection_and_in_flight_for_removed_nodes() {
        let mut model = model_with(vec![entry("A", 100, 100.0)]);
        let a_id = model.tree.root().unwrap().children[0].clone();

        model
            .tree
            .apply_expansion(&a_id, &payload(vec![entry("C", 100, 100.0)]));
        let c_id = model.tree.node(&a_id).unwrap().children[0].clone();

        model.selected = Some(c_id.clone());
        model.in_flight.insert(c_id.clone(), 4);

        model.toggle_node(&a_id);

        assert!(!model.tree.contains(&c_id));
        assert_eq!(model.selected, None);
        assert!(model.in_flight.is_empty());
        assert!(model.settle_until.is_some());
    }

    #[test]
    fn stale_claim_lookups_are_superseded() {
        let mut model = model_with(vec![entry("A", 100, 100.0)]);

        model.claim_lookup_serial = 2;
        model.claim_lookup = Some(ClaimLookup::Loading {
            claim_number: "000000002".to_owned(),
        });

        model
            .claim_lookup_tx
            .send(ClaimLookupMessage {
                claim_number: "000000001".to_owned(),
                serial: 1,
                result: Ok(ClaimPathPayload::default()),
            })
            .unwrap();
        model.poll_claim_lookup();

        match model.claim_lookup.as_ref().unwrap() {
            ClaimLookup::Loading { claim_number } => assert_eq!(claim_number, "000000002"),
            _ => panic!("stale lookup result replaced the pending one"),
        }
    }
}
