use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};

use crate::flow::{FlowNode, NodeKind};
use crate::util::stable_pair;

use super::super::physics::{LEVEL_GAP, ROOT_Y};
use super::super::render_utils::{node_charge, node_radius};
use super::super::{PhysicsScratch, RenderGraph, RenderNode, ViewModel, ViewScratch};

impl ViewModel {
    /// New nodes drop in just below their parent with a deterministic
    /// sideways offset, so an expansion fans out instead of stacking
    /// every child on the same point.
    fn seed_position(node: &FlowNode, parent_pos: Option<Vec2>) -> Vec2 {
        if node.kind == NodeKind::Root {
            return vec2(0.0, ROOT_Y);
        }

        let (jx, jy) = stable_pair(&node.id);
        let anchor = parent_pos.unwrap_or_else(|| vec2(0.0, ROOT_Y));
        anchor + vec2(jx * 38.0, (LEVEL_GAP * 0.55) + (jy * 14.0))
    }

    fn make_render_node(node: &FlowNode, seed: Vec2, base_radius: f32) -> RenderNode {
        RenderNode {
            id: node.id.clone(),
            name: node.name.clone(),
            world_pos: seed,
            velocity: Vec2::ZERO,
            depth: node.depth,
            count: node.count,
            base_radius,
            charge: node_charge(node.kind, node.is_group, base_radius),
            child_count: node.children.len(),
            kind: node.kind,
            is_group: node.is_group,
            is_starting: node.is_starting,
            has_children: node.has_children,
            expanded: node.expanded,
            pinned: false,
        }
    }

    fn refresh_metadata(render: &mut RenderNode, node: &FlowNode, base_radius: f32) {
        render.name = node.name.clone();
        render.depth = node.depth;
        render.count = node.count;
        render.base_radius = base_radius;
        render.charge = node_charge(node.kind, node.is_group, base_radius);
        render.child_count = node.children.len();
        render.kind = node.kind;
        render.is_group = node.is_group;
        render.is_starting = node.is_starting;
        render.has_children = node.has_children;
        render.expanded = node.expanded;
    }

    pub(in crate::app) fn rebuild_render_graph(&mut self) {
        let visible = self.tree.flatten();
        if visible.is_empty() {
            self.graph_cache = None;
            self.visible_node_count = 0;
            self.visible_edge_count = 0;
            self.graph_dirty = false;
            return;
        }

        let max_count = visible
            .iter()
            .map(|node| node.count)
            .max()
            .unwrap_or(1)
            .max(1);
        let mut index_by_id = HashMap::with_capacity(visible.len());
        for (index, node) in visible.iter().enumerate() {
            index_by_id.insert(node.id.clone(), index);
        }
        let root_index = index_by_id.get(self.tree.root_id()).copied();

        let edges = self
            .tree
            .visible_links()
            .into_iter()
            .filter_map(|(parent, child)| {
                let parent = index_by_id.get(&parent).copied()?;
                let child = index_by_id.get(&child).copied()?;
                (parent != child).then_some((parent, child))
            })
            .collect::<Vec<_>>();

        let mut prior_nodes = self
            .graph_cache
            .take()
            .map(|cache| {
                cache
                    .nodes
                    .into_iter()
                    .map(|node| (node.id.clone(), node))
                    .collect::<HashMap<_, _>>()
            })
            .unwrap_or_default();

        let mut nodes: Vec<RenderNode> = Vec::with_capacity(visible.len());
        for node in &visible {
            let base_radius = node_radius(
                self.node_sizing,
                node.kind,
                node.is_group,
                node.depth,
                node.count,
                max_count,
            );

            let mut render = if let Some(mut prior) = prior_nodes.remove(&node.id) {
                Self::refresh_metadata(&mut prior, node, base_radius);
                prior
            } else {
                let parent_pos = node
                    .parent
                    .as_ref()
                    .and_then(|parent| index_by_id.get(parent))
                    .and_then(|&index| nodes.get(index))
                    .map(|parent| parent.world_pos);
                Self::make_render_node(node, Self::seed_position(node, parent_pos), base_radius)
            };

            // The tree's pin is authoritative: a cleared pin releases the
            // node even when its render state survived the rebuild.
            match node.pin {
                Some((x, y)) => {
                    render.world_pos = vec2(x, y);
                    render.velocity = Vec2::ZERO;
                    render.pinned = true;
                }
                None => render.pinned = false,
            }

            nodes.push(render);
        }

        self.visible_node_count = nodes.len();
        self.visible_edge_count = edges.len();
        self.graph_cache = Some(RenderGraph {
            nodes,
            edges,
            index_by_id,
            root_index,
            physics_scratch: PhysicsScratch {
                forces: Vec::new(),
                positions: Vec::new(),
                radii: Vec::new(),
                charges: Vec::new(),
            },
            view_scratch: ViewScratch {
                screen_positions: Vec::new(),
                screen_radii: Vec::new(),
                visible_indices: Vec::new(),
            },
        });
        self.graph_dirty = false;
    }
}
