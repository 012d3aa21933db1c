mod forces;
mod quadtree;

use eframe::egui::Vec2;

use super::{PhysicsConfig, RenderGraph};
use forces::{CollisionParams, accumulate_collision_pairs, accumulate_repulsion_for_node};
use quadtree::QuadNode;

const BARNES_HUT_THETA: f32 = 0.72;
const SOFTENING: f32 = 620.0;
const COLLISION_PADDING: f32 = 6.0;
const HALF_WIDTH: f32 = 1150.0;
const BOTTOM_MARGIN: f32 = 160.0;

pub(in crate::app) const ROOT_Y: f32 = 64.0;
pub(in crate::app) const LEVEL_GAP: f32 = 118.0;

/// Resting y for a tree depth. The bands keep the layout reading top-down
/// even while the horizontal positions are fully force-driven.
pub(in crate::app) fn band_y(depth: usize) -> f32 {
    ROOT_Y + (depth as f32 * LEVEL_GAP)
}

pub(super) fn step_physics(cache: &mut RenderGraph, config: PhysicsConfig) -> bool {
    let node_count = cache.nodes.len();
    if node_count < 2 {
        return false;
    }

    let scratch = &mut cache.physics_scratch;
    scratch.forces.resize(node_count, Vec2::ZERO);
    scratch.forces.fill(Vec2::ZERO);
    scratch.positions.clear();
    scratch.radii.clear();
    scratch.charges.clear();

    let mut max_radius = 0.0_f32;
    let mut max_depth = 0usize;
    for node in &cache.nodes {
        scratch.positions.push(node.world_pos);
        scratch.radii.push(node.base_radius);
        scratch.charges.push(node.charge);
        max_radius = max_radius.max(node.base_radius);
        max_depth = max_depth.max(node.depth);
    }

    let forces = &mut scratch.forces;
    let positions = &scratch.positions;
    let radii = &scratch.radii;
    let charges = &scratch.charges;

    let intensity = config.intensity.clamp(0.2, 2.5);
    let repulsion_strength = 8_600.0 * intensity * config.charge_scale.clamp(0.25, 2.5);
    let link_scale = config.link_scale.clamp(0.5, 2.0);
    let spring_strength = 0.021 * intensity;
    let spring_damping = 0.22;
    let collision_strength = 1.6 * intensity * config.collision_scale.clamp(0.2, 2.0);
    let x_pull = 0.014 * intensity;
    let root_x_pull = 0.24;
    let band_pull = 0.06 * intensity;
    let time_step_scale = (config.delta_seconds * 60.0).clamp(0.25, 3.0);
    let damping_factor = 0.88_f32.powf(time_step_scale);
    let root_index = cache.root_index.filter(|&index| index < node_count);

    if let Some(quadtree) = QuadNode::build(positions, charges) {
        for (index, force) in forces.iter_mut().enumerate() {
            accumulate_repulsion_for_node(
                &quadtree,
                index,
                positions,
                charges,
                repulsion_strength,
                SOFTENING,
                BARNES_HUT_THETA,
                force,
            );
        }

        let max_collision_distance = (max_radius * 2.0) + COLLISION_PADDING;
        accumulate_collision_pairs(
            &quadtree,
            &quadtree,
            true,
            positions,
            radii,
            CollisionParams {
                collision_strength,
                max_collision_distance_sq: max_collision_distance * max_collision_distance,
                padding: COLLISION_PADDING,
            },
            forces,
        );
    }

    for &(from, to) in &cache.edges {
        if from >= node_count || to >= node_count || from == to {
            continue;
        }

        let delta = cache.nodes[from].world_pos - cache.nodes[to].world_pos;
        let distance_sq = delta.length_sq();
        if distance_sq <= 0.0001 * 0.0001 {
            continue;
        }
        let distance = distance_sq.sqrt();
        let direction = delta / distance;

        // An only child hangs close under its parent; siblings get room.
        let base = if cache.nodes[from].child_count <= 1 {
            58.0
        } else {
            112.0
        };
        let preferred = (base * link_scale) + ((radii[from] + radii[to]) * 0.9);
        let spring = (distance - preferred) * spring_strength;
        let relative_velocity = cache.nodes[from].velocity - cache.nodes[to].velocity;
        let damping_force = relative_velocity.dot(direction) * spring_damping;
        let correction = direction * (spring + damping_force);

        forces[from] -= correction;
        forces[to] += correction;
    }

    for (index, force) in forces.iter_mut().enumerate().take(node_count) {
        let node = &cache.nodes[index];
        let mut pull = x_pull;
        if Some(index) == root_index {
            pull += root_x_pull;
        }
        force.x -= node.world_pos.x * pull;
        force.y += (band_y(node.depth) - node.world_pos.y) * band_pull;
    }

    let max_force = 165.0 + (intensity * 90.0);
    let max_force_sq = max_force * max_force;
    let max_speed = 11.0 + (intensity * 15.0);
    let max_speed_sq = max_speed * max_speed;
    let min_sleep_speed_sq = 0.02 * 0.02;
    let min_sleep_force_sq = 0.08 * 0.08;
    let floor_y = band_y(max_depth) + BOTTOM_MARGIN;
    let mut any_motion = false;

    for (index, force_value) in forces.iter().enumerate().take(node_count) {
        let node = &mut cache.nodes[index];
        if node.pinned {
            node.velocity = Vec2::ZERO;
            continue;
        }

        let mut force = *force_value;
        let force_sq = force.length_sq();
        if force_sq > max_force_sq {
            force *= max_force / force_sq.sqrt();
        }

        let mut velocity = (node.velocity + (force * (0.055 * time_step_scale))) * damping_factor;
        let mut speed_sq = velocity.length_sq();
        if speed_sq > max_speed_sq {
            velocity *= max_speed / speed_sq.sqrt();
            speed_sq = max_speed_sq;
        }

        if speed_sq < min_sleep_speed_sq && force_sq < min_sleep_force_sq {
            velocity = Vec2::ZERO;
            speed_sq = 0.0;
        }

        node.velocity = velocity;
        node.world_pos += velocity * time_step_scale;

        if Some(index) == root_index {
            node.world_pos.y = ROOT_Y;
            node.velocity.y = 0.0;
        }

        let margin = node.base_radius + 8.0;
        let limit_x = HALF_WIDTH - margin;
        if node.world_pos.x < -limit_x {
            node.world_pos.x = -limit_x;
            node.velocity.x = 0.0;
        } else if node.world_pos.x > limit_x {
            node.world_pos.x = limit_x;
            node.velocity.x = 0.0;
        }

        if node.world_pos.y < ROOT_Y {
            node.world_pos.y = ROOT_Y;
            node.velocity.y = 0.0;
        } else if node.world_pos.y > floor_y {
            node.world_pos.y = floor_y;
            node.velocity.y = 0.0;
        }

        if speed_sq > 0.000_001 {
            any_motion = true;
        }
    }

    any_motion
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use eframe::egui::vec2;

    use super::super::{PhysicsScratch, RenderGraph, RenderNode, ViewScratch};
    use super::*;
    use crate::flow::NodeKind;

    fn node(id: &str, kind: NodeKind, depth: usize, x: f32, y: f32) -> RenderNode {
        RenderNode {
            id: id.to_owned(),
            name: id.to_owned(),
            world_pos: vec2(x, y),
            velocity: Vec2::ZERO,
            depth,
            count: 10,
            base_radius: if kind == NodeKind::Root { 30.0 } else { 14.0 },
            charge: if kind == NodeKind::Root { 9.0 } else { 3.0 },
            child_count: 0,
            kind,
            is_group: false,
            is_starting: depth == 1,
            has_children: false,
            expanded: false,
            pinned: false,
        }
    }

    fn graph(nodes: Vec<RenderNode>, edges: Vec<(usize, usize)>) -> RenderGraph {
        let index_by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect::<HashMap<_, _>>();
        let root_index = index_by_id.get("root").copied();

        RenderGraph {
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
        }
    }

    fn config() -> PhysicsConfig {
        PhysicsConfig {
            intensity: 1.0,
            link_scale: 1.0,
            charge_scale: 1.0,
            collision_scale: 1.0,
            delta_seconds: 1.0 / 60.0,
        }
    }

    #[test]
    fn pinned_nodes_do_not_move() {
        let mut cache = graph(
            vec![
                node("root", NodeKind::Root, 0, 0.0, ROOT_Y),
                node("a", NodeKind::Ordinary, 1, 40.0, 300.0),
                node("b", NodeKind::Ordinary, 1, 44.0, 302.0),
            ],
            vec![(0, 1), (0, 2)],
        );
        cache.nodes[1].pinned = true;

        for _ in 0..300 {
            step_physics(&mut cache, config());
        }

        assert_eq!(cache.nodes[1].world_pos, vec2(40.0, 300.0));
        assert_ne!(cache.nodes[2].world_pos, vec2(44.0, 302.0));
    }

    #[test]
    fn the_root_stays_on_its_row() {
        let mut cache = graph(
            vec![
                node("root", NodeKind::Root, 0, 260.0, 400.0),
                node("a", NodeKind::Ordinary, 1, -60.0, band_y(1)),
            ],
            vec![(0, 1)],
        );

        step_physics(&mut cache, config());
        assert_eq!(cache.nodes[0].world_pos.y, ROOT_Y);

        for _ in 0..600 {
            step_physics(&mut cache, config());
        }
        assert_eq!(cache.nodes[0].world_pos.y, ROOT_Y);
        assert!(cache.nodes[0].world_pos.x.abs() < 260.0);
    }

    #[test]
    fn runaway_nodes_are_clamped_to_the_bounds() {
        let mut cache = graph(
            vec![
                node("root", NodeKind::Root, 0, 0.0, ROOT_Y),
                node("a", NodeKind::Ordinary, 1, 40_000.0, -4_000.0),
            ],
            vec![(0, 1)],
        );

        step_physics(&mut cache, config());

        let runaway = &cache.nodes[1];
        assert!(runaway.world_pos.x <= HALF_WIDTH);
        assert!(runaway.world_pos.y >= ROOT_Y);
        assert!(runaway.world_pos.y <= band_y(1) + BOTTOM_MARGIN);
    }

    #[test]
    fn deeper_nodes_settle_on_lower_bands() {
        let mut cache = graph(
            vec![
                node("root", NodeKind::Root, 0, 0.0, ROOT_Y),
                node("a", NodeKind::Ordinary, 1, 12.0, 100.0),
                node("b", NodeKind::Ordinary, 2, -20.0, 120.0),
            ],
            vec![(0, 1), (1, 2)],
        );
        cache.nodes[1].child_count = 1;

        for _ in 0..2500 {
            step_physics(&mut cache, config());
        }

        let level_one = cache.nodes[1].world_pos.y;
        let level_two = cache.nodes[2].world_pos.y;
        assert!(level_one > ROOT_Y + 20.0);
        assert!(level_two > level_one + 40.0);
    }

    #[test]
    fn a_small_flow_settles_within_the_budget() {
        let mut cache = graph(
            vec![
                node("root", NodeKind::Root, 0, 0.0, ROOT_Y),
                node("a", NodeKind::Ordinary, 1, -90.0, band_y(1) + 8.0),
                node("b", NodeKind::Ordinary, 1, 10.0, band_y(1) - 12.0),
                node("c", NodeKind::Ordinary, 1, 95.0, band_y(1) + 3.0),
            ],
            vec![(0, 1), (0, 2), (0, 3)],
        );

        let mut settled = false;
        for _ in 0..8000 {
            if !step_physics(&mut cache, config()) {
                settled = true;
                break;
            }
        }
        assert!(settled);
    }
}
