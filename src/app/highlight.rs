use std::collections::HashSet;

use crate::flow::FlowTree;

use super::{HighlightState, RenderGraph};

/// Collects the render indices touched by a selection: the ancestor chain
/// back to the root plus the selection's direct children. Edges are keyed
/// `(parent, child)` to match the render graph's link orientation.
pub(super) fn build_highlight_state_for_selected_id(
    tree: &FlowTree,
    cache: &RenderGraph,
    selected_id: &str,
) -> Option<HighlightState> {
    let node = tree.node(selected_id)?;
    let chain = tree.chain_to_root(selected_id);
    if chain.is_empty() {
        return None;
    }

    let mut root_path_nodes = HashSet::new();
    let mut root_path_edges = HashSet::new();
    for id in &chain {
        if let Some(&index) = cache.index_by_id.get(id) {
            root_path_nodes.insert(index);
        }
    }
    // The chain runs selection-first, so the later entry of each pair is
    // the parent.
    for pair in chain.windows(2) {
        if let (Some(&child), Some(&parent)) = (
            cache.index_by_id.get(&pair[0]),
            cache.index_by_id.get(&pair[1]),
        ) {
            root_path_edges.insert((parent, child));
        }
    }

    let mut child_nodes = HashSet::new();
    let mut child_edges = HashSet::new();
    if let Some(&selected_index) = cache.index_by_id.get(selected_id) {
        for child_id in &node.children {
            if let Some(&child_index) = cache.index_by_id.get(child_id) {
                child_nodes.insert(child_index);
                child_edges.insert((selected_index, child_index));
            }
        }
    }

    Some(HighlightState {
        root_path_nodes,
        root_path_edges,
        child_nodes,
        child_edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::StepEntry;
    use crate::app::tests::model_with;

    fn entry(name: &str, count: u64) -> StepEntry {
        StepEntry {
            node_name: Some(name.to_owned()),
            count,
            percentage: 50.0,
            ..StepEntry::default()
        }
    }

    #[test]
    fn selection_lights_the_chain_and_the_children() {
        let mut model = model_with(vec![entry("Intake", 60), entry("Triage", 40)]);
        model.rebuild_render_graph();

        let intake = model.tree.root().unwrap().children[0].clone();
        let cache = model.graph_cache.as_ref().unwrap();
        let state = build_highlight_state_for_selected_id(&model.tree, cache, &intake).unwrap();

        let root_index = cache.root_index.unwrap();
        let intake_index = cache.index_by_id[&intake];
        assert!(state.root_path_nodes.contains(&root_index));
        assert!(state.root_path_nodes.contains(&intake_index));
        assert!(state.root_path_edges.contains(&(root_index, intake_index)));
        assert!(state.child_nodes.is_empty());
    }

    #[test]
    fn a_vanished_selection_builds_no_state() {
        let mut model = model_with(vec![entry("Intake", 60)]);
        model.rebuild_render_graph();

        let cache = model.graph_cache.as_ref().unwrap();
        assert!(build_highlight_state_for_selected_id(&model.tree, cache, "gone").is_none());
    }
}
