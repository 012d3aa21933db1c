use std::collections::HashMap;

use tracing::{debug, warn};

use crate::api::types::{NextStepsPayload, StepEntry};

use super::node::{FlowNode, NodeKind, ROOT_ID, StepStats, TERMINATION_KEY, child_id, sanitize_key};

/// The incrementally explored flow tree.
///
/// Nodes live in a flat map keyed by id; every node keeps its parent id and
/// an ordered list of child ids, so collapsing a branch only touches that
/// branch. Links are not stored at all, they fall out of the parent/child
/// relation when the render graph is rebuilt.
pub struct FlowTree {
    nodes: HashMap<String, FlowNode>,
    root_id: String,
}

impl FlowTree {
    /// Seeds the tree with the synthetic root and one child per starting
    /// entry, ordered by descending claim count.
    pub fn build_root(total_claims: u64, entries: Vec<StepEntry>) -> Self {
        let root = FlowNode::root(total_claims);
        let root_id = root.id.clone();
        let mut tree = Self {
            nodes: HashMap::from([(root_id.clone(), root)]),
            root_id,
        };

        let mut sorted = entries;
        sorted.sort_by(|a, b| b.count.cmp(&a.count));

        if let Some(parent) = tree.nodes.get(ROOT_ID).cloned() {
            let children = sorted
                .iter()
                .filter_map(|entry| Self::child_from_entry(&parent, entry))
                .collect::<Vec<_>>();
            tree.attach_children(ROOT_ID, children);
        }
        tree.check_child_counts(ROOT_ID);
        tree
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root(&self) -> Option<&FlowNode> {
        self.nodes.get(&self.root_id)
    }

    pub fn total_claims(&self) -> u64 {
        self.root().map(|root| root.count).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    /// Materializes the children of a collapsed ordinary node from a
    /// next-steps response. Returns the number of children attached; zero
    /// children means the node turned out to be a leaf and stays collapsed.
    pub fn apply_expansion(&mut self, node_id: &str, payload: &NextStepsPayload) -> usize {
        let Some(node) = self.nodes.get(node_id) else {
            debug!(node = node_id, "expansion target no longer present");
            return 0;
        };
        if node.kind != NodeKind::Ordinary || node.is_group || node.expanded {
            debug!(node = node_id, "ignoring expansion for non-expandable node");
            return 0;
        }

        let parent = node.clone();
        let mut children = Vec::new();
        if payload.terminations.count > 0 {
            children.push(Self::termination_from(
                &parent,
                payload.terminations.count,
                payload.terminations.percentage,
            ));
        }
        for entry in &payload.next_steps {
            if let Some(child) = Self::child_from_entry(&parent, entry) {
                children.push(child);
            }
        }

        let added = self.attach_children(node_id, children);
        if added == 0 {
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.has_children = false;
                node.expanded = false;
            }
            debug!(node = node_id, "expansion produced no children, marking leaf");
            return 0;
        }

        if let Some(node) = self.nodes.get_mut(node_id) {
            node.expanded = true;
        }
        self.check_child_counts(node_id);
        added
    }

    /// Expands a group node from its stored children. No request is made;
    /// the entries were captured when the group itself was created.
    pub fn promote_group(&mut self, group_id: &str) -> usize {
        let Some(node) = self.nodes.get(group_id) else {
            debug!(node = group_id, "promotion target no longer present");
            return 0;
        };
        if !node.is_group || node.expanded {
            return 0;
        }

        let parent = node.clone();
        let children = parent
            .stored_children
            .iter()
            .filter_map(|entry| Self::child_from_entry(&parent, entry))
            .collect::<Vec<_>>();

        let added = self.attach_children(group_id, children);
        if let Some(node) = self.nodes.get_mut(group_id) {
            if added == 0 {
                node.has_children = false;
            } else {
                node.expanded = true;
            }
        }
        added
    }

    /// Removes the entire subtree beneath `node_id` and returns the removed
    /// ids so callers can drop selection or in-flight bookkeeping for them.
    pub fn collapse(&mut self, node_id: &str) -> Vec<String> {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return Vec::new();
        };
        if node.kind == NodeKind::Root || node.children.is_empty() {
            return Vec::new();
        }

        node.expanded = false;
        let mut stack = std::mem::take(&mut node.children);
        let mut removed = Vec::new();
        while let Some(id) = stack.pop() {
            if let Some(sub) = self.nodes.remove(&id) {
                stack.extend(sub.children);
                removed.push(sub.id);
            }
        }

        debug!(node = node_id, removed = removed.len(), "collapsed subtree");
        removed
    }

    /// Depth-first order with every parent before its children; the render
    /// graph relies on that when seeding new nodes next to their parent.
    pub fn flatten(&self) -> Vec<&FlowNode> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root_id.as_str()];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            ordered.push(node);
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        ordered
    }

    /// Parent/child id pairs for every node currently shown.
    pub fn visible_links(&self) -> Vec<(String, String)> {
        let mut links = Vec::new();
        for node in self.flatten() {
            for child in &node.children {
                links.push((node.id.clone(), child.clone()));
            }
        }
        links
    }

    /// Ids from `id` up to the root, starting with `id` itself.
    pub fn chain_to_root(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut cursor = self.nodes.get(id);
        while let Some(node) = cursor {
            chain.push(node.id.clone());
            cursor = node
                .parent
                .as_deref()
                .and_then(|parent_id| self.nodes.get(parent_id));
        }
        chain
    }

    pub fn set_pin(&mut self, id: &str, pin: Option<(f32, f32)>) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.pin = pin;
        }
    }

    pub fn clear_pins(&mut self) {
        for node in self.nodes.values_mut() {
            node.pin = None;
        }
    }

    fn child_from_entry(parent: &FlowNode, entry: &StepEntry) -> Option<FlowNode> {
        let key = sanitize_key(entry.key());
        if key.is_empty() || entry.count == 0 {
            return None;
        }

        let is_group = entry.is_group;
        let (path, is_starting) = if parent.kind == NodeKind::Root {
            (vec![key.clone()], true)
        } else if is_group {
            // A group bucket never contributes a path segment of its own.
            (parent.path.clone(), parent.is_group && parent.is_starting)
        } else if parent.is_group && parent.is_starting {
            // Members of a starting bucket share its single-segment path.
            (parent.path.clone(), true)
        } else {
            let mut path = parent.path.clone();
            path.push(key.clone());
            (path, false)
        };

        let stored_children = if is_group {
            entry.children.clone()
        } else {
            Vec::new()
        };

        // Members of a process bucket carry compound "Process | Activity"
        // keys; the bucket already shows the process, so the member label
        // drops the prefix while the raw key keeps feeding path and id.
        let (name, internal_key) = match parent
            .is_group
            .then(|| key.strip_prefix(parent.name.as_str()))
            .flatten()
            .and_then(|rest| rest.strip_prefix(" | "))
        {
            Some(suffix) if !suffix.is_empty() => (suffix.to_owned(), Some(key.clone())),
            _ => (key.clone(), None),
        };

        Some(FlowNode {
            id: child_id(&parent.id, &key),
            name,
            internal_key,
            kind: NodeKind::Ordinary,
            count: entry.count,
            percentage: entry.percentage,
            depth: parent.depth + 1,
            path,
            is_group,
            is_starting,
            has_children: if is_group {
                !stored_children.is_empty()
            } else {
                true
            },
            expanded: false,
            parent: Some(parent.id.clone()),
            children: Vec::new(),
            stored_children,
            activity_count: entry.activity_count,
            stats: StepStats::from_entry(entry),
            pin: None,
        })
    }

    fn termination_from(parent: &FlowNode, count: u64, percentage: f32) -> FlowNode {
        let mut path = parent.path.clone();
        path.push(TERMINATION_KEY.to_owned());

        FlowNode {
            id: child_id(&parent.id, TERMINATION_KEY),
            name: "End".to_owned(),
            internal_key: None,
            kind: NodeKind::Termination,
            count,
            percentage,
            depth: parent.depth + 1,
            path,
            is_group: false,
            is_starting: false,
            has_children: false,
            expanded: false,
            parent: Some(parent.id.clone()),
            children: Vec::new(),
            stored_children: Vec::new(),
            activity_count: None,
            stats: StepStats::default(),
            pin: None,
        }
    }

    fn attach_children(&mut self, parent_id: &str, children: Vec<FlowNode>) -> usize {
        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            if self.nodes.contains_key(&child.id) {
                warn!(id = %child.id, "skipping child with a duplicate id");
                continue;
            }
            ids.push(child.id.clone());
            self.nodes.insert(child.id.clone(), child);
        }

        let attached = ids.len();
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children = ids;
        }
        attached
    }

    fn check_child_counts(&self, parent_id: &str) {
        let Some(parent) = self.nodes.get(parent_id) else {
            return;
        };
        if parent.is_group || parent.children.is_empty() {
            return;
        }

        let children_sum = parent
            .children
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|child| child.count)
            .sum::<u64>();
        if children_sum != parent.count {
            warn!(
                parent = %parent.name,
                parent_count = parent.count,
                children_sum,
                "child counts do not add up to the parent count"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Terminations;
    use crate::flow::node::ID_SEPARATOR;

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

    fn payload(steps: Vec<StepEntry>, termination_count: u64) -> NextStepsPayload {
        NextStepsPayload {
            next_steps: steps,
            terminations: Terminations {
                count: termination_count,
                percentage: 0.0,
            },
            ..NextStepsPayload::default()
        }
    }

    fn id(segments: &[&str]) -> String {
        let mut joined = String::from(ROOT_ID);
        for segment in segments {
            joined.push(ID_SEPARATOR);
            joined.push_str(segment);
        }
        joined
    }

    #[test]
    fn build_root_orders_starting_nodes_by_count() {
        let tree = FlowTree::build_root(
            100,
            vec![entry("B", 40, 40.0), entry("A", 60, 60.0)],
        );

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.total_claims(), 100);

        let root = tree.root().unwrap();
        assert_eq!(root.children, vec![id(&["A"]), id(&["B"])]);

        let a = tree.node(&id(&["A"])).unwrap();
        assert_eq!(a.depth, 1);
        assert_eq!(a.path, vec!["A".to_owned()]);
        assert!(a.is_starting);
        assert!(!a.expanded);
        assert!(a.has_children);
    }

    #[test]
    fn build_root_skips_duplicate_and_empty_keys() {
        let tree = FlowTree::build_root(
            100,
            vec![
                entry("A", 60, 60.0),
                entry("A", 25, 25.0),
                entry("", 10, 10.0),
                entry("B", 5, 5.0),
            ],
        );

        let root = tree.root().unwrap();
        assert_eq!(root.children, vec![id(&["A"]), id(&["B"])]);
        assert_eq!(tree.node(&id(&["A"])).unwrap().count, 60);
    }

    #[test]
    fn starting_group_keeps_single_segment_path() {
        let tree = FlowTree::build_root(
            100,
            vec![group(
                "Intake",
                100,
                vec![entry("Intake | Open", 70, 70.0), entry("Intake | Call", 30, 30.0)],
            )],
        );

        let g = tree.node(&id(&["Intake"])).unwrap();
        assert!(g.is_group);
        assert!(g.is_starting);
        assert_eq!(g.path, vec!["Intake".to_owned()]);
        assert_eq!(g.stored_children.len(), 2);
    }

    #[test]
    fn expansion_materializes_children_and_links() {
        let mut tree =
            FlowTree::build_root(100, vec![entry("A", 60, 60.0), entry("B", 40, 40.0)]);

        let added = tree.apply_expansion(&id(&["A"]), &payload(vec![entry("C", 60, 100.0)], 0));
        assert_eq!(added, 1);

        let a = tree.node(&id(&["A"])).unwrap();
        assert!(a.expanded);

        let c = tree.node(&id(&["A", "C"])).unwrap();
        assert_eq!(c.path, vec!["A".to_owned(), "C".to_owned()]);
        assert_eq!(c.depth, 2);
        assert_eq!(c.parent.as_deref(), Some(id(&["A"]).as_str()));

        let links = tree.visible_links();
        assert!(links.contains(&(id(&["A"]), id(&["A", "C"]))));
        assert_eq!(links.len(), 3);
    }

    #[test]
    fn termination_bucket_comes_first_and_carries_the_end_marker() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);

        tree.apply_expansion(&id(&["A"]), &payload(vec![entry("C", 45, 75.0)], 15));

        let a = tree.node(&id(&["A"])).unwrap();
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0], id(&["A", TERMINATION_KEY]));

        let end = tree.node(&id(&["A", TERMINATION_KEY])).unwrap();
        assert!(end.is_termination());
        assert_eq!(end.count, 15);
        assert_eq!(
            end.path,
            vec!["A".to_owned(), TERMINATION_KEY.to_owned()]
        );
        assert!(!end.has_children);
    }

    #[test]
    fn zero_count_termination_is_skipped() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);
        tree.apply_expansion(&id(&["A"]), &payload(vec![entry("C", 60, 100.0)], 0));

        assert!(!tree.contains(&id(&["A", TERMINATION_KEY])));
    }

    #[test]
    fn empty_expansion_marks_a_discovered_leaf() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);

        let added = tree.apply_expansion(&id(&["A"]), &payload(Vec::new(), 0));
        assert_eq!(added, 0);

        let a = tree.node(&id(&["A"])).unwrap();
        assert!(!a.expanded);
        assert!(!a.has_children);
    }

    #[test]
    fn expansion_is_rejected_for_expanded_nodes_and_groups() {
        let mut tree = FlowTree::build_root(
            100,
            vec![
                entry("A", 60, 60.0),
                group("G", 40, vec![entry("G | x", 40, 100.0), entry("G | y", 1, 1.0)]),
            ],
        );

        tree.apply_expansion(&id(&["A"]), &payload(vec![entry("C", 60, 100.0)], 0));
        let repeat = tree.apply_expansion(&id(&["A"]), &payload(vec![entry("D", 60, 100.0)], 0));
        assert_eq!(repeat, 0);
        assert!(!tree.contains(&id(&["A", "D"])));

        let on_group = tree.apply_expansion(&id(&["G"]), &payload(vec![entry("Z", 1, 1.0)], 0));
        assert_eq!(on_group, 0);
    }

    #[test]
    fn collapse_removes_the_whole_subtree_and_reports_ids() {
        let mut tree =
            FlowTree::build_root(100, vec![entry("A", 60, 60.0), entry("B", 40, 40.0)]);
        tree.apply_expansion(&id(&["A"]), &payload(vec![entry("C", 60, 100.0)], 0));
        tree.apply_expansion(&id(&["A", "C"]), &payload(vec![entry("D", 40, 66.0)], 20));

        let removed = tree.collapse(&id(&["A"]));
        let mut removed_sorted = removed.clone();
        removed_sorted.sort();
        let mut expected = vec![
            id(&["A", "C"]),
            id(&["A", "C", "D"]),
            id(&["A", "C", TERMINATION_KEY]),
        ];
        expected.sort();
        assert_eq!(removed_sorted, expected);

        let a = tree.node(&id(&["A"])).unwrap();
        assert!(!a.expanded);
        assert!(a.has_children);
        assert!(a.children.is_empty());

        // The sibling branch is untouched and the tree is back to root + 2.
        assert!(tree.contains(&id(&["B"])));
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.visible_links().len(), 2);
    }

    #[test]
    fn collapse_is_a_no_op_on_leaves_and_the_root() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);

        assert!(tree.collapse(&id(&["A"])).is_empty());
        assert!(tree.collapse(ROOT_ID).is_empty());
        assert_eq!(tree.len(), 2);
        assert!(tree.root().unwrap().children.len() == 1);
    }

    #[test]
    fn collapse_then_reexpand_reproduces_the_same_ids() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);
        let steps = payload(vec![entry("C", 60, 100.0)], 0);

        tree.apply_expansion(&id(&["A"]), &steps);
        let first = tree.node(&id(&["A", "C"])).unwrap().id.clone();

        tree.collapse(&id(&["A"]));
        tree.apply_expansion(&id(&["A"]), &steps);
        let second = tree.node(&id(&["A", "C"])).unwrap().id.clone();

        assert_eq!(first, second);
    }

    #[test]
    fn mid_tree_group_promotion_extends_the_parent_path() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);
        tree.apply_expansion(
            &id(&["A"]),
            &payload(
                vec![group(
                    "Review",
                    60,
                    vec![
                        entry("Review | Desk", 40, 66.0),
                        entry("Review | Field", 20, 33.0),
                    ],
                )],
                0,
            ),
        );

        let g = tree.node(&id(&["A", "Review"])).unwrap();
        assert!(g.is_group);
        assert_eq!(g.path, vec!["A".to_owned()]);

        let added = tree.promote_group(&id(&["A", "Review"]));
        assert_eq!(added, 2);

        let desk = tree.node(&id(&["A", "Review", "Review | Desk"])).unwrap();
        assert_eq!(
            desk.path,
            vec!["A".to_owned(), "Review | Desk".to_owned()]
        );
        assert!(!desk.is_starting);
        assert_eq!(desk.depth, 3);
    }

    #[test]
    fn starting_group_children_share_the_group_path() {
        let mut tree = FlowTree::build_root(
            100,
            vec![group(
                "Intake",
                100,
                vec![entry("Intake | Open", 70, 70.0), entry("Intake | Call", 30, 30.0)],
            )],
        );

        let added = tree.promote_group(&id(&["Intake"]));
        assert_eq!(added, 2);

        let open = tree.node(&id(&["Intake", "Intake | Open"])).unwrap();
        assert_eq!(open.path, vec!["Intake".to_owned()]);
        assert!(open.is_starting);

        let call = tree.node(&id(&["Intake", "Intake | Call"])).unwrap();
        assert_eq!(call.path, vec!["Intake".to_owned()]);
        assert_ne!(open.id, call.id);
    }

    #[test]
    fn bucket_members_display_the_activity_without_the_prefix() {
        let mut tree = FlowTree::build_root(
            100,
            vec![group(
                "Intake",
                100,
                vec![entry("Intake | Open", 70, 70.0), entry("Solo step", 30, 30.0)],
            )],
        );
        tree.promote_group(&id(&["Intake"]));

        let open = tree.node(&id(&["Intake", "Intake | Open"])).unwrap();
        assert_eq!(open.name, "Open");
        assert_eq!(open.internal_key.as_deref(), Some("Intake | Open"));

        // A member without the compound prefix keeps its key as the label.
        let solo = tree.node(&id(&["Intake", "Solo step"])).unwrap();
        assert_eq!(solo.name, "Solo step");
        assert_eq!(solo.internal_key, None);
    }

    #[test]
    fn promotion_reuses_stored_children_after_collapse() {
        let mut tree = FlowTree::build_root(
            100,
            vec![group(
                "Intake",
                100,
                vec![entry("Intake | Open", 70, 70.0), entry("Intake | Call", 30, 30.0)],
            )],
        );

        tree.promote_group(&id(&["Intake"]));
        tree.collapse(&id(&["Intake"]));

        let g = tree.node(&id(&["Intake"])).unwrap();
        assert!(!g.expanded);
        assert_eq!(g.stored_children.len(), 2);

        let added = tree.promote_group(&id(&["Intake"]));
        assert_eq!(added, 2);
        assert!(tree.contains(&id(&["Intake", "Intake | Open"])));
    }

    #[test]
    fn repeated_promotion_is_a_no_op() {
        let mut tree = FlowTree::build_root(
            100,
            vec![group(
                "Intake",
                100,
                vec![entry("Intake | Open", 70, 70.0), entry("Intake | Call", 30, 30.0)],
            )],
        );

        assert_eq!(tree.promote_group(&id(&["Intake"])), 2);
        assert_eq!(tree.promote_group(&id(&["Intake"])), 0);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn nested_groups_inherit_the_path_rules() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);
        tree.apply_expansion(
            &id(&["A"]),
            &payload(
                vec![group(
                    "Review",
                    60,
                    vec![
                        group(
                            "Desk",
                            40,
                            vec![
                                entry("Desk | Quick", 25, 62.0),
                                entry("Desk | Full", 15, 37.0),
                            ],
                        ),
                        entry("Review | Field", 20, 33.0),
                    ],
                )],
                0,
            ),
        );

        tree.promote_group(&id(&["A", "Review"]));
        let nested = tree.node(&id(&["A", "Review", "Desk"])).unwrap();
        assert!(nested.is_group);
        assert_eq!(nested.path, vec!["A".to_owned()]);

        tree.promote_group(&id(&["A", "Review", "Desk"]));
        let quick = tree
            .node(&id(&["A", "Review", "Desk", "Desk | Quick"]))
            .unwrap();
        assert_eq!(
            quick.path,
            vec!["A".to_owned(), "Desk | Quick".to_owned()]
        );
    }

    #[test]
    fn depth_always_follows_the_parent() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);
        tree.apply_expansion(&id(&["A"]), &payload(vec![entry("C", 60, 100.0)], 0));
        tree.apply_expansion(&id(&["A", "C"]), &payload(vec![entry("D", 60, 100.0)], 0));

        for node in tree.flatten() {
            match &node.parent {
                Some(parent_id) => {
                    let parent = tree.node(parent_id).unwrap();
                    assert_eq!(node.depth, parent.depth + 1);
                }
                None => assert_eq!(node.depth, 0),
            }
        }
    }

    #[test]
    fn flatten_puts_parents_before_children() {
        let mut tree =
            FlowTree::build_root(100, vec![entry("A", 60, 60.0), entry("B", 40, 40.0)]);
        tree.apply_expansion(&id(&["A"]), &payload(vec![entry("C", 60, 100.0)], 0));

        let order = tree
            .flatten()
            .iter()
            .map(|node| node.id.clone())
            .collect::<Vec<_>>();
        let position = |needle: &str| order.iter().position(|id| id == needle).unwrap();

        assert_eq!(position(ROOT_ID), 0);
        assert!(position(&id(&["A"])) < position(&id(&["A", "C"])));
    }

    #[test]
    fn chain_to_root_walks_the_parent_links() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);
        tree.apply_expansion(&id(&["A"]), &payload(vec![entry("C", 60, 100.0)], 0));

        let chain = tree.chain_to_root(&id(&["A", "C"]));
        assert_eq!(
            chain,
            vec![id(&["A", "C"]), id(&["A"]), ROOT_ID.to_owned()]
        );
    }

    #[test]
    fn pins_survive_until_cleared() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);

        tree.set_pin(&id(&["A"]), Some((12.0, 240.0)));
        assert_eq!(tree.node(&id(&["A"])).unwrap().pin, Some((12.0, 240.0)));

        tree.clear_pins();
        assert_eq!(tree.node(&id(&["A"])).unwrap().pin, None);
    }

    #[test]
    fn count_mismatch_keeps_children_attached() {
        let mut tree = FlowTree::build_root(100, vec![entry("A", 60, 60.0)]);

        // 40 + 10 != 60; the discrepancy is logged but the children stay.
        let added = tree.apply_expansion(
            &id(&["A"]),
            &payload(vec![entry("C", 40, 66.0), entry("D", 10, 16.0)], 0),
        );
        assert_eq!(added, 2);
        assert!(tree.contains(&id(&["A", "C"])));
        assert!(tree.contains(&id(&["A", "D"])));
    }
}
