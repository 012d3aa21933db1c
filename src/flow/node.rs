use crate::api::types::StepEntry;

/// Joins the key segments inside a node id. Step names coming from the API
/// are plain display text and never contain this control character; ingestion
/// replaces it defensively so sibling keys always produce distinct ids.
pub const ID_SEPARATOR: char = '\u{1f}';

pub const ROOT_ID: &str = "root";

/// Reserved step key the statistics backend uses to mark the end of a flow.
pub const TERMINATION_KEY: &str = "END";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Termination,
    Ordinary,
}

/// Duration statistics reported for one step of a flow.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepStats {
    pub avg_duration: Option<f64>,
    pub median_duration: Option<f64>,
    pub max_duration: Option<f64>,
    pub mean_cumulative: Option<f64>,
    pub median_cumulative: Option<f64>,
    pub avg_remaining_steps: Option<f64>,
}

impl StepStats {
    pub fn from_entry(entry: &StepEntry) -> Self {
        Self {
            avg_duration: entry.avg_duration_minutes,
            median_duration: entry.median_duration,
            max_duration: entry.max_duration,
            mean_cumulative: entry.mean_cumulative_time,
            median_cumulative: entry.median_cumulative_time,
            avg_remaining_steps: entry.avg_remaining_steps,
        }
    }
}

/// One node of the expanded flow tree.
///
/// `path` is the sequence of step keys used for follow-up API queries. Group
/// nodes are a visual bucket only: a mid-tree group carries its parent's path
/// unchanged, and promoting its stored children appends each child key to
/// that shared path. Children of a starting-bucket group instead share the
/// group's single-segment path as-is.
#[derive(Clone, Debug)]
pub struct FlowNode {
    pub id: String,
    pub name: String,
    /// Raw backend key when it differs from the display name: activity nodes
    /// inside a process bucket show the bare activity while their key stays
    /// the compound `"Process | Activity"` form.
    pub internal_key: Option<String>,
    pub kind: NodeKind,
    pub count: u64,
    pub percentage: f32,
    pub depth: usize,
    pub path: Vec<String>,
    pub is_group: bool,
    pub is_starting: bool,
    pub has_children: bool,
    pub expanded: bool,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub stored_children: Vec<StepEntry>,
    pub activity_count: Option<usize>,
    pub stats: StepStats,
    pub pin: Option<(f32, f32)>,
}

impl FlowNode {
    pub fn root(total_claims: u64) -> Self {
        Self {
            id: ROOT_ID.to_owned(),
            name: "All Claims".to_owned(),
            internal_key: None,
            kind: NodeKind::Root,
            count: total_claims,
            percentage: 100.0,
            depth: 0,
            path: Vec::new(),
            is_group: false,
            is_starting: false,
            has_children: false,
            expanded: true,
            parent: None,
            children: Vec::new(),
            stored_children: Vec::new(),
            activity_count: None,
            stats: StepStats::default(),
            pin: None,
        }
    }

    pub fn is_termination(&self) -> bool {
        self.kind == NodeKind::Termination
    }
}

/// A node's id is its parent's id plus its own key. The chain therefore
/// records the full visual ancestry, including group hops that the query
/// `path` deliberately leaves out, so re-expanding the same branch always
/// reproduces the same ids no matter the expansion order.
pub fn child_id(parent_id: &str, key: &str) -> String {
    let mut id = String::with_capacity(parent_id.len() + key.len() + 1);
    id.push_str(parent_id);
    id.push(ID_SEPARATOR);
    id.push_str(key);
    id
}

pub fn sanitize_key(raw: &str) -> String {
    if raw.contains(ID_SEPARATOR) {
        raw.replace(ID_SEPARATOR, " ")
    } else {
        raw.to_owned()
    }
}
