use std::fmt;

mod node;
mod tree;

pub use node::{FlowNode, NodeKind, ROOT_ID, StepStats, TERMINATION_KEY};
pub use tree::FlowTree;

/// Granularity of the explored flow: whole processes, or the individual
/// activities inside them. The two levels use disjoint path separators on
/// the wire, so a path built for one level can never be sent to the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum FlowLevel {
    Process,
    Activity,
}

impl FlowLevel {
    pub fn path_separator(self) -> &'static str {
        match self {
            Self::Process => ",",
            Self::Activity => ";;",
        }
    }

    pub fn joined_path(self, path: &[String]) -> String {
        path.join(self.path_separator())
    }

    pub fn query_type(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Activity => "activity",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Process => "Process flow",
            Self::Activity => "Activity flow",
        }
    }
}

impl fmt::Display for FlowLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Process => "process",
            Self::Activity => "activity",
        })
    }
}

/// Which dataset variant the statistics backend should aggregate over.
/// Only meaningful at the process level; activity queries ignore it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum FlowMode {
    Detailed,
    Aggregated,
}

impl FlowMode {
    pub fn query_value(self) -> &'static str {
        match self {
            Self::Detailed => "detailed",
            Self::Aggregated => "aggregated",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Detailed => "Detailed",
            Self::Aggregated => "Aggregated",
        }
    }
}

impl fmt::Display for FlowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}
