//! Canonical reaction networks.
//!
//! A [`ReactionNetwork`] is a simple undirected graph (petgraph `StableUnGraph`)
//! whose nodes are stable points of an energy profile and whose edges are the
//! transitions between them. Parallel edges of the raw multigraph are merged
//! into one [`Transition`] holding all their series keys.
//!
//! - [`canonical`]: dedupe, split, collapse, rename
//! - [`formula`]: formula annotation and formula tokenization

pub mod canonical;
pub mod formula;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use serde::Serialize;

pub use crate::dot::SeriesCatalog;

/// Substring marking a transition-state element.
pub const TS_MARKER: &str = "TS";
/// Substring marking a transition with no computed transition state.
pub const MISSING_MARKER: &str = "missing";
/// Prefix of the names given to series-closing transitions.
pub const CLOSING_MARKER: &str = "closing";

/// A node of a reaction network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageNode {
    /// Current identity: the original DOT id, or `name` after renaming.
    pub id: String,
    /// DOT identifier the node was read with.
    pub original_id: String,
    /// Display name taken from the first label line.
    pub name: String,
    /// Raw DOT label.
    pub label: String,
    /// Series keys.
    pub keys: Vec<u32>,
    /// Formula text, filled by the formula annotator.
    pub formula: Option<String>,
}

/// An edge of a reaction network, merging every parallel edge of a node pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub name: String,
    /// Raw DOT label of the first parallel edge.
    pub label: String,
    /// Sorted, deduplicated keys of the merged parallel edges.
    pub keys: Vec<u32>,
    pub formula: Option<String>,
}

impl Transition {
    /// Whether the name follows the transition-state naming convention.
    pub fn is_transition_state(&self) -> bool {
        self.name.contains(TS_MARKER)
    }

    /// Missing and closing transitions have no transition-state stage.
    pub fn lacks_transition_state(&self) -> bool {
        self.name.contains(MISSING_MARKER) || self.name.contains(CLOSING_MARKER)
    }

    pub(crate) fn merge_keys(&mut self, keys: &[u32]) {
        self.keys.extend_from_slice(keys);
        self.keys.sort_unstable();
        self.keys.dedup();
    }
}

/// Graph type shared by canonical graphs and their subnetworks.
pub type NetworkGraph = StableUnGraph<StageNode, Transition>;

/// A simple reaction network plus the series catalog of its keys.
#[derive(Debug, Clone, Default)]
pub struct ReactionNetwork {
    pub graph: NetworkGraph,
    pub series: SeriesCatalog,
}

/// The whole deduplicated network.
pub type CanonicalGraph = ReactionNetwork;
/// One connected component of a [`CanonicalGraph`].
pub type ConnectedSubnetwork = ReactionNetwork;

impl ReactionNetwork {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in enumeration order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &StageNode)> {
        self.graph
            .node_indices()
            .filter_map(|ix| self.graph.node_weight(ix).map(|n| (ix, n)))
    }

    /// Edges in enumeration order with their endpoint nodes.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIndex, &StageNode, &StageNode, &Transition)> {
        self.graph.edge_indices().filter_map(|ex| {
            let (a, b) = self.graph.edge_endpoints(ex)?;
            Some((
                ex,
                self.graph.node_weight(a)?,
                self.graph.node_weight(b)?,
                self.graph.edge_weight(ex)?,
            ))
        })
    }

    /// Find a node by its current identity.
    pub fn node_by_id(&self, id: &str) -> Option<NodeIndex> {
        self.nodes().find(|(_, n)| n.id == id).map(|(ix, _)| ix)
    }

    /// Find an edge by transition name.
    pub fn edge_by_name(&self, name: &str) -> Option<EdgeIndex> {
        self.edges()
            .find(|(_, _, _, t)| t.name == name)
            .map(|(ex, _, _, _)| ex)
    }

    /// Identities of all nodes, in enumeration order.
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes().map(|(_, n)| n.id.clone()).collect()
    }

    /// Every series key present among the nodes.
    pub fn node_keys(&self) -> std::collections::BTreeSet<u32> {
        self.nodes().flat_map(|(_, n)| n.keys.iter().copied()).collect()
    }
}
