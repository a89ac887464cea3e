//! GraphCanonicalizer: raw multigraph → named, connected subnetworks.
//!
//! Pipeline order is fixed: [`dedupe`] → [`split`] → optional [`collapse`] →
//! [`rename`]. Collapsing groups nodes by their `name` attribute and therefore
//! has to run before renaming turns that attribute into the node identity.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::stable_graph::NodeIndex;
use rayon::prelude::*;

use crate::dot::{RawMultiGraph, RawNode};

use super::{CLOSING_MARKER, MISSING_MARKER, NetworkGraph, ReactionNetwork, StageNode, Transition};

/// Options for [`canonicalize`].
#[derive(Debug, Clone, Default)]
pub struct CanonicalizeOptions {
    /// Contract nodes sharing a display name.
    pub collapse: bool,
    /// Restrict the series catalog to these keys (`None` = every key on a node).
    pub used_keys: Option<Vec<u32>>,
}

/// Run the full canonicalization pipeline.
///
/// Subnetworks are collapsed and renamed in parallel; the returned order is the
/// component enumeration order of the deduplicated graph.
pub fn canonicalize(raw: &RawMultiGraph, options: &CanonicalizeOptions) -> Vec<ReactionNetwork> {
    let canonical = dedupe(raw, options.used_keys.as_deref());
    let subnetworks = split(&canonical);
    tracing::info!(
        nodes = canonical.node_count(),
        edges = canonical.edge_count(),
        subnetworks = subnetworks.len(),
        "canonicalized reaction network"
    );
    subnetworks
        .into_par_iter()
        .map(|sub| {
            let sub = if options.collapse { collapse(&sub) } else { sub };
            rename(&sub)
        })
        .collect()
}

/// Display name of a node: first label line without the opening quote.
///
/// Falls back to the DOT id when the node has no label.
pub fn node_display_name(node: &RawNode) -> String {
    let name = first_label_line(&node.label);
    if name.is_empty() {
        node.id.clone()
    } else {
        name.to_string()
    }
}

/// Name of a merged transition, derived from the first parallel edge's label.
///
/// Closing transitions take the first of `keys`, which callers pass in
/// declaration order.
pub fn transition_name(label: &str, keys: &[u32]) -> String {
    if label.contains(MISSING_MARKER) {
        let tail: String = label.chars().skip(2).collect();
        tail.strip_suffix('"').unwrap_or(&tail).to_string()
    } else if label.contains("Closing") {
        format!("{CLOSING_MARKER}{}", keys.first().copied().unwrap_or_default())
    } else {
        first_label_line(label).to_string()
    }
}

fn first_label_line(label: &str) -> &str {
    let line = label.split("\\n").next().unwrap_or_default();
    let line = line.strip_prefix('"').unwrap_or(line);
    line.strip_suffix('"').unwrap_or(line)
}

/// Merge parallel edges into single transitions.
///
/// Every distinct unordered node pair gets one edge whose keys are the union of
/// the parallel edges' keys. Formulas start out empty.
pub fn dedupe(raw: &RawMultiGraph, used_keys: Option<&[u32]>) -> ReactionNetwork {
    let mut graph = NetworkGraph::default();
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(raw.nodes.len());

    for node in &raw.nodes {
        let ix = graph.add_node(StageNode {
            id: node.id.clone(),
            original_id: node.id.clone(),
            name: node_display_name(node),
            label: node.label.clone(),
            keys: node.keys.clone(),
            formula: None,
        });
        index.insert(node.id.as_str(), ix);
    }

    for edge in &raw.edges {
        let (Some(&a), Some(&b)) = (
            index.get(edge.source.as_str()),
            index.get(edge.target.as_str()),
        ) else {
            continue;
        };
        match graph.find_edge(a, b) {
            Some(existing) => {
                if let Some(transition) = graph.edge_weight_mut(existing) {
                    transition.merge_keys(&[edge.key]);
                }
            }
            None => {
                // Named from the first parallel edge: its label and its key.
                graph.add_edge(
                    a,
                    b,
                    Transition {
                        name: transition_name(&edge.label, &[edge.key]),
                        label: edge.label.clone(),
                        keys: vec![edge.key],
                        formula: None,
                    },
                );
            }
        }
    }

    let catalog = raw.series_catalog();
    let series = match used_keys {
        Some(keys) => catalog.subset(keys),
        None => {
            let present: std::collections::BTreeSet<u32> =
                raw.nodes.iter().flat_map(|n| n.keys.iter().copied()).collect();
            catalog.subset(&present)
        }
    };

    ReactionNetwork { graph, series }
}

/// Split a network into its connected components.
///
/// Components are enumerated from the lowest unvisited node; nodes and edges
/// keep their relative order. Each component only keeps the catalog entries of
/// keys present on its nodes.
pub fn split(network: &ReactionNetwork) -> Vec<ReactionNetwork> {
    let graph = &network.graph;
    let mut visited: HashSet<NodeIndex> = HashSet::with_capacity(graph.node_count());
    let mut components = Vec::new();

    for start in graph.node_indices() {
        if !visited.insert(start) {
            continue;
        }
        let mut members = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for next in graph.neighbors(current) {
                if visited.insert(next) {
                    members.push(next);
                    queue.push_back(next);
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }

    components
        .into_iter()
        .map(|members| {
            let mut sub = NetworkGraph::default();
            let mut remap: HashMap<NodeIndex, NodeIndex> = HashMap::with_capacity(members.len());
            for &ix in &members {
                if let Some(node) = graph.node_weight(ix) {
                    remap.insert(ix, sub.add_node(node.clone()));
                }
            }
            for ex in graph.edge_indices() {
                let Some((a, b)) = graph.edge_endpoints(ex) else {
                    continue;
                };
                if let (Some(&na), Some(&nb), Some(t)) =
                    (remap.get(&a), remap.get(&b), graph.edge_weight(ex))
                {
                    sub.add_edge(na, nb, t.clone());
                }
            }
            let mut sub = ReactionNetwork {
                graph: sub,
                series: Default::default(),
            };
            sub.series = network.series.subset(&sub.node_keys());
            sub
        })
        .collect()
}

/// Contract nodes that share a display name into the first of them.
///
/// The plan (which node absorbs which) is computed over the unchanged input,
/// then a new graph is assembled: absorbed nodes' edges are redirected to the
/// keeper, and an edge that already exists between the redirected pair only
/// contributes its keys. Absorbed nodes' keys are merged into the keeper.
pub fn collapse(network: &ReactionNetwork) -> ReactionNetwork {
    let graph = &network.graph;

    let mut groups: Vec<Vec<NodeIndex>> = Vec::new();
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for (ix, node) in network.nodes() {
        match by_name.get(node.name.as_str()) {
            Some(&g) => groups[g].push(ix),
            None => {
                by_name.insert(node.name.as_str(), groups.len());
                groups.push(vec![ix]);
            }
        }
    }

    if groups.iter().all(|g| g.len() == 1) {
        return network.clone();
    }

    let mut keeper_of: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    for group in &groups {
        for &member in group {
            keeper_of.insert(member, group[0]);
        }
    }

    let mut out = NetworkGraph::default();
    let mut remap: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    for (ix, node) in network.nodes() {
        if keeper_of.get(&ix) != Some(&ix) {
            continue;
        }
        let mut kept = node.clone();
        for (other, other_node) in network.nodes() {
            if other != ix && keeper_of.get(&other) == Some(&ix) {
                for key in &other_node.keys {
                    if !kept.keys.contains(key) {
                        kept.keys.push(*key);
                    }
                }
            }
        }
        remap.insert(ix, out.add_node(kept));
    }

    for ex in graph.edge_indices() {
        let (Some((a, b)), Some(transition)) = (graph.edge_endpoints(ex), graph.edge_weight(ex))
        else {
            continue;
        };
        let (Some(na), Some(nb)) = (
            keeper_of.get(&a).and_then(|k| remap.get(k)),
            keeper_of.get(&b).and_then(|k| remap.get(k)),
        ) else {
            continue;
        };
        match out.find_edge(*na, *nb) {
            Some(existing) => {
                if let Some(t) = out.edge_weight_mut(existing) {
                    t.merge_keys(&transition.keys);
                }
            }
            None => {
                out.add_edge(*na, *nb, transition.clone());
            }
        }
    }

    let absorbed = network.node_count() - out.node_count();
    tracing::debug!(absorbed, "collapsed same-named nodes");

    ReactionNetwork {
        graph: out,
        series: network.series.clone(),
    }
}

/// Use each node's display name as its identity.
///
/// If two nodes share a name the network is returned unchanged, keeping the
/// original identities, and a warning is emitted.
pub fn rename(network: &ReactionNetwork) -> ReactionNetwork {
    let distinct: HashSet<&str> = network.nodes().map(|(_, n)| n.name.as_str()).collect();
    if distinct.len() != network.node_count() {
        tracing::warn!(
            nodes = network.node_count(),
            distinct_names = distinct.len(),
            "node names are not unique identifiers, original ids are kept"
        );
        return network.clone();
    }

    let mut renamed = network.clone();
    for node in renamed.graph.node_weights_mut() {
        node.id = node.name.clone();
    }
    renamed
}
