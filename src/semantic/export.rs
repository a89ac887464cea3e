//! JSON export of a processed semantic graph.

use std::path::Path;

use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

use super::SemanticGraph;

/// Exported node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExport {
    pub id: String,
    pub ndx: usize,
    /// Numeric type tag.
    pub type_id: usize,
    pub name: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataprop: Option<String>,
    pub degree: usize,
}

/// Exported edge, endpoints given by node id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeExport {
    pub source: String,
    pub target: String,
    pub ndx: usize,
    pub text: String,
    pub name: String,
    pub name_summ: String,
}

/// Whole-graph export for visualisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticGraphExport {
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
    /// (node id, degree) by descending degree.
    pub top_nodes: Vec<(String, usize)>,
    pub default_state: Vec<String>,
}

impl SemanticGraphExport {
    pub fn from_graph(graph: &SemanticGraph) -> Self {
        let nodes = graph
            .nodes()
            .map(|(_, n)| NodeExport {
                id: n.id.clone(),
                ndx: n.ndx,
                type_id: n.type_tag.id(),
                name: n.name.clone(),
                text: n.text.clone(),
                dataprop: n.dataprop.clone(),
                degree: n.degree,
            })
            .collect();
        let edges = graph
            .graph
            .edge_references()
            .map(|e| EdgeExport {
                source: graph.graph[e.source()].id.clone(),
                target: graph.graph[e.target()].id.clone(),
                ndx: e.weight().ndx,
                text: e.weight().text.clone(),
                name: e.weight().name.clone(),
                name_summ: e.weight().name_summ.clone(),
            })
            .collect();
        let top_nodes = graph
            .top_nodes
            .iter()
            .filter_map(|&(ix, degree)| Some((graph.graph.node_weight(ix)?.id.clone(), degree)))
            .collect();
        Self {
            nodes,
            edges,
            top_nodes,
            default_state: graph.default_state.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), StoreError> {
        std::fs::write(path, self.to_json()?).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }
}
