//! Semantic property graph materialized from a triple set.
//!
//! Nodes are the subjects and objects of the triples; a directed edge joins
//! every (subject, object) pair and is named after the first predicate seen
//! for that pair. [`process`] then classifies, folds, filters and ranks the
//! graph; [`export`] writes it as JSON for visualisation.

pub mod export;
pub mod process;

use std::collections::HashMap;

use oxigraph::model::{Term, Triple};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use serde::Serialize;

/// Kind of RDF term a node was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TermKind {
    Iri,
    Blank,
    Literal,
}

/// Semantic type tag of a node.
///
/// Numeric ids: 0 unclassified, 1 generic IRI, `i + 2` individual of the main
/// class at position `i`, 6 main class node, 7 blank node, 8 literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeTag {
    Unclassified,
    Iri,
    Instance(usize),
    Class,
    Blank,
    Literal,
}

impl TypeTag {
    pub fn id(self) -> usize {
        match self {
            TypeTag::Unclassified => 0,
            TypeTag::Iri => 1,
            TypeTag::Instance(index) => index + 2,
            TypeTag::Class => 6,
            TypeTag::Blank => 7,
            TypeTag::Literal => 8,
        }
    }
}

/// A node of the semantic graph.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticNode {
    /// Identifier: full IRI, blank node id or literal lexical form.
    pub id: String,
    pub kind: TermKind,
    /// Enumeration index at materialization time.
    pub ndx: usize,
    pub type_tag: TypeTag,
    /// Resolved declared type, when the lookup found one.
    pub type_name: Option<String>,
    pub text: String,
    pub name: String,
    /// Folded literal values, `predicate:value` lines.
    pub dataprop: Option<String>,
    pub degree: usize,
}

/// A predicate-named edge.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticEdge {
    pub ndx: usize,
    /// Predicate IRI.
    pub text: String,
    /// Local name of the predicate.
    pub name: String,
    /// `name` with spaces replaced by underscores.
    pub name_summ: String,
}

impl SemanticEdge {
    fn from_predicate(ndx: usize, iri: &str) -> Self {
        let name = local_name(iri).to_string();
        Self {
            ndx,
            text: iri.to_string(),
            name_summ: name.replace(' ', "_"),
            name,
        }
    }
}

/// The materialized property graph plus processing results.
#[derive(Debug, Clone, Default)]
pub struct SemanticGraph {
    pub graph: StableDiGraph<SemanticNode, SemanticEdge>,
    /// IRIs of the main class nodes.
    pub default_state: Vec<String>,
    /// Nodes by descending degree, filled by ranking.
    pub top_nodes: Vec<(NodeIndex, usize)>,
}

impl SemanticGraph {
    /// Build the graph from triples.
    pub fn materialize(triples: &[Triple]) -> Self {
        let mut graph: StableDiGraph<SemanticNode, SemanticEdge> = StableDiGraph::new();
        let mut index: HashMap<Term, NodeIndex> = HashMap::new();

        let mut node_for = |graph: &mut StableDiGraph<SemanticNode, SemanticEdge>, term: Term| {
            if let Some(&ix) = index.get(&term) {
                return ix;
            }
            let ndx = graph.node_count();
            let ix = graph.add_node(SemanticNode::from_term(ndx, &term));
            index.insert(term, ix);
            ix
        };

        for triple in triples {
            let s = node_for(&mut graph, Term::from(triple.subject.clone()));
            let o = node_for(&mut graph, triple.object.clone());
            if graph.find_edge(s, o).is_none() {
                let ndx = graph.edge_count();
                graph.add_edge(s, o, SemanticEdge::from_predicate(ndx, triple.predicate.as_str()));
            }
        }

        tracing::debug!(
            triples = triples.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "semantic graph materialized"
        );
        Self {
            graph,
            default_state: Vec::new(),
            top_nodes: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in enumeration order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &SemanticNode)> {
        self.graph
            .node_indices()
            .filter_map(|ix| self.graph.node_weight(ix).map(|n| (ix, n)))
    }

    pub fn node_by_id(&self, id: &str) -> Option<NodeIndex> {
        self.nodes().find(|(_, n)| n.id == id).map(|(ix, _)| ix)
    }

    /// Number of edges touching the node, both directions.
    pub fn degree(&self, ix: NodeIndex) -> usize {
        self.graph.edges_directed(ix, Direction::Outgoing).count()
            + self.graph.edges_directed(ix, Direction::Incoming).count()
    }
}

impl SemanticNode {
    fn from_term(ndx: usize, term: &Term) -> Self {
        let (kind, id) = match term {
            Term::NamedNode(n) => (TermKind::Iri, n.as_str().to_string()),
            Term::BlankNode(b) => (TermKind::Blank, b.as_str().to_string()),
            Term::Literal(l) => (TermKind::Literal, l.value().to_string()),
            #[allow(unreachable_patterns)]
            other => (TermKind::Iri, other.to_string()),
        };
        Self {
            id,
            kind,
            ndx,
            type_tag: TypeTag::Unclassified,
            type_name: None,
            text: String::new(),
            name: String::new(),
            dataprop: None,
            degree: 0,
        }
    }
}

/// Strip everything up to and including the last `#`.
pub fn local_name(iri: &str) -> &str {
    match iri.rfind('#') {
        Some(pos) => &iri[pos + 1..],
        None => iri,
    }
}
