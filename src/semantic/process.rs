//! Processing stages of the semantic graph.
//!
//! Strict order: classify, fold literals, filter, rank. Every stage computes
//! its changes over the whole graph first and applies them afterwards, so no
//! stage mutates the graph while iterating it.

use std::collections::{BTreeSet, HashMap};

use oxigraph::model::{Term, Triple};
use oxigraph::model::vocab::rdf;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;

use crate::store::{OWL_NAMED_INDIVIDUAL, OntologySchema, OntologyStore};

use super::{SemanticGraph, TermKind, TypeTag, local_name};

/// Resolves the declared type of an IRI node.
pub trait TypeLookup {
    /// First declared type (class local name) of the node, if any.
    fn declared_type(&self, iri: &str) -> Option<String>;
}

impl TypeLookup for OntologyStore {
    fn declared_type(&self, iri: &str) -> Option<String> {
        let name = iri.strip_prefix(self.schema().namespace.as_str())?;
        self.query_type(name).map(str::to_string)
    }
}

/// Type lookup over a triple set: the first `rdf:type` of a subject that is
/// not `owl:NamedIndividual`.
#[derive(Debug, Clone, Default)]
pub struct RdfTypeLookup {
    types: HashMap<String, String>,
}

impl RdfTypeLookup {
    pub fn from_triples(triples: &[Triple]) -> Self {
        let mut types = HashMap::new();
        for triple in triples {
            if triple.predicate.as_ref() != rdf::TYPE {
                continue;
            }
            let (Term::NamedNode(subject), Term::NamedNode(class)) =
                (Term::from(triple.subject.clone()), &triple.object)
            else {
                continue;
            };
            if class.as_ref() == OWL_NAMED_INDIVIDUAL {
                continue;
            }
            types
                .entry(subject.as_str().to_string())
                .or_insert_with(|| local_name(class.as_str()).to_string());
        }
        Self { types }
    }
}

impl TypeLookup for RdfTypeLookup {
    fn declared_type(&self, iri: &str) -> Option<String> {
        self.types.get(iri).cloned()
    }
}

/// Main class table, built once per run: class name → type tag index.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    classes: Vec<(String, String)>,
    by_name: HashMap<String, usize>,
}

impl TypeTable {
    /// `classes` holds (name, IRI) pairs in tag order.
    pub fn new(classes: Vec<(String, String)>) -> Self {
        let by_name = classes
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
        Self { classes, by_name }
    }

    pub fn from_schema(schema: &OntologySchema) -> Self {
        Self::new(
            schema
                .main_classes
                .iter()
                .filter_map(|name| Some((name.clone(), schema.class_iri(name)?)))
                .collect(),
        )
    }

    pub fn index_of(&self, class: &str) -> Option<usize> {
        self.by_name.get(class).copied()
    }

    pub fn class_iris(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|(_, iri)| iri.as_str())
    }
}

/// Set `type_tag`, `text` and `name` on every node and tag the main class
/// nodes as the graph's default state.
///
/// A failed type lookup leaves an IRI node tagged as a generic IRI.
pub fn classify(graph: &mut SemanticGraph, table: &TypeTable, lookup: &dyn TypeLookup) {
    let indices: Vec<NodeIndex> = graph.graph.node_indices().collect();
    for ix in indices {
        let Some(node) = graph.graph.node_weight_mut(ix) else {
            continue;
        };
        node.text = node.id.clone();
        match node.kind {
            TermKind::Iri => {
                node.type_tag = TypeTag::Iri;
                node.name = local_name(&node.id).to_string();
                node.type_name = lookup.declared_type(&node.id);
                if let Some(index) = node.type_name.as_deref().and_then(|t| table.index_of(t)) {
                    node.type_tag = TypeTag::Instance(index);
                }
            }
            TermKind::Blank => {
                node.type_tag = TypeTag::Blank;
                node.name = format!("BNode_{}", node.id);
            }
            TermKind::Literal => {
                node.type_tag = TypeTag::Literal;
                node.name = format!("Literal_N{}", node.ndx);
            }
        }
    }

    graph.default_state = table.class_iris().map(str::to_string).collect();
    for iri in &graph.default_state {
        if let Some(ix) = graph.node_by_id(iri) {
            graph.graph[ix].type_tag = TypeTag::Class;
        }
    }
}

/// Fold literal nodes into their neighbour's `dataprop` attribute.
///
/// Returns the number of literal nodes removed.
pub fn fold_literals(graph: &mut SemanticGraph) -> usize {
    let mut folds: Vec<(NodeIndex, String)> = Vec::new();
    let mut literals: BTreeSet<NodeIndex> = BTreeSet::new();

    for edge in graph.graph.edge_references() {
        let (a, b) = (edge.source(), edge.target());
        let is_literal = |ix: NodeIndex| graph.graph[ix].kind == TermKind::Literal;
        let (owner, literal) = if is_literal(b) {
            (a, b)
        } else if is_literal(a) {
            (b, a)
        } else {
            continue;
        };
        literals.insert(literal);
        folds.push((
            owner,
            format!("{}:{}", edge.weight().name, graph.graph[literal].id),
        ));
    }

    for (owner, entry) in folds {
        if literals.contains(&owner) {
            continue;
        }
        let node = &mut graph.graph[owner];
        node.dataprop = Some(match node.dataprop.take() {
            Some(existing) => format!("{existing}\n{entry}"),
            None => entry,
        });
    }
    for &ix in &literals {
        graph.graph.remove_node(ix);
    }
    tracing::debug!(removed = literals.len(), remaining = graph.node_count(), "literal nodes folded");
    literals.len()
}

/// Type names a node carries: targets of its `type` edges and its resolved type.
fn type_names(graph: &SemanticGraph, ix: NodeIndex) -> Vec<&str> {
    let mut names: Vec<&str> = graph
        .graph
        .edges_directed(ix, Direction::Outgoing)
        .filter(|e| e.weight().name == "type")
        .map(|e| graph.graph[e.target()].id.as_str())
        .collect();
    if let Some(t) = graph.graph[ix].type_name.as_deref() {
        names.push(t);
    }
    names
}

/// Remove nodes whose type name contains a blacklisted substring.
pub fn filter_by_type(graph: &mut SemanticGraph, blacklist: &[String]) -> usize {
    if blacklist.is_empty() {
        return 0;
    }
    let before = graph.node_count();
    let mut removed: BTreeSet<NodeIndex> = BTreeSet::new();
    for entry in blacklist {
        let hits: Vec<NodeIndex> = graph
            .graph
            .node_indices()
            .filter(|&ix| type_names(graph, ix).iter().any(|t| t.contains(entry.as_str())))
            .collect();
        tracing::debug!(entry = %entry, nodes = hits.len(), "type filter");
        removed.extend(hits);
    }
    for &ix in &removed {
        graph.graph.remove_node(ix);
    }
    tracing::info!(before, after = graph.node_count(), "type filtering applied");
    removed.len()
}

/// Remove nodes whose identifier or name contains a blacklisted substring.
///
/// Entries are applied one after the other to the nodes still kept, so the
/// kept set only ever shrinks.
pub fn filter_by_string(graph: &mut SemanticGraph, blacklist: &[String]) -> usize {
    if blacklist.is_empty() {
        return 0;
    }
    let before = graph.node_count();
    let mut working: Vec<NodeIndex> = graph.graph.node_indices().collect();
    let mut removed: Vec<NodeIndex> = Vec::new();
    for entry in blacklist {
        let (hits, kept): (Vec<NodeIndex>, Vec<NodeIndex>) = working.into_iter().partition(|&ix| {
            let node = &graph.graph[ix];
            node.id.contains(entry.as_str()) || node.name.contains(entry.as_str())
        });
        tracing::debug!(entry = %entry, nodes = hits.len(), "string filter");
        removed.extend(hits);
        working = kept;
    }
    for &ix in &removed {
        graph.graph.remove_node(ix);
    }
    tracing::info!(before, after = graph.node_count(), "string filtering applied");
    removed.len()
}

/// Record node degrees and return nodes sorted by descending degree.
/// Ties keep enumeration order.
pub fn rank_by_degree(graph: &mut SemanticGraph) -> Vec<(NodeIndex, usize)> {
    let mut ranked: Vec<(NodeIndex, usize)> = graph
        .graph
        .node_indices()
        .map(|ix| (ix, graph.degree(ix)))
        .collect();
    for &(ix, degree) in &ranked {
        graph.graph[ix].degree = degree;
    }
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    graph.top_nodes = ranked.clone();
    ranked
}

/// Options for [`process`].
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub fold_literals: bool,
    pub type_blacklist: Vec<String>,
    pub string_blacklist: Vec<String>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            fold_literals: true,
            type_blacklist: Vec::new(),
            string_blacklist: Vec::new(),
        }
    }
}

/// Counts reported by [`process`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub literals_folded: usize,
    pub removed_by_type: usize,
    pub removed_by_string: usize,
}

/// Run the full pipeline on a materialized graph.
pub fn process(
    graph: &mut SemanticGraph,
    table: &TypeTable,
    lookup: &dyn TypeLookup,
    options: &ProcessOptions,
) -> ProcessSummary {
    classify(graph, table, lookup);
    let literals_folded = if options.fold_literals {
        fold_literals(graph)
    } else {
        0
    };
    let removed_by_type = filter_by_type(graph, &options.type_blacklist);
    let removed_by_string = filter_by_string(graph, &options.string_blacklist);
    rank_by_degree(graph);
    ProcessSummary {
        literals_folded,
        removed_by_type,
        removed_by_string,
    }
}
