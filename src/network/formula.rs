//! Formula annotation and formula tokens.
//!
//! Report metadata lists, per energy series, the steps of the profile with a
//! formula such as `c0+c3`: the `cN` codes of the calculations that make up
//! that point. The annotator copies those formulas onto canonical nodes and
//! transition-state edges; [`FormulaTokens`] later splits them back into codes.

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};

use super::{ReactionNetwork, TS_MARKER};

/// One step of a series as described by the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaRecord {
    /// Series the step belongs to.
    pub series: String,
    /// Step label: a node name, or a transition name containing `TS`.
    pub label: String,
    /// Formula text.
    pub formula: String,
}

impl FormulaRecord {
    pub fn new(series: impl Into<String>, label: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            label: label.into(),
            formula: formula.into(),
        }
    }

    /// Whether the label names a transition-state edge.
    pub fn targets_transition(&self) -> bool {
        self.label.contains(TS_MARKER)
    }
}

/// Outcome of [`annotate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationReport {
    pub nodes_annotated: usize,
    pub edges_annotated: usize,
    /// Labels that matched no node or edge in any subnetwork, in record order.
    pub unmatched: Vec<String>,
}

enum Target {
    Node(NodeIndex),
    Edge(EdgeIndex),
}

/// Map formula records onto subnetworks.
///
/// Records are consumed in order; inside one subnetwork only the first record
/// with a given label is used, so each node or edge receives at most one
/// formula. A label that matches nothing anywhere is reported and skipped.
pub fn annotate(subnetworks: &mut [ReactionNetwork], records: &[FormulaRecord]) -> AnnotationReport {
    let mut report = AnnotationReport::default();
    let mut matched: HashSet<&str> = HashSet::new();

    for (position, network) in subnetworks.iter_mut().enumerate() {
        let mut assignments: Vec<(Target, &str)> = Vec::new();
        {
            // First element wins on duplicate names.
            let mut ts_edges: HashMap<&str, EdgeIndex> = HashMap::new();
            for (ex, _, _, t) in network.edges() {
                if t.is_transition_state() {
                    ts_edges.entry(t.name.as_str()).or_insert(ex);
                }
            }
            let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
            for (ix, n) in network.nodes() {
                nodes.entry(n.name.as_str()).or_insert(ix);
            }

            let mut seen: HashSet<&str> = HashSet::new();
            for record in records {
                if !seen.insert(record.label.as_str()) {
                    continue;
                }
                let target = if record.targets_transition() {
                    ts_edges.get(record.label.as_str()).map(|&ex| Target::Edge(ex))
                } else {
                    nodes.get(record.label.as_str()).map(|&ix| Target::Node(ix))
                };
                match target {
                    Some(target) => {
                        matched.insert(record.label.as_str());
                        assignments.push((target, record.formula.as_str()));
                    }
                    None => tracing::debug!(
                        subnetwork = position,
                        label = %record.label,
                        "step label not present in subnetwork"
                    ),
                }
            }
        }

        for (target, formula) in assignments {
            match target {
                Target::Node(ix) => {
                    if let Some(node) = network.graph.node_weight_mut(ix) {
                        node.formula = Some(formula.to_string());
                        report.nodes_annotated += 1;
                    }
                }
                Target::Edge(ex) => {
                    if let Some(edge) = network.graph.edge_weight_mut(ex) {
                        edge.formula = Some(formula.to_string());
                        report.edges_annotated += 1;
                    }
                }
            }
        }
    }

    let mut reported: HashSet<&str> = HashSet::new();
    for record in records {
        if !matched.contains(record.label.as_str()) && reported.insert(record.label.as_str()) {
            tracing::warn!(
                label = %record.label,
                series = %record.series,
                "formula label matches no node or transition"
            );
            report.unmatched.push(record.label.clone());
        }
    }

    report
}

/// One `+`-anchored token of a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormulaToken<'a> {
    /// The species code, e.g. `c3`.
    pub code: &'a str,
    /// Byte offset of the code in the formula text.
    pub offset: usize,
}

/// Tokenizer for formula text.
///
/// Grammar: `formula := TOKEN? ( junk* '+' TOKEN )*` where `TOKEN` is a run of
/// word characters (alphanumeric or `_`). The start of the text counts as a
/// `+` anchor, so `c0+c1` yields `c0`, `c1`, while `c2` in `c0-c2` is ignored.
#[derive(Debug, Clone)]
pub struct FormulaTokens<'a> {
    text: &'a str,
    pos: usize,
    anchored: bool,
}

impl<'a> FormulaTokens<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            anchored: true,
        }
    }
}

impl<'a> Iterator for FormulaTokens<'a> {
    type Item = FormulaToken<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let rest = &self.text[self.pos..];
            if self.anchored {
                self.anchored = false;
                let len: usize = rest
                    .chars()
                    .take_while(|c| is_word_char(*c))
                    .map(char::len_utf8)
                    .sum();
                if len > 0 {
                    let start = self.pos;
                    self.pos += len;
                    return Some(FormulaToken {
                        code: &self.text[start..start + len],
                        offset: start,
                    });
                }
                continue;
            }
            let c = rest.chars().next()?;
            self.pos += c.len_utf8();
            if c == '+' {
                self.anchored = true;
            }
        }
        None
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
