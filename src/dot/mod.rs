//! DotIngest: raw reaction-network multigraphs from DOT text.
//!
//! Networks exported by the report tool are undirected multigraphs. Every node
//! carries a quoted key list (the energy series it belongs to) and a tooltip of
//! `Name:Energy` pairs, one per key; every edge is one parallel edge of a
//! series. This module only types those records. Deduplication and renaming
//! happen in [`crate::network`].

pub mod lexer;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::ParseError;

use lexer::{Token, TokenKind, tokenize, unquote};

/// Result type for ingest operations.
pub type IngestResult<T> = std::result::Result<T, ParseError>;

/// Mapping from series key to human-readable series name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesCatalog {
    names: BTreeMap<u32, String>,
}

impl SeriesCatalog {
    /// Build a catalog from `(key, name)` pairs.
    ///
    /// Pairs are deduplicated and applied in sorted order, so the result does
    /// not depend on node order even if a key was given two names.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, String)>) -> Self {
        let unique: BTreeSet<(u32, String)> = pairs.into_iter().collect();
        Self {
            names: unique.into_iter().collect(),
        }
    }

    /// The series name for a key.
    pub fn name(&self, key: u32) -> Option<&str> {
        self.names.get(&key).map(String::as_str)
    }

    /// Restrict the catalog to the given keys.
    pub fn subset<'a>(&self, keys: impl IntoIterator<Item = &'a u32>) -> Self {
        Self {
            names: keys
                .into_iter()
                .filter_map(|k| self.names.get(k).map(|n| (*k, n.clone())))
                .collect(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.names.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A node of the raw multigraph.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    /// Original DOT identifier (unquoted).
    pub id: String,
    /// Raw label attribute, quotes and `\n` escapes preserved.
    pub label: String,
    /// Series keys this node belongs to.
    pub keys: Vec<u32>,
    /// Series names from the tooltip, parallel to `keys`.
    pub series: Vec<String>,
}

/// One parallel edge of the raw multigraph.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEdge {
    pub source: String,
    pub target: String,
    /// Parallel-edge key.
    pub key: u32,
    /// Raw label attribute, quotes and `\n` escapes preserved.
    pub label: String,
}

/// Typed view of a DOT reaction network.
#[derive(Debug, Clone, Default)]
pub struct RawMultiGraph {
    /// Nodes in declaration order.
    pub nodes: Vec<RawNode>,
    /// Parallel edges in declaration order.
    pub edges: Vec<RawEdge>,
    pub directed: bool,
}

impl RawMultiGraph {
    /// Parse DOT source text.
    pub fn parse(src: &str) -> IngestResult<Self> {
        let tokens = tokenize(src)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            doc: DotDocument::default(),
        };
        parser.graph()?;
        parser.doc.into_multigraph()
    }

    /// Look up a node by its original identifier.
    pub fn node(&self, id: &str) -> Option<&RawNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Series catalog over every node.
    pub fn series_catalog(&self) -> SeriesCatalog {
        SeriesCatalog::from_pairs(self.nodes.iter().flat_map(|n| {
            n.keys.iter().copied().zip(n.series.iter().cloned())
        }))
    }
}

// ---------------------------------------------------------------------------
// Untyped document
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DotDocument {
    directed: bool,
    node_order: Vec<String>,
    node_attrs: HashMap<String, Vec<(String, String)>>,
    edges: Vec<DotEdge>,
}

#[derive(Debug)]
struct DotEdge {
    source: String,
    target: String,
    attrs: Vec<(String, String)>,
    line: usize,
}

impl DotDocument {
    fn touch_node(&mut self, id: &str) {
        if !self.node_attrs.contains_key(id) {
            self.node_order.push(id.to_string());
            self.node_attrs.insert(id.to_string(), Vec::new());
        }
    }

    fn into_multigraph(self) -> IngestResult<RawMultiGraph> {
        let mut nodes = Vec::with_capacity(self.node_order.len());
        for id in &self.node_order {
            let attrs = &self.node_attrs[id];
            nodes.push(typed_node(id, attrs)?);
        }

        let mut edges: Vec<RawEdge> = Vec::with_capacity(self.edges.len());
        // Unordered pair → indices into `edges`, for parallel-edge keys.
        let mut pairs: HashMap<(String, String), Vec<usize>> = HashMap::new();
        for edge in self.edges {
            let pair = if self.directed || edge.source <= edge.target {
                (edge.source.clone(), edge.target.clone())
            } else {
                (edge.target.clone(), edge.source.clone())
            };
            let parallel = pairs.entry(pair).or_default();
            let label = attr(&edge.attrs, "label").unwrap_or_default().to_string();

            let key = match attr(&edge.attrs, "key") {
                Some(raw) => unquote(raw).trim().parse::<u32>().map_err(|_| {
                    ParseError::MalformedEdgeKey {
                        source_node: edge.source.clone(),
                        target_node: edge.target.clone(),
                        value: raw.to_string(),
                    }
                })?,
                None => {
                    // Smallest unused parallel index.
                    let mut k = parallel.len() as u32;
                    while parallel.iter().any(|&i| edges[i].key == k) {
                        k += 1;
                    }
                    k
                }
            };

            if let Some(&existing) = parallel.iter().find(|&&i| edges[i].key == key) {
                // Same pair and key: attribute update of the existing edge.
                if attr(&edge.attrs, "label").is_some() {
                    edges[existing].label = label;
                }
                tracing::debug!(line = edge.line, key, "parallel edge key repeated, merged");
                continue;
            }
            parallel.push(edges.len());
            edges.push(RawEdge {
                source: edge.source,
                target: edge.target,
                key,
                label,
            });
        }

        Ok(RawMultiGraph {
            nodes,
            edges,
            directed: self.directed,
        })
    }
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn typed_node(id: &str, attrs: &[(String, String)]) -> IngestResult<RawNode> {
    let raw_keys = attr(attrs, "key").ok_or_else(|| ParseError::MissingKeys {
        node: id.to_string(),
    })?;
    let keys = unquote(raw_keys)
        .split(',')
        .map(|k| k.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ParseError::MalformedKeys {
            node: id.to_string(),
            value: raw_keys.to_string(),
        })?;

    let raw_tooltip = attr(attrs, "tooltip").ok_or_else(|| ParseError::MalformedTooltip {
        node: id.to_string(),
        message: "missing tooltip".into(),
    })?;
    let series: Vec<String> = unquote(raw_tooltip)
        .trim()
        .split("\\n")
        .map(|entry| entry.split(':').next().unwrap_or_default().to_string())
        .collect();
    if series.len() != keys.len() {
        return Err(ParseError::MalformedTooltip {
            node: id.to_string(),
            message: format!("{} series names for {} keys", series.len(), keys.len()),
        });
    }
    if series.iter().any(|s| s.trim().is_empty()) {
        return Err(ParseError::MalformedTooltip {
            node: id.to_string(),
            message: "empty series name".into(),
        });
    }

    Ok(RawNode {
        id: id.to_string(),
        label: attr(attrs, "label").unwrap_or_default().to_string(),
        keys,
        series,
    })
}

// ---------------------------------------------------------------------------
// Recursive-descent parser
// ---------------------------------------------------------------------------

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    doc: DotDocument,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            line: self.line(),
            message: message.into(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> IngestResult<()> {
        if self.peek() == Some(&kind) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {kind:?}, found {:?}", self.peek())))
        }
    }

    fn keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Ident(s)) if s.eq_ignore_ascii_case(word))
    }

    fn id(&mut self) -> IngestResult<String> {
        match self.peek().and_then(TokenKind::id_text) {
            Some(text) => {
                let text = text.to_string();
                self.pos += 1;
                Ok(text)
            }
            None => Err(self.error(format!("expected identifier, found {:?}", self.peek()))),
        }
    }

    fn graph(&mut self) -> IngestResult<()> {
        if self.keyword("strict") {
            self.pos += 1;
        }
        if self.keyword("digraph") {
            self.doc.directed = true;
        } else if !self.keyword("graph") {
            return Err(self.error("expected `graph` or `digraph`"));
        }
        self.pos += 1;
        if self.peek() != Some(&TokenKind::LBrace) {
            self.id()?;
        }
        self.expect(TokenKind::LBrace)?;
        self.stmt_list()?;
        self.expect(TokenKind::RBrace)?;
        if self.pos != self.tokens.len() {
            return Err(self.error("trailing content after graph body"));
        }
        Ok(())
    }

    fn stmt_list(&mut self) -> IngestResult<()> {
        while !matches!(self.peek(), Some(TokenKind::RBrace) | None) {
            self.stmt()?;
            while matches!(self.peek(), Some(TokenKind::Semicolon | TokenKind::Comma)) {
                self.pos += 1;
            }
        }
        Ok(())
    }

    fn stmt(&mut self) -> IngestResult<()> {
        if self.keyword("graph") || self.keyword("node") || self.keyword("edge") {
            // Default attribute statements do not carry per-element data.
            self.pos += 1;
            self.attr_list()?;
            return Ok(());
        }
        if self.keyword("subgraph") || self.peek() == Some(&TokenKind::LBrace) {
            if self.keyword("subgraph") {
                self.pos += 1;
                if self.peek() != Some(&TokenKind::LBrace) {
                    self.id()?;
                }
            }
            self.expect(TokenKind::LBrace)?;
            self.stmt_list()?;
            return self.expect(TokenKind::RBrace);
        }
        if self.peek_at(1) == Some(&TokenKind::Equals) {
            self.id()?;
            self.pos += 1;
            self.id()?;
            return Ok(());
        }

        let line = self.line();
        let first = self.node_id()?;
        let mut chain = vec![first];
        while self.peek() == Some(&TokenKind::EdgeOp) {
            self.pos += 1;
            chain.push(self.node_id()?);
        }
        let attrs = self.attr_list()?;

        for id in &chain {
            self.doc.touch_node(id);
        }
        if chain.len() == 1 {
            if let Some(existing) = self.doc.node_attrs.get_mut(&chain[0]) {
                existing.extend(attrs);
            }
        } else {
            for pair in chain.windows(2) {
                self.doc.edges.push(DotEdge {
                    source: pair[0].clone(),
                    target: pair[1].clone(),
                    attrs: attrs.clone(),
                    line,
                });
            }
        }
        Ok(())
    }

    /// Node identifier, unquoted, with any `:port` suffix dropped.
    fn node_id(&mut self) -> IngestResult<String> {
        let raw = self.id()?;
        while self.peek() == Some(&TokenKind::Colon) {
            self.pos += 1;
            self.id()?;
        }
        Ok(unquote(&raw).to_string())
    }

    fn attr_list(&mut self) -> IngestResult<Vec<(String, String)>> {
        let mut attrs = Vec::new();
        while self.peek() == Some(&TokenKind::LBracket) {
            self.pos += 1;
            while self.peek() != Some(&TokenKind::RBracket) {
                let name = self.id()?;
                self.expect(TokenKind::Equals)?;
                let value = self.id()?;
                attrs.push((unquote(&name).to_string(), value));
                while matches!(self.peek(), Some(TokenKind::Semicolon | TokenKind::Comma)) {
                    self.pos += 1;
                }
            }
            self.expect(TokenKind::RBracket)?;
        }
        Ok(attrs)
    }
}
