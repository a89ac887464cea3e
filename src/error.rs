//! Rich diagnostic error types for ontorxn.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for a knowledge-graph build.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum RxnError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Correlate(#[from] CorrelateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Ingest (DOT) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("DOT syntax error at line {line}: {message}")]
    #[diagnostic(
        code(ontorxn::ingest::syntax),
        help(
            "The network file could not be tokenized as DOT. \
             Check for unbalanced quotes, brackets or braces near the reported line."
        )
    )]
    Syntax { line: usize, message: String },

    #[error("node {node} has a malformed key list: {value}")]
    #[diagnostic(
        code(ontorxn::ingest::malformed_keys),
        help(
            "Every node needs a `key` attribute holding a quoted, comma-separated \
             list of integers, e.g. key=\"0,2\"."
        )
    )]
    MalformedKeys { node: String, value: String },

    #[error("node {node} has no key list")]
    #[diagnostic(
        code(ontorxn::ingest::missing_keys),
        help(
            "The node was declared without a `key` attribute, or only appears inside an \
             edge statement. Declare it explicitly with its key list."
        )
    )]
    MissingKeys { node: String },

    #[error("node {node} has a malformed tooltip: {message}")]
    #[diagnostic(
        code(ontorxn::ingest::malformed_tooltip),
        help(
            "The tooltip must be a quoted list of `Name:Energy` pairs separated by `\\n`, \
             with exactly one pair per entry of the key list."
        )
    )]
    MalformedTooltip { node: String, message: String },

    #[error("edge {source_node} -- {target_node} has a malformed key: {value}")]
    #[diagnostic(
        code(ontorxn::ingest::malformed_edge_key),
        help("Edge keys must be a single (optionally quoted) integer, e.g. key=\"1\".")
    )]
    MalformedEdgeKey {
        source_node: String,
        target_node: String,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Ontology store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("unknown ontology class: {class}")]
    #[diagnostic(
        code(ontorxn::store::unknown_class),
        help("Declare the class in the ontology schema (`[[class]]` table) before instantiating it.")
    )]
    UnknownClass { class: String },

    #[error("unknown ontology property: {property}")]
    #[diagnostic(
        code(ontorxn::store::unknown_property),
        help("Declare the property in the ontology schema (`[[property]]` table) with its cardinality.")
    )]
    UnknownProperty { property: String },

    #[error("unknown entity: {name}")]
    #[diagnostic(
        code(ontorxn::store::unknown_entity),
        help("Entities must be created in the same store before they are referenced.")
    )]
    UnknownEntity { name: String },

    #[error("entity already exists: {name}")]
    #[diagnostic(
        code(ontorxn::store::duplicate_entity),
        help("Entity names are unique per store. Look the entity up with `get_entity` instead.")
    )]
    DuplicateEntity { name: String },

    #[error("invalid IRI {iri}: {message}")]
    #[diagnostic(
        code(ontorxn::store::invalid_iri),
        help("Check the namespace declarations in the ontology schema and the entity name.")
    )]
    InvalidIri { iri: String, message: String },

    #[error("SPARQL error: {message}")]
    #[diagnostic(
        code(ontorxn::store::sparql),
        help(
            "A construct pattern or type query failed. Check the pattern syntax \
             and that it uses the prefixes declared by the schema."
        )
    )]
    Sparql { message: String },

    #[error("I/O error on {path}")]
    #[diagnostic(
        code(ontorxn::store::io),
        help("Check that the output directory exists and is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("RDF serialization error: {message}")]
    #[diagnostic(
        code(ontorxn::store::serialization),
        help("The knowledge graph could not be written or read as RDF. Use a .ttl or .nt file.")
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    #[error("failed to read report dump: {path}")]
    #[diagnostic(code(ontorxn::report::io), help("Ensure the file exists and is readable."))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid report dump {path}: {message}")]
    #[diagnostic(
        code(ontorxn::report::json),
        help("The report dump must be a JSON object with `properties` and `calculations`.")
    )]
    Json { path: String, message: String },

    #[error("invalid series configuration: {message}")]
    #[diagnostic(
        code(ontorxn::report::configuration),
        help(
            "The `configuration` property must be XML of the form \
             <configuration><parameters><series><serie name=\"..\"><step label=\"..\">FORMULA</step>..."
        )
    )]
    Configuration { message: String },
}

// ---------------------------------------------------------------------------
// Correlation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CorrelateError {
    #[error("formula token {token} of {element} matches no species")]
    #[diagnostic(
        code(ontorxn::correlate::unknown_species),
        help(
            "Every `+`-anchored token in a step formula must be the cN code of a \
             calculation in the report. Fix the formula, or build without strict species matching."
        )
    )]
    UnknownSpecies { token: String, element: String },

    #[error("no stage recorded for node {name}")]
    #[diagnostic(
        code(ontorxn::correlate::unknown_stage),
        help("This is an internal inconsistency: every node gets a stage before edges are processed.")
    )]
    UnknownStage { name: String },

    #[error("calculation {calc_id} has malformed geometry line: {line}")]
    #[diagnostic(
        code(ontorxn::correlate::geometry),
        help("Geometry blocks must contain one `Symbol X Y Z` line per atom.")
    )]
    InvalidGeometry { calc_id: u64, line: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Report(#[from] ReportError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(code(ontorxn::config::io), help("Ensure the file exists and is readable."))]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    #[diagnostic(
        code(ontorxn::config::parse),
        help("Check the TOML syntax against the bundled data/schema/ontorxn.toml.")
    )]
    Parse { path: String, message: String },

    #[error("invalid ontology schema: {message}")]
    #[diagnostic(
        code(ontorxn::config::schema),
        help("Every class and property must reference a declared namespace prefix.")
    )]
    InvalidSchema { message: String },
}

/// Convenience alias for functions returning ontorxn results.
pub type RxnResult<T> = std::result::Result<T, RxnError>;
