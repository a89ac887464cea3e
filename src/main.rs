//! ontorxn CLI: OntoRXN knowledge graphs from reaction networks.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use ontorxn::engine::{BuildConfig, BuildInfo, Builder, load_networks};
use ontorxn::network::ReactionNetwork;
use ontorxn::report::{ReportDump, ReportSource};
use ontorxn::semantic::SemanticGraph;
use ontorxn::semantic::export::SemanticGraphExport;
use ontorxn::semantic::process::{ProcessOptions, RdfTypeLookup, TypeTable, process};
use ontorxn::store::{OntologySchema, OntologyStore};

#[derive(Parser)]
#[command(name = "ontorxn", version, about = "OntoRXN knowledge graphs from reaction networks")]
struct Cli {
    /// Ontology schema TOML (default: bundled OntoRXN schema).
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a knowledge graph from a network file and a report dump.
    Build {
        /// Network file (DOT).
        #[arg(long, short = 'g')]
        graph: PathBuf,

        /// Report dump (JSON).
        #[arg(long, short = 'r')]
        report: PathBuf,

        /// Output file; `.ttl`, `.nt` or `.owl` (default: graph file with `.ttl`).
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Write the correlation maps as JSON to this file.
        #[arg(long)]
        maps: Option<PathBuf>,

        /// Override the report id used in entity names.
        #[arg(long)]
        report_id: Option<u64>,

        /// Collapse nodes with common names.
        #[arg(long, short = 'c')]
        collapse: bool,

        /// Fail on formula tokens that match no species.
        #[arg(long)]
        strict_species: bool,

        /// Skip the construct patterns.
        #[arg(long)]
        no_patterns: bool,

        /// Keep only these series keys (comma-separated).
        #[arg(long, value_delimiter = ',')]
        used_keys: Vec<u32>,
    },

    /// Print the canonical subnetworks of a network file as JSON.
    Network {
        /// Network file (DOT).
        #[arg(long, short = 'g')]
        graph: PathBuf,

        /// Report dump providing step formulas.
        #[arg(long, short = 'r')]
        report: Option<PathBuf>,

        /// Collapse nodes with common names.
        #[arg(long, short = 'c')]
        collapse: bool,
    },

    /// Process a saved knowledge graph into a semantic graph (JSON).
    Inspect {
        /// Saved knowledge graph.
        file: PathBuf,

        /// Remove nodes whose type contains any of these (comma-separated).
        #[arg(long, value_delimiter = ',')]
        type_filter: Vec<String>,

        /// Remove nodes whose id or name contains any of these (comma-separated).
        #[arg(long, value_delimiter = ',')]
        string_filter: Vec<String>,

        /// Keep literal nodes instead of folding them into their subjects.
        #[arg(long)]
        keep_literals: bool,

        /// Write the JSON here instead of stdout.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

fn load_schema(path: Option<&Path>) -> Result<OntologySchema> {
    Ok(match path {
        Some(path) => OntologySchema::load(path)?,
        None => OntologySchema::ontorxn()?,
    })
}

fn networks_json(subnetworks: &[ReactionNetwork]) -> serde_json::Value {
    let parts: Vec<serde_json::Value> = subnetworks
        .iter()
        .map(|net| {
            let series: serde_json::Map<String, serde_json::Value> = net
                .series
                .iter()
                .map(|(key, name)| (key.to_string(), name.into()))
                .collect();
            let nodes: Vec<_> = net.nodes().map(|(_, n)| serde_json::json!(n)).collect();
            let edges: Vec<_> = net
                .edges()
                .map(|(_, a, b, t)| {
                    serde_json::json!({
                        "source": a.id,
                        "target": b.id,
                        "name": t.name,
                        "keys": t.keys,
                        "formula": t.formula,
                    })
                })
                .collect();
            serde_json::json!({ "series": series, "nodes": nodes, "edges": edges })
        })
        .collect();
    serde_json::Value::Array(parts)
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let schema = load_schema(cli.schema.as_deref())?;

    match cli.command {
        Commands::Build {
            graph,
            report,
            output,
            maps,
            report_id,
            collapse,
            strict_species,
            no_patterns,
            used_keys,
        } => {
            let dot = std::fs::read_to_string(&graph).into_diagnostic()?;
            let report = ReportDump::load(&report)?;
            let output = output.unwrap_or_else(|| graph.with_extension("ttl"));
            let config = BuildConfig {
                report_id,
                collapse,
                strict_species,
                used_keys: (!used_keys.is_empty()).then_some(used_keys),
                apply_patterns: !no_patterns,
                output: Some(output.clone()),
                ..Default::default()
            };

            let mut builder = Builder::new(schema, config);
            let result = builder.build(&dot, &report)?;
            if let Some(path) = maps {
                let json = serde_json::to_string_pretty(&result.maps).into_diagnostic()?;
                std::fs::write(&path, json).into_diagnostic()?;
                println!("Correlation maps written to {}", path.display());
            }
            for label in &result.annotation.unmatched {
                println!("  unmatched step label: {label}");
            }
            println!("{}", BuildInfo::from_output(&result, builder.store()));
            println!("Knowledge graph written to {}", output.display());
        }

        Commands::Network {
            graph,
            report,
            collapse,
        } => {
            let dot = std::fs::read_to_string(&graph).into_diagnostic()?;
            let records = match report {
                Some(path) => ReportDump::load(&path)?.properties()?.formula_records()?,
                None => Vec::new(),
            };
            let config = BuildConfig {
                collapse,
                ..Default::default()
            };
            let (subnetworks, annotation) = load_networks(&dot, &records, &config)?;
            let json = serde_json::to_string_pretty(&networks_json(&subnetworks)).into_diagnostic()?;
            println!("{json}");
            if !annotation.unmatched.is_empty() {
                eprintln!("unmatched step labels: {}", annotation.unmatched.join(", "));
            }
        }

        Commands::Inspect {
            file,
            type_filter,
            string_filter,
            keep_literals,
            output,
        } => {
            let triples = OntologyStore::load_triples(&file)?;
            let mut graph = SemanticGraph::materialize(&triples);
            let options = ProcessOptions {
                fold_literals: !keep_literals,
                type_blacklist: type_filter,
                string_blacklist: string_filter,
            };
            let summary = process(
                &mut graph,
                &TypeTable::from_schema(&schema),
                &RdfTypeLookup::from_triples(&triples),
                &options,
            );
            tracing::info!(
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                folded = summary.literals_folded,
                removed_by_type = summary.removed_by_type,
                removed_by_string = summary.removed_by_string,
                "semantic graph processed"
            );

            let export = SemanticGraphExport::from_graph(&graph);
            match output {
                Some(path) => {
                    export.write(&path)?;
                    println!("Semantic graph written to {}", path.display());
                }
                None => println!("{}", export.to_json()?),
            }
        }
    }

    Ok(())
}
