//! Build facade: one knowledge-graph build from a network file and a report.
//!
//! The `Builder` owns the ontology store for the duration of a build and runs
//! the pipeline in order: ingest, canonicalize, annotate formulas, correlate
//! calculations and structure, apply construct patterns.

use std::path::{Path, PathBuf};

use crate::correlate::{CorrelationMaps, EntityCorrelator};
use crate::dot::RawMultiGraph;
use crate::error::RxnResult;
use crate::network::canonical::{CanonicalizeOptions, canonicalize};
use crate::network::formula::{AnnotationReport, FormulaRecord, annotate};
use crate::network::ReactionNetwork;
use crate::report::ReportSource;
use crate::semantic::process::{ProcessOptions, ProcessSummary, TypeTable, process};
use crate::semantic::SemanticGraph;
use crate::store::{OntologySchema, OntologyStore, queries};

/// Configuration of one build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Report id used in stage, step and species names. `None` takes the
    /// id the report source declares.
    pub report_id: Option<u64>,
    /// Merge same-named nodes before renaming.
    pub collapse: bool,
    /// Fail on formula tokens that match no species.
    pub strict_species: bool,
    /// Restrict series catalogs to these keys.
    pub used_keys: Option<Vec<u32>>,
    /// Run the bundled construct patterns after correlation.
    pub apply_patterns: bool,
    /// Processing of the semantic view of the built graph.
    pub semantic: ProcessOptions,
    /// Where to save the knowledge graph. `None` keeps it in memory.
    pub output: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            report_id: None,
            collapse: false,
            strict_species: false,
            used_keys: None,
            apply_patterns: true,
            semantic: ProcessOptions::default(),
            output: None,
        }
    }
}

impl BuildConfig {
    fn canonicalize_options(&self) -> CanonicalizeOptions {
        CanonicalizeOptions {
            collapse: self.collapse,
            used_keys: self.used_keys.clone(),
        }
    }
}

/// Read a network and annotate it with formula records.
pub fn load_networks(
    dot_src: &str,
    records: &[FormulaRecord],
    config: &BuildConfig,
) -> RxnResult<(Vec<ReactionNetwork>, AnnotationReport)> {
    let raw = RawMultiGraph::parse(dot_src)?;
    let mut subnetworks = canonicalize(&raw, &config.canonicalize_options());
    let annotation = annotate(&mut subnetworks, records);
    Ok((subnetworks, annotation))
}

/// Everything a finished build produced besides the store itself.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub report_id: u64,
    pub subnetworks: Vec<ReactionNetwork>,
    pub annotation: AnnotationReport,
    pub maps: CorrelationMaps,
    /// Triples added by the construct patterns.
    pub inferred: usize,
}

/// Runs knowledge-graph builds. Each build gets a fresh ontology store over
/// the builder's schema; the store of the last build stays readable.
pub struct Builder {
    config: BuildConfig,
    store: OntologyStore,
}

impl Builder {
    pub fn new(schema: OntologySchema, config: BuildConfig) -> Self {
        Self {
            config,
            store: OntologyStore::new(schema),
        }
    }

    /// A builder over the bundled OntoRXN schema.
    pub fn ontorxn(config: BuildConfig) -> RxnResult<Self> {
        Ok(Self::new(OntologySchema::ontorxn()?, config))
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn store(&self) -> &OntologyStore {
        &self.store
    }

    /// Run a full build, replacing the store of any previous build.
    pub fn build(&mut self, dot_src: &str, report: &dyn ReportSource) -> RxnResult<BuildOutput> {
        self.store = OntologyStore::new(self.store.schema().clone());
        let report_id = self.config.report_id.unwrap_or_else(|| report.report_id());
        tracing::info!(report_id, collapse = self.config.collapse, "starting knowledge-graph build");

        let records = report.properties()?.formula_records()?;
        let (subnetworks, annotation) = load_networks(dot_src, &records, &self.config)?;

        let mut correlator =
            EntityCorrelator::new(&mut self.store, report_id).strict_species(self.config.strict_species);
        correlator.instantiate_calculations(report)?;
        correlator.build_structure(&subnetworks)?;
        let maps = correlator.finish();

        let inferred = if self.config.apply_patterns {
            self.store.run_pattern_queries(&queries::bundled())?
        } else {
            0
        };

        if let Some(path) = &self.config.output {
            self.store.save(path)?;
        }

        let output = BuildOutput {
            report_id,
            subnetworks,
            annotation,
            maps,
            inferred,
        };
        tracing::info!("{}", BuildInfo::from_output(&output, &self.store));
        Ok(output)
    }

    /// Save the store.
    pub fn save(&self, path: &Path) -> RxnResult<()> {
        Ok(self.store.save(path)?)
    }

    /// Materialize and process the semantic view of the store.
    pub fn semantic_graph(&self) -> RxnResult<(SemanticGraph, ProcessSummary)> {
        let triples = self.store.statements()?;
        let mut graph = SemanticGraph::materialize(&triples);
        let summary = process(
            &mut graph,
            &TypeTable::from_schema(self.store.schema()),
            &self.store,
            &self.config.semantic,
        );
        Ok((graph, summary))
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .field("entities", &self.store.entity_count())
            .finish()
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub report_id: u64,
    pub subnetworks: usize,
    pub calculations: usize,
    pub species: usize,
    pub stages: usize,
    pub steps: usize,
    pub unmatched_labels: usize,
    pub inferred: usize,
    pub entities: usize,
}

impl BuildInfo {
    pub fn from_output(output: &BuildOutput, store: &OntologyStore) -> Self {
        let mut species: Vec<&String> = output.maps.species_map.values().collect();
        species.sort();
        species.dedup();
        Self {
            report_id: output.report_id,
            subnetworks: output.subnetworks.len(),
            calculations: output.maps.calc_map.len(),
            species: species.len(),
            stages: output.maps.stages.len(),
            steps: output.maps.steps.len(),
            unmatched_labels: output.annotation.unmatched.len(),
            inferred: output.inferred,
            entities: store.entity_count(),
        }
    }
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ontorxn build of report {}", self.report_id)?;
        writeln!(f, "  subnetworks:   {}", self.subnetworks)?;
        writeln!(f, "  calculations:  {}", self.calculations)?;
        writeln!(f, "  species:       {}", self.species)?;
        writeln!(f, "  stages:        {}", self.stages)?;
        writeln!(f, "  steps:         {}", self.steps)?;
        writeln!(f, "  unmatched:     {}", self.unmatched_labels)?;
        writeln!(f, "  inferred:      {}", self.inferred)?;
        writeln!(f, "  entities:      {}", self.entities)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportDump;

    const NETWORK: &str = r#"graph {
        r [label="R\n0.0", key="0", tooltip="Path:0.0"];
        p [label="P\n-4.0", key="0", tooltip="Path:-4.0"];
        q [label="Q\n-6.0", key="0", tooltip="Path:-6.0"];
        r -- p [key="0", label="TS1\n10.0"];
        p -- q [key="0", label="TS2\n3.0"];
    }"#;

    fn report() -> ReportDump {
        let config = "<configuration><parameters><series><serie name=\"Path\">\
            <step label=\"R\">c0</step><step label=\"TS1\">c1</step>\
            <step label=\"P\">c2</step><step label=\"TS2\">c3</step>\
            <step label=\"Q\">c4</step></serie></series></parameters></configuration>";
        let json = serde_json::json!({
            "reportId": 42,
            "properties": { "configuration": config },
            "calculations": [
                { "calcId": 10, "calcOrder": 0, "title": "R" },
                { "calcId": 11, "calcOrder": 1, "title": "TS1" },
                { "calcId": 12, "calcOrder": 2, "title": "P" },
                { "calcId": 13, "calcOrder": 3, "title": "TS2" },
                { "calcId": 14, "calcOrder": 4, "title": "Q" }
            ],
            "fields": { "10": { "inchi": "InChI=1S/R" } }
        });
        ReportDump::from_json(&json.to_string()).unwrap()
    }

    #[test]
    fn full_build() {
        let mut builder = Builder::ontorxn(BuildConfig::default()).unwrap();
        let output = builder.build(NETWORK, &report()).unwrap();
        assert_eq!(output.report_id, 42);
        assert_eq!(output.subnetworks.len(), 1);
        assert_eq!(output.annotation.nodes_annotated, 3);
        assert_eq!(output.annotation.edges_annotated, 2);
        assert_eq!(output.maps.stages.len(), 5);
        assert_eq!(output.maps.steps.len(), 2);
        // Two steps sharing P link both ways; one species gets an InChI.
        assert_eq!(output.inferred, 3);
        assert!(builder.store().get_entity("STEP_42-stp-1").is_some());
    }

    #[test]
    fn report_id_override() {
        let config = BuildConfig {
            report_id: Some(7),
            apply_patterns: false,
            ..Default::default()
        };
        let mut builder = Builder::ontorxn(config).unwrap();
        let output = builder.build(NETWORK, &report()).unwrap();
        assert_eq!(output.inferred, 0);
        assert_eq!(output.maps.species_map["c0"], "SPC_7-spc-0");
    }

    #[test]
    fn semantic_view_of_build() {
        let mut builder = Builder::ontorxn(BuildConfig::default()).unwrap();
        builder.build(NETWORK, &report()).unwrap();
        let (graph, summary) = builder.semantic_graph().unwrap();
        assert!(summary.literals_folded > 0);
        assert_eq!(graph.default_state.len(), 4);
        let step = graph
            .node_by_id("http://www.semanticweb.com/OntoRxn#STEP_42-stp-0")
            .unwrap();
        assert_eq!(graph.graph[step].type_tag.id(), 5);
    }

    #[test]
    fn repeated_builds_start_from_an_empty_store() {
        let mut builder = Builder::ontorxn(BuildConfig::default()).unwrap();
        let first = builder.build(NETWORK, &report()).unwrap();
        let entities = builder.store().entity_count();
        let triples = builder.store().statements().unwrap().len();

        let second = builder.build(NETWORK, &report()).unwrap();
        assert_eq!(builder.store().entity_count(), entities);
        assert_eq!(builder.store().statements().unwrap().len(), triples);
        assert_eq!(first.maps.stages, second.maps.stages);
        assert_eq!(second.inferred, first.inferred);
    }

    #[test]
    fn info_display() {
        let mut builder = Builder::ontorxn(BuildConfig::default()).unwrap();
        let output = builder.build(NETWORK, &report()).unwrap();
        let text = BuildInfo::from_output(&output, builder.store()).to_string();
        assert!(text.contains("report 42"));
        assert!(text.contains("steps:         2"));
    }
}
