//! Persistence tests: knowledge graphs written to disk and read back.

use std::path::Path;

use ontorxn::engine::{BuildConfig, Builder};
use ontorxn::report::ReportDump;
use ontorxn::semantic::SemanticGraph;
use ontorxn::semantic::export::SemanticGraphExport;
use ontorxn::semantic::process::{ProcessOptions, RdfTypeLookup, TypeTable, process};
use ontorxn::store::OntologyStore;

const NETWORK: &str = r#"graph {
    r [label="R\n0.0",  key="0", tooltip="Path:0.0"];
    p [label="P\n-5.0", key="0", tooltip="Path:-5.0"];
    q [label="Q\n-7.0", key="0", tooltip="Path:-7.0"];
    r -- p [key="0", label="TS1\n8.0"];
    p -- q [key="0", label="TS2\n2.0"];
}"#;

fn report() -> ReportDump {
    ReportDump::from_json(
        r#"{
        "reportId": 12,
        "properties": {
            "configuration": "<configuration><parameters><series><serie name=\"Path\"><step label=\"R\">c0</step><step label=\"P\">c1</step><step label=\"Q\">c2</step></serie></series></parameters></configuration>"
        },
        "calculations": [
            { "calcId": 1, "calcOrder": 0, "title": "R" },
            { "calcId": 2, "calcOrder": 1, "title": "P" },
            { "calcId": 3, "calcOrder": 2, "title": "Q" }
        ],
        "fields": {
            "1": { "inchi": "InChI=1S/R", "scf_energy": "-10.25", "energy_unit": "Hartree" },
            "2": { "geometry": "C 0.0 0.0 0.0\nO 0.0 0.0 1.2" }
        }
    }"#,
    )
    .unwrap()
}

fn built() -> Builder {
    let mut builder = Builder::ontorxn(BuildConfig::default()).unwrap();
    builder.build(NETWORK, &report()).unwrap();
    builder
}

fn snapshot_len(builder: &Builder) -> usize {
    builder.store().to_rdf_store().unwrap().len().unwrap()
}

fn save_and_reload(builder: &Builder, path: &Path) -> usize {
    builder.save(path).unwrap();
    OntologyStore::load_triples(path).unwrap().len()
}

#[test]
fn turtle_round_trip_keeps_every_triple() {
    let dir = tempfile::TempDir::new().unwrap();
    let builder = built();
    let path = dir.path().join("network.ttl");
    assert_eq!(save_and_reload(&builder, &path), snapshot_len(&builder));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("STEP_12-stp-0"));
}

#[test]
fn ntriples_and_rdfxml_by_extension() {
    let dir = tempfile::TempDir::new().unwrap();
    let builder = built();
    let expected = snapshot_len(&builder);

    let nt = dir.path().join("network.nt");
    assert_eq!(save_and_reload(&builder, &nt), expected);
    let text = std::fs::read_to_string(&nt).unwrap();
    assert!(text.lines().all(|l| l.is_empty() || l.ends_with(" .")));

    let owl = dir.path().join("network.owl");
    assert_eq!(save_and_reload(&builder, &owl), expected);
}

#[test]
fn build_config_output_saves_the_graph() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("out.ttl");
    let mut builder = Builder::ontorxn(BuildConfig {
        output: Some(path.clone()),
        ..Default::default()
    })
    .unwrap();
    builder.build(NETWORK, &report()).unwrap();
    assert!(path.exists());
    assert!(!OntologyStore::load_triples(&path).unwrap().is_empty());
}

#[test]
fn saved_graph_inspection_matches_in_memory_view() {
    let dir = tempfile::TempDir::new().unwrap();
    let builder = built();
    let path = dir.path().join("network.ttl");
    builder.save(&path).unwrap();

    let triples = OntologyStore::load_triples(&path).unwrap();
    let mut reloaded = SemanticGraph::materialize(&triples);
    process(
        &mut reloaded,
        &TypeTable::from_schema(builder.store().schema()),
        &RdfTypeLookup::from_triples(&triples),
        &ProcessOptions::default(),
    );
    let (in_memory, _) = builder.semantic_graph().unwrap();
    assert_eq!(reloaded.node_count(), in_memory.node_count());
    assert_eq!(reloaded.edge_count(), in_memory.edge_count());

    let step = reloaded
        .node_by_id("http://www.semanticweb.com/OntoRxn#STEP_12-stp-1")
        .unwrap();
    assert_eq!(reloaded.graph[step].type_tag.id(), 5);
    let stage = reloaded
        .node_by_id("http://www.semanticweb.com/OntoRxn#STAGE_12-stg-0")
        .unwrap();
    assert_eq!(reloaded.graph[stage].type_tag.id(), 4);

    let export_path = dir.path().join("graph.json");
    SemanticGraphExport::from_graph(&reloaded).write(&export_path).unwrap();
    let export: SemanticGraphExport =
        serde_json::from_str(&std::fs::read_to_string(&export_path).unwrap()).unwrap();
    assert_eq!(export.nodes.len(), reloaded.node_count());
    assert_eq!(export.default_state.len(), 4);
}

#[test]
fn loading_a_missing_file_fails_with_io_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = OntologyStore::load_triples(&dir.path().join("absent.ttl")).unwrap_err();
    assert!(err.to_string().contains("absent.ttl"));
}
