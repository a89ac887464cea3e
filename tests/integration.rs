//! End-to-end tests for the ontorxn pipeline.
//!
//! These exercise ingest, canonicalization, correlation and the semantic
//! view together, through the public API only.

use std::collections::BTreeSet;

use ontorxn::correlate::EntityCorrelator;
use ontorxn::dot::RawMultiGraph;
use ontorxn::engine::{BuildConfig, BuildOutput, Builder};
use ontorxn::network::ReactionNetwork;
use ontorxn::network::canonical::{collapse, dedupe, rename, split};
use ontorxn::report::ReportDump;
use ontorxn::semantic::process::{
    ProcessOptions, TypeTable, classify, filter_by_string, filter_by_type, fold_literals,
};
use ontorxn::semantic::{SemanticGraph, TermKind};
use ontorxn::store::{OntologySchema, OntologyStore, Value};
use proptest::prelude::*;

const NETWORK: &str = r#"graph reaction {
    r  [label="R\n0.0",   key="0,1", tooltip="Path:0.0\nAlt:0.0"];
    i1 [label="I1\n-3.0", key="0",   tooltip="Path:-3.0"];
    i2 [label="I2\n-2.0", key="1",   tooltip="Alt:-2.0"];
    p  [label="P\n-6.0",  key="0,1", tooltip="Path:-6.0\nAlt:-6.0"];
    r -- i1 [key="0", label="TS1\n11.0"];
    i1 -- p [key="0", label="TS2\n4.0"];
    r -- i2 [key="1", label="TS3\n9.0"];
    i2 -- p [key="1", label="(missing)"];
    x  [label="X\n0.0", key="2", tooltip="Side:0.0"];
    y  [label="Y\n1.0", key="2", tooltip="Side:1.0"];
    x -- y [key="2", label="Closing\n0.0"];
}"#;

fn report() -> ReportDump {
    let config = "<configuration><parameters><series>\
        <serie name=\"Path\">\
            <step label=\"R\">c0+c1</step><step label=\"TS1\">c2</step>\
            <step label=\"I1\">c3</step><step label=\"P\">c4+c5</step>\
        </serie>\
        <serie name=\"Alt\"><step label=\"I2\">c3+c1</step></serie>\
        </series></parameters></configuration>";
    let json = serde_json::json!({
        "reportId": 31,
        "properties": { "configuration": config },
        "calculations": [
            { "calcId": 500, "calcOrder": 0, "title": "Reactant" },
            { "calcId": 501, "calcOrder": 1, "title": "Water" },
            { "calcId": 502, "calcOrder": 2, "title": "TS1" },
            { "calcId": 503, "calcOrder": 3, "title": "Intermediate" },
            { "calcId": 504, "calcOrder": 4, "title": "Product" },
            { "calcId": 505, "calcOrder": 5, "title": "Reactant" }
        ],
        "fields": {
            "500": { "inchi": "InChI=1S/CH4/h1H4", "scf_energy": "-40.5", "energy_unit": "Hartree" },
            "501": { "inchi": "InChI=1S/H2O/h1H2", "charge": "0", "multiplicity": "1" },
            "504": { "program": "ORCA", "zpe": "0.044" }
        }
    });
    ReportDump::from_json(&json.to_string()).unwrap()
}

fn build(config: BuildConfig) -> (Builder, BuildOutput) {
    let mut builder = Builder::ontorxn(config).unwrap();
    let output = builder.build(NETWORK, &report()).unwrap();
    (builder, output)
}

fn id_number(id: &str) -> usize {
    id.rsplit('-').next().unwrap().parse().unwrap()
}

/// Node and edge content of a network, independent of petgraph indices.
fn signature(net: &ReactionNetwork) -> (Vec<(String, String, Vec<u32>)>, Vec<(String, String, String, Vec<u32>)>) {
    let nodes = net
        .nodes()
        .map(|(_, n)| (n.id.clone(), n.name.clone(), n.keys.clone()))
        .collect();
    let edges = net
        .edges()
        .map(|(_, a, b, t)| (a.id.clone(), b.id.clone(), t.name.clone(), t.keys.clone()))
        .collect();
    (nodes, edges)
}

/// DOT text for a random multigraph. Node `i` is labelled with
/// `names[i]`; each edge is `(source, target, key)`.
fn dot_source(names: &[u8], edges: &[(usize, usize, u32)]) -> String {
    let mut src = String::from("graph {\n");
    for (i, name) in names.iter().enumerate() {
        src.push_str(&format!(
            "  n{i} [label=\"N{name}\\n0.0\", key=\"0\", tooltip=\"S:0.0\"];\n"
        ));
    }
    for &(a, b, key) in edges {
        src.push_str(&format!("  n{a} -- n{b} [key=\"{key}\", label=\"TS{a}x{b}\\n1.0\"];\n"));
    }
    src.push('}');
    src
}

fn multigraph_strategy() -> impl Strategy<Value = (Vec<u8>, Vec<(usize, usize, u32)>)> {
    (1usize..10).prop_flat_map(|n| {
        (
            prop::collection::vec(0u8..4, n),
            prop::collection::vec((0..n, 0..n, 0u32..3), 0..16),
        )
            .prop_map(|(names, edges)| {
                let edges = edges.into_iter().filter(|(a, b, _)| a != b).collect();
                (names, edges)
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn split_partitions_canonical_nodes((names, edges) in multigraph_strategy()) {
        let raw = RawMultiGraph::parse(&dot_source(&names, &edges)).unwrap();
        let canonical = dedupe(&raw, None);
        let parts = split(&canonical);

        let mut seen: Vec<String> = parts.iter().flat_map(|p| p.node_ids()).collect();
        let total = seen.len();
        seen.sort();
        seen.dedup();
        prop_assert_eq!(total, seen.len());

        let mut expected = canonical.node_ids();
        expected.sort();
        prop_assert_eq!(seen, expected);

        let edge_total: usize = parts.iter().map(|p| p.edge_count()).sum();
        prop_assert_eq!(edge_total, canonical.edge_count());
    }

    #[test]
    fn collapse_then_rename_is_idempotent((names, edges) in multigraph_strategy()) {
        let raw = RawMultiGraph::parse(&dot_source(&names, &edges)).unwrap();
        for sub in split(&dedupe(&raw, None)) {
            let once = rename(&collapse(&sub));
            prop_assert_eq!(signature(&collapse(&once)), signature(&once));
            prop_assert_eq!(signature(&rename(&once)), signature(&once));
        }
    }
}

#[test]
fn fold_literals_is_size_exact() {
    let (builder, _) = build(BuildConfig::default());
    let triples = builder.store().statements().unwrap();
    let mut graph = SemanticGraph::materialize(&triples);
    let store = builder.store();
    classify(&mut graph, &TypeTable::from_schema(store.schema()), store);

    let before = graph.node_count();
    let literal_values: Vec<String> = graph
        .nodes()
        .filter(|(_, n)| n.kind == TermKind::Literal)
        .map(|(_, n)| n.id.clone())
        .collect();
    assert!(!literal_values.is_empty());

    let removed = fold_literals(&mut graph);
    assert_eq!(removed, literal_values.len());
    assert_eq!(graph.node_count(), before - literal_values.len());
    assert!(graph.nodes().all(|(_, n)| n.kind != TermKind::Literal));

    for value in &literal_values {
        let needle = format!(":{value}");
        assert!(
            graph
                .nodes()
                .any(|(_, n)| n.dataprop.as_deref().is_some_and(|d| d.contains(&needle))),
            "literal {value} not recoverable"
        );
    }
}

#[test]
fn species_shared_by_identical_titles() {
    let mut store = OntologyStore::new(OntologySchema::ontorxn().unwrap());
    let mut correlator = EntityCorrelator::new(&mut store, 31);
    let (calcs, species) = correlator.instantiate_calculations(&report()).unwrap();
    assert_eq!(calcs.len(), 6);
    assert_eq!(calcs["c0"], "CALC_500");
    assert_eq!(calcs["c5"], "CALC_505");
    assert_eq!(species["c0"], species["c5"]);
    assert_eq!(species["c0"], "SPC_31-spc-0");

    let distinct: BTreeSet<&String> = species.values().collect();
    assert_eq!(distinct.len(), 5);
    drop(correlator);

    let reactant = store.get_entity("SPC_31-spc-0").unwrap();
    assert_eq!(
        store.values(reactant, "hasAnnotation"),
        &[Value::text("c0"), Value::text("c5")]
    );
}

#[test]
fn two_reactant_records_give_one_species() {
    let json = r#"{
        "reportId": 3,
        "calculations": [
            { "calcId": 71, "calcOrder": 0, "title": "Reactant" },
            { "calcId": 72, "calcOrder": 5, "title": "Reactant" }
        ]
    }"#;
    let mut store = OntologyStore::new(OntologySchema::ontorxn().unwrap());
    let mut correlator = EntityCorrelator::new(&mut store, 3);
    let (calcs, species) = correlator
        .instantiate_calculations(&ReportDump::from_json(json).unwrap())
        .unwrap();
    assert_eq!(calcs.len(), 2);
    let distinct: BTreeSet<&String> = species.values().collect();
    assert_eq!(distinct.len(), 1);
    assert_eq!(species["c0"], species["c5"]);
}

#[test]
fn identifiers_follow_enumeration_order() {
    let (_, first) = build(BuildConfig::default());
    let stage_numbers: Vec<usize> = first.maps.stages.iter().map(|s| id_number(&s.id)).collect();
    assert_eq!(stage_numbers, (0..stage_numbers.len()).collect::<Vec<_>>());
    let step_numbers: Vec<usize> = first.maps.steps.iter().map(|s| id_number(&s.id)).collect();
    assert_eq!(step_numbers, (0..step_numbers.len()).collect::<Vec<_>>());
    assert!(first.maps.stages.iter().all(|s| s.id.starts_with("31-stg-")));

    let (_, second) = build(BuildConfig::default());
    assert_eq!(first.maps.stages, second.maps.stages);
    assert_eq!(first.maps.steps, second.maps.steps);
}

#[test]
fn every_subnetwork_gets_structure() {
    let (builder, output) = build(BuildConfig::default());
    assert_eq!(output.subnetworks.len(), 2);
    // 4 + 2 nodes, 5 edges of which 3 carry a transition state.
    assert_eq!(output.maps.stages.len(), 9);
    assert_eq!(output.maps.steps.len(), 5);

    let closing = output
        .maps
        .steps
        .iter()
        .find(|s| s.transition == "closing2")
        .unwrap();
    assert!(closing.transition_state.is_none());

    let store = builder.store();
    let step = store.get_entity(&closing.entity).unwrap();
    assert_eq!(store.values(step, "hasNode").len(), 2);
    assert!(store.values(step, "hasTS").is_empty());

    // Species from formulas, resolved through the species map.
    let r = output.maps.stages.iter().find(|s| s.element == "R").unwrap();
    assert_eq!(r.species, vec!["SPC_31-spc-0", "SPC_31-spc-1"]);
    let p = output.maps.stages.iter().find(|s| s.element == "P").unwrap();
    assert_eq!(p.species, vec!["SPC_31-spc-4", "SPC_31-spc-0"]);
}

#[test]
fn missing_parallel_pair_scenario() {
    let src = r#"graph {
        a [label="A\n0.0", key="1", tooltip="X:0.0"];
        b [label="B\n0.0", key="1", tooltip="X:0.0"];
        a -- b [key="1", label="(missing)"];
        b -- a [key="1", label="(missing)"];
    }"#;
    let raw = RawMultiGraph::parse(src).unwrap();
    let canonical = dedupe(&raw, None);
    assert_eq!(canonical.edge_count(), 1);
    let (_, _, _, transition) = canonical.edges().next().unwrap();
    // Label text is `"(missing)"`; the name starts at its third character.
    assert_eq!(transition.name, "missing)");
    assert_eq!(transition.keys, vec![1]);

    let parts = split(&canonical);
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].node_count(), 2);
}

#[test]
fn inferred_links_are_added() {
    let (builder, output) = build(BuildConfig::default());
    assert!(output.inferred > 0);
    let store = builder.store();
    let reactant = store.get_entity("SPC_31-spc-0").unwrap();
    let iri = store.schema().entity_iri(store.entity_name(reactant).unwrap());
    let has_inchi = store.schema().property_iri("hasInChI").unwrap();
    assert!(store.inferred().iter().any(|t| {
        t.subject.to_string() == format!("<{iri}>") && t.predicate.as_str() == has_inchi
    }));

    let (_, without) = build(BuildConfig {
        apply_patterns: false,
        ..Default::default()
    });
    assert_eq!(without.inferred, 0);
}

#[test]
fn blacklist_filtering_is_monotonic() {
    let (builder, _) = build(BuildConfig::default());
    let store = builder.store();
    let triples = store.statements().unwrap();
    let table = TypeTable::from_schema(store.schema());
    let fresh = || {
        let mut graph = SemanticGraph::materialize(&triples);
        classify(&mut graph, &table, store);
        fold_literals(&mut graph);
        graph
    };
    let both = vec!["STAGE".to_string(), "STEP".to_string()];
    let stage_only = vec!["STAGE".to_string()];

    let mut direct = fresh();
    filter_by_string(&mut direct, &both);

    let mut sequential = fresh();
    filter_by_string(&mut sequential, &both);
    filter_by_string(&mut sequential, &stage_only);
    assert!(sequential.node_count() >= direct.node_count());
    assert_eq!(sequential.node_count(), direct.node_count());

    let mut narrower = fresh();
    filter_by_string(&mut narrower, &stage_only);
    assert!(narrower.node_count() >= direct.node_count());

    let mut untouched = fresh();
    let before = untouched.node_count();
    assert_eq!(filter_by_string(&mut untouched, &[]), 0);
    assert_eq!(filter_by_type(&mut untouched, &[]), 0);
    assert_eq!(untouched.node_count(), before);
}

#[test]
fn type_filter_through_build_options() {
    let config = BuildConfig {
        semantic: ProcessOptions {
            type_blacklist: vec!["NetworkStage".into()],
            ..ProcessOptions::default()
        },
        ..Default::default()
    };
    let (builder, output) = build(config);
    let (graph, summary) = builder.semantic_graph().unwrap();
    // The NetworkStage class node is typed owl:Class and stays.
    assert_eq!(summary.removed_by_type, output.maps.stages.len());
    assert!(graph.nodes().all(|(_, n)| !n.id.contains("STAGE_")));
}
