//! Stages and steps from reaction-network structure.
//!
//! Every node becomes a stage. Every edge becomes a step linking the stages
//! of its endpoints; edges that carry a transition state also get a stage of
//! their own, attached to the step. Stage and step numbers come from two
//! build-wide counters, advanced in subnetwork order and, inside a
//! subnetwork, in node then edge enumeration order.

use std::collections::HashMap;

use petgraph::stable_graph::NodeIndex;
use serde::Serialize;

use crate::error::CorrelateError;
use crate::network::formula::FormulaTokens;
use crate::network::ReactionNetwork;
use crate::store::{EntityId, Value};

use super::{CorrelateResult, EntityCorrelator, HAS_ANNOTATION, HAS_NODE, HAS_SPECIES, HAS_TS};

/// One created stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    /// `{report_id}-stg-{n}`.
    pub id: String,
    pub entity: String,
    /// Node or transition name the stage stands for.
    pub element: String,
    /// Species entity names, in formula order.
    pub species: Vec<String>,
}

/// One created step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// `{report_id}-stp-{n}`.
    pub id: String,
    pub entity: String,
    pub transition: String,
    /// Stage entities of the two endpoints.
    pub nodes: [String; 2],
    /// Stage entity of the transition state, if the edge has one.
    pub transition_state: Option<String>,
}

impl EntityCorrelator<'_> {
    /// Create stages and steps for every subnetwork.
    ///
    /// Call after [`instantiate_calculations`](Self::instantiate_calculations)
    /// so formula tokens can be resolved to species.
    pub fn build_structure(&mut self, subnetworks: &[ReactionNetwork]) -> CorrelateResult<()> {
        let (stages_before, steps_before) = (self.maps.stages.len(), self.maps.steps.len());
        for (position, network) in subnetworks.iter().enumerate() {
            let mut node_stages: HashMap<NodeIndex, (EntityId, String)> = HashMap::new();
            for (ix, node) in network.nodes() {
                let stage = self.stage(&node.name, node.formula.as_deref())?;
                node_stages.insert(ix, stage);
            }

            for ex in network.graph.edge_indices() {
                let (Some((a, b)), Some(transition)) =
                    (network.graph.edge_endpoints(ex), network.graph.edge_weight(ex))
                else {
                    continue;
                };
                let endpoint = |ix: NodeIndex| {
                    node_stages.get(&ix).cloned().ok_or_else(|| CorrelateError::UnknownStage {
                        name: network.graph[ix].name.clone(),
                    })
                };
                let (stage_a, stage_b) = (endpoint(a)?, endpoint(b)?);

                let id = format!("{}-stp-{}", self.report_id, self.step_counter);
                self.step_counter += 1;
                let entity_name = format!("STEP_{id}");
                let step = self.store.create_entity("ReactionStep", &entity_name)?;
                self.store.set_property(step, HAS_NODE, Value::Entity(stage_a.0))?;
                self.store.set_property(step, HAS_NODE, Value::Entity(stage_b.0))?;

                let transition_state = if transition.lacks_transition_state() {
                    None
                } else {
                    let (ts, ts_name) = self.stage(&transition.name, transition.formula.as_deref())?;
                    self.store.set_property(step, HAS_TS, Value::Entity(ts))?;
                    Some(ts_name)
                };

                self.maps.steps.push(StepRecord {
                    id,
                    entity: entity_name,
                    transition: transition.name.clone(),
                    nodes: [stage_a.1, stage_b.1],
                    transition_state,
                });
            }
            tracing::debug!(
                subnetwork = position,
                nodes = network.node_count(),
                edges = network.edge_count(),
                "structure built"
            );
        }
        tracing::info!(
            stages = self.maps.stages.len() - stages_before,
            steps = self.maps.steps.len() - steps_before,
            "stages and steps created"
        );
        Ok(())
    }

    /// Create the next stage for a node or transition.
    fn stage(&mut self, element: &str, formula: Option<&str>) -> CorrelateResult<(EntityId, String)> {
        let id = format!("{}-stg-{}", self.report_id, self.stage_counter);
        self.stage_counter += 1;
        let entity_name = format!("STAGE_{id}");
        let stage = self.store.create_entity("NetworkStage", &entity_name)?;
        self.store
            .set_property(stage, HAS_ANNOTATION, Value::text(element))?;

        let mut species = Vec::new();
        for token in FormulaTokens::new(formula.unwrap_or_default()) {
            let resolved = self
                .maps
                .species_map
                .get(token.code)
                .and_then(|name| Some((self.store.get_entity(name)?, name.clone())));
            match resolved {
                Some((id, name)) => {
                    self.store.set_property(stage, HAS_SPECIES, Value::Entity(id))?;
                    species.push(name);
                }
                None if self.strict_species => {
                    return Err(CorrelateError::UnknownSpecies {
                        token: token.code.to_string(),
                        element: element.to_string(),
                    });
                }
                None => tracing::warn!(
                    token = token.code,
                    element,
                    "formula token matches no species, skipping"
                ),
            }
        }

        self.maps
            .stage_map
            .insert(element.to_string(), entity_name.clone());
        self.maps.stages.push(StageRecord {
            id,
            entity: entity_name.clone(),
            element: element.to_string(),
            species,
        });
        Ok((stage, entity_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot::RawMultiGraph;
    use crate::network::canonical::{CanonicalizeOptions, canonicalize};
    use crate::network::formula::{FormulaRecord, annotate};
    use crate::correlate::CorrelationMaps;
    use crate::report::ReportDump;
    use crate::store::{OntologySchema, OntologyStore};

    const NETWORK: &str = r#"graph {
        r [label="R\n0.0", key="0", tooltip="S:0"];
        i [label="I\n-3.0", key="0", tooltip="S:0"];
        p [label="P\n-5.0", key="0", tooltip="S:0"];
        x [label="X\n1.0", key="1", tooltip="T:1"];
        y [label="Y\n2.0", key="1", tooltip="T:1"];
        r -- i [key="0", label="TS1\n12.0"];
        i -- p [key="0", label="(missing)"];
        x -- y [key="1", label="TS2\n9.0"];
    }"#;

    const REPORT: &str = r#"{
        "reportId": 9,
        "calculations": [
            { "calcId": 1, "calcOrder": 0, "title": "Reactant" },
            { "calcId": 2, "calcOrder": 1, "title": "Water" },
            { "calcId": 3, "calcOrder": 2, "title": "TS" }
        ]
    }"#;

    fn networks() -> Vec<ReactionNetwork> {
        let mut nets = canonicalize(
            &RawMultiGraph::parse(NETWORK).unwrap(),
            &CanonicalizeOptions::default(),
        );
        annotate(
            &mut nets,
            &[
                FormulaRecord::new("S", "R", "c0+c1"),
                FormulaRecord::new("S", "TS1", "c2+c1"),
                FormulaRecord::new("S", "P", "c0+c9"),
            ],
        );
        nets
    }

    fn correlate(store: &mut OntologyStore, strict: bool) -> CorrelateResult<CorrelationMaps> {
        let mut correlator = EntityCorrelator::new(store, 9).strict_species(strict);
        correlator.instantiate_calculations(&ReportDump::from_json(REPORT).unwrap())?;
        correlator.build_structure(&networks())?;
        Ok(correlator.finish())
    }

    fn build(strict: bool) -> (OntologyStore, CorrelateResult<CorrelationMaps>) {
        let mut store = OntologyStore::new(OntologySchema::ontorxn().unwrap());
        let result = correlate(&mut store, strict);
        (store, result)
    }

    #[test]
    fn ids_follow_enumeration_order_across_subnetworks() {
        let (_, maps) = build(false);
        let maps = maps.unwrap();
        // Subnetwork 0: 3 nodes + 1 TS stage; subnetwork 1: 2 nodes + 1 TS stage.
        let ids: Vec<&str> = maps.stages.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["9-stg-0", "9-stg-1", "9-stg-2", "9-stg-3", "9-stg-4", "9-stg-5", "9-stg-6"]
        );
        let steps: Vec<&str> = maps.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(steps, vec!["9-stp-0", "9-stp-1", "9-stp-2"]);
    }

    #[test]
    fn missing_transitions_have_no_ts_stage() {
        let (store, maps) = build(false);
        let maps = maps.unwrap();
        let missing = maps.steps.iter().find(|s| s.transition.contains("missing")).unwrap();
        assert!(missing.transition_state.is_none());
        let ts1 = maps.steps.iter().find(|s| s.transition == "TS1").unwrap();
        let ts_stage = ts1.transition_state.clone().unwrap();
        assert_eq!(maps.stage_map["TS1"], ts_stage);

        let step = store.get_entity(&ts1.entity).unwrap();
        assert_eq!(store.values(step, HAS_NODE).len(), 2);
        assert_eq!(store.values(step, HAS_TS).len(), 1);
    }

    #[test]
    fn stages_link_species_from_formulas() {
        let (_, maps) = build(false);
        let maps = maps.unwrap();
        let r = maps.stages.iter().find(|s| s.element == "R").unwrap();
        assert_eq!(r.species, vec!["SPC_9-spc-0", "SPC_9-spc-1"]);
        // c9 is unknown and skipped.
        let p = maps.stages.iter().find(|s| s.element == "P").unwrap();
        assert_eq!(p.species, vec!["SPC_9-spc-0"]);
        let x = maps.stages.iter().find(|s| s.element == "X").unwrap();
        assert!(x.species.is_empty());
    }

    #[test]
    fn strict_mode_rejects_unknown_tokens() {
        let (_, maps) = build(true);
        assert!(matches!(
            maps,
            Err(CorrelateError::UnknownSpecies { ref token, .. }) if token == "c9"
        ));
    }

    #[test]
    fn rebuilding_gives_identical_ids() {
        let (_, first) = build(false);
        let (_, second) = build(false);
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first.stages, second.stages);
        assert_eq!(first.steps, second.steps);
    }
}
