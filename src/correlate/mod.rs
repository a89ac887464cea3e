//! Entity correlation: report calculations and network structure into the store.
//!
//! An [`EntityCorrelator`] owns the tracking maps of one knowledge-graph
//! build (`cN` → calculation, `cN` → species, element name → stage) and
//! writes every entity through the [`OntologyStore`] it borrows exclusively.
//!
//! - calculations and species: [`EntityCorrelator::instantiate_calculations`]
//! - stages and steps: [`structure`]

pub mod structure;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::CorrelateError;
use crate::report::{CalculationInfo, FieldDict, ReportSource};
use crate::store::schema::{ResolvedMapping, ValueKind};
use crate::store::{EntityId, OntologyStore, Value};

pub use self::structure::{StageRecord, StepRecord};

/// Result type for correlation.
pub type CorrelateResult<T> = std::result::Result<T, CorrelateError>;

/// `cN` code → entity name.
pub type CodeMap = BTreeMap<String, String>;

// Ontology vocabulary written by the correlator.
pub(crate) const HAS_ANNOTATION: &str = "hasAnnotation";
pub(crate) const HAS_CALCULATION: &str = "hasCalculation";
pub(crate) const HAS_SPECIES: &str = "hasSpecies";
pub(crate) const HAS_NODE: &str = "hasNode";
pub(crate) const HAS_TS: &str = "hasTS";
const HAS_RESULT: &str = "hasResult";
const HAS_VALUE: &str = "hasValue";
const HAS_UNIT: &str = "hasUnit";
const HAS_MOLECULE: &str = "hasMolecule";
const HAS_ATOM: &str = "hasAtom";
const HAS_SYMBOL: &str = "hasSymbol";
const HAS_COORDINATES: [&str; 3] = ["hasAtomCoordinateX", "hasAtomCoordinateY", "hasAtomCoordinateZ"];
const HAS_INITIALIZATION: &str = "hasInitialization";
const HAS_PARAMETER: &str = "hasParameter";
const HAS_BASIS_SET: &str = "hasBasisSet";
const HAS_LEVEL_OF_THEORY: &str = "hasLevelOfTheory";

/// Unit of geometry coordinates.
const COORDINATE_UNIT: &str = "a.u.";
const GEOMETRY_FIELD: &str = "geometry";
const BASIS_FIELD: &str = "basis";
const METHOD_FIELD: &str = "method";

/// Everything a build hands to its caller once correlation is done.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrelationMaps {
    pub calc_map: CodeMap,
    pub species_map: CodeMap,
    /// Node/edge name → stage entity name.
    pub stage_map: BTreeMap<String, String>,
    pub stages: Vec<StageRecord>,
    pub steps: Vec<StepRecord>,
}

/// Correlates report records and reaction networks into one store.
pub struct EntityCorrelator<'s> {
    store: &'s mut OntologyStore,
    report_id: u64,
    strict_species: bool,
    mappings: Vec<ResolvedMapping>,
    units: HashMap<String, EntityId>,
    /// Species entity name by calculation title.
    species_by_title: HashMap<String, String>,
    maps: CorrelationMaps,
    stage_counter: usize,
    step_counter: usize,
}

impl<'s> EntityCorrelator<'s> {
    /// Start a build. The field-mapping table is resolved against the
    /// store's schema once, here.
    pub fn new(store: &'s mut OntologyStore, report_id: u64) -> Self {
        let mappings = store.schema().resolve_mappings();
        Self {
            store,
            report_id,
            strict_species: false,
            mappings,
            units: HashMap::new(),
            species_by_title: HashMap::new(),
            maps: CorrelationMaps::default(),
            stage_counter: 0,
            step_counter: 0,
        }
    }

    /// Fail on formula tokens that match no species instead of skipping them.
    pub fn strict_species(mut self, strict: bool) -> Self {
        self.strict_species = strict;
        self
    }

    pub fn report_id(&self) -> u64 {
        self.report_id
    }

    pub fn maps(&self) -> &CorrelationMaps {
        &self.maps
    }

    /// Consume the correlator, returning its tracking maps.
    pub fn finish(self) -> CorrelationMaps {
        self.maps
    }

    /// Create one calculation entity per report calculation and one species
    /// per distinct calculation title.
    ///
    /// Returns the `cN` → calculation and `cN` → species maps.
    pub fn instantiate_calculations(
        &mut self,
        source: &dyn ReportSource,
    ) -> CorrelateResult<(&CodeMap, &CodeMap)> {
        let calculations = source.calculations()?;
        for calc in &calculations {
            let fields = source.calculation_fields(calc.calc_id)?;
            self.instantiate_one(calc, &fields)?;
        }
        tracing::info!(
            calculations = self.maps.calc_map.len(),
            species = self.species_by_title.len(),
            units = self.units.len(),
            "calculations instantiated"
        );
        Ok((&self.maps.calc_map, &self.maps.species_map))
    }

    fn instantiate_one(&mut self, calc: &CalculationInfo, fields: &FieldDict) -> CorrelateResult<()> {
        let code = calc.code();
        let calc_name = format!("CALC_{}", calc.calc_id);
        let entity = self.store.create_entity("CompCalculation", &calc_name)?;
        self.store.set_property(
            entity,
            HAS_ANNOTATION,
            Value::Text(format!("{};{};{}", calc.title, code, calc.calc_id)),
        )?;

        let mappings = std::mem::take(&mut self.mappings);
        let applied = mappings
            .iter()
            .try_for_each(|mapping| self.apply_field(entity, fields, mapping));
        self.mappings = mappings;
        applied?;

        if let Some(geometry) = non_empty(fields, GEOMETRY_FIELD) {
            let molecule = self.molecule(calc.calc_id, geometry)?;
            self.store.set_property(entity, HAS_MOLECULE, Value::Entity(molecule))?;
        }
        self.initialization(entity, calc.calc_id, fields)?;
        self.maps.calc_map.insert(code.clone(), calc_name);

        let species = match self.species_by_title.get(&calc.title) {
            Some(existing) => {
                let name = existing.clone();
                let id = self
                    .store
                    .get_entity(&name)
                    .ok_or_else(|| crate::error::StoreError::UnknownEntity { name: name.clone() })?;
                self.store.set_property(id, HAS_CALCULATION, Value::Entity(entity))?;
                self.store.set_property(id, HAS_ANNOTATION, Value::Text(code.clone()))?;
                name
            }
            None => {
                let name = format!("SPC_{}-spc-{}", self.report_id, calc.calc_order);
                let id = self.store.create_entity("ChemSpecies", &name)?;
                self.store.set_property(id, HAS_CALCULATION, Value::Entity(entity))?;
                self.store.set_property(id, HAS_ANNOTATION, Value::Text(code.clone()))?;
                self.species_by_title.insert(calc.title.clone(), name.clone());
                name
            }
        };
        self.maps.species_map.insert(code, species);
        Ok(())
    }

    /// Copy one mapped field onto a calculation. Missing values are omitted.
    fn apply_field(
        &mut self,
        calc: EntityId,
        fields: &FieldDict,
        mapping: &ResolvedMapping,
    ) -> CorrelateResult<()> {
        let Some(raw) = non_empty(fields, &mapping.field) else {
            return Ok(());
        };
        match mapping.kind {
            ValueKind::String => {
                self.store
                    .assign(calc, &mapping.property, mapping.cardinality, Value::text(raw))?;
            }
            ValueKind::Integer => match raw.parse::<i64>() {
                Ok(i) => {
                    self.store
                        .assign(calc, &mapping.property, mapping.cardinality, Value::Integer(i))?;
                }
                Err(_) => tracing::warn!(field = %mapping.field, value = raw, "not an integer, field omitted"),
            },
            ValueKind::Float | ValueKind::Vector => {
                let Some(unit) = mapping.unit.as_ref().and_then(|u| u.resolve(fields)) else {
                    tracing::debug!(field = %mapping.field, "no resolvable unit, field omitted");
                    return Ok(());
                };
                let (class, value) = if mapping.kind == ValueKind::Float {
                    match raw.parse::<f64>() {
                        Ok(f) => ("FloatValue", Value::Float(f)),
                        Err(_) => {
                            tracing::warn!(field = %mapping.field, value = raw, "not a number, field omitted");
                            return Ok(());
                        }
                    }
                } else {
                    ("VectorValue", Value::text(raw))
                };
                let unit = self.unit(unit)?;
                let value_entity = self.store.create_anonymous(class)?;
                self.store.set_property(value_entity, HAS_VALUE, value)?;
                self.store.set_property(value_entity, HAS_UNIT, Value::Entity(unit))?;
                let result = self.store.create_anonymous("CalculationResult")?;
                self.store.assign(
                    result,
                    &mapping.property,
                    mapping.cardinality,
                    Value::Entity(value_entity),
                )?;
                self.store.set_property(calc, HAS_RESULT, Value::Entity(result))?;
            }
        }
        Ok(())
    }

    /// The unit entity for a unit name, created on first use.
    fn unit(&mut self, unit: &str) -> CorrelateResult<EntityId> {
        if let Some(&id) = self.units.get(unit) {
            return Ok(id);
        }
        let id = self.store.get_or_create("Value", &unit_entity_name(unit))?;
        self.units.insert(unit.to_string(), id);
        Ok(id)
    }

    /// A molecule with one atom per `Symbol X Y Z` line.
    fn molecule(&mut self, calc_id: u64, geometry: &str) -> CorrelateResult<EntityId> {
        let molecule = self.store.create_anonymous("Molecule")?;
        let unit = self.unit(COORDINATE_UNIT)?;
        for line in geometry.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let invalid = || CorrelateError::InvalidGeometry {
                calc_id,
                line: line.to_string(),
            };
            let [symbol, coords @ ..] = parts.as_slice() else {
                return Err(invalid());
            };
            if coords.len() != 3 {
                return Err(invalid());
            }
            let atom = self.store.create_anonymous("Atom")?;
            self.store.set_property(atom, HAS_SYMBOL, Value::text(*symbol))?;
            for (property, coord) in HAS_COORDINATES.iter().zip(coords) {
                let value: f64 = coord.parse().map_err(|_| invalid())?;
                let float = self.store.create_anonymous("FloatValue")?;
                self.store.set_property(float, HAS_VALUE, Value::Float(value))?;
                self.store.set_property(float, HAS_UNIT, Value::Entity(unit))?;
                self.store.set_property(atom, property, Value::Entity(float))?;
            }
            self.store.set_property(molecule, HAS_ATOM, Value::Entity(atom))?;
        }
        Ok(molecule)
    }

    /// Initialization module with basis set and level of theory.
    fn initialization(&mut self, calc: EntityId, calc_id: u64, fields: &FieldDict) -> CorrelateResult<()> {
        let basis = non_empty(fields, BASIS_FIELD);
        let method = non_empty(fields, METHOD_FIELD);
        if basis.is_none() && method.is_none() {
            return Ok(());
        }
        let init = self
            .store
            .create_entity("InitializationModule", &format!("init_{calc_id}"))?;
        self.store.set_property(calc, HAS_INITIALIZATION, Value::Entity(init))?;
        if let Some(basis) = basis {
            let entity = self
                .store
                .create_entity("BasisSet", &format!("basis_set_{calc_id}"))?;
            self.store.set_property(entity, HAS_BASIS_SET, Value::text(basis))?;
            self.store.set_property(init, HAS_PARAMETER, Value::Entity(entity))?;
        }
        if let Some(method) = method {
            let entity = self
                .store
                .create_entity("LevelOfTheory", &format!("level_of_theory_{calc_id}"))?;
            self.store.set_property(entity, HAS_LEVEL_OF_THEORY, Value::text(method))?;
            self.store.set_property(init, HAS_PARAMETER, Value::Entity(entity))?;
        }
        Ok(())
    }
}

fn non_empty<'a>(fields: &'a FieldDict, name: &str) -> Option<&'a str> {
    fields.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Entity name of a unit: characters outside `[A-Za-z0-9._~-]` become `_`.
fn unit_entity_name(unit: &str) -> String {
    unit.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
