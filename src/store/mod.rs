//! Ontology store: the context object every build writes its entities into.
//!
//! Entities are named individuals of schema classes. Property assignment is
//! dispatched on the property's declared [`Cardinality`]: functional
//! properties are overwritten, multivalued ones appended to. The store turns
//! into RDF on demand through an oxigraph snapshot, which is also where the
//! CONSTRUCT patterns run.
//!
//! - [`schema`]: TOML schema and the field-mapping table
//! - [`queries`]: bundled CONSTRUCT patterns

pub mod queries;
pub mod schema;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use oxigraph::io::RdfFormat;
use oxigraph::model::vocab::{rdf, rdfs, xsd};
use oxigraph::model::{GraphNameRef, Literal, NamedNode, NamedNodeRef, Quad, Term, Triple};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::StoreError;

use self::queries::ConstructPattern;
pub use self::schema::{Cardinality, OntologySchema};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub const OWL_CLASS: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Class");
pub const OWL_NAMED_INDIVIDUAL: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#NamedIndividual");

/// Handle of an entity inside one [`OntologyStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Entity(EntityId),
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }
}

/// Values held by one property of one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertySlot {
    Functional(Value),
    Multivalued(Vec<Value>),
}

impl PropertySlot {
    pub fn values(&self) -> &[Value] {
        match self {
            PropertySlot::Functional(v) => std::slice::from_ref(v),
            PropertySlot::Multivalued(vs) => vs,
        }
    }
}

/// A named individual.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub class: String,
    pub properties: BTreeMap<String, PropertySlot>,
}

/// In-memory ontology store for one knowledge-graph build.
pub struct OntologyStore {
    schema: OntologySchema,
    entities: Vec<Entity>,
    by_name: HashMap<String, EntityId>,
    anonymous_counters: HashMap<String, usize>,
    inferred: Vec<Triple>,
}

impl OntologyStore {
    pub fn new(schema: OntologySchema) -> Self {
        Self {
            schema,
            entities: Vec::new(),
            by_name: HashMap::new(),
            anonymous_counters: HashMap::new(),
            inferred: Vec::new(),
        }
    }

    pub fn schema(&self) -> &OntologySchema {
        &self.schema
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Triples added by [`run_pattern_queries`](Self::run_pattern_queries).
    pub fn inferred(&self) -> &[Triple] {
        &self.inferred
    }

    /// Create a named individual of a declared class.
    pub fn create_entity(&mut self, class: &str, name: &str) -> StoreResult<EntityId> {
        if self.schema.class(class).is_none() {
            return Err(StoreError::UnknownClass {
                class: class.to_string(),
            });
        }
        if self.by_name.contains_key(name) {
            return Err(StoreError::DuplicateEntity {
                name: name.to_string(),
            });
        }
        let iri = self.schema.entity_iri(name);
        NamedNode::new(&iri).map_err(|e| StoreError::InvalidIri {
            iri: iri.clone(),
            message: e.to_string(),
        })?;

        let id = EntityId(self.entities.len());
        self.entities.push(Entity {
            name: name.to_string(),
            class: class.to_string(),
            properties: BTreeMap::new(),
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Create an individual named after its class and a per-class counter,
    /// e.g. `floatvalue3`.
    pub fn create_anonymous(&mut self, class: &str) -> StoreResult<EntityId> {
        let stem = class.to_lowercase();
        loop {
            let counter = self.anonymous_counters.entry(class.to_string()).or_insert(0);
            *counter += 1;
            let name = format!("{stem}{counter}");
            if !self.by_name.contains_key(&name) {
                return self.create_entity(class, &name);
            }
        }
    }

    /// Return the entity with this name, creating it when absent.
    pub fn get_or_create(&mut self, class: &str, name: &str) -> StoreResult<EntityId> {
        match self.get_entity(name) {
            Some(id) => Ok(id),
            None => self.create_entity(class, name),
        }
    }

    pub fn get_entity(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn entity_name(&self, id: EntityId) -> Option<&str> {
        self.entity(id).map(|e| e.name.as_str())
    }

    /// Class of the named entity.
    pub fn query_type(&self, name: &str) -> Option<&str> {
        let id = self.get_entity(name)?;
        self.entity(id).map(|e| e.class.as_str())
    }

    /// Values of a property, in assignment order.
    pub fn values(&self, id: EntityId, property: &str) -> &[Value] {
        self.entity(id)
            .and_then(|e| e.properties.get(property))
            .map(PropertySlot::values)
            .unwrap_or(&[])
    }

    /// Assign a property using its declared cardinality.
    pub fn set_property(&mut self, id: EntityId, property: &str, value: Value) -> StoreResult<()> {
        let cardinality = self
            .schema
            .property(property)
            .map(|p| p.cardinality)
            .ok_or_else(|| StoreError::UnknownProperty {
                property: property.to_string(),
            })?;
        self.assign(id, property, cardinality, value)
    }

    /// Assign a property with an already resolved cardinality.
    pub fn assign(
        &mut self,
        id: EntityId,
        property: &str,
        cardinality: Cardinality,
        value: Value,
    ) -> StoreResult<()> {
        if let Value::Entity(target) = &value {
            if self.entity(*target).is_none() {
                return Err(StoreError::UnknownEntity {
                    name: format!("#{}", target.0),
                });
            }
        }
        let entity = self
            .entities
            .get_mut(id.0)
            .ok_or_else(|| StoreError::UnknownEntity {
                name: format!("#{}", id.0),
            })?;
        match cardinality {
            Cardinality::Functional => {
                entity
                    .properties
                    .insert(property.to_string(), PropertySlot::Functional(value));
            }
            Cardinality::Multivalued => {
                let slot = entity
                    .properties
                    .entry(property.to_string())
                    .or_insert_with(|| PropertySlot::Multivalued(Vec::new()));
                let mut values = match std::mem::replace(slot, PropertySlot::Multivalued(Vec::new())) {
                    PropertySlot::Functional(v) => vec![v],
                    PropertySlot::Multivalued(vs) => vs,
                };
                values.push(value);
                *slot = PropertySlot::Multivalued(values);
            }
        }
        Ok(())
    }

    // ── RDF view ────────────────────────────────────────────────────────

    fn named_node(iri: String) -> StoreResult<NamedNode> {
        NamedNode::new(&iri).map_err(|e| StoreError::InvalidIri {
            iri,
            message: e.to_string(),
        })
    }

    fn class_node(&self, class: &str) -> StoreResult<NamedNode> {
        let iri = self
            .schema
            .class_iri(class)
            .ok_or_else(|| StoreError::UnknownClass {
                class: class.to_string(),
            })?;
        Self::named_node(iri)
    }

    fn entity_node(&self, id: EntityId) -> StoreResult<NamedNode> {
        let entity = self.entity(id).ok_or_else(|| StoreError::UnknownEntity {
            name: format!("#{}", id.0),
        })?;
        Self::named_node(self.schema.entity_iri(&entity.name))
    }

    fn value_term(&self, value: &Value) -> StoreResult<Term> {
        Ok(match value {
            Value::Entity(id) => self.entity_node(*id)?.into(),
            Value::Text(s) => Literal::new_simple_literal(s.as_str()).into(),
            Value::Integer(i) => Literal::from(*i).into(),
            Value::Float(f) => Literal::new_typed_literal(float_lexical(*f), xsd::FLOAT).into(),
        })
    }

    /// Every statement of the store: class declarations, individuals with
    /// their properties, then inferred triples.
    pub fn statements(&self) -> StoreResult<Vec<Triple>> {
        let mut triples = Vec::new();
        for class in &self.schema.classes {
            let node = self.class_node(&class.name)?;
            triples.push(Triple::new(
                node.clone(),
                rdf::TYPE.into_owned(),
                OWL_CLASS.into_owned(),
            ));
            if let Some(parent) = &class.parent {
                triples.push(Triple::new(
                    node,
                    rdfs::SUB_CLASS_OF.into_owned(),
                    self.class_node(parent)?,
                ));
            }
        }

        let mut predicates: HashMap<&str, NamedNode> = HashMap::new();
        for (index, entity) in self.entities.iter().enumerate() {
            let subject = self.entity_node(EntityId(index))?;
            triples.push(Triple::new(
                subject.clone(),
                rdf::TYPE.into_owned(),
                OWL_NAMED_INDIVIDUAL.into_owned(),
            ));
            triples.push(Triple::new(
                subject.clone(),
                rdf::TYPE.into_owned(),
                self.class_node(&entity.class)?,
            ));
            for (property, slot) in &entity.properties {
                let predicate = match predicates.get(property.as_str()) {
                    Some(p) => p.clone(),
                    None => {
                        let iri = self.schema.property_iri(property).ok_or_else(|| {
                            StoreError::UnknownProperty {
                                property: property.clone(),
                            }
                        })?;
                        let node = Self::named_node(iri)?;
                        predicates.insert(property.as_str(), node.clone());
                        node
                    }
                };
                for value in slot.values() {
                    triples.push(Triple::new(
                        subject.clone(),
                        predicate.clone(),
                        self.value_term(value)?,
                    ));
                }
            }
        }

        triples.extend(self.inferred.iter().cloned());
        Ok(triples)
    }

    /// Build an in-memory oxigraph store holding every statement.
    pub fn to_rdf_store(&self) -> StoreResult<Store> {
        let store = Store::new().map_err(|e| StoreError::Sparql {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        for triple in self.statements()? {
            let quad = Quad::new(
                triple.subject,
                triple.predicate,
                triple.object,
                GraphNameRef::DefaultGraph,
            );
            store.insert(&quad).map_err(|e| StoreError::Sparql {
                message: format!("insert failed: {e}"),
            })?;
        }
        Ok(store)
    }

    /// Run CONSTRUCT patterns against one snapshot of the store and add the
    /// triples they produce. Returns the number of new triples.
    pub fn run_pattern_queries(&mut self, patterns: &[ConstructPattern]) -> StoreResult<usize> {
        let snapshot = self.to_rdf_store()?;
        let mut known: HashSet<Triple> = self.statements()?.into_iter().collect();
        let mut added = Vec::new();

        for pattern in patterns {
            let results = snapshot.query(pattern.query).map_err(|e| StoreError::Sparql {
                message: format!("pattern {} failed: {e}", pattern.name),
            })?;
            let QueryResults::Graph(constructed) = results else {
                return Err(StoreError::Sparql {
                    message: format!("pattern {} is not a CONSTRUCT query", pattern.name),
                });
            };
            let mut produced = 0usize;
            for triple in constructed {
                let triple = triple.map_err(|e| StoreError::Sparql {
                    message: format!("pattern {} result error: {e}", pattern.name),
                })?;
                if known.insert(triple.clone()) {
                    added.push(triple);
                    produced += 1;
                }
            }
            tracing::debug!(pattern = pattern.name, new_triples = produced, "construct pattern applied");
        }

        let count = added.len();
        self.inferred.extend(added);
        Ok(count)
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Write the knowledge graph. The format follows the file extension:
    /// `.nt` N-Triples, `.owl`/`.rdf` RDF/XML, anything else Turtle.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let snapshot = self.to_rdf_store()?;
        let file = std::fs::File::create(path).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut writer = snapshot
            .dump_graph_to_writer(GraphNameRef::DefaultGraph, format_for(path), BufWriter::new(file))
            .map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;
        writer.flush().map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        tracing::info!(path = %path.display(), entities = self.entities.len(), "knowledge graph saved");
        Ok(())
    }

    /// Read a saved knowledge graph back as triples.
    pub fn load_triples(path: &Path) -> StoreResult<Vec<Triple>> {
        let file = std::fs::File::open(path).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let store = Store::new().map_err(|e| StoreError::Sparql {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        store
            .load_from_reader(format_for(path), BufReader::new(file))
            .map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;

        let mut triples = Vec::new();
        for quad in store.iter() {
            let quad = quad.map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;
            triples.push(Triple::new(quad.subject, quad.predicate, quad.object));
        }
        Ok(triples)
    }
}

/// xsd:float lexical form. Rust spells the infinities `inf`.
fn float_lexical(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "INF".to_string()
    } else if f == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        f.to_string()
    }
}

fn format_for(path: &Path) -> RdfFormat {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("nt") => RdfFormat::NTriples,
        Some("owl" | "rdf" | "xml") => RdfFormat::RdfXml,
        _ => RdfFormat::Turtle,
    }
}
