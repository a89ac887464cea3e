//! Ontology schema: namespaces, classes, properties and the field-mapping table.
//!
//! The schema is TOML. The OntoRXN schema is bundled into the binary; a custom
//! one can be loaded from disk with [`OntologySchema::load`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Result type for schema loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

const ONTORXN_TOML: &str = include_str!("../../data/schema/ontorxn.toml");

// ── Schema data model ───────────────────────────────────────────────────

/// How a property stores its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// One value; assignment overwrites.
    Functional,
    /// Ordered sequence; assignment appends, duplicates allowed.
    Multivalued,
}

/// Kind of an external field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Vector,
}

impl ValueKind {
    /// Float and Vector values are wrapped in a unit-carrying value entity.
    pub fn needs_unit(self) -> bool {
        matches!(self, ValueKind::Float | ValueKind::Vector)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub prefix: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    pub prefix: String,
    pub cardinality: Cardinality,
}

/// One row of the field-mapping table as written in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Ontology property receiving the value.
    pub property: String,
    /// Field name in the calculation's field dictionary.
    pub field: String,
    pub kind: ValueKind,
    /// Unit field name, or a raw unit written `r"Unit"`.
    #[serde(default)]
    pub unit: Option<String>,
}

/// Where the unit of a Float/Vector field comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitSource {
    /// A fixed unit name.
    Raw(String),
    /// The value of another field.
    Field(String),
}

impl UnitSource {
    /// Parse a unit spec: `r"Hartree"` is raw, anything else names a field.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        match spec
            .strip_prefix("r\"")
            .and_then(|rest| rest.strip_suffix('"'))
        {
            Some(raw) => Some(UnitSource::Raw(raw.to_string())),
            None => Some(UnitSource::Field(spec.to_string())),
        }
    }

    /// Resolve the unit name against a field dictionary.
    pub fn resolve<'a>(&'a self, fields: &'a BTreeMap<String, String>) -> Option<&'a str> {
        match self {
            UnitSource::Raw(unit) => Some(unit.as_str()),
            UnitSource::Field(name) => fields
                .get(name)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty()),
        }
    }
}

/// A field mapping checked against the declared properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub property: String,
    pub cardinality: Cardinality,
    pub field: String,
    pub kind: ValueKind,
    pub unit: Option<UnitSource>,
}

/// A parsed ontology schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologySchema {
    /// Namespace entities are created in.
    pub namespace: String,
    /// Ordered main class list; position i tags individuals with i + 2.
    pub main_classes: Vec<String>,
    pub prefixes: BTreeMap<String, String>,
    #[serde(rename = "class", default)]
    pub classes: Vec<ClassDecl>,
    #[serde(rename = "property", default)]
    pub properties: Vec<PropertyDecl>,
    #[serde(rename = "mapping", default)]
    pub mappings: Vec<FieldMapping>,
}

impl OntologySchema {
    /// The bundled OntoRXN schema.
    pub fn ontorxn() -> ConfigResult<Self> {
        Self::from_toml(ONTORXN_TOML, "(bundled ontorxn.toml)")
    }

    /// Load a schema from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Parse and validate schema TOML. `origin` names the source in errors.
    pub fn from_toml(content: &str, origin: &str) -> ConfigResult<Self> {
        let schema: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.namespace.is_empty() {
            return Err(ConfigError::InvalidSchema {
                message: "namespace is empty".into(),
            });
        }
        for class in &self.classes {
            self.check_prefix(&class.prefix, &class.name)?;
            if let Some(parent) = &class.parent {
                if self.class(parent).is_none() {
                    return Err(ConfigError::InvalidSchema {
                        message: format!("class {} has undeclared parent {parent}", class.name),
                    });
                }
            }
        }
        for property in &self.properties {
            self.check_prefix(&property.prefix, &property.name)?;
        }
        for main in &self.main_classes {
            if self.class(main).is_none() {
                return Err(ConfigError::InvalidSchema {
                    message: format!("main class {main} is not declared"),
                });
            }
        }
        Ok(())
    }

    fn check_prefix(&self, prefix: &str, owner: &str) -> ConfigResult<()> {
        if self.prefixes.contains_key(prefix) {
            Ok(())
        } else {
            Err(ConfigError::InvalidSchema {
                message: format!("{owner} uses undeclared prefix {prefix}"),
            })
        }
    }

    pub fn class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDecl> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Full IRI of a declared class.
    pub fn class_iri(&self, name: &str) -> Option<String> {
        let class = self.class(name)?;
        let base = self.prefixes.get(&class.prefix)?;
        Some(format!("{base}{}", class.name))
    }

    /// Full IRI of a declared property.
    pub fn property_iri(&self, name: &str) -> Option<String> {
        let property = self.property(name)?;
        let base = self.prefixes.get(&property.prefix)?;
        Some(format!("{base}{}", property.name))
    }

    /// Full IRI of an entity name.
    pub fn entity_iri(&self, name: &str) -> String {
        format!("{}{name}", self.namespace)
    }

    /// Map class IRIs back to class names.
    pub fn class_names_by_iri(&self) -> HashMap<String, String> {
        self.classes
            .iter()
            .filter_map(|c| Some((self.class_iri(&c.name)?, c.name.clone())))
            .collect()
    }

    /// Check every field mapping against the declared properties.
    ///
    /// Mappings naming an unknown property are dropped with a warning.
    pub fn resolve_mappings(&self) -> Vec<ResolvedMapping> {
        self.mappings
            .iter()
            .filter_map(|m| {
                let Some(decl) = self.property(&m.property) else {
                    tracing::warn!(
                        property = %m.property,
                        field = %m.field,
                        "field mapping names a property the ontology does not declare, skipping"
                    );
                    return None;
                };
                Some(ResolvedMapping {
                    property: m.property.clone(),
                    cardinality: decl.cardinality,
                    field: m.field.clone(),
                    kind: m.kind,
                    unit: m.unit.as_deref().and_then(UnitSource::parse),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_schema_parses() {
        let schema = OntologySchema::ontorxn().unwrap();
        assert_eq!(schema.main_classes.len(), 4);
        assert_eq!(
            schema.class_iri("ReactionStep").as_deref(),
            Some("http://www.semanticweb.com/OntoRxn#ReactionStep")
        );
        assert_eq!(
            schema.property("hasTS").map(|p| p.cardinality),
            Some(Cardinality::Functional)
        );
        assert_eq!(
            schema.property("hasNode").map(|p| p.cardinality),
            Some(Cardinality::Multivalued)
        );
    }

    #[test]
    fn unit_specs() {
        assert_eq!(
            UnitSource::parse("r\"Hartree\""),
            Some(UnitSource::Raw("Hartree".into()))
        );
        assert_eq!(
            UnitSource::parse("energy_unit"),
            Some(UnitSource::Field("energy_unit".into()))
        );
        assert_eq!(UnitSource::parse("  "), None);

        let mut fields = BTreeMap::new();
        fields.insert("energy_unit".to_string(), "kcal/mol".to_string());
        assert_eq!(
            UnitSource::Field("energy_unit".into()).resolve(&fields),
            Some("kcal/mol")
        );
        assert_eq!(UnitSource::Field("other".into()).resolve(&fields), None);
    }

    const SMALL: &str = r#"
        namespace = "http://example.org/kg#"
        main_classes = ["Thing"]

        [prefixes]
        ex = "http://example.org/onto#"

        [[class]]
        name = "Thing"
        prefix = "ex"

        [[property]]
        name = "hasLabel"
        prefix = "ex"
        cardinality = "multivalued"

        [[mapping]]
        property = "hasLabel"
        field = "label"
        kind = "String"

        [[mapping]]
        property = "hasNothing"
        field = "nothing"
        kind = "Float"
        unit = "r\"eV\""
    "#;

    #[test]
    fn unknown_mapping_properties_are_dropped() {
        let schema = OntologySchema::from_toml(SMALL, "small").unwrap();
        let resolved = schema.resolve_mappings();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].property, "hasLabel");
        assert_eq!(resolved[0].cardinality, Cardinality::Multivalued);
    }

    #[test]
    fn undeclared_prefix_is_rejected() {
        let bad = SMALL.replacen("prefix = \"ex\"", "prefix = \"zz\"", 1);
        assert!(matches!(
            OntologySchema::from_toml(&bad, "bad"),
            Err(ConfigError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn malformed_toml_names_origin() {
        let err = OntologySchema::from_toml("namespace = ", "broken.toml").unwrap_err();
        assert!(format!("{err}").contains("broken.toml"));
    }
}
