//! Report collaborator: calculations, properties and per-calculation fields.
//!
//! The network transport to the report service is not part of this crate.
//! [`ReportSource`] is the contract a build needs; [`ReportDump`] implements it
//! over a JSON dump of one report.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::network::formula::FormulaRecord;

/// Result type for report operations.
pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Field dictionary of one calculation (field name → text value).
pub type FieldDict = BTreeMap<String, String>;

/// One calculation listed by a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationInfo {
    #[serde(rename = "calcId")]
    pub calc_id: u64,
    #[serde(rename = "calcOrder")]
    pub calc_order: u32,
    pub title: String,
}

impl CalculationInfo {
    /// The per-build `cN` code of this calculation.
    pub fn code(&self) -> String {
        format!("c{}", self.calc_order)
    }
}

/// Report-level properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportProperties {
    /// XML configuration block holding the series/step formulas.
    #[serde(default)]
    pub configuration: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ReportProperties {
    /// Formula records of every series, in document order.
    pub fn formula_records(&self) -> ReportResult<Vec<FormulaRecord>> {
        match &self.configuration {
            Some(xml) => parse_series_configuration(xml),
            None => Ok(Vec::new()),
        }
    }
}

/// What a knowledge-graph build needs from a report.
pub trait ReportSource {
    fn report_id(&self) -> u64;
    /// Calculations in report order.
    fn calculations(&self) -> ReportResult<Vec<CalculationInfo>>;
    fn properties(&self) -> ReportResult<ReportProperties>;
    /// Parsed output fields of one calculation; empty when none are known.
    fn calculation_fields(&self, calc_id: u64) -> ReportResult<FieldDict>;
}

/// A report dumped to JSON.
///
/// ```json
/// { "reportId": 17,
///   "properties": { "configuration": "<configuration>...</configuration>" },
///   "calculations": [ { "calcId": 101, "calcOrder": 0, "title": "Reactant" } ],
///   "fields": { "101": { "scf_energy": "-1.5", "energy_unit": "Hartree" } } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportDump {
    #[serde(rename = "reportId")]
    pub report_id: u64,
    #[serde(default)]
    pub properties: ReportProperties,
    #[serde(default)]
    pub calculations: Vec<CalculationInfo>,
    #[serde(default)]
    pub fields: HashMap<String, FieldDict>,
}

impl ReportDump {
    /// Load a dump from a JSON file.
    pub fn load(path: &Path) -> ReportResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ReportError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content).map_err(|e| match e {
            ReportError::Json { message, .. } => ReportError::Json {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_json(content: &str) -> ReportResult<Self> {
        serde_json::from_str(content).map_err(|e| ReportError::Json {
            path: "(inline)".into(),
            message: e.to_string(),
        })
    }
}

impl ReportSource for ReportDump {
    fn report_id(&self) -> u64 {
        self.report_id
    }

    fn calculations(&self) -> ReportResult<Vec<CalculationInfo>> {
        Ok(self.calculations.clone())
    }

    fn properties(&self) -> ReportResult<ReportProperties> {
        Ok(self.properties.clone())
    }

    fn calculation_fields(&self, calc_id: u64) -> ReportResult<FieldDict> {
        Ok(self
            .fields
            .get(&calc_id.to_string())
            .cloned()
            .unwrap_or_default())
    }
}

/// Parse the series configuration block into formula records.
///
/// Only `serie` elements below `configuration/parameters/series` are read;
/// every `step` child contributes one record with its `label` attribute and
/// text content.
pub fn parse_series_configuration(xml: &str) -> ReportResult<Vec<FormulaRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut series: Option<String> = None;
    let mut step: Option<(String, String)> = None;
    let mut records = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| ReportError::Configuration {
            message: format!("at byte {}: {e}", reader.buffer_position()),
        })?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let under_series = path_is(&path, &["configuration", "parameters", "series"]);
                if name == "serie" && under_series {
                    series = Some(attribute(&e, "name")?.unwrap_or_default());
                } else if name == "step" && series.is_some() && path.last().map(String::as_str) == Some("serie") {
                    let label = attribute(&e, "label")?.ok_or_else(|| ReportError::Configuration {
                        message: "step without label attribute".into(),
                    })?;
                    step = Some((label, String::new()));
                }
                path.push(name);
            }
            Event::Empty(e) => {
                // `<step label=".."/>`: a step with no formula.
                if e.name().as_ref() == b"step" && series.is_some() {
                    if let Some(label) = attribute(&e, "label")? {
                        tracing::debug!(%label, "series step without formula");
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, text)) = step.as_mut() {
                    let value = t.unescape().map_err(|e| ReportError::Configuration {
                        message: e.to_string(),
                    })?;
                    text.push_str(&value);
                }
            }
            Event::CData(c) => {
                if let Some((_, text)) = step.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                let closed = path.pop();
                match closed.as_deref() {
                    Some("step") => {
                        if let (Some((label, formula)), Some(name)) = (step.take(), series.as_ref()) {
                            records.push(FormulaRecord::new(name.clone(), label, formula.trim()));
                        }
                    }
                    Some("serie") => series = None,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(ReportError::Configuration {
            message: format!("unclosed element <{}>", path.join("/")),
        });
    }
    Ok(records)
}

fn path_is(path: &[String], expected: &[&str]) -> bool {
    path.len() == expected.len() && path.iter().zip(expected).all(|(a, b)| a == b)
}

fn attribute(e: &quick_xml::events::BytesStart<'_>, key: &str) -> ReportResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ReportError::Configuration {
            message: e.to_string(),
        })?;
        if attr.key.as_ref() == key.as_bytes() {
            let value = attr.unescape_value().map_err(|e| ReportError::Configuration {
                message: e.to_string(),
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"<configuration>
      <parameters>
        <series>
          <serie name="Path A">
            <step label="R">c0+c1</step>
            <step label="TS1">c2</step>
            <step label="P">c3&amp;x</step>
          </serie>
          <serie name="Path B">
            <step label="R">c0+c1</step>
            <step label="TS2"><![CDATA[c4+c1]]></step>
          </serie>
        </series>
      </parameters>
    </configuration>"#;

    #[test]
    fn parses_series_in_document_order() {
        let records = parse_series_configuration(CONFIG).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0], FormulaRecord::new("Path A", "R", "c0+c1"));
        assert_eq!(records[2].formula, "c3&x");
        assert_eq!(records[4], FormulaRecord::new("Path B", "TS2", "c4+c1"));
    }

    #[test]
    fn step_without_label_is_rejected() {
        let xml = "<configuration><parameters><series><serie name=\"s\"><step>c0</step></serie></series></parameters></configuration>";
        assert!(matches!(
            parse_series_configuration(xml),
            Err(ReportError::Configuration { .. })
        ));
    }

    #[test]
    fn unclosed_elements_are_rejected() {
        let xml = "<configuration><parameters>";
        assert!(parse_series_configuration(xml).is_err());
    }

    #[test]
    fn report_dump_round_trip_through_json() {
        let json = r#"{
            "reportId": 17,
            "properties": { "configuration": "<configuration/>", "title": "demo" },
            "calculations": [
                { "calcId": 101, "calcOrder": 0, "title": "Reactant" },
                { "calcId": 102, "calcOrder": 5, "title": "Reactant" }
            ],
            "fields": { "101": { "scf_energy": "-1.5" } }
        }"#;
        let dump = ReportDump::from_json(json).unwrap();
        assert_eq!(dump.report_id(), 17);
        let calcs = dump.calculations().unwrap();
        assert_eq!(calcs[1].code(), "c5");
        assert_eq!(dump.calculation_fields(101).unwrap()["scf_energy"], "-1.5");
        assert!(dump.calculation_fields(102).unwrap().is_empty());
        assert!(dump.properties().unwrap().formula_records().unwrap().is_empty());
    }
}
