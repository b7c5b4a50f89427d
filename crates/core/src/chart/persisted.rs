//! Persisted representation of a chart document.
//!
//! The on-disk and over-the-wire shape is a strict wire model:
//!
//! ```yaml
//! teeth:
//!   16:
//!     surfaces:
//!       occlusal: { procedure_id: caries, color: red, filled: true }
//!     findings:
//!       - { procedure_id: endodoncia, color: blue, abbreviation: TC }
//! specifications: "Patient reports sensitivity"
//! ```
//!
//! Unknown keys are rejected, and every `procedure_id` must name a catalog procedure. Missing
//! `surfaces`/`findings` read as empty, duplicate finding entries collapse onto the first one,
//! and teeth without marks are not written back.

use super::{ChartDocument, FindingEntry, SurfaceMark, ToothState};
use crate::error::{DentalError, DentalResult};
use dentachart_catalog::ProcedureCatalog;
use dentachart_types::{Surface, ToothNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChartWire {
    #[serde(default)]
    teeth: BTreeMap<ToothNumber, ToothWire>,
    #[serde(default)]
    specifications: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ToothWire {
    #[serde(default)]
    surfaces: BTreeMap<Surface, SurfaceMark>,
    #[serde(default)]
    findings: Vec<FindingEntry>,
}

impl TryFrom<ChartWire> for ChartDocument {
    type Error = DentalError;

    fn try_from(wire: ChartWire) -> Result<Self, Self::Error> {
        let catalog = ProcedureCatalog::standard();
        for tooth in wire.teeth.values() {
            let surface_ids = tooth.surfaces.values().map(|mark| mark.procedure_id.as_str());
            let finding_ids = tooth.findings.iter().map(|entry| entry.procedure_id.as_str());
            for id in surface_ids.chain(finding_ids) {
                catalog.require(id)?;
            }
        }

        let teeth = wire
            .teeth
            .into_iter()
            .map(|(number, tooth)| (number, ToothState::new(tooth.surfaces, tooth.findings)))
            .filter(|(_, state)| !state.is_empty())
            .map(|(number, state)| (number, Arc::new(state)))
            .collect();

        Ok(ChartDocument {
            teeth,
            specifications: wire.specifications,
        })
    }
}

impl From<ChartDocument> for ChartWire {
    fn from(chart: ChartDocument) -> Self {
        let teeth = chart
            .occupied_teeth()
            .map(|(number, state)| {
                (
                    number,
                    ToothWire {
                        surfaces: state.surfaces().clone(),
                        findings: state.findings().to_vec(),
                    },
                )
            })
            .collect();

        ChartWire {
            teeth,
            specifications: chart.specifications,
        }
    }
}

fn schema_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> DentalError {
    let path = err.path().to_string();
    let path = if path.is_empty() || path == "." {
        "<root>".to_owned()
    } else {
        path
    };
    DentalError::ChartSchema {
        path,
        message: err.into_inner().to_string(),
    }
}

impl ChartDocument {
    /// Parse a chart document from YAML text, reporting the failing field path on mismatch.
    pub fn from_yaml(yaml_text: &str) -> DentalResult<Self> {
        if yaml_text.trim().is_empty() {
            return Ok(Self::new());
        }
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire: ChartWire = serde_path_to_error::deserialize(deserializer).map_err(schema_error)?;
        wire.try_into()
    }

    pub fn to_yaml(&self) -> DentalResult<String> {
        serde_yaml::to_string(&ChartWire::from(self.clone()))
            .map_err(|e| DentalError::ChartSerialization(e.to_string()))
    }

    /// Parse a chart document from JSON text, reporting the failing field path on mismatch.
    pub fn from_json(json_text: &str) -> DentalResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        let wire: ChartWire =
            serde_path_to_error::deserialize(&mut deserializer).map_err(schema_error)?;
        wire.try_into()
    }

    pub fn to_json(&self) -> DentalResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DentalError::ChartSerialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentachart_catalog::CatalogError;
    use dentachart_types::{ClinicalColor, MarkColor};

    const SAMPLE: &str = r##"teeth:
  16:
    surfaces:
      occlusal:
        procedure_id: caries
        color: red
        filled: true
    findings:
      - procedure_id: endodoncia
        color: blue
        abbreviation: TC
  21:
    findings:
      - procedure_id: corona_completa
        color: "#2563eb"
specifications: "Sensitivity on 16"
"##;

    fn tooth(code: u8) -> ToothNumber {
        ToothNumber::new(code).unwrap()
    }

    #[test]
    fn parses_sample_document() {
        let chart = ChartDocument::from_yaml(SAMPLE).expect("parse yaml");

        let upper_molar = chart.tooth(tooth(16));
        let occlusal = upper_molar.surface(Surface::Occlusal).unwrap();
        assert_eq!(occlusal.procedure_id, "caries");
        assert_eq!(occlusal.color, MarkColor::Clinical(ClinicalColor::PathologicalRed));
        assert_eq!(upper_molar.findings()[0].abbreviation.as_deref(), Some("TC"));

        let incisor = chart.tooth(tooth(21));
        assert!(incisor.surfaces().is_empty());
        assert!(incisor.findings()[0].color.is_treated());
        assert!(incisor.findings()[0].abbreviation.is_none());

        assert_eq!(chart.specifications(), "Sensitivity on 16");
    }

    #[test]
    fn yaml_and_json_agree() {
        let chart = ChartDocument::from_yaml(SAMPLE).unwrap();
        let from_yaml = ChartDocument::from_yaml(&chart.to_yaml().unwrap()).unwrap();
        let from_json = ChartDocument::from_json(&chart.to_json().unwrap()).unwrap();
        assert_eq!(from_yaml, chart);
        assert_eq!(from_json, chart);
    }

    #[test]
    fn empty_text_is_a_blank_chart() {
        assert!(ChartDocument::from_yaml("  \n").unwrap().is_blank());
        assert!(ChartDocument::from_json("{}").unwrap().is_blank());
    }

    #[test]
    fn rejects_unknown_keys_with_path() {
        let input = "teeth:\n  16:\n    surfaces: {}\n    glyph: star\n";
        let err = ChartDocument::from_yaml(input).expect_err("should reject unknown key");
        match err {
            DentalError::ChartSchema { path, message } => {
                assert!(path.starts_with("teeth"), "path was {path}");
                assert!(message.contains("glyph"));
            }
            other => panic!("expected ChartSchema error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_tooth_and_surface() {
        let bad_tooth = "teeth:\n  19:\n    findings: []\n";
        assert!(matches!(
            ChartDocument::from_yaml(bad_tooth),
            Err(DentalError::ChartSchema { .. })
        ));

        let bad_surface = r#"{"teeth":{"16":{"surfaces":{"cervical":{"procedure_id":"caries","color":"red","filled":true}}}}}"#;
        assert!(matches!(
            ChartDocument::from_json(bad_surface),
            Err(DentalError::ChartSchema { .. })
        ));
    }

    #[test]
    fn normalises_duplicates_and_empty_teeth() {
        let input = r#"teeth:
  36:
    findings:
      - { procedure_id: fractura, color: red }
      - { procedure_id: fractura, color: blue }
  37: {}
"#;
        let chart = ChartDocument::from_yaml(input).unwrap();
        let molar = chart.tooth(tooth(36));
        assert_eq!(molar.findings().len(), 1);
        assert!(molar.findings()[0].color.is_pathological());

        let rendered = chart.to_yaml().unwrap();
        assert!(!rendered.contains("37"));
    }

    #[test]
    fn rejects_procedures_outside_the_catalog() {
        let piped = "teeth:\n  16:\n    surfaces:\n      occlusal: { procedure_id: \"caries|occlusal\", color: red, filled: true }\n";
        match ChartDocument::from_yaml(piped) {
            Err(DentalError::Catalog(CatalogError::UnknownProcedure(id))) => {
                assert_eq!(id, "caries|occlusal")
            }
            other => panic!("expected unknown procedure, got {other:?}"),
        }

        let unknown = r#"{"teeth":{"21":{"findings":[{"procedure_id":"not_in_catalog","color":"red"}]}}}"#;
        assert!(matches!(
            ChartDocument::from_json(unknown),
            Err(DentalError::Catalog(CatalogError::UnknownProcedure(_)))
        ));
    }

    #[test]
    fn serde_path_rejects_procedures_outside_the_catalog() {
        let body = r#"{"teeth":{"16":{"surfaces":{"occlusal":{"procedure_id":"not_in_catalog","color":"red","filled":true}}}}}"#;
        let err = serde_json::from_str::<ChartDocument>(body).expect_err("unknown procedure");
        assert!(err.to_string().contains("not_in_catalog"), "{err}");
    }

    #[test]
    fn surface_aliases_are_canonicalised() {
        let input = r#"{"teeth":{"11":{"surfaces":{"palatal":{"procedure_id":"resina","color":"blue","filled":true}}}}}"#;
        let chart = ChartDocument::from_json(input).unwrap();
        assert!(chart.tooth(tooth(11)).surface(Surface::Lingual).is_some());
        assert!(chart.to_json().unwrap().contains("\"lingual\""));
    }
}
