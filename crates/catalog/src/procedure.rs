//! Procedure catalog.
//!
//! Every notation a clinician can place on the odontogram is a [`ProcedureDefinition`]. The
//! `id` is the only key other components may store; names and abbreviations are display data.

use dentachart_types::ClinicalColor;
use serde::Serialize;

use crate::{CatalogError, CatalogResult, CategoryError};

/// How a procedure is attached to a tooth.
///
/// Surface procedures occupy exactly one face and replace whatever was there. The other three
/// kinds attach to the tooth as a unit and toggle on repeated application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    Surface,
    WholeTooth,
    Crown,
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureCategory {
    Lesion,
    Restoration,
    Preventive,
    Endodontic,
    Crown,
    Prosthetic,
    Orthodontic,
    Anomaly,
    Surgical,
}

impl std::str::FromStr for ProcedureCategory {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let category = match s.trim().to_ascii_lowercase().as_str() {
            "lesion" => Self::Lesion,
            "restoration" => Self::Restoration,
            "preventive" => Self::Preventive,
            "endodontic" => Self::Endodontic,
            "crown" => Self::Crown,
            "prosthetic" => Self::Prosthetic,
            "orthodontic" => Self::Orthodontic,
            "anomaly" => Self::Anomaly,
            "surgical" => Self::Surgical,
            _ => return Err(CategoryError(s.to_owned())),
        };
        Ok(category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub abbreviation: Option<&'static str>,
    pub color: ClinicalColor,
    pub application_type: ApplicationType,
    /// Filled glyph when true, outline-only glyph otherwise.
    pub filled: bool,
    pub category: ProcedureCategory,
}

const fn entry(
    id: &'static str,
    name: &'static str,
    abbreviation: Option<&'static str>,
    color: ClinicalColor,
    application_type: ApplicationType,
    filled: bool,
    category: ProcedureCategory,
) -> ProcedureDefinition {
    ProcedureDefinition {
        id,
        name,
        abbreviation,
        color,
        application_type,
        filled,
        category,
    }
}

use ApplicationType::{Crown, Root, Surface, WholeTooth};
use ClinicalColor::{AlertYellow as Yellow, PathologicalRed as Red, TreatedBlue as Blue};
use ProcedureCategory as Cat;

#[rustfmt::skip]
static STANDARD_PROCEDURES: &[ProcedureDefinition] = &[
    // Surface lesions and restorations
    entry("caries", "Caries", None, Red, Surface, true, Cat::Lesion),
    entry("restauracion_defectuosa", "Restauración defectuosa", Some("RD"), Red, Surface, false, Cat::Restoration),
    entry("sellante_defectuoso", "Sellante defectuoso", Some("SD"), Red, Surface, false, Cat::Preventive),
    entry("resina", "Resina", Some("R"), Blue, Surface, true, Cat::Restoration),
    entry("amalgama", "Amalgama", Some("AM"), Blue, Surface, true, Cat::Restoration),
    entry("ionomero", "Ionómero de vidrio", Some("IV"), Blue, Surface, true, Cat::Restoration),
    entry("incrustacion", "Incrustación", Some("IM"), Blue, Surface, false, Cat::Restoration),
    entry("sellante", "Sellante", Some("S"), Blue, Surface, false, Cat::Preventive),
    entry("carilla", "Carilla", Some("CV"), Blue, Surface, false, Cat::Restoration),
    entry("desgaste", "Desgaste", Some("DES"), Yellow, Surface, false, Cat::Anomaly),
    // Whole-tooth findings
    entry("diente_ausente", "Diente ausente", None, Blue, WholeTooth, false, Cat::Surgical),
    entry("extraccion_indicada", "Extracción indicada", None, Red, WholeTooth, false, Cat::Surgical),
    entry("fractura", "Fractura", None, Red, WholeTooth, false, Cat::Lesion),
    entry("implante", "Implante", Some("IMP"), Blue, WholeTooth, false, Cat::Prosthetic),
    entry("movilidad", "Movilidad", Some("M"), Yellow, WholeTooth, false, Cat::Anomaly),
    entry("giroversion", "Giroversión", None, Yellow, WholeTooth, false, Cat::Anomaly),
    entry("diente_en_erupcion", "Diente en erupción", None, Yellow, WholeTooth, false, Cat::Anomaly),
    entry("supernumerario", "Supernumerario", Some("S"), Yellow, WholeTooth, false, Cat::Anomaly),
    entry("aparato_fijo", "Aparato ortodóntico fijo", None, Blue, WholeTooth, false, Cat::Orthodontic),
    entry("aparato_removible", "Aparato ortodóntico removible", None, Blue, WholeTooth, false, Cat::Orthodontic),
    entry("protesis_fija", "Prótesis fija", None, Blue, WholeTooth, false, Cat::Prosthetic),
    entry("protesis_removible", "Prótesis removible", None, Blue, WholeTooth, false, Cat::Prosthetic),
    entry("protesis_total", "Prótesis total", None, Blue, WholeTooth, false, Cat::Prosthetic),
    // Crowns
    entry("corona_completa", "Corona completa", Some("CC"), Blue, Crown, false, Cat::Crown),
    entry("corona_temporal", "Corona temporal", Some("CT"), Red, Crown, false, Cat::Crown),
    entry("corona_defectuosa", "Corona defectuosa", Some("CD"), Red, Crown, false, Cat::Crown),
    // Roots
    entry("endodoncia", "Endodoncia", Some("TC"), Blue, Root, true, Cat::Endodontic),
    entry("pulpotomia", "Pulpotomía", Some("PP"), Blue, Root, true, Cat::Endodontic),
    entry("pulpectomia", "Pulpectomía", Some("PC"), Blue, Root, true, Cat::Endodontic),
    entry("perno_munon", "Perno muñón", Some("PM"), Blue, Root, false, Cat::Endodontic),
    entry("remanente_radicular", "Remanente radicular", Some("RR"), Red, Root, false, Cat::Surgical),
    entry("lesion_periapical", "Lesión periapical", Some("LP"), Red, Root, false, Cat::Lesion),
];

/// Pathological surface marks and the restoration that replaces them once treated.
static TREATED_COUNTERPARTS: &[(&str, &str)] = &[
    ("caries", "resina"),
    ("restauracion_defectuosa", "resina"),
    ("sellante_defectuoso", "sellante"),
];

/// Read-only registry of procedure definitions, in display order.
#[derive(Debug, Clone, Copy)]
pub struct ProcedureCatalog {
    entries: &'static [ProcedureDefinition],
    counterparts: &'static [(&'static str, &'static str)],
}

impl ProcedureCatalog {
    /// The built-in odontogram notation catalog.
    pub const fn standard() -> Self {
        Self {
            entries: STANDARD_PROCEDURES,
            counterparts: TREATED_COUNTERPARTS,
        }
    }

    pub fn by_id(&self, id: &str) -> Option<&'static ProcedureDefinition> {
        self.entries.iter().find(|p| p.id == id)
    }

    /// Like [`by_id`](Self::by_id) but with a propagatable error.
    pub fn require(&self, id: &str) -> CatalogResult<&'static ProcedureDefinition> {
        self.by_id(id)
            .ok_or_else(|| CatalogError::UnknownProcedure(id.to_owned()))
    }

    pub fn all(&self) -> &'static [ProcedureDefinition] {
        self.entries
    }

    pub fn by_category(
        &self,
        category: ProcedureCategory,
    ) -> impl Iterator<Item = &'static ProcedureDefinition> {
        self.entries.iter().filter(move |p| p.category == category)
    }

    /// Categories present in the catalog, in order of first appearance.
    pub fn categories(&self) -> Vec<ProcedureCategory> {
        let mut seen = Vec::new();
        for procedure in self.entries {
            if !seen.contains(&procedure.category) {
                seen.push(procedure.category);
            }
        }
        seen
    }

    /// The treated-blue procedure a cured pathological surface mark is remapped to.
    pub fn treated_counterpart(&self, id: &str) -> Option<&'static ProcedureDefinition> {
        self.counterparts
            .iter()
            .find(|(from, _)| *from == id)
            .and_then(|(_, to)| self.by_id(to))
    }
}

impl Default for ProcedureCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let catalog = ProcedureCatalog::standard();
        let mut ids = HashSet::new();
        for procedure in catalog.all() {
            assert!(ids.insert(procedure.id), "duplicate id {}", procedure.id);
        }
    }

    #[test]
    fn looks_up_by_id() {
        let catalog = ProcedureCatalog::standard();
        let caries = catalog.by_id("caries").unwrap();
        assert_eq!(caries.color, ClinicalColor::PathologicalRed);
        assert_eq!(caries.application_type, ApplicationType::Surface);
        assert!(caries.filled);

        let endo = catalog.by_id("endodoncia").unwrap();
        assert_eq!(endo.application_type, ApplicationType::Root);
        assert_eq!(endo.abbreviation, Some("TC"));

        assert!(catalog.by_id("Caries").is_none());
        assert_eq!(
            catalog.require("bridge"),
            Err(CatalogError::UnknownProcedure("bridge".into()))
        );
    }

    #[test]
    fn filters_by_category_in_display_order() {
        let catalog = ProcedureCatalog::standard();
        let endodontic: Vec<_> = catalog
            .by_category(ProcedureCategory::Endodontic)
            .map(|p| p.id)
            .collect();
        assert_eq!(
            endodontic,
            vec!["endodoncia", "pulpotomia", "pulpectomia", "perno_munon"]
        );
    }

    #[test]
    fn categories_follow_first_appearance() {
        let categories = ProcedureCatalog::standard().categories();
        assert_eq!(categories[0], ProcedureCategory::Lesion);
        assert_eq!(categories[1], ProcedureCategory::Restoration);
        assert_eq!(categories.len(), 9);
    }

    #[test]
    fn treated_counterparts_are_blue_surface_procedures() {
        let catalog = ProcedureCatalog::standard();
        for (from, _) in TREATED_COUNTERPARTS {
            let source = catalog.by_id(from).expect("source exists");
            assert_eq!(source.color, ClinicalColor::PathologicalRed);

            let target = catalog.treated_counterpart(from).expect("target exists");
            assert_eq!(target.color, ClinicalColor::TreatedBlue);
            assert_eq!(target.application_type, ApplicationType::Surface);
        }
        assert!(catalog.treated_counterpart("fractura").is_none());
    }

    #[test]
    fn parses_category_names() {
        assert_eq!(
            "Prosthetic".parse::<ProcedureCategory>().unwrap(),
            ProcedureCategory::Prosthetic
        );
        assert_eq!(
            "bridges".parse::<ProcedureCategory>(),
            Err(CategoryError("bridges".into()))
        );
    }

    #[test]
    fn serialises_for_listing() {
        let catalog = ProcedureCatalog::standard();
        let json = serde_json::to_value(catalog.by_id("corona_completa").unwrap()).unwrap();
        assert_eq!(json["application_type"], "crown");
        assert_eq!(json["color"], "blue");
        assert_eq!(json["category"], "crown");
    }
}
