//! Tooth registry.
//!
//! Anatomical definitions for the 32 permanent and 20 temporary teeth, derived from FDI
//! numbering. The registry is built once on first use and never changes.

use dentachart_types::{Dentition, Surface, ToothNumber};
use serde::Serialize;
use std::sync::OnceLock;

use crate::{CatalogError, CatalogResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Superior,
    Inferior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToothClass {
    Incisor,
    Canine,
    Premolar,
    Molar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToothDefinition {
    pub number: ToothNumber,
    pub arch: Arch,
    pub dentition: Dentition,
    pub class: ToothClass,
    pub root_count: u8,
    pub is_molar: bool,
    /// Incisors and canines.
    pub is_anterior: bool,
}

impl ToothDefinition {
    fn derive(number: ToothNumber) -> Self {
        let dentition = number.dentition();
        let arch = match number.quadrant() {
            1 | 2 | 5 | 6 => Arch::Superior,
            _ => Arch::Inferior,
        };
        let class = match (dentition, number.position()) {
            (_, 1 | 2) => ToothClass::Incisor,
            (_, 3) => ToothClass::Canine,
            (Dentition::Permanent, 4 | 5) => ToothClass::Premolar,
            _ => ToothClass::Molar,
        };
        let root_count = match (class, arch) {
            (ToothClass::Molar, Arch::Superior) => 3,
            (ToothClass::Molar, Arch::Inferior) => 2,
            // Upper first premolars are usually bifurcated.
            (ToothClass::Premolar, Arch::Superior) if number.position() == 4 => 2,
            _ => 1,
        };

        Self {
            number,
            arch,
            dentition,
            class,
            root_count,
            is_molar: class == ToothClass::Molar,
            is_anterior: matches!(class, ToothClass::Incisor | ToothClass::Canine),
        }
    }

    pub fn quadrant(&self) -> u8 {
        self.number.quadrant()
    }

    /// Clinical name of a surface on this tooth.
    ///
    /// Lingual faces of upper teeth are palatal; the occlusal face of an anterior tooth is its
    /// incisal edge.
    pub fn surface_label(&self, surface: Surface) -> &'static str {
        match surface {
            Surface::Lingual if self.arch == Arch::Superior => "palatal",
            Surface::Occlusal if self.is_anterior => "incisal",
            other => other.as_str(),
        }
    }
}

/// Read-only registry of tooth definitions in ascending FDI order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToothRegistry;

fn definitions() -> &'static [ToothDefinition] {
    static DEFINITIONS: OnceLock<Vec<ToothDefinition>> = OnceLock::new();
    DEFINITIONS.get_or_init(|| {
        (11u8..=85)
            .filter_map(|code| ToothNumber::new(code).ok())
            .map(ToothDefinition::derive)
            .collect()
    })
}

impl ToothRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn by_number(&self, number: u8) -> Option<&'static ToothDefinition> {
        definitions().iter().find(|t| t.number.value() == number)
    }

    pub fn require(&self, number: u8) -> CatalogResult<&'static ToothDefinition> {
        self.by_number(number).ok_or(CatalogError::UnknownTooth(number))
    }

    /// Definition of an already validated tooth number.
    pub fn definition(&self, number: ToothNumber) -> ToothDefinition {
        ToothDefinition::derive(number)
    }

    pub fn all(&self) -> &'static [ToothDefinition] {
        definitions()
    }

    pub fn by_dentition(
        &self,
        dentition: Dentition,
    ) -> impl Iterator<Item = &'static ToothDefinition> {
        definitions().iter().filter(move |t| t.dentition == dentition)
    }

    pub fn quadrant(&self, quadrant: u8) -> impl Iterator<Item = &'static ToothDefinition> {
        definitions().iter().filter(move |t| t.quadrant() == quadrant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_both_dentitions() {
        let registry = ToothRegistry::new();
        assert_eq!(registry.all().len(), 52);
        assert_eq!(registry.by_dentition(Dentition::Permanent).count(), 32);
        assert_eq!(registry.by_dentition(Dentition::Temporary).count(), 20);
    }

    #[test]
    fn numbers_are_ascending_and_unique() {
        let numbers: Vec<u8> = ToothRegistry::new()
            .all()
            .iter()
            .map(|t| t.number.value())
            .collect();
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn classifies_upper_first_molar() {
        let tooth = ToothRegistry::new().by_number(16).unwrap();
        assert_eq!(tooth.arch, Arch::Superior);
        assert_eq!(tooth.class, ToothClass::Molar);
        assert_eq!(tooth.root_count, 3);
        assert!(tooth.is_molar);
        assert!(!tooth.is_anterior);
    }

    #[test]
    fn classifies_lower_and_temporary_teeth() {
        let registry = ToothRegistry::new();

        let lower_molar = registry.by_number(36).unwrap();
        assert_eq!(lower_molar.arch, Arch::Inferior);
        assert_eq!(lower_molar.root_count, 2);

        let upper_premolar = registry.by_number(24).unwrap();
        assert_eq!(upper_premolar.class, ToothClass::Premolar);
        assert_eq!(upper_premolar.root_count, 2);
        assert_eq!(registry.by_number(25).unwrap().root_count, 1);

        let canine = registry.by_number(43).unwrap();
        assert!(canine.is_anterior);
        assert_eq!(canine.root_count, 1);

        let milk_molar = registry.by_number(84).unwrap();
        assert_eq!(milk_molar.dentition, Dentition::Temporary);
        assert!(milk_molar.is_molar);
        assert_eq!(milk_molar.root_count, 2);
        assert_eq!(registry.by_number(55).unwrap().root_count, 3);
    }

    #[test]
    fn missing_teeth_are_not_found() {
        let registry = ToothRegistry::new();
        assert!(registry.by_number(19).is_none());
        assert!(registry.by_number(56).is_none());
        assert_eq!(registry.require(90), Err(CatalogError::UnknownTooth(90)));
    }

    #[test]
    fn quadrant_lists_teeth_in_order() {
        let upper_right: Vec<u8> = ToothRegistry::new()
            .quadrant(1)
            .map(|t| t.number.value())
            .collect();
        assert_eq!(upper_right, vec![11, 12, 13, 14, 15, 16, 17, 18]);
    }

    #[test]
    fn surface_labels_follow_anatomy() {
        let registry = ToothRegistry::new();
        let upper_incisor = registry.by_number(11).unwrap();
        assert_eq!(upper_incisor.surface_label(Surface::Lingual), "palatal");
        assert_eq!(upper_incisor.surface_label(Surface::Occlusal), "incisal");

        let lower_molar = registry.by_number(46).unwrap();
        assert_eq!(lower_molar.surface_label(Surface::Lingual), "lingual");
        assert_eq!(lower_molar.surface_label(Surface::Occlusal), "occlusal");
    }
}
