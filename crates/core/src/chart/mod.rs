//! Chart state model.
//!
//! A [`ChartDocument`] is one full odontogram: baseline or evolution. Documents are values.
//! Every edit produces a new document that shares all untouched teeth with the old one through
//! `Arc`, so keeping previous versions around costs one map of pointers per version.

pub mod persisted;

use dentachart_types::{MarkColor, Surface, ToothNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Mark occupying one tooth surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurfaceMark {
    pub procedure_id: String,
    pub color: MarkColor,
    pub filled: bool,
}

/// Whole-tooth, crown or root finding attached to a tooth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindingEntry {
    pub procedure_id: String,
    pub color: MarkColor,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

/// Marks on a single tooth.
///
/// `findings` is an insertion-ordered set keyed by `procedure_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToothState {
    surfaces: BTreeMap<Surface, SurfaceMark>,
    findings: Vec<FindingEntry>,
}

static EMPTY_TOOTH: ToothState = ToothState::empty();

impl ToothState {
    pub const fn empty() -> Self {
        Self {
            surfaces: BTreeMap::new(),
            findings: Vec::new(),
        }
    }

    /// Builds a tooth state, dropping findings whose `procedure_id` was already seen.
    pub fn new(
        surfaces: BTreeMap<Surface, SurfaceMark>,
        findings: impl IntoIterator<Item = FindingEntry>,
    ) -> Self {
        let mut state = Self {
            surfaces,
            findings: Vec::new(),
        };
        for entry in findings {
            if !state.has_finding(&entry.procedure_id) {
                state.findings.push(entry);
            }
        }
        state
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty() && self.findings.is_empty()
    }

    /// Occupied surfaces in canonical order.
    pub fn surfaces(&self) -> &BTreeMap<Surface, SurfaceMark> {
        &self.surfaces
    }

    pub fn surface(&self, surface: Surface) -> Option<&SurfaceMark> {
        self.surfaces.get(&surface)
    }

    pub fn findings(&self) -> &[FindingEntry] {
        &self.findings
    }

    pub fn has_finding(&self, procedure_id: &str) -> bool {
        self.findings.iter().any(|f| f.procedure_id == procedure_id)
    }

    pub(crate) fn with_surface(&self, surface: Surface, mark: SurfaceMark) -> Self {
        let mut next = self.clone();
        next.surfaces.insert(surface, mark);
        next
    }

    /// Removes the entry with the same `procedure_id` if present, appends it otherwise.
    pub(crate) fn toggled(&self, entry: FindingEntry) -> Self {
        let mut next = self.clone();
        match next
            .findings
            .iter()
            .position(|f| f.procedure_id == entry.procedure_id)
        {
            Some(index) => {
                next.findings.remove(index);
            }
            None => next.findings.push(entry),
        }
        next
    }

    pub(crate) fn findings_mut(&mut self) -> &mut [FindingEntry] {
        &mut self.findings
    }

    pub(crate) fn surfaces_mut(&mut self) -> &mut BTreeMap<Surface, SurfaceMark> {
        &mut self.surfaces
    }
}

/// One odontogram: per-tooth states plus the clinician's free-text specifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "persisted::ChartWire", into = "persisted::ChartWire")]
pub struct ChartDocument {
    teeth: BTreeMap<ToothNumber, Arc<ToothState>>,
    specifications: String,
}

impl ChartDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `tooth`; teeth without marks share one empty state.
    pub fn tooth(&self, tooth: ToothNumber) -> &ToothState {
        self.teeth
            .get(&tooth)
            .map(Arc::as_ref)
            .unwrap_or(&EMPTY_TOOTH)
    }

    /// Occupied teeth in ascending FDI order.
    pub fn occupied_teeth(&self) -> impl Iterator<Item = (ToothNumber, &ToothState)> {
        self.teeth
            .iter()
            .filter(|(_, state)| !state.is_empty())
            .map(|(number, state)| (*number, state.as_ref()))
    }

    /// True when no tooth carries a mark. Specifications text does not count.
    pub fn is_blank(&self) -> bool {
        self.occupied_teeth().next().is_none()
    }

    pub fn specifications(&self) -> &str {
        &self.specifications
    }

    pub fn with_specifications(&self, specifications: impl Into<String>) -> Self {
        Self {
            teeth: self.teeth.clone(),
            specifications: specifications.into(),
        }
    }

    /// Returns a document where `tooth` has `state`; other teeth are shared with `self`.
    pub fn with_tooth(&self, tooth: ToothNumber, state: ToothState) -> Self {
        let mut teeth = self.teeth.clone();
        if state.is_empty() {
            teeth.remove(&tooth);
        } else {
            teeth.insert(tooth, Arc::new(state));
        }
        Self {
            teeth,
            specifications: self.specifications.clone(),
        }
    }

    /// True when `tooth` is stored as the same allocation in both documents.
    pub fn shares_tooth_with(&self, other: &ChartDocument, tooth: ToothNumber) -> bool {
        match (self.teeth.get(&tooth), other.teeth.get(&tooth)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentachart_types::ClinicalColor;

    fn tooth(code: u8) -> ToothNumber {
        ToothNumber::new(code).unwrap()
    }

    fn caries_mark() -> SurfaceMark {
        SurfaceMark {
            procedure_id: "caries".into(),
            color: ClinicalColor::PathologicalRed.into(),
            filled: true,
        }
    }

    #[test]
    fn absent_tooth_reads_as_empty_state() {
        let chart = ChartDocument::new();
        let state = chart.tooth(tooth(16));
        assert!(state.surfaces().is_empty());
        assert!(state.findings().is_empty());
        assert!(chart.is_blank());
    }

    #[test]
    fn with_tooth_shares_untouched_teeth() {
        let base = ChartDocument::new()
            .with_tooth(tooth(11), ToothState::empty().with_surface(Surface::Mesial, caries_mark()))
            .with_tooth(tooth(16), ToothState::empty().with_surface(Surface::Occlusal, caries_mark()));

        let edited = base.with_tooth(tooth(16), ToothState::empty());

        assert!(edited.shares_tooth_with(&base, tooth(11)));
        assert!(!edited.shares_tooth_with(&base, tooth(16)));
        assert!(edited.tooth(tooth(16)).is_empty());
        // The original document is untouched.
        assert!(base.tooth(tooth(16)).surface(Surface::Occlusal).is_some());
    }

    #[test]
    fn emptied_teeth_are_not_listed_as_occupied() {
        let chart = ChartDocument::new()
            .with_tooth(tooth(21), ToothState::empty().with_surface(Surface::Distal, caries_mark()))
            .with_tooth(tooth(21), ToothState::empty());
        assert!(chart.is_blank());
        assert_eq!(chart, ChartDocument::new());
    }

    #[test]
    fn new_drops_duplicate_procedure_ids() {
        let entry = FindingEntry {
            procedure_id: "endodoncia".into(),
            color: ClinicalColor::TreatedBlue.into(),
            abbreviation: Some("TC".into()),
        };
        let state = ToothState::new(BTreeMap::new(), vec![entry.clone(), entry]);
        assert_eq!(state.findings().len(), 1);
    }

    #[test]
    fn toggled_is_an_involution() {
        let entry = FindingEntry {
            procedure_id: "corona_completa".into(),
            color: ClinicalColor::TreatedBlue.into(),
            abbreviation: Some("CC".into()),
        };
        let start = ToothState::empty().with_surface(Surface::Vestibular, caries_mark());
        let once = start.toggled(entry.clone());
        assert!(once.has_finding("corona_completa"));
        assert_eq!(once.toggled(entry), start);
    }

    #[test]
    fn specifications_do_not_make_a_chart_occupied() {
        let chart = ChartDocument::new().with_specifications("Bruxism, night guard advised");
        assert!(chart.is_blank());
        assert_eq!(chart.specifications(), "Bruxism, night guard advised");
    }
}
