//! Evolution and cure.
//!
//! A treatment plan carries two charts: the baseline captured when the plan was saved, and an
//! evolution chart edited during follow-up sessions. The evolution chart is a single snapshot
//! that each save replaces wholesale; there is no per-visit history.
//!
//! Cure turns pathological (red) marks into treated (blue) ones:
//! - on a targeted surface, a red mark becomes blue and is remapped to its treated counterpart
//!   when the catalog defines one (caries becomes resina)
//! - independently of the surface, every red whole-tooth/crown/root entry on the tooth is
//!   recoloured blue, keeping its procedure id

use crate::chart::{ChartDocument, FindingEntry, SurfaceMark, ToothState};
use crate::engine::{ApplyOutcome, EditingMode, Target, Tool, ToolEngine};
use crate::findings::Finding;
use dentachart_catalog::ProcedureCatalog;
use dentachart_types::{ClinicalColor, MarkColor, Surface, ToothNumber};
use serde::Serialize;
use std::collections::BTreeSet;

/// Result of curing one surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SurfaceCure {
    Cured { from: String, to: String },
    AlreadyTreated,
    /// The surface has no mark.
    NothingToCure,
    /// The mark is neither pathological nor treated.
    NotCurable { color: MarkColor },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CureReport {
    pub surface: Option<Surface>,
    pub surface_cure: Option<SurfaceCure>,
    /// Whole-tooth, crown and root entries recoloured from red to blue.
    pub recoloured_findings: usize,
}

impl CureReport {
    pub fn changed(&self) -> bool {
        matches!(self.surface_cure, Some(SurfaceCure::Cured { .. })) || self.recoloured_findings > 0
    }

    pub fn already_treated(&self) -> bool {
        self.surface_cure == Some(SurfaceCure::AlreadyTreated) && self.recoloured_findings == 0
    }
}

/// Applies the cure transform to one tooth.
pub fn cure_tooth(
    catalog: &ProcedureCatalog,
    state: &ToothState,
    surface: Option<Surface>,
) -> (ToothState, CureReport) {
    let mut next = state.clone();

    let surface_cure = surface.map(|surface| match state.surface(surface) {
        None => SurfaceCure::NothingToCure,
        Some(mark) if mark.color.is_treated() => SurfaceCure::AlreadyTreated,
        Some(mark) if mark.color.is_pathological() => {
            let counterpart = catalog.treated_counterpart(&mark.procedure_id);
            let cured = SurfaceMark {
                procedure_id: counterpart
                    .map(|p| p.id.to_owned())
                    .unwrap_or_else(|| mark.procedure_id.clone()),
                color: ClinicalColor::TreatedBlue.into(),
                filled: counterpart.map(|p| p.filled).unwrap_or(mark.filled),
            };
            let outcome = SurfaceCure::Cured {
                from: mark.procedure_id.clone(),
                to: cured.procedure_id.clone(),
            };
            next.surfaces_mut().insert(surface, cured);
            outcome
        }
        Some(mark) => SurfaceCure::NotCurable {
            color: mark.color.clone(),
        },
    });

    let mut recoloured_findings = 0;
    for entry in next.findings_mut() {
        if entry.color.is_pathological() {
            entry.color = ClinicalColor::TreatedBlue.into();
            recoloured_findings += 1;
        }
    }

    let report = CureReport {
        surface,
        surface_cure,
        recoloured_findings,
    };
    (next, report)
}

/// Editing session over a plan's evolution chart.
///
/// When the stored evolution chart is blank the session starts from the baseline, so the first
/// edit effectively copies the baseline into the evolution document.
#[derive(Debug, Clone)]
pub struct EvolutionSession {
    engine: ToolEngine,
    baseline: ChartDocument,
    working: ChartDocument,
    seeded_from_baseline: bool,
    dirty: bool,
}

impl EvolutionSession {
    pub fn open(engine: ToolEngine, baseline: ChartDocument, evolution: ChartDocument) -> Self {
        let seeded_from_baseline = evolution.is_blank();
        let working = if seeded_from_baseline {
            baseline.clone()
        } else {
            evolution
        };

        Self {
            engine,
            baseline,
            working,
            seeded_from_baseline,
            dirty: false,
        }
    }

    pub fn baseline(&self) -> &ChartDocument {
        &self.baseline
    }

    pub fn working(&self) -> &ChartDocument {
        &self.working
    }

    pub fn seeded_from_baseline(&self) -> bool {
        self.seeded_from_baseline
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn apply(&mut self, tool: Tool, target: Target) -> ApplyOutcome {
        let applied = self
            .engine
            .apply(&self.working, tool, target, EditingMode::Evolution);
        if applied.outcome.is_change() {
            self.working = applied.chart;
            self.dirty = true;
        }
        applied.outcome
    }

    pub fn diff(&self) -> EvolutionDiff {
        diff(&self.baseline, &self.working)
    }

    pub fn into_chart(self) -> ChartDocument {
        self.working
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum FindingChange {
    Added { finding: Finding },
    Removed { finding: Finding },
    /// Same procedure, different colour. `finding` carries the new colour.
    Recoloured { finding: Finding, from: MarkColor },
    /// A surface whose procedure changed, such as caries cured into resina.
    Remapped { from: Finding, to: Finding },
}

impl FindingChange {
    fn is_cure(&self) -> bool {
        match self {
            FindingChange::Recoloured { finding, from } => {
                from.is_pathological() && finding.color.is_treated()
            }
            FindingChange::Remapped { from, to } => {
                from.color.is_pathological() && to.color.is_treated()
            }
            FindingChange::Added { .. } | FindingChange::Removed { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvolutionDiff {
    pub changes: Vec<FindingChange>,
}

impl EvolutionDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes that moved a finding from pathological to treated.
    pub fn cured_count(&self) -> usize {
        self.changes.iter().filter(|c| c.is_cure()).count()
    }
}

fn surface_finding(tooth: ToothNumber, surface: Surface, mark: &SurfaceMark) -> Finding {
    Finding {
        tooth_number: tooth,
        finding_type: mark.procedure_id.clone(),
        surface: Some(surface),
        color: mark.color.clone(),
    }
}

fn entry_finding(tooth: ToothNumber, entry: &FindingEntry) -> Finding {
    Finding {
        tooth_number: tooth,
        finding_type: entry.procedure_id.clone(),
        surface: None,
        color: entry.color.clone(),
    }
}

/// Compares two charts position by position: each surface, then each tooth-level entry.
pub fn diff(baseline: &ChartDocument, evolution: &ChartDocument) -> EvolutionDiff {
    let teeth: BTreeSet<ToothNumber> = baseline
        .occupied_teeth()
        .chain(evolution.occupied_teeth())
        .map(|(number, _)| number)
        .collect();

    let mut changes = Vec::new();
    for tooth in teeth {
        let before = baseline.tooth(tooth);
        let after = evolution.tooth(tooth);

        for surface in Surface::ALL {
            match (before.surface(surface), after.surface(surface)) {
                (None, None) => {}
                (Some(old), None) => changes.push(FindingChange::Removed {
                    finding: surface_finding(tooth, surface, old),
                }),
                (None, Some(new)) => changes.push(FindingChange::Added {
                    finding: surface_finding(tooth, surface, new),
                }),
                (Some(old), Some(new)) if old.procedure_id != new.procedure_id => {
                    changes.push(FindingChange::Remapped {
                        from: surface_finding(tooth, surface, old),
                        to: surface_finding(tooth, surface, new),
                    })
                }
                (Some(old), Some(new)) if old.color != new.color => {
                    changes.push(FindingChange::Recoloured {
                        finding: surface_finding(tooth, surface, new),
                        from: old.color.clone(),
                    })
                }
                (Some(_), Some(_)) => {}
            }
        }

        for old in before.findings() {
            let matching = after
                .findings()
                .iter()
                .find(|new| new.procedure_id == old.procedure_id);
            match matching {
                None => changes.push(FindingChange::Removed {
                    finding: entry_finding(tooth, old),
                }),
                Some(new) if new.color != old.color => changes.push(FindingChange::Recoloured {
                    finding: entry_finding(tooth, new),
                    from: old.color.clone(),
                }),
                Some(_) => {}
            }
        }
        for new in after.findings() {
            if !before.has_finding(&new.procedure_id) {
                changes.push(FindingChange::Added {
                    finding: entry_finding(tooth, new),
                });
            }
        }
    }

    EvolutionDiff { changes }
}
