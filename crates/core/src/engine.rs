//! Tool application engine.
//!
//! The engine is a pure state machine over [`ChartDocument`] values:
//! `apply(chart, tool, target, mode)` returns the next document together with an outcome
//! describing what happened. It performs no I/O and has no failure path; invalid
//! combinations are reported as no-op outcomes.
//!
//! Dispatch is by [`ApplicationType`]:
//! - surface procedures replace the mark on the targeted surface
//! - whole-tooth, crown and root procedures toggle an entry on the tooth
//! - the eraser clears the whole tooth, whether a tooth or one of its surfaces was targeted
//! - cure recolours pathological marks as treated, and only while editing an evolution chart

use crate::chart::{ChartDocument, FindingEntry, SurfaceMark};
use crate::evolution::{cure_tooth, CureReport};
use dentachart_catalog::{ApplicationType, ProcedureCatalog, ProcedureDefinition};
use dentachart_types::{Surface, ToothNumber};
use serde::Serialize;
use std::fmt;

/// What the clinician has selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Procedure(&'static ProcedureDefinition),
    Eraser,
    Cure,
}

impl Tool {
    pub const ERASER_NAME: &'static str = "eraser";
    pub const CURE_NAME: &'static str = "cure";

    /// Resolves a tool by name: the two pseudo-tools or a catalog procedure id.
    pub fn resolve(catalog: &ProcedureCatalog, name: &str) -> Option<Tool> {
        match name {
            Self::ERASER_NAME => Some(Tool::Eraser),
            Self::CURE_NAME => Some(Tool::Cure),
            id => catalog.by_id(id).map(Tool::Procedure),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Procedure(procedure) => f.write_str(procedure.id),
            Tool::Eraser => f.write_str(Self::ERASER_NAME),
            Tool::Cure => f.write_str(Self::CURE_NAME),
        }
    }
}

/// Tooth or tooth surface the clinician interacted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub tooth: ToothNumber,
    pub surface: Option<Surface>,
}

impl Target {
    pub fn tooth(tooth: ToothNumber) -> Self {
        Self {
            tooth,
            surface: None,
        }
    }

    pub fn surface(tooth: ToothNumber, surface: Surface) -> Self {
        Self {
            tooth,
            surface: Some(surface),
        }
    }
}

/// Which document is being edited. Cure is only available on evolution charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditingMode {
    #[default]
    Baseline,
    Evolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// Surface procedure applied to a tooth-level target.
    SurfaceRequired,
    /// Whole-tooth, crown or root procedure applied to a surface-level target.
    SurfaceTargetIgnored,
    /// Surface already carries an identical mark.
    AlreadyApplied,
    CureOutsideEvolution,
    ToothAlreadyEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Changed,
    Unchanged { reason: NoOpReason },
    Cured(CureReport),
}

impl ApplyOutcome {
    pub fn is_change(&self) -> bool {
        match self {
            ApplyOutcome::Changed => true,
            ApplyOutcome::Unchanged { .. } => false,
            ApplyOutcome::Cured(report) => report.changed(),
        }
    }
}

/// Result of one transition.
#[derive(Debug, Clone)]
pub struct Applied {
    pub chart: ChartDocument,
    pub outcome: ApplyOutcome,
}

impl Applied {
    fn unchanged(chart: &ChartDocument, reason: NoOpReason) -> Self {
        Self {
            chart: chart.clone(),
            outcome: ApplyOutcome::Unchanged { reason },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ToolEngine {
    catalog: ProcedureCatalog,
}

impl ToolEngine {
    pub fn new(catalog: ProcedureCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ProcedureCatalog {
        &self.catalog
    }

    pub fn apply(
        &self,
        chart: &ChartDocument,
        tool: Tool,
        target: Target,
        mode: EditingMode,
    ) -> Applied {
        let applied = match tool {
            Tool::Procedure(procedure) => match procedure.application_type {
                ApplicationType::Surface => Self::apply_surface(chart, procedure, target),
                ApplicationType::WholeTooth => Self::toggle_entry(chart, procedure, target),
                ApplicationType::Crown => Self::toggle_entry(chart, procedure, target),
                ApplicationType::Root => Self::toggle_entry(chart, procedure, target),
            },
            Tool::Eraser => Self::erase(chart, target),
            Tool::Cure => self.cure(chart, target, mode),
        };

        tracing::debug!(
            tooth = %target.tooth,
            surface = ?target.surface,
            %tool,
            outcome = ?applied.outcome,
            "applied charting tool"
        );
        applied
    }

    fn apply_surface(
        chart: &ChartDocument,
        procedure: &ProcedureDefinition,
        target: Target,
    ) -> Applied {
        let Some(surface) = target.surface else {
            return Applied::unchanged(chart, NoOpReason::SurfaceRequired);
        };

        let mark = SurfaceMark {
            procedure_id: procedure.id.to_owned(),
            color: procedure.color.into(),
            filled: procedure.filled,
        };
        let state = chart.tooth(target.tooth);
        if state.surface(surface) == Some(&mark) {
            return Applied::unchanged(chart, NoOpReason::AlreadyApplied);
        }

        Applied {
            chart: chart.with_tooth(target.tooth, state.with_surface(surface, mark)),
            outcome: ApplyOutcome::Changed,
        }
    }

    fn toggle_entry(
        chart: &ChartDocument,
        procedure: &ProcedureDefinition,
        target: Target,
    ) -> Applied {
        if target.surface.is_some() {
            return Applied::unchanged(chart, NoOpReason::SurfaceTargetIgnored);
        }

        let entry = FindingEntry {
            procedure_id: procedure.id.to_owned(),
            color: procedure.color.into(),
            abbreviation: procedure.abbreviation.map(str::to_owned),
        };
        let state = chart.tooth(target.tooth).toggled(entry);

        Applied {
            chart: chart.with_tooth(target.tooth, state),
            outcome: ApplyOutcome::Changed,
        }
    }

    fn erase(chart: &ChartDocument, target: Target) -> Applied {
        if chart.tooth(target.tooth).is_empty() {
            return Applied::unchanged(chart, NoOpReason::ToothAlreadyEmpty);
        }

        Applied {
            chart: chart.with_tooth(target.tooth, Default::default()),
            outcome: ApplyOutcome::Changed,
        }
    }

    fn cure(&self, chart: &ChartDocument, target: Target, mode: EditingMode) -> Applied {
        if mode != EditingMode::Evolution {
            return Applied::unchanged(chart, NoOpReason::CureOutsideEvolution);
        }

        let (state, report) = cure_tooth(&self.catalog, chart.tooth(target.tooth), target.surface);
        let chart = if report.changed() {
            chart.with_tooth(target.tooth, state)
        } else {
            chart.clone()
        };

        Applied {
            chart,
            outcome: ApplyOutcome::Cured(report),
        }
    }
}
