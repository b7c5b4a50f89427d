//! Finding extraction.
//!
//! [`extract`] flattens a chart document into normalised findings: one per occupied surface
//! and one per whole-tooth, crown or root entry. The result depends only on the document, so
//! it is recomputed whenever it is needed and never stored.

use crate::chart::ChartDocument;
use dentachart_types::{ClinicalColor, MarkColor, Surface, ToothNumber};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Errors from parsing a finding key string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FindingKeyError {
    #[error("finding key '{0}' must have three '|' separated segments")]
    Segments(String),
    #[error("finding key has an invalid tooth: {0}")]
    Tooth(#[from] dentachart_types::ToothNumberError),
    #[error("finding key tooth '{0}' is not a two-digit FDI code")]
    NonCanonicalTooth(String),
    #[error("finding key has an empty finding type")]
    EmptyType,
    #[error("finding key has an invalid surface: {0}")]
    Surface(#[from] dentachart_types::SurfaceError),
}

/// Identity of a finding: `"<tooth>|<finding type>|<surface or empty>"`.
///
/// The string form crosses persistence and API boundaries. It is case-sensitive and the
/// segment order is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FindingKey {
    pub tooth: ToothNumber,
    pub finding_type: String,
    pub surface: Option<Surface>,
}

impl fmt::Display for FindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let surface = self.surface.map(Surface::as_str).unwrap_or("");
        write!(f, "{}|{}|{}", self.tooth, self.finding_type, surface)
    }
}

impl FromStr for FindingKey {
    type Err = FindingKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('|');
        let (Some(tooth), Some(finding_type), Some(surface), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(FindingKeyError::Segments(s.to_owned()));
        };

        let parsed_tooth: ToothNumber = tooth.parse()?;
        if parsed_tooth.to_string() != tooth {
            return Err(FindingKeyError::NonCanonicalTooth(tooth.to_owned()));
        }
        if finding_type.is_empty() {
            return Err(FindingKeyError::EmptyType);
        }
        let surface = match surface {
            "" => None,
            // Keys are case-sensitive, so only canonical surface names are accepted here.
            name if Surface::ALL.iter().any(|s| s.as_str() == name) => Some(name.parse()?),
            other => return Err(dentachart_types::SurfaceError(other.to_owned()).into()),
        };

        Ok(FindingKey {
            tooth: parsed_tooth,
            finding_type: finding_type.to_owned(),
            surface,
        })
    }
}

impl Serialize for FindingKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FindingKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A normalised finding extracted from a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub tooth_number: ToothNumber,
    /// Catalog procedure id.
    pub finding_type: String,
    /// `None` for whole-tooth, crown and root findings.
    pub surface: Option<Surface>,
    pub color: MarkColor,
}

impl Finding {
    pub fn key(&self) -> FindingKey {
        FindingKey {
            tooth: self.tooth_number,
            finding_type: self.finding_type.clone(),
            surface: self.surface,
        }
    }
}

/// Extracts findings in ascending tooth order, then canonical surface order, then entry
/// insertion order. No two returned findings share a key.
pub fn extract(chart: &ChartDocument) -> Vec<Finding> {
    let mut seen = HashSet::new();
    let mut findings = Vec::new();

    for (tooth_number, state) in chart.occupied_teeth() {
        let surface_findings = state.surfaces().iter().map(|(surface, mark)| Finding {
            tooth_number,
            finding_type: mark.procedure_id.clone(),
            surface: Some(*surface),
            color: mark.color.clone(),
        });
        let entry_findings = state.findings().iter().map(|entry| Finding {
            tooth_number,
            finding_type: entry.procedure_id.clone(),
            surface: None,
            color: entry.color.clone(),
        });

        for finding in surface_findings.chain(entry_findings) {
            if seen.insert(finding.key()) {
                findings.push(finding);
            }
        }
    }

    findings
}

/// Finding counts per clinical colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FindingSummary {
    pub pathological: usize,
    pub treated: usize,
    pub alert: usize,
    pub other: usize,
}

impl FindingSummary {
    pub fn total(&self) -> usize {
        self.pathological + self.treated + self.alert + self.other
    }
}

pub fn summarise(findings: &[Finding]) -> FindingSummary {
    findings
        .iter()
        .fold(FindingSummary::default(), |mut summary, finding| {
            match finding.color.classify() {
                Some(ClinicalColor::PathologicalRed) => summary.pathological += 1,
                Some(ClinicalColor::TreatedBlue) => summary.treated += 1,
                Some(ClinicalColor::AlertYellow) => summary.alert += 1,
                None => summary.other += 1,
            }
            summary
        })
}
