//! Clinical state colours.
//!
//! Red marks a pathological finding still to be treated, blue a treated or existing
//! restoration, yellow an alert the clinician should keep an eye on. Marks copy their colour
//! from the catalog when applied but may carry any other representation afterwards (imported
//! charts, per-instance overrides), so [`MarkColor`] keeps the raw text and classifies it on
//! demand.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClinicalColor {
    #[serde(rename = "red")]
    PathologicalRed,
    #[serde(rename = "blue")]
    TreatedBlue,
    #[serde(rename = "yellow")]
    AlertYellow,
}

const RED_FORMS: &[&str] = &["red", "#ff0000", "#ef4444", "#dc2626", "rgb(239, 68, 68)"];
const BLUE_FORMS: &[&str] = &["blue", "#0000ff", "#3b82f6", "#2563eb", "rgb(59, 130, 246)"];
const YELLOW_FORMS: &[&str] = &["yellow", "#ffff00", "#eab308", "#facc15"];

impl ClinicalColor {
    pub fn as_str(self) -> &'static str {
        match self {
            ClinicalColor::PathologicalRed => "red",
            ClinicalColor::TreatedBlue => "blue",
            ClinicalColor::AlertYellow => "yellow",
        }
    }

    fn forms(self) -> &'static [&'static str] {
        match self {
            ClinicalColor::PathologicalRed => RED_FORMS,
            ClinicalColor::TreatedBlue => BLUE_FORMS,
            ClinicalColor::AlertYellow => YELLOW_FORMS,
        }
    }
}

impl fmt::Display for ClinicalColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colour stored on a chart mark.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarkColor {
    Clinical(ClinicalColor),
    Custom(String),
}

impl MarkColor {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "red" => MarkColor::Clinical(ClinicalColor::PathologicalRed),
            "blue" => MarkColor::Clinical(ClinicalColor::TreatedBlue),
            "yellow" => MarkColor::Clinical(ClinicalColor::AlertYellow),
            other => MarkColor::Custom(other.to_owned()),
        }
    }

    /// Maps the stored representation onto a clinical colour, if it is one of the known forms.
    pub fn classify(&self) -> Option<ClinicalColor> {
        match self {
            MarkColor::Clinical(color) => Some(*color),
            MarkColor::Custom(raw) => {
                let normalised = raw.trim().to_ascii_lowercase();
                [
                    ClinicalColor::PathologicalRed,
                    ClinicalColor::TreatedBlue,
                    ClinicalColor::AlertYellow,
                ]
                .into_iter()
                .find(|color| color.forms().contains(&normalised.as_str()))
            }
        }
    }

    pub fn is_pathological(&self) -> bool {
        self.classify() == Some(ClinicalColor::PathologicalRed)
    }

    pub fn is_treated(&self) -> bool {
        self.classify() == Some(ClinicalColor::TreatedBlue)
    }

    pub fn as_str(&self) -> &str {
        match self {
            MarkColor::Clinical(color) => color.as_str(),
            MarkColor::Custom(raw) => raw,
        }
    }
}

impl From<ClinicalColor> for MarkColor {
    fn from(color: ClinicalColor) -> Self {
        MarkColor::Clinical(color)
    }
}

impl fmt::Display for MarkColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MarkColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MarkColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MarkColor::parse(&raw))
    }
}
