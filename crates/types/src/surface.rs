//! The five charted faces of a tooth.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tooth surface '{0}'")]
pub struct SurfaceError(pub String);

/// A tooth surface.
///
/// Declaration order is the canonical charting order and drives both `Ord` and extraction
/// order. Upper lingual faces are usually called palatal and anterior occlusal faces incisal;
/// those names are accepted as aliases and do not create extra surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    #[serde(alias = "buccal")]
    Vestibular,
    #[serde(alias = "palatal", alias = "palatino")]
    Lingual,
    Mesial,
    Distal,
    #[serde(alias = "oclusal", alias = "incisal")]
    Occlusal,
}

impl Surface {
    pub const ALL: [Surface; 5] = [
        Surface::Vestibular,
        Surface::Lingual,
        Surface::Mesial,
        Surface::Distal,
        Surface::Occlusal,
    ];

    /// Canonical lowercase name, as used in finding keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Vestibular => "vestibular",
            Surface::Lingual => "lingual",
            Surface::Mesial => "mesial",
            Surface::Distal => "distal",
            Surface::Occlusal => "occlusal",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vestibular" | "buccal" => Ok(Surface::Vestibular),
            "lingual" | "palatal" | "palatino" => Ok(Surface::Lingual),
            "mesial" => Ok(Surface::Mesial),
            "distal" => Ok(Surface::Distal),
            "occlusal" | "oclusal" | "incisal" => Ok(Surface::Occlusal),
            _ => Err(SurfaceError(s.to_owned())),
        }
    }
}
