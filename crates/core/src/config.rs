//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into core services as
//! `Arc<CoreConfig>`. Nothing in the core reads environment variables; binaries do that and
//! hand the values over here.

use crate::constants::DEFAULT_DATA_DIR;
use crate::error::{DentalError, DentalResult};
use dentachart_types::NonEmptyText;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    draft_budget_title: NonEmptyText,
}

impl CoreConfig {
    pub fn new(data_dir: PathBuf, draft_budget_title: impl AsRef<str>) -> DentalResult<Self> {
        let draft_budget_title = NonEmptyText::new(draft_budget_title).map_err(|_| {
            DentalError::InvalidConfig("draft budget title cannot be empty".into())
        })?;

        Ok(Self {
            data_dir,
            draft_budget_title,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Title used when synchronisation has to create a draft budget.
    pub fn draft_budget_title(&self) -> &NonEmptyText {
        &self.draft_budget_title
    }
}

/// Resolve the data directory without reading environment variables.
///
/// Uses `override_dir` when given, otherwise [`DEFAULT_DATA_DIR`] relative to the working
/// directory. The directory is created if it does not exist; an existing non-directory path is
/// rejected.
pub fn resolve_data_dir(override_dir: Option<PathBuf>) -> DentalResult<PathBuf> {
    let dir = override_dir
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    if dir.exists() && !dir.is_dir() {
        return Err(DentalError::InvalidConfig(format!(
            "data directory {} is not a directory",
            dir.display()
        )));
    }

    std::fs::create_dir_all(&dir).map_err(|source| DentalError::DataDir {
        path: dir.clone(),
        source,
    })?;

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_DRAFT_BUDGET_TITLE;
    use tempfile::TempDir;

    #[test]
    fn rejects_blank_budget_title() {
        let err = CoreConfig::new(PathBuf::from("data"), "   ").unwrap_err();
        assert!(matches!(err, DentalError::InvalidConfig(_)));
    }

    #[test]
    fn keeps_trimmed_budget_title() {
        let cfg = CoreConfig::new(PathBuf::from("data"), format!(" {DEFAULT_DRAFT_BUDGET_TITLE} "))
            .unwrap();
        assert_eq!(cfg.draft_budget_title().as_str(), DEFAULT_DRAFT_BUDGET_TITLE);
        assert_eq!(cfg.data_dir(), Path::new("data"));
    }

    #[test]
    fn creates_missing_override_dir() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("nested").join("store");

        let resolved = resolve_data_dir(Some(target.clone())).unwrap();
        assert_eq!(resolved, target);
        assert!(target.is_dir());
    }

    #[test]
    fn rejects_file_as_data_dir() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        let err = resolve_data_dir(Some(file)).unwrap_err();
        assert!(matches!(err, DentalError::InvalidConfig(_)));
    }
}
