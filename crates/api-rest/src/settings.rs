//! Server settings read from the environment.
//!
//! # Environment Variables
//! - `DENTACHART_REST_ADDR`: listen address (default: "0.0.0.0:3000")
//! - `DENTACHART_DATA_DIR`: data directory for the file store (default: "dentachart_data")
//! - `DENTACHART_BUDGET_TITLE`: title of draft budgets created on save
//! - `DENTACHART_STORE`: `files` (default) or `memory`

use crate::AppState;
use dentachart_core::constants::DEFAULT_DRAFT_BUDGET_TITLE;
use dentachart_core::{resolve_data_dir, CoreConfig, FileStore, InMemoryStore, PlanSync};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Files,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "files" | "file" => Ok(StoreKind::Files),
            "memory" | "mem" => Ok(StoreKind::Memory),
            other => anyhow::bail!("DENTACHART_STORE must be 'files' or 'memory', got '{other}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestSettings {
    pub addr: String,
    pub store: StoreKind,
    pub cfg: Arc<CoreConfig>,
}

impl RestSettings {
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = std::env::var("DENTACHART_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
        let store = match std::env::var("DENTACHART_STORE") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreKind::Files,
        };

        let data_dir = resolve_data_dir(std::env::var("DENTACHART_DATA_DIR").ok().map(PathBuf::from))?;
        let budget_title = std::env::var("DENTACHART_BUDGET_TITLE")
            .unwrap_or_else(|_| DEFAULT_DRAFT_BUDGET_TITLE.into());
        let cfg = Arc::new(CoreConfig::new(data_dir, budget_title)?);

        Ok(Self { addr, store, cfg })
    }

    /// Builds handler state backed by the configured store.
    pub fn app_state(&self) -> AppState {
        let sync = match self.store {
            StoreKind::Files => {
                let store = Arc::new(FileStore::new(&self.cfg));
                PlanSync::with_store(self.cfg.clone(), store)
            }
            StoreKind::Memory => PlanSync::with_store(self.cfg.clone(), Arc::new(InMemoryStore::new())),
        };
        AppState::new(sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_kind() {
        assert_eq!("files".parse::<StoreKind>().unwrap(), StoreKind::Files);
        assert_eq!(" Memory ".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert!("postgres".parse::<StoreKind>().is_err());
    }
}
