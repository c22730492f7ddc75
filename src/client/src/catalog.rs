use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_common::types::ApplicationDefinition;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("catalog {path}: duplicate application id {id}")]
    DuplicateId { path: PathBuf, id: i64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFileStat {
    pub modified_time: Option<DateTime<Utc>>,
    pub size: u64,
    pub item_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResult {
    pub before: CatalogFileStat,
    pub after: CatalogFileStat,
}

/// Hot-reloadable snapshot of the application definitions.
///
/// Readers load the current `Arc` without locking. A successful reload
/// installs the replacement set with one atomic swap, so a reader sees
/// either the old list or the new one, never a mix, and a reload never
/// waits on readers. A failed reload leaves the previous snapshot
/// authoritative.
pub struct ApplicationCatalog {
    config_path: PathBuf,
    definitions: ArcSwap<Vec<ApplicationDefinition>>,
    stat: Mutex<CatalogFileStat>,
}

impl ApplicationCatalog {
    pub fn load(config_path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let catalog = ApplicationCatalog {
            config_path: config_path.into(),
            definitions: ArcSwap::from_pointee(Vec::new()),
            stat: Mutex::new(CatalogFileStat::default()),
        };
        catalog.reload()?;
        Ok(catalog)
    }

    pub fn find_all(&self) -> Arc<Vec<ApplicationDefinition>> {
        self.definitions.load_full()
    }

    pub fn find(&self, id: i64) -> Option<ApplicationDefinition> {
        self.definitions
            .load()
            .iter()
            .find(|definition| definition.id == id)
            .cloned()
    }

    pub fn reload(&self) -> Result<ReloadResult, CatalogError> {
        let data =
            std::fs::read_to_string(&self.config_path).map_err(|source| CatalogError::Io {
                path: self.config_path.clone(),
                source,
            })?;
        let definitions: Vec<ApplicationDefinition> =
            serde_yaml::from_str(&data).map_err(|source| CatalogError::Parse {
                path: self.config_path.clone(),
                source,
            })?;
        let mut seen = std::collections::HashSet::new();
        for definition in &definitions {
            if !seen.insert(definition.id) {
                return Err(CatalogError::DuplicateId {
                    path: self.config_path.clone(),
                    id: definition.id,
                });
            }
        }
        let item_count = definitions.len();
        self.definitions.store(Arc::new(definitions));

        // The read just succeeded; the stat is best-effort bookkeeping.
        let modified_time = std::fs::metadata(&self.config_path)
            .ok()
            .and_then(|meta| meta.modified().ok())
            .map(DateTime::<Utc>::from);
        let after = CatalogFileStat {
            modified_time,
            size: data.len() as u64,
            item_count,
        };
        let mut stat = self.stat.lock().unwrap();
        let before = *stat;
        *stat = after;
        Ok(ReloadResult { before, after })
    }
}
