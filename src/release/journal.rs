// ABOUTME: Batch journal: one JSON report per batch under the state directory.
// ABOUTME: Written atomically on every transition; looked up by id or unique prefix.

use std::path::{Path, PathBuf};

use super::batch::BatchReport;
use crate::store::write_atomic;

const BATCH_DIR: &str = "batches";

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write batch journal: {0}")]
    Write(String),

    #[error("corrupt batch record {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no batch matches {0}")]
    NotFound(String),

    #[error("batch id {prefix} is ambiguous: {}", matches.join(", "))]
    Ambiguous { prefix: String, matches: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct BatchJournal {
    dir: PathBuf,
}

impl BatchJournal {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join(BATCH_DIR),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn save(&self, report: &BatchReport) -> Result<(), JournalError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| JournalError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let json = serde_json::to_vec_pretty(report).map_err(|source| JournalError::Json {
            path: self.path_for(report.id.as_str()),
            source,
        })?;
        write_atomic(&self.path_for(report.id.as_str()), &json)
            .map_err(|e| JournalError::Write(e.to_string()))
    }

    pub fn load(&self, id: &str) -> Result<BatchReport, JournalError> {
        let path = self.path_for(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JournalError::NotFound(id.to_string()));
            }
            Err(source) => return Err(JournalError::Io { path, source }),
        };
        serde_json::from_str(&content).map_err(|source| JournalError::Json { path, source })
    }

    /// Load the batch whose id starts with `prefix`.
    pub fn find(&self, prefix: &str) -> Result<BatchReport, JournalError> {
        let mut matches: Vec<String> = self
            .ids()?
            .into_iter()
            .filter(|id| id.starts_with(prefix))
            .collect();

        match matches.len() {
            0 => Err(JournalError::NotFound(prefix.to_string())),
            1 => self.load(&matches.remove(0)),
            _ => {
                matches.sort();
                Err(JournalError::Ambiguous {
                    prefix: prefix.to_string(),
                    matches,
                })
            }
        }
    }

    /// All recorded batches, oldest first.
    pub fn list(&self) -> Result<Vec<BatchReport>, JournalError> {
        let mut reports = self
            .ids()?
            .iter()
            .map(|id| self.load(id))
            .collect::<Result<Vec<_>, _>>()?;
        reports.sort_by_key(|r| r.created_at);
        Ok(reports)
    }

    /// Most recently created batch, if any.
    pub fn latest(&self) -> Result<Option<BatchReport>, JournalError> {
        Ok(self.list()?.pop())
    }

    fn ids(&self) -> Result<Vec<String>, JournalError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(JournalError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| JournalError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        Ok(ids)
    }
}
