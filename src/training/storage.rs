//! Durable storage for evaluation records.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use super::{Evaluation, TrainingError};

/// Trait abstracting how the evaluation log is persisted.
pub trait EvaluationLog {
    /// Append one record and persist it before returning.
    fn append(&mut self, record: Evaluation) -> Result<(), TrainingError>;
    /// All records, oldest first.
    fn all(&self) -> &[Evaluation];
    /// Drop every record.
    fn clear(&mut self) -> Result<(), TrainingError>;
}

/// In-memory log, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryEvaluationLog {
    records: Vec<Evaluation>,
}

impl MemoryEvaluationLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvaluationLog for MemoryEvaluationLog {
    fn append(&mut self, record: Evaluation) -> Result<(), TrainingError> {
        self.records.push(record);
        Ok(())
    }

    fn all(&self) -> &[Evaluation] {
        &self.records
    }

    fn clear(&mut self) -> Result<(), TrainingError> {
        self.records.clear();
        Ok(())
    }
}

/// JSON-array file, rewritten in full on every append.
#[derive(Debug)]
pub struct FileEvaluationLog {
    path: PathBuf,
    records: Vec<Evaluation>,
}

impl FileEvaluationLog {
    /// Open the log at `path`. A missing file is an empty log; a file that
    /// exists but does not parse is `TrainingError::Corrupt`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TrainingError> {
        let path = path.into();
        let records = if path.exists() {
            let json = fs::read_to_string(&path)?;
            serde_json::from_str(&json).map_err(|e| TrainingError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?
        } else {
            Vec::new()
        };
        Ok(Self { path, records })
    }

    /// Open the log, starting empty if it cannot be loaded.
    ///
    /// A file that does not parse is moved aside to `<name>.corrupt` first,
    /// so the next append does not overwrite it. Read failures leave the
    /// file where it is.
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(log) => return log,
            Err(e @ TrainingError::Corrupt { .. }) => {
                warn!("Could not load training data, starting empty: {}", e);
                let backup = corrupt_backup_path(&path);
                match fs::rename(&path, &backup) {
                    Ok(()) => warn!("Moved unreadable log to {}", backup.display()),
                    Err(e) => warn!("Could not move unreadable log aside: {}", e),
                }
            }
            Err(e) => warn!("Could not load training data, starting empty: {}", e),
        }
        Self {
            path,
            records: Vec::new(),
        }
    }

    fn persist(&self) -> Result<(), TrainingError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.records)
            .map_err(|e| TrainingError::Json(e.to_string()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl EvaluationLog for FileEvaluationLog {
    fn append(&mut self, record: Evaluation) -> Result<(), TrainingError> {
        self.records.push(record);
        if let Err(e) = self.persist() {
            // Keep memory consistent with what is on disk.
            self.records.pop();
            return Err(e);
        }
        Ok(())
    }

    fn all(&self) -> &[Evaluation] {
        &self.records
    }

    fn clear(&mut self) -> Result<(), TrainingError> {
        self.records.clear();
        self.persist()
    }
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".corrupt");
    path.with_file_name(name)
}
