//! Types for transactional storage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of filesystem mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Copy,
    Move,
    CreateDir,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => write!(f, "copy"),
            Self::Move => write!(f, "move"),
            Self::CreateDir => write!(f, "create_dir"),
        }
    }
}

/// One journaled filesystem mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// What kind of mutation this is.
    pub kind: OperationKind,
    /// Source path, absent for directory creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Destination path.
    pub destination: PathBuf,
    /// Set once every step of the mutation succeeded.
    pub completed: bool,
    /// Set once the destination may have been written.
    #[serde(default)]
    pub destination_written: bool,
    /// Where a pre-existing destination was saved before being overwritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    /// Directories this operation created, parent first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_dirs: Vec<PathBuf>,
}

impl Operation {
    pub(crate) fn new(kind: OperationKind, source: Option<&Path>, destination: &Path) -> Self {
        Self {
            kind,
            source: source.map(Path::to_path_buf),
            destination: destination.to_path_buf(),
            completed: false,
            destination_written: false,
            backup_path: None,
            created_dirs: Vec::new(),
        }
    }

    /// Whether an interrupted mutation left changes on disk.
    pub fn is_partial(&self) -> bool {
        !self.completed
            && (self.destination_written
                || self.backup_path.is_some()
                || !self.created_dirs.is_empty())
    }

    /// Forgets the effects of this operation once they have been undone.
    pub(crate) fn mark_reverted(&mut self) {
        self.completed = false;
        self.destination_written = false;
        self.backup_path = None;
        self.created_dirs.clear();
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(
                f,
                "{} {} -> {}",
                self.kind,
                source.display(),
                self.destination.display()
            ),
            None => write!(f, "{} {}", self.kind, self.destination.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        let op = Operation::new(
            OperationKind::Copy,
            Some(Path::new("/in/a.flac")),
            Path::new("/out/a.flac"),
        );
        assert_eq!(op.to_string(), "copy /in/a.flac -> /out/a.flac");

        let op = Operation::new(OperationKind::CreateDir, None, Path::new("/out/music"));
        assert_eq!(op.to_string(), "create_dir /out/music");
        assert!(!op.completed);
    }

    #[test]
    fn test_operation_serialization() {
        let op = Operation::new(
            OperationKind::Move,
            Some(Path::new("/work/x.flac")),
            Path::new("/out/x.flac"),
        );
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"kind\":\"move\""));
        assert!(!json.contains("backup_path"));
        assert!(!json.contains("created_dirs"));
    }

    #[test]
    fn test_partial_operations() {
        let mut op = Operation::new(OperationKind::Copy, Some(Path::new("/a")), Path::new("/b"));
        assert!(!op.is_partial());

        op.created_dirs.push(PathBuf::from("/out"));
        assert!(op.is_partial());

        op.completed = true;
        assert!(!op.is_partial());

        op.mark_reverted();
        assert!(!op.completed);
        assert!(!op.is_partial());
    }
}
