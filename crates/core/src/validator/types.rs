//! Validator types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Broad classification of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Unknown,
    Audio,
    Video,
}

impl MediaKind {
    /// Top-level output folder for files of this kind.
    pub fn output_folder(&self) -> Option<&'static str> {
        match self {
            Self::Audio => Some("music"),
            Self::Video => Some("movies"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// One discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub size: u64,
    pub kind: MediaKind,
    /// Lowercase format token: a magic-number match or the extension.
    pub format: String,
}
