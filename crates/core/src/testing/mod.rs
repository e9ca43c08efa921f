//! Test doubles for the pipeline's collaborators.
//!
//! Every external capability (conversion, probing, metadata lookup,
//! observability) has an in-memory mock here, so a whole batch can run in
//! tests without ffmpeg or network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use refinery_core::testing::{MockProbe, MockProcessor, RecordingSink};
//!
//! let processor = MockProcessor::new("to-flac", ["mp3"], "flac");
//! let probe = MockProbe::new().reject("/in/broken.mp3");
//! let sink = RecordingSink::new();
//! ```

mod mock_lookup;
mod mock_probe;
mod mock_processor;
mod recording_sink;

pub use mock_lookup::MockLookup;
pub use mock_probe::MockProbe;
pub use mock_processor::{MockProcessor, RecordedCall};
pub use recording_sink::RecordingSink;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::MockProbe;
    use crate::validator::MediaValidator;

    /// Writes `contents` to `root/relative`, creating parent directories.
    pub async fn write_file(
        root: &Path,
        relative: &str,
        contents: &[u8],
    ) -> std::io::Result<PathBuf> {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }

    /// A validator with the default extension sets and the given probe.
    pub fn validator(probe: MockProbe) -> Arc<MediaValidator> {
        Arc::new(MediaValidator::new(
            crate::validator::DEFAULT_AUDIO_EXTENSIONS.iter().copied(),
            crate::validator::DEFAULT_VIDEO_EXTENSIONS.iter().copied(),
            Arc::new(probe),
        ))
    }
}
