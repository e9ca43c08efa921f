//! Media classification and integrity checks.
//!
//! The validator decides which files in an input tree are media at all
//! (by extension), and whether a media file is structurally sound enough to
//! be worth converting (non-empty and accepted by an [`IntegrityProbe`]).

mod error;
mod format;
mod media_validator;
mod probe;
mod types;

pub use error::ValidatorError;
pub use format::detect_format;
pub use media_validator::{MediaValidator, DEFAULT_AUDIO_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS};
pub use probe::{parse_probe_output, FfprobeProbe, IntegrityProbe};
pub use types::{FileDescriptor, MediaKind};
