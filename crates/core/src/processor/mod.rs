//! Media processors.
//!
//! A [`Processor`] turns one input file into one output file. The pipeline
//! keeps an ordered [`ProcessorRegistry`] and hands each file to the first
//! processor whose [`Processor::can_process`] accepts it, so registration
//! order decides which processor wins when several could handle a file.
//!
//! # Example
//!
//! ```ignore
//! use refinery_core::processor::{AudioSettings, FfmpegProcessor, ProcessorRegistry};
//!
//! let registry = ProcessorRegistry::new()
//!     .with(Arc::new(FfmpegProcessor::audio(AudioSettings::default(), ffmpeg, ["mp3", "wav"])));
//!
//! if let Some(processor) = registry.find(Path::new("song.mp3")) {
//!     processor.process(&cancel, input, output).await?;
//! }
//! ```

mod error;
mod ffmpeg;
mod registry;
mod traits;
mod types;

pub use error::ProcessorError;
pub use ffmpeg::{FfmpegProcessor, FfmpegSettings};
pub use registry::ProcessorRegistry;
pub use traits::Processor;
pub use types::{AudioFormat, AudioSettings, VideoCodec, VideoSettings};
