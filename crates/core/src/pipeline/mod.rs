//! Batch pipeline orchestration.
//!
//! The [`Pipeline`] scans an input tree, hands one task per media file to a
//! bounded [`WorkerPool`](crate::pool::WorkerPool), and reports the batch as
//! a [`BatchResult`]. A failing file never stops the batch; it is reported
//! by path together with its cause.
//!
//! Each file goes through the same steps:
//!
//! 1. integrity validation
//! 2. processor selection (first registered match)
//! 3. metadata enrichment and output path resolution
//! 4. idempotency check against the stored checksum
//! 5. conversion into the staging area, or a plain copy when the input is
//!    already in the output format
//! 6. journaled placement into the output tree
//! 7. checksum record for the placed output
//!
//! # Example
//!
//! ```ignore
//! use refinery_core::pipeline::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::new("/media/in", "/media/out").with_concurrency(4);
//! let pipeline = Pipeline::new(config, validator, state, processors)
//!     .with_sink(Arc::new(TracingSink));
//!
//! let result = pipeline.run(&cancel).await?;
//! println!("{}", result.summary());
//! ```

mod config;
mod error;
mod orchestrator;
mod paths;
mod types;

pub use config::PipelineConfig;
pub(crate) use config::{default_music_pattern, default_video_pattern};
pub use error::{FileFailure, PipelineError};
pub use orchestrator::Pipeline;
pub use paths::resolve_output_path;
pub use types::BatchResult;
