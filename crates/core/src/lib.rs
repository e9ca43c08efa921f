pub mod config;
pub mod metadata;
pub mod pipeline;
pub mod pool;
pub mod processor;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod testing;
pub mod validator;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use pipeline::{BatchResult, FileFailure, Pipeline, PipelineConfig, PipelineError};
pub use pool::{PoolError, WorkerPool};
pub use state::{StateError, StateManager};
pub use storage::{StorageError, TransactionalStorage};
pub use telemetry::{NoopSink, ObservabilitySink, PrometheusSink, TracingSink};
pub use validator::{MediaKind, MediaValidator, ValidatorError};
