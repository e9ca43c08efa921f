//! Metadata enrichment for output naming.
//!
//! Metadata comes from two places: what the file name itself says, and any
//! registered [`MetadataLookup`] integrations (tagging catalogs, movie and
//! TV catalogs). Lookups are advisory. When one fails the file is still
//! processed, just with less to name it by.

mod integrations;
mod lookup;
mod template;
mod types;

pub use integrations::IntegrationSet;
pub use lookup::{LookupError, MetadataLookup};
pub use template::{format_path, sanitize_component};
pub use types::Metadata;
