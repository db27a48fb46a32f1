//! Download job bookkeeping
//!
//! - [`JobRegistry`]: progress records for every submitted download, polled
//!   by clients and written by the worker pool
//! - [`MetadataCache`]: one-shot results of metadata lookups keyed by request
//! - [`spawn_pruner`]: background removal of finished records after a TTL

mod cache;
mod record;
mod registry;
mod retention;

pub use cache::MetadataCache;
pub use record::{JobRecord, JobStatus, JobUpdate, clamp_percent};
pub use registry::{JobRegistry, RegistryError, RegistryStats};
pub use retention::spawn_pruner;
