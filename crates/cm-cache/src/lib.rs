//! cm-cache - incremental fingerprint cache for the driver (spec §4.13).
//! Content-addressed object storage plus a per-module manifest; every
//! failure mode degrades to a cold recompile rather than aborting.

pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod store;
pub mod timestamp;

pub use error::{CacheError, CacheResult};
pub use fingerprint::{composite_fingerprint, fingerprint_bytes, fingerprint_file};
pub use manifest::{Manifest, ManifestEntry};
pub use store::Cache;
