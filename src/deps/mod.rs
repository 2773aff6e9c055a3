//! Dependency tracking and caches for incremental rebuilds

pub mod hash;
pub mod snapshot;
pub mod transform_cache;

pub use hash::{snapshot_hash, sorted_references};
pub use snapshot::{
    DependencyDelta, DependencyEntry, DependencySnapshot, DependencyStore, SNAPSHOT_VERSION,
};
pub use transform_cache::TransformCache;
