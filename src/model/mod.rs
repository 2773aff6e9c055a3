//! Token model: pointers, values, colors, and snapshots
//!
//! The leaf layer of the engine. Everything above (planner, resolver,
//! transforms, formatters, policies, dependency tracking) is written against
//! these types.

pub mod color;
pub mod pointer;
pub mod snapshot;
pub mod value;

pub use color::{contrast_ratio, parse_hex, OkLab, OkLch, Rgb};
pub use pointer::{DocumentPointer, JsonPointer};
pub use snapshot::{
    DeprecationRecord, Provenance, ResolutionStep, SnapshotState, SourceSpan, TokenMetadata,
    TokenReference, TokenSet, TokenSnapshot, TokenType,
};
pub use value::{canonical_bytes, canonical_string, deep_clone};
