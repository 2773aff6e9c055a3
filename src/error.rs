//! Typed fatal errors surfaced by the engine
//!
//! Recoverable issues travel as [`crate::diagnostics::Diagnostic`] values on
//! the resolved plan; everything here aborts the run. Each error carries a
//! stable `code()` for hosts that map failures onto exit codes or telemetry.

use thiserror::Error;

use crate::planner::PlanIssue;

/// Source planning failed before any document was touched.
#[derive(Debug, Error)]
#[error("source planning failed with {} issue(s)", .issues.len())]
pub struct SourcePlanningError {
    /// Every failed entry, so hosts can report all of them at once.
    pub issues: Vec<PlanIssue>,
}

impl SourcePlanningError {
    pub fn code(&self) -> &'static str {
        "AUDIT_SOURCE_PLANNING"
    }
}

/// A policy rule could not be configured.
#[derive(Debug, Error)]
#[error("policy '{rule}' configuration failed: {message}")]
pub struct PolicyConfigurationError {
    pub rule: String,
    pub message: String,
}

impl PolicyConfigurationError {
    pub fn code(&self) -> &'static str {
        "POLICY_CONFIGURATION"
    }
}

/// A transform was requested that the registry does not know, or a transform
/// failed in a way that cannot be reduced to a diagnostic.
#[derive(Debug, Error)]
#[error("transform '{transform}' failed: {message}")]
pub struct TransformExecutionError {
    pub transform: String,
    pub message: String,
}

impl TransformExecutionError {
    pub fn code(&self) -> &'static str {
        "TRANSFORM_EXECUTION"
    }
}

/// The dependency or transform cache is unusable.
#[derive(Debug, Error)]
pub enum DependencyCacheError {
    #[error("dependency snapshot at {path} is corrupt: {message}")]
    CorruptSnapshot { path: String, message: String },

    #[error("transform cache entry {key} is corrupt: {message}")]
    CorruptEntry { key: String, message: String },

    #[error("cache read failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DependencyCacheError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CorruptSnapshot { .. } => "DEPENDENCY_CACHE_CORRUPT",
            Self::CorruptEntry { .. } => "TRANSFORM_CACHE_CORRUPT",
            Self::Io { .. } => "DEPENDENCY_CACHE_IO",
        }
    }
}

/// Formatter registry or execution contract violations.
#[derive(Debug, Error)]
pub enum FormatterRegistryError {
    #[error("unknown formatter '{name}'")]
    UnknownFormatter { name: String },

    #[error("formatter '{name}' failed: {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("formatter execution {execution_id} produced duplicate artifact path '{path}'")]
    DuplicateArtifactPath { execution_id: String, path: String },
}

impl FormatterRegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownFormatter { .. } => "FORMATTER_UNKNOWN",
            Self::ExecutionFailed { .. } => "FORMATTER_EXECUTION",
            Self::DuplicateArtifactPath { .. } => "FORMATTER_DUPLICATE_PATH",
        }
    }
}

/// Writing an artifact to disk failed. Partial artifacts are not rolled back.
#[derive(Debug, Error)]
#[error("failed to write artifact '{path}': {source}")]
pub struct ArtifactWriteError {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

impl ArtifactWriteError {
    pub fn code(&self) -> &'static str {
        "ARTIFACT_WRITE"
    }
}

/// Top-level error union returned by the runtime.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Planning(#[from] SourcePlanningError),

    #[error(transparent)]
    PolicyConfiguration(#[from] PolicyConfigurationError),

    #[error(transparent)]
    Transform(#[from] TransformExecutionError),

    #[error(transparent)]
    Cache(#[from] DependencyCacheError),

    #[error(transparent)]
    Formatter(#[from] FormatterRegistryError),

    #[error(transparent)]
    ArtifactWrite(#[from] ArtifactWriteError),

    /// A lifecycle subscriber raised; subscriber failures fail the run.
    #[error("lifecycle subscriber failed during {stage}: {message}")]
    Subscriber { stage: String, message: String },

    /// The run was cancelled between stages or at an I/O suspension point.
    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Planning(e) => e.code(),
            Self::PolicyConfiguration(e) => e.code(),
            Self::Transform(e) => e.code(),
            Self::Cache(e) => e.code(),
            Self::Formatter(e) => e.code(),
            Self::ArtifactWrite(e) => e.code(),
            Self::Subscriber { .. } => "SUBSCRIBER_FAILED",
            Self::Cancelled => "RUN_CANCELLED",
            Self::Other(_) => "ENGINE_INTERNAL",
        }
    }
}

/// Convenience alias used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;
