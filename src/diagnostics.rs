//! Diagnostics attached to resolved plans
//!
//! Recoverable issues never throw: they become `Diagnostic` values carried on
//! the resolved source (and aggregated globally) so a run can complete while
//! still reporting everything that went wrong. Fatal conditions use the typed
//! errors in [`crate::error`] instead.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::JsonPointer;
use crate::model::SourceSpan;

/// Stable diagnostic codes.
pub mod codes {
    /// An alias chain revisited a pointer already on the chain.
    pub const CYCLE_DETECTED: &str = "CYCLE_DETECTED";
    /// A `$ref` target does not exist in the target document.
    pub const UNKNOWN_REFERENCE: &str = "UNKNOWN_REFERENCE";
    /// An external reference used a location the loader cannot serve.
    pub const UNSUPPORTED_LOCATION: &str = "UNSUPPORTED_LOCATION";
    /// A source document failed to load or parse.
    pub const DOCUMENT_LOAD_FAILED: &str = "DOCUMENT_LOAD_FAILED";
    /// A transform threw or returned an invalid payload.
    pub const TRANSFORM_FAILED: &str = "TRANSFORM_FAILED";
    /// A token carried a `$type` tag the engine does not recognize.
    pub const UNKNOWN_TYPE: &str = "UNKNOWN_TYPE";
    /// A token node was structurally malformed.
    pub const MALFORMED_TOKEN: &str = "MALFORMED_TOKEN";
}

/// Diagnostic severity, ordered so `Error > Warn > Info`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

/// Additional context attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedInformation {
    pub message: String,
    pub pointer: Option<JsonPointer>,
    pub uri: Option<String>,
}

/// A recoverable issue attributed to a pointer and/or document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable code from [`codes`].
    pub code: String,

    pub severity: Severity,

    pub pointer: Option<JsonPointer>,

    pub uri: Option<String>,

    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedInformation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    pub fn warn(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warn, message)
    }

    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, message)
    }

    fn new(code: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity,
            pointer: None,
            uri: None,
            message: message.into(),
            related: Vec::new(),
            span: None,
        }
    }

    pub fn with_pointer(mut self, pointer: JsonPointer) -> Self {
        self.pointer = Some(pointer);
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_related(mut self, related: RelatedInformation) -> Self {
        self.related.push(related);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(pointer) = &self.pointer {
            write!(f, " at {pointer}")?;
        }
        if let Some(uri) = &self.uri {
            write!(f, " ({uri})")?;
        }
        Ok(())
    }
}

/// Count diagnostics at or above a severity.
pub fn count_at_least(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity >= severity).count()
}

/// True when any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    count_at_least(diagnostics, Severity::Error) > 0
}
