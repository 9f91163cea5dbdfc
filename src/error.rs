//! # Compiler Errors
//!
//! Error taxonomy for descriptor compilation. Batch compilation is
//! partial-failure-tolerant: callers receive every error alongside the
//! files that did compile.

use std::fmt;
use thiserror::Error;

/// Convenience alias for compiler results.
pub type Result<T> = std::result::Result<T, CompileError>;

/// What kind of thing a dangling reference pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Table,
    Collection,
    LiveQuery,
    Container,
    ContainerField,
    Selector,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => "table",
            Self::Collection => "collection",
            Self::LiveQuery => "live query",
            Self::Container => "container",
            Self::ContainerField => "container field",
            Self::Selector => "selector",
        };
        f.write_str(name)
    }
}

/// Errors raised while validating or compiling descriptors.
///
/// The variants map onto the compiler's failure classes:
/// - `Malformed` / `Validation` - rejected before any compilation begins
/// - `UnresolvedReference` - aborts the referencing descriptor only
/// - `DependencyCycle` - aborts the cycle's members only
/// - `CodeGeneration` - aborts the affected artifact only
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    /// A batch element could not be deserialized at all.
    #[error("malformed descriptor at {path}: {message}")]
    Malformed { path: String, message: String },

    /// A descriptor deserialized but violates its structural contract.
    #[error("invalid descriptor at {path}: {message}")]
    Validation { path: String, message: String },

    /// A descriptor names a table/collection/container/selector that does
    /// not exist in the compilation batch.
    #[error("{descriptor}: unresolved reference to {kind} '{name}'")]
    UnresolvedReference {
        descriptor: String,
        kind: ReferenceKind,
        name: String,
    },

    /// Cross-source selector composition formed a cycle.
    #[error("selector dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    /// A descriptor resolved but its artifact could not be emitted.
    #[error("code generation failed for '{name}': {message}")]
    CodeGeneration { name: String, message: String },
}

impl CompileError {
    /// Build a validation error for a descriptor path.
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Build an unresolved-reference error.
    pub fn unresolved(
        descriptor: impl Into<String>,
        kind: ReferenceKind,
        name: impl Into<String>,
    ) -> Self {
        Self::UnresolvedReference {
            descriptor: descriptor.into(),
            kind,
            name: name.into(),
        }
    }
}
