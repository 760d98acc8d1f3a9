// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the ORM core.
//!
//! Driver-specific failures are mapped into this unified taxonomy so that
//! callers handle one error surface across dialects. Recognizable constraint
//! violations are translated from engine codes by the driver adapters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Constraint classes recognized across dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintKind::Unique => write!(f, "unique"),
            ConstraintKind::ForeignKey => write!(f, "foreign key"),
            ConstraintKind::NotNull => write!(f, "not null"),
        }
    }
}

/// Unified error type for all ORM operations.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum Error {
    #[error("Invalid schema: {reason}")]
    SchemaInvalid { reason: String },

    #[error("Unknown model: {name}")]
    UnknownModel { name: String },

    #[error("Unknown field {name} on model {model}")]
    UnknownField { model: String, name: String },

    #[error("Circular dependency involving model {model}")]
    CircularDependency { model: String },

    #[error("Introspection failed: {cause}")]
    IntrospectionFailed { cause: String },

    #[error("Migration planning failed for {model}: {cause}")]
    PlanFailed { model: String, cause: String },

    #[error("Migration failed for {model} while executing `{sql}`: {cause}")]
    MigrationFailed {
        model: String,
        sql: String,
        cause: String,
    },

    #[error("Query compilation failed: {detail}")]
    SqlCompile { detail: String },

    #[error("SQL execution failed for `{sql}`: {cause}")]
    SqlExec { sql: String, cause: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("{kind} constraint violated: {detail}")]
    ConstraintViolation {
        kind: ConstraintKind,
        detail: String,
    },

    #[error("Transaction aborted: {cause}")]
    TxAborted { cause: String },

    #[error("Commit failed: {cause}")]
    CommitFailed { cause: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("No driver registered for scheme: {scheme}")]
    DriverNotFound { scheme: String },

    #[error("Feature not supported: {message}")]
    NotSupported { message: String },
}

impl Error {
    pub fn schema_invalid(reason: impl Into<String>) -> Self {
        Self::SchemaInvalid {
            reason: reason.into(),
        }
    }

    pub fn unknown_model(name: impl Into<String>) -> Self {
        Self::UnknownModel { name: name.into() }
    }

    pub fn unknown_field(model: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownField {
            model: model.into(),
            name: name.into(),
        }
    }

    pub fn circular_dependency(model: impl Into<String>) -> Self {
        Self::CircularDependency {
            model: model.into(),
        }
    }

    pub fn introspection_failed(cause: impl Into<String>) -> Self {
        Self::IntrospectionFailed {
            cause: cause.into(),
        }
    }

    pub fn plan_failed(model: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::PlanFailed {
            model: model.into(),
            cause: cause.into(),
        }
    }

    pub fn migration_failed(
        model: impl Into<String>,
        sql: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self::MigrationFailed {
            model: model.into(),
            sql: sql.into(),
            cause: cause.into(),
        }
    }

    pub fn sql_compile(detail: impl Into<String>) -> Self {
        Self::SqlCompile {
            detail: detail.into(),
        }
    }

    pub fn sql_exec(sql: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::SqlExec {
            sql: sql.into(),
            cause: cause.into(),
        }
    }

    pub fn constraint(kind: ConstraintKind, detail: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            kind,
            detail: detail.into(),
        }
    }

    pub fn tx_aborted(cause: impl Into<String>) -> Self {
        Self::TxAborted {
            cause: cause.into(),
        }
    }

    pub fn commit_failed(cause: impl Into<String>) -> Self {
        Self::CommitFailed {
            cause: cause.into(),
        }
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    pub fn driver_not_found(scheme: impl Into<String>) -> Self {
        Self::DriverNotFound {
            scheme: scheme.into(),
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, Error>;
