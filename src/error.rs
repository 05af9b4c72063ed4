use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Which side of a schedule collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Student,
    Faculty,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictKind::Student => "student",
            ConflictKind::Faculty => "faculty",
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("{what} not found")]
    NotFound { what: &'static str, id: String },

    #[error("schedule conflict: {reason}")]
    Conflict {
        kind: ConflictKind,
        reason: String,
        existing_id: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: serde_json::Value) -> Self {
        EngineError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(what: &'static str, id: &str) -> Self {
        EngineError::NotFound {
            what,
            id: id.to_string(),
        }
    }

    /// Wire error code, in the same vocabulary as the rest of the IPC surface.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "bad_params",
            EngineError::NotFound { .. } => "not_found",
            EngineError::Conflict { .. } => "conflict",
            EngineError::Storage(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            EngineError::Validation { details, .. } => details.clone(),
            EngineError::NotFound { id, .. } => Some(json!({ "id": id })),
            EngineError::Conflict {
                kind, existing_id, ..
            } => Some(json!({
                "kind": kind.as_str(),
                "existingId": existing_id,
            })),
            EngineError::Storage(_) => None,
        }
    }
}

/// Per-row diagnostic for batch operations that soft-fail individual rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRejection {
    pub index: usize,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RowRejection {
    pub fn bad_params(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn from_error(index: usize, e: &EngineError) -> Self {
        Self {
            index,
            code: e.code(),
            message: e.to_string(),
            details: e.details(),
        }
    }
}
