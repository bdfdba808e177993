//! Result values returned by client operations.

use std::fmt;

use serde::Deserialize;

/// How a mutating operation ended.
///
/// Expected conditions are values of this type rather than errors, so a
/// caller can branch on them without any error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Deleted,
    /// The database or document was already there; nothing was written.
    AlreadyExists,
    /// The database or document was absent; nothing was removed.
    NotFound,
    /// The server rejected the revision supplied with the request.
    Conflict,
    /// The request was sent but the result could not be confirmed.
    Failed,
    /// The arguments were rejected before any request was made.
    InvalidArgument,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Created | Outcome::Deleted)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Outcome::Created => "created",
            Outcome::Deleted => "deleted",
            Outcome::AlreadyExists => "already exists",
            Outcome::NotFound => "not found",
            Outcome::Conflict => "revision conflict",
            Outcome::Failed => "something may have gone wrong",
            Outcome::InvalidArgument => "invalid argument",
        };
        f.write_str(message)
    }
}

/// Result of `CouchClient::create_document`, carrying the id that was used
/// (server-generated when the caller supplied none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCreated {
    pub id: String,
    pub outcome: Outcome,
}

/// Body of `GET /_uuids`.
#[derive(Debug, Deserialize)]
pub(crate) struct UuidsResponse {
    #[serde(default)]
    pub uuids: Vec<String>,
}
