//! Error types for the CouchDB client.
//!
//! # Design
//! Only infrastructure failures are errors: the server could not be reached,
//! a body could not be (de)serialized, or a response lacked a field the client
//! needs. Expected conditions such as a missing database or an existing
//! document are reported through `Outcome` instead.

use thiserror::Error;

/// Errors returned by `CouchClient` operations and configuration loading.
#[derive(Debug, Error)]
pub enum CouchError {
    /// The HTTP round-trip itself failed (connection refused, DNS, timeout).
    #[error("HTTP transport failed: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A well-formed response was missing a field the client depends on.
    #[error("response is missing field `{0}`")]
    MissingField(&'static str),

    /// The configuration file did not have the expected layout.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
