//! Blocking client for basic CouchDB interactions.
//!
//! # Overview
//! `CouchClient` creates and deletes databases, creates, reads and deletes
//! documents, and answers existence checks against one CouchDB endpoint
//! described by a `ClientConfig`.
//!
//! # Design
//! - `CouchClient` holds only its base URL, the admin `Authorization` value
//!   and a `Transport`; no session or cache.
//! - Each operation has a public `build_*` request builder, so the I/O
//!   boundary is explicit and the requests can be inspected without a server.
//! - Expected conditions (missing database, existing document, stale
//!   revision) come back as `Outcome` values. Only infrastructure failures
//!   are `CouchError`s.
//! - Database mutations are confirmed by re-checking existence rather than by
//!   trusting the status code.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use client::CouchClient;
pub use config::ClientConfig;
pub use error::CouchError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::{DocumentCreated, Outcome};
