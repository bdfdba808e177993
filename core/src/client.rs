//! Blocking CouchDB client.
//!
//! # Design
//! `CouchClient` holds the base URL, the admin `Authorization` value and a
//! `Transport`; it keeps no other state between calls. Every operation is a
//! `build_*` method producing an `HttpRequest`, one trip through the
//! transport, and inspection of the `HttpResponse`. Mutations are bracketed
//! by existence checks, and the check afterwards decides the outcome rather
//! than the status code of the mutating request.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::CouchError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::types::{DocumentCreated, Outcome, UuidsResponse};

/// Synchronous client for one CouchDB endpoint.
///
/// Database creation and deletion are sent with admin credentials; every
/// document operation and read is sent unauthenticated.
#[derive(Clone)]
pub struct CouchClient<T = UreqTransport> {
    base: Url,
    admin_authorization: String,
    transport: T,
}

impl CouchClient<UreqTransport> {
    pub fn new(config: &ClientConfig) -> Result<Self, CouchError> {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> CouchClient<T> {
    /// Fails with `CouchError::Config` when host and port do not form a
    /// valid URL.
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self, CouchError> {
        let base = Url::parse(&config.base_url()).map_err(|e| CouchError::Config(e.to_string()))?;
        Ok(Self {
            base,
            admin_authorization: config.basic_authorization(),
            transport,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    pub fn build_list_databases(&self) -> HttpRequest {
        self.request(HttpMethod::Get, self.url(&["_all_dbs"]))
    }

    pub fn build_uuids(&self) -> HttpRequest {
        self.request(HttpMethod::Get, self.url(&["_uuids"]))
    }

    pub fn build_database_info(&self, name: &str) -> HttpRequest {
        self.request(HttpMethod::Get, self.url(&[name]))
    }

    pub fn build_create_database(&self, name: &str) -> HttpRequest {
        self.admin_request(HttpMethod::Put, self.url(&[name]))
    }

    pub fn build_delete_database(&self, name: &str) -> HttpRequest {
        self.admin_request(HttpMethod::Delete, self.url(&[name]))
    }

    pub fn build_get_document(&self, db: &str, id: &str) -> HttpRequest {
        self.request(HttpMethod::Get, self.url(&[db, id]))
    }

    pub fn build_put_document<D>(&self, db: &str, id: &str, data: &D) -> Result<HttpRequest, CouchError>
    where
        D: Serialize + ?Sized,
    {
        let body = serde_json::to_string(data).map_err(|e| CouchError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Put,
            url: self.url(&[db, id]).into(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }

    pub fn build_delete_document(&self, db: &str, id: &str, rev: &str) -> HttpRequest {
        let mut url = self.url(&[db, id]);
        url.query_pairs_mut().append_pair("rev", rev);
        self.request(HttpMethod::Delete, url)
    }

    /// Base URL with each segment appended percent-encoded, so names and ids
    /// may contain spaces, `/` or `?`.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // An http base always has path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: HttpMethod, url: Url) -> HttpRequest {
        HttpRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    fn admin_request(&self, method: HttpMethod, url: Url) -> HttpRequest {
        HttpRequest {
            method,
            url: url.into(),
            headers: vec![("authorization".to_string(), self.admin_authorization.clone())],
            body: None,
        }
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, CouchError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(&request)?;
        debug!(status = response.status, url = %request.url, "received response");
        Ok(response)
    }

    // -----------------------------------------------------------------------
    // Databases
    // -----------------------------------------------------------------------

    /// Create database `name` unless it already exists.
    ///
    /// Success is decided by re-checking existence after the `PUT`: some
    /// CouchDB releases answer 500 to an admin `PUT` that did create the
    /// database (COUCHDB-2946).
    pub fn create_database(&self, name: &str) -> Result<Outcome, CouchError> {
        if name.is_empty() {
            return Ok(Outcome::InvalidArgument);
        }
        if self.database_exists(name)? {
            info!(db = name, "database already exists");
            return Ok(Outcome::AlreadyExists);
        }

        let response = self.send(self.build_create_database(name))?;

        if self.database_exists(name)? {
            info!(db = name, "database created");
            return Ok(Outcome::Created);
        }
        warn!(db = name, status = response.status, body = %response.body, "database creation may have failed");
        Ok(Outcome::Failed)
    }

    /// Delete database `name` if it exists. There is no confirmation step.
    pub fn delete_database(&self, name: &str) -> Result<Outcome, CouchError> {
        if !self.database_exists(name)? {
            return Ok(Outcome::NotFound);
        }

        let response = self.send(self.build_delete_database(name))?;

        if !self.database_exists(name)? {
            info!(db = name, "database deleted");
            return Ok(Outcome::Deleted);
        }
        warn!(db = name, status = response.status, body = %response.body, "database still exists after delete");
        Ok(Outcome::Failed)
    }

    pub fn list_databases(&self) -> Result<Vec<String>, CouchError> {
        let response = self.send(self.build_list_databases())?;
        parse_json(&response)
    }

    /// True only when `GET /{name}` answers 200 and `name` is also listed by
    /// `_all_dbs`.
    pub fn database_exists(&self, name: &str) -> Result<bool, CouchError> {
        let response = self.send(self.build_database_info(name))?;
        if response.status != 200 {
            return Ok(false);
        }
        let listed = self.list_databases()?.iter().any(|db| db == name);
        if !listed {
            debug!(db = name, "database answered 200 but is not listed in _all_dbs");
        }
        Ok(listed)
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Write a new document, refusing to touch an existing one.
    ///
    /// When `id` is `None` (or empty) a fresh id is taken from `_uuids`.
    pub fn create_document<D>(
        &self,
        db: &str,
        data: &D,
        id: Option<&str>,
    ) -> Result<DocumentCreated, CouchError>
    where
        D: Serialize + ?Sized,
    {
        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.get_uuid()?,
        };

        if self.document_exists(db, &id) {
            info!(db, id = %id, "document already exists, not overwriting");
            return Ok(DocumentCreated {
                id,
                outcome: Outcome::AlreadyExists,
            });
        }

        let response = self.send(self.build_put_document(db, &id, data)?)?;
        let outcome = match response.status {
            201 | 202 => {
                info!(db, id = %id, "document created");
                Outcome::Created
            }
            409 => Outcome::Conflict,
            status => {
                warn!(db, id = %id, status, body = %response.body, "document creation failed");
                Outcome::Failed
            }
        };
        Ok(DocumentCreated { id, outcome })
    }

    /// Fetch a document as raw JSON, metadata included.
    ///
    /// A missing document is not an error: CouchDB's error body (for example
    /// `{"error":"not_found","reason":"missing"}`) is returned as-is.
    pub fn get_document(&self, db: &str, id: &str) -> Result<Value, CouchError> {
        let response = self.send(self.build_get_document(db, id))?;
        parse_json(&response)
    }

    /// Delete the current revision of a document.
    ///
    /// The revision is looked up first because CouchDB rejects deletes that
    /// do not name the revision being replaced. The document is left as a
    /// tombstone on the server, which no longer answers reads by id.
    pub fn delete_document(&self, db: &str, id: &str) -> Result<Outcome, CouchError> {
        if !self.document_exists(db, id) {
            return Ok(Outcome::NotFound);
        }

        let rev = self.get_revision(db, id)?;
        let response = self.send(self.build_delete_document(db, id, &rev))?;

        if !self.document_exists(db, id) {
            info!(db, id, rev = %rev, "document deleted");
            return Ok(Outcome::Deleted);
        }
        if response.status == 409 {
            warn!(db, id, rev = %rev, "document changed before delete");
            return Ok(Outcome::Conflict);
        }
        warn!(db, id, status = response.status, body = %response.body, "document still exists after delete");
        Ok(Outcome::Failed)
    }

    /// Delete exactly revision `rev` of a document with a single request.
    pub fn delete_document_at_revision(&self, db: &str, id: &str, rev: &str) -> Result<Outcome, CouchError> {
        let response = self.send(self.build_delete_document(db, id, rev))?;
        let outcome = match response.status {
            200 | 202 => Outcome::Deleted,
            404 => Outcome::NotFound,
            409 => Outcome::Conflict,
            _ => Outcome::Failed,
        };
        Ok(outcome)
    }

    /// True iff `GET /{db}/{id}` answers exactly 200.
    ///
    /// Transport failures also read as `false`.
    pub fn document_exists(&self, db: &str, id: &str) -> bool {
        match self.send(self.build_get_document(db, id)) {
            Ok(response) => response.status == 200,
            Err(err) => {
                debug!(db, id, error = %err, "document existence check failed");
                false
            }
        }
    }

    pub fn get_revision(&self, db: &str, id: &str) -> Result<String, CouchError> {
        let document = self.get_document(db, id)?;
        document
            .get("_rev")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(CouchError::MissingField("_rev"))
    }

    /// A fresh id from the server's `_uuids` endpoint.
    pub fn get_uuid(&self) -> Result<String, CouchError> {
        let response = self.send(self.build_uuids())?;
        let parsed: UuidsResponse = parse_json(&response)?;
        parsed
            .uuids
            .into_iter()
            .next()
            .ok_or(CouchError::MissingField("uuids"))
    }
}

impl<T> fmt::Debug for CouchClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouchClient")
            .field("base_url", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

fn parse_json<D: DeserializeOwned>(response: &HttpResponse) -> Result<D, CouchError> {
    Ok(serde_json::from_str(&response.body)?)
}
