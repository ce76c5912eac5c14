//! `CouchDB` HTTP connection and connection pooling.
//!
//! [`CouchConnection`] wraps a [`reqwest::Client`] bound to one database on
//! one server and implements [`DocumentStore`] over the `CouchDB` document
//! API. [`ConnectionPool`] hands out connections to the processor, reusing
//! one connection across records unless configured otherwise.
//!
//! # HTTP calls
//!
//! | Operation | Request |
//! |-----------|---------|
//! | create database | `PUT /{db}` |
//! | check database | `HEAD /{db}` |
//! | save without `_id` | `POST /{db}` |
//! | save with `_id` | `PUT /{db}/{id}` |
//! | fetch revision | `GET /{db}/{id}?rev={rev}` |

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use reqwest::{StatusCode, Url};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::document::Document;
use crate::error::ConnectionError;
use crate::store::{DocumentStore, SaveResponse, StoreError};

/// A live handle to one `CouchDB` database.
///
/// Cloning is cheap and shares the underlying HTTP connection pool. Each
/// request is independent, so clones can be used from different
/// invocations without sharing any per-request state.
#[derive(Clone)]
pub struct CouchConnection {
    client: reqwest::Client,
    db_url: Url,
    database_uri: String,
    username: String,
    password: String,
}

impl CouchConnection {
    /// Connect to the configured database.
    ///
    /// With auto-create enabled, the database is created when absent
    /// (an existing database is left untouched). Otherwise the database
    /// must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the server is unreachable, rejects the
    /// credentials, or the database is missing and auto-create is off.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let server_url = config.server_url();
        let mut db_url = Url::parse(&server_url).map_err(|e| ConnectionError::InvalidUrl {
            url: server_url.clone(),
            reason: e.to_string(),
        })?;
        db_url
            .path_segments_mut()
            .map_err(|()| ConnectionError::InvalidUrl {
                url: server_url.clone(),
                reason: "URL cannot be a base".to_owned(),
            })?
            .pop_if_empty()
            .push(config.database());
        let database_uri = format!("{db_url}/");

        let mut builder = reqwest::Client::builder().pool_max_idle_per_host(config.max_connections());
        let timeout = config.connection_timeout();
        if !timeout.is_zero() {
            builder = builder.connect_timeout(timeout).timeout(timeout);
        }
        let client = builder.build().map_err(ConnectionError::Client)?;

        let connection = Self {
            client,
            db_url,
            database_uri,
            username: config.username().to_owned(),
            password: config.password().to_owned(),
        };

        if config.auto_create() {
            connection.create_database().await?;
        } else {
            connection.check_database(config.database()).await?;
        }

        info!(
            database_uri = connection.database_uri,
            auto_create = config.auto_create(),
            "connected to CouchDB"
        );
        Ok(connection)
    }

    /// `PUT /{db}`; `412 Precondition Failed` means it already exists.
    async fn create_database(&self) -> Result<(), ConnectionError> {
        let response = self
            .authorized(self.client.put(self.db_url.clone()))
            .send()
            .await
            .map_err(|source| self.unreachable(source))?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                info!(database_uri = self.database_uri, "database created");
                Ok(())
            }
            StatusCode::PRECONDITION_FAILED => {
                debug!(database_uri = self.database_uri, "database already exists");
                Ok(())
            }
            status => Err(self.status_error(status, response).await),
        }
    }

    /// `HEAD /{db}`; verifies reachability, credentials and existence.
    async fn check_database(&self, database: &str) -> Result<(), ConnectionError> {
        let response = self
            .authorized(self.client.head(self.db_url.clone()))
            .send()
            .await
            .map_err(|source| self.unreachable(source))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(ConnectionError::DatabaseMissing {
                database: database.to_owned(),
            }),
            status => Err(self.status_error(status, response).await),
        }
    }

    async fn status_error(&self, status: StatusCode, response: reqwest::Response) -> ConnectionError {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ConnectionError::Unauthorized {
                username: self.username.clone(),
                status: status.as_u16(),
            };
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        ConnectionError::UnexpectedStatus {
            url: self.db_url.to_string(),
            status: status.as_u16(),
            body,
        }
    }

    fn unreachable(&self, source: reqwest::Error) -> ConnectionError {
        ConnectionError::Unreachable {
            url: self.db_url.to_string(),
            source,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }

    /// `/{db}/{id}` with the identifier percent-encoded as one segment.
    fn document_url(&self, id: &str) -> Result<Url, StoreError> {
        let mut url = self.db_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidResponse("database URL cannot be a base".to_owned()))?
            .push(id);
        Ok(url)
    }
}

impl fmt::Debug for CouchConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouchConnection")
            .field("database_uri", &self.database_uri)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl DocumentStore for CouchConnection {
    async fn save(&self, document: &Document) -> Result<SaveResponse, StoreError> {
        let request = match document.id() {
            Some(id) => self.client.put(self.document_url(id)?),
            None => self.client.post(self.db_url.clone()),
        };
        let response = self.authorized(request).json(document).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(
            status = status.as_u16(),
            id = document.id(),
            "save request completed"
        );

        if status == StatusCode::CONFLICT {
            return Err(StoreError::conflict(&body));
        }
        if !status.is_success() {
            return Err(StoreError::rejected(status.as_u16(), &body));
        }
        serde_json::from_slice(&body)
            .map_err(|e| StoreError::InvalidResponse(format!("save response: {e}")))
    }

    async fn fetch(&self, id: &str, rev: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.document_url(id)?;
        let response = self
            .authorized(self.client.get(url))
            .query(&[("rev", rev)])
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(StoreError::rejected(status.as_u16(), &body));
        }
        Ok(body.to_vec())
    }

    fn database_uri(&self) -> &str {
        &self.database_uri
    }
}

/// Whether connections are reused across records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Connect once and reuse the connection until reconfigured.
    #[default]
    Pooled,
    /// Connect (and re-authenticate) for every record.
    PerInvocation,
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pooled" => Ok(Self::Pooled),
            "per-invocation" | "per_invocation" => Ok(Self::PerInvocation),
            other => Err(format!(
                "unknown connection mode {other:?} (expected pooled or per-invocation)"
            )),
        }
    }
}

/// Source of store handles for the processor.
pub trait ConnectionFactory: Send + Sync {
    /// The store handle produced.
    type Store: DocumentStore;

    /// Obtain a store handle for one invocation.
    fn acquire(&self) -> impl Future<Output = Result<Self::Store, ConnectionError>> + Send;
}

/// Hands out [`CouchConnection`]s built from one [`ConnectionConfig`].
///
/// In [`ConnectionMode::Pooled`] the first successful connection is cached
/// and cloned for later invocations. A failed connect caches nothing, so
/// the next invocation tries again.
pub struct ConnectionPool {
    mode: ConnectionMode,
    state: Mutex<PoolState>,
}

struct PoolState {
    config: ConnectionConfig,
    cached: Option<CouchConnection>,
}

impl ConnectionPool {
    /// Create a pool for the given configuration. Nothing connects yet.
    pub fn new(config: ConnectionConfig, mode: ConnectionMode) -> Self {
        Self {
            mode,
            state: Mutex::new(PoolState {
                config,
                cached: None,
            }),
        }
    }

    /// The connection mode.
    pub const fn mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Replace the configuration, discarding any cached connection when it
    /// changed.
    pub async fn reconfigure(&self, config: ConnectionConfig) {
        let mut state = self.state.lock().await;
        if state.config != config {
            debug!("connection configuration changed, discarding cached connection");
            state.config = config;
            state.cached = None;
        }
    }

    /// Drop the cached connection, if any.
    pub async fn invalidate(&self) {
        self.state.lock().await.cached = None;
    }

    /// Whether a connection is currently cached.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.cached.is_some()
    }
}

impl ConnectionFactory for ConnectionPool {
    type Store = CouchConnection;

    async fn acquire(&self) -> Result<CouchConnection, ConnectionError> {
        if self.mode == ConnectionMode::PerInvocation {
            let config = self.state.lock().await.config.clone();
            return CouchConnection::connect(&config).await;
        }
        // Held across connect so concurrent first invocations share one connect.
        let mut state = self.state.lock().await;
        if let Some(connection) = &state.cached {
            return Ok(connection.clone());
        }
        let connection = CouchConnection::connect(&state.config).await?;
        state.cached = Some(connection.clone());
        Ok(connection)
    }
}
