//! Configuration types for the `CouchDB` sink.
//!
//! Configuration is validated once, at startup, and is immutable afterwards.
//! Invalid or missing settings surface as [`ConfigError`] before any record
//! is processed. Values are usually loaded from environment variables via
//! [`ProcessorConfig::from_env`], or built in code with
//! [`ConnectionConfig::builder`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::connection::ConnectionMode;
use crate::relationship::{Relationship, Relationships};

/// Default `CouchDB` port.
pub const DEFAULT_PORT: u16 = 5984;

/// Default maximum number of idle HTTP connections kept per host.
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// Environment variable names recognized by [`ProcessorConfig::from_env`].
pub mod env {
    /// Server host name or address (required).
    pub const HOST: &str = "COUCHDB_HOST";
    /// Server port (default 5984).
    pub const PORT: &str = "COUCHDB_PORT";
    /// Login user (required).
    pub const USERNAME: &str = "COUCHDB_USERNAME";
    /// Login password (required).
    pub const PASSWORD: &str = "COUCHDB_PASSWORD";
    /// Target database (required).
    pub const DATABASE: &str = "COUCHDB_DATABASE";
    /// Create the database when it does not exist (default `false`).
    pub const AUTOCREATE: &str = "COUCHDB_AUTOCREATE";
    /// `http` or `https` (default `http`).
    pub const SCHEME: &str = "COUCHDB_SCHEME";
    /// Idle connection pool size (default 100).
    pub const MAX_CONNECTIONS: &str = "COUCHDB_MAX_CONNECTIONS";
    /// Request timeout in seconds, `0` disables it (default 0).
    pub const CONNECTION_TIMEOUT_SECS: &str = "COUCHDB_CONNECTION_TIMEOUT_SECS";
    /// Replace the success payload with the stored document (default `false`).
    pub const INCLUDE_DOCUMENT: &str = "COUCHSINK_INCLUDE_DOCUMENT";
    /// Comma-separated relationships discarded on arrival.
    pub const AUTO_TERMINATE: &str = "COUCHSINK_AUTO_TERMINATE";
    /// `pooled` or `per-invocation` (default `pooled`).
    pub const CONNECTION_MODE: &str = "COUCHSINK_CONNECTION_MODE";
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("missing required setting {0}")]
    Missing(String),

    /// A setting was provided but its value is not acceptable.
    #[error("invalid {name}: {reason}")]
    Invalid {
        /// The setting name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}

/// URL scheme used to reach the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain HTTP.
    #[default]
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// The scheme as it appears in a URL.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(ConfigError::invalid(
                env::SCHEME,
                format!("unknown scheme {other:?}"),
            )),
        }
    }
}

/// Where and how to connect to a `CouchDB` database.
///
/// Only constructible through [`ConnectionConfig::builder`], so every
/// instance satisfies the invariants: host, username, password and database
/// are non-empty, the port is in `1..=65535`, and the database name follows
/// `CouchDB` naming rules.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionConfig {
    scheme: Scheme,
    host: String,
    port: u16,
    username: String,
    password: String,
    database: String,
    auto_create: bool,
    max_connections: usize,
    connection_timeout: Duration,
}

impl ConnectionConfig {
    /// Start building a configuration from the four required settings.
    pub fn builder(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            scheme: Scheme::default(),
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            database: database.into(),
            auto_create: false,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connection_timeout: Duration::ZERO,
        }
    }

    /// Load connection settings from environment variables.
    ///
    /// See [`env`] for the variable names.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load connection settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = required(&lookup, env::HOST)?;
        let username = required(&lookup, env::USERNAME)?;
        let password = required(&lookup, env::PASSWORD)?;
        let database = required(&lookup, env::DATABASE)?;

        let port = parse_port(lookup(env::PORT).as_deref())?;
        let auto_create = parse_bool(&lookup, env::AUTOCREATE, false)?;
        let scheme = lookup(env::SCHEME)
            .map_or(Ok(Scheme::default()), |s| s.parse())?;
        let max_connections = lookup(env::MAX_CONNECTIONS).map_or(
            Ok(DEFAULT_MAX_CONNECTIONS),
            |s| {
                s.trim()
                    .parse::<usize>()
                    .map_err(|e| ConfigError::invalid(env::MAX_CONNECTIONS, e.to_string()))
            },
        )?;
        let timeout_secs = lookup(env::CONNECTION_TIMEOUT_SECS).map_or(Ok(0), |s| {
            s.trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::invalid(env::CONNECTION_TIMEOUT_SECS, e.to_string()))
        })?;

        Self::builder(host, username, password, database)
            .scheme(scheme)
            .port(port)
            .auto_create(auto_create)
            .max_connections(max_connections)
            .connection_timeout(Duration::from_secs(timeout_secs))
            .build()
    }

    /// URL scheme.
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Server host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Login user.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Login password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Target database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Whether the database is created when missing.
    pub const fn auto_create(&self) -> bool {
        self.auto_create
    }

    /// Idle connection pool size per host.
    pub const fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Request timeout. [`Duration::ZERO`] means no timeout.
    pub const fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Base server URL, e.g. `http://localhost:5984`.
    pub fn server_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("auto_create", &self.auto_create)
            .field("max_connections", &self.max_connections)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}

/// Builder for [`ConnectionConfig`]. Validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
#[must_use]
pub struct ConnectionConfigBuilder {
    scheme: Scheme,
    host: String,
    port: u16,
    username: String,
    password: String,
    database: String,
    auto_create: bool,
    max_connections: usize,
    connection_timeout: Duration,
}

impl ConnectionConfigBuilder {
    /// Set the URL scheme.
    pub const fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Set the server port.
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Create the database on connect when it does not exist.
    pub const fn auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    /// Set the idle connection pool size.
    pub const fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the request timeout; [`Duration::ZERO`] disables it.
    pub const fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<ConnectionConfig, ConfigError> {
        non_empty(env::HOST, &self.host)?;
        non_empty(env::USERNAME, &self.username)?;
        non_empty(env::PASSWORD, &self.password)?;
        non_empty(env::DATABASE, &self.database)?;
        validate_database_name(&self.database)?;

        if self.port == 0 {
            return Err(ConfigError::invalid(env::PORT, "port must be in 1..=65535"));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::invalid(
                env::MAX_CONNECTIONS,
                "must be at least 1",
            ));
        }
        let host = self.host.trim().to_owned();
        validate_host(self.scheme, &host, self.port)?;

        Ok(ConnectionConfig {
            scheme: self.scheme,
            host,
            port: self.port,
            username: self.username,
            password: self.password,
            database: self.database,
            auto_create: self.auto_create,
            max_connections: self.max_connections,
            connection_timeout: self.connection_timeout,
        })
    }
}

/// Full configuration of a [`DocumentProcessor`](crate::DocumentProcessor).
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Connection settings.
    pub connection: ConnectionConfig,
    /// On success, replace the payload with the stored document instead of
    /// the write response.
    pub include_document: bool,
    /// Routing targets, including which ones are auto-terminated.
    pub relationships: Relationships,
    /// Whether connections are reused across records.
    pub connection_mode: ConnectionMode,
}

impl ProcessorConfig {
    /// Create a configuration with default writer settings.
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            include_document: false,
            relationships: Relationships::default(),
            connection_mode: ConnectionMode::default(),
        }
    }

    /// Load the processor configuration from environment variables.
    ///
    /// Required variables:
    /// - `COUCHDB_HOST`, `COUCHDB_USERNAME`, `COUCHDB_PASSWORD`, `COUCHDB_DATABASE`
    ///
    /// Optional variables:
    /// - `COUCHDB_PORT` -- server port (default 5984)
    /// - `COUCHDB_AUTOCREATE` -- create the database if absent (default `false`)
    /// - `COUCHDB_SCHEME` -- `http` or `https` (default `http`)
    /// - `COUCHDB_MAX_CONNECTIONS` -- idle pool size (default 100)
    /// - `COUCHDB_CONNECTION_TIMEOUT_SECS` -- request timeout, `0` = none (default 0)
    /// - `COUCHSINK_INCLUDE_DOCUMENT` -- fetch the stored document on success (default `false`)
    /// - `COUCHSINK_AUTO_TERMINATE` -- comma list of relationships to discard
    /// - `COUCHSINK_CONNECTION_MODE` -- `pooled` or `per-invocation` (default `pooled`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the processor configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let connection = ConnectionConfig::from_lookup(&lookup)?;
        let include_document = parse_bool(&lookup, env::INCLUDE_DOCUMENT, false)?;

        let auto_terminated = lookup(env::AUTO_TERMINATE)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(|name| {
                        name.parse::<Relationship>()
                            .map_err(|e| ConfigError::invalid(env::AUTO_TERMINATE, e.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let connection_mode = lookup(env::CONNECTION_MODE)
            .map_or(Ok(ConnectionMode::default()), |s| {
                s.parse::<ConnectionMode>()
                    .map_err(|reason| ConfigError::invalid(env::CONNECTION_MODE, reason))
            })?;

        Ok(Self {
            connection,
            include_document,
            relationships: Relationships::with_auto_terminated(auto_terminated),
            connection_mode,
        })
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or_else(|| ConfigError::Missing(name.to_owned()))
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).map_or(Ok(default), |s| {
        s.trim()
            .to_ascii_lowercase()
            .parse::<bool>()
            .map_err(|e| ConfigError::invalid(name, e.to_string()))
    })
}

fn parse_port(raw: Option<&str>) -> Result<u16, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_PORT);
    };
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ConfigError::invalid(
            env::PORT,
            format!("{raw:?} is not a valid port (1..=65535)"),
        )),
        Ok(port) => Ok(port),
    }
}

fn non_empty(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(name, "must not be empty"));
    }
    Ok(())
}

/// The host must form a server URL on its own: it parses, it is the URL's
/// host, and it adds neither a path nor a different port.
fn validate_host(scheme: Scheme, host: &str, port: u16) -> Result<(), ConfigError> {
    let url = Url::parse(&format!("{scheme}://{host}:{port}"))
        .map_err(|e| ConfigError::invalid(env::HOST, format!("{host:?} is not a valid host: {e}")))?;
    let host_matches = url
        .host_str()
        .is_some_and(|parsed| parsed.eq_ignore_ascii_case(host));
    if !host_matches || url.port_or_known_default() != Some(port) || url.path() != "/" {
        return Err(ConfigError::invalid(
            env::HOST,
            format!("{host:?} must be a bare host name or address"),
        ));
    }
    Ok(())
}

/// `CouchDB` database names: a lowercase letter followed by lowercase
/// letters, digits, or any of `_$()+-/`.
fn validate_database_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(c)
    });
    if first_ok && rest_ok {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            env::DATABASE,
            format!("{name:?} is not a valid CouchDB database name"),
        ))
    }
}
