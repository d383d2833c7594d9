use std::time::Duration;

use crate::decode::DecodePolicy;
use crate::error::DbError;

/// Connection settings, assembled as an immutable builder: each step
/// consumes the value and returns it with one field changed, so a partially
/// built config can be cloned and forked without surprises.
///
/// `host`, `dbname` and `user` are required; the port defaults to 5432.
///
/// ```rust
/// use pg_rowmap::ConnectConfig;
///
/// let config = ConnectConfig::new()
///     .host("localhost")
///     .dbname("app")
///     .user("app")
///     .password("secret");
/// # let _ = config;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectConfig {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    dbname: Option<String>,
    application_name: Option<String>,
    connect_timeout: Option<Duration>,
    allow_timestamp_extremes: bool,
}

impl ConnectConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Map `infinity`/`-infinity` dates and timestamps to the carrier's
    /// representable extreme instead of failing the decode. Off by default;
    /// the extremes are sentinels, not real instants.
    #[must_use]
    pub fn allow_timestamp_extremes(mut self, allow: bool) -> Self {
        self.allow_timestamp_extremes = allow;
        self
    }

    pub(crate) fn decode_policy(&self) -> DecodePolicy {
        DecodePolicy {
            allow_timestamp_extremes: self.allow_timestamp_extremes,
        }
    }

    /// Validate required fields and produce the driver config.
    pub(crate) fn build_pg_config(&self) -> Result<tokio_postgres::Config, DbError> {
        let host = self
            .host
            .as_deref()
            .ok_or_else(|| DbError::Config("host is required".to_string()))?;
        let dbname = self
            .dbname
            .as_deref()
            .ok_or_else(|| DbError::Config("dbname is required".to_string()))?;
        let user = self
            .user
            .as_deref()
            .ok_or_else(|| DbError::Config("user is required".to_string()))?;

        let mut config = tokio_postgres::Config::new();
        config
            .host(host)
            .port(self.port.unwrap_or(5432))
            .dbname(dbname)
            .user(user);
        if let Some(password) = &self.password {
            config.password(password);
        }
        if let Some(name) = &self.application_name {
            config.application_name(name);
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout(timeout);
        }
        Ok(config)
    }
}
