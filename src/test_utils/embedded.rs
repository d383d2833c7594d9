use postgresql_embedded::PostgreSQL;

use crate::client::DbClient;
use crate::config::ConnectConfig;
use crate::error::DbError;

/// A running embedded `PostgreSQL` instance with a provisioned test
/// database.
///
/// The server binaries are bundled, so tests need no external database.
/// Dropping the value leaves shutdown to the embedded server's own drop
/// handling; call [`EmbeddedDb::stop`] for an orderly stop.
pub struct EmbeddedDb {
    postgres: PostgreSQL,
    config: ConnectConfig,
}

impl EmbeddedDb {
    /// Set up, start, and provision an embedded server.
    ///
    /// # Errors
    ///
    /// [`DbError::Connection`] when the embedded server cannot be set up,
    /// started, or provisioned.
    pub async fn start() -> Result<Self, DbError> {
        let mut postgres = PostgreSQL::default();
        postgres.setup().await.map_err(embedded_error)?;
        postgres.start().await.map_err(embedded_error)?;
        postgres
            .create_database("rowmap_test")
            .await
            .map_err(embedded_error)?;

        let settings = postgres.settings();
        let config = ConnectConfig::new()
            .host(settings.host.clone())
            .port(settings.port)
            .user(settings.username.clone())
            .password(settings.password.clone())
            .dbname("rowmap_test");

        Ok(Self { postgres, config })
    }

    /// Connection settings for the provisioned database; extend with
    /// builder steps (for example `allow_timestamp_extremes`) as a test
    /// needs.
    #[must_use]
    pub fn config(&self) -> ConnectConfig {
        self.config.clone()
    }

    /// Open a fresh connection to the provisioned database.
    ///
    /// # Errors
    ///
    /// Whatever [`DbClient::connect`] returns.
    pub async fn connect(&self) -> Result<DbClient, DbError> {
        DbClient::connect(&self.config).await
    }

    /// Stop the server. Failures are ignored; the data directory is
    /// temporary.
    pub async fn stop(mut self) {
        let _ = self.postgres.stop().await;
    }
}

fn embedded_error(e: postgresql_embedded::Error) -> DbError {
    DbError::Connection(format!("embedded postgres: {e}"))
}
