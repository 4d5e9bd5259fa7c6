use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use atelier_core::CoreError;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Unique violations mean another writer got there first; everything else is internal.
pub(crate) fn map_db_error(e: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return CoreError::ConflictError(db.message().to_string());
        }
    }
    tracing::error!("Database error: {}", e);
    CoreError::internal(e)
}

/// Text form of a unit enum, as serde writes it.
pub(crate) fn enum_to_text<T: Serialize>(value: &T) -> Result<String, CoreError> {
    match serde_json::to_value(value).map_err(CoreError::internal)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(CoreError::InternalError(format!("not a unit enum: {}", other))),
    }
}

pub(crate) fn enum_from_text<T: DeserializeOwned>(column: &str, text: &str) -> Result<T, CoreError> {
    serde_json::from_value(serde_json::Value::String(text.to_string())).map_err(|e| {
        CoreError::InternalError(format!("bad value {:?} in column {}: {}", text, column, e))
    })
}
