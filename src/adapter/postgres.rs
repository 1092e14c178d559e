//! PostgreSQL adapter

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::adapter::{Adapter, AdapterError, execution_error};
use crate::config::DatabaseConfig;

pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    /// Open a pool against the configured PostgreSQL server.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AdapterError> {
        // Units apply strictly sequentially over one connection.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&config.connection_url())
            .await
            .map_err(AdapterError::Connection)?;
        Ok(Self { pool })
    }
}

/// DDL for the ledger table. The autoincrement `id` breaks ordering ties
/// between entries sharing an `executed_at` timestamp.
fn ledger_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    \
            id SERIAL PRIMARY KEY,\n    \
            name VARCHAR(255) NOT NULL UNIQUE,\n    \
            executed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()\n\
        )",
        table
    )
}

#[async_trait]
impl Adapter for PostgresAdapter {
    async fn execute(&self, statement: &str) -> Result<(), AdapterError> {
        sqlx::query(statement)
            .execute(&self.pool)
            .await
            .map_err(execution_error)?;
        Ok(())
    }

    async fn create_ledger_table(&self, table: &str) -> Result<(), AdapterError> {
        sqlx::query(&ledger_table_ddl(table))
            .execute(&self.pool)
            .await
            .map_err(execution_error)?;
        Ok(())
    }

    async fn ledger_entries(&self, table: &str) -> Result<Vec<String>, AdapterError> {
        let sql = format!("SELECT name FROM {} ORDER BY executed_at ASC, id ASC", table);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(execution_error)?;

        rows.iter()
            .map(|row| row.try_get("name").map_err(execution_error))
            .collect()
    }

    async fn insert_ledger_entry(
        &self,
        table: &str,
        identifier: &str,
    ) -> Result<(), AdapterError> {
        let sql = format!("INSERT INTO {} (name) VALUES ($1)", table);
        sqlx::query(&sql)
            .bind(identifier)
            .execute(&self.pool)
            .await
            .map_err(execution_error)?;
        Ok(())
    }

    async fn delete_ledger_entry(
        &self,
        table: &str,
        identifier: &str,
    ) -> Result<(), AdapterError> {
        let sql = format!("DELETE FROM {} WHERE name = $1", table);
        sqlx::query(&sql)
            .bind(identifier)
            .execute(&self.pool)
            .await
            .map_err(execution_error)?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
