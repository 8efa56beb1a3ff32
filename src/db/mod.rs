//! SQLite store for yearly aggregates, countries and dashboard queries.

pub mod countries;
pub mod queries;
pub mod sqlite;

use anyhow::{Context, Result};
use log::info;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};

/// Opens `database_url`, creating the database file when it is missing.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .with_context(|| format!("Unable to create database {}", database_url))?;
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .with_context(|| format!("Unable to connect to {}", database_url))?;

    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    Ok(pool)
}

// -- Tests -------------------------------------------------------------------
