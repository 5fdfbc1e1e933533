pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod payments;
pub mod repository;
pub mod service;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// Opens the SQLite pool and brings the schema up to date.
pub async fn connect_database(url: &str, max_connections: u32) -> error::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
