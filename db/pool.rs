//! Connection pool setup, grounded on `Wolftown-io-canis/server/src/db/mod.rs`'s
//! `create_pool`/`run_migrations` pair.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, base::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .map_err(|e| {
            tracing::error!(err = %e, "failed to connect to database");
            base::format_err_t!(Transient, "connecting to database: {}", e)
        })
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), base::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| base::format_err_t!(Permanent, "running migrations: {}", e))
}
