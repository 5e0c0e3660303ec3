use crate::error::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

pub mod listener;
pub mod queries;
pub mod store;

pub use listener::{PgAlertSource, ALERT_NOTIFY_CHANNEL};
pub use store::PgStore;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Applies the embedded migrations under `migrations/`.
pub async fn migrate(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Persistence(sqlx::Error::Migrate(Box::new(e))))?;
    Ok(())
}
