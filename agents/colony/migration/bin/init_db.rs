//! Initialize the colony analytic store schema. Safe to run against a
//! populated store.

use migration::{Migrator, MigratorTrait};
use sea_orm::Database;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), sea_orm::DbErr> {
    tracing_subscriber::fmt::init();

    let url = std::env::var("COLONY_DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://colony.db?mode=rwc".into());
    tracing::info!(%url, "running migrations");

    let db = Database::connect(&url).await?;
    Migrator::up(&db, None).await?;

    tracing::info!("schema is up to date");
    Ok(())
}
