use eyre::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DbConn};
use tracing::instrument;

pub(crate) mod entities;

#[cfg(test)]
mod tests;

// These modules implement additional functionality for the ColonyDb
mod beyla;
mod checkpoint;
mod function;
mod profile;
mod service;
mod summary_store;
mod system_metric;
mod telemetry;

pub use beyla::*;
pub use checkpoint::*;
pub use function::*;
pub use profile::*;
pub use service::*;
pub use telemetry::*;

/// Database interface to the colony analytic store. Focused on bulk writes
/// from the pollers plus the narrow read facade the query engine needs.
#[derive(Clone, Debug)]
pub struct ColonyDb(DbConn);

impl ColonyDb {
    /// Connect to the store and bring the schema up to date. Migration is
    /// idempotent; re-opening a populated store does not destroy rows.
    #[instrument]
    pub async fn connect(url: &str) -> Result<Self> {
        let db = Database::connect(url).await?;
        Migrator::up(&db, None).await?;
        Ok(Self(db))
    }

    pub(crate) fn conn(&self) -> &DbConn {
        &self.0
    }
}
