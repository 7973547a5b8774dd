use eyre::Result;
use migration::OnConflict;
use sea_orm::{prelude::*, ActiveValue::*, Insert, QueryOrder, QuerySelect};
use tracing::{instrument, trace};

use colony_core::ServiceInfo;

use crate::date_time;
use crate::db::entities::service;
use crate::db::ColonyDb;

impl ColonyDb {
    /// Reconcile the service catalogue reported by one agent: every listed
    /// service is upserted with status `active`.
    #[instrument(skip(self, services), fields(count = services.len()))]
    pub async fn upsert_services(&self, agent_id: &str, services: &[ServiceInfo]) -> Result<()> {
        if services.is_empty() {
            return Ok(());
        }

        let models = services
            .iter()
            .map(|svc| service::ActiveModel {
                id: NotSet,
                name: Unchanged(svc.name.clone()),
                agent_id: Unchanged(agent_id.into()),
                binary_hash: Set(svc.binary_hash.clone()),
                language: Set(svc.language.clone()),
                status: Set("active".into()),
                time_updated: Set(date_time::now()),
            })
            .collect::<Vec<_>>();

        trace!(agent_id, "writing service catalogue");
        Insert::many(models)
            .on_conflict(
                OnConflict::columns([service::Column::Name, service::Column::AgentId])
                    .update_columns([
                        service::Column::BinaryHash,
                        service::Column::Language,
                        service::Column::Status,
                        service::Column::TimeUpdated,
                    ])
                    .to_owned(),
            )
            .exec(self.conn())
            .await?;
        Ok(())
    }

    /// Distinct names of all registered services, ascending.
    #[instrument(skip(self))]
    pub async fn registered_service_names(&self) -> Result<Vec<String>> {
        #[derive(Copy, Clone, Debug, EnumIter, DeriveColumn)]
        enum QueryAs {
            Name,
        }

        Ok(service::Entity::find()
            .select_only()
            .column_as(service::Column::Name, QueryAs::Name)
            .distinct()
            .order_by_asc(service::Column::Name)
            .into_values::<String, QueryAs>()
            .all(self.conn())
            .await?)
    }

    /// All registered services as `(service_name, agent_id)` pairs,
    /// ascending by name.
    #[instrument(skip(self))]
    pub async fn registered_service_agents(&self) -> Result<Vec<(String, String)>> {
        Ok(service::Entity::find()
            .order_by_asc(service::Column::Name)
            .order_by_asc(service::Column::AgentId)
            .all(self.conn())
            .await?
            .into_iter()
            .map(|model| (model.name, model.agent_id))
            .collect())
    }
}
