use eyre::Result;
use migration::OnConflict;
use sea_orm::{prelude::*, ActiveValue::*, Insert, QueryOrder};
use time::OffsetDateTime;
use tracing::{instrument, trace};

use colony_core::{BinaryVersion, FunctionInfo};

use crate::date_time;
use crate::db::entities::{binary_version, function};
use crate::db::ColonyDb;

impl ColonyDb {
    /// Upsert a service's function list under its binary hash.
    ///
    /// `embedding` and `last_seen` are never touched on conflict: the
    /// embedding is deterministic-given-input and write-once, and rewriting
    /// `last_seen` would churn its index.
    #[instrument(skip(self, functions), fields(count = functions.len()))]
    pub async fn upsert_functions(
        &self,
        service_name: &str,
        binary_hash: &str,
        functions: &[FunctionInfo],
    ) -> Result<()> {
        if functions.is_empty() {
            return Ok(());
        }

        let models = functions
            .iter()
            .map(|func| {
                Ok(function::ActiveModel {
                    id: NotSet,
                    service_name: Unchanged(service_name.into()),
                    function_name: Unchanged(func.name.clone()),
                    package: Set(func.package.clone()),
                    file_path: Set(func.file_path.clone()),
                    line: Set(func.line as i32),
                    offset: Set(func.offset as i64),
                    has_dwarf: Set(func.has_dwarf),
                    binary_hash: Unchanged(binary_hash.into()),
                    embedding: Set(func
                        .embedding
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?),
                    last_seen: Set(date_time::now()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        trace!(service_name, binary_hash, "writing function metadata");
        Insert::many(models)
            .on_conflict(
                OnConflict::columns([
                    function::Column::ServiceName,
                    function::Column::FunctionName,
                    function::Column::BinaryHash,
                ])
                .update_columns([
                    function::Column::Package,
                    function::Column::FilePath,
                    function::Column::Line,
                    function::Column::Offset,
                    function::Column::HasDwarf,
                ])
                .to_owned(),
            )
            .exec(self.conn())
            .await?;
        Ok(())
    }

    /// Number of function rows stored for `(service, binary)`.
    #[instrument(skip(self))]
    pub async fn function_count(&self, service_name: &str, binary_hash: &str) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        Ok(function::Entity::find()
            .filter(function::Column::ServiceName.eq(service_name))
            .filter(function::Column::BinaryHash.eq(binary_hash))
            .count(self.conn())
            .await?)
    }

    /// Record that a build of `service` exists. First sight wins; replays
    /// keep the original `first_seen`.
    #[instrument(skip(self))]
    pub async fn record_binary_version(&self, service: &str, build_id: &str) -> Result<()> {
        let known = binary_version::Entity::find()
            .filter(binary_version::Column::Service.eq(service))
            .filter(binary_version::Column::BuildId.eq(build_id))
            .one(self.conn())
            .await?;
        if known.is_some() {
            return Ok(());
        }

        let model = binary_version::ActiveModel {
            id: NotSet,
            service: Set(service.into()),
            build_id: Set(build_id.into()),
            first_seen: Set(OffsetDateTime::now_utc().unix_timestamp()),
        };
        model.insert(self.conn()).await?;
        Ok(())
    }

    /// Known binary versions of a service, newest first.
    #[instrument(skip(self))]
    pub async fn binary_versions_for(&self, service: &str) -> Result<Vec<BinaryVersion>> {
        Ok(binary_version::Entity::find()
            .filter(binary_version::Column::Service.eq(service))
            .order_by_desc(binary_version::Column::FirstSeen)
            .order_by_desc(binary_version::Column::Id)
            .all(self.conn())
            .await?
            .into_iter()
            .map(|model| BinaryVersion {
                service: model.service,
                build_id: model.build_id,
                first_seen: model.first_seen,
            })
            .collect())
    }
}
