use std::collections::HashMap;

use eyre::Result;
use migration::OnConflict;
use sea_orm::{prelude::*, ActiveValue::*, Insert};
use tracing::{instrument, trace};

use colony_core::{Hotspot, MemoryProfileSummary, ProfileKind, StackFrame};

use crate::date_time;
use crate::db::entities::{cpu_profile_summary, memory_profile_summary, stack_frame};
use crate::db::ColonyDb;

impl ColonyDb {
    /// Intern one stack frame, returning its stable id. The store is the
    /// source of truth; the in-process interner cache sits in front of this.
    #[instrument(skip(self, frame), fields(function = %frame.function))]
    pub async fn intern_frame(&self, frame: &StackFrame) -> Result<i64> {
        let existing = stack_frame::Entity::find()
            .filter(stack_frame::Column::Function.eq(&*frame.function))
            .filter(stack_frame::Column::Module.eq(&*frame.module))
            .filter(stack_frame::Column::File.eq(&*frame.file))
            .filter(stack_frame::Column::Line.eq(frame.line as i32))
            .one(self.conn())
            .await?;
        if let Some(row) = existing {
            return Ok(row.id);
        }

        let model = stack_frame::ActiveModel {
            id: NotSet,
            function: Set(frame.function.clone()),
            module: Set(frame.module.clone()),
            file: Set(frame.file.clone()),
            line: Set(frame.line as i32),
        };
        let inserted = model.insert(self.conn()).await?;
        Ok(inserted.id)
    }

    /// Store one batch of memory profile summaries; replays overwrite the
    /// same composite-key rows.
    #[instrument(skip_all, fields(count = summaries.len()))]
    pub async fn store_memory_profile_summaries(
        &self,
        summaries: &[MemoryProfileSummary],
    ) -> Result<()> {
        if summaries.is_empty() {
            return Ok(());
        }

        let models = summaries
            .iter()
            .map(|summary| {
                Ok(memory_profile_summary::ActiveModel {
                    id: NotSet,
                    agent_id: Unchanged(summary.agent_id.clone()),
                    bucket_minute: Unchanged(summary.bucket_minute),
                    service: Unchanged(summary.service.clone()),
                    build_id: Unchanged(summary.build_id.clone()),
                    stack_hash: Unchanged(summary.stack_hash.clone()),
                    frame_ids: Set(serde_json::to_string(&summary.frame_ids)?),
                    alloc_bytes: Set(summary.alloc_bytes as i64),
                    alloc_objects: Set(summary.alloc_objects as i64),
                    time_created: Set(date_time::now()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        trace!("writing memory profile summaries");
        Insert::many(models)
            .on_conflict(
                OnConflict::columns([
                    memory_profile_summary::Column::AgentId,
                    memory_profile_summary::Column::BucketMinute,
                    memory_profile_summary::Column::Service,
                    memory_profile_summary::Column::BuildId,
                    memory_profile_summary::Column::StackHash,
                ])
                .update_columns([
                    memory_profile_summary::Column::FrameIds,
                    memory_profile_summary::Column::AllocBytes,
                    memory_profile_summary::Column::AllocObjects,
                    memory_profile_summary::Column::TimeCreated,
                ])
                .to_owned(),
            )
            .exec(self.conn())
            .await?;
        Ok(())
    }

    /// Top-k hottest stacks for a service in `[start, end]`, plus the
    /// window's total (samples for cpu, bytes for memory). Stacks are
    /// grouped across buckets by stack hash.
    #[instrument(skip(self))]
    pub async fn top_k_hotspots_for(
        &self,
        kind: ProfileKind,
        service: &str,
        build_id: Option<&str>,
        start: i64,
        end: i64,
        top_k: usize,
    ) -> Result<(u64, Vec<Hotspot>)> {
        // (stack_hash -> (value, frame_ids)); value is bytes or samples.
        let mut stacks: HashMap<String, (u64, Vec<i64>)> = HashMap::new();
        let mut total: u64 = 0;

        match kind {
            ProfileKind::Memory => {
                let mut query = memory_profile_summary::Entity::find()
                    .filter(memory_profile_summary::Column::Service.eq(service))
                    .filter(memory_profile_summary::Column::BucketMinute.gte(start))
                    .filter(memory_profile_summary::Column::BucketMinute.lte(end));
                if let Some(build_id) = build_id {
                    query = query.filter(memory_profile_summary::Column::BuildId.eq(build_id));
                }
                for row in query.all(self.conn()).await? {
                    let value = row.alloc_bytes as u64;
                    total += value;
                    let entry = stacks.entry(row.stack_hash).or_insert_with(|| {
                        (0, serde_json::from_str(&row.frame_ids).unwrap_or_default())
                    });
                    entry.0 += value;
                }
            }
            ProfileKind::Cpu => {
                let mut query = cpu_profile_summary::Entity::find()
                    .filter(cpu_profile_summary::Column::Service.eq(service))
                    .filter(cpu_profile_summary::Column::BucketMinute.gte(start))
                    .filter(cpu_profile_summary::Column::BucketMinute.lte(end));
                if let Some(build_id) = build_id {
                    query = query.filter(cpu_profile_summary::Column::BuildId.eq(build_id));
                }
                for row in query.all(self.conn()).await? {
                    let value = row.sample_count as u64;
                    total += value;
                    let entry = stacks.entry(row.stack_hash).or_insert_with(|| {
                        (0, serde_json::from_str(&row.frame_ids).unwrap_or_default())
                    });
                    entry.0 += value;
                }
            }
        }

        let mut ranked: Vec<(u64, Vec<i64>)> = stacks.into_values().collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.truncate(top_k);

        let frame_names = self
            .resolve_frames(ranked.iter().flat_map(|(_, ids)| ids.iter().copied()))
            .await?;

        let hotspots = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (value, frame_ids))| Hotspot {
                rank: i as u32 + 1,
                frames: frame_ids
                    .iter()
                    .map(|id| {
                        frame_names
                            .get(id)
                            .cloned()
                            .unwrap_or_else(|| format!("frame#{id}"))
                    })
                    .collect(),
                percentage: if total == 0 {
                    0.0
                } else {
                    value as f64 / total as f64 * 100.0
                },
                sample_count: value,
            })
            .collect();

        Ok((total, hotspots))
    }

    async fn resolve_frames(
        &self,
        ids: impl Iterator<Item = i64>,
    ) -> Result<HashMap<i64, String>> {
        let ids: Vec<i64> = {
            let mut v: Vec<i64> = ids.collect();
            v.sort_unstable();
            v.dedup();
            v
        };
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        Ok(stack_frame::Entity::find()
            .filter(stack_frame::Column::Id.is_in(ids))
            .all(self.conn())
            .await?
            .into_iter()
            .map(|row| (row.id, row.function))
            .collect())
    }
}
