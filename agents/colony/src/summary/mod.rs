//! The unified query engine: assembles per-service health summaries by
//! merging eBPF, OTLP and host-metric aggregates, then enriches them with
//! profiling hotspots, deployment context and regression indicators.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use eyre::Result;
use time::OffsetDateTime;
use tracing::instrument;

use colony_core::{
    ProfileKind, ServiceStatus, SummaryStore, SystemMetricSummary, UnifiedSummary,
    DEFAULT_TOP_K_HOTSPOTS, MAX_TOP_K_HOTSPOTS,
};

mod deployment;
mod enrich;
mod regression;

#[cfg(test)]
mod tests;

use deployment::resolve_deployment;
use enrich::build_insight;
use regression::compare_hotspots;

const CPU_UTILIZATION_METRIC: &str = "system.cpu.utilization";
const MEMORY_USAGE_METRIC: &str = "system.memory.usage";
const MEMORY_LIMIT_METRIC: &str = "system.memory.limit";

const BYTES_PER_GIB: f64 = (1u64 << 30) as f64;

/// Knobs of the unified query engine.
#[derive(Clone, Debug)]
pub struct SummaryConfig {
    /// Whether profiling enrichment and regression analysis run at all.
    pub enable_profiling: bool,
    /// Hotspots fetched per service, clamped to [`MAX_TOP_K_HOTSPOTS`].
    pub top_k: usize,
    /// CPU windows with fewer samples than this are not enriched.
    pub min_cpu_samples: u64,
    /// Memory windows with fewer allocated bytes than this are not enriched.
    pub min_alloc_bytes: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enable_profiling: true,
            top_k: DEFAULT_TOP_K_HOTSPOTS,
            min_cpu_samples: 50,
            min_alloc_bytes: 1 << 20,
        }
    }
}

/// Per-agent host signal extracted from the system metric summaries.
#[derive(Clone, Debug, Default)]
struct HostStats {
    cpu_max: Option<f64>,
    cpu_avg: Option<f64>,
    memory_usage_gb: Option<f64>,
    memory_limit_gb: Option<f64>,
}

/// Assembles [`UnifiedSummary`] rows for a `(service, start, end)` query.
/// Talks to the store only through the [`SummaryStore`] facade.
pub struct UnifiedQueryEngine {
    store: Arc<dyn SummaryStore>,
    config: SummaryConfig,
}

impl UnifiedQueryEngine {
    /// Engine over the given facade.
    pub fn new(store: Arc<dyn SummaryStore>, config: SummaryConfig) -> Self {
        Self { store, config }
    }

    /// Unified summaries for the window, sorted by service name ascending.
    pub async fn unified_summaries(
        &self,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<Vec<UnifiedSummary>> {
        self.unified_summaries_at(service, start, end, OffsetDateTime::now_utc().unix_timestamp())
            .await
    }

    /// Same as [`Self::unified_summaries`] with an explicit `now`, which
    /// makes the output a pure function of the store contents.
    #[instrument(skip(self))]
    pub async fn unified_summaries_at(
        &self,
        service: Option<&str>,
        start: i64,
        end: i64,
        now: i64,
    ) -> Result<Vec<UnifiedSummary>> {
        // BTreeMap keeps every later pass (and the output) in service-name
        // order.
        let mut summaries: BTreeMap<String, UnifiedSummary> = BTreeMap::new();

        self.seed_from_ebpf(&mut summaries, service, start, end)
            .await?;
        self.merge_otlp(&mut summaries, service, start, end).await?;
        self.merge_host_metrics(&mut summaries, service, start, end)
            .await?;

        if self.config.enable_profiling {
            self.enrich_profiling(&mut summaries, start, end).await?;
        }
        self.attach_deployment_context(&mut summaries, now).await?;
        if self.config.enable_profiling {
            self.attach_regressions(&mut summaries, start, end).await?;
        }

        Ok(summaries.into_values().collect())
    }

    /// Step 1: seed from eBPF HTTP metrics grouped by service.
    async fn seed_from_ebpf(
        &self,
        summaries: &mut BTreeMap<String, UnifiedSummary>,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<()> {
        let rows = self.store.beyla_http_summaries(service, start, end).await?;

        #[derive(Default)]
        struct Acc {
            requests: u64,
            errors: u64,
            latency_sum: f64,
            latency_rows: usize,
        }
        let mut by_service: HashMap<String, Acc> = HashMap::new();
        for row in rows {
            let acc = by_service.entry(row.service.clone()).or_default();
            acc.requests += row.request_count;
            if row.status_code >= 500 {
                acc.errors += row.request_count;
            }
            acc.latency_sum += row.histogram.mean();
            acc.latency_rows += 1;
        }

        for (service_name, acc) in by_service {
            let error_rate = if acc.requests > 0 {
                acc.errors as f64 / acc.requests as f64
            } else {
                0.0
            };
            let mean_latency_ms = if acc.latency_rows > 0 {
                acc.latency_sum / acc.latency_rows as f64
            } else {
                0.0
            };

            let status = if error_rate > 0.05 {
                ServiceStatus::Critical
            } else if error_rate > 0.01 || mean_latency_ms > 1000.0 {
                ServiceStatus::Degraded
            } else {
                ServiceStatus::Healthy
            };

            summaries.insert(
                service_name.clone(),
                UnifiedSummary {
                    service_name,
                    source: "eBPF".into(),
                    status,
                    request_count: acc.requests,
                    error_count: acc.errors,
                    error_rate,
                    mean_latency_ms,
                    ..Default::default()
                },
            );
        }
        Ok(())
    }

    /// Step 2: merge OTLP telemetry summaries.
    async fn merge_otlp(
        &self,
        summaries: &mut BTreeMap<String, UnifiedSummary>,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<()> {
        let rows = self.store.telemetry_summaries(service, start, end).await?;

        #[derive(Default)]
        struct Acc {
            spans: u64,
            errors: u64,
            p95_sum: f64,
            p95_rows: usize,
        }
        let mut by_service: HashMap<String, Acc> = HashMap::new();
        for row in rows {
            let acc = by_service.entry(row.service.clone()).or_default();
            acc.spans += row.total_spans;
            acc.errors += row.error_count;
            acc.p95_sum += row.p95_ms;
            acc.p95_rows += 1;
        }

        for (service_name, acc) in by_service {
            let otlp_latency = if acc.p95_rows > 0 {
                acc.p95_sum / acc.p95_rows as f64
            } else {
                0.0
            };

            match summaries.get_mut(&service_name) {
                Some(summary) => {
                    summary.source = "eBPF+OTLP".into();
                    summary.request_count += acc.spans;
                    summary.error_count += acc.errors;
                    summary.error_rate = if summary.request_count > 0 {
                        summary.error_count as f64 / summary.request_count as f64
                    } else {
                        0.0
                    };
                    // Averaging an eBPF mean with an OTLP p95 is how this
                    // signal has always been defined.
                    summary.mean_latency_ms = (summary.mean_latency_ms + otlp_latency) / 2.0;
                    summary.status = reevaluate_status(summary.error_rate, summary.mean_latency_ms);
                }
                None => {
                    let error_rate = if acc.spans > 0 {
                        acc.errors as f64 / acc.spans as f64
                    } else {
                        0.0
                    };
                    summaries.insert(
                        service_name.clone(),
                        UnifiedSummary {
                            service_name,
                            source: "OTLP".into(),
                            status: reevaluate_status(error_rate, otlp_latency),
                            request_count: acc.spans,
                            error_count: acc.errors,
                            error_rate,
                            mean_latency_ms: otlp_latency,
                            ..Default::default()
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Step 3: merge host system metrics grouped by agent, attach them to
    /// the services registered on each agent, and surface idle services.
    async fn merge_host_metrics(
        &self,
        summaries: &mut BTreeMap<String, UnifiedSummary>,
        service: Option<&str>,
        start: i64,
        end: i64,
    ) -> Result<()> {
        let rows = self.store.system_metric_summaries(start, end).await?;
        let host_stats = host_stats_by_agent(&rows);

        for (service_name, agent_id) in self.store.registered_services().await? {
            if service.map(|s| s != service_name).unwrap_or(false) {
                continue;
            }

            let summary = summaries
                .entry(service_name.clone())
                .or_insert_with(|| UnifiedSummary {
                    service_name: service_name.clone(),
                    source: "none".into(),
                    status: ServiceStatus::Idle,
                    ..Default::default()
                });

            let Some(stats) = host_stats.get(&agent_id) else {
                continue;
            };
            summary.cpu_utilization_max = stats.cpu_max;
            summary.cpu_utilization_avg = stats.cpu_avg;
            summary.memory_usage_gb = stats.memory_usage_gb;
            summary.memory_limit_gb = stats.memory_limit_gb;
            summary.memory_utilization = match (stats.memory_usage_gb, stats.memory_limit_gb) {
                (Some(usage), Some(limit)) if limit > 0.0 => Some(usage / limit),
                _ => None,
            };

            let cpu_hot = stats.cpu_max.map(|v| v > 0.8).unwrap_or(false);
            let memory_hot = summary
                .memory_utilization
                .map(|v| v > 0.85)
                .unwrap_or(false);
            if (cpu_hot || memory_hot)
                && matches!(summary.status, ServiceStatus::Healthy | ServiceStatus::Idle)
            {
                summary.status = ServiceStatus::Degraded;
                if cpu_hot {
                    summary.issues.push(format!(
                        "host cpu saturated: peak {:.0}% on agent {agent_id}",
                        stats.cpu_max.unwrap_or_default() * 100.0
                    ));
                }
                if memory_hot {
                    summary.issues.push(format!(
                        "host memory pressure: {:.0}% of limit on agent {agent_id}",
                        summary.memory_utilization.unwrap_or_default() * 100.0
                    ));
                }
            }
        }
        Ok(())
    }

    /// Step 4: profiling enrichment, gated on per-kind sample floors.
    async fn enrich_profiling(
        &self,
        summaries: &mut BTreeMap<String, UnifiedSummary>,
        start: i64,
        end: i64,
    ) -> Result<()> {
        let top_k = self.config.top_k.min(MAX_TOP_K_HOTSPOTS);
        for (service_name, summary) in summaries.iter_mut() {
            let (cpu_total, cpu_hotspots) = self
                .store
                .top_k_hotspots(ProfileKind::Cpu, service_name, None, start, end, top_k)
                .await?;
            if cpu_total >= self.config.min_cpu_samples && !cpu_hotspots.is_empty() {
                summary.cpu_profile = Some(build_insight(cpu_total, &cpu_hotspots));
            }

            let (alloc_total, memory_hotspots) = self
                .store
                .top_k_hotspots(ProfileKind::Memory, service_name, None, start, end, top_k)
                .await?;
            if alloc_total >= self.config.min_alloc_bytes && !memory_hotspots.is_empty() {
                summary.memory_profile = Some(build_insight(alloc_total, &memory_hotspots));
            }
        }
        Ok(())
    }

    /// Step 5: resolve latest/previous binary metadata.
    async fn attach_deployment_context(
        &self,
        summaries: &mut BTreeMap<String, UnifiedSummary>,
        now: i64,
    ) -> Result<()> {
        for (service_name, summary) in summaries.iter_mut() {
            let versions = self.store.binary_versions(service_name).await?;
            summary.deployment = resolve_deployment(&versions, now);
        }
        Ok(())
    }

    /// Step 6: regression indicators against the previous build's baseline.
    async fn attach_regressions(
        &self,
        summaries: &mut BTreeMap<String, UnifiedSummary>,
        start: i64,
        end: i64,
    ) -> Result<()> {
        let top_k = self.config.top_k.min(MAX_TOP_K_HOTSPOTS);
        for (service_name, summary) in summaries.iter_mut() {
            let Some(deployment) = &summary.deployment else {
                continue;
            };
            let Some(previous_build) = &deployment.previous_build_id else {
                continue;
            };

            let (_, current) = self
                .store
                .top_k_hotspots(
                    ProfileKind::Cpu,
                    service_name,
                    Some(&deployment.build_id),
                    start,
                    end,
                    top_k,
                )
                .await?;
            // The baseline looks at the previous build over its whole life,
            // not just the query window.
            let (_, baseline) = self
                .store
                .top_k_hotspots(ProfileKind::Cpu, service_name, Some(previous_build), 0, now_cap(end), top_k)
                .await?;

            summary.regressions = compare_hotspots("cpu_hotspot", &baseline, &current);
        }
        Ok(())
    }
}

fn now_cap(end: i64) -> i64 {
    end.max(OffsetDateTime::now_utc().unix_timestamp())
}

fn reevaluate_status(error_rate: f64, mean_latency_ms: f64) -> ServiceStatus {
    if error_rate > 0.05 || mean_latency_ms > 2000.0 {
        ServiceStatus::Critical
    } else if error_rate > 0.01 || mean_latency_ms > 1000.0 {
        ServiceStatus::Degraded
    } else {
        ServiceStatus::Healthy
    }
}

fn host_stats_by_agent(rows: &[SystemMetricSummary]) -> HashMap<String, HostStats> {
    #[derive(Default)]
    struct Acc {
        cpu_max: f64,
        cpu_avg_sum: f64,
        cpu_rows: usize,
        memory_usage: Option<(i64, f64)>,
        memory_limit: Option<(i64, f64)>,
    }

    let mut by_agent: HashMap<String, Acc> = HashMap::new();
    for row in rows {
        let acc = by_agent.entry(row.agent_id.clone()).or_default();
        match row.metric_name.as_str() {
            CPU_UTILIZATION_METRIC => {
                acc.cpu_max = acc.cpu_max.max(row.max);
                acc.cpu_avg_sum += row.avg;
                acc.cpu_rows += 1;
            }
            // Latest bucket wins for point-in-time memory signals.
            MEMORY_USAGE_METRIC => {
                if acc.memory_usage.map(|(b, _)| row.bucket_minute > b).unwrap_or(true) {
                    acc.memory_usage = Some((row.bucket_minute, row.avg));
                }
            }
            MEMORY_LIMIT_METRIC => {
                if acc.memory_limit.map(|(b, _)| row.bucket_minute > b).unwrap_or(true) {
                    acc.memory_limit = Some((row.bucket_minute, row.avg));
                }
            }
            _ => {}
        }
    }

    by_agent
        .into_iter()
        .map(|(agent_id, acc)| {
            (
                agent_id,
                HostStats {
                    cpu_max: (acc.cpu_rows > 0).then_some(acc.cpu_max),
                    cpu_avg: (acc.cpu_rows > 0).then(|| acc.cpu_avg_sum / acc.cpu_rows as f64),
                    memory_usage_gb: acc.memory_usage.map(|(_, bytes)| bytes / BYTES_PER_GIB),
                    memory_limit_gb: acc.memory_limit.map(|(_, bytes)| bytes / BYTES_PER_GIB),
                },
            )
        })
        .collect()
}
