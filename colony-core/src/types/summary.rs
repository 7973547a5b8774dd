use serde::{Deserialize, Serialize};

/// Default number of hotspots fetched per service during enrichment.
pub const DEFAULT_TOP_K_HOTSPOTS: usize = 5;

/// Upper bound on hotspots fetched per service.
pub const MAX_TOP_K_HOTSPOTS: usize = 20;

/// Health classification of a service in a unified summary.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// No signal suggesting trouble.
    #[default]
    Healthy,
    /// Elevated errors, latency, or host pressure.
    Degraded,
    /// Error rate above the critical threshold.
    Critical,
    /// Registered but no traffic observed in the window.
    Idle,
}

/// A ranked profiling hotspot: one call stack and its share of samples.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    /// 1-based rank by sample share.
    pub rank: u32,
    /// Call stack, leaf first as stored.
    pub frames: Vec<String>,
    /// Share of total samples, 0..=100.
    pub percentage: f64,
    /// Samples (or bytes, for memory hotspots) behind the stack.
    pub sample_count: u64,
}

/// Per-function sample attribution, deduplicated by leaf function name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionSamples {
    /// Leaf function name, cleaned.
    pub function: String,
    /// Samples attributed to the function.
    pub samples: u64,
}

/// Profiling enrichment attached to a unified summary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilingInsight {
    /// Total samples (cpu) or bytes (memory) in the window.
    pub total_samples: u64,
    /// Hottest stack, reversed to caller -> callee order, cleaned.
    pub hot_path: Vec<String>,
    /// Samples per leaf function, hottest first.
    pub samples_by_function: Vec<FunctionSamples>,
}

/// One tracked binary version of a service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryVersion {
    /// Owning service.
    pub service: String,
    /// Content identifier of the binary.
    pub build_id: String,
    /// First time the colony saw the build, unix seconds.
    pub first_seen: i64,
}

/// Deployment context resolved for a service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentContext {
    /// Latest observed build.
    pub build_id: String,
    /// First time the latest build was seen, unix seconds.
    pub first_seen: i64,
    /// Human-readable age of the latest build ("42s", "5m", "3h", "3h12m").
    pub version_age: String,
    /// Previous build, when one is known.
    pub previous_build_id: Option<String>,
}

/// One regression indicator comparing the current build against the
/// previous build's hotspot baseline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionIndicator {
    /// Indicator type, e.g. `cpu_hotspot`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description.
    pub message: String,
    /// Share of samples on the previous build, 0..=100.
    pub baseline_pct: f64,
    /// Share of samples on the current build, 0..=100.
    pub current_pct: f64,
    /// `current_pct - baseline_pct`.
    pub delta: f64,
}

/// Fleet-wide health summary for one service, assembled by the unified
/// query engine from eBPF, OTLP, host-metric and profiling aggregates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSummary {
    /// Service name.
    pub service_name: String,
    /// Which signals contributed: `eBPF`, `OTLP`, `eBPF+OTLP`, or `none`.
    pub source: String,
    /// Health classification.
    pub status: ServiceStatus,
    /// Requests observed in the window.
    pub request_count: u64,
    /// Errors observed in the window.
    pub error_count: u64,
    /// `error_count / request_count`, 0 when no requests.
    pub error_rate: f64,
    /// Mean latency signal, milliseconds.
    pub mean_latency_ms: f64,
    /// Peak host cpu utilization, 0..=1, when host metrics were merged.
    pub cpu_utilization_max: Option<f64>,
    /// Mean host cpu utilization, 0..=1.
    pub cpu_utilization_avg: Option<f64>,
    /// Host memory usage, GiB.
    pub memory_usage_gb: Option<f64>,
    /// Host memory limit, GiB.
    pub memory_limit_gb: Option<f64>,
    /// `usage / limit`, 0..=1.
    pub memory_utilization: Option<f64>,
    /// Human-readable issues discovered during assembly.
    pub issues: Vec<String>,
    /// CPU profiling enrichment, when available and enabled.
    pub cpu_profile: Option<ProfilingInsight>,
    /// Memory profiling enrichment, when available and enabled.
    pub memory_profile: Option<ProfilingInsight>,
    /// Deployment context, when binary metadata is known.
    pub deployment: Option<DeploymentContext>,
    /// Regression indicators against the previous build.
    pub regressions: Vec<RegressionIndicator>,
}
