use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Report, Result};
use futures_util::future::select_all;
use tokio::task::JoinHandle;
use tracing::{info, info_span, instrument::Instrumented, Instrument};

use crate::{cancel_task, metrics::CoreMetrics, settings::NewFromSettings, Settings};

/// A fundamental colony binary which does not make any assumptions about the
/// tools which are used.
#[async_trait]
pub trait BaseAgent: Send + Sync + Debug {
    /// The binary's name
    const AGENT_NAME: &'static str;

    /// The settings object for this binary
    type Settings: NewFromSettings;

    /// Instantiate the binary from the standard settings object
    async fn from_settings(settings: Self::Settings, metrics: Arc<CoreMetrics>) -> Result<Self>
    where
        Self: Sized;

    /// Start running this binary.
    #[allow(clippy::async_yields_async)]
    async fn run(&self) -> Instrumented<JoinHandle<Result<()>>>;

    /// Cooperatively stop background work before process exit. Must not
    /// block indefinitely; a cancel + task-join is sufficient.
    async fn shutdown(&self) {}
}

/// Call this from `main` to fully initialize and run the binary for its
/// entire lifecycle. This initializes the metrics server and tracing as
/// well, and stops the binary cooperatively on ctrl-c.
pub async fn agent_main<A: BaseAgent>() -> Result<()> {
    #[cfg(feature = "color-eyre")]
    color_eyre::install()?;

    let settings = A::Settings::new().map_err(|e| e.into())?;
    let core_settings: &Settings = settings.as_ref();

    let metrics = core_settings.metrics(A::AGENT_NAME)?;
    core_settings.tracing.start_tracing(&metrics)?;
    let agent = A::from_settings(settings, metrics.clone()).await?;
    metrics.run_http_server();

    let run = agent.run().await;
    tokio::select! {
        res = run => res?,
        _ = tokio::signal::ctrl_c() => {
            info!(agent = A::AGENT_NAME, "received ctrl-c, shutting down");
            agent.shutdown().await;
            Ok(())
        }
    }
}

/// Utility to run multiple tasks and shutdown if any one task ends.
#[allow(clippy::unit_arg, unused_must_use)]
pub fn run_all(
    tasks: Vec<Instrumented<JoinHandle<Result<(), Report>>>>,
) -> Instrumented<JoinHandle<Result<()>>> {
    debug_assert!(!tasks.is_empty(), "No tasks submitted");
    let span = info_span!("run_all");
    tokio::spawn(async move {
        let (res, _, remaining) = select_all(tasks).await;

        for task in remaining.into_iter() {
            cancel_task!(task);
        }

        res?
    })
    .instrument(span)
}
