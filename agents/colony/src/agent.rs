use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::WrapErr;
use tokio::task::JoinHandle;
use tracing::instrument::Instrumented;
use tracing::{info, info_span, Instrument};

use colony_base::{
    run_all, AgentRegistry, BaseAgent, CoreMetrics, HttpAgentConnector, Poller, PollerHost,
    PollerSyncMetrics,
};
use colony_core::AgentConnector;

use crate::aggregation::FrameInterner;
use crate::db::ColonyDb;
use crate::pollers::{
    BeylaPoller, FunctionPoller, MemoryProfilePoller, ServicePoller, SystemMetricsPoller,
    TelemetryPoller,
};
use crate::server::ColonyApi;
use crate::settings::ColonySettings;
use crate::summary::{SummaryConfig, UnifiedQueryEngine};

/// The colony coordinator: registry, the poller hosts, the analytic
/// store and the query API, wired together from settings.
pub struct Colony {
    db: ColonyDb,
    metrics: Arc<CoreMetrics>,
    registry: Arc<AgentRegistry>,
    hosts: Vec<Arc<PollerHost>>,
    api: ColonyApi,
    api_port: Option<u16>,
}

impl std::fmt::Debug for Colony {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Colony {{ pollers: {}, api_port: {:?} }}",
            self.hosts.len(),
            self.api_port
        )
    }
}

#[async_trait]
impl BaseAgent for Colony {
    const AGENT_NAME: &'static str = "colony";
    type Settings = ColonySettings;

    async fn from_settings(
        settings: Self::Settings,
        metrics: Arc<CoreMetrics>,
    ) -> eyre::Result<Self>
    where
        Self: Sized,
    {
        let db = ColonyDb::connect(&settings.db)
            .await
            .wrap_err("opening the analytic store")?;

        let registry = Arc::new(AgentRegistry::new());
        let connector: Arc<dyn AgentConnector> =
            Arc::new(HttpAgentConnector::new(settings.agent_rpc_port()?));
        let sync_metrics = PollerSyncMetrics::new(&metrics);
        let interner = Arc::new(FrameInterner::new(db.clone()));

        let poll_interval = Duration::from_secs(settings.pollers.interval_secs()?);
        let cleanup_interval = Duration::from_secs(settings.pollers.cleanup_interval_secs()?);
        let host = |poller: Arc<dyn Poller>| {
            Arc::new(PollerHost::new(
                poller,
                poll_interval,
                cleanup_interval,
                metrics.clone(),
                sync_metrics.clone(),
            ))
        };

        let hosts = vec![
            host(Arc::new(ServicePoller::new(
                db.clone(),
                registry.clone(),
                sync_metrics.clone(),
                metrics.registered_agents(),
            ))),
            host(Arc::new(TelemetryPoller::new(
                db.clone(),
                registry.clone(),
                connector.clone(),
                sync_metrics.clone(),
            ))),
            host(Arc::new(BeylaPoller::new(
                db.clone(),
                registry.clone(),
                connector.clone(),
                sync_metrics.clone(),
            ))),
            host(Arc::new(SystemMetricsPoller::new(
                db.clone(),
                registry.clone(),
                connector.clone(),
                sync_metrics.clone(),
            ))),
            host(Arc::new(MemoryProfilePoller::new(
                db.clone(),
                registry.clone(),
                connector.clone(),
                interner,
                sync_metrics.clone(),
            ))),
            host(Arc::new(FunctionPoller::new(
                db.clone(),
                registry.clone(),
                connector,
                sync_metrics.clone(),
            ))),
        ];

        let engine = Arc::new(UnifiedQueryEngine::new(
            Arc::new(db.clone()),
            SummaryConfig::default(),
        ));
        let api = ColonyApi::new(
            settings.colony_id().to_owned(),
            registry.clone(),
            engine,
        );

        Ok(Self {
            db,
            metrics,
            registry,
            hosts,
            api,
            api_port: settings.api_port()?,
        })
    }

    #[allow(clippy::async_yields_async)]
    async fn run(&self) -> Instrumented<JoinHandle<eyre::Result<()>>> {
        for host in &self.hosts {
            host.start().await;
        }
        info!(pollers = self.hosts.len(), "colony pollers running");

        let mut tasks = Vec::new();
        if let Some(port) = self.api_port {
            let api_task = self.api.serve(port);
            tasks.push(
                tokio::spawn(async move { api_task.await.map_err(eyre::Report::from) })
                    .instrument(info_span!("colony_api_watchdog")),
            );
        } else {
            // Nothing else to watch; park until cancelled.
            tasks.push(
                tokio::spawn(async {
                    std::future::pending::<()>().await;
                    Ok::<(), eyre::Report>(())
                })
                .instrument(info_span!("colony_idle")),
            );
        }

        run_all(tasks)
    }

    async fn shutdown(&self) {
        for host in &self.hosts {
            host.stop().await;
        }
        info!("colony pollers stopped");
    }
}

impl Colony {
    /// The agent registry, for the registration path.
    pub fn registry(&self) -> Arc<AgentRegistry> {
        self.registry.clone()
    }

    /// Handle to the analytic store.
    pub fn db(&self) -> ColonyDb {
        self.db.clone()
    }

    /// Handle to the metrics registry.
    pub fn metrics(&self) -> Arc<CoreMetrics> {
        self.metrics.clone()
    }
}
