use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use eyre::Result;
use futures::FutureExt;
use time::OffsetDateTime;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use colony_core::AgentEntry;

use crate::{AgentRegistry, CoreMetrics};

mod gaps;
pub use gaps::detect_gaps;

mod metrics;
pub use metrics::PollerSyncMetrics;

/// Outcome of one poll cycle, summarised in the host's cycle log line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Agents visited successfully.
    pub agents_queried: usize,
    /// Agents skipped after an error.
    pub agents_failed: usize,
    /// Records pulled and stored across all visited agents.
    pub records: u64,
}

/// One stateful poller: a poll hook driven on an interval and a cleanup
/// hook driven about hourly. The host owns the only reference and drives
/// both; implementations never spawn their own loops.
#[async_trait]
pub trait Poller: Send + Sync + 'static {
    /// Name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Run one poll cycle over all pollable agents. Per-agent errors must be
    /// handled inside; only the first storage error is returned so the
    /// host's log line carries it.
    async fn poll_once(&self) -> Result<CycleSummary>;

    /// Periodic housekeeping (gap recovery, retention). Default no-op.
    async fn run_cleanup(&self) -> Result<()> {
        Ok(())
    }
}

struct RunningTasks {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// Drives a [`Poller`]: runs `poll_once` immediately and then on every
/// interval tick, runs `run_cleanup` on its own slower interval, recovers
/// from panics in either hook, and stops cooperatively.
///
/// Start and stop are idempotent; the lifecycle is guarded by a mutex.
pub struct PollerHost {
    poller: Arc<dyn Poller>,
    poll_interval: Duration,
    cleanup_interval: Duration,
    metrics: Arc<CoreMetrics>,
    sync_metrics: PollerSyncMetrics,
    state: Mutex<Option<RunningTasks>>,
}

impl PollerHost {
    /// Create a host for the given poller. Nothing runs until `start`.
    pub fn new(
        poller: Arc<dyn Poller>,
        poll_interval: Duration,
        cleanup_interval: Duration,
        metrics: Arc<CoreMetrics>,
        sync_metrics: PollerSyncMetrics,
    ) -> Self {
        Self {
            poller,
            poll_interval,
            cleanup_interval,
            metrics,
            sync_metrics,
            state: Mutex::new(None),
        }
    }

    /// Name of the hosted poller.
    pub fn name(&self) -> &'static str {
        self.poller.name()
    }

    /// Spawn the poll and cleanup loops. A second call while running is a
    /// no-op.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return;
        }

        let (shutdown, _) = watch::channel(false);

        let poll_task = tokio::spawn(
            poll_loop(
                self.poller.clone(),
                self.poll_interval,
                self.metrics.clone(),
                self.sync_metrics.clone(),
                shutdown.subscribe(),
            )
            .instrument(info_span!("poll_loop", poller = self.poller.name())),
        );
        let cleanup_task = tokio::spawn(
            cleanup_loop(
                self.poller.clone(),
                self.cleanup_interval,
                shutdown.subscribe(),
            )
            .instrument(info_span!("cleanup_loop", poller = self.poller.name())),
        );

        *state = Some(RunningTasks {
            shutdown,
            tasks: vec![poll_task, cleanup_task],
        });
        info!(poller = self.poller.name(), "poller started");
    }

    /// Signal both loops to stop and join them. In-flight work is dropped at
    /// its next suspension point; no checkpoint is advanced for a cancelled
    /// agent. A second call while stopped is a no-op.
    pub async fn stop(&self) {
        let Some(running) = self.state.lock().await.take() else {
            return;
        };
        let _ = running.shutdown.send(true);
        for task in running.tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(poller = self.poller.name(), error = %e, "poller task join failed");
                }
            }
        }
        info!(poller = self.poller.name(), "poller stopped");
    }
}

async fn poll_loop(
    poller: Arc<dyn Poller>,
    interval: Duration,
    metrics: Arc<CoreMetrics>,
    sync_metrics: PollerSyncMetrics,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        // First tick completes immediately, so the first cycle runs on
        // start. A cycle that overruns the interval never overlaps the next
        // one; the next tick just fires immediately after.
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let started = Instant::now();
        let hook = AssertUnwindSafe(poller.poll_once()).catch_unwind();
        let outcome = tokio::select! {
            _ = shutdown.changed() => break,
            outcome = hook => outcome,
        };
        let elapsed = started.elapsed();
        sync_metrics
            .cycle_duration
            .with_label_values(&[poller.name()])
            .observe(elapsed.as_secs_f64());

        match outcome {
            Ok(Ok(summary)) => {
                metrics
                    .poll_cycles()
                    .with_label_values(&[poller.name(), "ok"])
                    .inc();
                info!(
                    agents_queried = summary.agents_queried,
                    agents_failed = summary.agents_failed,
                    records = summary.records,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "completed poll cycle"
                );
            }
            Ok(Err(report)) => {
                metrics
                    .poll_cycles()
                    .with_label_values(&[poller.name(), "error"])
                    .inc();
                warn!(error = ?report, "poll cycle failed");
            }
            Err(panic) => {
                metrics
                    .poll_cycles()
                    .with_label_values(&[poller.name(), "panic"])
                    .inc();
                error!(payload = panic_message(&panic), "poll cycle panicked");
            }
        }
    }
}

async fn cleanup_loop(
    poller: Arc<dyn Poller>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the immediate first tick; there is nothing to clean up yet.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let hook = AssertUnwindSafe(poller.run_cleanup()).catch_unwind();
        let outcome = tokio::select! {
            _ = shutdown.changed() => break,
            outcome = hook => outcome,
        };
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(report)) => warn!(error = ?report, "cleanup failed"),
            Err(panic) => error!(payload = panic_message(&panic), "cleanup panicked"),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "<non-string payload>"
    }
}

/// Visit every pollable (healthy or degraded) agent in the registry,
/// sequentially. Visitor errors are logged with the agent id and counted,
/// never fatal to the cycle. Returns `(success_count, error_count)`.
pub async fn for_each_healthy_agent<F, Fut>(registry: &AgentRegistry, mut visit: F) -> (usize, usize)
where
    F: FnMut(AgentEntry) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let now = OffsetDateTime::now_utc();
    let mut success = 0;
    let mut failed = 0;
    for agent in registry.list_all() {
        if !agent.status(now).is_pollable() {
            continue;
        }
        let agent_id = agent.agent_id.clone();
        match visit(agent).await {
            Ok(()) => success += 1,
            Err(report) => {
                warn!(agent_id = %agent_id, error = ?report, "agent visit failed");
                failed += 1;
            }
        }
    }
    (success, failed)
}

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingPoller {
        polls: AtomicUsize,
        cleanups: AtomicUsize,
        panic_on_first: bool,
    }

    #[async_trait]
    impl Poller for CountingPoller {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn poll_once(&self) -> Result<CycleSummary> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_first && n == 0 {
                panic!("first cycle goes bad");
            }
            Ok(CycleSummary::default())
        }

        async fn run_cleanup(&self) -> Result<()> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn host(poller: Arc<CountingPoller>) -> PollerHost {
        let metrics = Arc::new(
            CoreMetrics::new("test", None, prometheus::Registry::new())
                .expect("could not make metrics"),
        );
        let sync_metrics = PollerSyncMetrics::new(&metrics);
        PollerHost::new(
            poller,
            Duration::from_millis(20),
            Duration::from_secs(3600),
            metrics,
            sync_metrics,
        )
    }

    #[tokio::test]
    async fn polls_immediately_and_on_interval() {
        let poller = Arc::new(CountingPoller {
            polls: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            panic_on_first: false,
        });
        let host = host(poller.clone());

        host.start().await;
        tokio::time::sleep(Duration::from_millis(70)).await;
        host.stop().await;

        let polls = poller.polls.load(Ordering::SeqCst);
        assert!(polls >= 2, "expected >=2 polls, got {polls}");
    }

    #[tokio::test]
    async fn survives_a_panicking_cycle() {
        let poller = Arc::new(CountingPoller {
            polls: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            panic_on_first: true,
        });
        let host = host(poller.clone());

        host.start().await;
        tokio::time::sleep(Duration::from_millis(70)).await;
        host.stop().await;

        // The panicking first cycle did not kill the loop.
        assert!(poller.polls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let poller = Arc::new(CountingPoller {
            polls: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            panic_on_first: false,
        });
        let host = host(poller.clone());

        host.start().await;
        host.start().await;
        host.stop().await;
        host.stop().await;

        let after_stop = poller.polls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(poller.polls.load(Ordering::SeqCst), after_stop);
    }
}
