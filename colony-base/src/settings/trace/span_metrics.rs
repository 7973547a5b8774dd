use tokio::time::Instant;
use tracing::{span, Event, Subscriber};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

/// Feeds the tracing stream into prometheus: span lifetimes land in a
/// histogram, events are counted by level so dropped logs and error spikes
/// are queryable.
pub struct TimeSpanLifetime {
    durations: prometheus::HistogramVec,
    events: prometheus::IntCounterVec,
}

impl TimeSpanLifetime {
    /// Constructor.
    pub fn new(metrics: &crate::CoreMetrics) -> Self {
        Self {
            durations: metrics.span_duration(),
            events: metrics.span_events(),
        }
    }
}

struct SpanTiming {
    start: Instant,
}

impl<S> Layer<S> for TimeSpanLifetime
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, _: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        match ctx.span(id) {
            Some(span) => span.extensions_mut().insert(SpanTiming {
                start: Instant::now(),
            }),
            None => unreachable!(),
        }
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = event.metadata().level().as_str().to_ascii_lowercase();
        self.events.with_label_values(&[&level]).inc();
    }

    fn on_close(&self, id: span::Id, ctx: Context<S>) {
        let now = Instant::now();
        match ctx.span(&id) {
            Some(span) => {
                let exts = span.extensions();
                let timing = exts
                    .get::<SpanTiming>()
                    .expect("bug: didn't insert SpanTiming");
                self.durations
                    .with_label_values(&[span.name(), span.metadata().target()])
                    .observe((now - timing.start).as_secs_f64());
            }
            None => unreachable!(),
        }
    }
}
