//! Observability collaborators used by the task registry.
//!
//! The registry reports each task execution to three injected collaborators:
//! a [`Logger`], a [`Metrics`] sink and a [`Tracer`]. None of them may panic;
//! an implementation that talks to a remote backend must swallow its own
//! failures.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use log::Level;

use crate::errors::TaskclockError;

/// Key/value pairs attached to log lines and spans.
pub type Meta<'a> = &'a [(&'a str, String)];

/// Structured log sink.
pub trait Logger: Send + Sync {
    fn log(&self, message: &str, level: Level, meta: Meta<'_>);
}

/// Counter and histogram sink.
pub trait Metrics: Send + Sync {
    fn inc(&self, name: &str);
    fn observe(&self, name: &str, value: f64);
}

/// An open span around one task execution.
pub trait Span: Send {
    fn set_attr(&mut self, key: &str, value: &str);
    fn record_error(&mut self, err: &TaskclockError);
    fn end(self: Box<Self>);
}

/// Span factory.
pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &str, attrs: Meta<'_>) -> Box<dyn Span>;
}

fn render_meta(meta: Meta<'_>) -> String {
    meta.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Forwards to the `log` facade under the `taskclock::task` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn log(&self, message: &str, level: Level, meta: Meta<'_>) {
        if meta.is_empty() {
            log::log!(target: "taskclock::task", level, "{}", message);
        } else {
            log::log!(target: "taskclock::task", level, "{} {}", message, render_meta(meta));
        }
    }
}

/// Discards every metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn inc(&self, _name: &str) {}
    fn observe(&self, _name: &str, _value: f64) {}
}

/// Keeps counters and raw observations in memory.
///
/// # Examples
///
/// ```
/// use taskclock::{InMemoryMetrics, Metrics};
///
/// let metrics = InMemoryMetrics::new();
/// metrics.inc("task.runs");
/// metrics.observe("task.duration_ms", 12.5);
/// assert_eq!(metrics.counter("task.runs"), 1);
/// assert_eq!(metrics.observations("task.duration_ms"), vec![12.5]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<HashMap<String, u64>>,
    histograms: Mutex<HashMap<String, Vec<f64>>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.get(name).copied().unwrap_or(0)
    }

    pub fn observations(&self, name: &str) -> Vec<f64> {
        let histograms = self.histograms.lock().unwrap_or_else(|e| e.into_inner());
        histograms.get(name).cloned().unwrap_or_default()
    }

    /// All counters, sorted by name.
    pub fn counters(&self) -> Vec<(String, u64)> {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<_> = counters.iter().map(|(k, v)| (k.clone(), *v)).collect();
        all.sort();
        all
    }
}

impl Metrics for InMemoryMetrics {
    fn inc(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry(name.to_string()).or_insert(0) += 1;
    }

    fn observe(&self, name: &str, value: f64) {
        let mut histograms = self.histograms.lock().unwrap_or_else(|e| e.into_inner());
        histograms.entry(name.to_string()).or_default().push(value);
    }
}

/// Produces spans that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

struct NoopSpan;

impl Span for NoopSpan {
    fn set_attr(&mut self, _key: &str, _value: &str) {}
    fn record_error(&mut self, _err: &TaskclockError) {}
    fn end(self: Box<Self>) {}
}

impl Tracer for NoopTracer {
    fn start_span(&self, _name: &str, _attrs: Meta<'_>) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}

/// Backs spans with `tracing` spans; attributes and errors become events
/// inside the span.
#[cfg(feature = "tracing-integration")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

#[cfg(feature = "tracing-integration")]
struct TracingSpan {
    span: tracing::Span,
}

#[cfg(feature = "tracing-integration")]
impl Span for TracingSpan {
    fn set_attr(&mut self, key: &str, value: &str) {
        tracing::debug!(parent: &self.span, attr_key = key, attr_value = value, "span attribute");
    }

    fn record_error(&mut self, err: &TaskclockError) {
        tracing::error!(parent: &self.span, error = %err, "task error");
    }

    fn end(self: Box<Self>) {
        tracing::trace!(parent: &self.span, "span end");
    }
}

#[cfg(feature = "tracing-integration")]
impl Tracer for TracingTracer {
    fn start_span(&self, name: &str, attrs: Meta<'_>) -> Box<dyn Span> {
        let span = tracing::info_span!("task", span_name = name, attrs = %render_meta(attrs));
        Box::new(TracingSpan { span })
    }
}

/// The three collaborators bundled together.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use taskclock::{InMemoryMetrics, Observability};
///
/// let metrics = Arc::new(InMemoryMetrics::new());
/// let observability = Observability::default().with_metrics(metrics.clone());
/// ```
#[derive(Clone)]
pub struct Observability {
    pub logger: Arc<dyn Logger>,
    pub metrics: Arc<dyn Metrics>,
    pub tracer: Arc<dyn Tracer>,
}

impl Observability {
    pub fn new(logger: Arc<dyn Logger>, metrics: Arc<dyn Metrics>, tracer: Arc<dyn Tracer>) -> Self {
        Observability {
            logger,
            metrics,
            tracer,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }
}

impl Default for Observability {
    fn default() -> Self {
        Observability {
            logger: Arc::new(LogLogger),
            metrics: Arc::new(NoopMetrics),
            tracer: Arc::new(NoopTracer),
        }
    }
}

impl fmt::Debug for Observability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observability").finish_non_exhaustive()
    }
}
