//! Narrow instrumentation seam around real candidate invocations.
//!
//! The engine behaves identically with instrumentation disabled; collection
//! failures never affect the invocation's primary result.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Metrics captured around one candidate invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationMetrics {
    pub wall_time_micros: u64,
    /// Statement tally in the underlying module, when the collector
    /// provides one.
    pub statements_hit: Option<u64>,
    pub branches_hit: Option<u64>,
}

/// Span-style collection interface.  `stop_span` returning `None` means no
/// metrics were collected (disabled, or collection failed).
pub trait Instrumentation {
    fn start_span(&mut self, target: &str);
    fn stop_span(&mut self, target: &str) -> Option<InvocationMetrics>;
}

/// Default collector: collects nothing.
#[derive(Debug, Default)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {
    fn start_span(&mut self, _target: &str) {}

    fn stop_span(&mut self, _target: &str) -> Option<InvocationMetrics> {
        None
    }
}

/// Wall-clock collector for real invocations.
#[derive(Debug, Default)]
pub struct WallClockInstrumentation {
    started: Option<Instant>,
}

impl Instrumentation for WallClockInstrumentation {
    fn start_span(&mut self, _target: &str) {
        self.started = Some(Instant::now());
    }

    fn stop_span(&mut self, _target: &str) -> Option<InvocationMetrics> {
        let started = self.started.take()?;
        Some(InvocationMetrics {
            wall_time_micros: started.elapsed().as_micros() as u64,
            statements_hit: None,
            branches_hit: None,
        })
    }
}
