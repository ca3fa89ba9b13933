//! Telemetry for ollamacode
//!
//! Structured logs go through `tracing`; in-process counters for the
//! session live in [`TelemetryCollector`] and are shown by `/stats`.

use crate::cli::Verbosity;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Events recorded while the assistant works
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    ModelRequest {
        duration_ms: u64,
        success: bool,
        timestamp: Instant,
    },
    DirectivesParsed {
        directives: usize,
        warnings: usize,
        timestamp: Instant,
    },
    ValidationFailed {
        path: String,
        diagnostics: usize,
        timestamp: Instant,
    },
    /// One correction exchange finished
    Correction {
        path: String,
        round_trips: usize,
        resolved: bool,
        timestamp: Instant,
    },
    Mutation {
        target: String,
        success: bool,
        timestamp: Instant,
    },
    Search {
        query: String,
        hits: usize,
        pages_fetched: usize,
        timestamp: Instant,
    },
    ShellCommand {
        command: String,
        success: bool,
        timestamp: Instant,
    },
}

/// Session counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub model_requests: usize,
    pub model_failures: usize,
    pub directives: usize,
    pub parse_warnings: usize,
    pub validation_failures: usize,
    pub correction_round_trips: usize,
    pub corrections_resolved: usize,
    pub corrections_exhausted: usize,
    pub mutations_succeeded: usize,
    pub mutations_failed: usize,
    pub searches: usize,
    pub pages_fetched: usize,
    pub shell_commands: usize,
}

impl TelemetryStats {
    /// Multi-line summary for the terminal
    pub fn render(&self, elapsed: Duration) -> String {
        let rows = [
            ("Session time", format!("{}s", elapsed.as_secs())),
            (
                "Model requests",
                format!("{} ({} failed)", self.model_requests, self.model_failures),
            ),
            (
                "Directives",
                format!("{} ({} parse warnings)", self.directives, self.parse_warnings),
            ),
            ("Validation failures", self.validation_failures.to_string()),
            (
                "Corrections",
                format!(
                    "{} round-trips, {} resolved, {} exhausted",
                    self.correction_round_trips, self.corrections_resolved, self.corrections_exhausted
                ),
            ),
            (
                "Mutations",
                format!("{} ok, {} failed", self.mutations_succeeded, self.mutations_failed),
            ),
            (
                "Web searches",
                format!("{} ({} pages fetched)", self.searches, self.pages_fetched),
            ),
            ("Shell commands", self.shell_commands.to_string()),
        ];
        rows.iter()
            .map(|(label, value)| format!("{:<20} {}\n", label, value))
            .collect()
    }
}

/// Events kept in the log; counters keep counting past it
pub const MAX_EVENTS: usize = 1000;

/// Shared event log and counters
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<VecDeque<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                TelemetryEvent::ModelRequest { success, .. } => {
                    stats.model_requests += 1;
                    if !success {
                        stats.model_failures += 1;
                    }
                }
                TelemetryEvent::DirectivesParsed {
                    directives, warnings, ..
                } => {
                    stats.directives += directives;
                    stats.parse_warnings += warnings;
                }
                TelemetryEvent::ValidationFailed { .. } => stats.validation_failures += 1,
                TelemetryEvent::Correction {
                    round_trips, resolved, ..
                } => {
                    stats.correction_round_trips += round_trips;
                    if *resolved {
                        stats.corrections_resolved += 1;
                    } else {
                        stats.corrections_exhausted += 1;
                    }
                }
                TelemetryEvent::Mutation { success: true, .. } => stats.mutations_succeeded += 1,
                TelemetryEvent::Mutation { success: false, .. } => stats.mutations_failed += 1,
                TelemetryEvent::Search { pages_fetched, .. } => {
                    stats.searches += 1;
                    stats.pages_fetched += pages_fetched;
                }
                TelemetryEvent::ShellCommand { .. } => stats.shell_commands += 1,
            }
        }
        let mut events = lock(&self.events);
        if events.len() == MAX_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = lock(&self.events);
        let start = events.len().saturating_sub(n);
        events.range(start..).cloned().collect()
    }

    /// Share of successful writes, 1.0 when nothing was written
    pub fn mutation_success_rate(&self) -> f64 {
        let stats = lock(&self.stats);
        let total = stats.mutations_succeeded + stats.mutations_failed;
        if total == 0 {
            1.0
        } else {
            stats.mutations_succeeded as f64 / total as f64
        }
    }

    pub fn summary(&self) -> String {
        self.get_stats().render(self.elapsed())
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Default log filter for a verbosity level
pub fn default_filter(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "ollamacode=info,warn",
        Verbosity::VeryVerbose => "ollamacode=debug,info",
    }
}

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` wins over the verbosity flags. Logs go to stderr so they never
/// interleave with streamed replies on stdout. Calling this twice is a no-op.
pub fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity == Verbosity::VeryVerbose)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = TelemetryCollector::new();
        assert_eq!(collector.event_count(), 0);
        assert_eq!(collector.get_stats(), TelemetryStats::default());
    }

    #[test]
    fn test_model_request_counts_failures() {
        let collector = TelemetryCollector::new();
        for success in [true, false, true] {
            collector.record(TelemetryEvent::ModelRequest {
                duration_ms: 10,
                success,
                timestamp: Instant::now(),
            });
        }
        let stats = collector.get_stats();
        assert_eq!(stats.model_requests, 3);
        assert_eq!(stats.model_failures, 1);
    }

    #[test]
    fn test_correction_and_mutation_counters() {
        let collector = TelemetryCollector::new();
        collector.record(TelemetryEvent::Correction {
            path: "a.py".into(),
            round_trips: 2,
            resolved: false,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::Mutation {
            target: "a.py".into(),
            success: true,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::Mutation {
            target: "../x".into(),
            success: false,
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.correction_round_trips, 2);
        assert_eq!(stats.corrections_exhausted, 1);
        assert!((collector.mutation_success_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recent_events() {
        let collector = TelemetryCollector::new();
        for i in 0..10 {
            collector.record(TelemetryEvent::ShellCommand {
                command: format!("echo {}", i),
                success: true,
                timestamp: Instant::now(),
            });
        }
        assert_eq!(collector.recent_events(3).len(), 3);
        assert_eq!(collector.get_stats().shell_commands, 10);
    }

    #[test]
    fn test_event_log_keeps_only_latest() {
        let collector = TelemetryCollector::new();
        for i in 0..MAX_EVENTS + 5 {
            collector.record(TelemetryEvent::Mutation {
                target: format!("file{}.txt", i),
                success: true,
                timestamp: Instant::now(),
            });
        }
        assert_eq!(collector.event_count(), MAX_EVENTS);
        assert_eq!(collector.get_stats().mutations_succeeded, MAX_EVENTS + 5);
        match collector.recent_events(1).as_slice() {
            [TelemetryEvent::Mutation { target, .. }] => {
                assert_eq!(target, &format!("file{}.txt", MAX_EVENTS + 4))
            }
            other => panic!("unexpected events: {:?}", other),
        }
        let oldest = collector.recent_events(MAX_EVENTS);
        assert!(matches!(&oldest[0], TelemetryEvent::Mutation { target, .. } if target == "file5.txt"));
    }

    #[test]
    fn test_summary_lists_counters() {
        let collector = TelemetryCollector::new();
        collector.record(TelemetryEvent::Search {
            query: "tokio".into(),
            hits: 5,
            pages_fetched: 2,
            timestamp: Instant::now(),
        });
        let summary = collector.summary();
        assert!(summary.contains("Web searches"));
        assert!(summary.contains("1 (2 pages fetched)"));
    }

    #[test]
    fn test_default_filter_by_verbosity() {
        assert_eq!(default_filter(Verbosity::Quiet), "error");
        assert!(default_filter(Verbosity::VeryVerbose).contains("debug"));
    }
}
