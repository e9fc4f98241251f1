//! Cycle scheduler
//!
//! Runs load → build → write cycles back to back with a fixed delay between
//! them until interrupted, until a cycle fails, or until an optional bound on
//! the number of cycles is reached.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::shutdown::ShutdownToken;
use crate::adapters::MarketSource;
use crate::domain::TIMESTAMP_FORMAT;
use crate::error::Result;
use crate::persistence::LogSink;
use crate::pipeline::BatchAssembler;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Records per cycle across all markets
    pub total_per_cycle: usize,
    /// Delay after each completed cycle
    pub cycle_delay: Duration,
    /// Stop after this many completed cycles
    pub max_cycles: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested
    Interrupted,
    /// `max_cycles` reached
    Completed,
    /// A cycle returned an error
    Failed { cycle: u64, error: String },
}

impl StopReason {
    pub fn exit_code(&self) -> u8 {
        match self {
            StopReason::Interrupted | StopReason::Completed => 0,
            StopReason::Failed { .. } => 1,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Interrupted => write!(f, "interrupted"),
            StopReason::Completed => write!(f, "completed"),
            StopReason::Failed { cycle, error } => write!(f, "cycle {} failed: {}", cycle, error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped(StopReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycles_completed: u64,
    pub records_written: u64,
    pub reason: StopReason,
}

pub struct CycleScheduler {
    config: SchedulerConfig,
    source: Arc<dyn MarketSource>,
    assembler: BatchAssembler,
    sink: LogSink,
    token: ShutdownToken,
    state: SchedulerState,
    cycles_completed: u64,
    records_written: u64,
}

impl CycleScheduler {
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn MarketSource>,
        assembler: BatchAssembler,
        sink: LogSink,
        token: ShutdownToken,
    ) -> Self {
        Self {
            config,
            source,
            assembler,
            sink,
            token,
            state: SchedulerState::Running,
            cycles_completed: 0,
            records_written: 0,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Run cycles until stopped. Calling again after a stop returns the same report.
    pub async fn run(&mut self) -> CycleReport {
        if let SchedulerState::Stopped(reason) = &self.state {
            return self.report(reason.clone());
        }

        info!(
            "[CYCLE] Starting continuous logging into {} ({} logs per cycle)",
            self.sink.store().describe(),
            self.config.total_per_cycle
        );

        let reason = loop {
            if self.token.is_shutdown_requested() {
                break StopReason::Interrupted;
            }

            let cycle = self.cycles_completed + 1;
            match self.run_cycle(cycle).await {
                Ok(written) => {
                    self.cycles_completed += 1;
                    self.records_written += written as u64;
                }
                Err(e) => {
                    error!("[CYCLE] Cycle #{} failed: {}", cycle, e);
                    break StopReason::Failed {
                        cycle,
                        error: e.to_string(),
                    };
                }
            }

            if let Some(max) = self.config.max_cycles {
                if self.cycles_completed >= max {
                    break StopReason::Completed;
                }
            }

            info!(
                "[CYCLE] Waiting {}s before next cycle...",
                self.config.cycle_delay.as_secs_f64()
            );
            let interrupted = tokio::select! {
                _ = tokio::time::sleep(self.config.cycle_delay) => false,
                _ = self.token.cancelled() => true,
            };
            if interrupted {
                break StopReason::Interrupted;
            }
        };

        match &reason {
            StopReason::Interrupted => warn!(
                "[CYCLE] Logging stopped by user after {} cycles",
                self.cycles_completed
            ),
            StopReason::Completed => info!(
                "[CYCLE] Finished {} cycles",
                self.cycles_completed
            ),
            StopReason::Failed { .. } => error!(
                "[CYCLE] Stopping after {} completed cycles",
                self.cycles_completed
            ),
        }

        self.state = SchedulerState::Stopped(reason.clone());
        self.report(reason)
    }

    /// One cycle; returns the number of records written
    async fn run_cycle(&mut self, cycle: u64) -> Result<usize> {
        info!(
            "[CYCLE] ===== Cycle #{} at {} =====",
            cycle,
            Utc::now().format(TIMESTAMP_FORMAT)
        );

        let configs = self.source.load().await?;
        let last_id = self.sink.discover_last_id().await?;
        let records = self
            .assembler
            .build(&configs, self.config.total_per_cycle, last_id);
        let summary = self.sink.write_batch(&records).await?;

        info!(
            "[CYCLE] Cycle #{} complete: {} logs added across {} markets (ids {}..={})",
            cycle,
            summary.appended,
            configs.len().max(1),
            last_id + 1,
            last_id + summary.appended as u64
        );
        Ok(summary.appended)
    }

    fn report(&self, reason: StopReason) -> CycleReport {
        CycleReport {
            cycles_completed: self.cycles_completed,
            records_written: self.records_written,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::market_source::MockMarketSource;
    use crate::adapters::{InMemoryLogStore, StaticMarketSource};
    use crate::coordination::{GracefulShutdown, ShutdownSignal};
    use crate::domain::MarketConfig;
    use crate::error::LoggerError;
    use crate::persistence::{LogStore, SinkConfig};
    use mockall::Sequence;
    use serde_json::Value;
    use std::collections::HashSet;

    fn quiet_sink() -> SinkConfig {
        SinkConfig {
            rate_limit_batch_size: 10,
            rate_limit_pause: Duration::ZERO,
            post_append_pause: Duration::ZERO,
        }
    }

    fn scheduler(
        source: Arc<dyn MarketSource>,
        store: &Arc<InMemoryLogStore>,
        shutdown: &GracefulShutdown,
        config: SchedulerConfig,
    ) -> CycleScheduler {
        CycleScheduler::new(
            config,
            source,
            BatchAssembler::seeded(42),
            LogSink::new(store.clone(), quiet_sink()),
            shutdown.token(),
        )
    }

    fn bounded(total: usize, cycles: u64) -> SchedulerConfig {
        SchedulerConfig {
            total_per_cycle: total,
            cycle_delay: Duration::ZERO,
            max_cycles: Some(cycles),
        }
    }

    #[tokio::test]
    async fn test_bounded_run_continues_ids_across_cycles() {
        let store = Arc::new(InMemoryLogStore::new("logs"));
        let shutdown = GracefulShutdown::new();
        let source = Arc::new(StaticMarketSource::new(vec![
            MarketConfig::default_market(),
            MarketConfig::new("MKT002", "ETH above $5k?"),
        ]));
        let mut scheduler = scheduler(source, &store, &shutdown, bounded(10, 3));

        let report = scheduler.run().await;

        assert_eq!(report.reason, StopReason::Completed);
        assert_eq!(report.cycles_completed, 3);
        assert_eq!(report.records_written, 30);
        assert_eq!(store.row_count().await.unwrap(), 31);

        let ids: HashSet<u64> = (2..=31)
            .filter_map(|row| store.cell(row, 1))
            .filter_map(|v| v.as_u64())
            .collect();
        assert_eq!(ids, (1..=30).collect());
        assert_eq!(scheduler.state(), &SchedulerState::Stopped(StopReason::Completed));
    }

    #[tokio::test]
    async fn test_interrupt_before_start_runs_nothing() {
        let store = Arc::new(InMemoryLogStore::new("logs"));
        let shutdown = GracefulShutdown::new();
        let mut source = MockMarketSource::new();
        source.expect_load().never();

        shutdown.request_shutdown(ShutdownSignal::Interrupt);
        let mut scheduler = scheduler(Arc::new(source), &store, &shutdown, bounded(5, 10));
        let report = scheduler.run().await;

        assert_eq!(report.reason, StopReason::Interrupted);
        assert_eq!(report.cycles_completed, 0);
        assert_eq!(store.row_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_source_error_stops_with_failure() {
        let store = Arc::new(InMemoryLogStore::new("logs"));
        let shutdown = GracefulShutdown::new();
        let mut source = MockMarketSource::new();
        source
            .expect_load()
            .times(1)
            .returning(|| {
                Err(LoggerError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "db.json",
                )))
            });

        let mut scheduler = scheduler(Arc::new(source), &store, &shutdown, bounded(5, 10));
        let report = scheduler.run().await;

        assert_eq!(report.cycles_completed, 0);
        assert_eq!(report.reason.exit_code(), 1);
        assert!(matches!(report.reason, StopReason::Failed { cycle: 1, .. }));
    }

    #[tokio::test]
    async fn test_write_failure_reports_completed_cycles() {
        let store = Arc::new(InMemoryLogStore::new("logs"));
        let shutdown = GracefulShutdown::new();
        let mut source = MockMarketSource::new();
        let failing = store.clone();
        let mut seq = Sequence::new();
        source
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![MarketConfig::default_market()]));
        source
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || {
                failing.fail_appends(true);
                Ok(vec![MarketConfig::default_market()])
            });

        let mut scheduler = scheduler(
            Arc::new(source),
            &store,
            &shutdown,
            SchedulerConfig {
                total_per_cycle: 4,
                cycle_delay: Duration::ZERO,
                max_cycles: None,
            },
        );
        let report = scheduler.run().await;

        assert_eq!(report.cycles_completed, 1);
        assert_eq!(report.records_written, 4);
        assert!(matches!(report.reason, StopReason::Failed { cycle: 2, .. }));
        // rows from the first cycle stay
        assert_eq!(store.row_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_annotation_failure_stops_without_counting_cycle() {
        let store = Arc::new(InMemoryLogStore::new("logs"));
        let shutdown = GracefulShutdown::new();
        let mut source = MockMarketSource::new();
        let failing = store.clone();
        let mut seq = Sequence::new();
        source
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Vec::new()));
        source
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || {
                failing.fail_annotations(true);
                Ok(Vec::new())
            });

        let mut scheduler = scheduler(
            Arc::new(source),
            &store,
            &shutdown,
            SchedulerConfig {
                total_per_cycle: 3,
                cycle_delay: Duration::ZERO,
                max_cycles: None,
            },
        );
        let report = scheduler.run().await;

        assert!(matches!(report.reason, StopReason::Failed { cycle: 2, .. }));
        assert_eq!(report.cycles_completed, 1);
        assert_eq!(report.records_written, 3);
        // second batch was appended before annotation failed and is not rolled back
        assert_eq!(store.row_count().await.unwrap(), 7);
        assert_eq!(store.append_calls(), 2);
        assert!(store.background(5, 8).is_none());
    }

    #[tokio::test]
    async fn test_config_reloaded_every_cycle() {
        let store = Arc::new(InMemoryLogStore::new("logs"));
        let shutdown = GracefulShutdown::new();
        let mut source = MockMarketSource::new();
        let mut seq = Sequence::new();
        source
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![MarketConfig::new("MKT007", "Custom")]));
        source
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Vec::new()));

        let mut scheduler = scheduler(Arc::new(source), &store, &shutdown, bounded(3, 2));
        scheduler.run().await;

        let markets: Vec<Value> = (2..=7).filter_map(|row| store.cell(row, 2)).collect();
        assert_eq!(markets[..3].to_vec(), vec![Value::from("MKT007"); 3]);
        assert_eq!(markets[3..].to_vec(), vec![Value::from("MKT001"); 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_during_delay_stops_promptly() {
        let store = Arc::new(InMemoryLogStore::new("logs"));
        let shutdown = Arc::new(GracefulShutdown::new());
        let source = Arc::new(StaticMarketSource::default());
        let mut scheduler = scheduler(
            source,
            &store,
            &shutdown,
            SchedulerConfig {
                total_per_cycle: 2,
                cycle_delay: Duration::from_secs(60),
                max_cycles: None,
            },
        );

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            trigger.request_shutdown(ShutdownSignal::Interrupt);
        });

        let started = tokio::time::Instant::now();
        let report = scheduler.run().await;

        assert_eq!(report.reason, StopReason::Interrupted);
        assert_eq!(report.reason.exit_code(), 0);
        assert_eq!(report.cycles_completed, 1);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_stopped_is_terminal() {
        let store = Arc::new(InMemoryLogStore::new("logs"));
        let shutdown = GracefulShutdown::new();
        let mut source = MockMarketSource::new();
        source
            .expect_load()
            .times(1)
            .returning(|| Ok(Vec::new()));

        let mut scheduler = scheduler(Arc::new(source), &store, &shutdown, bounded(1, 1));
        let first = scheduler.run().await;
        let second = scheduler.run().await;

        assert_eq!(first, second);
        assert_eq!(store.row_count().await.unwrap(), 2);
    }
}
