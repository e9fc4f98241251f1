//! Coordination layer for the long-running logger
//!
//! - Cycle scheduling with a stop-reason state machine
//! - Graceful shutdown on SIGINT/SIGTERM

pub mod scheduler;
pub mod shutdown;

pub use scheduler::{CycleReport, CycleScheduler, SchedulerConfig, SchedulerState, StopReason};
pub use shutdown::{install_signal_handlers, GracefulShutdown, ShutdownSignal, ShutdownToken};
