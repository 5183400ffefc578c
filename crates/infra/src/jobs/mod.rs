//! Background job queue engine.
//!
//! Three pipelines (posting fetch, resume parse, match analysis) share one
//! queue skeleton: persisted job rows with priority ordering, atomic claim
//! semantics, per-class retry policies with exponential backoff, and a
//! watchdog that recovers jobs abandoned mid-processing.
//!
//! ## Components
//!
//! - `types`: job record, state machine, payloads, failure taxonomy
//! - `retry`: pure per-class retry decision table
//! - `store`: `JobStore` trait + in-memory implementation
//! - `postgres`: sqlx-backed store using `FOR UPDATE SKIP LOCKED` claims
//! - `manager`: `QueueManager` — the only writer of job rows
//! - `processor`: seams for the external fetch/parse/analyze executors
//! - `worker`: per-class polling loop
//! - `watchdog`: stale-`processing` recovery

pub mod manager;
pub mod postgres;
pub mod processor;
pub mod retry;
pub mod store;
pub mod types;
pub mod watchdog;
pub mod worker;

pub use manager::{FailureOutcome, QueueManager, ReportAck};
pub use postgres::PgJobStore;
pub use processor::{JobOutcome, Processor, ProcessorError, ResultError, ResultProcessor};
pub use retry::{RetryDecision, decide};
pub use store::{InMemoryJobStore, JobStore, JobStoreError, QueueStatus};
pub use types::{ErrorKind, Job, JobClass, JobPayload, JobStatus};
pub use watchdog::{Watchdog, WatchdogConfig, WatchdogHandle};
pub use worker::{WorkerConfig, WorkerHandle, WorkerLoop, WorkerStats};
