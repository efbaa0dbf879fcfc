//! Core domain logic for posture statistics.
//!
//! This crate contains the fundamental types and logic for:
//! - Accounting: turning the detector's bad-posture duration samples into runs
//! - Settlement: crediting runs to time-window and activity buckets exactly once
//! - Session lifecycle: baseline, checkpoints, daily rollover and close

pub mod activity;
pub mod engine;
pub mod record;
pub mod session;
pub mod settlement;
pub mod window;

pub use activity::{Activity, UnknownActivity};
pub use engine::{AccountingState, RunTransition};
pub use record::{Bucket, DailyEntry, HISTORY_CAPACITY, StatisticsRecord, TimeWindowBucket};
pub use session::{Session, SessionConfig, SessionPhase};
pub use settlement::{ClockAnomaly, Settlement};
pub use window::TimeWindow;
