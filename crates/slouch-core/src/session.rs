//! Session lifecycle: `Uninitialized -> Active -> Closed`.
//!
//! A [`Session`] owns the loaded [`StatisticsRecord`] and the ephemeral
//! [`AccountingState`]. It never reads the clock or touches storage; callers
//! pass `now` in and persist [`Session::record`] when an operation asks for
//! it.

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::activity::Activity;
use crate::engine::{self, AccountingState, RunTransition, elapsed_secs};
use crate::record::StatisticsRecord;
use crate::settlement::{self, ClockAnomaly};
use crate::window::next_settlement_delay;

/// Default cadence of time-window settlements.
pub const DEFAULT_TIME_WINDOW_REFRESH: Duration = Duration::from_secs(10 * 60);

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Record loaded, waiting for the baseline to be established.
    Uninitialized,
    /// Accounting samples.
    Active,
    /// Final settlement done; further input is ignored.
    Closed,
}

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Longest gap between two time-window settlements.
    pub time_window_refresh: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            time_window_refresh: DEFAULT_TIME_WINDOW_REFRESH,
        }
    }
}

/// Returns the local calendar date key (`YYYY-MM-DD`) for `at`.
pub fn date_key(at: &DateTime<Local>) -> String {
    at.date_naive().format("%Y-%m-%d").to_string()
}

fn log_anomaly(dimension: &'static str, anomaly: &ClockAnomaly) {
    if anomaly.is_backwards() {
        tracing::warn!(dimension, %anomaly, "clock moved backwards, clamping elapsed time");
    } else {
        tracing::debug!(dimension, %anomaly, "elapsed time behind bad duration, clamping");
    }
}

/// One monitoring session over a statistics record.
#[derive(Debug)]
pub struct Session {
    phase: SessionPhase,
    record: StatisticsRecord,
    state: AccountingState,
    config: SessionConfig,
    /// Start of the wall time not yet added to the daily duration.
    daily_clock: Option<DateTime<Local>>,
}

impl Session {
    pub fn new(record: StatisticsRecord, config: SessionConfig) -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            record,
            state: AccountingState::default(),
            config,
            daily_clock: None,
        }
    }

    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub const fn record(&self) -> &StatisticsRecord {
        &self.record
    }

    pub const fn state(&self) -> &AccountingState {
        &self.state
    }

    pub fn into_record(self) -> StatisticsRecord {
        self.record
    }

    /// Handles a change of the user-declared activity.
    ///
    /// Before the baseline the activity is only remembered. While active, a
    /// different activity settles the previous one's bucket. Returns `true`
    /// if a settlement happened.
    pub fn activity_changed(&mut self, activity: Option<Activity>, now: DateTime<Local>) -> bool {
        match self.phase {
            SessionPhase::Uninitialized => {
                self.state.current_activity = activity;
                false
            }
            SessionPhase::Active if self.state.current_activity != activity => {
                self.settle_activity(activity, now);
                tracing::info!(
                    activity = activity.map_or("unset", |a| a.as_str()),
                    "activity changed"
                );
                true
            }
            SessionPhase::Active => false,
            SessionPhase::Closed => {
                tracing::debug!("ignoring activity change after close");
                false
            }
        }
    }

    /// Starts accounting on the first baseline event.
    ///
    /// Performs the daily rollover check, starts the daily and activity
    /// clocks and establishes the time-window cursor. Returns the delay until
    /// the first time-window settlement, or `None` if the session was already
    /// started.
    pub fn baseline_established(&mut self, now: DateTime<Local>) -> Option<Duration> {
        if self.phase != SessionPhase::Uninitialized {
            tracing::debug!(phase = ?self.phase, "baseline already established");
            return None;
        }

        self.record.roll_over_to(&date_key(&now));
        self.daily_clock = Some(now);
        self.state.activity_started_at = Some(now);
        settlement::settle_time_window(&mut self.state, &mut self.record, now);
        self.phase = SessionPhase::Active;

        tracing::info!(
            date = %self.record.last_used_date_str,
            activity = self.state.current_activity.map_or("unset", |a| a.as_str()),
            "session active"
        );
        Some(next_settlement_delay(&now, self.config.time_window_refresh))
    }

    /// Ingests a duration sample. Samples outside the active phase are
    /// dropped.
    pub fn ingest(&mut self, sample: u64, now: DateTime<Local>) -> Option<RunTransition> {
        if self.phase != SessionPhase::Active {
            tracing::trace!(sample, phase = ?self.phase, "sample outside active session");
            return None;
        }
        Some(engine::ingest(&mut self.state, &mut self.record, sample, now))
    }

    /// Settles the current time window and returns the delay to the next
    /// settlement. `None` outside the active phase.
    pub fn time_window_tick(&mut self, now: DateTime<Local>) -> Option<Duration> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        self.settle_time_window(now);
        Some(next_settlement_delay(&now, self.config.time_window_refresh))
    }

    /// Periodic checkpoint: accrues wall time into the daily duration, rolls
    /// the day over if midnight passed, and settles the activity bucket.
    ///
    /// Returns `true` if the record changed and should be persisted.
    pub fn checkpoint(&mut self, now: DateTime<Local>) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }

        self.accrue_daily_duration(now);
        self.record.roll_over_to(&date_key(&now));
        let current = self.state.current_activity;
        self.settle_activity(current, now);
        self.record.heal_daily();

        tracing::debug!(
            daily_bad = self.record.daily_bad_posture_duration,
            daily_total = self.record.daily_duration,
            "checkpoint"
        );
        true
    }

    /// Final settlement of every dimension. Idempotent.
    ///
    /// Returns `true` if the record changed and should be persisted.
    pub fn close(&mut self, now: DateTime<Local>) -> bool {
        match self.phase {
            SessionPhase::Closed => return false,
            SessionPhase::Uninitialized => {
                self.phase = SessionPhase::Closed;
                tracing::info!("session closed before baseline");
                return false;
            }
            SessionPhase::Active => {}
        }

        self.accrue_daily_duration(now);
        self.record.daily_bad_posture_duration = self
            .record
            .daily_bad_posture_duration
            .saturating_add(self.state.consec_bad);
        self.settle_time_window(now);
        let current = self.state.current_activity;
        self.settle_activity(current, now);
        self.record.heal_daily();
        self.phase = SessionPhase::Closed;

        tracing::info!(
            daily_bad = self.record.daily_bad_posture_duration,
            daily_total = self.record.daily_duration,
            longest_good = self.record.longest_good_posture_duration,
            "session closed"
        );
        true
    }

    fn accrue_daily_duration(&mut self, now: DateTime<Local>) {
        let since = self.daily_clock.replace(now).unwrap_or(now);
        let elapsed = elapsed_secs(since, now);
        match u64::try_from(elapsed) {
            Ok(secs) => {
                self.record.daily_duration = self.record.daily_duration.saturating_add(secs);
            }
            Err(_) => {
                tracing::warn!(elapsed, "clock moved backwards, daily duration unchanged");
            }
        }
    }

    fn settle_time_window(&mut self, now: DateTime<Local>) {
        if let Some(settled) = settlement::settle_time_window(&mut self.state, &mut self.record, now)
        {
            if let Some(anomaly) = &settled.settlement.anomaly {
                log_anomaly("time_window", anomaly);
            }
            tracing::debug!(
                window = %settled.window,
                bad = settled.settlement.bad,
                total = settled.settlement.total,
                "settled time window"
            );
        }
    }

    fn settle_activity(&mut self, next: Option<Activity>, now: DateTime<Local>) {
        let settled = settlement::settle_activity(&mut self.state, &mut self.record, next, now);
        if let Some(anomaly) = &settled.settlement.anomaly {
            log_anomaly("activity", anomaly);
        }
        tracing::debug!(
            activity = settled.activity.map_or("unset", |a| a.as_str()),
            bad = settled.settlement.bad,
            total = settled.settlement.total,
            "settled activity"
        );
    }
}
