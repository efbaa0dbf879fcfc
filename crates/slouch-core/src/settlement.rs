//! Settling unresolved bad-posture seconds into time-window and activity
//! buckets.
//!
//! Both dimensions use the same math: the completed runs accrued since the
//! last settlement plus the not-yet-credited part of the open run are added
//! as bad seconds, and the wall time since the last settlement as total
//! seconds. The total is clamped up to the bad seconds so every bucket keeps
//! `bad <= total`.

use chrono::{DateTime, Local};

use crate::activity::Activity;
use crate::engine::{AccountingState, elapsed_secs};
use crate::record::StatisticsRecord;
use crate::window::TimeWindow;

/// Elapsed wall time disagreed with the bad seconds credited for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("clock anomaly: {elapsed_secs}s elapsed but {bad_secs}s of bad posture credited")]
pub struct ClockAnomaly {
    pub elapsed_secs: i64,
    pub bad_secs: u64,
}

impl ClockAnomaly {
    /// The clock moved backwards, as opposed to ordinary rounding drift.
    pub const fn is_backwards(&self) -> bool {
        self.elapsed_secs < 0
    }
}

/// Amounts credited to one bucket by a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub bad: u64,
    pub total: u64,
    /// Set when `total` had to be clamped.
    pub anomaly: Option<ClockAnomaly>,
}

/// A settled time-window bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettlement {
    pub window: TimeWindow,
    pub settlement: Settlement,
}

/// A settled activity bucket; `activity` is `None` when no activity was set
/// and nothing was credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitySettlement {
    pub activity: Option<Activity>,
    pub settlement: Settlement,
}

fn compute(
    accumulated: u64,
    open_run: u64,
    snapshot: u64,
    since: DateTime<Local>,
    now: DateTime<Local>,
) -> Settlement {
    let bad = accumulated.saturating_add(open_run.saturating_sub(snapshot));
    let elapsed = elapsed_secs(since, now);
    match u64::try_from(elapsed) {
        Ok(total) if total >= bad => Settlement {
            bad,
            total,
            anomaly: None,
        },
        _ => Settlement {
            bad,
            total: bad,
            anomaly: Some(ClockAnomaly {
                elapsed_secs: elapsed,
                bad_secs: bad,
            }),
        },
    }
}

/// Closes out the current time window's bucket at `now`.
///
/// The first call of a session has nothing to credit: it only establishes the
/// window cursor and returns `None`. The cursor always moves to the window
/// containing `now`.
pub fn settle_time_window(
    state: &mut AccountingState,
    record: &mut StatisticsRecord,
    now: DateTime<Local>,
) -> Option<WindowSettlement> {
    let settled = match (state.current_time_window, state.last_time_window_settled_at) {
        (Some(window), Some(since)) => {
            let settlement = compute(
                state.time_window_bad,
                state.consec_bad,
                state.prev_time_window_consec,
                since,
                now,
            );
            record
                .time_window_bucket_mut(window)
                .add(settlement.bad, settlement.total);
            state.time_window_bad = 0;
            state.prev_time_window_consec = state.consec_bad;
            Some(WindowSettlement { window, settlement })
        }
        _ => None,
    };

    let next = TimeWindow::containing(&now);
    if state.current_time_window.is_some_and(|current| current != next) {
        tracing::debug!(window = %next, "entered time window");
    }
    state.current_time_window = Some(next);
    state.last_time_window_settled_at = Some(now);
    settled
}

/// Closes out the current activity's bucket at `now` and adopts `next`.
///
/// Passing the current activity as `next` settles without switching, which
/// is what periodic checkpoints do.
pub fn settle_activity(
    state: &mut AccountingState,
    record: &mut StatisticsRecord,
    next: Option<Activity>,
    now: DateTime<Local>,
) -> ActivitySettlement {
    let since = state.activity_started_at.unwrap_or(now);
    let settlement = compute(
        state.activity_bad,
        state.consec_bad,
        state.prev_activity_consec,
        since,
        now,
    );

    let activity = state.current_activity;
    if let Some(activity) = activity {
        record
            .activity_bucket_mut(activity)
            .add(settlement.bad, settlement.total);
    }

    state.prev_activity_consec = state.consec_bad;
    state.activity_bad = 0;
    state.activity_started_at = Some(now);
    state.current_activity = next;

    ActivitySettlement {
        activity,
        settlement,
    }
}
