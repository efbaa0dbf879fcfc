//! Duration accounting engine.
//!
//! Consumes the detector's bad-posture duration samples and keeps track of
//! the currently open bad-posture run. Completed runs are folded into the
//! per-dimension accumulators which the settlement routines in
//! [`crate::settlement`] later credit to time-window and activity buckets.
//!
//! # Carry-over snapshots
//!
//! A time-window or activity boundary may fall inside an open run. When that
//! dimension settles mid-run, the run's seconds so far are credited to the
//! closing bucket and remembered in the dimension's snapshot. When the run
//! ends only the seconds beyond the snapshot are added to the accumulator, so
//! each dimension sees every second of a run exactly once.

use chrono::{DateTime, Local};

use crate::activity::Activity;
use crate::record::StatisticsRecord;
use crate::window::TimeWindow;

/// Ephemeral per-session counters. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct AccountingState {
    /// Seconds of the currently open bad-posture run, `0` while posture is good.
    pub(crate) consec_bad: u64,
    /// Part of the open run already credited to the current time window.
    pub(crate) prev_time_window_consec: u64,
    /// Part of the open run already credited to the current activity.
    pub(crate) prev_activity_consec: u64,
    /// Completed-run seconds since the last time-window settlement.
    pub(crate) time_window_bad: u64,
    /// Completed-run seconds since the last activity settlement.
    pub(crate) activity_bad: u64,
    pub(crate) good_streak_start: Option<DateTime<Local>>,
    pub(crate) current_time_window: Option<TimeWindow>,
    pub(crate) last_time_window_settled_at: Option<DateTime<Local>>,
    pub(crate) current_activity: Option<Activity>,
    pub(crate) activity_started_at: Option<DateTime<Local>>,
}

impl AccountingState {
    /// Seconds of the open bad-posture run.
    pub const fn open_run(&self) -> u64 {
        self.consec_bad
    }

    pub const fn current_activity(&self) -> Option<Activity> {
        self.current_activity
    }

    pub const fn current_time_window(&self) -> Option<TimeWindow> {
        self.current_time_window
    }

    /// Completed-run seconds not yet settled into a time-window bucket.
    pub const fn unsettled_time_window_bad(&self) -> u64 {
        self.time_window_bad
    }

    /// Completed-run seconds not yet settled into an activity bucket.
    pub const fn unsettled_activity_bad(&self) -> u64 {
        self.activity_bad
    }
}

/// What a sample did to the open run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTransition {
    /// Posture turned bad.
    Started,
    /// The open run grew (or was reported unchanged).
    Continued,
    /// The detector's counter dropped without reporting good posture in
    /// between; the previous run of `previous` seconds was closed first.
    Restarted { previous: u64 },
    /// Posture turned good after a run of `run` seconds.
    Ended { run: u64 },
    /// Posture stayed good.
    GoodOngoing,
}

/// Whole seconds from `from` to `to`, negative if the clock went backwards.
pub(crate) fn elapsed_secs(from: DateTime<Local>, to: DateTime<Local>) -> i64 {
    (to - from).num_seconds()
}

/// Length of the current good-posture streak; starts the streak on first use.
fn good_streak_secs(state: &mut AccountingState, now: DateTime<Local>) -> u64 {
    let start = *state.good_streak_start.get_or_insert(now);
    u64::try_from(elapsed_secs(start, now)).unwrap_or(0)
}

/// Closes the open run: credits it to both dimension accumulators (minus
/// what each has already been given) and to the daily bad duration.
fn fold_run(state: &mut AccountingState, record: &mut StatisticsRecord, now: DateTime<Local>) -> u64 {
    let run = state.consec_bad;
    state.time_window_bad = state
        .time_window_bad
        .saturating_add(run.saturating_sub(state.prev_time_window_consec));
    state.activity_bad = state
        .activity_bad
        .saturating_add(run.saturating_sub(state.prev_activity_consec));
    record.daily_bad_posture_duration = record.daily_bad_posture_duration.saturating_add(run);

    state.consec_bad = 0;
    state.prev_time_window_consec = 0;
    state.prev_activity_consec = 0;
    state.good_streak_start = Some(now);
    run
}

/// Ingests one duration sample taken at `now`.
///
/// `sample` is `0` for good posture, otherwise the seconds of the ongoing
/// bad-posture run as measured by the detector.
pub fn ingest(
    state: &mut AccountingState,
    record: &mut StatisticsRecord,
    sample: u64,
    now: DateTime<Local>,
) -> RunTransition {
    if sample > 0 {
        if state.consec_bad > 0 && sample >= state.consec_bad {
            state.consec_bad = sample;
            return RunTransition::Continued;
        }

        let transition = if state.consec_bad > 0 {
            let previous = fold_run(state, record, now);
            tracing::debug!(previous, sample, "bad-posture counter restarted");
            RunTransition::Restarted { previous }
        } else {
            RunTransition::Started
        };

        let streak = good_streak_secs(state, now);
        record.observe_good_streak(streak);
        state.consec_bad = sample;
        transition
    } else if state.consec_bad > 0 {
        let run = fold_run(state, record, now);
        tracing::trace!(run, "bad-posture run ended");
        RunTransition::Ended { run }
    } else {
        let streak = good_streak_secs(state, now);
        record.observe_good_streak(streak);
        RunTransition::GoodOngoing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(seconds: i64) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 1, 15, 9, 0, 0)
            .single()
            .expect("valid test timestamp")
            + Duration::seconds(seconds)
    }

    fn feed(
        state: &mut AccountingState,
        record: &mut StatisticsRecord,
        samples: &[(i64, u64)],
    ) -> Vec<RunTransition> {
        samples
            .iter()
            .map(|&(at, sample)| ingest(state, record, sample, ts(at)))
            .collect()
    }

    #[test]
    fn completed_run_is_added_once() {
        let mut state = AccountingState::default();
        let mut record = StatisticsRecord::default();

        let transitions = feed(
            &mut state,
            &mut record,
            &[(0, 0), (5, 0), (10, 5), (15, 10), (20, 15), (25, 0)],
        );

        assert_eq!(record.daily_bad_posture_duration, 15);
        assert_eq!(state.time_window_bad, 15);
        assert_eq!(state.activity_bad, 15);
        assert_eq!(state.consec_bad, 0);
        assert_eq!(transitions[2], RunTransition::Started);
        assert_eq!(transitions[5], RunTransition::Ended { run: 15 });
    }

    #[test]
    fn trusts_latest_report_over_accumulation() {
        let mut state = AccountingState::default();
        let mut record = StatisticsRecord::default();

        feed(&mut state, &mut record, &[(0, 3), (1, 4), (7, 12)]);
        assert_eq!(state.open_run(), 12);
        assert_eq!(record.daily_bad_posture_duration, 0);
    }

    #[test]
    fn good_streak_is_tracked_live() {
        let mut state = AccountingState::default();
        let mut record = StatisticsRecord::default();

        feed(&mut state, &mut record, &[(0, 0), (30, 0), (90, 0)]);
        assert_eq!(record.longest_good_posture_duration, 90);
    }

    #[test]
    fn streak_restarts_when_good_posture_resumes() {
        let mut state = AccountingState::default();
        let mut record = StatisticsRecord::default();

        feed(
            &mut state,
            &mut record,
            &[(0, 0), (40, 0), (45, 5), (50, 0), (80, 0), (100, 3)],
        );
        // streak 0..45 closed at 45s; streak 50..100 reaches 50s
        assert_eq!(record.longest_good_posture_duration, 50);
    }

    #[test]
    fn shorter_streak_does_not_lower_maximum() {
        let mut state = AccountingState::default();
        let mut record = StatisticsRecord {
            longest_good_posture_duration: 600,
            ..StatisticsRecord::default()
        };

        feed(&mut state, &mut record, &[(0, 0), (60, 0), (61, 2), (62, 0)]);
        assert_eq!(record.longest_good_posture_duration, 600);
    }

    #[test]
    fn counter_drop_closes_previous_run() {
        let mut state = AccountingState::default();
        let mut record = StatisticsRecord::default();

        let transitions = feed(&mut state, &mut record, &[(0, 8), (5, 13), (6, 1), (9, 4), (10, 0)]);

        assert_eq!(transitions[2], RunTransition::Restarted { previous: 13 });
        assert_eq!(record.daily_bad_posture_duration, 17);
        assert_eq!(state.time_window_bad, 17);
    }

    #[test]
    fn closing_run_subtracts_carry_over() {
        let mut state = AccountingState::default();
        let mut record = StatisticsRecord::default();

        feed(&mut state, &mut record, &[(0, 8)]);
        state.prev_activity_consec = 8;
        state.prev_time_window_consec = 5;
        feed(&mut state, &mut record, &[(12, 20), (13, 0)]);

        assert_eq!(state.activity_bad, 12);
        assert_eq!(state.time_window_bad, 15);
        assert_eq!(record.daily_bad_posture_duration, 20);
        assert_eq!(state.prev_activity_consec, 0);
        assert_eq!(state.prev_time_window_consec, 0);
    }

    #[test]
    fn huge_samples_saturate_instead_of_overflowing() {
        let mut state = AccountingState::default();
        let mut record = StatisticsRecord::default();

        feed(&mut state, &mut record, &[(0, u64::MAX), (1, 0), (2, 5), (3, 0)]);

        assert_eq!(record.daily_bad_posture_duration, u64::MAX);
        assert_eq!(state.unsettled_time_window_bad(), u64::MAX);
        assert_eq!(state.unsettled_activity_bad(), u64::MAX);
        assert_eq!(state.open_run(), 0);
    }
}
