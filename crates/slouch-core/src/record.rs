//! The durable statistics aggregate.
//!
//! Field names serialize in camelCase; records in that shape load without
//! migration.

use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::activity::Activity;
use crate::window::{TimeWindow, WINDOW_COUNT};

/// Maximum number of daily entries kept in the rolling history.
pub const HISTORY_CAPACITY: usize = 120;

/// Returns `bad / total * 100`, or `0` for an empty total.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bad_percentage(bad: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        bad as f64 * 100.0 / total as f64
    }
}

/// Rewrites a `Wed Jan 15 2025` style date to `2025-01-15`. Anything else
/// is left alone.
fn canonicalize_date(date: &mut String) {
    if let Ok(parsed) = NaiveDate::parse_from_str(date, "%a %b %d %Y") {
        *date = parsed.format("%Y-%m-%d").to_string();
    }
}

/// Bad and total seconds accumulated for one dimension value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub bad: u64,
    pub total: u64,
}

impl Bucket {
    pub const fn add(&mut self, bad: u64, total: u64) {
        self.bad = self.bad.saturating_add(bad);
        self.total = self.total.saturating_add(total);
    }

    #[must_use]
    pub fn bad_percentage(&self) -> f64 {
        bad_percentage(self.bad, self.total)
    }

    /// Restores `bad <= total`. Returns `true` if the bucket was changed.
    pub const fn heal(&mut self) -> bool {
        if self.bad > self.total {
            self.total = self.bad;
            true
        } else {
            false
        }
    }
}

/// A named time-window bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindowBucket {
    pub name: String,
    #[serde(flatten)]
    pub duration: Bucket,
}

impl TimeWindowBucket {
    fn empty(window: TimeWindow) -> Self {
        Self {
            name: window.name().to_string(),
            duration: Bucket::default(),
        }
    }
}

/// One closed-out day in the rolling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    pub date: String,
    pub bad_posture_duration: u64,
    pub total_duration: u64,
    pub bad_posture_percentage: f64,
}

/// Per-user posture statistics, loaded at session start and written back
/// periodically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatisticsRecord {
    pub daily_bad_posture_duration: u64,
    pub daily_duration: u64,
    /// Local calendar date (`YYYY-MM-DD`) of the last rollover check.
    pub last_used_date_str: String,
    /// Oldest first.
    #[serde(rename = "badPosturePercentageLast120Days")]
    pub history: VecDeque<DailyEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowest_bad_posture_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_bad_posture_percentage: Option<f64>,
    pub cumulative_time_window_duration: [TimeWindowBucket; WINDOW_COUNT],
    pub cumulative_work_duration: Bucket,
    pub cumulative_study_duration: Bucket,
    pub cumulative_entertainment_duration: Bucket,
    pub longest_good_posture_duration: u64,
}

impl Default for StatisticsRecord {
    fn default() -> Self {
        Self {
            daily_bad_posture_duration: 0,
            daily_duration: 0,
            last_used_date_str: String::new(),
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            lowest_bad_posture_percentage: None,
            highest_bad_posture_percentage: None,
            cumulative_time_window_duration: TimeWindow::ALL.map(TimeWindowBucket::empty),
            cumulative_work_duration: Bucket::default(),
            cumulative_study_duration: Bucket::default(),
            cumulative_entertainment_duration: Bucket::default(),
            longest_good_posture_duration: 0,
        }
    }
}

impl StatisticsRecord {
    #[must_use]
    pub const fn activity_bucket(&self, activity: Activity) -> &Bucket {
        match activity {
            Activity::Work => &self.cumulative_work_duration,
            Activity::Study => &self.cumulative_study_duration,
            Activity::Entertainment => &self.cumulative_entertainment_duration,
        }
    }

    pub const fn activity_bucket_mut(&mut self, activity: Activity) -> &mut Bucket {
        match activity {
            Activity::Work => &mut self.cumulative_work_duration,
            Activity::Study => &mut self.cumulative_study_duration,
            Activity::Entertainment => &mut self.cumulative_entertainment_duration,
        }
    }

    #[must_use]
    pub const fn time_window_bucket(&self, window: TimeWindow) -> &Bucket {
        &self.cumulative_time_window_duration[window.index()].duration
    }

    pub const fn time_window_bucket_mut(&mut self, window: TimeWindow) -> &mut Bucket {
        &mut self.cumulative_time_window_duration[window.index()].duration
    }

    /// Raises the daily total to the daily bad duration if it fell behind.
    pub fn heal_daily(&mut self) -> bool {
        if self.daily_bad_posture_duration > self.daily_duration {
            tracing::debug!(
                bad = self.daily_bad_posture_duration,
                total = self.daily_duration,
                "daily total behind bad duration, raising total"
            );
            self.daily_duration = self.daily_bad_posture_duration;
            true
        } else {
            false
        }
    }

    /// Raises `longest_good_posture_duration` if `streak` exceeds it.
    pub fn observe_good_streak(&mut self, streak: u64) {
        if streak > self.longest_good_posture_duration {
            self.longest_good_posture_duration = streak;
        }
    }

    /// Closes out the previous day if `today` differs from the last used date.
    ///
    /// The closed day is appended to the history (evicting the oldest entry at
    /// capacity), folded into the running min/max and the daily counters are
    /// reset. The last used date always becomes `today`.
    pub fn roll_over_to(&mut self, today: &str) -> Option<DailyEntry> {
        if self.last_used_date_str == today {
            return None;
        }
        if self.last_used_date_str.is_empty() {
            self.last_used_date_str = today.to_string();
            return None;
        }

        self.heal_daily();
        let percentage = bad_percentage(self.daily_bad_posture_duration, self.daily_duration);
        let entry = DailyEntry {
            date: std::mem::replace(&mut self.last_used_date_str, today.to_string()),
            bad_posture_duration: self.daily_bad_posture_duration,
            total_duration: self.daily_duration,
            bad_posture_percentage: percentage,
        };

        while self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(entry.clone());

        self.lowest_bad_posture_percentage = Some(
            self.lowest_bad_posture_percentage
                .map_or(percentage, |lowest| lowest.min(percentage)),
        );
        self.highest_bad_posture_percentage = Some(
            self.highest_bad_posture_percentage
                .map_or(percentage, |highest| highest.max(percentage)),
        );

        self.daily_bad_posture_duration = 0;
        self.daily_duration = 0;

        tracing::info!(
            date = %entry.date,
            bad = entry.bad_posture_duration,
            total = entry.total_duration,
            percentage = entry.bad_posture_percentage,
            "closed out day"
        );
        Some(entry)
    }

    /// Repairs a freshly loaded record: caps the history, rewrites long-form
    /// dates as `YYYY-MM-DD`, restores `bad <= total` everywhere and
    /// re-labels the time-window buckets.
    pub fn normalize(&mut self) {
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
        canonicalize_date(&mut self.last_used_date_str);
        for entry in &mut self.history {
            canonicalize_date(&mut entry.date);
        }
        self.heal_daily();
        for (bucket, window) in self
            .cumulative_time_window_duration
            .iter_mut()
            .zip(TimeWindow::ALL)
        {
            bucket.duration.heal();
            if bucket.name != window.name() {
                bucket.name = window.name().to_string();
            }
        }
        for activity in Activity::ALL {
            self.activity_bucket_mut(activity).heal();
        }
    }
}
