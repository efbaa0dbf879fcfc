//! Event loop that feeds a [`Session`] from detector input and timers.
//!
//! Everything runs on one task: input events, the time-window timer, the
//! checkpoint interval and the stall watchdog are multiplexed with
//! `tokio::select!`, so session operations never interleave. Writes are
//! handed to a [`Persister`] and never awaited by the loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use slouch_core::{Activity, Session, StatisticsRecord};
use slouch_store::{KeyValueStore, save_current_activity, save_statistics};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep, interval_at, sleep};

use crate::protocol::Input;

/// Source of wall-clock time for the session.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// The system's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Timer settings for [`run_session`].
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub checkpoint_interval: Duration,
    /// Warn when no sample arrives for this long while active.
    pub stall_after: Duration,
}

enum Job {
    Statistics(Box<StatisticsRecord>),
    Activity(Option<Activity>),
}

/// Fire-and-forget writer.
///
/// Jobs are queued on an unbounded channel and written in order by a single
/// worker task, so a later snapshot never lands before an earlier one. A
/// failed write is logged and dropped; the next checkpoint writes the full
/// record again.
pub struct Persister {
    tx: mpsc::UnboundedSender<Job>,
    worker: JoinHandle<()>,
}

impl Persister {
    /// Spawns the writer task on the current runtime.
    pub fn spawn<S>(store: Arc<Mutex<S>>) -> Self
    where
        S: KeyValueStore + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(write_loop(store, rx));
        Self { tx, worker }
    }

    pub fn save_statistics(&self, record: &StatisticsRecord) {
        self.enqueue(Job::Statistics(Box::new(record.clone())));
    }

    pub fn save_activity(&self, activity: Option<Activity>) {
        self.enqueue(Job::Activity(activity));
    }

    fn enqueue(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!("persistence worker is gone, dropping write");
        }
    }

    /// Waits for every queued write to complete.
    pub async fn finish(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            tracing::warn!(error = %e, "persistence worker failed");
        }
    }
}

async fn write_loop<S>(store: Arc<Mutex<S>>, mut rx: mpsc::UnboundedReceiver<Job>)
where
    S: KeyValueStore + Send + 'static,
{
    while let Some(job) = rx.recv().await {
        let store = Arc::clone(&store);
        let result = tokio::task::spawn_blocking(move || {
            let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
            match job {
                Job::Statistics(record) => save_statistics(&mut *store, &record),
                Job::Activity(activity) => save_current_activity(&mut *store, activity),
            }
        })
        .await;

        match result {
            Ok(Ok(())) => tracing::trace!("persisted"),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to persist statistics, keeping in-memory state");
            }
            Err(e) => tracing::warn!(error = %e, "persistence task panicked"),
        }
    }
}

async fn wait_sleep(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn wait_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn checkpoint_timer(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Drives `session` until a `Close` input, the end of input, or `shutdown`
/// completes, then closes it and returns the final record.
pub async fn run_session<C, F>(
    mut session: Session,
    mut inputs: mpsc::Receiver<Input>,
    persister: &Persister,
    clock: &C,
    options: &DriverOptions,
    shutdown: F,
) -> StatisticsRecord
where
    C: Clock + Sync,
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);
    let mut window_timer: Option<Pin<Box<Sleep>>> = None;
    let mut checkpoint: Option<Interval> = None;
    let mut watchdog: Option<Pin<Box<Sleep>>> = None;

    let reason = loop {
        tokio::select! {
            input = inputs.recv() => {
                let Some(input) = input else {
                    break "input closed";
                };
                let now = clock.now();
                match input {
                    Input::Sample(sample) => {
                        if session.ingest(sample, now).is_some() {
                            watchdog = Some(Box::pin(sleep(options.stall_after)));
                        }
                    }
                    Input::Activity(activity) => {
                        session.activity_changed(activity, now);
                        persister.save_activity(activity);
                    }
                    Input::Baseline => {
                        if let Some(delay) = session.baseline_established(now) {
                            window_timer = Some(Box::pin(sleep(delay)));
                            checkpoint = Some(checkpoint_timer(options.checkpoint_interval));
                            watchdog = Some(Box::pin(sleep(options.stall_after)));
                            persister.save_statistics(session.record());
                        }
                    }
                    Input::Close => break "close requested",
                }
            }
            () = wait_sleep(&mut window_timer) => {
                window_timer = session
                    .time_window_tick(clock.now())
                    .map(|delay| Box::pin(sleep(delay)));
            }
            () = wait_tick(&mut checkpoint) => {
                if session.checkpoint(clock.now()) {
                    persister.save_statistics(session.record());
                }
            }
            () = wait_sleep(&mut watchdog) => {
                tracing::warn!(
                    stalled_for = ?options.stall_after,
                    "no posture samples received, detector may have stalled"
                );
                watchdog = None;
            }
            () = &mut shutdown => break "shutdown requested",
        }
    };

    tracing::debug!(reason, "ending session");
    if session.close(clock.now()) {
        persister.save_statistics(session.record());
    }
    session.into_record()
}
