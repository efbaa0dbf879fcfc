//! Run command: record one monitoring session.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use fs2::FileExt;
use slouch_core::{Activity, Session};
use slouch_store::{KeyValueStore, load_current_activity, load_statistics};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::Config;
use crate::driver::{Clock, DriverOptions, Persister, SystemClock, run_session};
use crate::protocol::read_inputs;

/// Exclusive lock held for the lifetime of a session, so two sessions never
/// write the same database.
#[derive(Debug)]
pub struct SessionLock {
    _file: File,
    path: PathBuf,
}

impl SessionLock {
    pub fn acquire(database_path: &Path) -> Result<Self> {
        let path = database_path.with_extension("lock");
        let file = File::create(&path)
            .with_context(|| format!("failed to create lock file {}", path.display()))?;
        file.try_lock_exclusive().with_context(|| {
            format!(
                "another session is already recording to {}",
                database_path.display()
            )
        })?;
        tracing::debug!(path = %path.display(), "acquired session lock");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for interrupts");
        std::future::pending::<()>().await;
    }
}

/// Runs a session over the detector events on stdin until `close`, end of
/// input, or an interrupt.
///
/// `activity` overrides the remembered activity; without it the last
/// selection from the store is used.
pub fn run<S>(store: S, config: &Config, activity: Option<Activity>) -> Result<()>
where
    S: KeyValueStore + Send + 'static,
{
    let record = load_statistics(&store).context("failed to read statistics")?;
    let initial_activity = match activity {
        Some(activity) => Some(activity),
        None => load_current_activity(&store).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to read remembered activity");
            None
        }),
    };

    let options = DriverOptions {
        checkpoint_interval: config.checkpoint_interval(),
        stall_after: config.stall_after(),
    };
    let mut session = Session::new(record, config.session_config());
    session.activity_changed(initial_activity, SystemClock.now());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let store = Arc::new(Mutex::new(store));
    let span = tracing::info_span!("session", id = %uuid::Uuid::new_v4());
    let record = runtime.block_on(
        async {
            let persister = Persister::spawn(store);
            if activity.is_some() {
                persister.save_activity(activity);
            }

            let (tx, rx) = mpsc::channel(64);
            tokio::spawn(read_inputs(BufReader::new(tokio::io::stdin()), tx));

            let record = run_session(
                session,
                rx,
                &persister,
                &SystemClock,
                &options,
                shutdown_signal(),
            )
            .await;
            persister.finish().await;
            record
        }
        .instrument(span),
    );
    // The stdin reader may still be blocked on a read.
    runtime.shutdown_background();

    tracing::info!(
        daily_bad = record.daily_bad_posture_duration,
        daily_total = record.daily_duration,
        "session finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_on_same_database_fails() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("slouch.db");

        let lock = SessionLock::acquire(&db_path).unwrap();
        assert_eq!(lock.path(), temp.path().join("slouch.lock"));

        let err = SessionLock::acquire(&db_path).unwrap_err();
        assert!(err.to_string().contains("already recording"));

        drop(lock);
        assert!(SessionLock::acquire(&db_path).is_ok());
    }
}
