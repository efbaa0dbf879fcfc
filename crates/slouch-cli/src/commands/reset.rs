//! Reset command: forget all statistics.

use std::io::Write;

use anyhow::{Result, bail};
use slouch_store::{KeyValueStore, clear_statistics};

/// Deletes the statistics record and the remembered activity.
///
/// Refuses to run without `confirmed`, since the history cannot be
/// recovered. Callers hold the [`SessionLock`](super::run::SessionLock)
/// so no session is recording while the record is deleted.
pub fn run<W: Write, S: KeyValueStore + ?Sized>(
    writer: &mut W,
    store: &mut S,
    confirmed: bool,
) -> Result<()> {
    if !confirmed {
        bail!("refusing to delete statistics without --yes");
    }
    clear_statistics(store)?;
    tracing::info!("statistics cleared");
    writeln!(writer, "Statistics cleared.")?;
    Ok(())
}
