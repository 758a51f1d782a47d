//! Archive and backup commands.

use std::io::Write;

use anyhow::Result;

use crate::Store;

/// Moves old history into a new archive file and saves the trimmed data.
pub fn archive<W: Write>(writer: &mut W, store: &mut Store, force: bool) -> Result<()> {
    match store.archive(force)? {
        Some(path) => writeln!(writer, "Archived old history to {}", path.display())?,
        None => writeln!(writer, "Nothing to archive.")?,
    }
    store.save()?;
    Ok(())
}

pub fn backup<W: Write>(writer: &mut W, store: &mut Store) -> Result<()> {
    store.save()?;
    let path = store.backup()?;
    writeln!(writer, "Wrote backup to {}", path.display())?;
    Ok(())
}
