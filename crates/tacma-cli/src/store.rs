//! Loading and saving the tracker around a command.
//!
//! A [`Store`] pairs the live [`Tracker`] with its database. Every mutating
//! command loads, mutates and then calls [`Store::save`], which also applies
//! the archive trigger and refreshes a stale backup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tacma_core::{Clock, Tracker, TrackerConfig};
use tacma_db::Database;

use crate::Config;

pub struct Store {
    db: Database,
    tracker: Tracker,
    database_path: PathBuf,
    backup_path: PathBuf,
    backup_interval: Option<Duration>,
}

impl Store {
    /// Opens the configured database, falling back to the backup copy when
    /// the database cannot be read.
    pub fn open<C: Clock + Clone + 'static>(config: &Config, clock: C) -> Result<Self> {
        let database_path = config.database_path.clone();
        let backup_path = config.backup_path();
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }

        let db = Database::open(&database_path)
            .with_context(|| format!("failed to open {}", database_path.display()))?;
        let tracker_config = config.tracker_config();
        let tracker = match restore(&db, tracker_config, &clock) {
            Ok(Some(tracker)) => tracker,
            Ok(None) => {
                tracing::debug!(path = %database_path.display(), "starting a new tracker");
                Tracker::new(tracker_config, clock)
            }
            Err(err) if backup_path.exists() => {
                tracing::warn!(
                    error = %format!("{err:#}"),
                    backup = %backup_path.display(),
                    "failed to load database, falling back to backup"
                );
                let backup = Database::open(&backup_path)
                    .with_context(|| format!("failed to open {}", backup_path.display()))?;
                restore(&backup, tracker_config, &clock)
                    .with_context(|| format!("failed to load {}", backup_path.display()))?
                    .with_context(|| format!("backup {} is empty", backup_path.display()))?
            }
            Err(err) => {
                return Err(err.context(format!("failed to load {}", database_path.display())));
            }
        };

        Ok(Self {
            db,
            tracker,
            database_path,
            backup_path,
            backup_interval: config.backup_interval(),
        })
    }

    pub const fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub const fn tracker_mut(&mut self) -> &mut Tracker {
        &mut self.tracker
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Persists the tracker.
    ///
    /// Archives first if the history has grown old enough, and refreshes the
    /// backup when it is older than the configured interval. Returns the
    /// archive file if one was written.
    pub fn save(&mut self) -> Result<Option<PathBuf>> {
        let archived = self.archive(false)?;
        self.db
            .save_snapshot(&self.tracker.snapshot())
            .with_context(|| format!("failed to save {}", self.database_path.display()))?;
        self.refresh_backup()?;
        Ok(archived)
    }

    /// Splits old history into a new archive file next to the database.
    ///
    /// Only the archive is written here; call [`Store::save`] to persist the
    /// trimmed live data.
    pub fn archive(&mut self, force: bool) -> Result<Option<PathBuf>> {
        let plan = if force {
            self.tracker.plan_archive_forced()
        } else {
            self.tracker.plan_archive()
        };
        let Some(plan) = plan else {
            return Ok(None);
        };

        let path = next_archive_path(&self.database_path);
        let mut archive = Database::open(&path)
            .with_context(|| format!("failed to create archive {}", path.display()))?;
        archive
            .save_snapshot(&plan.archive)
            .with_context(|| format!("failed to write archive {}", path.display()))?;
        self.tracker.apply_archive(plan);
        tracing::info!(path = %path.display(), "wrote archive");
        Ok(Some(path))
    }

    /// Writes the backup copy unconditionally.
    pub fn backup(&self) -> Result<&Path> {
        self.db
            .backup_to(&self.backup_path)
            .with_context(|| format!("failed to write backup {}", self.backup_path.display()))?;
        Ok(&self.backup_path)
    }

    fn refresh_backup(&self) -> Result<()> {
        let Some(interval) = self.backup_interval else {
            return Ok(());
        };
        let stale = std::fs::metadata(&self.backup_path)
            .and_then(|meta| meta.modified())
            .map_or(true, |modified| {
                modified.elapsed().map_or(true, |age| age >= interval)
            });
        if stale {
            self.backup()?;
        }
        Ok(())
    }
}

fn restore<C: Clock + Clone + 'static>(
    db: &Database,
    config: TrackerConfig,
    clock: &C,
) -> Result<Option<Tracker>> {
    if db.is_empty()? {
        return Ok(None);
    }
    let report = db.load_snapshot()?;
    for warning in &report.warnings {
        tracing::warn!(%warning, "defaulted unreadable field");
    }
    let tracker = Tracker::from_snapshot(config, clock.clone(), report.snapshot)?;
    Ok(Some(tracker))
}

/// First `archive<N>.db` next to the database that does not exist yet.
fn next_archive_path(database_path: &Path) -> PathBuf {
    let dir = database_path.parent().unwrap_or_else(|| Path::new("."));
    let mut index = 1;
    loop {
        let candidate = dir.join(format!("archive{index}.db"));
        if !candidate.exists() {
            return candidate;
        }
        index += 1;
    }
}
