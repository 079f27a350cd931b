//! One synchronization cycle against the persisted calendar file.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::{Local, Utc};

use crate::{
    calendar::{BinCalendar, Collection, RetentionPolicy},
    codec,
};

/// What a synchronization cycle did, for the caller to log or act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub pruned: usize,
    pub written: bool,
}

/// Load the calendar at `path`.
///
/// A missing file is an empty calendar, not an error. Returns the calendar
/// and whether a document existed.
pub fn load(path: &Path) -> Result<(BinCalendar, bool)> {
    if !path.exists() {
        return Ok((BinCalendar::new(), false));
    }
    let ics = fs::read_to_string(path)
        .with_context(|| format!("failed to read calendar file {}", path.display()))?;
    let calendar = codec::parse(&ics)
        .with_context(|| format!("failed to parse calendar file {}", path.display()))?;
    Ok((calendar, true))
}

/// Run one cycle: load, merge the extracted facts, prune, and write the
/// document back.
///
/// The write only happens when the merge added an event, the prune removed
/// one or no document existed yet, so repeated runs against an unchanged
/// source page leave the file untouched. Merge runs before prune, so a
/// freshly merged past-dated fact can be pruned within the same cycle.
pub fn synchronize(
    path: &Path,
    collections: &[Collection],
    retention: RetentionPolicy,
) -> Result<SyncReport> {
    let (mut calendar, existed) = load(path)?;
    let now = Utc::now();
    let added = calendar.merge(collections, now);
    let pruned = calendar.prune(retention, Local::now().date_naive());
    let written = added > 0 || pruned > 0 || !existed;
    if written {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory {}", parent.display())
            })?;
        }
        fs::write(path, codec::serialize(&calendar, now))
            .with_context(|| format!("failed to write calendar file {}", path.display()))?;
    }
    Ok(SyncReport {
        added,
        pruned,
        written,
    })
}
