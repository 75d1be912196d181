//! Count- and age-based pruning of backups.

use super::backup::{BackupFile, list_backups};
use crate::Error;
use crate::internal;
use crate::logger::Logger;
use crate::size::format_size;
use chrono::{DateTime, Duration, Local};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Keep at most this many backups; 0 keeps all.
    pub backup_num: usize,
    /// Delete backups older than this; zero keeps all.
    pub backup_time: Duration,
}

impl RetentionPolicy {
    /// Whether the backup at `index` of an oldest-first list of `total` is past the limits.
    fn is_expired(&self, index: usize, total: usize, backup: &BackupFile, now: &DateTime<Local>) -> bool {
        let excess = if self.backup_num > 0 {
            total.saturating_sub(self.backup_num)
        } else {
            0
        };
        let too_old = self.backup_time > Duration::zero() && *now - backup.created > self.backup_time;
        index < excess || too_old
    }
}

/// What one retention pass removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionResult {
    pub deleted: Vec<PathBuf>,
    pub freed: u64,
    /// Backups that could not be removed, with the reason; they are retried next pass.
    pub failed: Vec<(PathBuf, String)>,
}

impl RetentionResult {
    #[must_use]
    pub fn count(&self) -> usize {
        self.deleted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.failed.is_empty()
    }

    pub fn log(&self, logger: &Logger) {
        if self.is_empty() {
            logger.info("no backups to prune");
            return;
        }
        if !self.deleted.is_empty() {
            logger.notice(format_args!(
                "deleted {} backup(s), freed {}",
                self.deleted.len(),
                format_size(self.freed)
            ));
            for path in &self.deleted {
                logger.info(format_args!("  {}", path.display()));
            }
        }
        for (path, reason) in &self.failed {
            logger.warn(format_args!("could not delete {}: {reason}", path.display()));
        }
    }
}

/// Removes the expired entries of an oldest-first `backups` list in place.
///
/// `before_remove` runs for every backup about to be deleted, which lets the
/// engine wait for a compression still writing it.
pub(super) fn apply<F>(
    backups: &mut Vec<BackupFile>,
    policy: &RetentionPolicy,
    now: &DateTime<Local>,
    mut before_remove: F,
) -> RetentionResult
where
    F: FnMut(&BackupFile),
{
    let total = backups.len();
    let mut result = RetentionResult::default();
    let mut kept = Vec::with_capacity(total);

    for (index, backup) in std::mem::take(backups).into_iter().enumerate() {
        if !policy.is_expired(index, total, &backup, now) {
            kept.push(backup);
            continue;
        }
        before_remove(&backup);
        match backup.remove() {
            Ok(freed) => {
                result.freed += freed;
                result.deleted.push(backup.path);
            }
            Err(e) => {
                internal::warn(
                    "ROTATE",
                    &format!("Could not delete backup {}: {e}", backup.path.display()),
                );
                result.failed.push((backup.path.clone(), e.to_string()));
                kept.push(backup);
            }
        }
    }

    *backups = kept;
    result
}

/// One retention pass over the backups of `path` found on disk.
///
/// # Errors
/// The backup directory cannot be read.
pub fn prune(path: &Path, backup_num: usize, backup_time: Duration) -> Result<RetentionResult, Error> {
    let mut backups = list_backups(path)?;
    let policy = RetentionPolicy {
        backup_num,
        backup_time,
    };
    let result = apply(&mut backups, &policy, &Local::now(), |_| {});
    internal::debug(
        "ROTATE",
        &format!(
            "Pruned {} backup(s) of {}, {} kept",
            result.count(),
            path.display(),
            backups.len()
        ),
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backup(name: &str, created: DateTime<Local>) -> BackupFile {
        BackupFile {
            path: PathBuf::from(name),
            created,
            size: 0,
            compressed: false,
        }
    }

    #[test]
    fn count_limit_expires_the_oldest() {
        let now = Local::now();
        let policy = RetentionPolicy {
            backup_num: 2,
            backup_time: Duration::zero(),
        };
        let list: Vec<_> = (0..4)
            .map(|i| backup(&format!("b{i}"), now - Duration::minutes(10 - i)))
            .collect();
        let expired: Vec<_> = list
            .iter()
            .enumerate()
            .filter(|(i, b)| policy.is_expired(*i, list.len(), b, &now))
            .map(|(_, b)| b.path.clone())
            .collect();
        assert_eq!(expired, vec![PathBuf::from("b0"), PathBuf::from("b1")]);
    }

    #[test]
    fn age_limit_expires_old_backups() {
        let now = Local::now();
        let policy = RetentionPolicy {
            backup_num: 0,
            backup_time: Duration::hours(1),
        };
        assert!(policy.is_expired(0, 1, &backup("old", now - Duration::hours(2)), &now));
        assert!(!policy.is_expired(0, 1, &backup("new", now - Duration::minutes(5)), &now));
    }
}
