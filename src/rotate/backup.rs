//! Backup naming and discovery of backups already on disk.

use super::compress::gz_path;
use crate::Error;
use chrono::{DateTime, Local};
use regex::Regex;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A rotated-out file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    /// Where the backup currently lives (`.gz` once compression finished).
    pub path: PathBuf,
    /// Rotation time, or the file's mtime for backups found on disk.
    pub created: DateTime<Local>,
    pub size: u64,
    pub compressed: bool,
}

impl BackupFile {
    /// Deletes the backup, including its `.gz` twin if compression completed
    /// after this entry was recorded. Returns the bytes freed.
    pub(super) fn remove(&self) -> Result<u64, Error> {
        let mut freed = 0;
        let mut found = false;
        let candidates = if self.compressed {
            vec![self.path.clone()]
        } else {
            vec![self.path.clone(), gz_path(&self.path)]
        };
        for path in candidates {
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&path) {
                Ok(()) => {
                    found = true;
                    freed += size;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if !found {
            crate::internal::debug(
                "ROTATE",
                &format!("Backup {} already gone", self.path.display()),
            );
        }
        Ok(freed)
    }
}

/// `<path>.<YYYYMMDD_HHMMSS>_<seq>`, with the sequence zero-padded to four digits.
#[must_use]
pub fn default_backup_name(path: &Path, time: &DateTime<Local>, seq: u32) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}_{seq:04}", time.format(STAMP_FORMAT)));
    PathBuf::from(name)
}

fn backup_pattern(file_name: &str) -> Result<Regex, Error> {
    Regex::new(&format!(
        r"^{}\.(\d{{8}}_\d{{6}})_(\d+)(\.gz)?$",
        regex::escape(file_name)
    ))
    .map_err(|e| Error::config(format!("invalid backup pattern: {e}")))
}

/// Backups of `path` carrying default names, oldest first, plus the highest sequence seen.
pub(super) fn discover(path: &Path) -> Result<(Vec<BackupFile>, u32), Error> {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok((Vec::new(), 0));
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !dir.is_dir() {
        return Ok((Vec::new(), 0));
    }

    let pattern = backup_pattern(file_name)?;
    let mut found: Vec<(BackupFile, u32)> = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(caps) = pattern.captures(name) else {
            continue;
        };
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let seq = caps[2].parse::<u32>().unwrap_or(0);
        let created = meta
            .modified()
            .map_or_else(|_| Local::now(), DateTime::<Local>::from);
        found.push((
            BackupFile {
                path: entry.path(),
                created,
                size: meta.len(),
                compressed: caps.get(3).is_some(),
            },
            seq,
        ));
    }

    found.sort_by(|(a, sa), (b, sb)| a.created.cmp(&b.created).then(sa.cmp(sb)));
    let max_seq = found.iter().map(|(_, s)| *s).max().unwrap_or(0);
    Ok((found.into_iter().map(|(b, _)| b).collect(), max_seq))
}

/// Backups of `path` with default names, oldest first.
///
/// # Errors
/// The directory cannot be read.
pub fn list_backups(path: &Path) -> Result<Vec<BackupFile>, Error> {
    discover(path).map(|(backups, _)| backups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn default_name_appends_stamp_and_sequence() {
        let t = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let name = default_backup_name(Path::new("/var/log/app.log"), &t, 7);
        assert_eq!(name, PathBuf::from("/var/log/app.log.20240309_070501_0007"));
    }

    #[test]
    fn discovers_only_matching_backups() {
        let dir = TempDir::new().unwrap();
        let live = dir.path().join("app.log");
        fs::write(&live, "live").unwrap();
        fs::write(dir.path().join("app.log.20240101_000000_0003"), "a").unwrap();
        fs::write(dir.path().join("app.log.20240101_010000_0012.gz"), "b").unwrap();
        fs::write(dir.path().join("app.log.bak"), "c").unwrap();
        fs::write(dir.path().join("other.log.20240101_000000_0001"), "d").unwrap();

        let (backups, max_seq) = discover(&live).unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(max_seq, 12);
        assert_eq!(backups.iter().filter(|b| b.compressed).count(), 1);
    }
}
