use super::backup::{self, BackupFile, default_backup_name};
use super::compress::{Job, gz_path};
use super::retention::{self, RetentionResult};
use super::RotateConfig;
use crate::Error;
use crate::internal;
use crate::sink::{Capability, Sink};
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The live file of a rotation set.
///
/// Works on `&mut self`; the owner provides the lock (see
/// [`RotateConfig::create_sink`] and [`SharedRotatingFile`](super::SharedRotatingFile)).
#[derive(Debug)]
pub struct RotatingFile {
    config: RotateConfig,
    /// `None` after a failed reopen; the next write retries.
    file: Option<File>,
    size: u64,
    /// Time bucket of the live file, when time rotation is on.
    bucket: Option<String>,
    seq: u32,
    /// Oldest first.
    backups: Vec<BackupFile>,
    pending: Vec<Job>,
    deferred: Option<Error>,
    closed: bool,
}

fn open_append(path: &Path) -> Result<File, Error> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

impl RotatingFile {
    /// # Errors
    /// Invalid configuration, or the live file cannot be created.
    pub fn new(config: RotateConfig) -> Result<Self, Error> {
        config.validate()?;
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = open_append(&config.path)?;
        let meta = file.metadata()?;
        let size = meta.len();
        let bucket = config.rotate_time.map(|rt| {
            // A file left over from an earlier period rotates on its first write.
            let since = match meta.modified() {
                Ok(mtime) if size > 0 => DateTime::<Local>::from(mtime),
                _ => config.clock.now(),
            };
            rt.bucket(&since)
        });

        let (backups, max_seq) = if config.namer.is_none() {
            backup::discover(&config.path)?
        } else {
            (Vec::new(), 0)
        };

        internal::debug(
            "ROTATE",
            &format!(
                "Opened {} ({size} bytes, {} existing backups)",
                config.path.display(),
                backups.len()
            ),
        );

        Ok(Self {
            config,
            file: Some(file),
            size,
            bucket,
            seq: max_seq.saturating_add(1),
            backups,
            pending: Vec::new(),
            deferred: None,
            closed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    #[must_use]
    pub const fn config(&self) -> &RotateConfig {
        &self.config
    }

    /// Bytes in the live file as tracked by the engine.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Known backups, oldest first.
    #[must_use]
    pub fn backups(&self) -> &[BackupFile] {
        &self.backups
    }

    /// Sequence number the next backup will carry.
    #[must_use]
    pub const fn next_sequence(&self) -> u32 {
        self.seq
    }

    fn backup_name(&self, now: &DateTime<Local>) -> PathBuf {
        match &self.config.namer {
            Some(namer) => namer(&self.config.path, now, self.seq),
            None => default_backup_name(&self.config.path, now, self.seq),
        }
    }

    fn size_trigger(&self, pending: u64, len: u64) -> bool {
        let projected = self.size + pending;
        self.config.max_size > 0 && projected > 0 && projected + len > self.config.max_size
    }

    fn time_trigger(&self, now: &DateTime<Local>) -> bool {
        match (self.config.rotate_time, &self.bucket) {
            (Some(rt), Some(bucket)) => rt.bucket(now) > *bucket,
            _ => false,
        }
    }

    fn ensure_open(&mut self) -> Result<&mut File, Error> {
        if self.file.is_none() {
            let file = open_append(&self.config.path)?;
            self.size = file.metadata()?.len();
            internal::info(
                "ROTATE",
                &format!("Reopened {}", self.config.path.display()),
            );
            self.file = Some(file);
        }
        self.file.as_mut().ok_or(Error::Closed)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if bytes.is_empty() {
            return Ok(());
        }
        let file = self.ensure_open()?;
        if let Err(e) = Write::write_all(file, bytes) {
            // Part of the write may have landed.
            if let Ok(meta) = file.metadata() {
                self.size = meta.len();
            }
            return Err(e.into());
        }
        self.size += bytes.len() as u64;
        Ok(())
    }

    /// Renames the live file away and opens a fresh one. A rename failure keeps
    /// the old handle and bucket; the error is returned for the deferred channel.
    fn rotate_at(&mut self, now: &DateTime<Local>) -> Result<(), Error> {
        let backup_path = self.backup_name(now);
        if let Err(e) = fs::rename(&self.config.path, &backup_path) {
            internal::warn(
                "ROTATE",
                &format!(
                    "Could not rename {} to {}: {e}",
                    self.config.path.display(),
                    backup_path.display()
                ),
            );
            return Err(Error::rotate(&self.config.path, e));
        }

        internal::debug(
            "ROTATE",
            &format!(
                "Rotated {} -> {} ({} bytes)",
                self.config.path.display(),
                backup_path.display(),
                self.size
            ),
        );
        self.seq = self.seq.saturating_add(1);
        self.backups.push(BackupFile {
            path: backup_path.clone(),
            created: *now,
            size: self.size,
            compressed: false,
        });

        // The old handle now points at the backup.
        self.file = None;
        self.size = 0;
        self.bucket = self.config.rotate_time.map(|rt| rt.bucket(now));
        match open_append(&self.config.path) {
            Ok(file) => self.file = Some(file),
            Err(e) => internal::error(
                "ROTATE",
                &format!("Could not reopen {}: {e}", self.config.path.display()),
            ),
        }

        if self.config.compress {
            match Job::spawn(backup_path.clone()) {
                Ok(job) => self.pending.push(job),
                Err(e) => self.defer(Error::compress(backup_path, e)),
            }
        }

        self.retain(now);
        Ok(())
    }

    fn defer(&mut self, err: Error) {
        self.deferred = Some(err);
    }

    /// Collects finished compressions, marking their backups as compressed.
    fn reap(&mut self) {
        let (done, running): (Vec<Job>, Vec<Job>) =
            std::mem::take(&mut self.pending).into_iter().partition(Job::is_finished);
        self.pending = running;
        for job in done {
            if let Err(e) = self.finish(job) {
                self.defer(e);
            }
        }
    }

    fn finish(&mut self, job: Job) -> Result<(), Error> {
        let path = job.path.clone();
        match job.join() {
            Ok(_) => {
                if let Some(b) = self.backups.iter_mut().find(|b| b.path == path) {
                    b.path = gz_path(&path);
                    b.compressed = true;
                    b.size = fs::metadata(&b.path).map_or(b.size, |m| m.len());
                }
                Ok(())
            }
            Err(e) => {
                internal::warn("ROTATE", &e.to_string());
                Err(e)
            }
        }
    }

    fn retain(&mut self, now: &DateTime<Local>) -> RetentionResult {
        self.reap();
        let policy = self.config.retention();
        let pending = &mut self.pending;
        let mut failures = Vec::new();
        let result = retention::apply(&mut self.backups, &policy, now, |backup| {
            if let Some(i) = pending.iter().position(|j| j.path == backup.path)
                && let Err(e) = pending.swap_remove(i).join()
            {
                failures.push(e);
            }
        });
        if let Some(e) = failures.pop() {
            self.defer(e);
        }
        if let Some((path, reason)) = result.failed.last() {
            self.defer(Error::Io(Arc::new(std::io::Error::other(format!(
                "could not delete backup {}: {reason}",
                path.display()
            )))));
        }
        if !result.deleted.is_empty() {
            internal::debug(
                "ROTATE",
                &format!("Retention removed {} backup(s)", result.deleted.len()),
            );
        }
        result
    }

    /// Rotates now, regardless of triggers.
    ///
    /// # Errors
    /// The live file could not be renamed, or the engine is closed.
    pub fn rotate(&mut self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let now = self.config.clock.now();
        self.rotate_at(&now)
    }

    /// Runs one retention pass without rotating.
    pub fn prune(&mut self) -> RetentionResult {
        let now = self.config.clock.now();
        self.retain(&now)
    }

    /// Blocks until every scheduled compression is done.
    ///
    /// # Errors
    /// The last compression failure, if any.
    pub fn wait_compressions(&mut self) -> Result<(), Error> {
        let mut result = Ok(());
        for job in std::mem::take(&mut self.pending) {
            if let Err(e) = self.finish(job) {
                result = Err(e);
            }
        }
        result
    }
}

impl Sink for RotatingFile {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.write_segments(buf, &[buf.len()])
    }

    /// Checks the triggers before every record, so a rotation always falls
    /// between records. At most one rotation is attempted per record.
    fn write_segments(&mut self, buf: &[u8], ends: &[usize]) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        if buf.is_empty() {
            return Ok(());
        }

        let now = self.config.clock.now();
        let mut run_start = 0;
        let mut start = 0;
        let mut rename_failed = false;

        let last = (ends.last() != Some(&buf.len())).then_some(buf.len());
        for end in ends.iter().copied().filter(|&e| e <= buf.len()).chain(last) {
            if end <= start {
                continue;
            }
            let pending = (start - run_start) as u64;
            let len = (end - start) as u64;
            if !rename_failed && (self.size_trigger(pending, len) || self.time_trigger(&now)) {
                let run = &buf[run_start..start];
                self.write_raw(run)?;
                run_start = start;
                if let Err(e) = self.rotate_at(&now) {
                    rename_failed = true;
                    self.defer(e);
                }
            }
            start = end;
        }
        self.write_raw(&buf[run_start..])
    }

    fn capability(&self) -> Capability {
        Capability::Sync
    }

    fn flush(&mut self) -> Result<(), Error> {
        if let Some(file) = self.file.as_mut() {
            Write::flush(file)?;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        if let Some(file) = self.file.as_mut() {
            file.sync_data()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let synced = self.sync();
        self.file = None;
        let compressed = self.wait_compressions();
        internal::debug(
            "ROTATE",
            &format!("Closed {}", self.config.path.display()),
        );
        synced.and(compressed)
    }

    fn take_error(&mut self) -> Option<Error> {
        self.reap();
        self.deferred.take()
    }
}

impl Drop for RotatingFile {
    fn drop(&mut self) {
        if let Err(e) = self.wait_compressions() {
            internal::error("ROTATE", &e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotate::{ManualClock, RotateTime};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn clock_at(h: u32, m: u32) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Local.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap(),
        ))
    }

    #[test]
    fn rotates_between_records_of_one_batch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut file = RotateConfig::new(&path)
            .rotate_time(None)
            .max_size(10)
            .create()
            .unwrap();

        file.write_segments(b"aaaa\nbbbb\ncccc\n", &[5, 10, 15]).unwrap();

        assert_eq!(file.backups().len(), 1);
        assert_eq!(fs::read_to_string(&file.backups()[0].path).unwrap(), "aaaa\nbbbb\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "cccc\n");
        assert_eq!(file.size(), 5);
    }

    #[test]
    fn time_trigger_fires_once_per_bucket() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let clock = clock_at(10, 30);
        let mut file = RotateConfig::new(&path)
            .rotate_time(Some(RotateTime::Hour))
            .clock(clock.clone())
            .create()
            .unwrap();

        file.write_all(b"one\n").unwrap();
        clock.advance(Duration::minutes(20));
        file.write_all(b"two\n").unwrap();
        assert!(file.backups().is_empty());

        clock.advance(Duration::minutes(15));
        file.write_all(b"three\n").unwrap();
        file.write_all(b"four\n").unwrap();
        assert_eq!(file.backups().len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "three\nfour\n");
    }

    #[test]
    fn rename_failure_keeps_writing_to_old_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut file = RotateConfig::new(&path)
            .rotate_time(None)
            .max_size(4)
            .namer(|p, _, _| p.with_file_name("missing-dir").join("backup"))
            .create()
            .unwrap();

        file.write_all(b"abc\n").unwrap();
        file.write_all(b"def\n").unwrap();

        assert!(matches!(file.take_error(), Some(Error::Rotate { .. })));
        assert!(file.take_error().is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), "abc\ndef\n");
        assert!(file.backups().is_empty());
    }

    #[test]
    fn sequence_continues_after_existing_backups() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(dir.path().join("app.log.20240101_000000_0041"), "old").unwrap();

        let file = RotateConfig::new(&path).max_size(100).create().unwrap();
        assert_eq!(file.backups().len(), 1);
        assert_eq!(file.next_sequence(), 42);
    }

    #[test]
    fn closed_engine_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let mut file = RotateConfig::new(dir.path().join("app.log"))
            .create()
            .unwrap();
        file.close().unwrap();
        assert!(matches!(file.write_all(b"x\n"), Err(Error::Closed)));
        file.close().unwrap();
    }

    #[test]
    fn size_and_time_together_rotate_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let clock = clock_at(10, 59);
        let mut file = RotateConfig::new(&path)
            .rotate_time(Some(RotateTime::Hour))
            .max_size(10)
            .clock(clock.clone())
            .create()
            .unwrap();

        file.write_all(b"aaaa\n").unwrap();
        let seq = file.next_sequence();
        clock.advance(Duration::minutes(2));
        file.write_all(b"bbbbbbbb\n").unwrap();

        assert_eq!(file.backups().len(), 1);
        assert_eq!(file.next_sequence(), seq + 1);
        assert_eq!(fs::read_to_string(&file.backups()[0].path).unwrap(), "aaaa\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "bbbbbbbb\n");
        assert!(file.take_error().is_none());
    }

    #[test]
    fn undeletable_backup_is_reported_and_retried() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut file = RotateConfig::new(&path)
            .rotate_time(None)
            .max_size(8)
            .backup_num(1)
            .backup_time(Duration::zero())
            .clock(clock_at(12, 0))
            .create()
            .unwrap();

        file.write_all(b"aaaa\n").unwrap();
        file.write_all(b"bbbb\n").unwrap();
        let stuck = file.backups()[0].path.clone();

        // A non-empty directory in place of the backup cannot be removed as a file.
        fs::remove_file(&stuck).unwrap();
        fs::create_dir(&stuck).unwrap();
        fs::write(stuck.join("keep"), "x").unwrap();

        file.write_all(b"cccc\n").unwrap();
        assert!(matches!(file.take_error(), Some(Error::Io(_))));
        assert_eq!(file.backups().len(), 2);
        assert!(stuck.exists());

        fs::remove_dir_all(&stuck).unwrap();
        file.write_all(b"dddd\n").unwrap();
        assert!(file.take_error().is_none());
        assert_eq!(file.backups().len(), 1);
        assert_eq!(fs::read_to_string(&file.backups()[0].path).unwrap(), "cccc\n");
    }
}
