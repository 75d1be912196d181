//! Gzip of rotated backups, run off the write path.

use crate::Error;
use crate::internal;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// `path` with `.gz` appended to its full file name.
pub(super) fn gz_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".gz");
    PathBuf::from(name)
}

/// Writes `<path>.gz` and removes `path`. A partial archive is removed on failure so
/// the plain backup stays the only copy.
pub(super) fn compress_file(path: &Path) -> Result<u64, Error> {
    let gz = gz_path(path);
    let result = encode(path, &gz);
    if result.is_err() {
        let _ = fs::remove_file(&gz);
        return result;
    }
    fs::remove_file(path)?;
    result
}

/// Bytes saved by compression.
fn encode(path: &Path, gz: &Path) -> Result<u64, Error> {
    let input = File::open(path)?;
    let original_size = input.metadata()?.len();
    let mut reader = BufReader::new(input);

    let writer = BufWriter::new(File::create(gz)?);
    let mut encoder = GzEncoder::new(writer, Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    let mut writer = encoder.finish()?;
    writer.flush()?;

    let compressed_size = fs::metadata(gz)?.len();
    Ok(original_size.saturating_sub(compressed_size))
}

/// A compression running on its own thread.
#[derive(Debug)]
pub(super) struct Job {
    pub(super) path: PathBuf,
    handle: JoinHandle<Result<u64, Error>>,
}

impl Job {
    pub(super) fn spawn(path: PathBuf) -> Result<Self, Error> {
        let target = path.clone();
        let handle = thread::Builder::new()
            .name("driftlog-compress".to_string())
            .spawn(move || compress_file(&target))?;
        Ok(Self { path, handle })
    }

    pub(super) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the job; errors carry the backup path.
    pub(super) fn join(self) -> Result<u64, Error> {
        let path = self.path;
        match self.handle.join() {
            Ok(Ok(saved)) => {
                internal::debug(
                    "ROTATE",
                    &format!("Compressed {} (saved {saved} bytes)", path.display()),
                );
                Ok(saved)
            }
            Ok(Err(e)) => Err(Error::compress(path, e)),
            Err(_) => Err(Error::compress(
                path,
                Error::from(io::Error::other("compression thread panicked")),
            )),
        }
    }
}
