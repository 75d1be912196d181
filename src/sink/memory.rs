use super::{Capability, Sink};
use crate::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Shared {
    bytes: Mutex<Vec<u8>>,
    writes: AtomicUsize,
    flushes: AtomicUsize,
    syncs: AtomicUsize,
    closes: AtomicUsize,
}

/// In-memory sink whose clones all see the same bytes.
///
/// Counts every call it receives, which makes it a convenient spy in tests.
#[derive(Debug, Clone)]
pub struct MemorySink {
    shared: Arc<Shared>,
    capability: Capability,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// A sink declaring [`Capability::Flush`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capability(Capability::Flush)
    }

    #[must_use]
    pub fn with_capability(capability: Capability) -> Self {
        Self {
            shared: Arc::default(),
            capability,
        }
    }

    fn bytes(&self) -> MutexGuard<'_, Vec<u8>> {
        self.shared
            .bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.bytes().clone()
    }

    #[must_use]
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents_string().lines().map(str::to_string).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.bytes().clear();
    }

    /// Physical `write_all` calls received.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.shared.flushes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sync_count(&self) -> usize {
        self.shared.syncs.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }
}

impl Sink for MemorySink {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.bytes().extend_from_slice(buf);
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.shared.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        self.shared.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
