use super::Record;

/// Records kept around when the pool is built with `RecordPool::default()`.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Bounded free-list of reusable records.
///
/// `release` takes the record by value, so a released record cannot still be
/// referenced by the caller.
#[derive(Debug)]
pub struct RecordPool {
    free: Vec<Record>,
    capacity: usize,
}

impl Default for RecordPool {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }
}

impl RecordPool {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// A cleared record, reused when one is available.
    pub fn acquire(&mut self) -> Record {
        self.free.pop().unwrap_or_default()
    }

    /// Resets the record and keeps it for the next call; dropped when the pool is full.
    pub fn release(&mut self, mut record: Record) {
        if self.free.len() < self.capacity {
            record.reset();
            self.free.push(record);
        }
    }

    /// Records currently waiting for reuse.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;

    #[test]
    fn released_record_comes_back_cleared() {
        let mut pool = RecordPool::with_capacity(2);
        let mut record = pool.acquire();
        record.level = Level::Error;
        record.message.push_str("boom");
        record.add_field("k", 1);
        record.add_extra("host", "a");
        pool.release(record);
        assert_eq!(pool.idle(), 1);

        let record = pool.acquire();
        assert_eq!(record.level, Level::Info);
        assert!(record.message.is_empty());
        assert!(record.fields.is_empty());
        assert!(record.extra.is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn full_pool_drops_extra_records() {
        let mut pool = RecordPool::with_capacity(1);
        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle(), 1);
    }
}
