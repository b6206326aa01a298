use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicU8, Ordering},
    Arc,
};

/// Hands out packet sequence numbers 1 to 9 in a cycle
///
/// Safe to share between threads; every caller gets a distinct step of the cycle.
#[derive(Debug)]
pub struct SequenceCounter {
    current: AtomicU8,
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self {
            current: AtomicU8::new(1),
        }
    }
}

impl SequenceCounter {
    /// A counter whose first value is 1
    pub fn new() -> Self {
        Default::default()
    }

    /// Take the current number and advance
    pub fn next(&self) -> u8 {
        match self
            .current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| Some(cur % 9 + 1))
        {
            Ok(prev) | Err(prev) => prev,
        }
    }

    /// The number the next call to [`SequenceCounter::next`] returns
    pub fn peek(&self) -> u8 {
        self.current.load(Ordering::SeqCst)
    }
}

/// A cooperative stop flag shared between a worker and whoever controls it
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    /// A handle that is not stopped
    pub fn new() -> Self {
        Default::default()
    }

    /// Ask the worker to stop at its next check
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    /// True once [`StopHandle::stop`] was called
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// A history that drops its oldest entry once full
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    /// An empty history keeping at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Add an entry, dropping the oldest if full
    pub fn push(&mut self, entry: T) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is held
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
