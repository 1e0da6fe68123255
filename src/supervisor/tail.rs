//! Bounded tail of the engine's diagnostic output.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_TAIL_LINES: usize = 50;

#[derive(Debug, Clone)]
pub struct LogTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        // A panicked writer leaves whole lines behind; keep using them.
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }
}

impl Default for LogTail {
    fn default() -> Self {
        Self::new(DEFAULT_TAIL_LINES)
    }
}
