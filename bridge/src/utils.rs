// Shared utility helpers for timestamps and lock access.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

pub fn monotonic_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Counters and buffers stay consistent across a panicking holder, so poison is ignored.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
