// Bounded buffers for coalescing high-rate telemetry.
// Invariants: fixed capacity, producers never block, overflow drops the oldest entry.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::utils::lock;

#[derive(Debug)]
pub struct RingBuffer<T> {
    buf: VecDeque<T>,
    cap: usize,
}

impl<T> RingBuffer<T> {
    /// A zero capacity is raised to one so the latest entry always fits.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.buf.len() >= self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(item);
    }

    /// Inserts behind everything already buffered. Returns false (and drops the item)
    /// when the buffer is full.
    pub fn push_oldest(&mut self, item: T) -> bool {
        if self.buf.len() >= self.cap {
            return false;
        }
        self.buf.push_front(item);
        true
    }

    pub fn take_latest(&mut self) -> Option<T> {
        let latest = self.buf.pop_back();
        self.buf.clear();
        latest
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}

/// Coalescing queue shared by the ingest and publish loops.
#[derive(Debug)]
pub struct LatestValueQueue<T> {
    inner: Mutex<RingBuffer<T>>,
}

impl<T> LatestValueQueue<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Mutex::new(RingBuffer::new(cap)),
        }
    }

    pub fn push(&self, item: T) {
        lock(&self.inner).push(item);
    }

    /// Puts a payload back after a failed publish without shadowing anything newer.
    pub fn requeue(&self, item: T) -> bool {
        lock(&self.inner).push_oldest(item)
    }

    /// Returns the newest pending item and discards the rest.
    pub fn take(&self) -> Option<T> {
        lock(&self.inner).take_latest()
    }

    pub fn size(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn capacity(&self) -> usize {
        lock(&self.inner).capacity()
    }
}
