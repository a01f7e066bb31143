//! Latest-Value Hand-off Slot
//!
//! Single-slot mailbox with overwrite-on-full semantics, used wherever a
//! fast producer must never wait for a slow consumer:
//!
//! ```text
//! Producer (never blocks)          LatestSlot<T>            Consumer
//! ━━━━━━━━━━━━━━━━━━━━━━           ━━━━━━━━━━━━━            ━━━━━━━━
//!
//! offer(frame N)   ──────────────> [ frame N ]
//! offer(frame N+1) ──────────────> [ frame N+1 ]  (N overwritten)
//!                                        │
//!                                        └──────────> take_timeout()
//! ```
//!
//! - Camera thread → effect engine: raw frames, latest wins
//! - Render thread → export pump: composited frames, at most one in flight
//!
//! A closed slot rejects new offers and wakes any waiting consumer.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Hand-off statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandoffStats {
    /// Values offered by the producer
    pub offered: u64,
    /// Values replaced before the consumer took them
    pub overwritten: u64,
    /// Values taken by the consumer
    pub taken: u64,
    /// Offers rejected because the slot was closed
    pub rejected: u64,
}

impl HandoffStats {
    /// Fraction of offered values that never reached the consumer
    pub fn overwrite_rate(&self) -> f64 {
        if self.offered == 0 {
            0.0
        } else {
            self.overwritten as f64 / self.offered as f64
        }
    }
}

struct SlotState<T> {
    value: Option<T>,
    closed: bool,
    stats: HandoffStats,
}

/// Single-value mailbox where a new value replaces an unconsumed one
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> LatestSlot<T> {
    /// Create an empty, open slot
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                closed: false,
                stats: HandoffStats::default(),
            }),
            ready: Condvar::new(),
        }
    }

    /// Store a value, replacing any value the consumer has not taken yet.
    ///
    /// Returns the replaced value, or the offered value itself if the slot
    /// is closed. Never blocks beyond the internal lock.
    pub fn offer(&self, value: T) -> Option<T> {
        let mut state = self.state.lock();
        if state.closed {
            state.stats.rejected += 1;
            return Some(value);
        }

        state.stats.offered += 1;
        let replaced = state.value.replace(value);
        if replaced.is_some() {
            state.stats.overwritten += 1;
        }
        drop(state);

        self.ready.notify_one();
        replaced
    }

    /// Take the current value without waiting
    pub fn try_take(&self) -> Option<T> {
        let mut state = self.state.lock();
        let value = state.value.take();
        if value.is_some() {
            state.stats.taken += 1;
        }
        value
    }

    /// Wait up to `timeout` for a value.
    ///
    /// Returns `None` on timeout or once the slot is closed and empty.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if let Some(value) = state.value.take() {
                state.stats.taken += 1;
                return Some(value);
            }
            if state.closed {
                return None;
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                let value = state.value.take();
                if value.is_some() {
                    state.stats.taken += 1;
                }
                return value;
            }
        }
    }

    /// Close the slot, dropping any pending value and waking consumers
    pub fn close(&self) -> Option<T> {
        let mut state = self.state.lock();
        state.closed = true;
        let pending = state.value.take();
        drop(state);

        self.ready.notify_all();
        pending
    }

    /// Reopen a closed slot so it can be reused for another session
    pub fn reopen(&self) {
        let mut state = self.state.lock();
        state.closed = false;
        state.value = None;
    }

    /// Check if the slot is closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Check if a value is waiting
    pub fn is_occupied(&self) -> bool {
        self.state.lock().value.is_some()
    }

    /// Get hand-off statistics
    pub fn stats(&self) -> HandoffStats {
        self.state.lock().stats
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
