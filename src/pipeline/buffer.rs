//! Per-device, time-windowed frame buffer
//!
//! Expiry is lazy: every `put`, `snapshot`, `size` and `drain` first drops
//! frames whose age has reached the window, so no observer ever sees a frame
//! older than `window`. There is no background sweep to manage.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::clock::Clock;
use crate::capture::Frame;
use crate::error::{Result, VigilError};

/// A frame as held by the buffer
#[derive(Clone, Debug)]
pub struct BufferedFrame {
    /// Producer-assigned ordinal, used only for temporal ordering
    pub sequence_index: i64,
    pub frame: Frame,
    pub arrival: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    Partial,
    Full,
}

/// Point-in-time counters for one buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub accepted: u64,
    pub rejected: u64,
    pub expired: u64,
}

#[derive(Default)]
struct Stats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    expired: AtomicU64,
}

/// Bounded collection of recent frames for a single device.
///
/// All state sits behind one mutex owned by this buffer; buffers for
/// different devices never share a lock.
pub struct FrameBuffer {
    device_id: String,
    capacity: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
    /// Insertion order, so arrival times are non-decreasing front to back
    items: Mutex<VecDeque<BufferedFrame>>,
    stats: CachePadded<Stats>,
}

impl FrameBuffer {
    pub fn new(
        device_id: impl Into<String>,
        capacity: usize,
        window: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            capacity,
            window,
            clock,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            stats: CachePadded::new(Stats::default()),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Append a frame stamped with the current time.
    ///
    /// Never waits for space: when the buffer still holds `capacity` frames
    /// after expiry the frame is rejected with [`VigilError::Full`] and the
    /// stored frames are left untouched.
    pub fn put(&self, sequence_index: i64, frame: Frame) -> Result<()> {
        let mut items = self.items.lock();
        let now = self.clock.now();
        self.purge_expired(&mut items, now);

        if items.len() >= self.capacity {
            drop(items);
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("vigil_frames_rejected_total").increment(1);
            warn!(device_id = %self.device_id, sequence_index, "frame buffer full, dropping frame");
            return Err(VigilError::Full {
                device_id: self.device_id.clone(),
                capacity: self.capacity,
            });
        }

        items.push_back(BufferedFrame {
            sequence_index,
            frame,
            arrival: now,
        });
        let len = items.len();
        drop(items);

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("vigil_frames_accepted_total").increment(1);
        debug!(device_id = %self.device_id, sequence_index, len, "buffered frame");
        Ok(())
    }

    /// All live frames sorted by `sequence_index`; ties keep arrival order.
    pub fn snapshot(&self) -> Vec<BufferedFrame> {
        let mut frames: Vec<BufferedFrame> = {
            let mut items = self.items.lock();
            let now = self.clock.now();
            self.purge_expired(&mut items, now);
            items.iter().cloned().collect()
        };
        frames.sort_by_key(|f| f.sequence_index);
        frames
    }

    /// Like [`snapshot`](Self::snapshot) but also empties the buffer.
    pub fn drain(&self) -> Vec<BufferedFrame> {
        let mut frames: Vec<BufferedFrame> = {
            let mut items = self.items.lock();
            let now = self.clock.now();
            self.purge_expired(&mut items, now);
            items.drain(..).collect()
        };
        frames.sort_by_key(|f| f.sequence_index);
        frames
    }

    /// Remove the earliest-arrived live frame, if any.
    pub fn pop_oldest(&self) -> Option<BufferedFrame> {
        let mut items = self.items.lock();
        let now = self.clock.now();
        self.purge_expired(&mut items, now);
        items.pop_front()
    }

    /// Number of live frames.
    pub fn size(&self) -> usize {
        let mut items = self.items.lock();
        let now = self.clock.now();
        self.purge_expired(&mut items, now);
        items.len()
    }

    pub fn state(&self) -> BufferState {
        match self.size() {
            0 => BufferState::Empty,
            n if n >= self.capacity => BufferState::Full,
            _ => BufferState::Partial,
        }
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            accepted: self.stats.accepted.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            expired: self.stats.expired.load(Ordering::Relaxed),
        }
    }

    fn purge_expired(&self, items: &mut VecDeque<BufferedFrame>, now: Instant) {
        let mut expired = 0u64;
        while let Some(front) = items.front() {
            if now.saturating_duration_since(front.arrival) < self.window {
                break;
            }
            items.pop_front();
            expired += 1;
        }
        if expired > 0 {
            self.stats.expired.fetch_add(expired, Ordering::Relaxed);
            metrics::counter!("vigil_frames_expired_total").increment(expired);
            trace!(device_id = %self.device_id, expired, "expired stale frames");
        }
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("device_id", &self.device_id)
            .field("capacity", &self.capacity)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
