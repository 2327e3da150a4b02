//! Single-slot latest-frame holder shared between capture and clients

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use crossbeam::utils::CachePadded;
use serde::Serialize;
use tokio::sync::watch;

use crate::capture::Frame;

/// Holds the most recently captured frame.
///
/// One writer (the capture loop) overwrites the slot; any number of readers
/// copy the frame out. Readers only hold the lock for the clone, which is a
/// couple of reference count bumps.
pub struct FrameCell {
    slot: RwLock<Option<Frame>>,

    /// Sequence of the last published frame, 0 while empty
    latest: watch::Sender<u64>,

    stats: CachePadded<Stats>,
}

#[derive(Default)]
struct Stats {
    frames_published: AtomicU64,
    frames_dropped: AtomicU64,
}

/// Point-in-time counters of a [`FrameCell`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameCellStats {
    pub frames_published: u64,
    pub frames_dropped: u64,
    pub latest_sequence: u64,
}

impl FrameCell {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(0);
        Self {
            slot: RwLock::new(None),
            latest,
            stats: CachePadded::new(Stats::default()),
        }
    }

    /// Replace the current frame, waiting for in-flight readers to finish
    pub fn publish(&self, frame: Frame) {
        let sequence = frame.sequence();
        *self.write() = Some(frame);
        self.announce(sequence);
    }

    /// Replace the current frame unless a reader is holding the slot.
    ///
    /// On contention the frame is handed back and counted as dropped.
    pub fn try_publish(&self, frame: Frame) -> Result<(), Frame> {
        let mut slot = match self.slot.try_write() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                return Err(frame);
            }
        };

        let sequence = frame.sequence();
        *slot = Some(frame);
        drop(slot);

        self.announce(sequence);
        Ok(())
    }

    /// Copy out the current frame, if any was ever published
    pub fn snapshot(&self) -> Option<Frame> {
        self.read().clone()
    }

    /// Wait for a frame newer than `last`.
    ///
    /// With `None` any frame qualifies, so this returns immediately unless
    /// the cell is still empty.
    pub async fn next_after(&self, last: Option<u64>) -> Frame {
        // Subscribe before looking so a publish between the check and the
        // wait still wakes us.
        let mut rx = self.latest.subscribe();
        loop {
            if let Some(frame) = self.snapshot() {
                if last.map_or(true, |seen| frame.sequence() > seen) {
                    return frame;
                }
            }
            // The sender lives in `self`, so the channel cannot close here
            let _ = rx.changed().await;
        }
    }

    pub fn latest_sequence(&self) -> u64 {
        *self.latest.borrow()
    }

    pub fn stats(&self) -> FrameCellStats {
        FrameCellStats {
            frames_published: self.stats.frames_published.load(Ordering::Relaxed),
            frames_dropped: self.stats.frames_dropped.load(Ordering::Relaxed),
            latest_sequence: self.latest_sequence(),
        }
    }

    fn announce(&self, sequence: u64) {
        self.stats.frames_published.fetch_add(1, Ordering::Relaxed);
        self.latest.send_replace(sequence);
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Frame>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Frame>> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FrameCell {
    fn default() -> Self {
        Self::new()
    }
}
