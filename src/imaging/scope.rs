//! Scoped raster buffers.
//!
//! Every intermediate raster of a processing pass is wrapped in a
//! [`Scoped`] guard obtained from a [`RasterScope`]. Guards release on drop,
//! so a pass that bails out with `?` frees its buffers exactly like one that
//! completes. The [`BufferLedger`] counts live guards across passes.

use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared counters for scoped rasters.
#[derive(Clone, Debug, Default)]
pub struct BufferLedger {
    live: Arc<AtomicUsize>,
    acquired: Arc<AtomicU64>,
}

impl BufferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scoped rasters currently alive.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Number of scoped rasters ever acquired.
    pub fn total_acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }
}

/// Acquisition scope for a single pass.
pub struct RasterScope {
    ledger: BufferLedger,
    label: &'static str,
    tracked: Cell<usize>,
}

impl RasterScope {
    pub fn new(ledger: &BufferLedger, label: &'static str) -> Self {
        Self {
            ledger: ledger.clone(),
            label,
            tracked: Cell::new(0),
        }
    }

    /// Take ownership of a raster for the rest of the scope.
    pub fn track<T>(&self, value: T) -> Scoped<T> {
        self.ledger.live.fetch_add(1, Ordering::AcqRel);
        self.ledger.acquired.fetch_add(1, Ordering::Relaxed);
        self.tracked.set(self.tracked.get() + 1);
        Scoped {
            value,
            live: self.ledger.live.clone(),
        }
    }

    /// Number of rasters acquired through this scope.
    pub fn tracked(&self) -> usize {
        self.tracked.get()
    }
}

impl Drop for RasterScope {
    fn drop(&mut self) {
        log::trace!(
            "Scope '{}' closed after {} raster(s)",
            self.label,
            self.tracked.get()
        );
    }
}

/// A raster owned by a [`RasterScope`]. Released when dropped.
pub struct Scoped<T> {
    value: T,
    live: Arc<AtomicUsize>,
}

impl<T> Deref for Scoped<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Scoped<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for Scoped<T> {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}
