//! Reordering window for incoming stream numbers.
//!
//! Each incoming rotation window accepts streams numbered `base` to
//! `base + 31`. Marking a number seen slides the window past every seen
//! number at its low end, so the lowest slot is always one we still expect.

use crate::{constants::REORDERING_WINDOW_SIZE, error::KeyStoreError};

/// Stream numbers that entered and left a window in one slide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowChange {
    /// Newly expected stream numbers
    pub added: Vec<u64>,
    /// Stream numbers no longer expected
    pub removed: Vec<u64>,
}

/// Window of 32 stream numbers with a seen bitmap.
///
/// Bit `i` of the bitmap is set if `base + i` has been seen. Bit 0 is always
/// clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReorderingWindow {
    base: u64,
    seen: u32,
}

const _: () = assert!(REORDERING_WINDOW_SIZE == u32::BITS as usize);

impl ReorderingWindow {
    /// Fresh window expecting stream numbers `0..32`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a window from its base and bitmap.
    pub fn from_parts(base: u64, seen: u32) -> Self {
        let mut window = Self { base, seen };
        window.slide();
        window
    }

    /// Lowest expected stream number.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Seen bitmap, relative to [`base`](Self::base).
    pub fn bitmap(&self) -> u32 {
        self.seen
    }

    /// Whether `stream_number` falls inside the window.
    pub fn contains(&self, stream_number: u64) -> bool {
        stream_number >= self.base && stream_number - self.base < REORDERING_WINDOW_SIZE as u64
    }

    /// Stream numbers in the window that have not been seen, lowest first.
    pub fn unseen(&self) -> Vec<u64> {
        (0..REORDERING_WINDOW_SIZE as u64)
            .filter(|&i| self.seen & (1 << i) == 0)
            .map(|i| self.base + i)
            .collect()
    }

    /// Mark `stream_number` as seen and slide the window.
    ///
    /// # Errors
    ///
    /// - `StreamNumberOutsideWindow`: below the base or past the top
    /// - `StreamNumberAlreadySeen`: marked before
    pub fn set_seen(&mut self, stream_number: u64) -> Result<WindowChange, KeyStoreError> {
        if !self.contains(stream_number) {
            return Err(KeyStoreError::StreamNumberOutsideWindow { stream_number, base: self.base });
        }
        let bit = 1u32 << (stream_number - self.base);
        if self.seen & bit != 0 {
            return Err(KeyStoreError::StreamNumberAlreadySeen { stream_number });
        }

        self.seen |= bit;
        Ok(self.slide())
    }

    fn slide(&mut self) -> WindowChange {
        let shift = u64::from(self.seen.trailing_ones());
        let size = REORDERING_WINDOW_SIZE as u64;

        let change = WindowChange {
            added: (self.base + size..self.base + size + shift).collect(),
            removed: (self.base..self.base + shift).collect(),
        };

        self.base += shift;
        self.seen = self.seen.checked_shr(shift as u32).unwrap_or(0);
        change
    }
}
