//! Generation counters
//!
//! Cached values carry the generation they were computed at. When the
//! owner's generation moves on, every value stamped with an older one is
//! stale without having to be visited.

/// Generation counter - advanced on every relevant mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Generation(u32);

impl Generation {
    /// Initial generation (never mutated)
    pub const INITIAL: Self = Generation(0);

    /// Get the raw value
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Get the next generation
    #[inline]
    pub const fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }

    #[inline]
    pub fn advance(&mut self) {
        *self = self.next();
    }
}
