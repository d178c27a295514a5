//! Time sources for the pose stream
//!
//! The filter itself only sees `dt` in seconds. Wall time matters for the
//! external pose: its age and the interval used to difference positions into
//! velocity. Those are measured in milliseconds since boot, read through
//! [`TimeSource`] so firmware can plug in its tick counter and tests can drive
//! time by hand.

use crate::constants::time::MS_PER_SECOND;

/// Milliseconds since boot
pub type Timestamp = u64;

/// Monotonic millisecond clock
pub trait TimeSource {
    /// Current time in milliseconds
    fn now(&self) -> Timestamp;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Manually driven clock
#[derive(Debug, Clone, Default)]
pub struct FixedTime {
    timestamp: Timestamp,
}

impl FixedTime {
    /// Clock stopped at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Jump to `timestamp`
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Move forward by `ms`
    pub fn advance(&mut self, ms: u64) {
        self.timestamp = self.timestamp.saturating_add(ms);
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}

/// Host clock counting from construction (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    /// Start counting from zero now
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.start.elapsed().as_millis() as Timestamp
    }
}

/// Milliseconds between two timestamps, zero if the clock went backwards
#[inline]
pub fn delta_ms(earlier: Timestamp, later: Timestamp) -> u64 {
    later.saturating_sub(earlier)
}

/// Convert milliseconds to seconds
#[inline]
pub fn ms_to_s(ms: u64) -> f32 {
    ms as f32 / MS_PER_SECOND
}
