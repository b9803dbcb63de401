#[cfg(any(test, feature = "std"))]
pub mod std_impls;

use super::MicrosDurationU32;

pub trait TimeoutStatus {
    /// Check if the time limit expires.
    fn timeout(&mut self) -> bool;
    /// Reset the timeout condition.
    fn restart(&mut self);
}

pub trait TickInstant: Copy {
    fn now() -> Self;
    /// Returns the amount of microseconds elapsed from another instant to this one.
    /// Saturates at zero if `earlier` is actually later.
    fn micros_since(self, earlier: Self) -> u64;
    /// Returns the instant `us` microseconds after this one.
    fn add_micros(self, us: u32) -> Self;
    /// Returns the amount of microseconds elapsed since this instant.
    #[inline]
    fn micros_elapsed(self) -> u64 {
        Self::now().micros_since(self)
    }
}

/// [`TimeoutStatus`] measured against any [`TickInstant`].
pub struct InstantTimeout<I: TickInstant> {
    start: I,
    timeout_us: u64,
}

impl<I: TickInstant> InstantTimeout<I> {
    pub fn new(timeout: MicrosDurationU32) -> Self {
        Self {
            start: I::now(),
            timeout_us: timeout.ticks().into(),
        }
    }
}

impl<I: TickInstant> TimeoutStatus for InstantTimeout<I> {
    #[inline]
    fn timeout(&mut self) -> bool {
        self.start.micros_elapsed() >= self.timeout_us
    }

    #[inline(always)]
    fn restart(&mut self) {
        self.start = I::now();
    }
}
