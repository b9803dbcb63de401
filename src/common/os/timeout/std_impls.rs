use super::*;
use std::time::{Duration, Instant};

impl TickInstant for Instant {
    #[inline(always)]
    fn now() -> Self {
        Instant::now()
    }

    #[inline(always)]
    fn micros_since(self, earlier: Self) -> u64 {
        self.saturating_duration_since(earlier).as_micros() as u64
    }

    #[inline(always)]
    fn add_micros(self, us: u32) -> Self {
        self + Duration::from_micros(us.into())
    }
}
