use super::*;

/// Wakes at fixed multiples of `period`.
///
/// The next wake time is computed from the previous *scheduled* one, so time
/// spent between two `wait` calls does not accumulate as drift. After an
/// overrun `wait` returns at once until the schedule is caught up.
pub struct Ticker<OS: OsInterface> {
    next: OS::Instant,
    period: MicrosDurationU32,
}

impl<OS: OsInterface> Ticker<OS> {
    pub fn new(period: MicrosDurationU32) -> Self {
        Self {
            next: OS::Instant::now(),
            period,
        }
    }

    /// Sleep until the next period boundary.
    pub fn wait(&mut self) {
        self.next = self.next.add_micros(self.period.ticks());
        OS::sleep_until(self.next);
    }
}
