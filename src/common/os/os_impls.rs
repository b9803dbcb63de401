#[cfg(any(test, feature = "std"))]
pub use std_impl::*;

#[cfg(any(test, feature = "std"))]
mod std_impl {
    use super::super::*;
    use std::{cell::Cell, thread, time::Duration, time::Instant};

    // STD --------------------------------------------------------------

    /// Real threads and wall-clock time.
    pub struct StdOs {}

    impl OsInterface for StdOs {
        type RawMutex = FakeRawMutex;
        type Instant = Instant;
        type Notifier = StdNotifier;
        type NotifyReceiver = StdNotifyReceiver;

        fn yield_thread() {
            thread::yield_now();
        }

        fn sleep(dur: MicrosDurationU32) {
            thread::sleep(Duration::from_micros(dur.ticks().into()))
        }

        fn sleep_until(deadline: Instant) {
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }

        fn start_timeout(dur: MicrosDurationU32) -> impl TimeoutStatus {
            InstantTimeout::<Instant>::new(dur)
        }

        fn notifier() -> (StdNotifier, StdNotifyReceiver) {
            StdNotifier::new()
        }
    }

    // Fake -------------------------------------------------------------

    thread_local! {
        static VIRTUAL_CLOCK: Cell<u64> = const { Cell::new(0) };
    }

    /// Virtual time, one clock per thread.
    ///
    /// Sleeping and waiting for a notification that never comes advance the
    /// clock instantly, so timing behaviour is deterministic and free.
    pub struct FakeOs {}

    impl FakeOs {
        /// Current virtual time of this thread.
        pub fn now_micros() -> u64 {
            VIRTUAL_CLOCK.with(Cell::get)
        }

        /// Move the virtual clock forward.
        pub fn advance(dur: MicrosDurationU32) {
            VIRTUAL_CLOCK.with(|c| c.set(c.get() + u64::from(dur.ticks())));
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub struct FakeInstant(u64);

    impl TickInstant for FakeInstant {
        #[inline]
        fn now() -> Self {
            Self(FakeOs::now_micros())
        }

        #[inline]
        fn micros_since(self, earlier: Self) -> u64 {
            self.0.saturating_sub(earlier.0)
        }

        #[inline]
        fn add_micros(self, us: u32) -> Self {
            Self(self.0 + u64::from(us))
        }
    }

    impl OsInterface for FakeOs {
        type RawMutex = FakeRawMutex;
        type Instant = FakeInstant;
        type Notifier = FakeNotifier;
        type NotifyReceiver = FakeNotifyReceiver;

        fn yield_thread() {}

        fn sleep(dur: MicrosDurationU32) {
            Self::advance(dur);
        }

        fn sleep_until(deadline: FakeInstant) {
            VIRTUAL_CLOCK.with(|c| c.set(c.get().max(deadline.0)));
        }

        fn start_timeout(dur: MicrosDurationU32) -> impl TimeoutStatus {
            InstantTimeout::<FakeInstant>::new(dur)
        }

        fn notifier() -> (FakeNotifier, FakeNotifyReceiver) {
            FakeNotifier::new()
        }
    }
}

// Tests ------------------------------------------------------------
