use super::*;
#[cfg(any(test, feature = "std"))]
use alloc::sync::Arc;

#[cfg(any(test, feature = "std"))]
pub use fake_impl::*;
#[cfg(any(test, feature = "std"))]
mod fake_impl {
    use super::*;
    use core::sync::atomic::{AtomicBool, Ordering};

    /// A notification flag without blocking, polled by [`FakeOs`].
    ///
    /// `take` never suspends: when no notification is pending it advances
    /// the virtual clock by the whole timeout instead.
    pub struct FakeNotifier {
        flag: Arc<AtomicBool>,
    }

    impl FakeNotifier {
        pub fn new() -> (Self, FakeNotifyReceiver) {
            let flag = Arc::new(AtomicBool::new(false));
            (
                Self {
                    flag: Arc::clone(&flag),
                },
                FakeNotifyReceiver { flag },
            )
        }
    }

    impl Notifier for FakeNotifier {
        #[inline]
        fn notify(&mut self) {
            self.flag.store(true, Ordering::Release);
        }
    }

    pub struct FakeNotifyReceiver {
        flag: Arc<AtomicBool>,
    }

    impl NotifyReceiver for FakeNotifyReceiver {
        fn take(&mut self, timeout: MicrosDurationU32) -> bool {
            if self.flag.swap(false, Ordering::AcqRel) {
                true
            } else {
                FakeOs::advance(timeout);
                false
            }
        }
    }
}

#[cfg(any(test, feature = "std"))]
pub use std_impl::*;
#[cfg(any(test, feature = "std"))]
mod std_impl {
    use super::*;
    use std::sync::{Condvar, Mutex, PoisonError};
    use std::time::Duration;

    /// Wakes a thread blocked in [`StdNotifyReceiver::take`].
    pub struct StdNotifier {
        inner: Arc<(Mutex<bool>, Condvar)>,
    }

    impl StdNotifier {
        pub fn new() -> (Self, StdNotifyReceiver) {
            let inner = Arc::new((Mutex::new(false), Condvar::new()));
            (
                Self {
                    inner: Arc::clone(&inner),
                },
                StdNotifyReceiver { inner },
            )
        }
    }

    impl Notifier for StdNotifier {
        fn notify(&mut self) {
            let (flag, cv) = &*self.inner;
            *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
            cv.notify_one();
        }
    }

    pub struct StdNotifyReceiver {
        inner: Arc<(Mutex<bool>, Condvar)>,
    }

    impl NotifyReceiver for StdNotifyReceiver {
        fn take(&mut self, timeout: MicrosDurationU32) -> bool {
            let (flag, cv) = &*self.inner;
            let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
            let (mut guard, _) = cv
                .wait_timeout_while(guard, Duration::from_micros(timeout.ticks().into()), |f| {
                    !*f
                })
                .unwrap_or_else(PoisonError::into_inner);
            core::mem::replace(&mut *guard, false)
        }
    }
}
