//! See [`OsInterface`]

pub mod mutex_impls;
pub mod notifier;
pub mod notifier_impls;
pub mod os_impls;
pub mod ticker;
pub mod timeout;

pub use mutex_impls::*;
pub use notifier::*;
pub use notifier_impls::*;
pub use os_impls::*;
pub use ticker::*;
pub use timeout::*;

pub use fugit::{ExtU32, MicrosDurationU32};

use mutex_traits::{ConstInit, RawMutex};

/// Adapter for different operating systems.
///
/// We use the [`mutex-traits`](https://crates.io/crates/mutex-traits) crate to provide mutex functionality.
/// You need to select an appropriate mutex implementation based on your needs.
/// And you can implement your own mutex by implementing the `RawMutex` trait from the `mutex-traits` crate.
///
/// ```
/// use serial_dma_rx::os::*;
///
/// fn os_interface<OS: OsInterface>() {
///     let mutex = OS::mutex(2);
///     assert_eq!(*mutex.lock(), 2);
///
///     OS::yield_thread();
///     OS::sleep(1.millis());
/// }
///
/// #[cfg(feature = "std")]
/// fn select_os() {
///     os_interface::<FakeOs>();
///     os_interface::<StdOs>();
/// }
/// ```
pub trait OsInterface: Send + Sync + Sized + 'static {
    type RawMutex: ConstInit + RawMutex;
    type Instant: TickInstant;
    type Notifier: Notifier;
    type NotifyReceiver: NotifyReceiver;

    #[inline]
    fn mutex<T>(d: T) -> Mutex<Self, T> {
        Mutex::<Self, T>::new(d)
    }

    fn yield_thread();
    fn sleep(dur: MicrosDurationU32);
    /// Sleep until an absolute point in time. Returns at once if it already passed.
    fn sleep_until(deadline: Self::Instant);
    fn start_timeout(dur: MicrosDurationU32) -> impl TimeoutStatus;
    fn notifier() -> (Self::Notifier, Self::NotifyReceiver);
}
