use super::OsInterface;
use core::sync::atomic::{AtomicBool, Ordering};
use mutex_traits::{ConstInit, RawMutex};

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "std"))] {
        pub use std_impl::{BlockingMutex, MutexGuard};
    } else {
        pub use raw_impl::{BlockingMutex, MutexGuard};
    }
}
pub use raw_impl::{BlockingMutex as RawBlockingMutex, MutexGuard as RawMutexGuard};

pub type Mutex<OS, T> = BlockingMutex<<OS as OsInterface>::RawMutex, T>;

/// A fake mutex is for testing.
/// It does not provide any synchronization between threads,
pub struct FakeRawMutex {}

impl FakeRawMutex {
    /// Create a new `FakeRawMutex`.
    pub const fn new() -> Self {
        Self {}
    }
}

impl Default for FakeRawMutex {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for FakeRawMutex {}

impl ConstInit for FakeRawMutex {
    const INIT: Self = Self::new();
}

unsafe impl RawMutex for FakeRawMutex {
    type GuardMarker = *mut ();

    #[inline]
    fn lock(&self) {}

    #[inline]
    fn try_lock(&self) -> bool {
        true
    }

    #[inline]
    unsafe fn unlock(&self) {}

    #[inline]
    fn is_locked(&self) -> bool {
        true
    }
}

/// A simple spinning mutex for `no_std` environment.
///
/// `try_lock` can be used in interrupt context, `lock` cannot.
pub struct AtomicRawMutex {
    state: AtomicBool,
}

impl AtomicRawMutex {
    pub const fn new() -> Self {
        Self {
            state: AtomicBool::new(false),
        }
    }
}

impl Default for AtomicRawMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstInit for AtomicRawMutex {
    const INIT: Self = Self::new();
}

unsafe impl RawMutex for AtomicRawMutex {
    type GuardMarker = ();

    #[inline]
    fn lock(&self) {
        while !self.try_lock() {
            core::hint::spin_loop();
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.state.store(false, Ordering::Release);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed)
    }
}

mod raw_impl {
    use super::*;
    use core::{
        cell::UnsafeCell,
        marker::PhantomData,
        ops::{Deref, DerefMut},
    };

    /// A mutex built on any [`RawMutex`]. The lock is held for as long as the
    /// returned [`MutexGuard`] lives.
    pub struct BlockingMutex<R, T: ?Sized> {
        raw: R,
        data: UnsafeCell<T>,
    }

    unsafe impl<R: RawMutex + Send, T: ?Sized + Send> Send for BlockingMutex<R, T> {}
    unsafe impl<R: RawMutex + Sync, T: ?Sized + Send> Sync for BlockingMutex<R, T> {}

    impl<R: ConstInit, T> BlockingMutex<R, T> {
        #[inline]
        pub const fn new(val: T) -> Self {
            Self {
                raw: R::INIT,
                data: UnsafeCell::new(val),
            }
        }
    }

    impl<R, T> BlockingMutex<R, T> {
        #[inline]
        pub fn into_inner(self) -> T {
            self.data.into_inner()
        }
    }

    impl<R: RawMutex, T: ?Sized> BlockingMutex<R, T> {
        #[inline]
        pub fn lock(&self) -> MutexGuard<'_, R, T> {
            self.raw.lock();
            MutexGuard {
                m: self,
                _marker: PhantomData,
            }
        }

        #[inline]
        pub fn try_lock(&self) -> Option<MutexGuard<'_, R, T>> {
            if self.raw.try_lock() {
                Some(MutexGuard {
                    m: self,
                    _marker: PhantomData,
                })
            } else {
                None
            }
        }

        #[inline]
        pub fn with_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
            let mut guard = self.lock();
            f(&mut *guard)
        }

        #[inline]
        pub fn try_with_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U> {
            let mut guard = self.try_lock()?;
            Some(f(&mut *guard))
        }
    }

    /// Unlocks the mutex when dropped.
    pub struct MutexGuard<'a, R: RawMutex, T: ?Sized> {
        m: &'a BlockingMutex<R, T>,
        _marker: PhantomData<R::GuardMarker>,
    }

    impl<R: RawMutex, T: ?Sized> Deref for MutexGuard<'_, R, T> {
        type Target = T;

        #[inline]
        fn deref(&self) -> &T {
            // Safety: the guard owns the lock.
            unsafe { &*self.m.data.get() }
        }
    }

    impl<R: RawMutex, T: ?Sized> DerefMut for MutexGuard<'_, R, T> {
        #[inline]
        fn deref_mut(&mut self) -> &mut T {
            // Safety: the guard owns the lock.
            unsafe { &mut *self.m.data.get() }
        }
    }

    impl<R: RawMutex, T: ?Sized> Drop for MutexGuard<'_, R, T> {
        #[inline]
        fn drop(&mut self) {
            // Safety: locked by this guard.
            unsafe { self.m.raw.unlock() }
        }
    }
}

#[cfg(any(test, feature = "std"))]
mod std_impl {
    use core::marker::PhantomData;
    use std::sync::{PoisonError, TryLockError};

    pub use std::sync::MutexGuard;

    /// A wrap of [`std::sync::Mutex`]. This type's purpose is to allow choosing
    /// between using [`std::sync::Mutex`] or `BlockingMutex` through feature flags.
    ///
    /// A poisoned lock is still handed out, the data is plain driver state.
    pub struct BlockingMutex<R, T> {
        mutex: std::sync::Mutex<T>,
        _marker: PhantomData<R>,
    }

    impl<R, T> BlockingMutex<R, T> {
        /// Creates a new `Mutex`.
        #[inline]
        pub const fn new(val: T) -> BlockingMutex<R, T> {
            Self {
                mutex: std::sync::Mutex::new(val),
                _marker: PhantomData,
            }
        }

        #[inline]
        pub fn into_inner(self) -> T {
            self.mutex.into_inner().unwrap_or_else(PoisonError::into_inner)
        }

        #[inline]
        pub fn lock(&self) -> MutexGuard<'_, T> {
            self.mutex.lock().unwrap_or_else(PoisonError::into_inner)
        }

        #[inline]
        pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
            match self.mutex.try_lock() {
                Ok(guard) => Some(guard),
                Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
                Err(TryLockError::WouldBlock) => None,
            }
        }

        #[inline]
        pub fn with_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
            let mut guard = self.lock();
            f(&mut *guard)
        }

        #[inline]
        pub fn try_with_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U> {
            let mut guard = self.try_lock()?;
            Some(f(&mut *guard))
        }
    }
}
