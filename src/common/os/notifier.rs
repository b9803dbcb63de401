use super::*;

pub trait Notifier: Send {
    fn notify(&mut self);
}

pub trait NotifyReceiver: Send {
    /// Wait until notified or timeout occurs.
    /// # Returns
    ///   - `true` notified
    ///   - `false` timeout occurred
    fn take(&mut self, timeout: MicrosDurationU32) -> bool;

    /// Poll `f` until it returns `Some`, suspending on the notification in between.
    ///
    /// `f` is always polled at least once, so a zero timeout is a non-blocking poll.
    /// Returns `None` if the deadline passed without `f` succeeding.
    fn wait_with<OS, U>(
        &mut self,
        timeout: MicrosDurationU32,
        mut f: impl FnMut() -> Option<U>,
    ) -> Option<U>
    where
        OS: OsInterface,
    {
        let mut t = OS::start_timeout(timeout);
        loop {
            if let Some(v) = f() {
                return Some(v);
            }
            if t.timeout() {
                return None;
            }
            self.take(timeout);
        }
    }
}
