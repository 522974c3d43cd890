//! Advisory exclusive access to a transceiver shared between tasks
//!
//! Tasks that touch the transceiver (the receiver, a diagnostics task, the
//! hardware test runner) agree on one [`Mutex`]. The receiver holds it for
//! the whole session unless asked to release it after configuring, in which
//! case other tasks may reconfigure the chip underneath it. The receiver
//! notices that through packets of unexpected length and starts over.

use core::time::Duration;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use log::debug;

use crate::cc1101::{RadioConfig, RadioSettings, ReceivedPacket};
use crate::error::Error;
use crate::traits::Transceiver;

/// Lock shared by every task accessing the same transceiver
pub type AccessLock<M> = Mutex<M, ()>;

/// [`Transceiver`] guarded by an [`AccessLock`]
pub struct SharedTransceiver<'a, M: RawMutex, T> {
    inner: T,
    lock: &'a AccessLock<M>,
    guard: Option<MutexGuard<'a, M, ()>>,
}

impl<'a, M: RawMutex, T> SharedTransceiver<'a, M, T> {
    pub fn new(inner: T, lock: &'a AccessLock<M>) -> Self {
        Self {
            inner,
            lock,
            guard: None,
        }
    }

    pub fn is_locked_by_us(&self) -> bool {
        self.guard.is_some()
    }
}

impl<M: RawMutex, T: Transceiver> Transceiver for SharedTransceiver<'_, M, T> {
    type Error = T::Error;

    async fn open(&mut self) -> Result<(), Error<Self::Error>> {
        if self.guard.is_none() {
            self.guard = Some(self.lock.try_lock().map_err(|_| Error::Locked)?);
        }
        let result = self.inner.open().await;
        if result.is_err() {
            self.guard = None;
        }
        result
    }

    async fn close(&mut self) -> Result<(), Error<Self::Error>> {
        let result = self.inner.close().await;
        self.guard = None;
        result
    }

    async fn configure(
        &mut self,
        config: &RadioConfig,
    ) -> Result<RadioSettings, Error<Self::Error>> {
        self.inner.configure(config).await
    }

    async fn release_lock(&mut self) {
        self.inner.release_lock().await;
        if self.guard.take().is_some() {
            debug!("released transceiver access lock");
        }
    }

    async fn wait_for_packet(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ReceivedPacket>, Error<Self::Error>> {
        self.inner.wait_for_packet(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MockError, MockTransceiver, VirtualTime};
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_open_takes_lock() {
        let lock = AccessLock::<NoopRawMutex>::new(());
        let mut shared = SharedTransceiver::new(MockTransceiver::new(VirtualTime::default()), &lock);
        block_on(shared.open()).unwrap();
        assert!(shared.is_locked_by_us());
        assert!(lock.try_lock().is_err());
        block_on(shared.close()).unwrap();
        assert!(!shared.is_locked_by_us());
        assert!(lock.try_lock().is_ok());
    }

    #[test]
    fn test_open_locked() {
        let lock = AccessLock::<NoopRawMutex>::new(());
        let mock = MockTransceiver::new(VirtualTime::default());
        let mut shared = SharedTransceiver::new(mock.clone(), &lock);
        let _guard = lock.try_lock().unwrap();
        assert_eq!(block_on(shared.open()), Err(Error::Locked));
        // device untouched
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_two_handles_contend() {
        let lock = AccessLock::<NoopRawMutex>::new(());
        let time = VirtualTime::default();
        let mut first = SharedTransceiver::new(MockTransceiver::new(time.clone()), &lock);
        let mut second = SharedTransceiver::new(MockTransceiver::new(time), &lock);
        block_on(first.open()).unwrap();
        assert_eq!(block_on(second.open()), Err(Error::Locked));
        block_on(first.release_lock());
        block_on(second.open()).unwrap();
        assert!(second.is_locked_by_us());
        // still usable after releasing
        block_on(first.wait_for_packet(Duration::from_secs(1))).unwrap();
    }

    #[test]
    fn test_failed_open_releases_lock() {
        let lock = AccessLock::<NoopRawMutex>::new(());
        let mock = MockTransceiver::new(VirtualTime::default());
        mock.fail_open(Error::Device(MockError));
        let mut shared = SharedTransceiver::new(mock, &lock);
        assert_eq!(block_on(shared.open()), Err(Error::Device(MockError)));
        assert!(lock.try_lock().is_ok());
    }

    #[test]
    fn test_release_lock_delegates() {
        let lock = AccessLock::<NoopRawMutex>::new(());
        let mock = MockTransceiver::new(VirtualTime::default());
        let mut shared = SharedTransceiver::new(mock.clone(), &lock);
        block_on(shared.open()).unwrap();
        block_on(shared.release_lock());
        assert_eq!(mock.calls(), [Call::Open, Call::ReleaseLock]);
        assert!(!shared.is_locked_by_us());
    }
}
