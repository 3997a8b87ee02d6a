//! Background expiry sweeper.
//!
//! The janitor thread wakes every `interval` and runs a tick against its
//! target. It only holds a [`Weak`] reference, so it never keeps a cache
//! alive: once the last strong handle is gone the next upgrade fails and the
//! thread exits. [`Janitor::stop`] (also run on drop) ends it immediately.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;
use parking_lot::Mutex;

const THREAD_NAME: &str = "polycache-janitor";

/// Handle to a running janitor thread.
pub(crate) struct Janitor {
    stop_tx: Mutex<Option<Sender<()>>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Janitor {
    /// Starts a thread calling `tick` on `target` every `interval`.
    pub(crate) fn spawn<T, F>(interval: Duration, target: Weak<T>, tick: F) -> std::io::Result<Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join_handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                debug!("janitor started, interval {interval:?}");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {},
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    let Some(target) = target.upgrade() else {
                        break;
                    };
                    tick(&target);
                }
                debug!("janitor stopped");
            })?;

        Ok(Self {
            stop_tx: Mutex::new(Some(stop_tx)),
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    /// Stops the thread and waits for it. Calling it again is a no-op.
    pub(crate) fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().take() {
            let _ = tx.send(());
        }
        let Some(handle) = self.join_handle.lock().take() else {
            return;
        };
        // The final handle can be dropped from inside a tick.
        if handle.thread().id() != thread::current().id() {
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.join_handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        for _ in 0..500 {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn janitor_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let janitor = Janitor::spawn(Duration::from_millis(5), Arc::downgrade(&ticks), |t| {
            t.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(wait_until(|| ticks.load(Ordering::SeqCst) >= 3));
        janitor.stop();
        assert!(!janitor.is_running());

        let seen = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), seen);

        janitor.stop();
    }

    #[test]
    fn janitor_exits_when_target_dropped() {
        let target = Arc::new(AtomicUsize::new(0));
        let janitor =
            Janitor::spawn(Duration::from_millis(5), Arc::downgrade(&target), |_| {}).unwrap();
        drop(target);
        assert!(wait_until(|| !janitor.is_running()));
    }
}
