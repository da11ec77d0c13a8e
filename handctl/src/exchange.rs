//! Single-slot latest-value hand-off between threads.
//!
//! The acquisition thread publishes landmark frames; the processing thread
//! takes the newest one.  A publish overwrites whatever is waiting, so a
//! slow consumer sees fresh frames and never a backlog.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tracing::trace;

struct Slot<T> {
    value: Option<T>,
    closed: bool,
    published: u64,
    dropped: u64,
}

/// Overwrite-on-publish mailbox holding at most one value.
pub struct LatestSlot<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                closed: false,
                published: 0,
                dropped: 0,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        // A panicking holder cannot leave the slot half-written.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `value`, replacing an unread one.  Returns false once closed.
    pub fn publish(&self, value: T) -> bool {
        let mut slot = self.lock();
        if slot.closed {
            return false;
        }
        if slot.value.replace(value).is_some() {
            slot.dropped += 1;
            trace!("Stale frame dropped");
        }
        slot.published += 1;
        drop(slot);
        self.ready.notify_one();
        true
    }

    /// Take the waiting value without blocking.
    pub fn take(&self) -> Option<T> {
        self.lock().value.take()
    }

    /// Block until a value is available, the slot is closed or `timeout`
    /// passes.  A value published before closing is still delivered.
    pub fn wait_latest(&self, timeout: Duration) -> Option<T> {
        let slot = self.lock();
        let (mut slot, _) = self
            .ready
            .wait_timeout_while(slot, timeout, |s| s.value.is_none() && !s.closed)
            .unwrap_or_else(|e| e.into_inner());
        slot.value.take()
    }

    /// Stop accepting values and wake any waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Closed and drained.
    pub fn is_finished(&self) -> bool {
        let slot = self.lock();
        slot.closed && slot.value.is_none()
    }

    /// Values overwritten before anyone read them.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn published(&self) -> u64 {
        self.lock().published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_latest_wins() {
        let slot = LatestSlot::new();
        slot.publish(1);
        slot.publish(2);
        slot.publish(3);
        assert_eq!(slot.take(), Some(3));
        assert_eq!(slot.take(), None);
        assert_eq!(slot.dropped(), 2);
        assert_eq!(slot.published(), 3);
    }

    #[test]
    fn test_wait_times_out_empty() {
        let slot: LatestSlot<u32> = LatestSlot::new();
        assert_eq!(slot.wait_latest(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_close_rejects_and_wakes() {
        let slot = Arc::new(LatestSlot::new());
        let waiter = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || slot.wait_latest(Duration::from_secs(5)))
        };
        slot.close();
        assert_eq!(waiter.join().unwrap(), None::<u32>);
        assert!(!slot.publish(7));
        assert!(slot.is_finished());
    }

    #[test]
    fn test_value_before_close_delivered() {
        let slot = LatestSlot::new();
        slot.publish("last");
        slot.close();
        assert!(!slot.is_finished());
        assert_eq!(slot.wait_latest(Duration::from_millis(1)), Some("last"));
        assert!(slot.is_finished());
    }

    #[test]
    fn test_cross_thread_handoff() {
        let slot = Arc::new(LatestSlot::new());
        let producer = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                for i in 0..100u32 {
                    slot.publish(i);
                }
                slot.close();
            })
        };
        let mut seen = Vec::new();
        while let Some(v) = slot.wait_latest(Duration::from_secs(5)) {
            seen.push(v);
        }
        producer.join().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{:?}", seen);
        assert_eq!(seen.len() as u64 + slot.dropped(), 100);
    }
}
