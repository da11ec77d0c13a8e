//! Cancellable delayed actions.
//!
//! Long countdowns never sleep inside the frame loop.  An action is filed
//! under a deadline on the frame clock and released by `poll` once due.
//! Each entry hands out a `CancelToken` that other threads may trip.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

/// Shared cancel flag for one scheduled action.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Pending<T> {
    action: T,
    label: &'static str,
    deadline: f64,
    token: CancelToken,
    /// Whole seconds last reported by the countdown log.
    announced: Option<u64>,
}

/// Deadline-ordered queue of delayed actions.
pub struct Scheduler<T> {
    pending: Vec<Pending<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// File `action` to fire `delay_s` after `now`.
    pub fn schedule(&mut self, action: T, label: &'static str, now: f64, delay_s: f64) -> CancelToken {
        let token = CancelToken::new();
        let deadline = now + delay_s;
        info!(action = label, "Scheduled in {:.1}s", delay_s);
        let at = self.pending.partition_point(|p| p.deadline <= deadline);
        self.pending.insert(
            at,
            Pending {
                action,
                label,
                deadline,
                token: token.clone(),
                announced: None,
            },
        );
        token
    }

    /// Cancel every pending action carrying `label`.  Returns how many.
    pub fn cancel_label(&mut self, label: &str) -> usize {
        let mut n = 0;
        for p in self.pending.iter().filter(|p| p.label == label) {
            p.token.cancel();
            n += 1;
        }
        self.prune();
        n
    }

    /// Cancel everything.
    pub fn cancel_all(&mut self) -> usize {
        for p in &self.pending {
            p.token.cancel();
        }
        let n = self.pending.len();
        self.pending.clear();
        if n > 0 {
            info!("Cancelled {} pending action(s)", n);
        }
        n
    }

    /// Whether a live action with `label` is queued.
    pub fn is_pending(&self, label: &str) -> bool {
        self.pending
            .iter()
            .any(|p| p.label == label && !p.token.is_cancelled())
    }

    fn prune(&mut self) {
        self.pending.retain(|p| {
            if p.token.is_cancelled() {
                info!(action = p.label, "Cancelled");
                false
            } else {
                true
            }
        });
    }

    /// Release every action whose deadline has passed, in deadline order.
    pub fn poll(&mut self, now: f64) -> Vec<T> {
        self.prune();

        for p in self.pending.iter_mut() {
            let remaining = (p.deadline - now).max(0.0).ceil() as u64;
            if remaining > 0 && p.announced != Some(remaining) {
                info!(action = p.label, "{}...", remaining);
                p.announced = Some(remaining);
            }
        }

        let due = self.pending.partition_point(|p| p.deadline <= now);
        self.pending
            .drain(..due)
            .map(|p| {
                debug!(action = p.label, "Due");
                p.action
            })
            .collect()
    }

    /// Generate s-expression for status output.
    pub fn status_sexp(&self, now: f64) -> String {
        let entries: Vec<String> = self
            .pending
            .iter()
            .map(|p| format!("(:action :{} :remaining {:.1})", p.label, (p.deadline - now).max(0.0)))
            .collect();
        format!("(:pending ({}))", entries.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_deadline() {
        let mut s = Scheduler::new();
        s.schedule("bye", "shutdown", 0.0, 5.0);
        assert!(s.poll(1.0).is_empty());
        assert!(s.poll(4.99).is_empty());
        assert_eq!(s.poll(5.0), vec!["bye"]);
        assert!(!s.is_pending("shutdown"));
    }

    #[test]
    fn test_cancel_token_from_other_thread() {
        let mut s = Scheduler::new();
        let token = s.schedule(1, "shutdown", 0.0, 5.0);
        let handle = std::thread::spawn(move || token.cancel());
        handle.join().unwrap();
        assert!(s.poll(10.0).is_empty());
        assert!(!s.is_pending("shutdown"));
    }

    #[test]
    fn test_deadline_order() {
        let mut s = Scheduler::new();
        s.schedule("late", "a", 0.0, 3.0);
        s.schedule("early", "b", 0.0, 1.0);
        s.schedule("middle", "c", 0.0, 2.0);
        assert_eq!(s.poll(10.0), vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_cancel_label() {
        let mut s = Scheduler::new();
        s.schedule(1, "shutdown", 0.0, 5.0);
        s.schedule(2, "other", 0.0, 5.0);
        assert!(s.is_pending("shutdown"));
        assert_eq!(s.cancel_label("shutdown"), 1);
        assert!(!s.is_pending("shutdown"));
        assert_eq!(s.poll(6.0), vec![2]);
    }

    #[test]
    fn test_cancel_all() {
        let mut s = Scheduler::new();
        let t = s.schedule(1, "x", 0.0, 1.0);
        assert_eq!(s.cancel_all(), 1);
        assert!(t.is_cancelled());
        assert!(s.poll(2.0).is_empty());
    }

    #[test]
    fn test_status_sexp() {
        let mut s = Scheduler::new();
        s.schedule(1, "shutdown", 0.0, 5.0);
        assert_eq!(s.status_sexp(2.0), "(:pending ((:action :shutdown :remaining 3.0)))");
    }
}
