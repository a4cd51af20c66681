use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use scene_core::JobId;

/// Single FIFO queue of job references shared by all workers.
///
/// `pop` waits at most the poll interval so idle workers keep observing the
/// shutdown signal between attempts.
#[derive(Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<JobId>>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job_id: JobId) {
        self.items.lock().push_back(job_id);
        self.notify.notify_one();
    }

    /// Pop one job reference, waiting up to `poll_interval` when empty
    pub async fn pop(&self, poll_interval: Duration) -> Option<JobId> {
        // notify_one stores a permit when nobody is waiting, so a push
        // between the empty check and the await is not lost.
        let notified = self.notify.notified();
        if let Some(id) = self.items.lock().pop_front() {
            return Some(id);
        }
        if tokio::time::timeout(poll_interval, notified).await.is_err() {
            return None;
        }
        self.items.lock().pop_front()
    }

    /// Remove a queued reference (used when a job is cancelled before pickup)
    pub fn remove(&self, job_id: &JobId) -> bool {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|id| id != job_id);
        before != items.len()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pop_is_fifo() {
        let queue = WorkQueue::new();
        queue.push(JobId::from("a"));
        queue.push(JobId::from("b"));

        assert_eq!(queue.pop(Duration::from_millis(10)).await, Some(JobId::from("a")));
        assert_eq!(queue.pop(Duration::from_millis(10)).await, Some(JobId::from("b")));
        assert_eq!(queue.pop(Duration::from_millis(10)).await, None);
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let queue = std::sync::Arc::new(WorkQueue::new());
        let popper = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(JobId::from("x"));

        assert_eq!(popper.await.unwrap(), Some(JobId::from("x")));
    }

    #[tokio::test]
    async fn remove_drops_pending_reference() {
        let queue = WorkQueue::new();
        queue.push(JobId::from("a"));
        queue.push(JobId::from("b"));

        assert!(queue.remove(&JobId::from("a")));
        assert!(!queue.remove(&JobId::from("a")));
        assert_eq!(queue.pop(Duration::from_millis(10)).await, Some(JobId::from("b")));
    }
}
