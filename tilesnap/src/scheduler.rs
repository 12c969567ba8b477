//! Priority gate for tile rendering.
//!
//! At most `workers` renders run at once. Waiting renders are admitted in
//! priority order, highest first, and in submission order among equals.
//!
//! ```text
//! acquire(p) ──► free worker & empty queue ──► permit
//!        └─────► queued (p, seq) ──► handed a permit when one is dropped
//! ```
//!
//! Permits are handed over directly on drop, so a newcomer can never
//! overtake a queued render.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

/// Priority of a render; larger runs first.
pub type Priority = u8;

/// Default number of concurrent renders.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

struct Waiter {
    priority: Priority,
    seq: u64,
    tx: oneshot::Sender<()>,
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Waiter {}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiter {
    // Max-heap: higher priority first, then the earlier submission
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct State {
    available: usize,
    waiters: BinaryHeap<Waiter>,
    next_seq: u64,
}

/// Bounded, priority-ordered admission for render work.
pub struct RenderScheduler {
    state: Arc<Mutex<State>>,
    workers: usize,
}

impl RenderScheduler {
    /// Creates a scheduler admitting `workers` renders at once (at least one).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        info!(workers = workers, "Created render scheduler");
        Self {
            state: Arc::new(Mutex::new(State {
                available: workers,
                waiters: BinaryHeap::new(),
                next_seq: 0,
            })),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Renders currently holding a permit.
    pub fn active(&self) -> usize {
        self.workers - self.state.lock().available
    }

    /// Renders waiting for a permit.
    pub fn queued(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Waits for a render permit.
    pub async fn acquire(&self, priority: Priority) -> RenderPermit {
        loop {
            let rx = {
                let mut state = self.state.lock();
                if state.available > 0 && state.waiters.is_empty() {
                    state.available -= 1;
                    return self.permit();
                }
                let (tx, rx) = oneshot::channel();
                let seq = state.next_seq;
                state.next_seq += 1;
                state.waiters.push(Waiter { priority, seq, tx });
                rx
            };

            let mut pending = PendingPermit {
                rx,
                state: Arc::clone(&self.state),
                settled: false,
            };
            let handed_over = (&mut pending.rx).await.is_ok();
            pending.settled = true;
            if handed_over {
                return self.permit();
            }
        }
    }

    /// Runs `work` once a permit of the given priority is granted.
    pub async fn run<F, T>(&self, priority: Priority, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire(priority).await;
        work.await
    }

    fn permit(&self) -> RenderPermit {
        RenderPermit {
            state: Arc::clone(&self.state),
        }
    }
}

/// Admission to render. Dropping it admits the next waiter.
pub struct RenderPermit {
    state: Arc<Mutex<State>>,
}

impl Drop for RenderPermit {
    fn drop(&mut self) {
        release(&self.state);
    }
}

/// A queued acquire. If abandoned after being handed a permit, passes the
/// permit on.
struct PendingPermit {
    rx: oneshot::Receiver<()>,
    state: Arc<Mutex<State>>,
    settled: bool,
}

impl Drop for PendingPermit {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.rx.close();
        if self.rx.try_recv().is_ok() {
            release(&self.state);
        }
    }
}

fn release(state: &Mutex<State>) {
    let mut state = state.lock();
    while let Some(waiter) = state.waiters.pop() {
        if waiter.tx.send(()).is_ok() {
            return;
        }
    }
    state.available += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for_queue(scheduler: &RenderScheduler, n: usize) {
        while scheduler.queued() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_immediate_permit_when_idle() {
        let scheduler = RenderScheduler::new(2);
        let a = scheduler.acquire(0).await;
        let b = scheduler.acquire(0).await;
        assert_eq!(scheduler.active(), 2);
        drop(a);
        drop(b);
        assert_eq!(scheduler.active(), 0);
    }

    #[tokio::test]
    async fn test_zero_workers_means_one() {
        let scheduler = RenderScheduler::new(0);
        assert_eq!(scheduler.workers(), 1);
        let value = scheduler.run(3, async { 42 }).await;
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_priority_then_fifo_order() {
        let scheduler = Arc::new(RenderScheduler::new(1));
        let order = Arc::new(Mutex::new(Vec::new()));
        let blocker = scheduler.acquire(0).await;

        let mut handles = Vec::new();
        for (id, priority) in [(1, 1u8), (2, 5), (3, 3), (4, 5)] {
            let sched = Arc::clone(&scheduler);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                sched
                    .run(priority, async {
                        order.lock().push(id);
                    })
                    .await;
            }));
            wait_for_queue(&scheduler, id).await;
        }

        drop(blocker);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![2, 4, 3, 1]);
    }

    #[tokio::test]
    async fn test_bounded_concurrency() {
        let scheduler = Arc::new(RenderScheduler::new(2));
        let running = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let peak = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..8u8 {
            let scheduler = Arc::clone(&scheduler);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                scheduler
                    .run(i % 3, async {
                        use std::sync::atomic::Ordering::SeqCst;
                        let now = running.fetch_add(1, SeqCst) + 1;
                        peak.fetch_max(now, SeqCst);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        running.fetch_sub(1, SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(peak.load(std::sync::atomic::Ordering::SeqCst) <= 2);
        assert_eq!(scheduler.active(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_leak_permit() {
        let scheduler = Arc::new(RenderScheduler::new(1));
        let blocker = scheduler.acquire(0).await;

        let waiting = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                let _permit = scheduler.acquire(1).await;
            })
        };
        wait_for_queue(&scheduler, 1).await;
        waiting.abort();
        let _ = waiting.await;

        drop(blocker);
        assert_eq!(scheduler.active(), 0);
        let _again = tokio::time::timeout(Duration::from_secs(1), scheduler.acquire(0))
            .await
            .expect("permit should be available");
    }
}
