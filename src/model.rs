use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    pub concurrency: usize,
    pub active_workers: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.concurrency == 0 {
            return 0.0;
        }
        self.active_workers as f64 / self.concurrency as f64
    }

    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 1.0;
        }
        self.succeeded as f64 / self.processed as f64
    }
}


/// Счетчики пула. Обновляются из всех воркеров, поэтому разнесены по cache line.
pub(crate) struct PoolStats {
    concurrency: usize,
    active_workers: CachePadded<AtomicUsize>,
    succeeded: CachePadded<AtomicUsize>,
    failed: CachePadded<AtomicUsize>,
}

impl PoolStats {
    pub(crate) fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            active_workers: CachePadded::new(AtomicUsize::new(0)),
            succeeded: CachePadded::new(AtomicUsize::new(0)),
            failed: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    #[inline]
    pub(crate) fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn worker_exited(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolMetrics {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        PoolMetrics {
            concurrency: self.concurrency,
            active_workers: self.active_workers.load(Ordering::Relaxed),
            processed: succeeded + failed,
            succeeded,
            failed,
        }
    }
}
