use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Notify;


struct Inner {
    count: AtomicUsize,
    notify: Notify,
}

/// Счетчик завершения воркеров (аналог wait group).
///
/// Увеличивается через [`WaitGroup::enter`] до запуска воркера,
/// уменьшается при drop полученного [`WaitGuard`] - в том числе при панике.
#[derive(Clone)]
pub struct WaitGroup {
    inner: Arc<Inner>,
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGroup {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                count: AtomicUsize::new(0),
                notify: Notify::new(),
            }),
        }
    }

    /// Регистрирует одного участника. Счетчик уменьшится, когда guard будет дропнут.
    #[inline]
    pub fn enter(&self) -> WaitGuard {
        self.inner.count.fetch_add(1, Ordering::AcqRel);
        WaitGuard {
            inner: self.inner.clone(),
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::Acquire)
    }

    /// Ждет, пока счетчик не станет равен нулю.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Регистрируемся до проверки, иначе notify_waiters между load и await потеряется
            notified.as_mut().enable();

            if self.inner.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}


pub struct WaitGuard {
    inner: Arc<Inner>,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}
