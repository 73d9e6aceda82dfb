use super::{
    barrier::{WaitGroup, WaitGuard},
    errors::{TaskError, TaskFailure},
    handle::PoolHandle,
    limiter::RateLimiter,
    model::PoolStats,
};
use std::{
    any::Any,
    fmt::{Debug, Display},
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
};
use async_channel::{Receiver, Sender};
use futures::FutureExt;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};


/// Конфигурация пула
///
/// `queue_capacity` ядром не используется: емкость задается тем, как вызывающий
/// создал каналы (см. [`Config::queue`]).
#[derive(Debug, Clone)]
pub struct Config {
    pub concurrency: usize,
    pub queue_capacity: usize,
    pub rate_limit_enabled: bool,
    pub rate_limit_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            concurrency: num_cpus,
            queue_capacity: num_cpus * 20,
            rate_limit_enabled: false,
            rate_limit_period: Duration::from_secs(1),
        }
    }
}

impl Config {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            queue_capacity: concurrency * 20,
            ..Default::default()
        }
    }

    pub fn cpu_bound() -> Self {
        Self::new(num_cpus::get())
    }

    pub fn io_bound() -> Self {
        Self::new(num_cpus::get() * 2)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Один токен на `period` на весь пул, не на воркер. Повторный вызов перезаписывает период.
    pub fn with_rate_limit(mut self, period: Duration) -> Self {
        self.rate_limit_enabled = true;
        self.rate_limit_period = period;
        self
    }

    pub fn without_rate_limit(mut self) -> Self {
        self.rate_limit_enabled = false;
        self
    }

    /// Эффективный период лимитера. Нулевой период означает работу без лимита.
    pub fn rate_limit(&self) -> Option<Duration> {
        (self.rate_limit_enabled && !self.rate_limit_period.is_zero())
            .then_some(self.rate_limit_period)
    }

    /// Канал емкостью `queue_capacity` (0 - без ограничения).
    pub fn queue<T>(&self) -> (Sender<T>, Receiver<T>) {
        if self.queue_capacity == 0 {
            async_channel::unbounded()
        } else {
            async_channel::bounded(self.queue_capacity)
        }
    }
}


/// Пул воркеров: N задач tokio разбирают общий вход, применяют `task_fn`
/// и пишут успешные результаты в общий выход.
///
/// Выход закрывается ровно один раз, после выхода последнего воркера.
/// Если потребитель не читает выход, воркеры блокируются на записи.
pub struct TaskPool {
    config: Config,
}

impl TaskPool {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Запускает воркеров и сразу возвращает управление.
    /// Провалы элементов только логируются.
    pub fn start<T, R, E, F, Fut>(
        self,
        task_fn: F,
        input: Receiver<T>,
        output: Sender<R>,
    ) -> PoolHandle
    where
        T: Clone + Debug + Send + 'static,
        R: Send + 'static,
        E: Display + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        self.spawn(task_fn, input, output, None)
    }

    /// Как [`TaskPool::start`], но каждый провал дополнительно отправляется в `failures`.
    /// Канал принадлежит вызывающему: пул его не закрывает, а только дропает свои sender'ы.
    pub fn start_with_failures<T, R, E, F, Fut>(
        self,
        task_fn: F,
        input: Receiver<T>,
        output: Sender<R>,
        failures: Sender<TaskFailure<T, E>>,
    ) -> PoolHandle
    where
        T: Clone + Debug + Send + 'static,
        R: Send + 'static,
        E: Display + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        self.spawn(task_fn, input, output, Some(failures))
    }

    fn spawn<T, R, E, F, Fut>(
        self,
        task_fn: F,
        input: Receiver<T>,
        output: Sender<R>,
        failures: Option<Sender<TaskFailure<T, E>>>,
    ) -> PoolHandle
    where
        T: Clone + Debug + Send + 'static,
        R: Send + 'static,
        E: Display + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let concurrency = self.config.concurrency;
        if concurrency == 0 {
            warn!("concurrency is 0: output closes immediately, input is never drained");
        }
        if self.config.rate_limit_enabled && self.config.rate_limit_period.is_zero() {
            warn!("rate limit enabled with zero period, running unthrottled");
        }

        let period = self.config.rate_limit();
        let limiter = period.and_then(RateLimiter::start);
        let stats = Arc::new(PoolStats::new(concurrency));
        let task_fn = Arc::new(task_fn);
        let wait_group = WaitGroup::new();
        let finished = CancellationToken::new();

        // Запускаем воркеры
        for id in 1..=concurrency {
            let worker = Worker {
                id,
                input: input.clone(),
                output: output.clone(),
                limiter: limiter.clone(),
                task_fn: task_fn.clone(),
                failures: failures.clone(),
                stats: stats.clone(),
                _guard: wait_group.enter(),
            };
            stats.worker_started();
            tokio::spawn(worker.run());
        }
        drop(failures);

        // До запуска наблюдателя, иначе при N = 0 "finished" может попасть в лог раньше
        info!(concurrency, rate_limit = ?period, "workers started");

        {
            let stats = stats.clone();
            let finished = finished.clone();
            tokio::spawn(async move {
                wait_group.wait().await;

                // Лимитер живет до выхода последнего воркера, а не до возврата из start
                if let Some(limiter) = limiter {
                    limiter.stop();
                }
                output.close();

                let metrics = stats.snapshot();
                info!(
                    processed = metrics.processed,
                    failed = metrics.failed,
                    "workers finished, output closed"
                );
                finished.cancel();
            });
        }

        PoolHandle::new(finished, stats)
    }
}


struct Worker<T, R, E, F> {
    id: usize,
    input: Receiver<T>,
    output: Sender<R>,
    limiter: Option<RateLimiter>,
    task_fn: Arc<F>,
    failures: Option<Sender<TaskFailure<T, E>>>,
    stats: Arc<PoolStats>,
    _guard: WaitGuard,
}

impl<T, R, E, F, Fut> Worker<T, R, E, F>
where
    T: Clone + Debug + Send + 'static,
    R: Send + 'static,
    E: Display + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    async fn run(self) {
        debug!(worker = self.id, "worker started");

        // Err от recv только когда вход закрыт и пуст
        while let Ok(item) = self.input.recv().await {
            if let Some(limiter) = &self.limiter {
                if !limiter.acquire().await {
                    debug!(worker = self.id, "rate limiter stopped, running unthrottled");
                }
            }

            let task_fn = self.task_fn.as_ref();
            let arg = item.clone();
            let outcome = AssertUnwindSafe(async move { task_fn(arg).await })
                .catch_unwind()
                .await;

            let error = match outcome {
                Ok(Ok(result)) => {
                    self.stats.record_success();
                    if self.output.send(result).await.is_err() {
                        debug!(worker = self.id, "output closed by consumer, result dropped");
                    }
                    continue;
                }
                Ok(Err(err)) => TaskError::Failed(err),
                Err(panic) => TaskError::Panicked(panic_message(panic)),
            };

            self.stats.record_failure();
            self.report(item, error).await;
        }

        self.stats.worker_exited();
        debug!(worker = self.id, "worker exited");
    }

    async fn report(&self, item: T, error: TaskError<E>) {
        error!(worker = self.id, item = ?item, error = %error, "Error processing item");

        if let Some(failures) = &self.failures {
            let failure = TaskFailure {
                worker: self.id,
                item,
                error,
            };
            // Закрытый канал провалов не мешает работе
            let _ = failures.send(failure).await;
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => panic
            .downcast_ref::<&'static str>()
            .map(|msg| (*msg).to_owned())
            .unwrap_or_else(|| "unknown panic payload".to_owned()),
    }
}
