use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;


/// Общий для всех воркеров источник токенов с фиксированным периодом.
///
/// Тикер кладет токен в буфер емкостью 1. Если токен никто не забрал,
/// следующие тики отбрасываются, так что всплесков выше заданной частоты нет.
/// Первый токен появляется через один период после старта.
#[derive(Clone)]
pub struct RateLimiter {
    tokens: async_channel::Receiver<()>,
    stop: CancellationToken,
    period: Duration,
}

impl RateLimiter {
    /// Запускает тикер. Требует контекста tokio runtime.
    /// Для нулевого периода лимитер не создается.
    pub fn start(period: Duration) -> Option<Self> {
        if period.is_zero() {
            return None;
        }

        let (tx, rx) = async_channel::bounded::<()>(1);
        let stop = CancellationToken::new();
        let stop_clone = stop.clone();

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_clone.cancelled() => break,
                    _ = ticker.tick() => {
                        // Full - токен уже ждет, лишний тик теряется
                        let _ = tx.try_send(());
                    }
                }
            }

            debug!(?period, "rate limiter stopped");
        });

        Some(Self {
            tokens: rx,
            stop,
            period,
        })
    }

    #[inline]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ждет следующий токен. Возвращает `false`, если лимитер остановлен
    /// и токенов больше не будет; в этом случае ожидания нет.
    #[inline]
    pub async fn acquire(&self) -> bool {
        self.tokens.recv().await.is_ok()
    }

    /// Останавливает тикер для всех клонов.
    #[inline]
    pub fn stop(&self) {
        self.stop.cancel();
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}


#[cfg(test)]
mod tests {
    use super::RateLimiter;
    use tokio::time::{Duration, Instant};

    const PERIOD: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn one_token_per_period() {
        let limiter = RateLimiter::start(PERIOD).unwrap();
        let start = Instant::now();

        for _ in 0..3 {
            assert!(limiter.acquire().await);
        }

        assert!(start.elapsed() >= PERIOD * 3);
        limiter.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_ticks_do_not_accumulate() {
        let limiter = RateLimiter::start(PERIOD).unwrap();
        tokio::time::sleep(PERIOD * 10 + PERIOD / 2).await;

        let start = Instant::now();
        assert!(limiter.acquire().await);
        assert!(limiter.acquire().await);

        // Накопился только один токен, второй ждем до следующего тика
        assert!(start.elapsed() >= PERIOD / 2);
        limiter.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_one_token_stream() {
        let limiter = RateLimiter::start(PERIOD).unwrap();
        let other = limiter.clone();
        let start = Instant::now();

        let (a, b) = tokio::join!(limiter.acquire(), other.acquire());
        assert!(a && b);
        assert!(start.elapsed() >= PERIOD * 2);
        limiter.stop();
    }

    #[tokio::test]
    async fn zero_period_is_rejected() {
        assert!(RateLimiter::start(Duration::ZERO).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_limiter_stops_granting() {
        let limiter = RateLimiter::start(PERIOD).unwrap();
        limiter.stop();

        assert!(limiter.is_stopped());
        assert!(!limiter.acquire().await);
    }
}
