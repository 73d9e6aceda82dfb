use super::model::{PoolMetrics, PoolStats};
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;


/// Handle на запущенный пул.
///
/// Drop handle не останавливает пул: воркеры работают, пока вход не закрыт и не вычитан.
#[derive(Clone)]
pub struct PoolHandle {
    finished: CancellationToken,
    stats: Arc<PoolStats>,
}

impl PoolHandle {
    pub(crate) fn new(finished: CancellationToken, stats: Arc<PoolStats>) -> Self {
        Self { finished, stats }
    }

    /// Ждет, пока все воркеры выйдут и output будет закрыт.
    #[inline]
    pub async fn join(&self) {
        self.finished.cancelled().await;
    }

    pub async fn join_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.join()).await.is_ok()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        self.stats.snapshot()
    }
}
