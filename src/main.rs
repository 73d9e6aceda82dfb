use task_pool::{Config, TaskPool};
use tokio::runtime::Builder;
use tracing_subscriber::EnvFilter;
use std::time::{Duration, Instant};


fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?;

    rt.block_on(async {
        let now = Instant::now();
        let config = Config::new(3).with_rate_limit(Duration::from_millis(10));
        let (input_tx, input_rx) = config.queue::<u64>();
        let (output_tx, output_rx) = config.queue::<u64>();
        let (failures_tx, failures_rx) = async_channel::unbounded();

        let pool = TaskPool::new(config).start_with_failures(
            |x: u64| async move {
                if x % 7 == 0 {
                    return Err(format!("{} is divisible by 7", x));
                }
                Ok(x * 2)
            },
            input_rx,
            output_tx,
            failures_tx,
        );

        tokio::spawn(async move {
            for i in 1..=50 {
                if input_tx.send(i).await.is_err() {
                    break;
                }
            }
        });

        let mut sum = 0;
        while let Ok(value) = output_rx.recv().await {
            sum += value;
        }
        pool.join().await;

        let failed: Vec<_> = std::iter::from_fn(|| failures_rx.try_recv().ok())
            .map(|failure| failure.item)
            .collect();
        let metrics = pool.metrics();
        println!(
            "sum: {}, processed: {}, failed items: {:?}, elapsed: {:?}",
            sum, metrics.processed, failed, now.elapsed()
        );
        anyhow::Ok(())
    })
}
