//! Пул воркеров поверх tokio для потоковой обработки элементов
//!
//! # Features
//! - Фиксированное число воркеров, разбирающих один общий входной канал
//! - Общий rate limiter: один токен за период на весь пул
//! - Выход закрывается ровно один раз, после выхода всех воркеров
//! - Провалы и паники задачи логируются и пропускаются, опционально уходят в отдельный канал
//! - Метрики обработанных и проваленных элементов

pub mod barrier;
pub mod errors;
pub mod handle;
pub mod limiter;
pub mod model;
pub mod pool;

pub use errors::{TaskError, TaskFailure};
pub use handle::PoolHandle;
pub use pool::{Config, TaskPool};
