use thiserror::Error;


/// Причина провала одного элемента.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TaskError<E> {
    #[error("{0}")]
    Failed(E),
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Провал обработки элемента: сам элемент, воркер и причина.
/// Такие элементы не попадают в output и не ретраятся.
#[derive(Debug, Error, Clone)]
#[error("worker {worker}: error processing item {item:?}: {error}")]
pub struct TaskFailure<T, E> {
    pub worker: usize,
    pub item: T,
    pub error: TaskError<E>,
}

impl<T, E> TaskFailure<T, E> {
    #[inline]
    pub fn is_panic(&self) -> bool {
        matches!(self.error, TaskError::Panicked(_))
    }

    pub fn into_parts(self) -> (T, TaskError<E>) {
        (self.item, self.error)
    }
}
