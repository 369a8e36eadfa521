use chrono::{DateTime, Utc};

use super::domain::{RefundRequest, RequestId};

/// Storage abstraction so the intake service and console can be exercised in isolation.
pub trait RefundRepository: Send + Sync {
    fn insert(&self, record: RefundRequest) -> Result<RefundRequest, RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<RefundRequest>, RepositoryError>;
    /// Every stored request in storage (insertion) order.
    fn all(&self) -> Result<Vec<RefundRequest>, RepositoryError>;
    /// Marks the pending requests among `ids` as processed and returns how many changed.
    fn mark_processed(
        &self,
        ids: &[RequestId],
        at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
