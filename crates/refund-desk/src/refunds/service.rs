use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{RefundRequest, RequestMetadata};
use super::notifier::{MailTransport, Notifier};
use super::repository::{RefundRepository, RepositoryError};
use super::validation::{validate, FieldErrors, RawFields};

/// Service composing validation, persistence, and the operator notification.
pub struct RefundIntakeService<R: ?Sized, T: ?Sized> {
    repository: Arc<R>,
    notifier: Notifier<T>,
}

impl<R, T> RefundIntakeService<R, T>
where
    R: RefundRepository + ?Sized,
    T: MailTransport + ?Sized,
{
    pub fn new(repository: Arc<R>, notifier: Notifier<T>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Validate and persist a submission, then notify the operator.
    ///
    /// The notification outcome never changes the result: once the record is stored the
    /// submission has succeeded.
    pub fn submit(
        &self,
        fields: &RawFields,
        metadata: RequestMetadata,
    ) -> Result<RefundRequest, SubmissionError> {
        let draft = validate(fields)?;
        let record = RefundRequest::create(draft, metadata, Utc::now());
        let stored = self.repository.insert(record)?;

        info!(request_id = %stored.request_id, "refund request created");
        self.notifier.notify(&stored);

        Ok(stored)
    }

    /// Every stored request in storage order.
    pub fn list_all(&self) -> Result<Vec<RefundRequest>, RepositoryError> {
        self.repository.all()
    }
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Validation(#[from] FieldErrors),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
