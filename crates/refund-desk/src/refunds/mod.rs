//! Refund request intake: validation, storage, operator notification, and the operator console.

pub mod console;
pub mod domain;
pub mod handler;
pub mod notifier;
pub mod pages;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;
pub mod validation;

#[cfg(test)]
mod tests;

pub use console::{
    CreatedWithin, ListQuery, ListingRow, MarkProcessedReport, OperatorConsole, RecordDetail,
};
pub use domain::{
    mask_last_four, ProcessingStatus, RefundAmount, RefundDraft, RefundRequest, RequestId,
    RequestMetadata, SensitiveString,
};
pub use handler::{ResponseFormat, SubmissionHandler, SubmissionRequest, SubmissionResponse};
pub use notifier::{
    DisabledMailTransport, LogMailTransport, MailError, MailMessage, MailTransport,
    NotificationOutcome, Notifier,
};
pub use pages::PageRenderer;
pub use repository::{RefundRepository, RepositoryError};
pub use router::{refund_router, RefundRoutes};
pub use service::{RefundIntakeService, SubmissionError};
pub use storage::{InMemoryRefundRepository, JsonFileRefundRepository};
pub use validation::{validate, FieldErrors, RawFields, FIELDS};
