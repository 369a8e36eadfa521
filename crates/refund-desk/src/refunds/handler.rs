use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use super::domain::RequestMetadata;
use super::notifier::MailTransport;
use super::repository::RefundRepository;
use super::service::{RefundIntakeService, SubmissionError};
use super::validation::{FieldErrors, RawFields, FIELDS};

pub const SUBMITTED_MESSAGE: &str = "Refund request submitted successfully!";
pub const FAILURE_MESSAGE: &str = "An error occurred while processing your request.";
pub const SUCCESS_PATH: &str = "/success/";

/// Response shape requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Page,
    Json,
}

impl ResponseFormat {
    /// `Json` when any media range in the `Accept` header is `application/json`.
    pub fn from_accept(accept: Option<&str>) -> Self {
        let wants_json = accept
            .unwrap_or_default()
            .split(',')
            .filter_map(|range| range.split(';').next())
            .any(|media| media.trim().eq_ignore_ascii_case("application/json"));

        if wants_json {
            Self::Json
        } else {
            Self::Page
        }
    }
}

/// Client address: first `X-Forwarded-For` hop when present, otherwise the peer address.
pub fn client_ip(forwarded_for: Option<&str>, peer: Option<SocketAddr>) -> Option<String> {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub fields: RawFields,
    pub metadata: RequestMetadata,
    pub format: ResponseFormat,
}

/// One input of the rendered refund form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormFieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub value: String,
    pub errors: Vec<String>,
}

/// Everything the form template needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormPage {
    pub recipient_name: &'static str,
    pub fields: Vec<FormFieldView>,
    pub banner: Option<String>,
}

impl FormPage {
    pub fn blank() -> Self {
        Self::build(&RawFields::default(), &FieldErrors::default(), None)
    }

    /// Re-render after a failed submission. Sensitive inputs are never echoed back.
    pub fn build(raw: &RawFields, errors: &FieldErrors, banner: Option<String>) -> Self {
        let fields = FIELDS
            .iter()
            .map(|spec| FormFieldView {
                name: spec.name,
                label: spec.label,
                input_type: spec.input_type,
                value: if spec.echo {
                    raw.get(spec.name).unwrap_or_default().to_string()
                } else {
                    String::new()
                },
                errors: errors.field(spec.name).to_vec(),
            })
            .collect();

        Self {
            recipient_name: "customer",
            fields,
            banner,
        }
    }
}

/// Outcome of a single submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionResponse {
    Redirect { location: &'static str },
    Page { status: StatusCode, page: FormPage },
    Structured { status: StatusCode, body: serde_json::Value },
}

/// Orchestrates validate, persist, notify, and response selection for one submission.
pub struct SubmissionHandler<R: ?Sized, T: ?Sized> {
    service: Arc<RefundIntakeService<R, T>>,
}

impl<R: ?Sized, T: ?Sized> Clone for SubmissionHandler<R, T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<R, T> SubmissionHandler<R, T>
where
    R: RefundRepository + ?Sized,
    T: MailTransport + ?Sized,
{
    pub fn new(service: Arc<RefundIntakeService<R, T>>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<RefundIntakeService<R, T>> {
        &self.service
    }

    pub fn handle(&self, request: SubmissionRequest) -> SubmissionResponse {
        let SubmissionRequest {
            fields,
            metadata,
            format,
        } = request;

        match (self.service.submit(&fields, metadata), format) {
            (Ok(record), ResponseFormat::Json) => SubmissionResponse::Structured {
                status: StatusCode::OK,
                body: json!({
                    "success": true,
                    "message": SUBMITTED_MESSAGE,
                    "request_id": record.request_id,
                }),
            },
            (Ok(_), ResponseFormat::Page) => SubmissionResponse::Redirect {
                location: SUCCESS_PATH,
            },
            (Err(SubmissionError::Validation(errors)), format) => {
                warn!(fields = %errors, "refund submission rejected");
                match format {
                    ResponseFormat::Json => SubmissionResponse::Structured {
                        status: StatusCode::BAD_REQUEST,
                        body: json!({ "success": false, "errors": errors }),
                    },
                    ResponseFormat::Page => SubmissionResponse::Page {
                        status: StatusCode::OK,
                        page: FormPage::build(&fields, &errors, None),
                    },
                }
            }
            (Err(SubmissionError::Repository(err)), format) => {
                error!(error = %err, "error processing refund request");
                match format {
                    ResponseFormat::Json => SubmissionResponse::Structured {
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        body: json!({ "success": false, "message": FAILURE_MESSAGE }),
                    },
                    ResponseFormat::Page => SubmissionResponse::Page {
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        page: FormPage::build(
                            &fields,
                            &FieldErrors::default(),
                            Some(FAILURE_MESSAGE.to_string()),
                        ),
                    },
                }
            }
        }
    }
}
