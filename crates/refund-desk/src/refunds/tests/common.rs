use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::NotificationConfig;
use crate::refunds::domain::{RefundRequest, RequestId};
use crate::refunds::notifier::{MailError, MailMessage, MailTransport, Notifier};
use crate::refunds::pages::PageRenderer;
use crate::refunds::repository::{RefundRepository, RepositoryError};
use crate::refunds::router::{refund_router, RefundRoutes};
use crate::refunds::service::RefundIntakeService;
use crate::refunds::storage::InMemoryRefundRepository;
use crate::refunds::validation::RawFields;

pub(super) const OPERATOR_TOKEN: &str = "desk-operator-token";

pub(super) fn valid_fields() -> RawFields {
    [
        ("recipient_name", "Alice"),
        ("refund_amount", "50.00"),
        ("bank_name", "Acme Bank"),
        ("account_number", "12345678"),
        ("card_number", "4111111111111111"),
        ("expiry_date", "12/26"),
        ("cvv", "q7z"),
    ]
    .into_iter()
    .collect()
}

pub(super) fn fields_with(name: &str, value: &str) -> RawFields {
    let mut fields = valid_fields();
    fields.insert(name, value);
    fields
}

pub(super) fn notification_config() -> NotificationConfig {
    NotificationConfig {
        admin_email: "refunds@desk.test".to_string(),
        ..NotificationConfig::default()
    }
}

pub(super) type TestService = RefundIntakeService<InMemoryRefundRepository, RecordingMail>;

pub(super) fn build_service() -> (
    TestService,
    Arc<InMemoryRefundRepository>,
    Arc<RecordingMail>,
) {
    let repository = Arc::new(InMemoryRefundRepository::default());
    let mail = Arc::new(RecordingMail::default());
    let service = RefundIntakeService::new(
        repository.clone(),
        Notifier::new(mail.clone(), notification_config()),
    );
    (service, repository, mail)
}

pub(super) fn service_with<R, T>(repository: Arc<R>, transport: Arc<T>) -> RefundIntakeService<R, T>
where
    R: RefundRepository,
    T: MailTransport,
{
    RefundIntakeService::new(repository, Notifier::new(transport, notification_config()))
}

pub(super) fn router_for<R, T>(service: RefundIntakeService<R, T>, token: Option<&str>) -> axum::Router
where
    R: RefundRepository + 'static,
    T: MailTransport + 'static,
{
    let pages = Arc::new(PageRenderer::new().expect("templates compile"));
    refund_router(RefundRoutes::new(
        Arc::new(service),
        pages,
        token.map(str::to_string),
    ))
}

#[derive(Default)]
pub(super) struct RecordingMail {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMail {
    pub(super) fn messages(&self) -> Vec<MailMessage> {
        self.sent.lock().expect("mail mutex poisoned").clone()
    }
}

impl MailTransport for RecordingMail {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.sent
            .lock()
            .expect("mail mutex poisoned")
            .push(message.clone());
        Ok(())
    }
}

pub(super) struct FailingMail;

impl MailTransport for FailingMail {
    fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
        Err(MailError::Transport("relay refused connection".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl RefundRepository for UnavailableRepository {
    fn insert(&self, _record: RefundRequest) -> Result<RefundRequest, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RequestId) -> Result<Option<RefundRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<RefundRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn mark_processed(
        &self,
        _ids: &[RequestId],
        _at: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn form_body(fields: &[(&str, &str)]) -> Body {
    let encoded = fields
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    Body::from(encoded)
}

fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|byte| match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (byte as char).to_string()
            }
            b' ' => "+".to_string(),
            other => format!("%{other:02X}"),
        })
        .collect()
}

pub(super) fn form_pairs(fields: &RawFields) -> Vec<(String, String)> {
    crate::refunds::validation::FIELDS
        .iter()
        .filter_map(|spec| {
            fields
                .get(spec.name)
                .map(|value| (spec.name.to_string(), value.to_string()))
        })
        .collect()
}

pub(super) fn form_post(fields: &RawFields) -> Request<Body> {
    let pairs = form_pairs(fields);
    let borrowed: Vec<(&str, &str)> = pairs
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    Request::post("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(form_body(&borrowed))
        .expect("request builds")
}

pub(super) fn json_post(fields: &RawFields) -> Request<Body> {
    let payload: serde_json::Map<String, Value> = form_pairs(fields)
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    Request::post("/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json")
        .body(Body::from(
            serde_json::to_vec(&payload).expect("payload serializes"),
        ))
        .expect("request builds")
}

pub(super) fn operator_get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
