use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::AppError;

use super::console::{ListQuery, ListingRow, OperatorConsole};
use super::domain::{RequestId, RequestMetadata};
use super::handler::{
    client_ip, FormPage, ResponseFormat, SubmissionHandler, SubmissionRequest,
    SubmissionResponse,
};
use super::notifier::MailTransport;
use super::pages::PageRenderer;
use super::repository::{RefundRepository, RepositoryError};
use super::service::RefundIntakeService;
use super::validation::RawFields;

/// Shared state for the public form and the operator routes.
pub struct RefundRoutes<R: ?Sized, T: ?Sized> {
    pub submissions: SubmissionHandler<R, T>,
    pub console: Arc<OperatorConsole<R>>,
    pub pages: Arc<PageRenderer>,
    pub operator_token: Option<Arc<str>>,
}

impl<R: ?Sized, T: ?Sized> Clone for RefundRoutes<R, T> {
    fn clone(&self) -> Self {
        Self {
            submissions: self.submissions.clone(),
            console: self.console.clone(),
            pages: self.pages.clone(),
            operator_token: self.operator_token.clone(),
        }
    }
}

impl<R, T> RefundRoutes<R, T>
where
    R: RefundRepository + ?Sized,
    T: MailTransport + ?Sized,
{
    pub fn new(
        service: Arc<RefundIntakeService<R, T>>,
        pages: Arc<PageRenderer>,
        operator_token: Option<String>,
    ) -> Self {
        let console = Arc::new(OperatorConsole::new(service.repository().clone()));
        Self {
            submissions: SubmissionHandler::new(service),
            console,
            pages,
            operator_token: operator_token.map(Arc::from),
        }
    }
}

/// Router builder exposing the refund form and the operator console.
pub fn refund_router<R, T>(routes: RefundRoutes<R, T>) -> Router
where
    R: RefundRepository + ?Sized + 'static,
    T: MailTransport + ?Sized + 'static,
{
    Router::new()
        .route("/", get(index_handler::<R, T>).post(submit_handler::<R, T>))
        .route("/success/", get(success_handler::<R, T>))
        .route("/superuser/list/", get(listing_page_handler::<R, T>))
        .route("/superuser/api/requests", get(list_requests_handler::<R, T>))
        .route(
            "/superuser/api/requests/mark-processed",
            post(mark_processed_handler::<R, T>),
        )
        .route(
            "/superuser/api/requests/:request_id",
            get(request_detail_handler::<R, T>),
        )
        .with_state(routes)
}

/// Form fields from either a urlencoded body or a flat JSON object.
pub struct SubmittedFields(pub RawFields);

#[async_trait]
impl<S> FromRequest<S> for SubmittedFields
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim_start().starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(body) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|rejection| malformed_body(rejection.body_text()))?;
            let object = body
                .as_object()
                .ok_or_else(|| malformed_body("expected a JSON object".to_string()))?;
            let fields = object
                .iter()
                .filter_map(|(key, value)| scalar_text(value).map(|text| (key.clone(), text)))
                .collect();
            Ok(Self(fields))
        } else {
            let Form(fields) = Form::<RawFields>::from_request(req, state)
                .await
                .map_err(|rejection| malformed_body(rejection.body_text()))?;
            Ok(Self(fields))
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn malformed_body(detail: String) -> Response {
    warn!(%detail, "unreadable refund submission body");
    let payload = json!({
        "success": false,
        "message": "The request body could not be read.",
    });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

fn header_text<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn render(result: Result<String, tera::Error>, status: StatusCode) -> Response {
    match result {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            error!(error = ?err, "failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

impl SubmissionResponse {
    fn into_http(self, pages: &PageRenderer) -> Response {
        match self {
            SubmissionResponse::Redirect { location } => (
                StatusCode::FOUND,
                [(header::LOCATION, HeaderValue::from_static(location))],
            )
                .into_response(),
            SubmissionResponse::Page { status, page } => render(pages.form(&page), status),
            SubmissionResponse::Structured { status, body } => {
                (status, Json(body)).into_response()
            }
        }
    }
}

pub(crate) async fn index_handler<R, T>(State(routes): State<RefundRoutes<R, T>>) -> Response
where
    R: RefundRepository + ?Sized + 'static,
    T: MailTransport + ?Sized + 'static,
{
    render(routes.pages.form(&FormPage::blank()), StatusCode::OK)
}

pub(crate) async fn submit_handler<R, T>(
    State(routes): State<RefundRoutes<R, T>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    SubmittedFields(fields): SubmittedFields,
) -> Response
where
    R: RefundRepository + ?Sized + 'static,
    T: MailTransport + ?Sized + 'static,
{
    let metadata = RequestMetadata {
        client_ip: client_ip(
            header_text(&headers, header::HeaderName::from_static("x-forwarded-for")),
            peer.map(|ConnectInfo(addr)| addr),
        ),
        user_agent: header_text(&headers, header::USER_AGENT).map(str::to_string),
    };
    let request = SubmissionRequest {
        fields,
        metadata,
        format: ResponseFormat::from_accept(header_text(&headers, header::ACCEPT)),
    };

    let submissions = routes.submissions.clone();
    match off_runtime(move || submissions.handle(request)).await {
        Ok(response) => response.into_http(&routes.pages),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn success_handler<R, T>(State(routes): State<RefundRoutes<R, T>>) -> Response
where
    R: RefundRepository + ?Sized + 'static,
    T: MailTransport + ?Sized + 'static,
{
    render(routes.pages.success(), StatusCode::OK)
}

/// Bearer-token gate for operator routes. No configured token means the routes stay closed.
fn authorize(expected: Option<&str>, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = expected.ok_or(AppError::OperatorAccessClosed)?;

    let presented = header_text(headers, header::AUTHORIZATION)
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if tokens_match(token, expected) => Ok(()),
        _ => Err(AppError::OperatorUnauthorized),
    }
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Runs store work on the blocking pool; the file store does synchronous disk I/O.
async fn off_runtime<F, O>(work: F) -> Result<O, AppError>
where
    F: FnOnce() -> O + Send + 'static,
    O: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(AppError::from)
}

pub(crate) async fn listing_page_handler<R, T>(
    State(routes): State<RefundRoutes<R, T>>,
    headers: HeaderMap,
) -> Result<Response, AppError>
where
    R: RefundRepository + ?Sized + 'static,
    T: MailTransport + ?Sized + 'static,
{
    authorize(routes.operator_token.as_deref(), &headers)?;

    let service = routes.submissions.service().clone();
    let records = off_runtime(move || service.list_all()).await??;
    let rows: Vec<ListingRow> = records.iter().map(ListingRow::from).collect();
    let html = routes.pages.listing(&rows)?;
    Ok((StatusCode::OK, Html(html)).into_response())
}

pub(crate) async fn list_requests_handler<R, T>(
    State(routes): State<RefundRoutes<R, T>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError>
where
    R: RefundRepository + ?Sized + 'static,
    T: MailTransport + ?Sized + 'static,
{
    authorize(routes.operator_token.as_deref(), &headers)?;

    let console = routes.console.clone();
    let rows = off_runtime(move || console.rows(&query, Utc::now())).await??;
    Ok((StatusCode::OK, Json(rows)).into_response())
}

pub(crate) async fn request_detail_handler<R, T>(
    State(routes): State<RefundRoutes<R, T>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Result<Response, AppError>
where
    R: RefundRepository + ?Sized + 'static,
    T: MailTransport + ?Sized + 'static,
{
    authorize(routes.operator_token.as_deref(), &headers)?;

    let id = request_id.parse::<RequestId>()?;
    let console = routes.console.clone();
    let detail = off_runtime(move || console.detail(&id))
        .await??
        .ok_or(RepositoryError::NotFound)?;
    Ok((StatusCode::OK, Json(detail)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct MarkProcessedPayload {
    pub request_ids: Vec<RequestId>,
}

pub(crate) async fn mark_processed_handler<R, T>(
    State(routes): State<RefundRoutes<R, T>>,
    headers: HeaderMap,
    Json(payload): Json<MarkProcessedPayload>,
) -> Result<Response, AppError>
where
    R: RefundRepository + ?Sized + 'static,
    T: MailTransport + ?Sized + 'static,
{
    authorize(routes.operator_token.as_deref(), &headers)?;

    let console = routes.console.clone();
    let report = off_runtime(move || console.mark_processed(&payload.request_ids)).await??;
    Ok((StatusCode::OK, Json(report)).into_response())
}
