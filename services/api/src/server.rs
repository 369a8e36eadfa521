use crate::cli::ServeArgs;
use crate::infra::{intake_service, AppState};
use crate::routes::with_refund_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use refund_desk::config::AppConfig;
use refund_desk::error::AppError;
use refund_desk::refunds::{PageRenderer, RefundRoutes};
use refund_desk::telemetry;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = intake_service(&config)?;
    let pages = Arc::new(PageRenderer::new()?);
    if config.operator.token.is_none() {
        warn!("REFUND_OPERATOR_TOKEN is not set; operator routes are closed");
    }
    let routes = RefundRoutes::new(service, pages, config.operator.token.clone());

    let app = with_refund_routes(routes)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        admin = %config.notification.admin_email,
        "refund desk ready"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
