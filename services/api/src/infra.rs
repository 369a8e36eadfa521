use metrics_exporter_prometheus::PrometheusHandle;
use refund_desk::config::{AppConfig, MailBackend, StorageConfig};
use refund_desk::error::AppError;
use refund_desk::refunds::{
    DisabledMailTransport, InMemoryRefundRepository, JsonFileRefundRepository, LogMailTransport,
    MailTransport, Notifier, RefundIntakeService, RefundRepository,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type SharedRepository = dyn RefundRepository;
pub(crate) type SharedTransport = dyn MailTransport;
pub(crate) type IntakeService = RefundIntakeService<SharedRepository, SharedTransport>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn open_store(storage: &StorageConfig) -> Result<Arc<SharedRepository>, AppError> {
    match storage {
        StorageConfig::Memory => {
            info!("using in-memory refund store");
            Ok(Arc::new(InMemoryRefundRepository::default()))
        }
        StorageConfig::File(path) => {
            let store = JsonFileRefundRepository::open(path)?;
            info!(path = %store.path().display(), "using JSON file refund store");
            Ok(Arc::new(store))
        }
    }
}

pub(crate) fn mail_transport(backend: MailBackend) -> Arc<SharedTransport> {
    match backend {
        MailBackend::Log => Arc::new(LogMailTransport),
        MailBackend::Disabled => Arc::new(DisabledMailTransport),
    }
}

pub(crate) fn intake_service(config: &AppConfig) -> Result<Arc<IntakeService>, AppError> {
    let repository = open_store(&config.storage)?;
    let notifier = Notifier::new(
        mail_transport(config.notification.backend),
        config.notification.clone(),
    );
    Ok(Arc::new(RefundIntakeService::new(repository, notifier)))
}
