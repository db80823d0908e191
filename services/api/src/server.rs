use crate::cli::ServeArgs;
use crate::infra::{
    default_auditors, AppState, InMemoryWorkflowStore, LogNotificationSink, MockPaymentGateway,
};
use crate::routes::with_certification_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use gacp_certify::config::AppConfig;
use gacp_certify::error::AppError;
use gacp_certify::telemetry;
use gacp_certify::workflows::certification::CertificationService;

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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryWorkflowStore::with_auditors(default_auditors()));
    let gateway = Arc::new(MockPaymentGateway::new(config.workflow.webhook_secret.clone()));
    let notifications = Arc::new(LogNotificationSink);
    let certification_service = Arc::new(CertificationService::new(
        store,
        gateway,
        notifications,
        config.workflow.clone(),
    ));

    let app = with_certification_routes(certification_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "certification workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
