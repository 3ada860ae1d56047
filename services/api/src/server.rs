use crate::cli::ServeArgs;
use crate::infra::{build_marketplace, AppState, PhotoStore};
use crate::routes::with_marketplace_routes;
use autolist::config::AppConfig;
use autolist::error::AppError;
use autolist::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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

    let photos = PhotoStore::from_config(&config)?;
    let photo_backend = photos.describe();
    let marketplace = build_marketplace(photos, config.storage.max_upload_bytes);

    let app = with_marketplace_routes(marketplace)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, photo_backend, max_upload_bytes = config.storage.max_upload_bytes, public_base_url = %config.public_base_url(), "vehicle marketplace ready");

    axum::serve(listener, app).await?;
    Ok(())
}
