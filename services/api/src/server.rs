use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryChecklistRepository, InMemoryEvidenceStore};
use crate::routes::with_checklist_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use safety_checklist::config::AppConfig;
use safety_checklist::error::AppError;
use safety_checklist::telemetry;
use safety_checklist::workflows::checklist::{
    ChecklistService, LifecycleEngine, SimulatedClassifier, TemplateCatalog,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

/// Published templates: the configured JSON file when set, otherwise the built-in set.
pub(crate) fn load_catalog(config: &AppConfig) -> Result<TemplateCatalog, AppError> {
    match &config.templates_path {
        Some(path) => Ok(TemplateCatalog::from_json_file(path)?),
        None => Ok(TemplateCatalog::standard()),
    }
}

pub(crate) fn build_engine(config: &AppConfig, evidence: InMemoryEvidenceStore) -> LifecycleEngine {
    LifecycleEngine::new(
        Arc::new(SimulatedClassifier::new(config.classifier.simulated_delay)),
        Arc::new(evidence),
        config.classifier.timeout,
    )
}

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

    let catalog = load_catalog(&config)?;
    info!(
        templates = catalog.list_templates().len(),
        source = ?config.templates_path,
        "template catalog loaded"
    );

    let evidence = InMemoryEvidenceStore::new(config.evidence.public_base_url.clone());
    let checklist_service = Arc::new(ChecklistService::new(
        Arc::new(catalog),
        Arc::new(InMemoryChecklistRepository::default()),
        build_engine(&config, evidence),
    ));

    let app = with_checklist_routes(checklist_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "safety checklist service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
