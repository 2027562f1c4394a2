use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use safety_checklist::workflows::checklist::{
    checklist_router, ChecklistRepository, ChecklistService,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_checklist_routes<R>(service: Arc<ChecklistService<R>>) -> axum::Router
where
    R: ChecklistRepository + 'static,
{
    checklist_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{InMemoryChecklistRepository, InMemoryEvidenceStore};
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use safety_checklist::workflows::checklist::{
        LifecycleEngine, SimulatedClassifier, TemplateCatalog,
    };
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let engine = LifecycleEngine::new(
            Arc::new(SimulatedClassifier::new(Duration::ZERO)),
            Arc::new(InMemoryEvidenceStore::new("memory://evidence")),
            Duration::from_secs(1),
        );
        let service = ChecklistService::new(
            Arc::new(TemplateCatalog::standard()),
            Arc::new(InMemoryChecklistRepository::default()),
            engine,
        );
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_checklist_routes(Arc::new(service)).layer(Extension(state))
    }

    async fn get(app: axum::Router, uri: &str) -> StatusCode {
        app.oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response")
        .status()
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        assert_eq!(get(app(false), "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_tracks_startup_flag() {
        assert_eq!(
            get(app(false), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(get(app(true), "/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn checklist_routes_are_mounted() {
        assert_eq!(get(app(true), "/api/v1/templates").await, StatusCode::OK);
        assert_eq!(get(app(true), "/metrics").await, StatusCode::OK);
    }
}
