use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::access::FeedKind;
use super::domain::{
    AppUser, Checklist, ChecklistId, ChecklistSummary, Evidence, ItemId, ReviewDecision, UserId,
};
use super::lifecycle::{Attachments, AuthorizationError, LifecycleError};
use super::repository::{ChecklistRepository, RepositoryError};
use super::service::{ChecklistService, ChecklistServiceError, SubmissionRequest};
use super::templates::CatalogError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub work_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentPayload {
    pub content_type: String,
    pub data_base64: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitPayload {
    pub draft: Checklist,
    #[serde(default)]
    pub attachments: BTreeMap<String, AttachmentPayload>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewPayload {
    pub decision: ReviewDecision,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub feed: FeedKind,
    pub checklists: Vec<ChecklistSummary>,
}

/// Router builder exposing template lookup, submission, review, and role-scoped listing.
pub fn checklist_router<R>(service: Arc<ChecklistService<R>>) -> Router
where
    R: ChecklistRepository + 'static,
{
    Router::new()
        .route("/api/v1/templates", get(templates_handler::<R>))
        .route("/api/v1/templates/:work_type", get(template_handler::<R>))
        .route("/api/v1/checklists/drafts", post(draft_handler::<R>))
        .route(
            "/api/v1/checklists",
            get(feed_handler::<R>).post(submit_handler::<R>),
        )
        .route("/api/v1/checklists/:checklist_id", get(detail_handler::<R>))
        .route(
            "/api/v1/checklists/:checklist_id/review",
            post(review_handler::<R>),
        )
        .with_state(service)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Identity is injected by the upstream auth gateway.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<AppUser, AuthorizationError> {
    let id = header_value(headers, USER_ID_HEADER).ok_or(AuthorizationError::Unauthenticated)?;
    let role = header_value(headers, USER_ROLE_HEADER)
        .ok_or(AuthorizationError::Unauthenticated)?
        .parse()?;
    let name = header_value(headers, USER_NAME_HEADER).unwrap_or(id);

    Ok(AppUser {
        id: UserId(id.to_string()),
        name: name.to_string(),
        role,
    })
}

type AttachmentDecodeError = (String, base64::DecodeError);

fn decode_attachments(
    raw: BTreeMap<String, AttachmentPayload>,
) -> Result<Attachments, AttachmentDecodeError> {
    raw.into_iter()
        .map(
            |(item_id, payload)| -> Result<(ItemId, Evidence), AttachmentDecodeError> {
                let bytes = STANDARD
                    .decode(payload.data_base64.as_bytes())
                    .map_err(|err| (item_id.clone(), err))?;
                Ok((ItemId(item_id), Evidence::new(payload.content_type, bytes)))
            },
        )
        .collect()
}

fn error_payload(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) fn error_response(error: ChecklistServiceError) -> Response {
    let status = match &error {
        ChecklistServiceError::Lifecycle(LifecycleError::Validation(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ChecklistServiceError::Lifecycle(LifecycleError::Authorization(
            AuthorizationError::Unauthenticated,
        )) => StatusCode::UNAUTHORIZED,
        ChecklistServiceError::Lifecycle(LifecycleError::Authorization(_)) => StatusCode::FORBIDDEN,
        ChecklistServiceError::Lifecycle(LifecycleError::State(_)) => StatusCode::CONFLICT,
        ChecklistServiceError::Lifecycle(LifecycleError::Storage(_)) => StatusCode::BAD_GATEWAY,
        ChecklistServiceError::Catalog(
            CatalogError::UnknownWorkType(_) | CatalogError::UnknownTemplate(_),
        ) => StatusCode::NOT_FOUND,
        ChecklistServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ChecklistServiceError::Catalog(_) | ChecklistServiceError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_payload(status, error.to_string())
}

fn unauthorized(error: AuthorizationError) -> Response {
    error_response(LifecycleError::from(error).into())
}

pub(crate) async fn templates_handler<R>(State(service): State<Arc<ChecklistService<R>>>) -> Response
where
    R: ChecklistRepository + 'static,
{
    (StatusCode::OK, axum::Json(service.templates())).into_response()
}

pub(crate) async fn template_handler<R>(
    State(service): State<Arc<ChecklistService<R>>>,
    Path(work_type): Path<String>,
) -> Response
where
    R: ChecklistRepository + 'static,
{
    match service.template(&work_type) {
        Ok(template) => (StatusCode::OK, axum::Json(template)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn draft_handler<R>(
    State(service): State<Arc<ChecklistService<R>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<DraftRequest>,
) -> Response
where
    R: ChecklistRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(err) => return unauthorized(err),
    };

    match service.open_draft(&actor, &request.work_type) {
        Ok(draft) => (StatusCode::CREATED, axum::Json(draft)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<ChecklistService<R>>>,
    headers: HeaderMap,
    axum::Json(payload): axum::Json<SubmitPayload>,
) -> Response
where
    R: ChecklistRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(err) => return unauthorized(err),
    };

    let attachments = match decode_attachments(payload.attachments) {
        Ok(attachments) => attachments,
        Err((item_id, err)) => {
            return error_payload(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("attachment for {item_id} is not valid base64: {err}"),
            )
        }
    };

    let request = SubmissionRequest {
        draft: payload.draft,
        attachments,
    };
    match service.submit(&actor, request).await {
        Ok(checklist) => (StatusCode::CREATED, axum::Json(checklist)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn feed_handler<R>(
    State(service): State<Arc<ChecklistService<R>>>,
    headers: HeaderMap,
) -> Response
where
    R: ChecklistRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(err) => return unauthorized(err),
    };

    let feed = service.feed(&actor);
    match service.refresh(&feed) {
        Ok(checklists) => {
            let body = FeedResponse {
                feed: feed.kind(),
                checklists: checklists.iter().map(Checklist::summary).collect(),
            };
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn detail_handler<R>(
    State(service): State<Arc<ChecklistService<R>>>,
    headers: HeaderMap,
    Path(checklist_id): Path<String>,
) -> Response
where
    R: ChecklistRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(err) => return unauthorized(err),
    };

    match service.get(&actor, &ChecklistId(checklist_id)) {
        Ok(checklist) => (StatusCode::OK, axum::Json(checklist)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn review_handler<R>(
    State(service): State<Arc<ChecklistService<R>>>,
    headers: HeaderMap,
    Path(checklist_id): Path<String>,
    axum::Json(payload): axum::Json<ReviewPayload>,
) -> Response
where
    R: ChecklistRepository + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(err) => return unauthorized(err),
    };

    match service
        .review(&actor, &ChecklistId(checklist_id), payload.decision)
        .await
    {
        Ok(checklist) => (StatusCode::OK, axum::Json(checklist)).into_response(),
        Err(err) => error_response(err),
    }
}
