use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::checklist::classifier::{ClassifierError, RiskClassifier};
use crate::workflows::checklist::domain::{
    Answer, AppUser, Checklist, ChecklistId, ChecklistStatus, Evidence, EvidenceRef, ItemId,
    OverallRisk, RiskLevel, UserRole,
};
use crate::workflows::checklist::evidence::{EvidenceError, EvidenceStore};
use crate::workflows::checklist::lifecycle::{LifecycleEngine, StatusPatch};
use crate::workflows::checklist::repository::{
    ChecklistQuery, ChecklistRepository, RepositoryError,
};
use crate::workflows::checklist::service::ChecklistService;
use crate::workflows::checklist::templates::{ChecklistTemplate, TemplateCatalog};

pub(super) const LADDER: &str = "Ladder work";

pub(super) fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn worker() -> AppUser {
    AppUser::new("worker-1", "Kim Worker", UserRole::Worker)
}

pub(super) fn other_worker() -> AppUser {
    AppUser::new("worker-2", "Lee Worker", UserRole::Worker)
}

pub(super) fn supervisor() -> AppUser {
    AppUser::new("supervisor-1", "Park Supervisor", UserRole::Supervisor)
}

pub(super) fn manager() -> AppUser {
    AppUser::new("manager-1", "Choi Manager", UserRole::SafetyManager)
}

pub(super) fn catalog() -> TemplateCatalog {
    TemplateCatalog::standard()
}

pub(super) fn ladder_template() -> ChecklistTemplate {
    catalog().get_template(LADDER).expect("ladder template").clone()
}

pub(super) fn item(n: usize) -> ItemId {
    ItemId(format!("item{n}"))
}

pub(super) fn draft_for(actor: &AppUser, id: &str) -> Checklist {
    LifecycleEngine::new_draft(
        ChecklistId(id.to_string()),
        &ladder_template(),
        actor,
        at(8),
    )
}

/// Ladder draft with answers applied in template order.
pub(super) fn answered_draft(answers: &[Answer]) -> Checklist {
    let mut draft = draft_for(&worker(), "draft-1");
    for (index, answer) in answers.iter().enumerate() {
        assert!(draft.answer(&item(index + 1), *answer));
    }
    draft
}

/// Photo whose first byte tells `ScriptedClassifier` which label to return.
pub(super) fn photo(level: RiskLevel) -> Evidence {
    let marker = match level {
        RiskLevel::Safe => 0,
        RiskLevel::Warning => 1,
        RiskLevel::Danger => 2,
    };
    Evidence::new("image/jpeg", vec![marker, 0xD8, 0xFF])
}

pub(super) fn stored_checklist(
    id: &str,
    owner: &AppUser,
    status: ChecklistStatus,
    created: u32,
    submitted: Option<u32>,
    has_risk_factor: bool,
    overall: OverallRisk,
) -> Checklist {
    let mut checklist = draft_for(owner, id);
    checklist.status = status;
    checklist.created_at = at(created);
    checklist.submitted_at = submitted.map(at);
    checklist.has_risk_factor = has_risk_factor;
    checklist.overall_risk = overall;
    checklist
}

pub(super) struct ScriptedClassifier {
    pub(super) calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub(super) fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RiskClassifier for ScriptedClassifier {
    async fn classify(&self, evidence: &Evidence) -> Result<RiskLevel, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match evidence.bytes.first() {
            Some(0) => Ok(RiskLevel::Safe),
            Some(1) => Ok(RiskLevel::Warning),
            Some(2) => Ok(RiskLevel::Danger),
            _ => Err(ClassifierError::Unavailable("unreadable photo".to_string())),
        }
    }
}

pub(super) struct FailingClassifier;

#[async_trait]
impl RiskClassifier for FailingClassifier {
    async fn classify(&self, _evidence: &Evidence) -> Result<RiskLevel, ClassifierError> {
        Err(ClassifierError::Unavailable("model offline".to_string()))
    }
}

pub(super) struct StalledClassifier;

#[async_trait]
impl RiskClassifier for StalledClassifier {
    async fn classify(&self, _evidence: &Evidence) -> Result<RiskLevel, ClassifierError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(RiskLevel::Danger)
    }
}

#[derive(Default)]
pub(super) struct MemoryEvidence {
    stored: Mutex<Vec<Evidence>>,
}

impl MemoryEvidence {
    pub(super) fn count(&self) -> usize {
        self.stored.lock().expect("evidence mutex poisoned").len()
    }
}

#[async_trait]
impl EvidenceStore for MemoryEvidence {
    async fn put(&self, evidence: &Evidence) -> Result<EvidenceRef, EvidenceError> {
        let mut guard = self.stored.lock().expect("evidence mutex poisoned");
        guard.push(evidence.clone());
        Ok(EvidenceRef(format!("memory://evidence/{}", guard.len())))
    }
}

pub(super) struct FailingEvidence;

#[async_trait]
impl EvidenceStore for FailingEvidence {
    async fn put(&self, _evidence: &Evidence) -> Result<EvidenceRef, EvidenceError> {
        Err(EvidenceError::Storage("bucket unreachable".to_string()))
    }
}

pub(super) fn engine_with(
    classifier: Arc<dyn RiskClassifier>,
    evidence: Arc<dyn EvidenceStore>,
) -> LifecycleEngine {
    LifecycleEngine::new(classifier, evidence, Duration::from_millis(200))
}

pub(super) fn engine() -> (LifecycleEngine, Arc<MemoryEvidence>) {
    let evidence = Arc::new(MemoryEvidence::default());
    let engine = engine_with(Arc::new(ScriptedClassifier::new()), evidence.clone());
    (engine, evidence)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ChecklistId, Checklist>>>,
}

impl MemoryRepository {
    pub(super) fn seed(&self, checklist: Checklist) {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .insert(checklist.id.clone(), checklist);
    }
}

impl ChecklistRepository for MemoryRepository {
    fn create(&self, checklist: Checklist) -> Result<Checklist, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&checklist.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(checklist.id.clone(), checklist.clone());
        Ok(checklist)
    }

    fn get(&self, id: &ChecklistId) -> Result<Option<Checklist>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn conditional_update(
        &self,
        id: &ChecklistId,
        expected: ChecklistStatus,
        patch: &StatusPatch,
    ) -> Result<Checklist, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if record.status != expected {
            return Err(RepositoryError::StatusConflict {
                current: record.status,
            });
        }
        patch.apply(record);
        Ok(record.clone())
    }

    fn query(&self, query: &ChecklistQuery) -> Result<Vec<Checklist>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(query.apply(guard.values()))
    }
}

/// Serves the snapshot taken before a competing reviewer wrote, as a lagging replica would.
pub(super) struct StaleReadRepository {
    pub(super) inner: MemoryRepository,
    pub(super) snapshot: Checklist,
}

impl ChecklistRepository for StaleReadRepository {
    fn create(&self, checklist: Checklist) -> Result<Checklist, RepositoryError> {
        self.inner.create(checklist)
    }

    fn get(&self, id: &ChecklistId) -> Result<Option<Checklist>, RepositoryError> {
        if id == &self.snapshot.id {
            return Ok(Some(self.snapshot.clone()));
        }
        self.inner.get(id)
    }

    fn conditional_update(
        &self,
        id: &ChecklistId,
        expected: ChecklistStatus,
        patch: &StatusPatch,
    ) -> Result<Checklist, RepositoryError> {
        self.inner.conditional_update(id, expected, patch)
    }

    fn query(&self, query: &ChecklistQuery) -> Result<Vec<Checklist>, RepositoryError> {
        self.inner.query(query)
    }
}

pub(super) struct UnavailableRepository;

impl ChecklistRepository for UnavailableRepository {
    fn create(&self, _checklist: Checklist) -> Result<Checklist, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn get(&self, _id: &ChecklistId) -> Result<Option<Checklist>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn conditional_update(
        &self,
        _id: &ChecklistId,
        _expected: ChecklistStatus,
        _patch: &StatusPatch,
    ) -> Result<Checklist, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn query(&self, _query: &ChecklistQuery) -> Result<Vec<Checklist>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn service_with<R>(repository: Arc<R>) -> (ChecklistService<R>, Arc<MemoryEvidence>)
where
    R: ChecklistRepository + 'static,
{
    let (engine, evidence) = engine();
    let service = ChecklistService::new(Arc::new(catalog()), repository, engine).with_clock(|| at(9));
    (service, evidence)
}

pub(super) fn build_service() -> (
    ChecklistService<MemoryRepository>,
    Arc<MemoryRepository>,
    Arc<MemoryEvidence>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let (service, evidence) = service_with(repository.clone());
    (service, repository, evidence)
}

pub(super) fn all_yes() -> [Answer; 4] {
    [Answer::Yes; 4]
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
