use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use safety_checklist::workflows::checklist::{
    Checklist, ChecklistId, ChecklistQuery, ChecklistRepository, ChecklistStatus, Evidence,
    EvidenceError, EvidenceRef, EvidenceStore, RepositoryError, StatusPatch,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local checklist store. The status check and write in `conditional_update` share one
/// lock, so two reviewers racing on the same checklist cannot both succeed.
#[derive(Default, Clone)]
pub(crate) struct InMemoryChecklistRepository {
    records: Arc<Mutex<HashMap<ChecklistId, Checklist>>>,
}

impl InMemoryChecklistRepository {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ChecklistId, Checklist>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl ChecklistRepository for InMemoryChecklistRepository {
    fn create(&self, checklist: Checklist) -> Result<Checklist, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&checklist.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(checklist.id.clone(), checklist.clone());
        Ok(checklist)
    }

    fn get(&self, id: &ChecklistId) -> Result<Option<Checklist>, RepositoryError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn conditional_update(
        &self,
        id: &ChecklistId,
        expected: ChecklistStatus,
        patch: &StatusPatch,
    ) -> Result<Checklist, RepositoryError> {
        let mut guard = self.lock()?;
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
        Ok(query.apply(self.lock()?.values()))
    }
}

/// Keeps uploaded photos in memory and hands out `{base_url}/{uuid}` references.
#[derive(Clone)]
pub(crate) struct InMemoryEvidenceStore {
    base_url: String,
    objects: Arc<Mutex<HashMap<String, Evidence>>>,
}

impl InMemoryEvidenceStore {
    pub(crate) fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Arc::default(),
        }
    }

    pub(crate) fn len(&self) -> Result<usize, EvidenceError> {
        Ok(self.objects()?.len())
    }

    fn objects(&self) -> Result<MutexGuard<'_, HashMap<String, Evidence>>, EvidenceError> {
        self.objects
            .lock()
            .map_err(|_| EvidenceError::Storage("evidence mutex poisoned".to_string()))
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn put(&self, evidence: &Evidence) -> Result<EvidenceRef, EvidenceError> {
        let url = format!("{}/{}", self.base_url, uuid::Uuid::new_v4());
        self.objects()?.insert(url.clone(), evidence.clone());
        Ok(EvidenceRef(url))
    }
}
