use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::access::{self, ChecklistFeed, ChecklistOperation, Mutation};
use super::domain::{AppUser, Checklist, ChecklistId, ChecklistStatus, ReviewDecision, UserRole};
use super::lifecycle::{
    Attachments, AuthorizationError, LifecycleEngine, LifecycleError, StateError,
};
use super::repository::{ChecklistRepository, RepositoryError};
use super::templates::{CatalogError, ChecklistTemplate, TemplateCatalog};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A worker's completed draft plus the photos attached to its flagged items.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub draft: Checklist,
    pub attachments: Attachments,
}

/// Facade composing the template catalog, lifecycle engine, and repository.
pub struct ChecklistService<R> {
    catalog: Arc<TemplateCatalog>,
    repository: Arc<R>,
    engine: Arc<LifecycleEngine>,
    clock: Clock,
}

impl<R> ChecklistService<R>
where
    R: ChecklistRepository + 'static,
{
    pub fn new(catalog: Arc<TemplateCatalog>, repository: Arc<R>, engine: LifecycleEngine) -> Self {
        Self {
            catalog,
            repository,
            engine: Arc::new(engine),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn templates(&self) -> Vec<ChecklistTemplate> {
        self.catalog.list_templates().into_iter().cloned().collect()
    }

    pub fn template(&self, work_type: &str) -> Result<ChecklistTemplate, ChecklistServiceError> {
        Ok(self.catalog.get_template(work_type)?.clone())
    }

    /// Start a checklist against the latest template. Drafts stay with the caller until submit.
    pub fn open_draft(
        &self,
        actor: &AppUser,
        work_type: &str,
    ) -> Result<Checklist, ChecklistServiceError> {
        if actor.role != UserRole::Worker {
            return Err(LifecycleError::from(AuthorizationError::RoleNotPermitted {
                role: actor.role,
                operation: "open checklists",
            })
            .into());
        }

        let template = self.catalog.get_template(work_type)?;
        Ok(LifecycleEngine::new_draft(
            ChecklistId::generate(),
            template,
            actor,
            (self.clock)(),
        ))
    }

    pub async fn submit(
        &self,
        actor: &AppUser,
        request: SubmissionRequest,
    ) -> Result<Checklist, ChecklistServiceError> {
        let SubmissionRequest { draft, attachments } = request;

        let template = self
            .catalog
            .get(&draft.template_id)
            .ok_or_else(|| CatalogError::UnknownTemplate(draft.template_id.clone()))?;

        let operation = ChecklistOperation::Submit {
            template,
            attachments,
        };
        access::authorize_mutation(actor, &draft, &operation).map_err(LifecycleError::from)?;

        if let Some(existing) = self.repository.get(&draft.id)? {
            return Err(already_handled(existing.status, ChecklistStatus::Submitted));
        }

        self.apply(actor, &draft, operation).await
    }

    /// Approve or reject a submitted checklist. Exactly one concurrent reviewer wins.
    pub async fn review(
        &self,
        actor: &AppUser,
        checklist_id: &ChecklistId,
        decision: ReviewDecision,
    ) -> Result<Checklist, ChecklistServiceError> {
        let current = self
            .repository
            .get(checklist_id)?
            .ok_or(RepositoryError::NotFound)?;

        self.apply(actor, &current, ChecklistOperation::Review(decision))
            .await
    }

    async fn apply(
        &self,
        actor: &AppUser,
        checklist: &Checklist,
        operation: ChecklistOperation<'_>,
    ) -> Result<Checklist, ChecklistServiceError> {
        let label = operation.label();

        match access::mutate(&self.engine, actor, checklist, operation, (self.clock)()).await? {
            Mutation::Submitted(submitted) => match self.repository.create(submitted) {
                Ok(stored) => Ok(stored),
                Err(RepositoryError::Conflict) => Err(already_handled(
                    ChecklistStatus::Submitted,
                    ChecklistStatus::Submitted,
                )),
                Err(other) => Err(other.into()),
            },
            Mutation::Reviewed(patch) => match self.repository.conditional_update(
                &checklist.id,
                ChecklistStatus::Submitted,
                &patch,
            ) {
                Ok(reviewed) => {
                    info!(
                        checklist_id = %checklist.id,
                        reviewer = %actor.id,
                        decision = label,
                        "checklist reviewed"
                    );
                    Ok(reviewed)
                }
                Err(RepositoryError::StatusConflict { current }) => {
                    warn!(
                        checklist_id = %checklist.id,
                        reviewer = %actor.id,
                        %current,
                        "review lost to a concurrent decision"
                    );
                    Err(already_handled(current, patch.status))
                }
                Err(other) => Err(other.into()),
            },
        }
    }

    pub fn feed(&self, actor: &AppUser) -> ChecklistFeed {
        ChecklistFeed::for_actor(actor)
    }

    pub fn visible(&self, actor: &AppUser) -> Result<Vec<Checklist>, ChecklistServiceError> {
        Ok(self.feed(actor).load(self.repository.as_ref())?)
    }

    /// Re-run a previously built feed against current storage.
    pub fn refresh(&self, feed: &ChecklistFeed) -> Result<Vec<Checklist>, ChecklistServiceError> {
        Ok(feed.load(self.repository.as_ref())?)
    }

    pub fn get(
        &self,
        actor: &AppUser,
        checklist_id: &ChecklistId,
    ) -> Result<Checklist, ChecklistServiceError> {
        let checklist = self
            .repository
            .get(checklist_id)?
            .ok_or(RepositoryError::NotFound)?;
        access::authorize_read(actor, &checklist).map_err(LifecycleError::from)?;
        Ok(checklist)
    }
}

fn already_handled(current: ChecklistStatus, requested: ChecklistStatus) -> ChecklistServiceError {
    LifecycleError::from(StateError { current, requested }).into()
}

/// Error raised by the checklist service.
#[derive(Debug, thiserror::Error)]
pub enum ChecklistServiceError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
