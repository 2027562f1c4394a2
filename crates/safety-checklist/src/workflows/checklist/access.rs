use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{AppUser, Checklist, ChecklistStatus, ReviewDecision, UserRole};
use super::lifecycle::{
    Attachments, AuthorizationError, LifecycleEngine, LifecycleError, StatusPatch,
};
use super::repository::{
    ChecklistFilter, ChecklistOrder, ChecklistQuery, ChecklistRepository, RepositoryError,
};
use super::templates::ChecklistTemplate;

impl FromStr for UserRole {
    type Err = AuthorizationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "Worker" | "worker" => Ok(UserRole::Worker),
            "Supervisor" | "supervisor" => Ok(UserRole::Supervisor),
            "SafetyManager" | "safety_manager" | "safety-manager" => Ok(UserRole::SafetyManager),
            other => Err(AuthorizationError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    OwnSubmissions,
    ReviewQueue,
    PrioritizedOverview,
}

/// Role-scoped view over stored checklists.
///
/// Building a feed does not touch storage; each `load` re-runs the query, so a refresh is
/// simply another `load`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistFeed {
    kind: FeedKind,
    query: ChecklistQuery,
}

impl ChecklistFeed {
    pub fn for_actor(actor: &AppUser) -> Self {
        match actor.role {
            UserRole::Worker => Self {
                kind: FeedKind::OwnSubmissions,
                query: ChecklistQuery {
                    filter: ChecklistFilter::Submitter(actor.id.clone()),
                    order: ChecklistOrder::CreatedAtDesc,
                },
            },
            UserRole::Supervisor => Self {
                kind: FeedKind::ReviewQueue,
                query: ChecklistQuery {
                    filter: ChecklistFilter::Status(ChecklistStatus::Submitted),
                    order: ChecklistOrder::SubmittedAtDesc,
                },
            },
            UserRole::SafetyManager => Self {
                kind: FeedKind::PrioritizedOverview,
                query: ChecklistQuery {
                    filter: ChecklistFilter::All,
                    order: ChecklistOrder::SubmittedAtDesc,
                },
            },
        }
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub fn query(&self) -> &ChecklistQuery {
        &self.query
    }

    pub fn load<R>(&self, repository: &R) -> Result<Vec<Checklist>, RepositoryError>
    where
        R: ChecklistRepository + ?Sized,
    {
        let mut checklists = repository.query(&self.query)?;
        if self.kind == FeedKind::PrioritizedOverview {
            // stable: keeps newest-submitted order inside each partition
            checklists.sort_by_key(|checklist| !checklist.is_priority());
        }
        Ok(checklists)
    }
}

pub fn visible_checklists<R>(
    repository: &R,
    actor: &AppUser,
) -> Result<Vec<Checklist>, RepositoryError>
where
    R: ChecklistRepository + ?Sized,
{
    ChecklistFeed::for_actor(actor).load(repository)
}

/// Workers read only their own checklists; reviewers and managers read any.
pub fn authorize_read(actor: &AppUser, checklist: &Checklist) -> Result<(), AuthorizationError> {
    match actor.role {
        UserRole::Worker if actor.id != checklist.submitter_id => {
            Err(AuthorizationError::NotSubmitter {
                actor: actor.id.clone(),
                checklist_id: checklist.id.clone(),
            })
        }
        _ => Ok(()),
    }
}

pub enum ChecklistOperation<'a> {
    Submit {
        template: &'a ChecklistTemplate,
        attachments: Attachments,
    },
    Review(ReviewDecision),
}

impl ChecklistOperation<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            ChecklistOperation::Submit { .. } => "submit",
            ChecklistOperation::Review(ReviewDecision::Approved) => "approve",
            ChecklistOperation::Review(ReviewDecision::Rejected) => "reject",
        }
    }
}

/// Result of a permitted mutation, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Submitted(Checklist),
    Reviewed(StatusPatch),
}

/// Identity and role gate in front of the lifecycle engine.
pub fn authorize_mutation(
    actor: &AppUser,
    checklist: &Checklist,
    operation: &ChecklistOperation<'_>,
) -> Result<(), AuthorizationError> {
    match operation {
        ChecklistOperation::Submit { .. } => {
            if actor.role != UserRole::Worker {
                return Err(AuthorizationError::RoleNotPermitted {
                    role: actor.role,
                    operation: "submit checklists",
                });
            }
            if actor.id != checklist.submitter_id {
                return Err(AuthorizationError::NotSubmitter {
                    actor: actor.id.clone(),
                    checklist_id: checklist.id.clone(),
                });
            }
            Ok(())
        }
        ChecklistOperation::Review(_) => {
            if actor.role != UserRole::Supervisor {
                return Err(AuthorizationError::RoleNotPermitted {
                    role: actor.role,
                    operation: "review checklists",
                });
            }
            Ok(())
        }
    }
}

pub async fn mutate(
    engine: &LifecycleEngine,
    actor: &AppUser,
    checklist: &Checklist,
    operation: ChecklistOperation<'_>,
    now: DateTime<Utc>,
) -> Result<Mutation, LifecycleError> {
    authorize_mutation(actor, checklist, &operation)?;

    match operation {
        ChecklistOperation::Submit {
            template,
            attachments,
        } => engine
            .submit_checklist(checklist, template, attachments, now)
            .await
            .map(Mutation::Submitted),
        ChecklistOperation::Review(decision) => {
            LifecycleEngine::plan_review(checklist, decision, actor, now).map(Mutation::Reviewed)
        }
    }
}
