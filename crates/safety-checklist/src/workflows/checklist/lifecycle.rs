use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::classifier::{ClassifierError, RiskClassifier};
use super::domain::{
    Answer, AppUser, Checklist, ChecklistId, ChecklistItemResponse, ChecklistStatus, Evidence,
    ItemId, OverallRisk, ReviewDecision, RiskLevel, TemplateId, UserId, UserRole,
};
use super::evidence::{EvidenceError, EvidenceStore};
use super::risk;
use super::templates::ChecklistTemplate;

/// Photos attached to draft responses, keyed by item id.
pub type Attachments = BTreeMap<ItemId, Evidence>;

/// Incomplete or malformed submissions. The draft is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("required items unanswered: {}", join_ids(.missing_item_ids))]
    MissingAnswers { missing_item_ids: Vec<ItemId> },
    #[error(
        "responses do not match template items (expected [{}], found [{}])",
        join_ids(.expected),
        join_ids(.found)
    )]
    ResponseMismatch {
        expected: Vec<ItemId>,
        found: Vec<ItemId>,
    },
    #[error("draft references template {found} but was validated against {expected}")]
    TemplateMismatch {
        expected: TemplateId,
        found: TemplateId,
    },
}

impl ValidationError {
    pub fn missing_item_ids(&self) -> Vec<ItemId> {
        match self {
            ValidationError::MissingAnswers { missing_item_ids } => missing_item_ids.clone(),
            ValidationError::ResponseMismatch { expected, found } => expected
                .iter()
                .filter(|id| !found.contains(id))
                .cloned()
                .collect(),
            ValidationError::TemplateMismatch { .. } => Vec::new(),
        }
    }
}

fn join_ids(ids: &[ItemId]) -> String {
    ids.iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    #[error("role {role} may not {operation}")]
    RoleNotPermitted {
        role: UserRole,
        operation: &'static str,
    },
    #[error("user {actor} is not the submitter of checklist {checklist_id}")]
    NotSubmitter {
        actor: UserId,
        checklist_id: ChecklistId,
    },
    #[error("unrecognised role '{0}'")]
    UnknownRole(String),
    #[error("request carries no authenticated user")]
    Unauthenticated,
}

/// Illegal transition. Losing a concurrent review also lands here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("checklist already handled: cannot move from {current} to {requested}")]
pub struct StateError {
    pub current: ChecklistStatus,
    pub requested: ChecklistStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Storage(#[from] EvidenceError),
}

/// Status-only change written by a review. Nothing else on a submitted checklist moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPatch {
    pub status: ChecklistStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl StatusPatch {
    pub fn apply(&self, checklist: &mut Checklist) {
        checklist.status = self.status;
        if self.approved_at.is_some() {
            checklist.approved_at = self.approved_at;
        }
        if self.rejected_at.is_some() {
            checklist.rejected_at = self.rejected_at;
        }
    }
}

/// Owns the checklist state machine and risk aggregation.
pub struct LifecycleEngine {
    classifier: Arc<dyn RiskClassifier>,
    evidence: Arc<dyn EvidenceStore>,
    classification_timeout: Duration,
}

impl LifecycleEngine {
    pub fn new(
        classifier: Arc<dyn RiskClassifier>,
        evidence: Arc<dyn EvidenceStore>,
        classification_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            evidence,
            classification_timeout,
        }
    }

    /// Fresh in-progress checklist with every item unanswered.
    pub fn new_draft(
        id: ChecklistId,
        template: &ChecklistTemplate,
        submitter: &AppUser,
        now: DateTime<Utc>,
    ) -> Checklist {
        Checklist {
            id,
            template_id: template.id.clone(),
            work_type: template.work_type.clone(),
            submitter_id: submitter.id.clone(),
            submitter_name: submitter.name.clone(),
            status: ChecklistStatus::InProgress,
            responses: template
                .item_ids()
                .cloned()
                .map(ChecklistItemResponse::unanswered)
                .collect(),
            created_at: now,
            submitted_at: None,
            approved_at: None,
            rejected_at: None,
            overall_risk: OverallRisk::Unset,
            has_risk_factor: false,
        }
    }

    /// Completeness and shape checks run before any side effect.
    pub fn validate(draft: &Checklist, template: &ChecklistTemplate) -> Result<(), ValidationError> {
        if draft.template_id != template.id {
            return Err(ValidationError::TemplateMismatch {
                expected: template.id.clone(),
                found: draft.template_id.clone(),
            });
        }

        let matches_template = draft.responses.len() == template.items.len()
            && draft
                .responses
                .iter()
                .zip(template.item_ids())
                .all(|(response, id)| &response.item_id == id);
        if !matches_template {
            return Err(ValidationError::ResponseMismatch {
                expected: template.item_ids().cloned().collect(),
                found: draft
                    .responses
                    .iter()
                    .map(|response| response.item_id.clone())
                    .collect(),
            });
        }

        let missing_item_ids: Vec<ItemId> = template
            .items
            .iter()
            .zip(&draft.responses)
            .filter(|(item, response)| item.required && response.answer == Answer::Unanswered)
            .map(|(item, _)| item.id.clone())
            .collect();
        if !missing_item_ids.is_empty() {
            return Err(ValidationError::MissingAnswers { missing_item_ids });
        }

        Ok(())
    }

    /// Move a draft to `submitted`, uploading evidence and classifying flagged items.
    ///
    /// Uploads are sequential and a failed upload fails the submission. Photos stored before
    /// the failure stay in the evidence store unreferenced. Classification runs concurrently
    /// across items; a failed or late classification leaves that item unrated.
    ///
    /// Only answers are taken from the draft; everything else the server owns is rebuilt here.
    /// A creation time later than `now` is pulled back to `now`.
    pub async fn submit_checklist(
        &self,
        draft: &Checklist,
        template: &ChecklistTemplate,
        mut attachments: Attachments,
        now: DateTime<Utc>,
    ) -> Result<Checklist, LifecycleError> {
        if draft.status != ChecklistStatus::InProgress {
            return Err(StateError {
                current: draft.status,
                requested: ChecklistStatus::Submitted,
            }
            .into());
        }
        Self::validate(draft, template)?;

        let mut submitted = draft.clone();
        submitted.work_type = template.work_type.clone();
        submitted.created_at = submitted.created_at.min(now);
        submitted.approved_at = None;
        submitted.rejected_at = None;
        let mut pending: Vec<(usize, Evidence)> = Vec::new();

        for (index, response) in submitted.responses.iter_mut().enumerate() {
            response.classified_risk = None;
            response.evidence_ref = None;
            let attachment = attachments.remove(&response.item_id);

            if response.answer != Answer::No {
                if attachment.is_some() {
                    debug!(item_id = %response.item_id, "discarding evidence on non-flagged item");
                }
                continue;
            }

            if let Some(evidence) = attachment {
                let evidence_ref = self.evidence.put(&evidence).await?;
                response.evidence_ref = Some(evidence_ref);
                pending.push((index, evidence));
            }
        }

        if !attachments.is_empty() {
            debug!(
                count = attachments.len(),
                "discarding evidence for items outside the template"
            );
        }

        let labels = join_all(
            pending
                .iter()
                .map(|(_, evidence)| self.classify_with_deadline(evidence)),
        )
        .await;

        for ((index, _), label) in pending.iter().zip(labels) {
            let response = &mut submitted.responses[*index];
            match label {
                Ok(level) => response.classified_risk = Some(level),
                Err(err) => {
                    warn!(
                        checklist_id = %submitted.id,
                        item_id = %response.item_id,
                        error = %err,
                        "classification unavailable, keeping risk flag only"
                    );
                }
            }
        }

        let assessment = risk::assess(&submitted.responses);
        submitted.has_risk_factor = assessment.has_risk_factor;
        submitted.overall_risk = OverallRisk::Rated(assessment.overall);
        submitted.status = ChecklistStatus::Submitted;
        submitted.submitted_at = Some(now);

        info!(
            checklist_id = %submitted.id,
            work_type = %submitted.work_type,
            overall_risk = submitted.overall_risk.label(),
            flagged = assessment.flagged_items.len(),
            "checklist submitted"
        );

        Ok(submitted)
    }

    async fn classify_with_deadline(&self, evidence: &Evidence) -> Result<RiskLevel, ClassifierError> {
        match tokio::time::timeout(self.classification_timeout, self.classifier.classify(evidence))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::TimedOut(self.classification_timeout)),
        }
    }

    /// Check a review request and produce the status patch it would write.
    pub fn plan_review(
        checklist: &Checklist,
        decision: ReviewDecision,
        actor: &AppUser,
        now: DateTime<Utc>,
    ) -> Result<StatusPatch, LifecycleError> {
        if actor.role != UserRole::Supervisor {
            return Err(AuthorizationError::RoleNotPermitted {
                role: actor.role,
                operation: "review checklists",
            }
            .into());
        }

        let requested = decision.target_status();
        if checklist.status != ChecklistStatus::Submitted {
            return Err(StateError {
                current: checklist.status,
                requested,
            }
            .into());
        }

        let at = match checklist.submitted_at {
            Some(submitted_at) => now.max(submitted_at),
            None => now,
        };

        Ok(match decision {
            ReviewDecision::Approved => StatusPatch {
                status: requested,
                approved_at: Some(at),
                rejected_at: None,
            },
            ReviewDecision::Rejected => StatusPatch {
                status: requested,
                approved_at: None,
                rejected_at: Some(at),
            },
        })
    }

    pub fn review_checklist(
        checklist: &Checklist,
        decision: ReviewDecision,
        actor: &AppUser,
        now: DateTime<Utc>,
    ) -> Result<Checklist, LifecycleError> {
        let patch = Self::plan_review(checklist, decision, actor, now)?;
        let mut reviewed = checklist.clone();
        patch.apply(&mut reviewed);
        Ok(reviewed)
    }
}
