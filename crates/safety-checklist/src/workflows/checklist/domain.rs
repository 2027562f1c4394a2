use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier for a checklist instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChecklistId(pub String);

impl ChecklistId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ChecklistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a published template version (e.g. `ladder_v1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub String);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a single template item, unique within its template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Roles recognised by the checklist workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    Worker,
    Supervisor,
    SafetyManager,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Worker => "Worker",
            UserRole::Supervisor => "Supervisor",
            UserRole::SafetyManager => "SafetyManager",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Authenticated actor issuing a request. Role assignment happens outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUser {
    pub id: UserId,
    pub name: String,
    pub role: UserRole,
}

impl AppUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: UserId(id.into()),
            name: name.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Answer {
    Yes,
    No,
    #[default]
    Unanswered,
}

/// Qualitative label produced by the risk classifier. Ordered `Safe < Warning < Danger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Safe,
    Warning,
    Danger,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Safe, RiskLevel::Warning, RiskLevel::Danger];

    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Safe => "Safe",
            RiskLevel::Warning => "Warning",
            RiskLevel::Danger => "Danger",
        }
    }
}

/// Aggregate rating on a checklist; `Unset` until submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverallRisk {
    #[default]
    Unset,
    Rated(RiskLevel),
}

impl OverallRisk {
    pub fn level(self) -> Option<RiskLevel> {
        match self {
            OverallRisk::Unset => None,
            OverallRisk::Rated(level) => Some(level),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OverallRisk::Unset => "Unset",
            OverallRisk::Rated(level) => level.label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChecklistStatus {
    InProgress,
    Submitted,
    Approved,
    Rejected,
}

impl ChecklistStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ChecklistStatus::InProgress => "in-progress",
            ChecklistStatus::Submitted => "submitted",
            ChecklistStatus::Approved => "approved",
            ChecklistStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ChecklistStatus::Approved | ChecklistStatus::Rejected)
    }
}

impl fmt::Display for ChecklistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Supervisor verdict on a submitted checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub const fn target_status(self) -> ChecklistStatus {
        match self {
            ReviewDecision::Approved => ChecklistStatus::Approved,
            ReviewDecision::Rejected => ChecklistStatus::Rejected,
        }
    }
}

/// Opaque, publicly resolvable URL of stored evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceRef(pub String);

/// Photo payload attached to a flagged item before upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Evidence {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItemResponse {
    pub item_id: ItemId,
    pub answer: Answer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_ref: Option<EvidenceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classified_risk: Option<RiskLevel>,
}

impl ChecklistItemResponse {
    pub fn unanswered(item_id: ItemId) -> Self {
        Self {
            item_id,
            answer: Answer::Unanswered,
            evidence_ref: None,
            classified_risk: None,
        }
    }

    pub fn is_risk_factor(&self) -> bool {
        self.answer == Answer::No
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: ChecklistId,
    pub template_id: TemplateId,
    pub work_type: String,
    pub submitter_id: UserId,
    pub submitter_name: String,
    pub status: ChecklistStatus,
    pub responses: Vec<ChecklistItemResponse>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub overall_risk: OverallRisk,
    #[serde(default)]
    pub has_risk_factor: bool,
}

impl Checklist {
    /// Set a draft answer. Answers other than `No` clear any stale evidence reference.
    pub fn answer(&mut self, item_id: &ItemId, answer: Answer) -> bool {
        match self
            .responses
            .iter_mut()
            .find(|response| &response.item_id == item_id)
        {
            Some(response) => {
                response.answer = answer;
                if answer != Answer::No {
                    response.evidence_ref = None;
                }
                true
            }
            None => false,
        }
    }

    /// Checklists flagged for the safety manager's attention.
    pub fn is_priority(&self) -> bool {
        self.has_risk_factor || self.overall_risk == OverallRisk::Rated(RiskLevel::Danger)
    }

    pub fn summary(&self) -> ChecklistSummary {
        ChecklistSummary {
            id: self.id.clone(),
            work_type: self.work_type.clone(),
            submitter_name: self.submitter_name.clone(),
            status: self.status.label(),
            overall_risk: self.overall_risk.label(),
            has_risk_factor: self.has_risk_factor,
            submitted_at: self.submitted_at,
        }
    }
}

/// List entry exposed by dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistSummary {
    pub id: ChecklistId,
    pub work_type: String,
    pub submitter_name: String,
    pub status: &'static str,
    pub overall_risk: &'static str,
    pub has_risk_factor: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}
