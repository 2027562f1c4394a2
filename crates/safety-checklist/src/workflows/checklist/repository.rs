use std::cmp::Ordering;

use serde::Serialize;

use super::domain::{Checklist, ChecklistId, ChecklistStatus, UserId};
use super::lifecycle::StatusPatch;

/// Predicate half of a checklist query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChecklistFilter {
    All,
    Submitter(UserId),
    Status(ChecklistStatus),
}

/// Ordering half of a checklist query. Both orders are newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChecklistOrder {
    CreatedAtDesc,
    /// Checklists without `submitted_at` trail the ones that have it.
    SubmittedAtDesc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistQuery {
    pub filter: ChecklistFilter,
    pub order: ChecklistOrder,
}

impl ChecklistQuery {
    pub fn matches(&self, checklist: &Checklist) -> bool {
        match &self.filter {
            ChecklistFilter::All => true,
            ChecklistFilter::Submitter(user_id) => &checklist.submitter_id == user_id,
            ChecklistFilter::Status(status) => &checklist.status == status,
        }
    }

    pub fn compare(&self, a: &Checklist, b: &Checklist) -> Ordering {
        match self.order {
            ChecklistOrder::CreatedAtDesc => b.created_at.cmp(&a.created_at),
            ChecklistOrder::SubmittedAtDesc => newest_submitted_first(a, b),
        }
    }

    /// Filter and order an unsorted snapshot, for stores without native ordering.
    pub fn apply<'a>(&self, checklists: impl IntoIterator<Item = &'a Checklist>) -> Vec<Checklist> {
        let mut selected: Vec<Checklist> = checklists
            .into_iter()
            .filter(|checklist| self.matches(checklist))
            .cloned()
            .collect();
        selected.sort_by(|a, b| self.compare(a, b));
        selected
    }
}

pub(crate) fn newest_submitted_first(a: &Checklist, b: &Checklist) -> Ordering {
    match (a.submitted_at, b.submitted_at) {
        (Some(a_at), Some(b_at)) => b_at.cmp(&a_at),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Persistence boundary.
///
/// `conditional_update` must be atomic per document: of two concurrent calls expecting the same
/// status, exactly one may succeed and the other must observe `StatusConflict`.
pub trait ChecklistRepository: Send + Sync {
    fn create(&self, checklist: Checklist) -> Result<Checklist, RepositoryError>;
    fn get(&self, id: &ChecklistId) -> Result<Option<Checklist>, RepositoryError>;
    fn conditional_update(
        &self,
        id: &ChecklistId,
        expected: ChecklistStatus,
        patch: &StatusPatch,
    ) -> Result<Checklist, RepositoryError>;
    fn query(&self, query: &ChecklistQuery) -> Result<Vec<Checklist>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record status is {current}, update skipped")]
    StatusConflict { current: ChecklistStatus },
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::checklist::domain::{OverallRisk, TemplateId};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn checklist(id: &str, owner: &str, created: u32, submitted: Option<u32>) -> Checklist {
        Checklist {
            id: ChecklistId(id.to_string()),
            template_id: TemplateId("ladder_v1".to_string()),
            work_type: "Ladder work".to_string(),
            submitter_id: UserId(owner.to_string()),
            submitter_name: owner.to_string(),
            status: if submitted.is_some() {
                ChecklistStatus::Submitted
            } else {
                ChecklistStatus::InProgress
            },
            responses: Vec::new(),
            created_at: at(created),
            submitted_at: submitted.map(at),
            approved_at: None,
            rejected_at: None,
            overall_risk: OverallRisk::Unset,
            has_risk_factor: false,
        }
    }

    fn ids(checklists: &[Checklist]) -> Vec<&str> {
        checklists.iter().map(|c| c.id.0.as_str()).collect()
    }

    #[test]
    fn submitter_query_orders_by_creation_desc() {
        let records = vec![
            checklist("a", "w1", 1, Some(2)),
            checklist("b", "w2", 3, Some(4)),
            checklist("c", "w1", 5, None),
        ];
        let query = ChecklistQuery {
            filter: ChecklistFilter::Submitter(UserId("w1".to_string())),
            order: ChecklistOrder::CreatedAtDesc,
        };
        assert_eq!(ids(&query.apply(&records)), vec!["c", "a"]);
    }

    #[test]
    fn submitted_order_places_unsubmitted_last() {
        let records = vec![
            checklist("draft", "w1", 9, None),
            checklist("early", "w1", 1, Some(2)),
            checklist("late", "w2", 3, Some(6)),
        ];
        let query = ChecklistQuery {
            filter: ChecklistFilter::All,
            order: ChecklistOrder::SubmittedAtDesc,
        };
        assert_eq!(ids(&query.apply(&records)), vec!["late", "early", "draft"]);
    }
}
