use serde::{Deserialize, Serialize};

use super::domain::{ChecklistItemResponse, ItemId, RiskLevel};

/// Aggregate outcome computed once per submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall: RiskLevel,
    pub has_risk_factor: bool,
    pub flagged_items: Vec<ItemId>,
    pub unclassified_items: Vec<ItemId>,
}

/// Worst observed label wins; `Danger` is absorbing.
pub fn worst_observed(levels: impl IntoIterator<Item = RiskLevel>) -> RiskLevel {
    let mut overall = RiskLevel::Safe;
    for level in levels {
        match level {
            RiskLevel::Danger => return RiskLevel::Danger,
            RiskLevel::Warning => overall = RiskLevel::Warning,
            RiskLevel::Safe => {}
        }
    }
    overall
}

pub fn assess(responses: &[ChecklistItemResponse]) -> RiskAssessment {
    let flagged: Vec<&ChecklistItemResponse> = responses
        .iter()
        .filter(|response| response.is_risk_factor())
        .collect();

    let overall = worst_observed(flagged.iter().filter_map(|response| response.classified_risk));

    RiskAssessment {
        overall,
        has_risk_factor: !flagged.is_empty(),
        flagged_items: flagged
            .iter()
            .map(|response| response.item_id.clone())
            .collect(),
        unclassified_items: flagged
            .iter()
            .filter(|response| response.classified_risk.is_none())
            .map(|response| response.item_id.clone())
            .collect(),
    }
}
