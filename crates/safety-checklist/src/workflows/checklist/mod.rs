//! Pre-work safety checklists: templates, submission with risk aggregation, supervisor review,
//! and role-scoped access.

pub mod access;
pub mod classifier;
pub mod domain;
pub mod evidence;
pub mod lifecycle;
pub mod repository;
pub mod risk;
pub mod router;
pub mod service;
pub mod templates;

#[cfg(test)]
mod tests;

pub use access::{
    authorize_mutation, authorize_read, mutate, visible_checklists, ChecklistFeed,
    ChecklistOperation, FeedKind, Mutation,
};
pub use classifier::{ClassifierError, RiskClassifier, SimulatedClassifier};
pub use domain::{
    Answer, AppUser, Checklist, ChecklistId, ChecklistItemResponse, ChecklistStatus,
    ChecklistSummary, Evidence, EvidenceRef, ItemId, OverallRisk, ReviewDecision, RiskLevel,
    TemplateId, UserId, UserRole,
};
pub use evidence::{EvidenceError, EvidenceStore};
pub use lifecycle::{
    Attachments, AuthorizationError, LifecycleEngine, LifecycleError, StateError, StatusPatch,
    ValidationError,
};
pub use repository::{
    ChecklistFilter, ChecklistOrder, ChecklistQuery, ChecklistRepository, RepositoryError,
};
pub use risk::{assess, worst_observed, RiskAssessment};
pub use router::checklist_router;
pub use service::{ChecklistService, ChecklistServiceError, SubmissionRequest};
pub use templates::{CatalogError, ChecklistTemplate, TemplateCatalog, TemplateItem};
