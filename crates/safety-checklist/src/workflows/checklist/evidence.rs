use async_trait::async_trait;

use super::domain::{Evidence, EvidenceRef};

/// Durable photo storage addressed by opaque URL.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn put(&self, evidence: &Evidence) -> Result<EvidenceRef, EvidenceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvidenceError {
    #[error("evidence storage failed: {0}")]
    Storage(String),
}
