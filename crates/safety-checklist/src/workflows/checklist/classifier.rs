use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::domain::{Evidence, RiskLevel};

/// Photo analysis boundary. Implementations may be slow, flaky, and non-deterministic.
#[async_trait]
pub trait RiskClassifier: Send + Sync {
    async fn classify(&self, evidence: &Evidence) -> Result<RiskLevel, ClassifierError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    #[error("risk classifier unavailable: {0}")]
    Unavailable(String),
    #[error("risk classifier timed out after {0:?}")]
    TimedOut(Duration),
}

/// Stand-in model: waits, then returns a uniformly random label.
#[derive(Debug, Clone)]
pub struct SimulatedClassifier {
    delay: Duration,
}

impl SimulatedClassifier {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedClassifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl RiskClassifier for SimulatedClassifier {
    async fn classify(&self, evidence: &Evidence) -> Result<RiskLevel, ClassifierError> {
        if evidence.bytes.is_empty() {
            return Err(ClassifierError::Unavailable("empty photo payload".to_string()));
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let index = rand::thread_rng().gen_range(0..RiskLevel::ALL.len());
        Ok(RiskLevel::ALL[index])
    }
}
