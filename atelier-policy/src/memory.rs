use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use atelier_core::{CoreError, CoreResult};
use crate::models::CancellationPolicy;
use crate::store::PolicyRepository;

/// Holds the active policy in memory. Readers always see a whole document.
#[derive(Default)]
pub struct InMemoryPolicyRepository {
    active: RwLock<Option<CancellationPolicy>>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: CancellationPolicy) -> Self {
        Self {
            active: RwLock::new(Some(policy)),
        }
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn get_active(&self) -> CoreResult<Option<CancellationPolicy>> {
        Ok(self.active.read().await.clone())
    }

    async fn seed_active(&self, policy: &CancellationPolicy) -> CoreResult<CancellationPolicy> {
        let mut active = self.active.write().await;
        let seeded = active.get_or_insert_with(|| policy.clone());
        Ok(seeded.clone())
    }

    async fn replace_active(&self, policy: &CancellationPolicy) -> CoreResult<CancellationPolicy> {
        let mut active = self.active.write().await;
        let current = active
            .as_mut()
            .ok_or_else(|| CoreError::NotFoundError("active cancellation policy".to_string()))?;

        let mut next = policy.clone();
        next.id = current.id;
        next.is_active = true;
        next.version = current.version + 1;
        next.created_at = current.created_at;
        next.updated_at = Utc::now();
        *current = next.clone();
        Ok(next)
    }
}
