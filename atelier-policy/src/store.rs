use async_trait::async_trait;
use std::sync::Arc;

use atelier_core::CoreResult;
use crate::models::{CancellationPolicy, PolicyUpdate};

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn get_active(&self) -> CoreResult<Option<CancellationPolicy>>;

    /// Stores `policy` as the active one unless an active policy already exists, and
    /// returns whichever policy is active afterwards. Safe to race.
    async fn seed_active(&self, policy: &CancellationPolicy) -> CoreResult<CancellationPolicy>;

    /// Overwrites the active policy's fields in one write and bumps its version.
    async fn replace_active(&self, policy: &CancellationPolicy) -> CoreResult<CancellationPolicy>;
}

/// Accessor for the active cancellation policy.
pub struct PolicyStore {
    repo: Arc<dyn PolicyRepository>,
}

impl PolicyStore {
    pub fn new(repo: Arc<dyn PolicyRepository>) -> Self {
        Self { repo }
    }

    /// Returns the active policy, seeding the defaults the first time.
    pub async fn get_active(&self) -> CoreResult<CancellationPolicy> {
        if let Some(policy) = self.repo.get_active().await? {
            return Ok(policy);
        }
        tracing::info!("No active cancellation policy, seeding defaults");
        self.repo.seed_active(&CancellationPolicy::with_defaults()).await
    }

    pub async fn update(&self, update: PolicyUpdate, admin_id: &str) -> CoreResult<CancellationPolicy> {
        let mut policy = self.get_active().await?;
        policy.apply(update, admin_id)?;
        let stored = self.repo.replace_active(&policy).await?;
        tracing::info!(
            version = stored.version,
            admin_id = %admin_id,
            "Cancellation policy updated"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryPolicyRepository;
    use atelier_core::CoreError;

    #[tokio::test]
    async fn test_defaults_seeded_once() {
        let store = PolicyStore::new(Arc::new(InMemoryPolicyRepository::new()));

        let first = store.get_active().await.unwrap();
        let second = store.get_active().await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.version, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_reads_agree() {
        let store = Arc::new(PolicyStore::new(Arc::new(InMemoryPolicyRepository::new())));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.get_active().await.unwrap().id }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_fields_on_same_document() {
        let store = PolicyStore::new(Arc::new(InMemoryPolicyRepository::new()));
        let original = store.get_active().await.unwrap();

        let updated = store
            .update(
                PolicyUpdate {
                    response_time_hours: Some(24),
                    ..Default::default()
                },
                "admin-7",
            )
            .await
            .unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.version, original.version + 1);
        assert_eq!(updated.response_time_hours, 24);
        assert_eq!(updated.time_based_rules, original.time_based_rules);
        assert_eq!(store.get_active().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_invalid_update_is_rejected() {
        let store = PolicyStore::new(Arc::new(InMemoryPolicyRepository::new()));
        let result = store
            .update(
                PolicyUpdate {
                    refund_percentage: Some(101),
                    ..Default::default()
                },
                "admin-7",
            )
            .await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
        assert_eq!(store.get_active().await.unwrap().version, 1);
    }
}
