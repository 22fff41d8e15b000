use borkbook_core::{CoreError, DeviceHandle};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::info;

/// In-memory set of recipient handles. Not persisted; starts empty.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    handles: RwLock<HashSet<DeviceHandle>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `raw` if absent. Returns whether the handle was new.
    pub async fn register(&self, raw: &str) -> Result<bool, CoreError> {
        let handle = DeviceHandle::parse(raw)?;
        let inserted = self.handles.write().await.insert(handle.clone());
        if inserted {
            info!(event = "handle_registered", handle = %handle);
        }
        Ok(inserted)
    }

    pub async fn prune(&self, handle: &DeviceHandle) -> bool {
        let removed = self.handles.write().await.remove(handle);
        if removed {
            info!(event = "handle_pruned", handle = %handle);
        }
        removed
    }

    pub async fn all_except(&self, sender: &str) -> Vec<DeviceHandle> {
        let mut recipients: Vec<_> = self
            .handles
            .read()
            .await
            .iter()
            .filter(|handle| handle.as_str() != sender)
            .cloned()
            .collect();
        recipients.sort();
        recipients
    }

    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }

    pub async fn contains(&self, raw: &str) -> bool {
        match DeviceHandle::parse(raw) {
            Ok(handle) => self.handles.read().await.contains(&handle),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_is_idempotent() {
        let registry = DeviceRegistry::new();
        assert!(registry.register("tok-a").await.expect("first"));
        assert!(!registry.register("tok-a").await.expect("second"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn handles_compare_by_exact_value() {
        let registry = DeviceRegistry::new();
        registry.register("tok-a").await.expect("plain");
        assert!(registry.register(" tok-a ").await.expect("padded is distinct"));
        assert_eq!(registry.len().await, 2);
        assert!(registry.contains(" tok-a ").await);

        let recipients: Vec<_> = registry
            .all_except(" tok-a ")
            .await
            .into_iter()
            .map(|handle| handle.to_string())
            .collect();
        assert_eq!(recipients, vec!["tok-a"]);
    }

    #[tokio::test]
    async fn register_rejects_empty_handle() {
        let registry = DeviceRegistry::new();
        assert_eq!(registry.register("").await, Err(CoreError::InvalidHandle));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn prune_is_idempotent() {
        let registry = DeviceRegistry::new();
        registry.register("tok-a").await.expect("register");
        let handle = DeviceHandle::parse("tok-a").expect("handle");
        assert!(registry.prune(&handle).await);
        assert!(!registry.prune(&handle).await);
        assert!(!registry.contains("tok-a").await);
    }

    #[tokio::test]
    async fn all_except_skips_sender_even_if_unregistered() {
        let registry = DeviceRegistry::new();
        for handle in ["tok-a", "tok-b", "tok-c"] {
            registry.register(handle).await.expect("register");
        }

        let recipients: Vec<_> = registry
            .all_except("tok-b")
            .await
            .into_iter()
            .map(|handle| handle.to_string())
            .collect();
        assert_eq!(recipients, vec!["tok-a", "tok-c"]);
        assert_eq!(registry.all_except("stranger").await.len(), 3);
    }
}
