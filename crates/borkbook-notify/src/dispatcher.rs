use crate::provider::PushProvider;
use crate::registry::DeviceRegistry;
use borkbook_core::{CoreError, DeviceHandle, DispatchReport, PushMessage};
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Fans one notification out to every registered handle except the sender.
pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
    provider: Arc<dyn PushProvider>,
}

impl Dispatcher {
    pub fn new(registry: Arc<DeviceRegistry>, provider: Arc<dyn PushProvider>) -> Self {
        Self { registry, provider }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Each recipient gets its own provider call; one failure never stops the
    /// others. Recipients the provider reports as permanently invalid are
    /// pruned from the registry. No retries.
    pub async fn dispatch(&self, body: &str, sender: &str) -> Result<DispatchReport, CoreError> {
        let recipients = self.registry.all_except(sender).await;
        if recipients.is_empty() {
            return Err(CoreError::NoRecipients);
        }

        let sends = recipients.into_iter().map(move |recipient| async move {
            let message = PushMessage::for_recipient(recipient.clone(), body);
            let result = self.provider.send(&message).await;
            (recipient, result)
        });
        let results = join_all(sends).await;

        let mut report = DispatchReport::default();
        let mut pruned: Vec<DeviceHandle> = Vec::new();
        for (recipient, result) in results {
            match result {
                Ok(()) => report.success_count += 1,
                Err(err) => {
                    report.failure_count += 1;
                    warn!(
                        event = "dispatch_send_failed",
                        provider = self.provider.id(),
                        recipient = %recipient,
                        error = %err
                    );
                    if err.is_invalid_recipient() {
                        pruned.push(recipient);
                    }
                }
            }
        }
        for recipient in &pruned {
            self.registry.prune(recipient).await;
        }

        info!(
            event = "dispatch_complete",
            provider = self.provider.id(),
            success = report.success_count,
            failure = report.failure_count,
            pruned = pruned.len()
        );
        Ok(report)
    }
}
