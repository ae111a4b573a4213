//! Timed removal of delivered media.
//!
//! Every delivered message gets its own timer task: a warning is posted
//! `warning_lead` before the retention window ends, then the message is
//! deleted. Nothing is persisted, a restart forgets pending deletions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long delivered media stays in the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Time from delivery to deletion
    pub retention: Duration,
    /// How long before deletion the warning is posted
    pub warning_lead: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(crate::config::AUTO_DELETE_AFTER_SECS),
            warning_lead: Duration::from_secs(crate::config::DELETION_WARNING_SECS),
        }
    }
}

impl RetentionPolicy {
    /// Delay from delivery to the warning, `None` when the lead does not fit
    /// inside the retention window
    #[must_use]
    pub fn warning_delay(&self) -> Option<Duration> {
        if self.warning_lead.is_zero() || self.warning_lead >= self.retention {
            return None;
        }
        Some(self.retention - self.warning_lead)
    }

    /// Retention expressed in whole hours, rounded up
    #[must_use]
    pub fn retention_hours(&self) -> u64 {
        self.retention.as_secs().div_ceil(3600).max(1)
    }
}

/// A delivered media message waiting for removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledDeletion {
    /// Chat the media was sent to
    pub chat_id: ChatId,
    /// The media message itself
    pub message_id: MessageId,
    /// Name shown in the warning
    pub file_name: String,
    /// Delivery time
    pub sent_at: DateTime<Utc>,
}

impl ScheduledDeletion {
    /// Record a message delivered just now
    #[must_use]
    pub fn now(chat_id: ChatId, message_id: MessageId, file_name: impl Into<String>) -> Self {
        Self {
            chat_id,
            message_id,
            file_name: file_name.into(),
            sent_at: Utc::now(),
        }
    }

    /// Wall-clock time of the warning under `policy`
    #[must_use]
    pub fn warn_at(&self, policy: &RetentionPolicy) -> Option<DateTime<Utc>> {
        let delay = chrono::Duration::from_std(policy.warning_delay()?).ok()?;
        Some(self.sent_at + delay)
    }

    /// Wall-clock time of the deletion under `policy`
    #[must_use]
    pub fn delete_at(&self, policy: &RetentionPolicy) -> DateTime<Utc> {
        chrono::Duration::from_std(policy.retention)
            .map_or(self.sent_at, |retention| self.sent_at + retention)
    }
}

/// Chat side effects the scheduler triggers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatActions: Send + Sync {
    /// Tell the chat that `file_name` disappears in `remaining`
    async fn send_deletion_warning(
        &self,
        chat_id: ChatId,
        file_name: &str,
        remaining: Duration,
    ) -> anyhow::Result<()>;

    /// Remove a message; a message that is already gone counts as success
    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()>;
}

type PendingKey = (ChatId, MessageId);

/// Owner of all pending deletion timers
pub struct DeletionScheduler {
    actions: Arc<dyn ChatActions>,
    policy: RetentionPolicy,
    pending: Arc<Mutex<HashMap<PendingKey, ScheduledDeletion>>>,
    cancel: CancellationToken,
}

impl DeletionScheduler {
    /// Create a scheduler that acts through `actions`
    #[must_use]
    pub fn new(actions: Arc<dyn ChatActions>, policy: RetentionPolicy) -> Self {
        Self {
            actions,
            policy,
            pending: Arc::new(Mutex::new(HashMap::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Active retention policy
    #[must_use]
    pub const fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Number of deletions not yet carried out
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Start the warning and deletion timers for a delivered message.
    ///
    /// Timers are measured from the moment of this call.
    pub async fn schedule(&self, record: ScheduledDeletion) {
        if self.cancel.is_cancelled() {
            warn!(chat_id = %record.chat_id, "Scheduler is shut down, deletion not scheduled");
            return;
        }

        let start = Instant::now();
        let warn_at = self.policy.warning_delay().map(|delay| start + delay);
        let delete_at = start + self.policy.retention;
        let lead = self.policy.warning_lead;
        let key = (record.chat_id, record.message_id);

        self.pending.lock().await.insert(key, record.clone());
        debug!(
            chat_id = %record.chat_id,
            message_id = record.message_id.0,
            delete_at = %record.delete_at(&self.policy),
            "Scheduled deletion"
        );

        let actions = Arc::clone(&self.actions);
        let pending = Arc::clone(&self.pending);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            if let Some(warn_at) = warn_at {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = sleep_until(warn_at) => {}
                }
                match actions
                    .send_deletion_warning(record.chat_id, &record.file_name, lead)
                    .await
                {
                    Ok(()) => info!(chat_id = %record.chat_id, "Sent deletion warning"),
                    Err(e) => {
                        warn!(chat_id = %record.chat_id, error = %e, "Failed to send deletion warning");
                    }
                }
            }

            tokio::select! {
                () = cancel.cancelled() => return,
                () = sleep_until(delete_at) => {}
            }
            match actions.delete_message(record.chat_id, record.message_id).await {
                Ok(()) => info!(
                    chat_id = %record.chat_id,
                    message_id = record.message_id.0,
                    "Auto-deleted message"
                ),
                Err(e) => warn!(
                    chat_id = %record.chat_id,
                    message_id = record.message_id.0,
                    error = %e,
                    "Failed to delete message"
                ),
            }
            pending.lock().await.remove(&key);
        });
    }

    /// Cancel every pending timer; returns how many deletions were dropped
    pub async fn shutdown(&self) -> usize {
        self.cancel.cancel();
        let mut pending = self.pending.lock().await;
        let dropped = pending.len();
        pending.clear();
        if dropped > 0 {
            info!(dropped, "Deletion scheduler stopped with pending deletions");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    const CHAT: ChatId = ChatId(42);
    const MSG: MessageId = MessageId(7);

    fn policy() -> RetentionPolicy {
        RetentionPolicy::default()
    }

    #[test]
    fn default_policy_warns_five_minutes_early() {
        let p = policy();
        assert_eq!(p.warning_delay(), Some(Duration::from_secs(55 * 60)));
        assert_eq!(p.retention_hours(), 1);
    }

    #[test]
    fn warning_is_skipped_when_lead_does_not_fit() {
        let p = RetentionPolicy {
            retention: Duration::from_secs(60),
            warning_lead: Duration::from_secs(60),
        };
        assert_eq!(p.warning_delay(), None);
    }

    #[test]
    fn record_trigger_times() {
        let record = ScheduledDeletion::now(CHAT, MSG, "a.jpg");
        let p = policy();
        assert_eq!(
            record.warn_at(&p),
            Some(record.sent_at + chrono::Duration::minutes(55))
        );
        assert_eq!(record.delete_at(&p), record.sent_at + chrono::Duration::minutes(60));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deletion_is_not_retried_and_record_is_dropped() {
        let mut actions = MockChatActions::new();
        actions
            .expect_send_deletion_warning()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("chat not found")));
        actions
            .expect_delete_message()
            .with(eq(CHAT), eq(MSG))
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("message can't be deleted")));

        let scheduler = DeletionScheduler::new(Arc::new(actions), policy());
        scheduler.schedule(ScheduledDeletion::now(CHAT, MSG, "a.jpg")).await;
        assert_eq!(scheduler.pending_count().await, 1);

        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert_eq!(scheduler.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_timers() {
        let mut actions = MockChatActions::new();
        actions.expect_send_deletion_warning().never();
        actions.expect_delete_message().never();

        let scheduler = DeletionScheduler::new(Arc::new(actions), policy());
        scheduler.schedule(ScheduledDeletion::now(CHAT, MSG, "a.jpg")).await;
        assert_eq!(scheduler.shutdown().await, 1);

        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert_eq!(scheduler.pending_count().await, 0);

        scheduler.schedule(ScheduledDeletion::now(CHAT, MSG, "b.jpg")).await;
        assert_eq!(scheduler.pending_count().await, 0);
    }
}
