//! Timing of deletion warnings and removals, checked against tokio's paused clock.

use async_trait::async_trait;
use media_extractor_bot::scheduler::{
    ChatActions, DeletionScheduler, RetentionPolicy, ScheduledDeletion,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teloxide::types::{ChatId, MessageId};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Warned {
        chat: ChatId,
        file_name: String,
        remaining: Duration,
    },
    Deleted {
        chat: ChatId,
        message: MessageId,
    },
}

/// Records every action with the paused clock's time
struct RecordingActions {
    start: Instant,
    events: Mutex<Vec<(Duration, Event)>>,
    fail_deletes: bool,
}

impl RecordingActions {
    fn new(fail_deletes: bool) -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            events: Mutex::new(Vec::new()),
            fail_deletes,
        })
    }

    fn record(&self, event: Event) {
        let at = self.start.elapsed();
        match self.events.lock() {
            Ok(mut events) => events.push((at, event)),
            Err(e) => panic!("poisoned: {e}"),
        }
    }

    fn events(&self) -> Vec<(Duration, Event)> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(e) => panic!("poisoned: {e}"),
        }
    }
}

#[async_trait]
impl ChatActions for RecordingActions {
    async fn send_deletion_warning(
        &self,
        chat_id: ChatId,
        file_name: &str,
        remaining: Duration,
    ) -> anyhow::Result<()> {
        self.record(Event::Warned {
            chat: chat_id,
            file_name: file_name.to_string(),
            remaining,
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()> {
        self.record(Event::Deleted {
            chat: chat_id,
            message: message_id,
        });
        if self.fail_deletes {
            anyhow::bail!("Bad Request: message to delete not found");
        }
        Ok(())
    }
}

const MINUTE: Duration = Duration::from_secs(60);

#[tokio::test(start_paused = true)]
async fn warning_at_55_minutes_and_deletion_at_60() {
    let actions = RecordingActions::new(false);
    let scheduler = DeletionScheduler::new(actions.clone(), RetentionPolicy::default());

    scheduler
        .schedule(ScheduledDeletion::now(ChatId(1), MessageId(10), "cat.jpg"))
        .await;
    assert_eq!(scheduler.pending_count().await, 1);

    tokio::time::sleep(54 * MINUTE).await;
    assert!(actions.events().is_empty());

    tokio::time::sleep(10 * MINUTE).await;
    assert_eq!(
        actions.events(),
        vec![
            (
                55 * MINUTE,
                Event::Warned {
                    chat: ChatId(1),
                    file_name: "cat.jpg".to_string(),
                    remaining: 5 * MINUTE,
                }
            ),
            (
                60 * MINUTE,
                Event::Deleted {
                    chat: ChatId(1),
                    message: MessageId(10),
                }
            ),
        ]
    );
    assert_eq!(scheduler.pending_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn each_delivery_has_its_own_timer() {
    let actions = RecordingActions::new(false);
    let scheduler = DeletionScheduler::new(actions.clone(), RetentionPolicy::default());

    scheduler
        .schedule(ScheduledDeletion::now(ChatId(1), MessageId(1), "a.jpg"))
        .await;
    tokio::time::sleep(10 * MINUTE).await;
    scheduler
        .schedule(ScheduledDeletion::now(ChatId(2), MessageId(2), "b.mp4"))
        .await;
    assert_eq!(scheduler.pending_count().await, 2);

    tokio::time::sleep(2 * 60 * MINUTE).await;

    let times: Vec<Duration> = actions.events().into_iter().map(|(at, _)| at).collect();
    assert_eq!(
        times,
        vec![55 * MINUTE, 60 * MINUTE, 65 * MINUTE, 70 * MINUTE]
    );
    assert_eq!(scheduler.pending_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_deletion_is_not_retried() {
    let actions = RecordingActions::new(true);
    let scheduler = DeletionScheduler::new(actions.clone(), RetentionPolicy::default());

    scheduler
        .schedule(ScheduledDeletion::now(ChatId(3), MessageId(30), "gone.png"))
        .await;
    tokio::time::sleep(3 * 60 * MINUTE).await;

    let deletes = actions
        .events()
        .into_iter()
        .filter(|(_, e)| matches!(e, Event::Deleted { .. }))
        .count();
    assert_eq!(deletes, 1);
    assert_eq!(scheduler.pending_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn warning_is_skipped_when_lead_exceeds_retention() {
    let actions = RecordingActions::new(false);
    let policy = RetentionPolicy {
        retention: 2 * MINUTE,
        warning_lead: 5 * MINUTE,
    };
    let scheduler = DeletionScheduler::new(actions.clone(), policy);

    scheduler
        .schedule(ScheduledDeletion::now(ChatId(4), MessageId(40), "short.gif"))
        .await;
    tokio::time::sleep(10 * MINUTE).await;

    assert_eq!(
        actions.events(),
        vec![(
            2 * MINUTE,
            Event::Deleted {
                chat: ChatId(4),
                message: MessageId(40),
            }
        )]
    );
}
