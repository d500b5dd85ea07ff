//! Fans one notification out to every recipient of a webhook.
//!
//! Each resolved recipient gets its own task and its own child
//! cancellation token. Individual failures are logged and collected, they
//! never cancel siblings or fail the broadcast as a whole.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use hookrelay_core::config::Recipient;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::traits::{Notification, Notifier};

/// Outcome of one delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub recipient: String,
    pub notifier: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Name-keyed set of notifier instances, shared read-only across requests.
#[derive(Clone, Default)]
pub struct Broadcaster {
    notifiers: HashMap<String, Arc<dyn Notifier>>,
}

impl Broadcaster {
    /// Create an empty broadcaster.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, notifier: Arc<dyn Notifier>) {
        self.notifiers.insert(name.into(), notifier);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.notifiers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver `notification` to every recipient concurrently and wait for
    /// all attempts to finish.
    ///
    /// Recipients bound to an unknown notifier are logged and skipped, so the
    /// returned vector only covers attempted deliveries (in completion order).
    pub async fn broadcast(
        &self,
        cancel: &CancellationToken,
        recipients: &[Recipient],
        notification: Arc<Notification>,
    ) -> Vec<DeliveryResult> {
        if recipients.is_empty() {
            tracing::debug!("No recipients configured");
            return Vec::new();
        }

        let mut tasks = JoinSet::new();
        let mut spawned: HashMap<tokio::task::Id, (String, String)> = HashMap::new();

        for recipient in recipients {
            let Some(notifier) = self.notifiers.get(&recipient.notifier) else {
                tracing::error!(
                    recipient = %recipient.name,
                    notifier = %recipient.notifier,
                    "Notifier not found, skipping recipient"
                );
                continue;
            };

            let notifier = Arc::clone(notifier);
            let notification = Arc::clone(&notification);
            let token = cancel.child_token();
            let recipient = recipient.clone();
            let identity = (recipient.name.clone(), recipient.notifier.clone());

            let handle = tasks.spawn(async move {
                let start = Instant::now();
                let result = notifier
                    .send(&token, &recipient.target, &notification)
                    .await;
                let duration_ms = start.elapsed().as_millis() as u64;

                let (success, error) = match result {
                    Ok(()) => {
                        tracing::info!(
                            recipient = %recipient.name,
                            notifier = %recipient.notifier,
                            channel = notifier.channel_name(),
                            duration_ms,
                            "Notification delivered"
                        );
                        (true, None)
                    }
                    Err(e) => {
                        tracing::error!(
                            recipient = %recipient.name,
                            notifier = %recipient.notifier,
                            channel = notifier.channel_name(),
                            error = %e,
                            duration_ms,
                            "Notification delivery failed"
                        );
                        (false, Some(e.to_string()))
                    }
                };

                DeliveryResult {
                    recipient: recipient.name,
                    notifier: recipient.notifier,
                    success,
                    error,
                    duration_ms,
                }
            });
            spawned.insert(handle.id(), identity);
        }

        let mut results = Vec::with_capacity(spawned.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                Err(e) => {
                    let (recipient, notifier) = spawned.remove(&e.id()).unwrap_or_default();
                    tracing::error!(
                        recipient = %recipient,
                        notifier = %notifier,
                        error = %e,
                        "Delivery task panicked"
                    );
                    results.push(DeliveryResult {
                        recipient,
                        notifier,
                        success: false,
                        error: Some(e.to_string()),
                        duration_ms: 0,
                    });
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::traits::NotifyError;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Panic,
        WaitForCancel,
    }

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        behavior: Behavior,
    }

    impl MockNotifier {
        fn shared(name: &str, count: &Arc<AtomicUsize>, behavior: Behavior) -> Arc<dyn Notifier> {
            Arc::new(Self {
                name: name.to_string(),
                send_count: count.clone(),
                behavior,
            })
        }
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(
            &self,
            cancel: &CancellationToken,
            _target: &str,
            _notification: &Notification,
        ) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(NotifyError::Config("mock failure".to_string())),
                Behavior::Panic => panic!("mock panic"),
                Behavior::WaitForCancel => {
                    cancel.cancelled().await;
                    Err(NotifyError::Cancelled)
                }
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn recipient(name: &str, notifier: &str) -> Recipient {
        Recipient {
            name: name.to_string(),
            target: format!("{name}-target"),
            notifier: notifier.to_string(),
        }
    }

    fn notification() -> Arc<Notification> {
        Arc::new(Notification::body("test body"))
    }

    #[tokio::test]
    async fn broadcast_to_all_recipients() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut broadcaster = Broadcaster::empty();
        broadcaster.insert("tg", MockNotifier::shared("telegram", &count, Behavior::Succeed));

        let recipients = vec![recipient("a", "tg"), recipient("b", "tg"), recipient("c", "tg")];
        let results = broadcaster
            .broadcast(&CancellationToken::new(), &recipients, notification())
            .await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let failed = Arc::new(AtomicUsize::new(0));
        let ok = Arc::new(AtomicUsize::new(0));
        let mut broadcaster = Broadcaster::empty();
        broadcaster.insert("bad", MockNotifier::shared("bad", &failed, Behavior::Fail));
        broadcaster.insert("good", MockNotifier::shared("good", &ok, Behavior::Succeed));

        let recipients = vec![recipient("x", "bad"), recipient("y", "good")];
        let results = broadcaster
            .broadcast(&CancellationToken::new(), &recipients, notification())
            .await;

        assert_eq!(results.len(), 2);
        let x = results.iter().find(|r| r.recipient == "x").unwrap();
        let y = results.iter().find(|r| r.recipient == "y").unwrap();
        assert!(!x.success);
        assert!(x.error.as_deref().unwrap_or_default().contains("mock failure"));
        assert!(y.success);
        assert_eq!(failed.load(Ordering::SeqCst), 1);
        assert_eq!(ok.load(Ordering::SeqCst), 1); // second recipient still sent
    }

    #[tokio::test]
    async fn unknown_notifier_skips_only_that_recipient() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut broadcaster = Broadcaster::empty();
        broadcaster.insert("tg", MockNotifier::shared("telegram", &count, Behavior::Succeed));

        let recipients = vec![recipient("a", "missing"), recipient("b", "tg")];
        let results = broadcaster
            .broadcast(&CancellationToken::new(), &recipients, notification())
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].recipient, "b");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_notifier_is_contained() {
        let panicked = Arc::new(AtomicUsize::new(0));
        let ok = Arc::new(AtomicUsize::new(0));
        let mut broadcaster = Broadcaster::empty();
        broadcaster.insert("boom", MockNotifier::shared("boom", &panicked, Behavior::Panic));
        broadcaster.insert("good", MockNotifier::shared("good", &ok, Behavior::Succeed));

        let recipients = vec![recipient("p", "boom"), recipient("q", "good")];
        let results = broadcaster
            .broadcast(&CancellationToken::new(), &recipients, notification())
            .await;

        assert_eq!(results.len(), 2);
        let p = results.iter().find(|r| r.recipient == "p").unwrap();
        assert!(!p.success);
        assert_eq!(p.notifier, "boom");
        assert_eq!(ok.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parent_cancellation_reaches_every_delivery() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut broadcaster = Broadcaster::empty();
        broadcaster.insert(
            "slow",
            MockNotifier::shared("slow", &count, Behavior::WaitForCancel),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let recipients = vec![recipient("a", "slow"), recipient("b", "slow")];
        let results = tokio::time::timeout(
            Duration::from_secs(5),
            broadcaster.broadcast(&cancel, &recipients, notification()),
        )
        .await
        .expect("broadcast should finish after cancellation");

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn no_recipients_returns_empty() {
        let broadcaster = Broadcaster::empty();
        let results = broadcaster
            .broadcast(&CancellationToken::new(), &[], notification())
            .await;
        assert!(results.is_empty());
        assert!(broadcaster.is_empty());
    }
}
