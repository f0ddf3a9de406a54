//! Owner notifications for status changes.
//!
//! Delivery runs on its own task after the change is committed. A slow or
//! failing relay is retried a bounded number of times and then dropped with
//! a warning; it never reaches the request that caused it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use jiseti_types::events::StatusChanged;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail transport.
pub trait Mailer: Send + Sync + 'static {
    fn send<'a>(&'a self, email: &'a Email) -> BoxFuture<'a, Result<()>>;
}

/// Writes mail to the log instead of sending it. Used when no relay is set.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send<'a>(&'a self, email: &'a Email) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!(to = %email.to, subject = %email.subject, "Mail (not sent, no relay configured)");
            Ok(())
        })
    }
}

/// Posts each message as JSON to an HTTP mail relay.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            from: from.into(),
        }
    }
}

impl Mailer for HttpMailer {
    fn send<'a>(&'a self, email: &'a Email) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut request = self.client.post(&self.endpoint).json(&RelayMessage {
                from: &self.from,
                to: &email.to,
                subject: &email.subject,
                text: &email.body,
            });
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            request
                .send()
                .await
                .context("mail relay unreachable")?
                .error_for_status()
                .context("mail relay rejected message")?;
            Ok(())
        })
    }
}

#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    mailer: Box<dyn Mailer>,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
}

impl Notifier {
    pub fn new(mailer: impl Mailer, timeout: Duration, retries: u32) -> Self {
        Self::with_backoff(mailer, timeout, retries, Duration::from_millis(500))
    }

    pub fn with_backoff(
        mailer: impl Mailer,
        timeout: Duration,
        retries: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                mailer: Box::new(mailer),
                timeout,
                retries,
                backoff,
            }),
        }
    }

    pub fn log_only() -> Self {
        Self::new(LogMailer, Duration::from_secs(10), 0)
    }

    /// Queue the owner notification for a committed status change. Returns
    /// the delivery task, or `None` when there is nobody to tell.
    pub fn status_changed(&self, event: StatusChanged) -> Option<JoinHandle<bool>> {
        let Some(recipient) = event.recipient.as_ref() else {
            debug!(record_id = %event.record_id, "Anonymous record, no status notification");
            return None;
        };

        let email = Email {
            to: recipient.email.clone(),
            subject: event.subject().to_string(),
            body: event.body(&recipient.name),
        };
        Some(self.dispatch(email))
    }

    fn dispatch(&self, email: Email) -> JoinHandle<bool> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let attempts = inner.retries + 1;
            for attempt in 1..=attempts {
                match tokio::time::timeout(inner.timeout, inner.mailer.send(&email)).await {
                    Ok(Ok(())) => {
                        info!(to = %email.to, "Status notification sent");
                        return true;
                    }
                    Ok(Err(e)) => {
                        warn!(to = %email.to, attempt, "Notification attempt failed: {:#}", e);
                    }
                    Err(_) => {
                        warn!(to = %email.to, attempt, "Notification attempt timed out");
                    }
                }
                if attempt < attempts {
                    tokio::time::sleep(inner.backoff).await;
                }
            }
            warn!(to = %email.to, "Dropping status notification after {} attempts", attempts);
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use jiseti_types::events::Recipient;
    use jiseti_types::models::RecordStatus;
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<Email>>>);

    impl Mailer for Recording {
        fn send<'a>(&'a self, email: &'a Email) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.0.lock().unwrap().push(email.clone());
                Ok(())
            })
        }
    }

    #[derive(Clone, Default)]
    struct Failing(Arc<AtomicU32>);

    impl Mailer for Failing {
        fn send<'a>(&'a self, _email: &'a Email) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("relay down"))
            })
        }
    }

    fn event(recipient: Option<Recipient>) -> StatusChanged {
        StatusChanged {
            record_id: Uuid::new_v4(),
            title: "Road tender".into(),
            from: RecordStatus::Draft,
            to: RecordStatus::UnderInvestigation,
            reason: Some("Starting investigation".into()),
            recipient,
        }
    }

    fn jane() -> Option<Recipient> {
        Some(Recipient {
            name: "Jane".into(),
            email: "jane@gmail.com".into(),
        })
    }

    #[tokio::test]
    async fn delivers_to_owner() {
        let mailer = Recording::default();
        let notifier = Notifier::new(mailer.clone(), Duration::from_secs(1), 0);

        let delivered = notifier.status_changed(event(jane())).unwrap().await.unwrap();
        assert!(delivered);

        let sent = mailer.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jane@gmail.com");
        assert_eq!(sent[0].subject, "Update on Your Record Status");
        assert!(sent[0].body.contains("Starting investigation"));
    }

    #[tokio::test]
    async fn anonymous_records_are_skipped() {
        let mailer = Recording::default();
        let notifier = Notifier::new(mailer.clone(), Duration::from_secs(1), 0);
        assert!(notifier.status_changed(event(None)).is_none());
        assert!(mailer.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_are_retried_then_dropped() {
        let mailer = Failing::default();
        let notifier = Notifier::with_backoff(
            mailer.clone(),
            Duration::from_secs(1),
            2,
            Duration::from_millis(1),
        );

        let delivered = notifier.status_changed(event(jane())).unwrap().await.unwrap();
        assert!(!delivered);
        assert_eq!(mailer.0.load(Ordering::SeqCst), 3);
    }
}
