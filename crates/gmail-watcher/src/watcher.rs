//! The poll loop.
//!
//! Each iteration lists unread inbox messages, skips ids already seen during
//! this run, fetches sender and subject for the rest, and raises a
//! notification when the sender is on the allow-list.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{AllowList, WatcherConfig};
use crate::notifier::Notifier;

/// Sender and subject of one message, fetched once and discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMetadata {
    pub id: String,
    /// Raw `From` header, display name included
    pub from: String,
    pub subject: String,
}

/// Remote mailbox operations the loop depends on
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Ids of unread inbox messages (first page only)
    async fn list_unread(&self) -> Result<Vec<String>>;

    /// From/Subject metadata for one message
    async fn message_metadata(&self, message_id: &str) -> Result<MessageMetadata>;
}

/// Message ids evaluated during this process lifetime. Only grows.
#[derive(Debug, Default)]
pub struct SeenSet {
    ids: HashSet<String>,
}

impl SeenSet {
    /// Record an id; returns `false` if it was already present
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_string())
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Bare, lower-cased address from a `From` header.
///
/// Handles `Name <addr>`, `"Last, First" <addr>`, `addr (comment)` and a plain
/// `addr`.
pub fn extract_address(from: &str) -> String {
    let from = from.trim();

    if let Some(bracket_start) = from.rfind('<') {
        if let Some(bracket_end) = from.rfind('>') {
            if bracket_end > bracket_start {
                return from[bracket_start + 1..bracket_end].trim().to_lowercase();
            }
        }
    }

    let bare = match from.find('(') {
        Some(comment_start) => &from[..comment_start],
        None => from,
    };

    bare.trim().trim_matches('"').trim().to_lowercase()
}

/// Timing knobs for the loop
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub poll_interval: Duration,
    pub notify_duration_secs: u32,
    pub match_pause: Duration,
}

impl From<&WatcherConfig> for PollSettings {
    fn from(config: &WatcherConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            notify_duration_secs: config.notify_duration_secs,
            match_pause: config.match_pause,
        }
    }
}

/// Owns all state the loop touches
pub struct Watcher<S> {
    source: S,
    notifier: Arc<dyn Notifier>,
    allow_list: AllowList,
    settings: PollSettings,
    seen: SeenSet,
}

impl<S: MailSource> Watcher<S> {
    pub fn new(
        source: S,
        notifier: Arc<dyn Notifier>,
        allow_list: AllowList,
        settings: PollSettings,
    ) -> Self {
        Self {
            source,
            notifier,
            allow_list,
            settings,
            seen: SeenSet::default(),
        }
    }

    #[cfg(test)]
    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Run one iteration; returns the number of notifications raised
    pub async fn poll_once(&mut self) -> Result<usize> {
        let message_ids = self.source.list_unread().await?;
        tracing::info!("Found {} unread messages.", message_ids.len());

        let mut notified = 0;

        for message_id in message_ids {
            // Mark before fetching so a failure below is not retried next time
            if !self.seen.insert(&message_id) {
                continue;
            }

            let metadata = self.source.message_metadata(&message_id).await?;
            tracing::debug!("Fetched metadata for message {}", metadata.id);
            let sender = extract_address(&metadata.from);
            tracing::info!("From: {}, Subject: {}", sender, metadata.subject);

            if !self.allow_list.matches(&sender) {
                continue;
            }

            tracing::info!("Match found for: {}", sender);

            let title = format!("📬 New Mail from {}", sender);
            let body = if metadata.subject.is_empty() {
                "(No Subject)"
            } else {
                metadata.subject.as_str()
            };
            self.notifier
                .notify(&title, body, self.settings.notify_duration_secs);
            notified += 1;

            tokio::time::sleep(self.settings.match_pause).await;
        }

        Ok(notified)
    }

    /// Poll until `shutdown` resolves.
    ///
    /// Iteration errors are logged and the loop carries on after the normal
    /// interval. Shutdown is only observed between iterations.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            "Watching inbox every {:?} for {} senders",
            self.settings.poll_interval,
            self.allow_list.len()
        );

        tokio::pin!(shutdown);

        loop {
            if let Err(e) = self.poll_once().await {
                tracing::error!("Inbox check failed: {:#}", e);
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        tracing::info!("Watcher stopped after seeing {} messages.", self.seen.len());
    }
}
