//! Gmail API client for listing unread inbox messages.

use anyhow::{Context, Result};
use async_trait::async_trait;
use google_gmail1::api::{Message, Scope};
use google_gmail1::common::GetToken;
use google_gmail1::hyper_rustls::HttpsConnector;
use google_gmail1::Gmail;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::AuthError;
use crate::watcher::{MailSource, MessageMetadata};

/// Client for interacting with Gmail API
pub struct GmailClient {
    hub: Gmail<HttpsConnector<HttpConnector>>,
}

impl GmailClient {
    /// Create a client that asks `auth` for a token on every request
    pub fn new<A>(auth: A) -> Result<Self, AuthError>
    where
        A: GetToken + 'static,
    {
        let connector = google_gmail1::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| AuthError::Client(format!("native TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);
        let hub = Gmail::new(client, auth);

        Ok(Self { hub })
    }

    fn parse_metadata(id: &str, message: Message) -> MessageMetadata {
        let mut from = String::new();
        let mut subject = String::new();

        if let Some(headers) = message.payload.and_then(|p| p.headers) {
            for header in headers {
                match header.name.as_deref() {
                    Some("From") => from = header.value.unwrap_or_default(),
                    Some("Subject") => subject = header.value.unwrap_or_default(),
                    _ => {}
                }
            }
        }

        MessageMetadata {
            id: message.id.unwrap_or_else(|| id.to_string()),
            from,
            subject,
        }
    }
}

#[async_trait]
impl MailSource for GmailClient {
    /// First page of unread INBOX message ids; no pagination
    async fn list_unread(&self) -> Result<Vec<String>> {
        let (_, list_response) = self
            .hub
            .users()
            .messages_list("me")
            .add_label_ids("INBOX")
            .q("is:unread")
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .context("Failed to list unread messages")?;

        Ok(list_response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect())
    }

    async fn message_metadata(&self, message_id: &str) -> Result<MessageMetadata> {
        let (_, message) = self
            .hub
            .users()
            .messages_get("me", message_id)
            .format("metadata")
            .add_metadata_headers("From")
            .add_metadata_headers("Subject")
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .with_context(|| format!("Failed to get message {}", message_id))?;

        Ok(Self::parse_metadata(message_id, message))
    }
}
