//! Gmail API source.
//!
//! Authenticates with a stored refresh token, lists unread support mail with
//! a provider query, and fetches each message in `full` format. The part
//! tree is handed to the normalizer as-is; the client library has already
//! undone the base64url body encoding.
//!
//! The configured timeout bounds each API call. A connect or list timeout
//! fails the fetch; a message that times out is skipped and the rest of the
//! batch is still returned.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use google_gmail1::api::{Message, MessagePart};
use google_gmail1::hyper_rustls::HttpsConnector;
use google_gmail1::Gmail;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::future::Future;
use std::time::Duration;

use super::source::{gmail_search_query, ApiMessage, ApiPart, MessageSource, ProviderMessage};
use crate::config::GmailConfig;

type GmailHub = Gmail<HttpsConnector<HttpConnector>>;

/// Largest page the list endpoint accepts
const MAX_PAGE_SIZE: usize = 500;

pub struct GmailSource {
    config: GmailConfig,
}

impl GmailSource {
    pub fn new(config: GmailConfig) -> Self {
        Self { config }
    }

    /// Exchange the refresh token and build the API hub
    async fn connect(&self) -> Result<GmailHub> {
        if self.config.refresh_token.is_empty() {
            return Err(anyhow!("GMAIL_REFRESH_TOKEN is not set"));
        }

        // Use the yup_oauth2 re-exported by google_gmail1 to avoid version mismatch
        let secret = google_gmail1::yup_oauth2::authorized_user::AuthorizedUserSecret {
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            refresh_token: self.config.refresh_token.clone(),
            key_type: "authorized_user".to_string(),
        };

        let auth = google_gmail1::yup_oauth2::AuthorizedUserAuthenticator::builder(secret)
            .build()
            .await
            .context("Failed to build authenticator from refresh token")?;

        let connector = google_gmail1::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native TLS roots")?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Gmail::new(client, auth))
    }

}

#[async_trait]
impl MessageSource for GmailSource {
    fn name(&self) -> &'static str {
        "gmail"
    }

    async fn fetch_new(&self) -> Result<Vec<ProviderMessage>> {
        let timeout = self.config.timeout;
        let hub = within(timeout, "Gmail authentication", self.connect()).await?;
        let query = gmail_search_query(&self.config.keywords);
        let ids = within(
            timeout,
            "Gmail message listing",
            list_message_ids(&hub, &query, self.config.max_results),
        )
        .await?;

        let hub = &hub;
        let messages = fetch_each(ids, timeout, |id| async move {
            get_message(hub, &id).await
        })
        .await;
        Ok(messages.into_iter().map(ProviderMessage::Api).collect())
    }
}

async fn within<T>(
    timeout: Duration,
    what: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| anyhow!("{} timed out after {:?}", what, timeout))?
}

/// Fetch every id with its own timeout, keeping whatever succeeds
async fn fetch_each<F, Fut>(ids: Vec<String>, timeout: Duration, fetch: F) -> Vec<ApiMessage>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<ApiMessage>>,
{
    let mut messages = Vec::with_capacity(ids.len());
    for id in ids {
        match within(timeout, "Message fetch", fetch(id.clone())).await {
            Ok(message) => messages.push(message),
            Err(e) => tracing::warn!("Skipping message {}: {:#}", id, e),
        }
    }
    messages
}

/// Page through the list endpoint until `max` ids are collected
async fn list_message_ids(hub: &GmailHub, query: &str, max: usize) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut page_token: Option<String> = None;

    while ids.len() < max {
        let page_size = (max - ids.len()).min(MAX_PAGE_SIZE) as u32;
        let mut call = hub
            .users()
            .messages_list("me")
            .q(query)
            .max_results(page_size);
        if let Some(token) = &page_token {
            call = call.page_token(token);
        }

        let (_, page) = call.doit().await.context("Failed to list messages")?;

        ids.extend(
            page.messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| m.id),
        );

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    ids.truncate(max);
    Ok(ids)
}

async fn get_message(hub: &GmailHub, message_id: &str) -> Result<ApiMessage> {
    let (_, message) = hub
        .users()
        .messages_get("me", message_id)
        .format("full")
        .doit()
        .await
        .context("Failed to get message")?;

    Ok(to_api_message(message, message_id))
}

fn to_api_message(message: Message, requested_id: &str) -> ApiMessage {
    ApiMessage {
        id: message.id.unwrap_or_else(|| requested_id.to_string()),
        internal_date_ms: message.internal_date,
        payload: message.payload.map(to_api_part),
    }
}

fn to_api_part(part: MessagePart) -> ApiPart {
    ApiPart {
        mime_type: part.mime_type.unwrap_or_default(),
        filename: part.filename.filter(|f| !f.is_empty()),
        headers: part
            .headers
            .unwrap_or_default()
            .into_iter()
            .filter_map(|h| Some((h.name?, h.value.unwrap_or_default())))
            .collect(),
        data: part.body.and_then(|b| b.data),
        parts: part
            .parts
            .unwrap_or_default()
            .into_iter()
            .map(to_api_part)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_gmail1::api::{MessagePartBody, MessagePartHeader};

    fn header(name: &str, value: &str) -> MessagePartHeader {
        MessagePartHeader {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn test_part_tree_conversion_keeps_structure() {
        let message = Message {
            id: Some("18c2f".to_string()),
            internal_date: Some(1_709_630_000_000),
            payload: Some(MessagePart {
                mime_type: Some("multipart/alternative".to_string()),
                headers: Some(vec![header("Subject", "Need help"), header("From", "a@b.com")]),
                parts: Some(vec![
                    MessagePart {
                        mime_type: Some("text/plain".to_string()),
                        filename: Some(String::new()),
                        body: Some(MessagePartBody {
                            data: Some(b"plain body".to_vec()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    MessagePart {
                        mime_type: Some("text/html".to_string()),
                        body: Some(MessagePartBody {
                            data: Some(b"<p>html body</p>".to_vec()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let api = to_api_message(message, "ignored");
        assert_eq!(api.id, "18c2f");
        assert_eq!(api.internal_date_ms, Some(1_709_630_000_000));

        let payload = api.payload.unwrap();
        assert_eq!(payload.header("subject"), Some("Need help"));
        assert_eq!(payload.parts.len(), 2);
        assert_eq!(payload.parts[0].filename, None);
        assert_eq!(payload.parts[0].data.as_deref(), Some(&b"plain body"[..]));
        assert_eq!(payload.parts[1].mime_type, "text/html");
    }

    #[test]
    fn test_missing_id_falls_back_to_requested_id() {
        let api = to_api_message(Message::default(), "requested-1");
        assert_eq!(api.id, "requested-1");
        assert!(api.payload.is_none());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_before_network() {
        let source = GmailSource::new(GmailConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: String::new(),
            keywords: vec!["support".to_string()],
            max_results: 5,
            timeout: std::time::Duration::from_secs(5),
        });
        let err = source.fetch_new().await.unwrap_err();
        assert!(err.to_string().contains("GMAIL_REFRESH_TOKEN"));
    }

    #[tokio::test]
    async fn test_slow_message_is_skipped_and_the_rest_kept() {
        let ids = vec!["fast-1".to_string(), "stuck".to_string(), "fast-2".to_string()];
        let messages = fetch_each(ids, Duration::from_millis(50), |id| async move {
            if id == "stuck" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if id == "fast-2" {
                return Err(anyhow!("404"));
            }
            Ok(to_api_message(Message::default(), &id))
        })
        .await;

        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["fast-1"]);
    }

    #[tokio::test]
    async fn test_call_timeout_names_the_step() {
        let err = within(Duration::from_millis(10), "Gmail message listing", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Gmail message listing timed out"));
    }
}
