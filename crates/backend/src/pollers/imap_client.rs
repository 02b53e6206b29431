//! IMAP mailbox source.
//!
//! One short session per fetch: connect, login, search unseen support mail,
//! fetch full bodies with BODY.PEEK so the \Seen flag is untouched, logout.
//! The whole session runs under the configured timeout; when it fires the
//! session future is dropped, which closes the socket.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::fmt::Debug;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::source::{imap_search_query, MailboxMessage, MessageSource, ProviderMessage};
use crate::config::ImapConfig;

const LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ImapSource {
    config: ImapConfig,
}

impl ImapSource {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    async fn connect_and_fetch(&self) -> Result<Vec<ProviderMessage>> {
        let config = &self.config;
        let tcp = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))?;

        if config.use_tls {
            let tls = async_native_tls::TlsConnector::new();
            let stream = tls
                .connect(config.host.as_str(), tcp)
                .await
                .context("TLS handshake failed")?;
            run_session(async_imap::Client::new(stream), config).await
        } else {
            run_session(async_imap::Client::new(tcp), config).await
        }
    }
}

#[async_trait]
impl MessageSource for ImapSource {
    fn name(&self) -> &'static str {
        "imap"
    }

    async fn fetch_new(&self) -> Result<Vec<ProviderMessage>> {
        let timeout = self.config.timeout;
        tokio::time::timeout(timeout, self.connect_and_fetch())
            .await
            .map_err(|_| anyhow!("IMAP session timed out after {:?}", timeout))?
    }
}

async fn run_session<T>(
    client: async_imap::Client<T>,
    config: &ImapConfig,
) -> Result<Vec<ProviderMessage>>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug + Send,
{
    let mut session = client
        .login(&config.user, &config.password)
        .await
        .map_err(|e| anyhow!("IMAP login failed: {}", e.0))?;

    let result = fetch_unseen(&mut session, config).await;

    // Logout on success and on failure alike
    match tokio::time::timeout(LOGOUT_TIMEOUT, session.logout()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("IMAP logout failed: {}", e),
        Err(_) => tracing::warn!("IMAP logout timed out, dropping connection"),
    }

    result
}

async fn fetch_unseen<T>(
    session: &mut async_imap::Session<T>,
    config: &ImapConfig,
) -> Result<Vec<ProviderMessage>>
where
    T: AsyncRead + AsyncWrite + Unpin + Debug + Send,
{
    session
        .select(&config.mailbox)
        .await
        .with_context(|| format!("Failed to select {}", config.mailbox))?;

    let query = imap_search_query(&config.keywords);
    let found = session
        .uid_search(&query)
        .await
        .context("UID SEARCH failed")?;

    let uids = newest_uids(found.into_iter().collect(), config.max_results);
    if uids.is_empty() {
        tracing::debug!("No unseen support mail in {}", config.mailbox);
        return Ok(vec![]);
    }

    let uid_set = uids
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let mut messages = Vec::with_capacity(uids.len());
    let stream = session
        .uid_fetch(&uid_set, "(UID BODY.PEEK[])")
        .await
        .context("UID FETCH failed")?;
    futures::pin_mut!(stream);

    while let Some(item) = stream.next().await {
        let fetch = match item {
            Ok(fetch) => fetch,
            Err(e) => {
                tracing::warn!("Skipping unreadable fetch response: {}", e);
                continue;
            }
        };
        let Some(uid) = fetch.uid else {
            tracing::warn!("Skipping fetch response without UID");
            continue;
        };
        match fetch.body() {
            Some(raw) => messages.push(MailboxMessage {
                uid,
                raw: raw.to_vec(),
            }),
            None => tracing::warn!("Message {} came back without a body", uid),
        }
    }

    messages.sort_by_key(|m| m.uid);
    tracing::debug!("Fetched {} of {} matching messages", messages.len(), uids.len());

    Ok(messages.into_iter().map(ProviderMessage::Mailbox).collect())
}

/// Keep the `max` highest (newest) UIDs, in ascending order
fn newest_uids(mut uids: Vec<u32>, max: usize) -> Vec<u32> {
    uids.sort_unstable();
    if uids.len() > max {
        uids.split_off(uids.len() - max)
    } else {
        uids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_uids_keeps_highest() {
        assert_eq!(newest_uids(vec![9, 2, 14, 5], 2), vec![9, 14]);
        assert_eq!(newest_uids(vec![3, 1], 50), vec![1, 3]);
        assert!(newest_uids(vec![], 10).is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_source_error() {
        let source = ImapSource::new(ImapConfig {
            host: "127.0.0.1".to_string(),
            // Port 1 is reserved and nothing listens on it in CI
            port: 1,
            use_tls: false,
            user: "u".to_string(),
            password: "p".to_string(),
            mailbox: "INBOX".to_string(),
            keywords: vec!["support".to_string()],
            max_results: 10,
            timeout: Duration::from_secs(5),
        });

        assert_eq!(source.name(), "imap");
        tokio_test::assert_err!(source.fetch_new().await);
    }
}
