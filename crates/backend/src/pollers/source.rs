//! Message source abstraction.
//!
//! Two providers sit behind `MessageSource`: a polled IMAP mailbox and the
//! Gmail API. The implementation is picked once from configuration by
//! `build_source`; callers only see the trait.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::gmail_client::GmailSource;
use super::imap_client::ImapSource;
use crate::config::SourceConfig;

/// One message as the provider handed it over, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderMessage {
    Mailbox(MailboxMessage),
    Api(ApiMessage),
}

impl ProviderMessage {
    /// Provider-side identifier, for log lines
    pub fn provider_id(&self) -> String {
        match self {
            ProviderMessage::Mailbox(m) => format!("uid:{}", m.uid),
            ProviderMessage::Api(m) => m.id.clone(),
        }
    }
}

/// Raw RFC 822 bytes fetched from an IMAP mailbox
#[derive(Debug, Clone, PartialEq)]
pub struct MailboxMessage {
    pub uid: u32,
    pub raw: Vec<u8>,
}

/// Message from the provider API, already split into a part tree
#[derive(Debug, Clone, PartialEq)]
pub struct ApiMessage {
    pub id: String,
    /// Milliseconds since the epoch as reported by the provider
    pub internal_date_ms: Option<i64>,
    pub payload: Option<ApiPart>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiPart {
    pub mime_type: String,
    pub filename: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Transfer-decoded body bytes
    pub data: Option<Vec<u8>>,
    pub parts: Vec<ApiPart>,
}

impl ApiPart {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch unread support messages. An `Err` means the run cannot
    /// proceed (connection, auth, timeout); individual bad messages are
    /// skipped inside the implementation.
    async fn fetch_new(&self) -> Result<Vec<ProviderMessage>>;
}

pub fn build_source(config: &SourceConfig) -> Arc<dyn MessageSource> {
    match config {
        SourceConfig::Mailbox(imap) => Arc::new(ImapSource::new(imap.clone())),
        SourceConfig::Api(gmail) => Arc::new(GmailSource::new(gmail.clone())),
    }
}

/// `UNSEEN OR SUBJECT "a" OR SUBJECT "b" SUBJECT "c"` style search key
pub fn imap_search_query(keywords: &[String]) -> String {
    let terms: Vec<String> = keywords
        .iter()
        .map(|k| format!("SUBJECT \"{}\"", k.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();

    match terms.len() {
        0 => "UNSEEN".to_string(),
        1 => format!("UNSEEN {}", terms[0]),
        _ => {
            // IMAP OR is binary, so nest: OR a OR b c
            let mut query = terms[terms.len() - 1].clone();
            for term in terms[..terms.len() - 1].iter().rev() {
                query = format!("OR {} {}", term, query);
            }
            format!("UNSEEN {}", query)
        }
    }
}

/// `subject:(a OR b) is:unread` provider query
pub fn gmail_search_query(keywords: &[String]) -> String {
    if keywords.is_empty() {
        return "is:unread".to_string();
    }
    format!("subject:({}) is:unread", keywords.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_imap_query_nests_or_terms() {
        assert_eq!(
            imap_search_query(&kw(&["support", "query", "help"])),
            r#"UNSEEN OR SUBJECT "support" OR SUBJECT "query" SUBJECT "help""#
        );
        assert_eq!(
            imap_search_query(&kw(&["support"])),
            r#"UNSEEN SUBJECT "support""#
        );
        assert_eq!(imap_search_query(&[]), "UNSEEN");
    }

    #[test]
    fn test_gmail_query_matches_provider_syntax() {
        assert_eq!(
            gmail_search_query(&kw(&["support", "query", "request", "help"])),
            "subject:(support OR query OR request OR help) is:unread"
        );
        assert_eq!(gmail_search_query(&[]), "is:unread");
    }

    #[test]
    fn test_api_part_header_lookup_is_case_insensitive() {
        let part = ApiPart {
            headers: vec![("Message-ID".into(), "<x@y>".into())],
            ..Default::default()
        };
        assert_eq!(part.header("message-id"), Some("<x@y>"));
        assert_eq!(part.header("Subject"), None);
    }
}
