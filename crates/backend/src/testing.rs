//! Test doubles shared by the unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared_types::{
    DailyAnalytics, Email, EmailFilter, EmailUpdate, NewEmail, NewResponse, Response,
    ResponseUpdate,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::ai::{ChatRequest, LanguageModel};
use crate::error::StoreError;
use crate::pollers::{MailboxMessage, MessageSource, ProviderMessage};
use crate::repository::{EmailStore, MemoryStore, StoreResult};

type Responder = Box<dyn Fn(&ChatRequest) -> Result<String> + Send + Sync>;

/// Model double that either replays a queue of canned replies or answers
/// through a closure. Every request is recorded.
pub struct ScriptedModel {
    queue: Mutex<VecDeque<Result<String, String>>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    /// Replays `replies` in order, then fails every further call
    pub fn replies(replies: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(replies.into()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn respond_with<F>(f: F) -> Arc<Self>
    where
        F: Fn(&ChatRequest) -> Result<String> + Send + Sync + 'static,
    {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(responder) = &self.responder {
            return responder(&request);
        }
        match self.queue.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Err(anyhow!("no scripted reply left")),
        }
    }
}

/// Source double returning the same batch on every fetch
pub struct StaticSource {
    messages: Vec<ProviderMessage>,
    fail_with: Option<String>,
}

impl StaticSource {
    pub fn new(messages: Vec<ProviderMessage>) -> Arc<Self> {
        Arc::new(Self {
            messages,
            fail_with: None,
        })
    }

    pub fn failing(error: &str) -> Arc<Self> {
        Arc::new(Self {
            messages: Vec::new(),
            fail_with: Some(error.to_string()),
        })
    }
}

#[async_trait]
impl MessageSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_new(&self) -> Result<Vec<ProviderMessage>> {
        match &self.fail_with {
            Some(e) => Err(anyhow!(e.clone())),
            None => Ok(self.messages.clone()),
        }
    }
}

/// `MemoryStore` with injectable faults
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    /// Every `insert_response` fails
    pub reject_responses: bool,
    /// `find_by_message_id` never finds anything, as if another writer
    /// inserted the row between the lookup and the insert
    pub stale_lookups: bool,
}

#[async_trait]
impl EmailStore for FaultyStore {
    async fn find_by_message_id(&self, message_id: &str) -> StoreResult<Option<Email>> {
        if self.stale_lookups {
            return Ok(None);
        }
        self.inner.find_by_message_id(message_id).await
    }

    async fn insert_email(&self, email: NewEmail) -> StoreResult<Option<Email>> {
        self.inner.insert_email(email).await
    }

    async fn get_email(&self, id: Uuid) -> StoreResult<Option<Email>> {
        self.inner.get_email(id).await
    }

    async fn update_email(&self, id: Uuid, update: EmailUpdate) -> StoreResult<Option<Email>> {
        self.inner.update_email(id, update).await
    }

    async fn list_emails(&self, filter: &EmailFilter) -> StoreResult<Vec<Email>> {
        self.inner.list_emails(filter).await
    }

    async fn list_emails_received_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Email>> {
        self.inner.list_emails_received_between(start, end).await
    }

    async fn insert_response(&self, response: NewResponse) -> StoreResult<Response> {
        if self.reject_responses {
            return Err(StoreError::Database(diesel::result::Error::RollbackTransaction));
        }
        self.inner.insert_response(response).await
    }

    async fn update_response(
        &self,
        id: Uuid,
        update: ResponseUpdate,
    ) -> StoreResult<Option<Response>> {
        self.inner.update_response(id, update).await
    }

    async fn list_responses(&self, email_id: Uuid) -> StoreResult<Vec<Response>> {
        self.inner.list_responses(email_id).await
    }

    async fn upsert_daily_analytics(&self, stats: DailyAnalytics) -> StoreResult<DailyAnalytics> {
        self.inner.upsert_daily_analytics(stats).await
    }

    async fn list_analytics(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<DailyAnalytics>> {
        self.inner.list_analytics(from, to).await
    }
}

/// Plain-text RFC 822 message as an IMAP fetch would return it
pub fn rfc822(uid: u32, message_id: &str, from: &str, subject: &str, body: &str) -> ProviderMessage {
    let raw = format!(
        "Message-ID: {}\r\nFrom: {}\r\nSubject: {}\r\nDate: Tue, 05 Mar 2024 09:30:00 +0000\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
        message_id, from, subject, body
    );
    ProviderMessage::Mailbox(MailboxMessage {
        uid,
        raw: raw.into_bytes(),
    })
}
