//! Response lifecycle rules.
//!
//! A response is a draft until it has `sent_at`. Sending one resolves the
//! email it belongs to; the entities don't enforce that themselves, so every
//! write path goes through here.

use shared_types::{
    CreateResponseRequest, EmailStatus, EmailUpdate, NewResponse, Response, ResponseGeneration,
    ResponseUpdate,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::ai::ResponseGenerator;
use crate::error::StoreError;
use crate::repository::EmailStore;

/// Service for response-related business logic
#[derive(Clone)]
pub struct ResponseService {
    store: Arc<dyn EmailStore>,
    generator: ResponseGenerator,
}

/// A freshly stored AI draft plus the generator's metadata
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegeneratedDraft {
    pub response: Response,
    pub tone: String,
    pub confidence: f32,
}

impl ResponseService {
    pub fn new(store: Arc<dyn EmailStore>, generator: ResponseGenerator) -> Self {
        Self { store, generator }
    }

    pub async fn list_responses(&self, email_id: Uuid) -> Result<Vec<Response>, StoreError> {
        self.require_email(email_id).await?;
        self.store.list_responses(email_id).await
    }

    pub async fn create_response(
        &self,
        email_id: Uuid,
        request: CreateResponseRequest,
    ) -> Result<Response, StoreError> {
        self.require_email(email_id).await?;

        let response = self
            .store
            .insert_response(NewResponse {
                email_id,
                content: request.content,
                is_ai_generated: request.is_ai_generated,
                sent_at: request.sent_at,
            })
            .await?;

        if response.is_sent() {
            self.resolve_email(email_id).await?;
        }
        Ok(response)
    }

    pub async fn update_response(
        &self,
        response_id: Uuid,
        update: ResponseUpdate,
    ) -> Result<Response, StoreError> {
        let marks_sent = update.sent_at.is_some();
        let response = self
            .store
            .update_response(response_id, update)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("response {}", response_id)))?;

        if marks_sent {
            self.resolve_email(response.email_id).await?;
        }
        Ok(response)
    }

    /// Draft a new AI reply for an email that was classified earlier
    pub async fn regenerate_draft(
        &self,
        email_id: Uuid,
        knowledge_base: Option<&str>,
    ) -> Result<RegeneratedDraft, StoreError> {
        let email = self.require_email(email_id).await?;
        let classification = email.classification();

        let ResponseGeneration {
            content,
            tone,
            confidence,
        } = self
            .generator
            .generate_with_knowledge(
                &email.subject,
                &email.body,
                &email.sender,
                &classification,
                knowledge_base,
            )
            .await;

        let response = self
            .store
            .insert_response(NewResponse::ai_draft(email_id, content))
            .await?;

        Ok(RegeneratedDraft {
            response,
            tone,
            confidence,
        })
    }

    async fn require_email(&self, email_id: Uuid) -> Result<shared_types::Email, StoreError> {
        self.store
            .get_email(email_id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("email {}", email_id)))
    }

    async fn resolve_email(&self, email_id: Uuid) -> Result<(), StoreError> {
        self.store
            .update_email(
                email_id,
                EmailUpdate {
                    status: Some(EmailStatus::Resolved),
                    priority: None,
                },
            )
            .await?;
        tracing::info!("Email {} resolved by sent response", email_id);
        Ok(())
    }
}
