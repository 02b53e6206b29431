//! Reply drafting.
//!
//! The generator always hands back usable text: a model reply when one is
//! available, otherwise a fixed template that names the subject and flags
//! urgency.

use anyhow::{anyhow, Result};
use shared_types::{ClassificationResult, Priority, ResponseGeneration, Sentiment};
use std::sync::Arc;

use super::{ChatRequest, LanguageModel};

const GENERATED_CONFIDENCE: f32 = 0.85;
const FALLBACK_CONFIDENCE: f32 = 0.3;

#[derive(Clone)]
pub struct ResponseGenerator {
    model: Option<Arc<dyn LanguageModel>>,
}

impl ResponseGenerator {
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { model }
    }

    pub async fn generate(
        &self,
        subject: &str,
        body: &str,
        sender: &str,
        classification: &ClassificationResult,
    ) -> ResponseGeneration {
        self.generate_with_knowledge(subject, body, sender, classification, None)
            .await
    }

    /// Same as `generate`, with extra reference text handed to the model
    pub async fn generate_with_knowledge(
        &self,
        subject: &str,
        body: &str,
        sender: &str,
        classification: &ClassificationResult,
        knowledge_base: Option<&str>,
    ) -> ResponseGeneration {
        let Some(model) = &self.model else {
            tracing::debug!("No generation model configured, using template reply");
            return fallback_reply(subject, classification);
        };

        match draft_with_model(
            model.as_ref(),
            subject,
            body,
            sender,
            classification,
            knowledge_base,
        )
        .await
        {
            Ok(content) => ResponseGeneration {
                content,
                tone: tone_for(classification.sentiment).to_string(),
                confidence: GENERATED_CONFIDENCE,
            },
            Err(e) => {
                tracing::warn!("Reply generation failed, using template: {:#}", e);
                fallback_reply(subject, classification)
            }
        }
    }
}

async fn draft_with_model(
    model: &dyn LanguageModel,
    subject: &str,
    body: &str,
    sender: &str,
    classification: &ClassificationResult,
    knowledge_base: Option<&str>,
) -> Result<String> {
    let request = ChatRequest::new(
        system_prompt(classification, knowledge_base),
        format!(
            "Customer email:\nSubject: {}\nFrom: {}\nMessage: {}\n\nWrite a reply to this email.",
            subject, sender, body
        ),
    );

    let content = model.complete(request).await?;
    let content = content.trim();
    if content.is_empty() {
        return Err(anyhow!("model returned an empty reply"));
    }
    Ok(content.to_string())
}

fn system_prompt(classification: &ClassificationResult, knowledge_base: Option<&str>) -> String {
    let mut context = vec![
        format!("Priority: {}", classification.priority.as_str()),
        format!("Sentiment: {}", classification.sentiment.as_str()),
        format!("Category: {}", classification.category),
        sentiment_guidance(classification.sentiment).to_string(),
    ];
    if classification.priority == Priority::Urgent {
        context.push("This is URGENT, prioritize immediate assistance".to_string());
    }
    let info = &classification.extracted_info;
    if let Some(phone) = &info.phone {
        context.push(format!("Customer phone: {}", phone));
    }
    if let Some(customer_type) = &info.customer_type {
        context.push(format!("Customer type: {}", customer_type));
    }
    if let Some(kb) = knowledge_base.filter(|kb| !kb.trim().is_empty()) {
        context.push(format!("Knowledge base: {}", kb.trim()));
    }

    let context = context
        .iter()
        .map(|line| format!("- {}", line))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an experienced customer support representative writing email replies.\n\n\
         Guidelines:\n\
         - Keep a professional, friendly tone\n\
         - Address the customer's specific concerns and offer concrete next steps\n\
         - Be especially empathetic with frustrated customers\n\
         - Include contact options for urgent issues\n\
         - Be concise but complete and close with a professional signature\n\n\
         About this email:\n{}\n\n\
         Write the complete reply.",
        context
    )
}

fn sentiment_guidance(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Negative => {
            "The customer appears frustrated or upset. Acknowledge their concerns with empathy."
        }
        Sentiment::Positive => "The customer seems satisfied. Keep the positive tone.",
        Sentiment::Neutral => "The customer's tone is neutral. Be professional and helpful.",
    }
}

fn tone_for(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Negative => "empathetic",
        _ => "professional",
    }
}

/// Deterministic reply used whenever the model can't produce one
pub fn fallback_reply(subject: &str, classification: &ClassificationResult) -> ResponseGeneration {
    let urgency = if classification.priority == Priority::Urgent {
        " Given the urgent nature of your request, we are prioritizing this case."
    } else {
        ""
    };

    let content = format!(
        "Dear Customer,\n\n\
         Thank you for contacting us regarding \"{}\". We have received your message and understand your concern.\n\n\
         Our support team is reviewing your request and will provide a detailed response shortly.{}\n\n\
         If you need immediate assistance, please don't hesitate to contact our support line.\n\n\
         Best regards,\n\
         Customer Support Team",
        subject, urgency
    );

    ResponseGeneration {
        content,
        tone: "professional".to_string(),
        confidence: FALLBACK_CONFIDENCE,
    }
}
