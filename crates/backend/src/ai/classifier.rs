//! Email classification with graceful degradation.
//!
//! `classify` never fails. The structured call is tried first, a
//! sentiment-only call second, and static defaults last. Whatever the model
//! returns goes through `decode_classification` / `decode_sentiment`, the
//! single place where untrusted values are defaulted and clamped.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use shared_types::{ClassificationResult, ExtractedInfo, Priority, Sentiment, DEFAULT_CATEGORY};
use std::sync::Arc;

use super::{ChatRequest, LanguageModel};

const CLASSIFY_PROMPT: &str = r#"You analyze inbound customer support email. For each email determine:
1. Sentiment (positive, neutral or negative) with a score from -100 (very negative) to 100 (very positive) and a confidence between 0 and 1
2. Priority (urgent, normal or low). Use urgent when the sender signals things like "urgent", "immediately", "critical", "asap" or "emergency"
3. Category, for example Account Issues, Technical Support, Product Inquiry, Billing or Feedback
4. Extracted details: phone number, alternate email address, keywords, urgency indicator phrases and customer type

Reply with a single JSON object in exactly this shape:
{
  "sentiment": {"sentiment": "positive|neutral|negative", "score": number, "confidence": number},
  "priority": "urgent|normal|low",
  "category": "string",
  "extractedInfo": {
    "phone": "string or null",
    "alternateEmail": "string or null",
    "keywords": ["string"],
    "urgencyIndicators": ["string"],
    "customerType": "string or null"
  }
}"#;

const SENTIMENT_PROMPT: &str = "You rate the sentiment of customer emails. Give a score from -100 \
(negative) to 100 (positive) and a confidence between 0 and 1. Reply with JSON in this shape: \
{\"sentiment\": \"positive|neutral|negative\", \"score\": number, \"confidence\": number}";

/// Sentiment triple from the narrow fallback call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentReading {
    pub sentiment: Sentiment,
    pub score: i32,
    pub confidence: f32,
}

impl Default for SentimentReading {
    fn default() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            score: 0,
            confidence: 0.0,
        }
    }
}

#[derive(Clone)]
pub struct Classifier {
    model: Option<Arc<dyn LanguageModel>>,
}

impl Classifier {
    /// `None` puts the classifier permanently in degraded mode
    pub fn new(model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { model }
    }

    pub async fn classify(&self, subject: &str, body: &str, sender: &str) -> ClassificationResult {
        let Some(model) = &self.model else {
            tracing::debug!("No classification model configured, using defaults");
            return ClassificationResult::default();
        };

        let structured = async {
            let request = ChatRequest::new(
                CLASSIFY_PROMPT,
                format!("Subject: {}\nFrom: {}\nBody: {}", subject, sender, body),
            )
            .json();
            let text = model.complete(request).await?;
            let value = parse_json_object(&text)?;
            decode_classification(&value).context("classification was not a JSON object")
        };

        match structured.await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    "Structured classification failed, trying sentiment only: {:#}",
                    e
                );
                self.fallback(model.as_ref(), body).await
            }
        }
    }

    async fn fallback(&self, model: &dyn LanguageModel, body: &str) -> ClassificationResult {
        match analyze_sentiment(model, body).await {
            Ok(reading) => ClassificationResult {
                sentiment: reading.sentiment,
                sentiment_score: reading.score,
                confidence: reading.confidence,
                ..ClassificationResult::default()
            },
            Err(e) => {
                tracing::warn!("Sentiment fallback failed, using defaults: {:#}", e);
                ClassificationResult::default()
            }
        }
    }
}

async fn analyze_sentiment(model: &dyn LanguageModel, text: &str) -> Result<SentimentReading> {
    let request = ChatRequest::new(
        SENTIMENT_PROMPT,
        format!("Rate the sentiment of this email: {}", text),
    )
    .json();
    let reply = model.complete(request).await?;
    let value = parse_json_object(&reply)?;
    decode_sentiment(&value).ok_or_else(|| anyhow!("sentiment reply was not a JSON object"))
}

/// Parse model output into a JSON object, tolerating a markdown code fence
fn parse_json_object(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    let value: Value = serde_json::from_str(unfenced.trim()).context("model reply was not JSON")?;
    if !value.is_object() {
        return Err(anyhow!("model reply was JSON but not an object"));
    }
    Ok(value)
}

/// Decode a structured classification reply. Returns `None` only when the
/// value is not an object; every field inside has a default.
pub fn decode_classification(value: &Value) -> Option<ClassificationResult> {
    let obj = value.as_object()?;

    // Usually nested under "sentiment", but accept a flat layout too
    let reading = match obj.get("sentiment") {
        Some(nested) if nested.is_object() => decode_sentiment(nested).unwrap_or_default(),
        _ => decode_sentiment(value).unwrap_or_default(),
    };

    let info = obj.get("extractedInfo");
    let extracted_info = ExtractedInfo {
        phone: info.and_then(|i| text_field(i.get("phone"))),
        alternate_email: info.and_then(|i| text_field(i.get("alternateEmail"))),
        keywords: string_list(info.and_then(|i| i.get("keywords"))),
        urgency_indicators: string_list(info.and_then(|i| i.get("urgencyIndicators"))),
        customer_type: info.and_then(|i| text_field(i.get("customerType"))),
    };

    Some(ClassificationResult {
        sentiment: reading.sentiment,
        sentiment_score: reading.score,
        confidence: reading.confidence,
        priority: obj
            .get("priority")
            .and_then(Value::as_str)
            .and_then(Priority::from_str)
            .unwrap_or_default(),
        category: text_field(obj.get("category")).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        extracted_info,
    })
}

/// Decode `{sentiment, score, confidence}`; `None` when not an object
pub fn decode_sentiment(value: &Value) -> Option<SentimentReading> {
    let obj = value.as_object()?;

    let sentiment = obj
        .get("sentiment")
        .and_then(Value::as_str)
        .and_then(Sentiment::from_str)
        .unwrap_or_default();

    let score = number(obj.get("score"))
        .map(|s| s.round().clamp(-100.0, 100.0) as i32)
        .unwrap_or(0);

    let confidence = number(obj.get("confidence"))
        .map(|c| c.clamp(0.0, 1.0) as f32)
        .unwrap_or(0.0);

    Some(SentimentReading {
        sentiment,
        score,
        confidence,
    })
}

fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn text_field(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(s.to_string())
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| text_field(Some(item)))
                .collect()
        })
        .unwrap_or_default()
}
