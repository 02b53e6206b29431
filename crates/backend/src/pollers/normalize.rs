//! Turns provider messages into provider-agnostic `RawEmail` records.
//!
//! Both provider shapes end up in the same place: a list of headers plus the
//! first plain-text and first HTML leaf part. Transfer encodings are undone
//! before any text is looked at (mailparse for RFC 822, the Gmail client
//! library for API payloads), and API part text is then decoded from the
//! charset its `Content-Type` declares.

use charset::Charset;
use chrono::{DateTime, TimeZone, Utc};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use regex::Regex;
use shared_types::RawEmail;
use std::sync::OnceLock;
use thiserror::Error;
use uuid::Uuid;

use super::source::{ApiMessage, ApiPart, MailboxMessage, ProviderMessage};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("not a parseable MIME message: {0}")]
    Mime(#[from] mailparse::MailParseError),

    #[error("message has no payload")]
    MissingPayload,

    #[error("text body could not be decoded: {0}")]
    UndecodableBody(String),
}

/// Bodies collected from a part tree. First text and first HTML part win.
#[derive(Debug, Default)]
struct Bodies {
    text: Option<String>,
    html: Option<String>,
    first_failure: Option<String>,
}

impl Bodies {
    fn record_failure(&mut self, reason: String) {
        if self.first_failure.is_none() {
            self.first_failure = Some(reason);
        }
    }

    /// Resolve to `(body, html_body)`. A decode failure only matters when it
    /// left the message with no text at all.
    fn finish(self) -> Result<(String, Option<String>), NormalizeError> {
        match (self.text, self.html, self.first_failure) {
            (None, None, Some(reason)) => Err(NormalizeError::UndecodableBody(reason)),
            (Some(text), html, _) => Ok((text, html)),
            (None, Some(html), _) => Ok((html_to_text(&html), Some(html))),
            (None, None, None) => Ok((String::new(), None)),
        }
    }
}

pub fn normalize(message: &ProviderMessage) -> Result<RawEmail, NormalizeError> {
    match message {
        ProviderMessage::Mailbox(m) => normalize_mailbox(m),
        ProviderMessage::Api(m) => normalize_api(m),
    }
}

fn normalize_mailbox(message: &MailboxMessage) -> Result<RawEmail, NormalizeError> {
    let parsed = mailparse::parse_mail(&message.raw)?;
    let headers = &parsed.headers;

    let mut bodies = Bodies::default();
    collect_mime_bodies(&parsed, &mut bodies);
    let (body, html_body) = bodies.finish()?;

    let (sender, sender_name) = parse_sender(&headers.get_first_value("From").unwrap_or_default());

    let message_id = headers
        .get_first_value("Message-ID")
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| synthesize_message_id(&message.raw));

    let received_at = headers
        .get_first_value("Date")
        .and_then(|d| parse_date(&d))
        .unwrap_or_else(Utc::now);

    Ok(RawEmail {
        message_id,
        subject: headers
            .get_first_value("Subject")
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        sender,
        sender_name,
        body,
        html_body,
        received_at,
    })
}

fn collect_mime_bodies(part: &ParsedMail, bodies: &mut Bodies) {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_mime_bodies(sub, bodies);
        }
        return;
    }

    if part.get_content_disposition().disposition == DispositionType::Attachment {
        return;
    }

    let slot = match part.ctype.mimetype.to_ascii_lowercase().as_str() {
        "text/plain" if bodies.text.is_none() => &mut bodies.text,
        "text/html" if bodies.html.is_none() => &mut bodies.html,
        _ => return,
    };

    match part.get_body() {
        Ok(text) => *slot = Some(text),
        Err(e) => bodies.record_failure(format!("{} part: {}", part.ctype.mimetype, e)),
    }
}

fn normalize_api(message: &ApiMessage) -> Result<RawEmail, NormalizeError> {
    let payload = message
        .payload
        .as_ref()
        .ok_or(NormalizeError::MissingPayload)?;

    let mut bodies = Bodies::default();
    collect_api_bodies(payload, &mut bodies);
    let (body, html_body) = bodies.finish()?;

    let (sender, sender_name) = parse_sender(payload.header("From").unwrap_or_default());

    let message_id = payload
        .header("Message-ID")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| Some(message.id.trim().to_string()).filter(|id| !id.is_empty()))
        .unwrap_or_else(|| {
            let fingerprint = format!(
                "{}\n{}\n{}\n{:?}\n{}",
                payload.header("From").unwrap_or_default(),
                payload.header("Subject").unwrap_or_default(),
                payload.header("Date").unwrap_or_default(),
                message.internal_date_ms,
                body
            );
            synthesize_message_id(fingerprint.as_bytes())
        });

    let received_at = payload
        .header("Date")
        .and_then(parse_date)
        .or_else(|| {
            message
                .internal_date_ms
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        })
        .unwrap_or_else(Utc::now);

    Ok(RawEmail {
        message_id,
        subject: payload.header("Subject").unwrap_or_default().trim().to_string(),
        sender,
        sender_name,
        body,
        html_body,
        received_at,
    })
}

fn collect_api_bodies(part: &ApiPart, bodies: &mut Bodies) {
    if !part.parts.is_empty() {
        for sub in &part.parts {
            collect_api_bodies(sub, bodies);
        }
        return;
    }

    if part.filename.is_some() {
        return;
    }

    let slot = match part.mime_type.to_ascii_lowercase().as_str() {
        "text/plain" if bodies.text.is_none() => &mut bodies.text,
        "text/html" if bodies.html.is_none() => &mut bodies.html,
        _ => return,
    };

    let Some(data) = &part.data else {
        return;
    };

    match decode_part_text(part, data) {
        Ok(text) => *slot = Some(text),
        Err(reason) => bodies.record_failure(format!("{} part: {}", part.mime_type, reason)),
    }
}

/// Decode API part bytes using the charset the part declares. The provider
/// only undoes the transfer encoding, so the bytes are still in that charset.
/// Parts that declare nothing are taken as UTF-8.
fn decode_part_text(part: &ApiPart, data: &[u8]) -> Result<String, String> {
    let label = part
        .header("Content-Type")
        .map(mailparse::parse_content_type)
        .and_then(|ctype| ctype.params.get("charset").cloned())
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| "utf-8".to_string());

    match Charset::for_label(label.as_bytes()) {
        Some(charset) => {
            let (text, had_errors) = charset.decode_without_bom_handling(data);
            if had_errors {
                Err(format!("invalid {} text", charset.name()))
            } else {
                Ok(text.into_owned())
            }
        }
        None => String::from_utf8(data.to_vec())
            .map_err(|e| format!("unknown charset '{}' and not utf-8: {}", label, e)),
    }
}

/// Split a `From` header into `(address, display name)`.
///
/// `"Jane Doe" <jane@example.com>` gives the address and the unquoted name;
/// anything without angle brackets is taken whole as the address.
pub fn parse_sender(header: &str) -> (String, Option<String>) {
    let from = header.trim();

    if let Some(bracket_start) = from.rfind('<') {
        if let Some(bracket_end) = from.rfind('>') {
            if bracket_end > bracket_start {
                let address = from[bracket_start + 1..bracket_end].trim().to_string();
                let name = from[..bracket_start].trim();
                let name = name.trim_matches('"').trim();
                let name = if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                };
                return (address, name);
            }
        }
    }

    (from.to_string(), None)
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    // mailparse copes with the looser forms seen in the wild
    mailparse::dateparse(value)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Stable id for messages that carry none: the same bytes always give the
/// same id, so refetches still dedup.
fn synthesize_message_id(content: &[u8]) -> String {
    format!("generated-{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, content))
}

fn re_invisible_blocks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(script|style|head)\b.*?</(script|style|head)\s*>").unwrap())
}

fn re_line_breaks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</(p|div|li|tr|h[1-6])\s*>").unwrap())
}

fn re_tags() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").unwrap())
}

/// Plain-text rendition of an HTML body for HTML-only mail
pub fn html_to_text(html: &str) -> String {
    let text = re_invisible_blocks().replace_all(html, "");
    let text = re_line_breaks().replace_all(&text, "\n");
    let text = re_tags().replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
