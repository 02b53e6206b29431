//! Process configuration read from environment variables.
//!
//! `.env` files are loaded by the binaries through `dotenvy` before
//! `AppConfig::from_env` runs. Parsing goes through `from_lookup` so tests
//! can feed a map instead of touching the real environment.

use std::collections::HashMap;
use std::time::Duration;

use crate::ai::OpenAiConfig;

const DEFAULT_KEYWORDS: &[&str] = &["support", "query", "request", "help"];

/// Which provider the ingestion source talks to
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Mailbox(ImapConfig),
    Api(GmailConfig),
}

impl SourceConfig {
    pub fn provider_name(&self) -> &'static str {
        match self {
            SourceConfig::Mailbox(_) => "imap",
            SourceConfig::Api(_) => "gmail",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub user: String,
    pub password: String,
    pub mailbox: String,
    pub keywords: Vec<String>,
    pub max_results: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GmailConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub keywords: Vec<String>,
    pub max_results: usize,
    pub timeout: Duration,
}

/// Ingestion trigger settings
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionConfig {
    /// How often the background task runs a pass (default: 5 minutes)
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub source: SourceConfig,
    /// `None` when no API key is configured; classification and drafting
    /// then run in degraded mode.
    pub model: Option<OpenAiConfig>,
    pub ingestion: IngestionConfig,
    pub database_url: Option<String>,
    pub bind_addr: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown EMAIL_PROVIDER '{0}' (expected imap, mailbox, gmail or api)")]
    UnknownProvider(String),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let keywords = get("SUPPORT_SUBJECT_KEYWORDS")
            .map(|raw| {
                raw.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect());

        let max_results = parse_or(&get, "EMAIL_MAX_FETCH_PER_POLL", 50usize)?;
        let source_timeout = Duration::from_secs(parse_or(&get, "EMAIL_SOURCE_TIMEOUT_SECS", 30u64)?);

        let provider = get("EMAIL_PROVIDER").unwrap_or_else(|| "imap".to_string());
        let source = match provider.trim().to_ascii_lowercase().as_str() {
            "imap" | "mailbox" => SourceConfig::Mailbox(ImapConfig {
                host: get("IMAP_HOST").unwrap_or_else(|| "imap.gmail.com".to_string()),
                port: parse_or(&get, "IMAP_PORT", 993u16)?,
                use_tls: get("IMAP_SECURE")
                    .map(|v| !v.trim().eq_ignore_ascii_case("false"))
                    .unwrap_or(true),
                user: get("IMAP_USER").unwrap_or_default(),
                password: get("IMAP_PASSWORD").unwrap_or_default(),
                mailbox: get("IMAP_MAILBOX").unwrap_or_else(|| "INBOX".to_string()),
                keywords,
                max_results,
                timeout: source_timeout,
            }),
            "gmail" | "api" => SourceConfig::Api(GmailConfig {
                client_id: get("GMAIL_CLIENT_ID").unwrap_or_default(),
                client_secret: get("GMAIL_CLIENT_SECRET").unwrap_or_default(),
                refresh_token: get("GMAIL_REFRESH_TOKEN").unwrap_or_default(),
                keywords,
                max_results,
                timeout: source_timeout,
            }),
            _ => return Err(ConfigError::UnknownProvider(provider)),
        };

        let model_timeout = Duration::from_secs(parse_or(&get, "MODEL_TIMEOUT_SECS", 60u64)?);
        let model = get("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-5".to_string()),
            timeout: model_timeout,
        });

        let poll_interval_secs = parse_or(&get, "EMAIL_POLL_INTERVAL_SECS", 300u64)?;

        Ok(AppConfig {
            source,
            model,
            ingestion: IngestionConfig {
                poll_interval: Duration::from_secs(poll_interval_secs),
            },
            database_url: get("DATABASE_URL"),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        })
    }

    /// Convenience for tests and tools that want a map-backed config
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_select_imap_without_model() {
        let config = AppConfig::from_map(&HashMap::new()).unwrap();

        let SourceConfig::Mailbox(imap) = &config.source else {
            panic!("expected mailbox source, got {:?}", config.source);
        };
        assert_eq!(imap.host, "imap.gmail.com");
        assert_eq!(imap.port, 993);
        assert!(imap.use_tls);
        assert_eq!(imap.mailbox, "INBOX");
        assert_eq!(imap.keywords, vec!["support", "query", "request", "help"]);
        assert_eq!(imap.max_results, 50);
        assert!(config.model.is_none());
        assert_eq!(config.ingestion.poll_interval, Duration::from_secs(300));
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_api_provider_and_model_settings() {
        let config = AppConfig::from_map(&vars(&[
            ("EMAIL_PROVIDER", "api"),
            ("GMAIL_CLIENT_ID", "cid"),
            ("GMAIL_CLIENT_SECRET", "secret"),
            ("GMAIL_REFRESH_TOKEN", "refresh"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("SUPPORT_SUBJECT_KEYWORDS", "billing, outage ,"),
        ]))
        .unwrap();

        let SourceConfig::Api(gmail) = &config.source else {
            panic!("expected api source");
        };
        assert_eq!(gmail.refresh_token, "refresh");
        assert_eq!(gmail.keywords, vec!["billing", "outage"]);
        assert_eq!(config.source.provider_name(), "gmail");

        let model = config.model.unwrap();
        assert_eq!(model.model, "gpt-4o-mini");
        assert_eq!(model.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_imap_secure_false_disables_tls() {
        let config = AppConfig::from_map(&vars(&[("IMAP_SECURE", "FALSE"), ("IMAP_PORT", "143")]))
            .unwrap();
        let SourceConfig::Mailbox(imap) = config.source else {
            panic!("expected mailbox source");
        };
        assert!(!imap.use_tls);
        assert_eq!(imap.port, 143);
    }

    #[test]
    fn test_blank_api_key_means_degraded_mode() {
        let config = AppConfig::from_map(&vars(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert!(config.model.is_none());
    }

    #[test]
    fn test_rejects_unknown_provider_and_bad_numbers() {
        assert_eq!(
            AppConfig::from_map(&vars(&[("EMAIL_PROVIDER", "pop3")])).unwrap_err(),
            ConfigError::UnknownProvider("pop3".to_string())
        );
        assert!(matches!(
            AppConfig::from_map(&vars(&[("IMAP_PORT", "not-a-port")])),
            Err(ConfigError::Invalid { key: "IMAP_PORT", .. })
        ));
    }
}
