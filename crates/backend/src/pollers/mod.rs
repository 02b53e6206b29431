//! Mail ingestion: provider adapters, normalization, dedup and the pipeline
//! that ties them together.
//!
//! Runs as a tokio background task inside the server process; the CLI drives
//! the same pipeline for one-off runs.

pub mod dedup;
pub mod email;
mod gmail_client;
mod imap_client;
pub mod normalize;
pub mod processor;
pub mod source;

pub use dedup::DedupGate;
pub use email::start_ingestion_task;
pub use processor::{DraftOutcome, IngestionPipeline, IngestionReport, MessageOutcome};
pub use source::{build_source, ApiMessage, ApiPart, MailboxMessage, MessageSource, ProviderMessage};
