pub mod analytics;
pub mod responses;

pub use analytics::AnalyticsService;
pub use responses::{RegeneratedDraft, ResponseService};
