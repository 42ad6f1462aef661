pub mod reminder_setter;
pub mod video_summary;
pub mod web_search;

pub use reminder_setter::ReminderSetterTool;
pub use video_summary::{extract_canonical_id, SummaryBackend, VideoSummaryTool};
pub use web_search::{SearchBackend, WebSearchTool};
