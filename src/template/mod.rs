// Template persistence - named watermark/export presets plus the auto-saved session settings
mod error;
mod record;
mod store;

pub use error::TemplateError;
pub use record::TemplateRecord;
pub use store::{SESSION_FILE_NAME, SessionSettings, TemplateStore, sanitize_name};
