pub mod channel;
pub mod content;
pub mod sanitizer;

pub use channel::{Capability, NotificationChannel};
pub use content::ContentExtractor;
pub use sanitizer::TextSanitizer;
