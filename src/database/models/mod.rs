//! Database module exports.

pub mod common;
pub mod greeting_settings;
pub mod verification;
pub mod whitelist;

pub use common::ButtonDef;
pub use greeting_settings::{CapturedContent, CleanWelcome, ContentType, GreetingMessage, GreetingSettings};
pub use verification::{MuteDuration, PendingVerification, TimeoutEntry, VerificationPolicy};
pub use whitelist::WhitelistedChat;
