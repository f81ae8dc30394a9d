//! Greeting subsystem: welcome and goodbye messages plus the new-member
//! verification gate.
//!
//! ## Layout
//!
//! - `template` - placeholder rendering
//! - `buttons` - inline button definitions and keyboards
//! - `delivery` - sending with fallback on failure
//! - `verification` - mute-until-verified state machine
//! - `orchestrator` - join/leave/click flows
//! - `client`, `store` - seams to Telegram and storage

pub mod buttons;
mod client;
mod delivery;
mod error;
mod orchestrator;
mod store;
mod telegram;
pub mod template;
mod verification;

#[cfg(test)]
mod testing;

pub use client::{MediaKind, Member, PermissionOracle};
pub use error::VerificationError;
pub use orchestrator::{ClickEvent, Greeter, GreeterConfig, GreetingKind, JoinEvent, LeaveEvent};
pub use store::{GreetingStore, VerificationStore};
pub use telegram::TelegramClient;
pub use verification::parse_callback;
