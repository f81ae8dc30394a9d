//! Admin checks for commands and the verification gate.
//!
//! Lookups go through the Bot API once and are cached for a few minutes.
//! Bot owners from `OWNER_IDS` pass every admin check.

mod checker;

pub use checker::Permissions;
