//! Event handler system.
//!
//! Join and leave service messages are routed to the greeting flows here.
//! Each handler filters for its own service message kind.

pub mod bye;
pub mod welcome;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

/// Build the message event handler for group service messages.
pub fn message_event_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| msg.chat.is_group() || msg.chat.is_supergroup())
        .branch(welcome::handler())
        .branch(bye::handler())
}
