//! Welcome event handler.
//!
//! Handles `new_chat_members` service messages: greets the newcomers and
//! runs them through the verification gate.

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, warn};

use crate::bot::AppState;
use crate::greeting::{JoinEvent, Member};

/// Returns the handler for new member service messages.
pub fn handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| msg.new_chat_members().is_some_and(|m| !m.is_empty()))
        .endpoint(welcome_handler)
}

async fn welcome_handler(msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(users) = msg.new_chat_members() else {
        return Ok(());
    };

    let event = JoinEvent {
        chat_id: msg.chat.id.0,
        chat_title: msg.chat.title().unwrap_or_default().to_string(),
        service_message_id: msg.id.0,
        members: users.iter().map(Member::from).collect(),
    };

    debug!("{} member(s) joined chat {}", event.members.len(), event.chat_id);

    // A failed greeting must not stop later updates
    if let Err(e) = state.greeter.on_join(&event).await {
        warn!("Welcome flow failed in chat {}: {}", event.chat_id, e);
    }

    Ok(())
}
