//! Goodbye event handler.

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, warn};

use crate::bot::AppState;
use crate::greeting::{LeaveEvent, Member};

/// Returns the handler for `left_chat_member` service messages.
pub fn handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| msg.left_chat_member().is_some()).endpoint(bye_handler)
}

async fn bye_handler(msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(user) = msg.left_chat_member() else {
        return Ok(());
    };

    debug!("Member {} left chat {}", user.id, msg.chat.id);

    let event = LeaveEvent {
        chat_id: msg.chat.id.0,
        chat_title: msg.chat.title().unwrap_or_default().to_string(),
        service_message_id: msg.id.0,
        member: Member::from(user),
    };

    if let Err(e) = state.greeter.on_leave(&event).await {
        warn!("Goodbye flow failed in chat {}: {}", event.chat_id, e);
    }

    Ok(())
}
