//! Chat whitelist, owner only.
//!
//! With `WHITELIST_ONLY` set the bot leaves any group not listed here.

use teloxide::prelude::*;
use tracing::{debug, error, info};

use super::reply_html;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::greeting::GreetingStore;
use crate::i18n::{get_text, get_text_with};
use crate::utils::{command_args, mention_html};

/// Handle /whchat [chat_id].
pub async fn whchat_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    update_whitelist(bot, msg, state, true).await
}

/// Handle /unwhchat [chat_id]. Also leaves the chat.
pub async fn unwhchat_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    update_whitelist(bot, msg, state, false).await
}

/// Explicit id, or the current group when none is given.
fn target_chat(args: &str, msg: &Message) -> Option<i64> {
    if args.is_empty() {
        return (!msg.chat.is_private()).then_some(msg.chat.id.0);
    }
    args.split_whitespace().next()?.parse().ok()
}

async fn update_whitelist(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    allowed: bool,
) -> anyhow::Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let locale = state.locale.as_str();

    if !state.is_owner(user.id.0) {
        return reply_html(&bot, &msg, get_text(locale, "common.owner_only")).await;
    }

    let Some(chat_id) = target_chat(command_args(msg.text().unwrap_or("")), &msg) else {
        return reply_html(&bot, &msg, get_text(locale, "whitelist.usage")).await;
    };
    let id = chat_id.to_string();

    let changed = match state.greetings.set_whitelisted(chat_id, user.id.0, allowed).await {
        Ok(changed) => changed,
        Err(e) => {
            error!("Whitelist update for {} failed: {}", chat_id, e);
            return reply_html(&bot, &msg, get_text(locale, "whitelist.failed")).await;
        }
    };

    if !changed {
        let key = if allowed { "whitelist.already" } else { "whitelist.not_listed" };
        return reply_html(&bot, &msg, get_text(locale, key)).await;
    }

    info!("Chat {} whitelisted={} by {}", chat_id, allowed, user.id);
    let (done, log) = if allowed {
        ("whitelist.added", "whitelist.log_added")
    } else {
        ("whitelist.removed", "whitelist.log_removed")
    };
    reply_html(&bot, &msg, get_text_with(locale, done, &[("id", id.as_str())])).await?;

    let admin = mention_html(user.id.0, &user.first_name);
    state
        .greeter
        .notify_log_chat(log, &[("admin", admin.as_str()), ("id", id.as_str())])
        .await;

    if !allowed
        && let Err(e) = state.greeter.leave_chat(chat_id).await
    {
        debug!("Could not leave un-whitelisted chat {}: {}", chat_id, e);
    }

    Ok(())
}
