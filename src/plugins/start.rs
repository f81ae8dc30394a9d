//! /start command plugin.
//!
//! Plain start, the help deep link and the external verification link.

use teloxide::prelude::*;

use super::help::send_help_menu;
use super::reply_html;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::greeting::{Member, VerificationError};
use crate::i18n::{get_text, get_text_with};
use crate::utils::html_escape;

/// Handle the /start command.
pub async fn start_handler(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    let args = args.trim();

    if msg.chat.is_private() {
        if let Some(chat_id) = args
            .strip_prefix("verify_")
            .and_then(|chat| chat.parse::<i64>().ok())
        {
            return verify_deeplink(&bot, &msg, &state, chat_id).await;
        }
        if args == "help" {
            return send_help_menu(&bot, msg.chat.id, &state.locale).await;
        }
    }

    let text = if msg.chat.is_private() {
        let name = msg
            .from
            .as_ref()
            .map(|u| html_escape(&u.first_name))
            .unwrap_or_default();
        get_text_with(&state.locale, "start.private", &[("name", name.as_str())])
    } else {
        get_text(&state.locale, "start.group")
    };

    reply_html(&bot, &msg, text).await
}

/// `/start verify_<chat>` opened from a welcome's verification link.
async fn verify_deeplink(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    chat_id: i64,
) -> anyhow::Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let result = state
        .greeter
        .verify_via_link(chat_id, &Member::from(user))
        .await;

    reply_html(bot, msg, verification_text(&state.locale, result)).await
}

/// Localized answer for a verification attempt.
pub(crate) fn verification_text(locale: &str, result: Result<(), VerificationError>) -> String {
    match result {
        Ok(()) => get_text(locale, "verification.verified"),
        Err(VerificationError::WrongUser) => get_text(locale, "verification.not_for_you"),
        Err(VerificationError::AlreadyVerified) => {
            get_text(locale, "verification.already_verified")
        }
        Err(VerificationError::RestrictionUnavailable) => {
            get_text(locale, "verification.cannot_restrict")
        }
        Err(VerificationError::LiftFailed(reason)) => {
            get_text_with(locale, "verification.error", &[("reason", reason.as_str())])
        }
    }
}
