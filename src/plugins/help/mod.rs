//! Help command module.
//!
//! Handles /help, /welcomehelp and the `help:*` callbacks of the
//! interactive help menu.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, ReplyParameters};
use url::Url;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;

mod main_help;
mod welcome;

/// Handle /help command.
pub async fn help_handler(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;

    // In groups, redirect to PM
    if msg.chat.is_group() || msg.chat.is_supergroup() {
        let pm_url = Url::parse(&format!("https://t.me/{}?start=help", state.bot_username))?;
        let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
            get_text(&state.locale, "help.pm_btn"),
            pm_url,
        )]]);

        bot.send_message(chat_id, get_text(&state.locale, "help.redirect_pm"))
            .reply_parameters(ReplyParameters::new(msg.id))
            .reply_markup(keyboard)
            .await?;
        return Ok(());
    }

    send_help_menu(&bot, chat_id, &state.locale).await
}

/// Handle /welcomehelp - formatting help, shown wherever it was asked.
pub async fn welcomehelp_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, welcome::get_text(&state.locale, &state.bot_username))
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

/// Send the main help menu.
pub async fn send_help_menu(bot: &ThrottledBot, chat_id: ChatId, locale: &str) -> anyhow::Result<()> {
    bot.send_message(chat_id, main_help::get_text(locale))
        .parse_mode(ParseMode::Html)
        .reply_markup(main_help::get_keyboard(locale))
        .await?;

    Ok(())
}

/// Handle help callback queries (help:*).
pub async fn callback_handler(
    bot: ThrottledBot,
    q: CallbackQuery,
    state: AppState,
) -> anyhow::Result<()> {
    let Some(part) = q.data.as_deref().and_then(|d| d.strip_prefix("help:")) else {
        return Ok(());
    };

    let locale = state.locale.as_str();
    let (text, keyboard) = match part {
        "main" | "back" => (main_help::get_text(locale), main_help::get_keyboard(locale)),
        "welcome" => (
            welcome::get_text(locale, &state.bot_username),
            welcome::get_keyboard(locale),
        ),
        _ => return Ok(()),
    };

    if let Some(msg) = &q.message {
        bot.edit_message_text(msg.chat().id, msg.id(), text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await?;
    }

    bot.answer_callback_query(q.id).await?;
    Ok(())
}
