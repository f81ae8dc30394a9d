use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::i18n::{get_text as t, get_text_with};

/// Placeholder and button syntax for greetings.
pub fn get_text(locale: &str, bot_username: &str) -> String {
    get_text_with(locale, "help.welcome", &[("bot", bot_username)])
}

pub fn get_keyboard(locale: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        t(locale, "help.back_btn"),
        "help:back",
    )]])
}
