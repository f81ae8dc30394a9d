use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::i18n::get_text as t;

pub fn get_text(locale: &str) -> String {
    t(locale, "help.main")
}

pub fn get_keyboard(locale: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        t(locale, "help.formatting_btn"),
        "help:welcome",
    )]])
}
