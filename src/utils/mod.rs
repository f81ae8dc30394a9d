//! Utility functions.
//!
//! Collection of helper functions used across the bot.

pub mod parser;

pub use parser::{format_duration, html_escape, parse_duration};

/// HTML link that mentions a user by id.
pub fn mention_html(user_id: u64, name: &str) -> String {
    format!("<a href=\"tg://user?id={}\">{}</a>", user_id, html_escape(name))
}

/// Arguments after the command word, trimmed.
pub fn command_args(text: &str) -> &str {
    text.split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args() {
        assert_eq!(command_args("/welcome noformat"), "noformat");
        assert_eq!(command_args("/setwelcome  Hi {first}\nthere"), "Hi {first}\nthere");
        assert_eq!(command_args("/welcome"), "");
    }
}
