//! Plugin system for command handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding the handler to `command_handler()`

pub mod help;
pub mod security;
pub mod start;
pub mod welcome;
pub mod whitelist;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};
use teloxide::utils::command::BotCommands;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::greeting::parse_callback;
use crate::i18n::get_text;

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start(String),

    #[command(description = "Help")]
    Help,

    // Greeting commands
    #[command(description = "Show or toggle the welcome message")]
    Welcome,

    #[command(description = "Show or toggle the goodbye message")]
    Goodbye,

    #[command(description = "Set the welcome message")]
    Setwelcome,

    #[command(description = "Set the goodbye message")]
    Setgoodbye,

    #[command(description = "Reset the welcome message")]
    Resetwelcome,

    #[command(description = "Reset the goodbye message")]
    Resetgoodbye,

    #[command(description = "Delete the previous welcome")]
    Cleanwelcome,

    #[command(description = "Delete join/leave service messages")]
    Cleanservice,

    #[command(description = "Welcome formatting help")]
    Welcomehelp,

    // Verification commands
    #[command(description = "Mute new members until they verify")]
    Welcomemute,

    #[command(description = "How long new members stay muted")]
    Welcomemutetime,

    #[command(description = "Set the verification button text")]
    Setmutetext,

    #[command(description = "Reset the verification button text")]
    Resetmutetext,

    #[command(description = "Verify through a private chat link")]
    Welcomeverify,

    #[command(description = "Time allowed to verify")]
    Welcometimeout,

    // Owner commands
    #[command(description = "Whitelist a chat")]
    Whchat,

    #[command(description = "Remove a chat from the whitelist")]
    Unwhchat,
}

/// Build the combined command handler.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start(args)].endpoint(start::start_handler))
        .branch(case![Command::Help].endpoint(help::help_handler))
        // Greetings
        .branch(case![Command::Welcome].endpoint(welcome::welcome_command))
        .branch(case![Command::Goodbye].endpoint(welcome::goodbye_command))
        .branch(case![Command::Setwelcome].endpoint(welcome::setwelcome_command))
        .branch(case![Command::Setgoodbye].endpoint(welcome::setgoodbye_command))
        .branch(case![Command::Resetwelcome].endpoint(welcome::resetwelcome_command))
        .branch(case![Command::Resetgoodbye].endpoint(welcome::resetgoodbye_command))
        .branch(case![Command::Cleanwelcome].endpoint(welcome::cleanwelcome_command))
        .branch(case![Command::Cleanservice].endpoint(welcome::cleanservice_command))
        .branch(case![Command::Welcomehelp].endpoint(help::welcomehelp_command))
        // Verification
        .branch(case![Command::Welcomemute].endpoint(security::welcomemute_command))
        .branch(case![Command::Welcomemutetime].endpoint(security::welcomemutetime_command))
        .branch(case![Command::Setmutetext].endpoint(security::setmutetext_command))
        .branch(case![Command::Resetmutetext].endpoint(security::resetmutetext_command))
        .branch(case![Command::Welcomeverify].endpoint(security::welcomeverify_command))
        .branch(case![Command::Welcometimeout].endpoint(security::welcometimeout_command))
        // Whitelist
        .branch(case![Command::Whchat].endpoint(whitelist::whchat_command))
        .branch(case![Command::Unwhchat].endpoint(whitelist::unwhchat_command))
}

/// Build the callback query handler.
pub fn callback_handler() -> UpdateHandler<anyhow::Error> {
    Update::filter_callback_query()
        .branch(
            dptree::filter(|q: CallbackQuery| q.data.as_deref().and_then(parse_callback).is_some())
                .endpoint(security::verify_callback_handler),
        )
        .branch(dptree::endpoint(help::callback_handler))
}

/// Reply to a command with HTML text.
pub(crate) async fn reply_html(
    bot: &ThrottledBot,
    msg: &Message,
    text: impl Into<String>,
) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

/// Group-only, admin-only gate shared by the settings commands.
///
/// Replies with the reason and returns `false` when the sender may not
/// change settings here.
pub(crate) async fn ensure_group_admin(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
) -> anyhow::Result<bool> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(false);
    };

    if !msg.chat.is_group() && !msg.chat.is_supergroup() {
        reply_html(bot, msg, get_text(&state.locale, "common.group_only")).await?;
        return Ok(false);
    }

    if !state
        .permissions
        .is_admin(msg.chat.id, user.id)
        .await
        .unwrap_or(false)
    {
        reply_html(bot, msg, get_text(&state.locale, "common.admin_only")).await?;
        return Ok(false);
    }

    Ok(true)
}

/// `on`/`yes` or `off`/`no`, with the Indonesian spellings.
pub(crate) fn parse_toggle(arg: &str) -> Option<bool> {
    match arg.to_lowercase().as_str() {
        "on" | "yes" | "ya" => Some(true),
        "off" | "no" | "ga" | "tidak" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toggle() {
        assert_eq!(parse_toggle("ON"), Some(true));
        assert_eq!(parse_toggle("ya"), Some(true));
        assert_eq!(parse_toggle("no"), Some(false));
        assert_eq!(parse_toggle("tidak"), Some(false));
        assert_eq!(parse_toggle("maybe"), None);
    }

    #[test]
    fn test_commands_parse() {
        assert!(matches!(
            Command::parse("/welcomemutetime 1h", "gatekeeper_bot"),
            Ok(Command::Welcomemutetime)
        ));
        assert!(matches!(
            Command::parse("/start verify_-100", "gatekeeper_bot"),
            Ok(Command::Start(args)) if args == "verify_-100"
        ));
    }
}
