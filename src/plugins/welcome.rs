//! Welcome and goodbye command handlers.
//!
//! Commands for configuring greetings in groups. Both greetings share the
//! same handlers, picked by `GreetingKind`.

use teloxide::prelude::*;
use tracing::info;

use super::{ensure_group_admin, parse_toggle, reply_html};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{CapturedContent, CleanWelcome, ContentType, MuteDuration};
use crate::greeting::buttons::parse_buttons;
use crate::greeting::{GreetingKind, GreetingStore, Member, VerificationStore};
use crate::i18n::{get_text, get_text_with};
use crate::utils::{command_args, format_duration, html_escape};

/// Handle /welcome - show status and preview, or toggle.
pub async fn welcome_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    greeting_command(bot, msg, state, GreetingKind::Welcome).await
}

/// Handle /goodbye - show status and preview, or toggle.
pub async fn goodbye_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    greeting_command(bot, msg, state, GreetingKind::Goodbye).await
}

/// Handle /setwelcome - from a replied message or the command text.
pub async fn setwelcome_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    set_greeting(bot, msg, state, GreetingKind::Welcome).await
}

/// Handle /setgoodbye.
pub async fn setgoodbye_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    set_greeting(bot, msg, state, GreetingKind::Goodbye).await
}

pub async fn resetwelcome_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    reset_greeting(bot, msg, state, GreetingKind::Welcome).await
}

pub async fn resetgoodbye_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    reset_greeting(bot, msg, state, GreetingKind::Goodbye).await
}

fn prefix(kind: GreetingKind) -> &'static str {
    match kind {
        GreetingKind::Welcome => "welcome",
        GreetingKind::Goodbye => "goodbye",
    }
}

fn on_off(locale: &str, value: bool) -> String {
    get_text(locale, if value { "common.active" } else { "common.inactive" })
}

async fn greeting_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    kind: GreetingKind,
) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id.0;
    let locale = state.locale.as_str();
    let arg = command_args(msg.text().unwrap_or(""));

    if arg.is_empty() || arg.eq_ignore_ascii_case("noformat") {
        let status = status_text(&state, chat_id, kind).await?;
        reply_html(&bot, &msg, status).await?;

        let Some(user) = msg.from.as_ref() else {
            return Ok(());
        };
        state
            .greeter
            .preview(
                chat_id,
                msg.chat.title().unwrap_or_default(),
                &Member::from(user),
                kind,
                !arg.is_empty(),
                Some(msg.id.0),
            )
            .await?;
        return Ok(());
    }

    let Some(enabled) = parse_toggle(arg) else {
        return reply_html(&bot, &msg, get_text(locale, "common.toggle_usage")).await;
    };

    let mut settings = state.greetings.settings(chat_id).await?;
    kind.pick_mut(&mut settings).enabled = enabled;
    state.greetings.save_settings(&settings).await?;

    let key = if enabled { "enabled" } else { "disabled" };
    reply_html(&bot, &msg, get_text(locale, &format!("{}.{}", prefix(kind), key))).await
}

/// Settings header shown above the preview.
async fn status_text(state: &AppState, chat_id: i64, kind: GreetingKind) -> anyhow::Result<String> {
    let locale = state.locale.as_str();
    let settings = state.greetings.settings(chat_id).await?;
    let enabled = on_off(locale, kind.pick(&settings).enabled);

    if kind == GreetingKind::Goodbye {
        return Ok(get_text_with(locale, "goodbye.status", &[("enabled", enabled.as_str())]));
    }

    let policy = state.verifications.policy(chat_id).await?;
    let mute = if !policy.enabled {
        on_off(locale, false)
    } else {
        match policy.mute_duration {
            MuteDuration::Forever => get_text(locale, "welcome.mute_forever"),
            MuteDuration::For(secs) => {
                let duration = format_duration(secs);
                get_text_with(locale, "welcome.mute_for", &[("duration", duration.as_str())])
            }
        }
    };
    let button = policy
        .button_label
        .clone()
        .unwrap_or_else(|| get_text(locale, "verification.button"));

    let clean_welcome = on_off(locale, settings.clean_welcome.is_enabled());
    let clean_service = on_off(locale, settings.clean_service);
    let verify = on_off(locale, policy.require_external_verify_link);
    let button = html_escape(&button);

    Ok(get_text_with(
        locale,
        "welcome.status",
        &[
            ("enabled", enabled.as_str()),
            ("clean_welcome", clean_welcome.as_str()),
            ("clean_service", clean_service.as_str()),
            ("mute", mute.as_str()),
            ("verify", verify.as_str()),
            ("button", button.as_str()),
        ],
    ))
}

async fn set_greeting(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    kind: GreetingKind,
) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let locale = state.locale.as_str();
    let args = command_args(msg.text().unwrap_or(""));

    let captured = match msg.reply_to_message() {
        Some(reply) => {
            let text = reply.text().or(reply.caption()).unwrap_or(args);
            capture_content(text, media_of(reply))
        }
        None if args.is_empty() => {
            return reply_html(&bot, &msg, get_text(locale, "welcome.set_nothing")).await;
        }
        None => capture_content(args, None),
    };

    let Some(captured) = captured else {
        return reply_html(&bot, &msg, get_text(locale, "welcome.set_empty")).await;
    };

    let chat_id = msg.chat.id.0;
    let content_type = captured.content_type;
    let mut settings = state.greetings.settings(chat_id).await?;
    kind.pick_mut(&mut settings).set_content(captured);
    state.greetings.save_settings(&settings).await?;

    info!("Custom {} ({}) set in chat {}", prefix(kind), content_type.label(), chat_id);
    reply_html(&bot, &msg, get_text(locale, &format!("{}.set_done", prefix(kind)))).await
}

async fn reset_greeting(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    kind: GreetingKind,
) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id.0;
    let mut settings = state.greetings.settings(chat_id).await?;
    kind.pick_mut(&mut settings).reset();
    state.greetings.save_settings(&settings).await?;

    info!("Reset {} in chat {}", prefix(kind), chat_id);
    reply_html(&bot, &msg, get_text(&state.locale, &format!("{}.reset_done", prefix(kind)))).await
}

/// Handle /cleanwelcome [on|off].
pub async fn cleanwelcome_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id.0;
    let locale = state.locale.as_str();
    let arg = command_args(msg.text().unwrap_or(""));
    let current = state.greetings.settings(chat_id).await?.clean_welcome;

    if arg.is_empty() {
        let key = if current.is_enabled() {
            "welcome.clean_status_on"
        } else {
            "welcome.clean_status_off"
        };
        return reply_html(&bot, &msg, get_text(locale, key)).await;
    }

    let (next, key) = match parse_toggle(arg) {
        // Keep tracking an existing welcome
        Some(true) if current.is_enabled() => (current, "welcome.clean_on"),
        Some(true) => (CleanWelcome::Armed, "welcome.clean_on"),
        Some(false) => (CleanWelcome::Disabled, "welcome.clean_off"),
        None => return reply_html(&bot, &msg, get_text(locale, "common.toggle_usage")).await,
    };

    state.greetings.set_clean_welcome(chat_id, next).await?;
    reply_html(&bot, &msg, get_text(locale, key)).await
}

/// Handle /cleanservice [on|off].
pub async fn cleanservice_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id.0;
    let locale = state.locale.as_str();
    let arg = command_args(msg.text().unwrap_or(""));
    let mut settings = state.greetings.settings(chat_id).await?;

    if arg.is_empty() {
        let key = if settings.clean_service {
            "welcome.service_status_on"
        } else {
            "welcome.service_status_off"
        };
        return reply_html(&bot, &msg, get_text(locale, key)).await;
    }

    let Some(clean) = parse_toggle(arg) else {
        return reply_html(&bot, &msg, get_text(locale, "welcome.service_usage")).await;
    };

    settings.clean_service = clean;
    state.greetings.save_settings(&settings).await?;

    let key = if clean { "welcome.service_on" } else { "welcome.service_off" };
    reply_html(&bot, &msg, get_text(locale, key)).await
}

/// File id and kind of a replied media message.
fn media_of(msg: &Message) -> Option<(String, ContentType)> {
    if let Some(sticker) = msg.sticker() {
        return Some((sticker.file.id.to_string(), ContentType::Sticker));
    }
    if let Some(photo) = msg.photo() {
        // Largest size
        let largest = photo.iter().max_by_key(|p| p.width * p.height)?;
        return Some((largest.file.id.to_string(), ContentType::Photo));
    }
    if let Some(video) = msg.video() {
        return Some((video.file.id.to_string(), ContentType::Video));
    }
    if let Some(document) = msg.document() {
        return Some((document.file.id.to_string(), ContentType::Document));
    }
    if let Some(audio) = msg.audio() {
        return Some((audio.file.id.to_string(), ContentType::Audio));
    }
    if let Some(voice) = msg.voice() {
        return Some((voice.file.id.to_string(), ContentType::Voice));
    }
    None
}

/// Split buttons out of the text and decide the content type.
///
/// `None` when there is neither text, buttons nor media.
fn capture_content(text: &str, media: Option<(String, ContentType)>) -> Option<CapturedContent> {
    let (text, buttons) = parse_buttons(text);
    let text = text.trim();
    let text = (!text.is_empty()).then(|| text.to_string());

    match media {
        Some((file_id, content_type)) => Some(CapturedContent {
            text,
            file_id: Some(file_id),
            content_type,
            buttons,
        }),
        None if text.is_none() && buttons.is_empty() => None,
        None => Some(CapturedContent {
            content_type: if buttons.is_empty() {
                ContentType::Text
            } else {
                ContentType::ButtonText
            },
            text,
            file_id: None,
            buttons,
        }),
    }
}
