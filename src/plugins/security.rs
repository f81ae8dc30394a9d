//! Welcome security: mute new members until they verify.
//!
//! Policy commands plus the verification button callback.

use teloxide::prelude::*;
use tracing::{debug, info};

use super::start::verification_text;
use super::{ensure_group_admin, parse_toggle, reply_html};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{MuteDuration, VerificationPolicy};
use crate::greeting::{ClickEvent, Member, VerificationStore, parse_callback};
use crate::i18n::{get_text, get_text_with};
use crate::utils::{command_args, format_duration, html_escape, parse_duration};

/// Parsed `<0|duration>` argument.
#[derive(Debug, PartialEq, Eq)]
enum DurationArg {
    Zero,
    Secs(u64),
    Invalid,
}

/// Longest mute or timeout an admin can set.
const MAX_DURATION_SECS: u64 = 366 * 86400;

fn parse_duration_arg(arg: &str) -> DurationArg {
    if arg.trim() == "0" {
        return DurationArg::Zero;
    }
    match parse_duration(arg).map(|d| d.as_secs()) {
        Some(secs) if (1..=MAX_DURATION_SECS).contains(&secs) => DurationArg::Secs(secs),
        _ => DurationArg::Invalid,
    }
}

fn on_off(locale: &str, value: bool) -> String {
    get_text(locale, if value { "common.active" } else { "common.inactive" })
}

fn button_label(locale: &str, policy: &VerificationPolicy) -> String {
    policy
        .button_label
        .clone()
        .unwrap_or_else(|| get_text(locale, "verification.button"))
}

/// Current policy, one setting per line.
fn policy_summary(locale: &str, policy: &VerificationPolicy) -> String {
    let mute = on_off(locale, policy.enabled);
    let verify = on_off(locale, policy.require_external_verify_link);
    let duration = match policy.mute_duration {
        MuteDuration::Forever => get_text(locale, "common.forever"),
        MuteDuration::For(secs) => format_duration(secs),
    };
    let timeout = if policy.timeout_secs == 0 {
        on_off(locale, false)
    } else {
        format_duration(policy.timeout_secs)
    };
    let action = get_text(locale, "security.timeout_action");
    let button = html_escape(&button_label(locale, policy));

    get_text_with(
        locale,
        "security.summary",
        &[
            ("mute", mute.as_str()),
            ("verify", verify.as_str()),
            ("duration", duration.as_str()),
            ("timeout", timeout.as_str()),
            ("action", action.as_str()),
            ("button", button.as_str()),
        ],
    )
}

/// Handle /welcomemute [on|off].
pub async fn welcomemute_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let chat_id = msg.chat.id;
    let locale = state.locale.as_str();
    let arg = command_args(msg.text().unwrap_or(""));
    let mut policy = state.verifications.policy(chat_id.0).await?;

    if arg.is_empty() {
        return reply_html(&bot, &msg, policy_summary(locale, &policy)).await;
    }

    let Some(enabled) = parse_toggle(arg) else {
        return reply_html(&bot, &msg, get_text(locale, "security.usage")).await;
    };

    if enabled
        && !state
            .permissions
            .bot_can_restrict(chat_id)
            .await
            .unwrap_or(false)
    {
        return reply_html(&bot, &msg, get_text(locale, "security.cannot_restrict")).await;
    }

    policy.enabled = enabled;
    state.verifications.save_policy(&policy).await?;
    info!("Welcome security {} in chat {}", enabled, chat_id);

    let key = if enabled { "security.enabled" } else { "security.disabled" };
    reply_html(&bot, &msg, get_text(locale, key)).await
}

/// Handle /welcomemutetime [0|duration].
pub async fn welcomemutetime_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let locale = state.locale.as_str();
    let arg = command_args(msg.text().unwrap_or(""));
    let mut policy = state.verifications.policy(msg.chat.id.0).await?;

    let text = if arg.is_empty() {
        match policy.mute_duration {
            MuteDuration::Forever => get_text(locale, "security.mutetime_status_forever"),
            MuteDuration::For(secs) => {
                let duration = format_duration(secs);
                get_text_with(locale, "security.mutetime_status", &[("duration", duration.as_str())])
            }
        }
    } else {
        match parse_duration_arg(arg) {
            DurationArg::Invalid => get_text(locale, "security.mutetime_invalid"),
            DurationArg::Zero => {
                policy.mute_duration = MuteDuration::Forever;
                state.verifications.save_policy(&policy).await?;
                get_text(locale, "security.mutetime_forever")
            }
            DurationArg::Secs(secs) => {
                policy.mute_duration = MuteDuration::For(secs);
                state.verifications.save_policy(&policy).await?;
                let duration = format_duration(secs);
                get_text_with(locale, "security.mutetime_set", &[("duration", duration.as_str())])
            }
        }
    };

    reply_html(&bot, &msg, text).await
}

/// Handle /setmutetext <text>.
pub async fn setmutetext_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let locale = state.locale.as_str();
    let arg = command_args(msg.text().unwrap_or(""));
    let mut policy = state.verifications.policy(msg.chat.id.0).await?;

    if arg.is_empty() {
        let current = html_escape(&button_label(locale, &policy));
        return reply_html(
            &bot,
            &msg,
            get_text_with(locale, "security.button_status", &[("text", current.as_str())]),
        )
        .await;
    }

    policy.button_label = Some(arg.to_string());
    state.verifications.save_policy(&policy).await?;

    let label = html_escape(arg);
    reply_html(
        &bot,
        &msg,
        get_text_with(locale, "security.button_set", &[("text", label.as_str())]),
    )
    .await
}

/// Handle /resetmutetext.
pub async fn resetmutetext_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let locale = state.locale.as_str();
    let mut policy = state.verifications.policy(msg.chat.id.0).await?;
    policy.button_label = None;
    state.verifications.save_policy(&policy).await?;

    let label = html_escape(&button_label(locale, &policy));
    reply_html(
        &bot,
        &msg,
        get_text_with(locale, "security.button_reset", &[("text", label.as_str())]),
    )
    .await
}

/// Handle /welcomeverify [on|off].
pub async fn welcomeverify_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let locale = state.locale.as_str();
    let arg = command_args(msg.text().unwrap_or(""));
    let mut policy = state.verifications.policy(msg.chat.id.0).await?;

    if arg.is_empty() {
        return reply_html(&bot, &msg, policy_summary(locale, &policy)).await;
    }

    let Some(external) = parse_toggle(arg) else {
        return reply_html(&bot, &msg, get_text(locale, "security.usage")).await;
    };

    policy.require_external_verify_link = external;
    state.verifications.save_policy(&policy).await?;

    let key = if external { "security.verify_on" } else { "security.verify_off" };
    reply_html(&bot, &msg, get_text(locale, key)).await
}

/// Handle /welcometimeout [0|duration].
pub async fn welcometimeout_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    if !ensure_group_admin(&bot, &msg, &state).await? {
        return Ok(());
    }
    let locale = state.locale.as_str();
    let arg = command_args(msg.text().unwrap_or(""));
    let mut policy = state.verifications.policy(msg.chat.id.0).await?;

    let text = match (arg.is_empty(), parse_duration_arg(arg)) {
        (true, _) => policy_summary(locale, &policy),
        (false, DurationArg::Invalid) => get_text(locale, "security.timeout_invalid"),
        (false, DurationArg::Zero) => {
            policy.timeout_secs = 0;
            state.verifications.save_policy(&policy).await?;
            get_text(locale, "security.timeout_off")
        }
        (false, DurationArg::Secs(secs)) => {
            policy.timeout_secs = secs;
            state.verifications.save_policy(&policy).await?;
            let duration = format_duration(secs);
            get_text_with(locale, "security.timeout_set", &[("duration", duration.as_str())])
        }
    };

    reply_html(&bot, &msg, text).await
}

/// Handle a press of a verification button (`verify:<user>`).
pub async fn verify_callback_handler(
    bot: ThrottledBot,
    q: CallbackQuery,
    state: AppState,
) -> anyhow::Result<()> {
    let target = q.data.as_deref().and_then(parse_callback);
    let (Some(target), Some(message)) = (target, q.message.as_ref()) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let event = ClickEvent {
        chat_id: message.chat().id.0,
        chat_title: message.chat().title().unwrap_or_default().to_string(),
        message_id: message.id().0,
        clicker: Member::from(&q.from),
        target,
    };

    let result = state.greeter.on_verify_click(&event).await;
    if let Err(e) = &result {
        debug!("Verification click by {} in {} rejected: {}", q.from.id, event.chat_id, e);
    }

    bot.answer_callback_query(q.id)
        .text(verification_text(&state.locale, result))
        .show_alert(true)
        .await?;
    Ok(())
}
