//! Join, leave and verification-click flows.
//!
//! `Greeter` loads the chat's settings, renders the greeting, lets the
//! verification gate add its control, delivers, then cleans up the previous
//! welcome.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::buttons::{self, Keyboard};
use super::client::{ChatClient, Member, MessageId, Outgoing, PermissionOracle};
use super::delivery::{DeliveryOutcome, DeliveryRequest, Dispatcher};
use super::error::{TemplateError, VerificationError};
use super::store::{GreetingStore, VerificationStore};
use super::template::{self, Placeholders};
use super::verification::VerificationGate;
use crate::database::{CleanWelcome, GreetingMessage, GreetingSettings};
use crate::i18n;
use crate::utils::html_escape;

/// Which greeting a flow works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreetingKind {
    Welcome,
    Goodbye,
}

impl GreetingKind {
    fn default_key(self) -> &'static str {
        match self {
            Self::Welcome => "greeting.default_welcome",
            Self::Goodbye => "greeting.default_goodbye",
        }
    }

    pub fn pick(self, settings: &GreetingSettings) -> &GreetingMessage {
        match self {
            Self::Welcome => &settings.welcome,
            Self::Goodbye => &settings.goodbye,
        }
    }

    pub fn pick_mut(self, settings: &mut GreetingSettings) -> &mut GreetingMessage {
        match self {
            Self::Welcome => &mut settings.welcome,
            Self::Goodbye => &mut settings.goodbye,
        }
    }
}

/// Service message announcing new members.
#[derive(Debug, Clone)]
pub struct JoinEvent {
    pub chat_id: i64,
    pub chat_title: String,
    pub service_message_id: MessageId,
    pub members: Vec<Member>,
}

/// Service message announcing a departure.
#[derive(Debug, Clone)]
pub struct LeaveEvent {
    pub chat_id: i64,
    pub chat_title: String,
    pub service_message_id: MessageId,
    pub member: Member,
}

/// A press of a verification button.
#[derive(Debug, Clone)]
pub struct ClickEvent {
    pub chat_id: i64,
    pub chat_title: String,
    /// Greeting carrying the button
    pub message_id: MessageId,
    pub clicker: Member,
    /// User the button was minted for
    pub target: u64,
}

/// Identity and deployment settings the flows need.
#[derive(Debug, Clone)]
pub struct GreeterConfig {
    pub bot_id: u64,
    pub bot_username: String,
    pub owner_ids: Vec<u64>,
    pub log_chat: Option<i64>,
    pub locale: String,
    pub whitelist_only: bool,
}

/// Rendered greeting before the verification control is added.
struct Composed {
    rendered: Result<String, TemplateError>,
    keyboard: Keyboard,
    backup: String,
}

/// Top-level greeting flows.
pub struct Greeter {
    client: Arc<dyn ChatClient>,
    greetings: Arc<dyn GreetingStore>,
    gate: VerificationGate,
    config: GreeterConfig,
}

impl Greeter {
    pub fn new(
        client: Arc<dyn ChatClient>,
        greetings: Arc<dyn GreetingStore>,
        verifications: Arc<dyn VerificationStore>,
        oracle: Arc<dyn PermissionOracle>,
        config: GreeterConfig,
    ) -> Self {
        let gate = VerificationGate::new(client.clone(), verifications, oracle);
        Self {
            client,
            greetings,
            gate,
            config,
        }
    }

    fn text(&self, key: &str) -> String {
        i18n::get_text(&self.config.locale, key)
    }

    fn is_owner(&self, user_id: u64) -> bool {
        self.config.owner_ids.contains(&user_id)
    }

    /// Greet everyone in a join service message.
    pub async fn on_join(&self, event: &JoinEvent) -> anyhow::Result<()> {
        let mut settings = self.greetings.settings(event.chat_id).await?;

        if event.members.iter().any(|m| m.id == self.config.bot_id) {
            return self.on_bot_added(event).await;
        }

        if !settings.welcome.enabled {
            debug!("Welcome disabled in chat {}", event.chat_id);
            return Ok(());
        }

        let reply_to = self.clean_service(&settings, event.chat_id, event.service_message_id).await;

        for member in &event.members {
            if self.is_owner(member.id) {
                let msg = Outgoing::text(event.chat_id, self.text("greeting.owner_join"))
                    .reply_to(reply_to);
                if let Err(e) = self.client.send(msg).await {
                    debug!("Owner welcome failed in {}: {}", event.chat_id, e);
                }
                continue;
            }

            let composed = self
                .compose(event.chat_id, &event.chat_title, member, &settings.welcome, GreetingKind::Welcome)
                .await;
            let mut keyboard = composed.keyboard;

            match self
                .gate
                .on_join(event.chat_id, member, &self.config.bot_username, &self.config.locale)
                .await
            {
                Ok(Some(control)) => keyboard.push_row(control),
                Ok(None) => {}
                Err(e) => warn!("Verification skipped for {} in {}: {}", member.id, event.chat_id, e),
            }

            let request = DeliveryRequest {
                chat_id: event.chat_id,
                kind: settings.welcome.content_type.media_kind(),
                file_id: settings.welcome.content.clone(),
                rendered: composed.rendered,
                keyboard,
                reply_to,
                backup: composed.backup,
            };
            match self.dispatch(request).await {
                DeliveryOutcome::Sent(id) => {
                    self.cleanup_previous(&settings, id).await;
                    if settings.clean_welcome.is_enabled() {
                        settings.clean_welcome = CleanWelcome::Previous(id);
                    }
                }
                DeliveryOutcome::LeaveChat => return Ok(()),
                DeliveryOutcome::Dropped => {}
            }
        }

        Ok(())
    }

    /// Say goodbye to a member who left.
    pub async fn on_leave(&self, event: &LeaveEvent) -> anyhow::Result<()> {
        if event.member.id == self.config.bot_id {
            return Ok(());
        }

        let settings = self.greetings.settings(event.chat_id).await?;
        if !settings.goodbye.enabled {
            return Ok(());
        }

        let reply_to = self.clean_service(&settings, event.chat_id, event.service_message_id).await;

        if self.is_owner(event.member.id) {
            let msg = Outgoing::text(event.chat_id, self.text("greeting.owner_leave")).reply_to(reply_to);
            if let Err(e) = self.client.send(msg).await {
                debug!("Owner goodbye failed in {}: {}", event.chat_id, e);
            }
            return Ok(());
        }

        let composed = self
            .compose(event.chat_id, &event.chat_title, &event.member, &settings.goodbye, GreetingKind::Goodbye)
            .await;
        let request = DeliveryRequest {
            chat_id: event.chat_id,
            kind: settings.goodbye.content_type.media_kind(),
            file_id: settings.goodbye.content.clone(),
            rendered: composed.rendered,
            keyboard: composed.keyboard,
            reply_to,
            backup: composed.backup,
        };
        self.dispatch(request).await;
        Ok(())
    }

    /// Verify a member and strip the control from their welcome.
    pub async fn on_verify_click(&self, event: &ClickEvent) -> Result<(), VerificationError> {
        self.gate
            .on_click(event.chat_id, event.clicker.id, event.target)
            .await?;

        let settings = match self.greetings.settings(event.chat_id).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Could not reload greeting for chat {}: {}", event.chat_id, e);
                return Ok(());
            }
        };

        let welcome = &settings.welcome;
        let composed = self
            .compose(event.chat_id, &event.chat_title, &event.clicker, welcome, GreetingKind::Welcome)
            .await;
        let text = composed.rendered.unwrap_or(composed.backup);

        let kind = welcome.content_type.media_kind();
        let result = if welcome.content_type.is_text() {
            self.client
                .edit_text(event.chat_id, event.message_id, text, composed.keyboard)
                .await
        } else if kind.takes_caption() {
            self.client
                .edit_caption(event.chat_id, event.message_id, text, composed.keyboard)
                .await
        } else {
            self.client
                .edit_keyboard(event.chat_id, event.message_id, composed.keyboard)
                .await
        };
        if let Err(e) = result {
            debug!("Could not update verified greeting in {}: {}", event.chat_id, e);
        }
        Ok(())
    }

    /// Verify through the external link. The sender is always the subject
    /// and there is no greeting to edit.
    pub async fn verify_via_link(&self, chat_id: i64, user: &Member) -> Result<(), VerificationError> {
        self.gate.on_click(chat_id, user.id, user.id).await
    }

    /// Send a greeting to the chat as it would appear, or raw with
    /// `noformat`.
    pub async fn preview(
        &self,
        chat_id: i64,
        chat_title: &str,
        requester: &Member,
        kind: GreetingKind,
        noformat: bool,
        reply_to: Option<MessageId>,
    ) -> anyhow::Result<()> {
        let settings = self.greetings.settings(chat_id).await?;
        let greeting = kind.pick(&settings);

        if noformat {
            let raw = raw_greeting(greeting, &self.text(kind.default_key()));
            let msg = match (&greeting.content, greeting.content_type.is_text()) {
                (Some(file_id), false) => Outgoing::media(
                    chat_id,
                    greeting.content_type.media_kind(),
                    file_id.clone(),
                    html_escape(&raw),
                ),
                _ => Outgoing::text(chat_id, html_escape(&raw)),
            };
            self.client.send(msg.reply_to(reply_to)).await?;
            return Ok(());
        }

        let composed = self.compose(chat_id, chat_title, requester, greeting, kind).await;
        let request = DeliveryRequest {
            chat_id,
            kind: greeting.content_type.media_kind(),
            file_id: greeting.content.clone(),
            rendered: composed.rendered,
            keyboard: composed.keyboard,
            reply_to,
            backup: composed.backup,
        };
        self.dispatch(request).await;
        Ok(())
    }

    async fn compose(
        &self,
        chat_id: i64,
        chat_title: &str,
        member: &Member,
        greeting: &GreetingMessage,
        kind: GreetingKind,
    ) -> Composed {
        let default = self.text(kind.default_key());
        let backup = template::render(&default, &Placeholders::first_only(member))
            .unwrap_or_else(|_| html_escape(&default));

        let Some(custom) = greeting.template.as_deref() else {
            return if greeting.content_type.is_text() {
                Composed {
                    rendered: Ok(backup.clone()),
                    keyboard: Keyboard::default(),
                    backup,
                }
            } else {
                Composed {
                    rendered: Ok(String::new()),
                    keyboard: buttons::compile(&greeting.buttons, chat_id, &self.config.bot_username),
                    backup,
                }
            };
        };

        let count = match self.client.member_count(chat_id).await {
            Ok(count) => count,
            Err(e) => {
                debug!("Member count unavailable for {}: {}", chat_id, e);
                0
            }
        };
        let rules = buttons::rules_link(&self.config.bot_username, chat_id);
        let values = Placeholders::for_member(member, chat_title, count, &rules);

        Composed {
            rendered: template::render(custom, &values),
            keyboard: buttons::compile(&greeting.buttons, chat_id, &self.config.bot_username),
            backup,
        }
    }

    /// Deliver, leaving the chat if the bot may not post there.
    async fn dispatch(&self, request: DeliveryRequest) -> DeliveryOutcome {
        let chat_id = request.chat_id;
        let outcome = Dispatcher::new(self.client.as_ref(), &self.config.locale)
            .deliver(request)
            .await;

        if outcome == DeliveryOutcome::LeaveChat {
            info!("No rights to post in chat {}, leaving", chat_id);
            if let Err(e) = self.client.leave_chat(chat_id).await {
                warn!("Failed to leave chat {}: {}", chat_id, e);
            }
        }
        outcome
    }

    /// Delete the service message when asked to. Returns the reply
    /// reference the greeting should use.
    async fn clean_service(
        &self,
        settings: &GreetingSettings,
        chat_id: i64,
        service_message_id: MessageId,
    ) -> Option<MessageId> {
        if !settings.clean_service {
            return Some(service_message_id);
        }
        if let Err(e) = self.client.delete_message(chat_id, service_message_id).await {
            debug!("Could not delete service message in {}: {}", chat_id, e);
        }
        None
    }

    /// Delete the tracked welcome and track `sent` in its place.
    async fn cleanup_previous(&self, settings: &GreetingSettings, sent: MessageId) {
        let chat_id = settings.chat_id;

        if let CleanWelcome::Previous(previous) = settings.clean_welcome
            && let Err(e) = self.client.delete_message(chat_id, previous).await
        {
            debug!("Previous welcome {} in {} already gone: {}", previous, chat_id, e);
        }

        if settings.clean_welcome.is_enabled()
            && let Err(e) = self
                .greetings
                .set_clean_welcome(chat_id, CleanWelcome::Previous(sent))
                .await
        {
            warn!("Failed to track welcome {} in {}: {}", sent, chat_id, e);
        }
    }

    async fn on_bot_added(&self, event: &JoinEvent) -> anyhow::Result<()> {
        let title = html_escape(&event.chat_title);
        let id = event.chat_id.to_string();
        let args = [("title", title.as_str()), ("id", id.as_str())];

        if self.config.whitelist_only && !self.greetings.is_whitelisted(event.chat_id).await? {
            info!("Chat {} is not whitelisted, leaving", event.chat_id);
            self.client.leave_chat(event.chat_id).await?;
            self.notify_log_chat("greeting.left_unlisted", &args).await;
            return Ok(());
        }

        self.notify_log_chat("greeting.bot_added", &args).await;
        let thanks = Outgoing::text(event.chat_id, self.text("greeting.thanks_for_adding"));
        if let Err(e) = self.client.send(thanks).await {
            debug!("Could not greet chat {}: {}", event.chat_id, e);
        }
        Ok(())
    }

    /// Post a notice to the operator chat, if one is configured.
    pub async fn notify_log_chat(&self, key: &str, args: &[(&str, &str)]) {
        let Some(log_chat) = self.config.log_chat else {
            return;
        };
        let text = i18n::get_text_with(&self.config.locale, key, args);
        if let Err(e) = self.client.send(Outgoing::text(log_chat, text)).await {
            warn!("Failed to notify log chat: {}", e);
        }
    }

    pub async fn leave_chat(&self, chat_id: i64) -> anyhow::Result<()> {
        self.client.leave_chat(chat_id).await?;
        Ok(())
    }
}

/// Stored template plus its buttons written back inline.
pub fn raw_greeting(greeting: &GreetingMessage, default: &str) -> String {
    let text = greeting.template.as_deref().unwrap_or(if greeting.content_type.is_text() {
        default
    } else {
        ""
    });
    format!("{}{}", text, buttons::revert(&greeting.buttons))
}
