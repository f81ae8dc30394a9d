//! Greeting delivery with graceful degradation.
//!
//! A failed send is matched against an ordered rule table. The first rule
//! that applies decides what happens next: retry the original message
//! without its reply reference, or send the built-in default greeting with
//! a note telling admins what went wrong.

use tracing::{debug, warn};

use super::buttons::Keyboard;
use super::client::{ChatClient, MediaKind, MessageId, Outgoing};
use super::error::{DeliveryError, TemplateError};
use crate::i18n;

/// A rendered greeting on its way out.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub chat_id: i64,
    pub kind: MediaKind,
    pub file_id: Option<String>,
    /// Rendered body or caption, or the reason rendering failed
    pub rendered: Result<String, TemplateError>,
    pub keyboard: Keyboard,
    /// Already cleared by the caller when clean service is on
    pub reply_to: Option<MessageId>,
    /// Built-in default greeting, used by every fallback
    pub backup: String,
}

impl DeliveryRequest {
    fn original(&self, text: &str, reply_to: Option<MessageId>) -> Outgoing {
        let msg = match (self.kind, &self.file_id) {
            (MediaKind::Text, _) | (_, None) => Outgoing::text(self.chat_id, text),
            (kind, Some(file_id)) => Outgoing::media(self.chat_id, kind, file_id.clone(), text),
        };
        msg.keyboard(self.keyboard.clone()).reply_to(reply_to)
    }
}

/// What became of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent(MessageId),
    /// The bot may not post here at all; the caller should leave
    LeaveChat,
    /// Nothing was sent and nothing more should be done
    Dropped,
}

/// Admin-facing note appended to a fallback greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackNote {
    MalformedTemplate,
    InvalidButtonUrl,
    UnsupportedProtocol,
    BadUrls,
    MediaFailed,
    Unknown,
}

impl FallbackNote {
    fn key(self) -> &'static str {
        match self {
            Self::MalformedTemplate => "greeting.note.malformed",
            Self::InvalidButtonUrl => "greeting.note.invalid_url",
            Self::UnsupportedProtocol => "greeting.note.unsupported_protocol",
            Self::BadUrls => "greeting.note.bad_urls",
            Self::MediaFailed => "greeting.note.media_failed",
            Self::Unknown => "greeting.note.unknown",
        }
    }
}

enum Failure {
    Template(TemplateError),
    Delivery(DeliveryError),
}

#[derive(Clone, Copy)]
enum Action {
    RetryWithoutReply,
    Fallback(FallbackNote),
}

struct Rule {
    applies: fn(&Failure) -> bool,
    action: Action,
}

fn is_template(f: &Failure) -> bool {
    matches!(f, Failure::Template(_))
}

fn is_invalid_url(f: &Failure) -> bool {
    matches!(f, Failure::Delivery(DeliveryError::InvalidButtonUrl))
}

fn is_unsupported_protocol(f: &Failure) -> bool {
    matches!(f, Failure::Delivery(DeliveryError::UnsupportedProtocol))
}

fn is_bad_host(f: &Failure) -> bool {
    matches!(f, Failure::Delivery(DeliveryError::BadUrlHost))
}

fn is_reply_missing(f: &Failure) -> bool {
    matches!(f, Failure::Delivery(DeliveryError::ReplyTargetMissing))
}

fn any(_: &Failure) -> bool {
    true
}

/// Text greetings. Order matters; the last rule always applies.
const TEXT_LADDER: [Rule; 6] = [
    Rule { applies: is_template, action: Action::Fallback(FallbackNote::MalformedTemplate) },
    Rule { applies: is_invalid_url, action: Action::Fallback(FallbackNote::InvalidButtonUrl) },
    Rule { applies: is_unsupported_protocol, action: Action::Fallback(FallbackNote::UnsupportedProtocol) },
    Rule { applies: is_bad_host, action: Action::Fallback(FallbackNote::BadUrls) },
    Rule { applies: is_reply_missing, action: Action::RetryWithoutReply },
    Rule { applies: any, action: Action::Fallback(FallbackNote::Unknown) },
];

/// Media greetings.
const MEDIA_LADDER: [Rule; 2] = [
    Rule { applies: is_reply_missing, action: Action::RetryWithoutReply },
    Rule { applies: any, action: Action::Fallback(FallbackNote::MediaFailed) },
];

/// Sends greetings through a `ChatClient`, never failing outright.
pub struct Dispatcher<'a> {
    client: &'a dyn ChatClient,
    locale: &'a str,
}

impl<'a> Dispatcher<'a> {
    pub fn new(client: &'a dyn ChatClient, locale: &'a str) -> Self {
        Self { client, locale }
    }

    pub async fn deliver(&self, req: DeliveryRequest) -> DeliveryOutcome {
        let ladder: &[Rule] = if req.kind == MediaKind::Text {
            &TEXT_LADDER
        } else {
            &MEDIA_LADDER
        };
        let mut reply_to = req.reply_to;

        let mut failure = match &req.rendered {
            Ok(text) => match self.client.send(req.original(text, reply_to)).await {
                Ok(id) => return DeliveryOutcome::Sent(id),
                Err(e) => Failure::Delivery(e),
            },
            Err(e) => Failure::Template(e.clone()),
        };

        loop {
            let action = ladder
                .iter()
                .find(|rule| (rule.applies)(&failure))
                .map_or(Action::Fallback(FallbackNote::Unknown), |rule| rule.action);

            match action {
                Action::RetryWithoutReply => {
                    // Only reachable with a rendered body
                    let (Some(_), Ok(text)) = (reply_to.take(), &req.rendered) else {
                        return self.fallback(&req, FallbackNote::Unknown, None).await;
                    };
                    debug!("Reply target gone in chat {}, sending without it", req.chat_id);
                    match self.client.send(req.original(text, None)).await {
                        Ok(id) => return DeliveryOutcome::Sent(id),
                        Err(e) => failure = Failure::Delivery(e),
                    }
                }
                Action::Fallback(note) => {
                    match &failure {
                        Failure::Template(e) => {
                            debug!("Greeting template in chat {} did not render: {}", req.chat_id, e);
                        }
                        Failure::Delivery(e) if note == FallbackNote::BadUrls => {
                            warn!("{}", bad_url_report(&req, e));
                        }
                        Failure::Delivery(e) => {
                            warn!("Greeting delivery failed in chat {}: {}", req.chat_id, e);
                        }
                    }
                    return self.fallback(&req, note, reply_to).await;
                }
            }
        }
    }

    async fn fallback(
        &self,
        req: &DeliveryRequest,
        note: FallbackNote,
        reply_to: Option<MessageId>,
    ) -> DeliveryOutcome {
        let text = format!(
            "{}\n{}",
            req.backup,
            i18n::get_text(self.locale, note.key())
        );
        let msg = Outgoing::text(req.chat_id, text).reply_to(reply_to);

        match self.client.send(msg).await {
            Ok(id) => DeliveryOutcome::Sent(id),
            Err(DeliveryError::PermissionDenied) => DeliveryOutcome::LeaveChat,
            Err(DeliveryError::BotMuted) => {
                debug!("Bot is muted in chat {}, dropping greeting", req.chat_id);
                DeliveryOutcome::Dropped
            }
            Err(e) => {
                warn!("Fallback greeting failed in chat {}: {}", req.chat_id, e);
                DeliveryOutcome::Dropped
            }
        }
    }
}

/// Everything needed to find the offending link in a greeting.
fn bad_url_report(req: &DeliveryRequest, err: &DeliveryError) -> String {
    format!(
        "Could not parse greeting in chat {}: {} | text: {:?} | keyboard: {:?}",
        req.chat_id, err, req.rendered, req.keyboard
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greeting::buttons::KeyboardButton;
    use crate::greeting::testing::FakeChat;

    fn request(rendered: Result<String, TemplateError>) -> DeliveryRequest {
        DeliveryRequest {
            chat_id: -100,
            kind: MediaKind::Text,
            file_id: None,
            rendered,
            keyboard: Keyboard::default(),
            reply_to: Some(5),
            backup: "Hey Ann, how are you?".to_string(),
        }
    }

    fn note(n: FallbackNote) -> String {
        i18n::get_text("en", n.key())
    }

    #[tokio::test]
    async fn test_sends_rendered_text() {
        let chat = FakeChat::default();
        let outcome = Dispatcher::new(&chat, "en")
            .deliver(request(Ok("Hi Ann".to_string())))
            .await;

        assert!(matches!(outcome, DeliveryOutcome::Sent(_)));
        let sent = chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "Hi Ann");
        assert_eq!(sent[0].reply_to, Some(5));
    }

    #[tokio::test]
    async fn test_invalid_button_url_falls_back_with_note() {
        let chat = FakeChat::default();
        chat.fail_next(DeliveryError::InvalidButtonUrl);

        let outcome = Dispatcher::new(&chat, "en")
            .deliver(request(Ok("Hi Ann".to_string())))
            .await;

        assert!(matches!(outcome, DeliveryOutcome::Sent(_)));
        let sent = chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].text,
            format!("Hey Ann, how are you?\n{}", note(FallbackNote::InvalidButtonUrl))
        );
        assert!(sent[0].keyboard.is_empty());
    }

    #[tokio::test]
    async fn test_template_error_falls_back_without_sending_original() {
        let chat = FakeChat::default();
        let outcome = Dispatcher::new(&chat, "en")
            .deliver(request(Err(TemplateError::MalformedPlaceholder(3))))
            .await;

        assert!(matches!(outcome, DeliveryOutcome::Sent(_)));
        let sent = chat.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.ends_with(&note(FallbackNote::MalformedTemplate)));
    }

    #[tokio::test]
    async fn test_missing_reply_target_retries_original() {
        let chat = FakeChat::default();
        chat.fail_next(DeliveryError::ReplyTargetMissing);

        let outcome = Dispatcher::new(&chat, "en")
            .deliver(request(Ok("Hi Ann".to_string())))
            .await;

        assert!(matches!(outcome, DeliveryOutcome::Sent(_)));
        let sent = chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "Hi Ann");
        assert_eq!(sent[0].reply_to, None);
    }

    #[tokio::test]
    async fn test_no_send_rights_asks_to_leave() {
        let chat = FakeChat::default();
        chat.fail_next(DeliveryError::Unspecified("boom".to_string()));
        chat.fail_next(DeliveryError::PermissionDenied);

        let outcome = Dispatcher::new(&chat, "en")
            .deliver(request(Ok("Hi Ann".to_string())))
            .await;

        assert_eq!(outcome, DeliveryOutcome::LeaveChat);
        assert!(chat.sent().is_empty());
    }

    #[tokio::test]
    async fn test_muted_bot_is_swallowed() {
        let chat = FakeChat::default();
        chat.fail_next(DeliveryError::Unspecified("boom".to_string()));
        chat.fail_next(DeliveryError::BotMuted);

        let outcome = Dispatcher::new(&chat, "en")
            .deliver(request(Ok("Hi Ann".to_string())))
            .await;

        assert_eq!(outcome, DeliveryOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_media_failure_sends_note() {
        let chat = FakeChat::default();
        chat.fail_next(DeliveryError::Unspecified("wrong file id".to_string()));

        let mut req = request(Ok("caption".to_string()));
        req.kind = MediaKind::Photo;
        req.file_id = Some("file-1".to_string());

        let outcome = Dispatcher::new(&chat, "en").deliver(req).await;

        assert!(matches!(outcome, DeliveryOutcome::Sent(_)));
        let sent = chat.sent();
        assert_eq!(sent[0].kind, MediaKind::Text);
        assert!(sent[0].text.ends_with(&note(FallbackNote::MediaFailed)));
    }

    #[tokio::test]
    async fn test_unsupported_protocol_falls_back_with_note() {
        let chat = FakeChat::default();
        chat.fail_next(DeliveryError::UnsupportedProtocol);

        let outcome = Dispatcher::new(&chat, "en")
            .deliver(request(Ok("Hi Ann".to_string())))
            .await;

        assert!(matches!(outcome, DeliveryOutcome::Sent(_)));
        let sent = chat.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.starts_with("Hey Ann, how are you?\n"));
        assert!(sent[0].text.contains("unsupported by Telegram"));
        assert_eq!(sent[0].reply_to, Some(5));
    }

    #[tokio::test]
    async fn test_bad_url_host_falls_back_with_note() {
        let chat = FakeChat::default();
        chat.fail_next(DeliveryError::BadUrlHost);

        let outcome = Dispatcher::new(&chat, "en")
            .deliver(request(Ok("Hi Ann".to_string())))
            .await;

        assert!(matches!(outcome, DeliveryOutcome::Sent(_)));
        let sent = chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].text,
            format!("Hey Ann, how are you?\n{}", note(FallbackNote::BadUrls))
        );
        assert!(sent[0].text.contains("bad URLs"));
    }

    #[test]
    fn test_bad_url_report_names_text_and_keyboard() {
        let mut req = request(Ok("Hi Ann".to_string()));
        req.keyboard.push_row(KeyboardButton::callback("Site", "site:1"));

        let report = bad_url_report(&req, &DeliveryError::BadUrlHost);
        assert!(report.contains("-100"));
        assert!(report.contains("Hi Ann"));
        assert!(report.contains("Site"));
        assert!(report.contains("site:1"));
    }
}
