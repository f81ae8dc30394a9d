//! Greeting template renderer.
//!
//! Templates use `{name}` placeholders from a fixed allow-list. Anything
//! else that looks like a brace is neutralized into a literal before
//! substitution, so an admin typing `{` in a greeting cannot break it.
//! `{{` and `}}` are literal braces.

use std::collections::HashMap;

use super::client::Member;
use super::error::TemplateError;
use crate::utils::{html_escape, mention_html};

/// Placeholders a greeting template may use.
pub const VALID_PLACEHOLDERS: [&str; 9] = [
    "first", "last", "fullname", "username", "id", "count", "chatname", "mention", "rules",
];

/// Stand-in for members whose first name comes through empty.
const NAMELESS: &str = "PersonWithNoName";

/// Tags Telegram accepts in HTML parse mode.
const ALLOWED_TAGS: [&str; 16] = [
    "a", "b", "blockquote", "code", "del", "em", "i", "ins", "pre", "s", "span", "strike",
    "strong", "tg-emoji", "tg-spoiler", "u",
];

/// Values for one member, already escaped for HTML.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: HashMap<&'static str, String>,
}

impl Placeholders {
    /// Build the full placeholder set for a member of a chat.
    pub fn for_member(member: &Member, chat_title: &str, count: u32, rules_url: &str) -> Self {
        let first = display_first_name(member);
        let last = member
            .last_name
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(first);
        let fullname = match member.last_name.as_deref() {
            Some(l) if !l.is_empty() => format!("{} {}", first, l),
            _ => first.to_string(),
        };
        // Pre-built markup, injected as is.
        let mention = mention_html(member.id, first);
        let username = member
            .username
            .as_ref()
            .map(|u| format!("@{}", html_escape(u)))
            .unwrap_or_else(|| mention.clone());

        let mut values = HashMap::with_capacity(VALID_PLACEHOLDERS.len());
        values.insert("first", html_escape(first));
        values.insert("last", html_escape(last));
        values.insert("fullname", html_escape(&fullname));
        values.insert("username", username);
        values.insert("id", member.id.to_string());
        values.insert("count", count.to_string());
        values.insert("chatname", html_escape(chat_title));
        values.insert("mention", mention);
        values.insert("rules", html_escape(rules_url));

        Self { values }
    }

    /// Only `{first}`, used for the built-in default greetings.
    pub fn first_only(member: &Member) -> Self {
        let mut values = HashMap::with_capacity(1);
        values.insert("first", html_escape(display_first_name(member)));
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

fn display_first_name(member: &Member) -> &str {
    if member.first_name.is_empty() {
        NAMELESS
    } else {
        &member.first_name
    }
}

/// Render a template: neutralize, substitute, then check the markup.
pub fn render(template: &str, values: &Placeholders) -> Result<String, TemplateError> {
    let text = substitute(&neutralize(template), values)?;
    validate_markup(&text)?;
    Ok(text)
}

/// Escape every brace that is not an allow-listed placeholder.
pub fn neutralize(template: &str) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                out.push_str("{{");
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                out.push_str("}}");
                i += 2;
            }
            '{' => {
                if let Some(name) = placeholder_at(&chars, i)
                    && VALID_PLACEHOLDERS.contains(&name.as_str())
                {
                    i += name.chars().count() + 2;
                    out.push('{');
                    out.push_str(&name);
                    out.push('}');
                    continue;
                }
                out.push_str("{{");
                i += 1;
            }
            '}' => {
                out.push_str("}}");
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Name of a `{name}` token starting at `start`, if it is one.
fn placeholder_at(chars: &[char], start: usize) -> Option<String> {
    let mut name = String::new();
    for &c in &chars[start + 1..] {
        match c {
            '}' => return (!name.is_empty()).then_some(name),
            c if c.is_ascii_alphanumeric() || c == '_' => name.push(c),
            _ => return None,
        }
    }
    None
}

/// Substitute placeholders. Fails on any brace it cannot interpret or on a
/// placeholder with no value; never returns partial output.
pub fn substitute(template: &str, values: &Placeholders) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut iter = template.char_indices().peekable();

    while let Some((pos, c)) = iter.next() {
        match c {
            '{' => {
                if matches!(iter.peek(), Some((_, '{'))) {
                    iter.next();
                    out.push('{');
                    continue;
                }

                let mut name = String::new();
                loop {
                    match iter.next() {
                        Some((_, '}')) => break,
                        Some((_, ch)) if ch.is_ascii_alphanumeric() || ch == '_' => name.push(ch),
                        _ => return Err(TemplateError::MalformedPlaceholder(pos)),
                    }
                }

                let value = values
                    .get(&name)
                    .ok_or(TemplateError::MalformedPlaceholder(pos))?;
                out.push_str(value);
            }
            '}' => {
                if matches!(iter.peek(), Some((_, '}'))) {
                    iter.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::MalformedPlaceholder(pos));
                }
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

/// Check that tags are supported and properly nested.
pub fn validate_markup(text: &str) -> Result<(), TemplateError> {
    let mut open: Vec<String> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let end = after
            .find('>')
            .ok_or_else(|| TemplateError::MalformedMarkup("unterminated tag".to_string()))?;
        let tag = after[..end].trim();

        if let Some(name) = tag.strip_prefix('/') {
            let name = name.trim().to_lowercase();
            match open.pop() {
                Some(top) if top == name => {}
                _ => {
                    return Err(TemplateError::MalformedMarkup(format!(
                        "unexpected end tag </{}>",
                        name
                    )));
                }
            }
        } else {
            let name = tag
                .split(char::is_whitespace)
                .next()
                .unwrap_or("")
                .to_lowercase();
            if !ALLOWED_TAGS.contains(&name.as_str()) {
                return Err(TemplateError::MalformedMarkup(format!(
                    "unsupported start tag <{}>",
                    name
                )));
            }
            open.push(name);
        }

        rest = &after[end + 1..];
    }

    match open.pop() {
        Some(tag) => Err(TemplateError::MalformedMarkup(format!(
            "tag <{}> is never closed",
            tag
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> Member {
        Member {
            id: 42,
            first_name: "Ann".to_string(),
            last_name: None,
            username: None,
            is_bot: false,
        }
    }

    const RULES: &str = "https://t.me/gatekeeper_bot?start=rules_-100";

    #[test]
    fn test_render_first_and_rules() {
        let values = Placeholders::for_member(&ann(), "Test Chat", 10, RULES);
        let text = render("Hi {first}, rules: {rules}", &values).unwrap();
        assert_eq!(text, format!("Hi Ann, rules: {}", RULES));
    }

    #[test]
    fn test_unknown_placeholder_is_kept_literally() {
        let values = Placeholders::for_member(&ann(), "Test Chat", 10, RULES);
        let text = render("Hi {first} {nope} {", &values).unwrap();
        assert_eq!(text, "Hi Ann {nope} {");
    }

    #[test]
    fn test_escaped_braces_survive() {
        let values = Placeholders::for_member(&ann(), "Chat", 1, RULES);
        assert_eq!(render("{{first}}", &values).unwrap(), "{first}");
    }

    #[test]
    fn test_values_are_escaped_but_mention_is_not() {
        let member = Member {
            first_name: "<b>Eve".to_string(),
            username: Some("eve_<3".to_string()),
            ..ann()
        };
        let values = Placeholders::for_member(&member, "A & B", 3, RULES);
        let text = render("{first}|{chatname}|{username}|{mention}", &values).unwrap();
        assert_eq!(
            text,
            "&lt;b&gt;Eve|A &amp; B|@eve_&lt;3|<a href=\"tg://user?id=42\">&lt;b&gt;Eve</a>"
        );
    }

    #[test]
    fn test_last_and_fullname_fallbacks() {
        let values = Placeholders::for_member(&ann(), "Chat", 1, RULES);
        assert_eq!(values.get("last"), Some("Ann"));
        assert_eq!(values.get("fullname"), Some("Ann"));

        let member = Member {
            last_name: Some("Lee".to_string()),
            ..ann()
        };
        let values = Placeholders::for_member(&member, "Chat", 1, RULES);
        assert_eq!(values.get("fullname"), Some("Ann Lee"));
    }

    #[test]
    fn test_empty_first_name_gets_stand_in() {
        let member = Member {
            first_name: String::new(),
            ..ann()
        };
        let values = Placeholders::first_only(&member);
        assert_eq!(render("Hey {first}", &values).unwrap(), "Hey PersonWithNoName");
    }

    #[test]
    fn test_substitute_rejects_raw_braces() {
        let values = Placeholders::first_only(&ann());
        assert_eq!(
            substitute("oops {", &values),
            Err(TemplateError::MalformedPlaceholder(5))
        );
        assert_eq!(
            substitute("} oops", &values),
            Err(TemplateError::MalformedPlaceholder(0))
        );
        assert_eq!(
            substitute("{count}", &values),
            Err(TemplateError::MalformedPlaceholder(0))
        );
    }

    #[test]
    fn test_broken_markup_is_rejected() {
        let values = Placeholders::first_only(&ann());
        assert!(matches!(
            render("<b>Hi {first}", &values),
            Err(TemplateError::MalformedMarkup(_))
        ));
        assert!(matches!(
            render("<b>Hi</i>", &values),
            Err(TemplateError::MalformedMarkup(_))
        ));
        assert!(matches!(
            render("<script>x</script>", &values),
            Err(TemplateError::MalformedMarkup(_))
        ));
        assert!(render("<b>Hi</b> <a href=\"https://x.y\">{first}</a>", &values).is_ok());
    }
}
