//! Button definitions and keyboard compilation.
//!
//! Greeting buttons are written inline in the greeting text:
//! - `{button:Text|target}` - Single button
//! - `{button:A|a}:{button:B|b}` - Same row (colon joins)
//! - `{button:A|a} {button:B|b}` - Different rows
//!
//! A target is a URL (`https://`, `http://`, `tg://`, or a bare host that
//! gets `https://`) or the keyword `rules`, which links to the chat's rules.

use url::Url;

use crate::database::ButtonDef;

/// Where a compiled button leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonTarget {
    Url(Url),
    Callback(String),
}

/// One renderable button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardButton {
    pub label: String,
    pub target: ButtonTarget,
}

impl KeyboardButton {
    pub fn url(label: impl Into<String>, url: Url) -> Self {
        Self {
            label: label.into(),
            target: ButtonTarget::Url(url),
        }
    }

    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: ButtonTarget::Callback(data.into()),
        }
    }
}

/// Ordered rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<KeyboardButton>>,
}

impl Keyboard {
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.is_empty())
    }

    /// Append a button on its own row.
    pub fn push_row(&mut self, button: KeyboardButton) {
        self.rows.push(vec![button]);
    }

    /// Number of buttons across all rows.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

/// Deep link that opens the chat's rules in PM.
pub fn rules_link(bot_username: &str, chat_id: i64) -> String {
    format!("https://t.me/{}?start=rules_{}", bot_username, chat_id)
}

/// Compile stored rows into a keyboard. Buttons whose target cannot be
/// resolved are dropped; rows left empty are dropped with them.
pub fn compile(rows: &[Vec<ButtonDef>], chat_id: i64, bot_username: &str) -> Keyboard {
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|btn| {
                    resolve_target(&btn.target, chat_id, bot_username).map(|target| {
                        KeyboardButton {
                            label: btn.label.clone(),
                            target,
                        }
                    })
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    Keyboard { rows }
}

/// Resolve a raw stored target.
pub fn resolve_target(raw: &str, chat_id: i64, bot_username: &str) -> Option<ButtonTarget> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.eq_ignore_ascii_case("rules") {
        return Url::parse(&rules_link(bot_username, chat_id))
            .ok()
            .map(ButtonTarget::Url);
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let url = Url::parse(&candidate).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(ButtonTarget::Url(url)),
        "tg" => Some(ButtonTarget::Url(url)),
        _ => None,
    }
}

/// Write rows back as inline definitions, for `noformat` previews.
pub fn revert(rows: &[Vec<ButtonDef>]) -> String {
    let mut out = String::new();
    for row in rows.iter().filter(|row| !row.is_empty()) {
        out.push('\n');
        let row_text: Vec<String> = row
            .iter()
            .map(|btn| format!("{{button:{}|{}}}", btn.label, btn.target))
            .collect();
        out.push_str(&row_text.join(":"));
    }
    out
}

/// Parse button definitions out of text.
///
/// Returns (text without buttons, parsed buttons as rows)
pub fn parse_buttons(input: &str) -> (String, Vec<Vec<ButtonDef>>) {
    let mut result_text = String::new();
    let mut rows: Vec<Vec<ButtonDef>> = vec![];
    let mut current_row: Vec<ButtonDef> = vec![];

    let input_chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < input_chars.len() {
        if input_chars[i] == '{'
            && let Some((btn, end_idx)) = try_parse_button(&input_chars, i)
        {
            current_row.push(btn);
            i = end_idx;

            // Colon means same row
            if i < input_chars.len() && input_chars[i] == ':' {
                i += 1;
            } else if !current_row.is_empty() {
                rows.push(std::mem::take(&mut current_row));
            }
            continue;
        }
        result_text.push(input_chars[i]);
        i += 1;
    }

    if !current_row.is_empty() {
        rows.push(current_row);
    }

    (result_text, rows)
}

/// Try to parse a button: {button:Text|target}
fn try_parse_button(chars: &[char], start: usize) -> Option<(ButtonDef, usize)> {
    if start + 8 >= chars.len() {
        return None;
    }

    let prefix: String = chars[start..start + 8].iter().collect();
    if prefix.to_lowercase() != "{button:" {
        return None;
    }

    let mut i = start + 8;

    let mut label = String::new();
    while i < chars.len() && chars[i] != '|' && chars[i] != '}' {
        label.push(chars[i]);
        i += 1;
    }

    if i >= chars.len() || chars[i] != '|' {
        return None;
    }
    i += 1;

    let mut target = String::new();
    while i < chars.len() && chars[i] != '}' {
        target.push(chars[i]);
        i += 1;
    }

    if i >= chars.len() {
        return None;
    }
    i += 1;

    let label = label.trim().to_string();
    let target = target.trim().to_string();
    if label.is_empty() || target.is_empty() {
        return None;
    }

    Some((ButtonDef::new(label, target), i))
}
