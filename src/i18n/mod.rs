//! Internationalization (i18n) module.
//!
//! Translations are embedded with `include_str!` and looked up by
//! dot-separated keys, e.g. `greeting.default_welcome`.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;
use tracing::warn;

/// Global translation store: LangCode -> Key -> Text
static TRANSLATIONS: OnceLock<HashMap<String, Value>> = OnceLock::new();

/// Locales shipped with the bot.
pub const SUPPORTED: [&str; 2] = ["en", "id"];

fn load() -> HashMap<String, Value> {
    let mut map = HashMap::new();

    for (lang, raw) in [("en", include_str!("en.json")), ("id", include_str!("id.json"))] {
        match serde_json::from_str(raw) {
            Ok(val) => {
                map.insert(lang.to_string(), val);
            }
            Err(e) => warn!("Failed to load {} translations: {}", lang, e),
        }
    }

    map
}

/// Load translations eagerly. Lookups load them on first use otherwise.
pub fn init() {
    TRANSLATIONS.get_or_init(load);
}

pub fn is_supported(lang: &str) -> bool {
    SUPPORTED.contains(&lang)
}

/// Get text for a key in a specific language.
/// Falls back to "en", then to the key itself.
pub fn get_text(lang: &str, key: &str) -> String {
    let store = TRANSLATIONS.get_or_init(load);

    if let Some(text) = store.get(lang).and_then(|val| resolve_key(val, key)) {
        return text;
    }

    if lang != "en"
        && let Some(text) = store.get("en").and_then(|val| resolve_key(val, key))
    {
        return text;
    }

    key.to_string()
}

/// Get text and fill `{name}` arguments.
pub fn get_text_with(lang: &str, key: &str, args: &[(&str, &str)]) -> String {
    args.iter()
        .fold(get_text(lang, key), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
}

fn resolve_key(val: &Value, key: &str) -> Option<String> {
    let mut current = val;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    current.as_str().map(|s| s.to_string())
}
