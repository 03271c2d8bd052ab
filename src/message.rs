//! Message keys, replacements, and rendering.
//!
//! Templates use `{name}` placeholders for replacements, `{lang:key}` to
//! inline another message, `{lang:%name}` to inline a command replacement,
//! and `<c1>`/`<c2>`/`<c3>` colour slots resolved against a per-category
//! [`Palette`]. Everything else is passed through untouched.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use colored::{Color, Colorize};
use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::locale::{Locale, Locales};
use crate::replacements::CommandReplacements;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z0-9_.\-]+)\}").expect("placeholder pattern is valid")
});

static LANG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{lang:(%?[A-Za-z0-9_.\-]+)\}").expect("lang pattern is valid")
});

static COLOR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?c([1-3])>").expect("color pattern is valid"));

/// Category a message is rendered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Info,
    Error,
    Syntax,
    Help,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
            Self::Syntax => write!(f, "syntax"),
            Self::Help => write!(f, "help"),
        }
    }
}

/// Key into a locale bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKey(Cow<'static, str>);

impl MessageKey {
    #[must_use]
    pub const fn from_static(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }

    pub fn of(key: impl Into<String>) -> Self {
        Self(Cow::Owned(key.into().to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageKey {
    fn from(value: &str) -> Self {
        Self::of(value)
    }
}

/// Keys of the built-in messages.
pub mod keys {
    use super::MessageKey;

    pub const PERMISSION_DENIED: MessageKey = MessageKey::from_static("cmdframe.permission_denied");
    pub const PERMISSION_DENIED_PARAMETER: MessageKey =
        MessageKey::from_static("cmdframe.permission_denied_parameter");
    pub const ERROR_GENERIC_LOGGED: MessageKey =
        MessageKey::from_static("cmdframe.error_generic_logged");
    pub const UNKNOWN_COMMAND: MessageKey = MessageKey::from_static("cmdframe.unknown_command");
    pub const INVALID_SYNTAX: MessageKey = MessageKey::from_static("cmdframe.invalid_syntax");
    pub const ERROR_PREFIX: MessageKey = MessageKey::from_static("cmdframe.error_prefix");
    pub const ERROR_PERFORMING_COMMAND: MessageKey =
        MessageKey::from_static("cmdframe.error_performing_command");
    pub const INFO_MESSAGE: MessageKey = MessageKey::from_static("cmdframe.info_message");
    pub const INVALID_PARAMETER: MessageKey =
        MessageKey::from_static("cmdframe.invalid_parameter");
    pub const PLEASE_SPECIFY_ONE_OF: MessageKey =
        MessageKey::from_static("cmdframe.please_specify_one_of");
    pub const MUST_BE_A_NUMBER: MessageKey = MessageKey::from_static("cmdframe.must_be_a_number");
    pub const PLEASE_SPECIFY_AT_LEAST: MessageKey =
        MessageKey::from_static("cmdframe.please_specify_at_least");
    pub const PLEASE_SPECIFY_AT_MOST: MessageKey =
        MessageKey::from_static("cmdframe.please_specify_at_most");
    pub const NOT_ALLOWED_ON_CONSOLE: MessageKey =
        MessageKey::from_static("cmdframe.not_allowed_on_console");
    pub const NO_COMMAND_MATCHED_SEARCH: MessageKey =
        MessageKey::from_static("cmdframe.no_command_matched_search");
    pub const HELP_PAGE_INFORMATION: MessageKey =
        MessageKey::from_static("cmdframe.help_page_information");
    pub const HELP_NO_RESULTS: MessageKey = MessageKey::from_static("cmdframe.help_no_results");
    pub const HELP_HEADER: MessageKey = MessageKey::from_static("cmdframe.help_header");
    pub const HELP_FORMAT: MessageKey = MessageKey::from_static("cmdframe.help_format");
    pub const HELP_DETAILED_HEADER: MessageKey =
        MessageKey::from_static("cmdframe.help_detailed_header");
    pub const HELP_DETAILED_COMMAND_FORMAT: MessageKey =
        MessageKey::from_static("cmdframe.help_detailed_command_format");
    pub const HELP_DETAILED_PARAMETER_FORMAT: MessageKey =
        MessageKey::from_static("cmdframe.help_detailed_parameter_format");
    pub const HELP_SEARCH_HEADER: MessageKey =
        MessageKey::from_static("cmdframe.help_search_header");
    pub const LOCALE_CHANGED: MessageKey = MessageKey::from_static("cmdframe.locale_changed");
}

/// Ordered named replacement values for a message template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replacements(Vec<(String, String)>);

impl Replacements {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a replacement (builder pattern). Later values win over earlier ones.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Replacements {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

/// Colours for the three slots of a message category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub c1: Color,
    pub c2: Color,
    pub c3: Color,
}

impl Palette {
    #[must_use]
    pub const fn new(c1: Color, c2: Color, c3: Color) -> Self {
        Self { c1, c2, c3 }
    }

    /// Default palette for a category.
    #[must_use]
    pub const fn for_type(category: MessageType) -> Self {
        match category {
            MessageType::Info => Self::new(Color::Blue, Color::Green, Color::BrightGreen),
            MessageType::Error => Self::new(Color::Red, Color::Yellow, Color::Red),
            MessageType::Syntax => Self::new(Color::Yellow, Color::Green, Color::White),
            MessageType::Help => Self::new(Color::Cyan, Color::Green, Color::Yellow),
        }
    }

    #[must_use]
    pub const fn slot(&self, slot: u8) -> Color {
        match slot {
            2 => self.c2,
            3 => self.c3,
            _ => self.c1,
        }
    }
}

/// A message after template lookup and substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub category: MessageType,
    pub locale: Locale,
    /// Text with colour slot tags still in place.
    pub markup: String,
    pub palette: Palette,
}

impl RenderedMessage {
    /// Text with colour tags removed.
    #[must_use]
    pub fn plain(&self) -> String {
        COLOR_TAG.replace_all(&self.markup, "").into_owned()
    }

    /// Text with colour tags turned into ANSI sequences. Untagged text uses slot 1.
    #[must_use]
    pub fn to_ansi(&self) -> String {
        let mut out = String::with_capacity(self.markup.len() + 16);
        let mut stack: Vec<u8> = vec![1];
        let mut last = 0;
        for caps in COLOR_TAG.captures_iter(&self.markup) {
            let Some(whole) = caps.get(0) else { continue };
            let text = &self.markup[last..whole.start()];
            if !text.is_empty() {
                let slot = stack.last().copied().unwrap_or(1);
                out.push_str(&text.color(self.palette.slot(slot)).to_string());
            }
            let slot = caps[1].parse::<u8>().unwrap_or(1);
            if whole.as_str().starts_with("</") {
                if stack.len() > 1 {
                    stack.pop();
                }
            } else {
                stack.push(slot);
            }
            last = whole.end();
        }
        let tail = &self.markup[last..];
        if !tail.is_empty() {
            let slot = stack.last().copied().unwrap_or(1);
            out.push_str(&tail.color(self.palette.slot(slot)).to_string());
        }
        out
    }
}

impl fmt::Display for RenderedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.plain())
    }
}

/// Everything a formatter may consult while rendering.
pub struct RenderEnv<'a> {
    pub locale: &'a Locale,
    pub locales: &'a Locales,
    pub replacements: &'a CommandReplacements,
}

/// Maps a key, replacements, and category to a rendered message.
pub trait MessageFormatter: Send + Sync {
    fn render(
        &self,
        env: &RenderEnv<'_>,
        category: MessageType,
        key: &MessageKey,
        replacements: &Replacements,
    ) -> RenderedMessage;
}

/// Formatter with per-category palettes and `{name}` substitution.
#[derive(Debug)]
pub struct DefaultFormatter {
    palettes: RwLock<HashMap<MessageType, Palette>>,
    fallback: RwLock<Palette>,
}

impl Default for DefaultFormatter {
    fn default() -> Self {
        let palettes = [
            MessageType::Info,
            MessageType::Error,
            MessageType::Syntax,
            MessageType::Help,
        ]
        .into_iter()
        .map(|t| (t, Palette::for_type(t)))
        .collect();
        Self {
            palettes: RwLock::new(palettes),
            fallback: RwLock::new(Palette::for_type(MessageType::Info)),
        }
    }
}

impl DefaultFormatter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_format(&self, category: MessageType, palette: Palette) {
        self.palettes.write().insert(category, palette);
    }

    #[must_use]
    pub fn format(&self, category: MessageType) -> Palette {
        self.palettes
            .read()
            .get(&category)
            .copied()
            .unwrap_or_else(|| *self.fallback.read())
    }

    pub fn set_default_format(&self, palette: Palette) {
        *self.fallback.write() = palette;
    }
}

impl MessageFormatter for DefaultFormatter {
    fn render(
        &self,
        env: &RenderEnv<'_>,
        category: MessageType,
        key: &MessageKey,
        replacements: &Replacements,
    ) -> RenderedMessage {
        let template = env.locales.get_message(env.locale, key);
        let markup = substitute(&template, env, replacements);
        trace!(%key, %category, "rendered message");
        RenderedMessage {
            category,
            locale: env.locale.clone(),
            markup,
            palette: self.format(category),
        }
    }
}

/// Expand `{lang:..}` tags, then `{name}` replacements. Unknown names stay as written.
pub fn substitute(template: &str, env: &RenderEnv<'_>, replacements: &Replacements) -> String {
    let with_lang = LANG_TAG.replace_all(template, |caps: &Captures<'_>| {
        let arg = &caps[1];
        arg.strip_prefix('%').map_or_else(
            || env.locales.get_message(env.locale, &MessageKey::of(arg)),
            |name| {
                env.replacements
                    .get(name)
                    .unwrap_or_else(|| caps[0].to_string())
            },
        )
    });
    PLACEHOLDER
        .replace_all(&with_lang, |caps: &Captures<'_>| {
            replacements
                .get(&caps[1])
                .map_or_else(|| caps[0].to_string(), str::to_string)
        })
        .into_owned()
}
