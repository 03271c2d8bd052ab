//! Locales, message bundles, and per-issuer locale tracking.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::issuer::CommandIssuer;
use crate::message::{MessageKey, keys};

/// A language tag such as `en` or `pt_br`. Compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locale(Cow<'static, str>);

impl Locale {
    pub const ENGLISH: Self = Self(Cow::Borrowed("en"));
    pub const GERMAN: Self = Self(Cow::Borrowed("de"));
    pub const SPANISH: Self = Self(Cow::Borrowed("es"));
    pub const FRENCH: Self = Self(Cow::Borrowed("fr"));
    pub const DUTCH: Self = Self(Cow::Borrowed("nl"));
    pub const CZECH: Self = Self(Cow::Borrowed("cs"));
    pub const PORTUGUESE: Self = Self(Cow::Borrowed("pt"));
    pub const SWEDISH: Self = Self(Cow::Borrowed("sv"));
    pub const RUSSIAN: Self = Self(Cow::Borrowed("ru"));
    pub const JAPANESE: Self = Self(Cow::Borrowed("ja"));
    pub const CHINESE: Self = Self(Cow::Borrowed("zh"));

    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(Cow::Owned(tag.as_ref().trim().replace('-', "_").to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag: `pt` for `pt_br`.
    #[must_use]
    pub fn language(&self) -> &str {
        self.0.split('_').next().unwrap_or(&self.0)
    }

    #[must_use]
    pub fn default_supported() -> Vec<Self> {
        vec![
            Self::ENGLISH,
            Self::DUTCH,
            Self::GERMAN,
            Self::SPANISH,
            Self::FRENCH,
            Self::CZECH,
            Self::PORTUGUESE,
            Self::SWEDISH,
            Self::RUSSIAN,
            Self::JAPANESE,
            Self::CHINESE,
        ]
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locale {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

const DEFAULT_MESSAGES: &[(MessageKey, &str)] = &[
    (
        keys::PERMISSION_DENIED,
        "I'm sorry, but you do not have permission to perform this command.",
    ),
    (
        keys::PERMISSION_DENIED_PARAMETER,
        "I'm sorry, but you do not have permission to supply {param}.",
    ),
    (
        keys::ERROR_GENERIC_LOGGED,
        "An error occurred. This problem has been logged. Sorry for the inconvenience.",
    ),
    (
        keys::UNKNOWN_COMMAND,
        "Unknown command <c2>{command}</c2>, please type <c2>help</c2>.",
    ),
    (keys::INVALID_SYNTAX, "Usage: <c2>{command}</c2> <c3>{syntax}</c3>"),
    (keys::ERROR_PREFIX, "Error: {message}"),
    (
        keys::ERROR_PERFORMING_COMMAND,
        "I'm sorry, but there was an error performing this command.",
    ),
    (keys::INFO_MESSAGE, "{message}"),
    (
        keys::INVALID_PARAMETER,
        "Error: <c2>{value}</c2> is not a valid value for <c2>{name}</c2>.",
    ),
    (
        keys::PLEASE_SPECIFY_ONE_OF,
        "Error: Please specify one of (<c2>{valid}</c2>).",
    ),
    (keys::MUST_BE_A_NUMBER, "Error: <c2>{num}</c2> must be a number."),
    (
        keys::PLEASE_SPECIFY_AT_LEAST,
        "Error: Please specify a value of at least <c2>{min}</c2>.",
    ),
    (
        keys::PLEASE_SPECIFY_AT_MOST,
        "Error: Please specify a value of at most <c2>{max}</c2>.",
    ),
    (
        keys::NOT_ALLOWED_ON_CONSOLE,
        "Error: Console may not execute this command.",
    ),
    (
        keys::NO_COMMAND_MATCHED_SEARCH,
        "No command matched <c2>{search}</c2>.",
    ),
    (
        keys::HELP_PAGE_INFORMATION,
        "- Showing page <c2>{page}</c2> of <c2>{totalpages}</c2> (<c3>{results}</c3> results).",
    ),
    (keys::HELP_NO_RESULTS, "Error: No more results."),
    (
        keys::HELP_HEADER,
        "<c3>=== </c3>Showing help for <c2>{commandprefix}{command}</c2><c3> ===</c3>",
    ),
    (
        keys::HELP_FORMAT,
        "{command} <c2>{parameters}</c2> <c3>{separator} {description}</c3>",
    ),
    (
        keys::HELP_DETAILED_HEADER,
        "<c3>=== </c3>Detailed help for <c2>{commandprefix}{command}</c2><c3> ===</c3>",
    ),
    (
        keys::HELP_DETAILED_COMMAND_FORMAT,
        "{command} <c2>{parameters}</c2> <c3>{separator} {description}</c3>",
    ),
    (
        keys::HELP_DETAILED_PARAMETER_FORMAT,
        "<c2>{syntaxorname}</c2>: <c3>{description}</c3>",
    ),
    (
        keys::HELP_SEARCH_HEADER,
        "<c3>=== </c3>Search results for <c2>{commandprefix}{command} {search}</c2><c3> ===</c3>",
    ),
    (keys::LOCALE_CHANGED, "Language set to <c2>{locale}</c2>."),
];

/// Message bundles by locale with fallback to the default locale.
#[derive(Debug)]
pub struct Locales {
    default_locale: RwLock<Locale>,
    bundles: RwLock<HashMap<Locale, HashMap<MessageKey, String>>>,
    supported: RwLock<Vec<Locale>>,
}

impl Locales {
    /// Empty bundles with `default_locale` as fallback.
    #[must_use]
    pub fn new(default_locale: Locale) -> Self {
        Self {
            default_locale: RwLock::new(default_locale),
            bundles: RwLock::new(HashMap::new()),
            supported: RwLock::new(Locale::default_supported()),
        }
    }

    /// Bundles pre-loaded with the built-in English messages.
    #[must_use]
    pub fn with_defaults(default_locale: Locale) -> Self {
        let locales = Self::new(default_locale);
        locales.add_messages(
            &Locale::ENGLISH,
            DEFAULT_MESSAGES.iter().map(|(k, v)| (k.clone(), *v)),
        );
        locales
    }

    #[must_use]
    pub fn default_locale(&self) -> Locale {
        self.default_locale.read().clone()
    }

    pub fn set_default_locale(&self, locale: Locale) {
        *self.default_locale.write() = locale;
    }

    pub fn add_message(&self, locale: &Locale, key: MessageKey, message: impl Into<String>) {
        self.bundles
            .write()
            .entry(locale.clone())
            .or_default()
            .insert(key, message.into());
    }

    pub fn add_messages<I, S>(&self, locale: &Locale, messages: I)
    where
        I: IntoIterator<Item = (MessageKey, S)>,
        S: Into<String>,
    {
        let mut bundles = self.bundles.write();
        let bundle = bundles.entry(locale.clone()).or_default();
        for (key, message) in messages {
            bundle.insert(key, message.into());
        }
    }

    /// Look up `key` for `locale`, then its language, then the default
    /// locale, then English. A key with no translation anywhere renders as
    /// the key itself.
    #[must_use]
    pub fn get_message(&self, locale: &Locale, key: &MessageKey) -> String {
        let bundles = self.bundles.read();
        let default_locale = self.default_locale.read().clone();
        let language = Locale::new(locale.language());
        let chain = [locale, &language, &default_locale, &Locale::ENGLISH];
        for candidate in chain {
            if let Some(message) = bundles.get(candidate).and_then(|b| b.get(key)) {
                return message.clone();
            }
        }
        warn!(%key, %locale, "missing message translation");
        key.to_string()
    }

    #[must_use]
    pub fn supported_languages(&self) -> Vec<Locale> {
        self.supported.read().clone()
    }

    pub fn add_supported_language(&self, locale: Locale) {
        let mut supported = self.supported.write();
        if !supported.contains(&locale) {
            supported.push(locale);
        }
    }

    pub fn set_supported_languages(&self, locales: Vec<Locale>) {
        *self.supported.write() = locales;
    }
}

/// Callback fired when an issuer's locale changes: `(issuer, old, new)`.
pub type LocaleCallback =
    Arc<dyn Fn(&dyn CommandIssuer, Option<&Locale>, &Locale) -> anyhow::Result<()> + Send + Sync>;

/// Per-issuer locale preferences and change subscribers.
pub struct IssuerLocales {
    enabled: AtomicBool,
    by_issuer: RwLock<HashMap<Uuid, Locale>>,
    subscribers: RwLock<Vec<LocaleCallback>>,
}

impl Default for IssuerLocales {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for IssuerLocales {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerLocales")
            .field("enabled", &self.is_enabled())
            .field("issuers", &self.by_issuer.read().len())
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}

impl IssuerLocales {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            by_issuer: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns the previous setting.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel)
    }

    /// The issuer's stored locale, if per-issuer locales are enabled.
    #[must_use]
    pub fn get(&self, issuer: &dyn CommandIssuer) -> Option<Locale> {
        if !self.is_enabled() {
            return None;
        }
        self.by_issuer.read().get(&issuer.unique_id()).cloned()
    }

    pub fn subscribe(&self, callback: LocaleCallback) {
        self.subscribers.write().push(callback);
    }

    /// Store `locale` for `issuer`, notifying subscribers if it changed.
    /// Returns the previous locale.
    pub fn set(&self, issuer: &dyn CommandIssuer, locale: Locale) -> Option<Locale> {
        let old = self
            .by_issuer
            .write()
            .insert(issuer.unique_id(), locale.clone());
        if old.as_ref() != Some(&locale) {
            self.notify(issuer, old.as_ref(), &locale);
        }
        old
    }

    fn notify(&self, issuer: &dyn CommandIssuer, old: Option<&Locale>, new: &Locale) {
        let subscribers: Vec<LocaleCallback> = self.subscribers.read().clone();
        debug!(
            issuer = issuer.name(),
            new = %new,
            subscribers = subscribers.len(),
            "issuer locale changed"
        );
        for callback in subscribers {
            match catch_unwind(AssertUnwindSafe(|| callback(issuer, old, new))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(issuer = issuer.name(), error = %err, "error in locale change callback");
                }
                Err(_) => {
                    error!(issuer = issuer.name(), "locale change callback panicked");
                }
            }
        }
    }
}
