//! `%name` substitutions applied to declaration strings.
//!
//! Lets permission nodes, command prefixes, and similar values be declared
//! once: a declaration with permission `%staff` picks up whatever `staff`
//! was registered as before the command set was registered.

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::RwLock;
use regex::{Captures, Regex};

static REPLACEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\{([A-Za-z0-9_.\-]+)\}|%([A-Za-z0-9_.\-]+)").expect("replacement pattern is valid")
});

#[derive(Debug, Default)]
pub struct CommandReplacements {
    values: RwLock<HashMap<String, String>>,
}

impl CommandReplacements {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `%key`. Returns the value it replaced, if any.
    pub fn add(&self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        let key = key.as_ref().trim_start_matches('%').to_lowercase();
        self.values.write().insert(key, value.into())
    }

    pub fn add_all<I, K, V>(&self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            self.add(k, v);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .get(&key.trim_start_matches('%').to_lowercase())
            .cloned()
    }

    /// Replace every known `%key` or `%{key}` in `text`. Unknown keys are left as written.
    #[must_use]
    pub fn replace(&self, text: &str) -> String {
        if !text.contains('%') {
            return text.to_string();
        }
        let values = self.values.read();
        REPLACEMENT
            .replace_all(text, |caps: &Captures<'_>| {
                let key = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().to_lowercase())
                    .unwrap_or_default();
                values
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}
