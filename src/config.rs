use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CommandError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub help: HelpConfig,
    #[serde(default)]
    pub exceptions: ExceptionsConfig,
    #[serde(default)]
    pub unstable: UnstableConfig,
    /// `%name` → value, applied to declaration strings at registration.
    #[serde(default)]
    pub replacements: BTreeMap<String, String>,
}

impl Config {
    /// Defaults, then the global file, then `explicit_path` (or
    /// `CMDFRAME_CONFIG`), then environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global) = Self::load_global()? {
            config.merge_patch(global);
        }

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("CMDFRAME_CONFIG").ok().map(PathBuf::from));
        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(CommandError::Config(format!(
                        "config file {} not found",
                        path.display()
                    )));
                }
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Parse one TOML document over the defaults, without touching the
    /// filesystem or environment.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let patch: ConfigPatch = toml::from_str(raw)
            .map_err(|err| CommandError::Config(format!("parse config: {err}")))?;
        let mut config = Self::default();
        config.merge_patch(patch);
        Ok(config)
    }

    #[must_use]
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cmdframe").join("config.toml"))
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        match Self::global_path() {
            Some(path) => Self::load_patch(&path),
            None => Ok(None),
        }
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| CommandError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| CommandError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.locale {
            self.locale.merge(patch);
        }
        if let Some(patch) = patch.help {
            self.help.merge(patch);
        }
        if let Some(patch) = patch.exceptions {
            self.exceptions.merge(patch);
        }
        if let Some(patch) = patch.unstable {
            self.unstable.merge(patch);
        }
        if let Some(values) = patch.replacements {
            self.replacements.extend(values);
        }
    }

    /// Apply `CMDFRAME_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CMDFRAME_DEFAULT_LOCALE") {
            self.locale.default = value;
        }
        if let Some(value) = env_bool(&lookup, "CMDFRAME_PER_ISSUER_LOCALE") {
            self.locale.per_issuer = value;
        }
        if let Some(value) = env_usize(&lookup, "CMDFRAME_HELP_PER_PAGE")? {
            self.help.per_page = value;
        }
        if let Some(value) = env_bool(&lookup, "CMDFRAME_LOG_UNHANDLED") {
            self.exceptions.log_unhandled = value;
        }
        if let Some(values) = env_list(&lookup, "CMDFRAME_UNSTABLE_APIS") {
            self.unstable.apis = merge_unique(values, &self.unstable.apis);
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.help.per_page == 0 {
            return Err(CommandError::Config(
                "help.per_page must be at least 1".to_string(),
            ));
        }
        if self.locale.default.trim().is_empty() {
            return Err(CommandError::Config(
                "locale.default must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "default_locale")]
    pub default: String,
    #[serde(default)]
    pub per_issuer: bool,
    #[serde(default)]
    pub supported: Vec<String>,
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default: default_locale(),
            per_issuer: false,
            supported: Vec::new(),
        }
    }
}

impl LocaleConfig {
    fn merge(&mut self, patch: LocalePatch) {
        if let Some(value) = patch.default {
            self.default = value;
        }
        if let Some(value) = patch.per_issuer {
            self.per_issuer = value;
        }
        if let Some(values) = patch.supported {
            self.supported = merge_unique(values, &self.supported);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpConfig {
    pub per_page: usize,
}

impl Default for HelpConfig {
    fn default() -> Self {
        Self { per_page: 10 }
    }
}

impl HelpConfig {
    fn merge(&mut self, patch: HelpPatch) {
        if let Some(value) = patch.per_page {
            self.per_page = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionsConfig {
    pub log_unhandled: bool,
}

impl Default for ExceptionsConfig {
    fn default() -> Self {
        Self {
            log_unhandled: true,
        }
    }
}

impl ExceptionsConfig {
    fn merge(&mut self, patch: ExceptionsPatch) {
        if let Some(value) = patch.log_unhandled {
            self.log_unhandled = value;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnstableConfig {
    #[serde(default)]
    pub apis: Vec<String>,
}

impl UnstableConfig {
    fn merge(&mut self, patch: UnstablePatch) {
        if let Some(values) = patch.apis {
            self.apis = merge_unique(values, &self.apis);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub locale: Option<LocalePatch>,
    pub help: Option<HelpPatch>,
    pub exceptions: Option<ExceptionsPatch>,
    pub unstable: Option<UnstablePatch>,
    pub replacements: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LocalePatch {
    pub default: Option<String>,
    pub per_issuer: Option<bool>,
    pub supported: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct HelpPatch {
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ExceptionsPatch {
    pub log_unhandled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct UnstablePatch {
    pub apis: Option<Vec<String>>,
}

fn merge_unique(values: Vec<String>, existing: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values.into_iter().chain(existing.iter().cloned()) {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

fn env_bool<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<bool> {
    lookup(key).map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_usize<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Result<Option<usize>> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|err| CommandError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

fn env_list<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<Vec<String>> {
    lookup(key).map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
}
