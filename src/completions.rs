//! Tab-completion providers.
//!
//! A parameter's completion source is, in order of preference: its
//! explicit `completion` (`@id[:config]` or a `|`-separated literal list),
//! its allowed `values`, then the provider registered as the default for
//! its type tag.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::command::CommandDeclaration;
use crate::issuer::IssuerRef;
use crate::manager::CommandManager;
use crate::params::{CommandArgs, ParameterDescriptor};

/// Everything a provider may consult for one parameter.
pub struct CompletionContext<'a> {
    manager: &'a CommandManager,
    issuer: &'a IssuerRef,
    command: &'a CommandDeclaration,
    param: &'a ParameterDescriptor,
    input: &'a str,
    config: Option<&'a str>,
    passed: &'a CommandArgs,
}

impl<'a> CompletionContext<'a> {
    pub(crate) const fn new(
        manager: &'a CommandManager,
        issuer: &'a IssuerRef,
        command: &'a CommandDeclaration,
        param: &'a ParameterDescriptor,
        input: &'a str,
        passed: &'a CommandArgs,
    ) -> Self {
        Self {
            manager,
            issuer,
            command,
            param,
            input,
            config: None,
            passed,
        }
    }

    #[must_use]
    pub const fn manager(&self) -> &CommandManager {
        self.manager
    }

    #[must_use]
    pub const fn issuer(&self) -> &IssuerRef {
        self.issuer
    }

    #[must_use]
    pub const fn command(&self) -> &CommandDeclaration {
        self.command
    }

    #[must_use]
    pub const fn param(&self) -> &ParameterDescriptor {
        self.param
    }

    /// The partial token being completed.
    #[must_use]
    pub const fn input(&self) -> &str {
        self.input
    }

    /// Text after the `:` of `@id:config`.
    #[must_use]
    pub const fn config(&self) -> Option<&str> {
        self.config
    }

    /// Arguments that resolved from the preceding tokens. Parameters that
    /// failed to resolve are present as `Missing`.
    #[must_use]
    pub const fn passed_args(&self) -> &CommandArgs {
        self.passed
    }
}

/// Produces candidate completions for one parameter.
pub trait CompletionProvider: Send + Sync {
    fn complete(&self, ctx: &CompletionContext<'_>) -> Vec<String>;

    /// Whether results are filtered against the partial input afterwards.
    fn filters_by_prefix(&self) -> bool {
        true
    }
}

impl<F> CompletionProvider for F
where
    F: Fn(&CompletionContext<'_>) -> Vec<String> + Send + Sync,
{
    fn complete(&self, ctx: &CompletionContext<'_>) -> Vec<String> {
        self(ctx)
    }
}

/// Completion id → provider registry, plus type-tag defaults.
pub struct CommandCompletions {
    providers: RwLock<HashMap<String, Arc<dyn CompletionProvider>>>,
    type_defaults: RwLock<HashMap<String, String>>,
}

impl fmt::Debug for CommandCompletions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<String> = self.providers.read().keys().cloned().collect();
        ids.sort();
        f.debug_struct("CommandCompletions").field("ids", &ids).finish()
    }
}

impl Default for CommandCompletions {
    fn default() -> Self {
        let completions = Self {
            providers: RwLock::new(HashMap::new()),
            type_defaults: RwLock::new(HashMap::new()),
        };
        completions.register_defaults();
        completions
    }
}

impl CommandCompletions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `@id`. A leading `@` on `id` is optional.
    pub fn register<P: CompletionProvider + 'static>(&self, id: &str, provider: P) {
        self.providers
            .write()
            .insert(normalize_id(id), Arc::new(provider));
    }

    /// Register a provider that ignores its context.
    pub fn register_static<I, S>(&self, id: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        self.register(id, move |_: &CompletionContext<'_>| values.clone());
    }

    /// Use `@id` for parameters of `type_tag` that name no source of their own.
    pub fn set_default_completion(&self, type_tag: &str, id: &str) {
        self.type_defaults
            .write()
            .insert(type_tag.to_lowercase(), normalize_id(id));
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.providers.read().contains_key(&normalize_id(id))
    }

    /// Candidates for `ctx.param()`, filtered against the partial input.
    #[must_use]
    pub fn complete(&self, ctx: &CompletionContext<'_>) -> Vec<String> {
        let param = ctx.param();
        if let Some(source) = param.completion.as_deref().map(str::trim) {
            if let Some(spec) = source.strip_prefix('@') {
                let (id, config) = match spec.split_once(':') {
                    Some((id, cfg)) => (id, Some(cfg)),
                    None => (spec, None),
                };
                return self.run_provider(id, config, ctx);
            }
            let literals: Vec<String> = source
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            return filter_prefix(literals, ctx.input());
        }
        if !param.values.is_empty() {
            return filter_prefix(param.values.clone(), ctx.input());
        }
        let default_id = self.type_defaults.read().get(&param.type_tag).cloned();
        default_id.map_or_else(Vec::new, |id| self.run_provider(&id, None, ctx))
    }

    fn run_provider(&self, id: &str, config: Option<&str>, ctx: &CompletionContext<'_>) -> Vec<String> {
        let Some(provider) = self.providers.read().get(&normalize_id(id)).cloned() else {
            warn!(completion = id, param = %ctx.param().name, "unknown completion provider");
            return Vec::new();
        };
        let scoped = CompletionContext { config, ..*ctx };
        let candidates = match catch_unwind(AssertUnwindSafe(|| provider.complete(&scoped))) {
            Ok(candidates) => candidates,
            Err(_) => {
                warn!(completion = id, "completion provider panicked");
                return Vec::new();
            }
        };
        trace!(completion = id, count = candidates.len(), "completion candidates");
        if provider.filters_by_prefix() {
            filter_prefix(candidates, ctx.input())
        } else {
            candidates
        }
    }

    fn register_defaults(&self) {
        self.register("nothing", |_: &CompletionContext<'_>| Vec::new());
        self.register_static("bool", ["true", "false"]);
        self.register("range", range);
        self.register("locales", |ctx: &CompletionContext<'_>| {
            ctx.manager()
                .locales()
                .supported_languages()
                .iter()
                .map(ToString::to_string)
                .collect()
        });
        self.register("subcommands", |ctx: &CompletionContext<'_>| {
            let root = ctx.config().unwrap_or_else(|| ctx.command().root());
            ctx.manager().subcommand_names(root)
        });
        self.set_default_completion("bool", "bool");
    }
}

/// Most values `@range` will offer.
const RANGE_LIMIT: usize = 1000;

/// `@range:a-b` lists the integers in the inclusive range, from `a` up to
/// [`RANGE_LIMIT`] of them.
fn range(ctx: &CompletionContext<'_>) -> Vec<String> {
    let Some((lo, hi)) = ctx.config().and_then(parse_range) else {
        return Vec::new();
    };
    range_values(lo, hi)
}

fn range_values(lo: i64, hi: i64) -> Vec<String> {
    if hi.abs_diff(lo) >= RANGE_LIMIT as u64 {
        trace!(lo, hi, limit = RANGE_LIMIT, "range completion truncated");
    }
    (lo..=hi).take(RANGE_LIMIT).map(|n| n.to_string()).collect()
}

fn parse_range(config: &str) -> Option<(i64, i64)> {
    // The separating dash is the first one after the first character, so
    // negative lower bounds still parse.
    let split = config.char_indices().skip(1).find(|(_, c)| *c == '-')?.0;
    let lo = config[..split].trim().parse::<i64>().ok()?;
    let hi = config[split + 1..].trim().parse::<i64>().ok()?;
    (lo <= hi).then_some((lo, hi))
}

fn normalize_id(id: &str) -> String {
    id.trim().trim_start_matches('@').to_lowercase()
}

/// Keep candidates starting with `input`, ignoring case.
#[must_use]
pub fn filter_prefix(candidates: Vec<String>, input: &str) -> Vec<String> {
    if input.is_empty() {
        return candidates;
    }
    let needle = input.to_lowercase();
    candidates
        .into_iter()
        .filter(|c| c.to_lowercase().starts_with(&needle))
        .collect()
}
