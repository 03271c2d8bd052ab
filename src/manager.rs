//! The command manager: registries, the command tree, and the host-facing
//! entry points for execution, completion, help, and messaging.

use std::any::{Any, type_name};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::command::{CommandSet, Declarations, ExceptionHandler};
use crate::completions::CommandCompletions;
use crate::conditions::CommandConditions;
use crate::config::Config;
use crate::contexts::CommandContexts;
use crate::deps::{Dependencies, Injector};
use crate::error::{CommandError, Result};
use crate::help::{CommandHelp, DefaultHelpFormatter, HelpFormatter};
use crate::issuer::{CommandIssuer, IssuerRef};
use crate::locale::{IssuerLocales, Locale, Locales};
use crate::message::{
    DefaultFormatter, MessageFormatter, MessageKey, MessageType, Palette, RenderEnv,
    RenderedMessage, Replacements,
};
use crate::operation::{CommandOperationContext, OperationStack};
use crate::replacements::CommandReplacements;
use crate::router;
use crate::tree::CommandTree;

/// One invocation as handed to [`CommandManager::execute_on`].
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub issuer: IssuerRef,
    pub label: String,
    pub args: Vec<String>,
    /// Bookkeeping only; visible to handlers, conditions, and exception handlers.
    pub is_async: bool,
}

impl CommandRequest {
    pub fn new<S: AsRef<str>>(issuer: IssuerRef, label: &str, args: &[S]) -> Self {
        Self {
            issuer,
            label: label.to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            is_async: false,
        }
    }

    /// Split a raw command line: the first word is the label.
    #[must_use]
    pub fn parse(issuer: IssuerRef, line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let label = words.next()?;
        let args: Vec<&str> = words.collect();
        Some(Self::new(issuer, label.trim_start_matches('/'), &args))
    }

    #[must_use]
    pub const fn in_async(mut self) -> Self {
        self.is_async = true;
        self
    }
}

struct ManagerInner {
    tree: RwLock<CommandTree>,
    deps: RwLock<Dependencies>,
    contexts: CommandContexts,
    completions: CommandCompletions,
    conditions: CommandConditions,
    replacements: CommandReplacements,
    locales: Locales,
    issuer_locales: IssuerLocales,
    formatter: DefaultFormatter,
    custom_formatter: RwLock<Option<Arc<dyn MessageFormatter>>>,
    help_formatter: RwLock<Arc<dyn HelpFormatter>>,
    help_per_page: AtomicUsize,
    command_prefix: RwLock<String>,
    default_exception_handler: RwLock<Option<Arc<dyn ExceptionHandler>>>,
    log_unhandled: AtomicBool,
    unstable_apis: RwLock<HashSet<String>>,
}

/// Shared handle to one command framework instance. Cloning is cheap.
#[derive(Clone)]
pub struct CommandManager {
    inner: Arc<ManagerInner>,
}

impl fmt::Debug for CommandManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.inner.tree.read();
        f.debug_struct("CommandManager")
            .field("roots", &tree.roots().map(|r| r.name().to_string()).collect::<Vec<_>>())
            .field("default_locale", &self.inner.locales.default_locale())
            .field("per_issuer_locale", &self.inner.issuer_locales.is_enabled())
            .finish_non_exhaustive()
    }
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandManager {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    #[must_use]
    pub fn with_config(config: &Config) -> Self {
        let default_locale = Locale::new(&config.locale.default);
        let locales = Locales::with_defaults(default_locale);
        if !config.locale.supported.is_empty() {
            locales.set_supported_languages(config.locale.supported.iter().map(Locale::new).collect());
        }
        let replacements = CommandReplacements::new();
        replacements.add_all(config.replacements.iter().map(|(k, v)| (k.as_str(), v.clone())));

        let inner = ManagerInner {
            tree: RwLock::new(CommandTree::new()),
            deps: RwLock::new(Dependencies::new()),
            contexts: CommandContexts::new(),
            completions: CommandCompletions::new(),
            conditions: CommandConditions::new(),
            replacements,
            locales,
            issuer_locales: IssuerLocales::new(config.locale.per_issuer),
            formatter: DefaultFormatter::new(),
            custom_formatter: RwLock::new(None),
            help_formatter: RwLock::new(Arc::new(DefaultHelpFormatter)),
            help_per_page: AtomicUsize::new(config.help.per_page.max(1)),
            command_prefix: RwLock::new(String::new()),
            default_exception_handler: RwLock::new(None),
            log_unhandled: AtomicBool::new(config.exceptions.log_unhandled),
            unstable_apis: RwLock::new(
                config.unstable.apis.iter().map(|a| a.to_lowercase()).collect(),
            ),
        };
        debug!(default_locale = %config.locale.default, "command manager created");
        Self {
            inner: Arc::new(inner),
        }
    }

    // Registration

    /// Inject dependencies into `set`, then register its declarations.
    /// Nothing from the set becomes routable if any step fails.
    pub fn register_command<S: CommandSet>(&self, mut set: S) -> Result<()> {
        let owner = type_name::<S>();
        {
            let deps = self.inner.deps.read();
            set.inject(&Injector::new(&deps, owner))?;
        }
        self.install(Arc::new(set), owner)
    }

    /// Build a command set from the dependency registry, then register it.
    pub fn register_command_with<S, F>(&self, factory: F) -> Result<()>
    where
        S: CommandSet,
        F: FnOnce(&Injector<'_>) -> Result<S>,
    {
        let owner = type_name::<S>();
        let set = {
            let deps = self.inner.deps.read();
            let injector = Injector::new(&deps, owner);
            let mut set = factory(&injector)?;
            set.inject(&injector)?;
            set
        };
        self.install(Arc::new(set), owner)
    }

    fn install<S: CommandSet>(&self, set: Arc<S>, owner: &'static str) -> Result<()> {
        let names: Vec<String> = self
            .inner
            .replacements
            .replace(set.root())
            .split('|')
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        let Some(primary) = names.first().cloned() else {
            return Err(CommandError::InvalidDeclaration(format!(
                "{owner} declares no root command"
            )));
        };

        let mut declarations = Declarations::new();
        Arc::clone(&set).declare(&mut declarations);
        let built = declarations.build(
            &primary,
            owner,
            &self.inner.replacements,
            &self.inner.contexts,
        )?;
        for decl in &built {
            for param in decl.params() {
                if let Some(id) = param.completion.as_deref().and_then(|c| c.strip_prefix('@')) {
                    let id = id.split(':').next().unwrap_or(id);
                    if !self.inner.completions.contains(id) {
                        warn!(
                            command = %decl.command_string(),
                            param = %param.name,
                            completion = id,
                            "parameter names an unregistered completion"
                        );
                    }
                }
            }
        }

        let count = built.len();
        let mut tree = self.inner.tree.write();
        let root = tree.obtain_root(&primary);
        for decl in built {
            root.register(Arc::new(decl));
        }
        for alias in &names[1..] {
            tree.add_alias(&primary, alias);
        }
        info!(root = %primary, aliases = names.len() - 1, commands = count, owner, "registered command set");
        Ok(())
    }

    #[must_use]
    pub fn has_registered_commands(&self) -> bool {
        !self.inner.tree.read().is_empty()
    }

    /// Canonical names of every root command, in registration order.
    #[must_use]
    pub fn root_names(&self) -> Vec<String> {
        self.inner
            .tree
            .read()
            .roots()
            .map(|r| r.name().to_string())
            .collect()
    }

    /// First-level sub-command names of `root`.
    #[must_use]
    pub fn subcommand_names(&self, root: &str) -> Vec<String> {
        self.inner
            .tree
            .read()
            .get_root(root)
            .map(crate::tree::RootCommand::sub_command_names)
            .unwrap_or_default()
    }

    pub fn register_dependency<T: Any + Send + Sync>(&self, instance: T) -> Result<()> {
        self.inner.deps.write().register(instance)
    }

    /// Register an instance the caller keeps a handle to.
    pub fn register_dependency_arc<T: Any + Send + Sync>(&self, instance: Arc<T>) -> Result<()> {
        self.inner.deps.write().register_arc(type_name::<T>(), instance)
    }

    pub fn register_dependency_keyed<T: Any + Send + Sync>(&self, key: &str, instance: T) -> Result<()> {
        self.inner.deps.write().register_keyed(key, instance)
    }

    pub(crate) fn tree(&self) -> RwLockReadGuard<'_, CommandTree> {
        self.inner.tree.read()
    }

    #[must_use]
    pub fn command_contexts(&self) -> &CommandContexts {
        &self.inner.contexts
    }

    #[must_use]
    pub fn command_completions(&self) -> &CommandCompletions {
        &self.inner.completions
    }

    #[must_use]
    pub fn command_conditions(&self) -> &CommandConditions {
        &self.inner.conditions
    }

    #[must_use]
    pub fn command_replacements(&self) -> &CommandReplacements {
        &self.inner.replacements
    }

    // Execution

    /// Run `label args...` for `issuer` on the calling thread's stack.
    /// Returns `false` when no root command matches `label`.
    pub fn execute<S: AsRef<str>>(&self, issuer: &IssuerRef, label: &str, args: &[S]) -> bool {
        self.dispatch(CommandRequest::new(Arc::clone(issuer), label, args))
    }

    pub fn dispatch(&self, request: CommandRequest) -> bool {
        self.execute_on(&OperationStack::current(), request)
    }

    /// Run `request` on an explicit stack.
    pub fn execute_on(&self, stack: &OperationStack, request: CommandRequest) -> bool {
        router::dispatch(self, stack, request)
    }

    /// Candidates for `partial`, the token being typed after `preceding`.
    pub fn complete<S: AsRef<str>>(
        &self,
        issuer: &IssuerRef,
        label: &str,
        partial: &str,
        preceding: &[S],
    ) -> Vec<String> {
        let preceding: Vec<String> = preceding.iter().map(|s| s.as_ref().to_string()).collect();
        router::complete(self, &OperationStack::current(), issuer, label, &preceding, partial)
    }

    /// Conjunctive check of a comma-separated permission expression.
    /// An empty expression always passes.
    #[must_use]
    pub fn has_permission(&self, issuer: &dyn CommandIssuer, permission: &str) -> bool {
        permission
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .all(|p| issuer.has_permission(p))
    }

    /// Handler offered every uncaught handler failure after the
    /// declaration's own. Disabling logging requires a handler.
    pub fn set_default_exception_handler(
        &self,
        handler: Option<Arc<dyn ExceptionHandler>>,
        log_unhandled: bool,
    ) -> Result<()> {
        if handler.is_none() && !log_unhandled {
            return Err(CommandError::InvalidState(
                "cannot disable logging without a default exception handler".to_string(),
            ));
        }
        *self.inner.default_exception_handler.write() = handler;
        self.inner.log_unhandled.store(log_unhandled, Ordering::Release);
        Ok(())
    }

    pub(crate) fn default_exception_handler(&self) -> Option<Arc<dyn ExceptionHandler>> {
        self.inner.default_exception_handler.read().clone()
    }

    #[must_use]
    pub fn logs_unhandled(&self) -> bool {
        self.inner.log_unhandled.load(Ordering::Acquire)
    }

    // Current context

    /// Innermost operation on the calling thread's stack.
    #[must_use]
    pub fn current_operation() -> Option<Rc<CommandOperationContext>> {
        OperationStack::current().peek()
    }

    #[must_use]
    pub fn current_issuer() -> Option<IssuerRef> {
        Self::current_operation().map(|op| Arc::clone(op.issuer()))
    }

    #[must_use]
    pub fn current_manager() -> Option<Self> {
        Self::current_operation().map(|op| op.manager().clone())
    }

    // Locales

    #[must_use]
    pub fn locales(&self) -> &Locales {
        &self.inner.locales
    }

    /// The locale messages to `issuer` are rendered in.
    #[must_use]
    pub fn issuer_locale(&self, issuer: &dyn CommandIssuer) -> Locale {
        self.inner
            .issuer_locales
            .get(issuer)
            .unwrap_or_else(|| self.inner.locales.default_locale())
    }

    /// Store `locale` for `issuer`, notifying subscribers on change.
    pub fn set_issuer_locale(&self, issuer: &dyn CommandIssuer, locale: Locale) -> Option<Locale> {
        self.inner.issuer_locales.set(issuer, locale)
    }

    /// Returns the previous setting.
    pub fn use_per_issuer_locale(&self, enabled: bool) -> bool {
        self.inner.issuer_locales.set_enabled(enabled)
    }

    #[must_use]
    pub fn uses_per_issuer_locale(&self) -> bool {
        self.inner.issuer_locales.is_enabled()
    }

    pub fn on_locale_change<F>(&self, callback: F)
    where
        F: Fn(&dyn CommandIssuer, Option<&Locale>, &Locale) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.inner.issuer_locales.subscribe(Arc::new(callback));
    }

    // Messaging

    pub fn set_message_formatter(&self, formatter: Arc<dyn MessageFormatter>) {
        *self.inner.custom_formatter.write() = Some(formatter);
    }

    /// Replace the palette of one category.
    pub fn set_format(&self, category: MessageType, palette: Palette) {
        self.inner.formatter.set_format(category, palette);
    }

    #[must_use]
    pub fn format(&self, category: MessageType) -> Palette {
        self.inner.formatter.format(category)
    }

    pub fn set_default_format(&self, palette: Palette) {
        self.inner.formatter.set_default_format(palette);
    }

    #[must_use]
    pub fn format_for_locale(
        &self,
        locale: &Locale,
        category: MessageType,
        key: &MessageKey,
        replacements: &Replacements,
    ) -> RenderedMessage {
        let env = RenderEnv {
            locale,
            locales: &self.inner.locales,
            replacements: &self.inner.replacements,
        };
        let custom = self.inner.custom_formatter.read().clone();
        match custom {
            Some(formatter) => formatter.render(&env, category, key, replacements),
            None => self.inner.formatter.render(&env, category, key, replacements),
        }
    }

    #[must_use]
    pub fn format_message(
        &self,
        issuer: &dyn CommandIssuer,
        category: MessageType,
        key: &MessageKey,
        replacements: &Replacements,
    ) -> RenderedMessage {
        self.format_for_locale(&self.issuer_locale(issuer), category, key, replacements)
    }

    pub fn send_message(
        &self,
        issuer: &dyn CommandIssuer,
        category: MessageType,
        key: &MessageKey,
        replacements: &Replacements,
    ) {
        let message = self.format_message(issuer, category, key, replacements);
        issuer.deliver(&message);
    }

    /// Raw template for `key` in the issuer's locale.
    #[must_use]
    pub fn get_message(&self, issuer: &dyn CommandIssuer, key: &MessageKey) -> String {
        self.inner
            .locales
            .get_message(&self.issuer_locale(issuer), key)
    }

    /// Show `err` to `issuer` in the error category.
    pub fn show_invalid_runtime(&self, issuer: &dyn CommandIssuer, err: &CommandError) {
        let (key, replacements) = err.message();
        self.send_message(issuer, MessageType::Error, &key, &replacements);
    }

    // Unstable APIs

    pub fn enable_unstable_api(&self, api: &str) {
        self.inner.unstable_apis.write().insert(api.to_lowercase());
    }

    pub fn verify_unstable_api(&self, api: &str) -> Result<()> {
        if self.inner.unstable_apis.read().contains(&api.to_lowercase()) {
            Ok(())
        } else {
            Err(CommandError::UnsupportedFeature(api.to_string()))
        }
    }

    // Help

    /// Help for `root_label` as `issuer` may see it. Requires the `help`
    /// unstable API.
    pub fn generate_help(&self, issuer: &IssuerRef, root_label: &str) -> Result<CommandHelp> {
        self.verify_unstable_api("help")?;
        let tree = self.inner.tree.read();
        let root = tree
            .get_root(root_label)
            .ok_or_else(|| CommandError::UnknownCommand(root_label.to_string()))?;
        Ok(CommandHelp::new(self, issuer, root))
    }

    #[must_use]
    pub fn help_formatter(&self) -> Arc<dyn HelpFormatter> {
        Arc::clone(&self.inner.help_formatter.read())
    }

    pub fn set_help_formatter(&self, formatter: Arc<dyn HelpFormatter>) {
        *self.inner.help_formatter.write() = formatter;
    }

    #[must_use]
    pub fn default_help_per_page(&self) -> usize {
        self.inner.help_per_page.load(Ordering::Relaxed)
    }

    pub fn set_default_help_per_page(&self, per_page: usize) {
        self.inner.help_per_page.store(per_page.max(1), Ordering::Relaxed);
    }

    /// Prefix shown before command names in help, such as `/`.
    #[must_use]
    pub fn command_prefix(&self) -> String {
        self.inner.command_prefix.read().clone()
    }

    pub fn set_command_prefix(&self, prefix: impl Into<String>) {
        *self.inner.command_prefix.write() = prefix.into();
    }
}
