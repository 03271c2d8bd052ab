//! Command declarations and the builder API command sets use to produce them.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::conditions::ConditionSpec;
use crate::contexts::CommandContexts;
use crate::deps::Injector;
use crate::error::{CommandError, Result};
use crate::issuer::IssuerRef;
use crate::locale::Locale;
use crate::manager::{CommandManager, CommandRequest};
use crate::message::{MessageKey, MessageType, Replacements, keys};
use crate::operation::{CommandOperationContext, OperationStack};
use crate::params::{CommandArgs, ParameterDescriptor};
use crate::replacements::CommandReplacements;

pub type CommandHandler = Arc<dyn Fn(&CommandInvocation) -> anyhow::Result<()> + Send + Sync>;

/// A group of declarations sharing a root command.
///
/// `root` may name aliases, `"region|rg"`. `inject` runs once, before
/// `declare`, with access to the manager's dependency registry.
pub trait CommandSet: Send + Sync + 'static {
    fn root(&self) -> &str;

    fn inject(&mut self, _deps: &Injector<'_>) -> Result<()> {
        Ok(())
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations);
}

/// A handler failure as seen by exception handlers.
pub struct HandlerFailure<'a> {
    pub command: &'a CommandDeclaration,
    pub operation: &'a CommandOperationContext,
    pub args: &'a CommandArgs,
    pub error: &'a anyhow::Error,
}

impl HandlerFailure<'_> {
    #[must_use]
    pub fn issuer(&self) -> &IssuerRef {
        self.operation.issuer()
    }
}

/// Offered handler failures before the generic error message is shown.
/// Returning `true` marks the failure handled.
pub trait ExceptionHandler: Send + Sync {
    fn handle(&self, failure: &HandlerFailure<'_>) -> bool;
}

impl<F> ExceptionHandler for F
where
    F: Fn(&HandlerFailure<'_>) -> bool + Send + Sync,
{
    fn handle(&self, failure: &HandlerFailure<'_>) -> bool {
        self(failure)
    }
}

/// Immutable description of one invocable handler.
pub struct CommandDeclaration {
    root: String,
    sub_path: Vec<String>,
    alternates: Vec<Vec<String>>,
    params: Vec<ParameterDescriptor>,
    permission: String,
    conditions: Vec<ConditionSpec>,
    description: String,
    syntax: String,
    allow_trailing: bool,
    catch_unknown: bool,
    private: bool,
    owner: &'static str,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
    handler: CommandHandler,
}

impl fmt::Debug for CommandDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDeclaration")
            .field("command", &self.command_string())
            .field("params", &self.params)
            .field("permission", &self.permission)
            .field("conditions", &self.conditions)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl CommandDeclaration {
    /// Canonical root name.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Sub-command tokens, empty for the root default.
    #[must_use]
    pub fn sub_path(&self) -> &[String] {
        &self.sub_path
    }

    /// Every path this declaration is bound under, primary first.
    pub fn paths(&self) -> impl Iterator<Item = &[String]> {
        std::iter::once(self.sub_path.as_slice()).chain(self.alternates.iter().map(Vec::as_slice))
    }

    #[must_use]
    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    /// Comma-separated permission nodes, all required.
    #[must_use]
    pub fn permission(&self) -> &str {
        &self.permission
    }

    #[must_use]
    pub fn conditions(&self) -> &[ConditionSpec] {
        &self.conditions
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parameter syntax, e.g. `<name> [radius]`.
    #[must_use]
    pub fn syntax(&self) -> &str {
        &self.syntax
    }

    #[must_use]
    pub const fn allows_trailing(&self) -> bool {
        self.allow_trailing
    }

    #[must_use]
    pub const fn is_catch_unknown(&self) -> bool {
        self.catch_unknown
    }

    /// Private declarations are routable but hidden from help and completion.
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.private
    }

    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.sub_path.is_empty() && !self.catch_unknown
    }

    /// Type name of the command set that declared this command.
    #[must_use]
    pub const fn owner(&self) -> &'static str {
        self.owner
    }

    #[must_use]
    pub fn exception_handler(&self) -> Option<&Arc<dyn ExceptionHandler>> {
        self.exception_handler.as_ref()
    }

    #[must_use]
    pub const fn handler(&self) -> &CommandHandler {
        &self.handler
    }

    /// `root sub path`, as typed by a user.
    #[must_use]
    pub fn command_string(&self) -> String {
        if self.sub_path.is_empty() {
            self.root.clone()
        } else {
            format!("{} {}", self.root, self.sub_path.join(" "))
        }
    }
}

/// Collects a command set's declarations.
pub struct Declarations {
    permission: Option<String>,
    conditions: Option<String>,
    builders: Vec<DeclarationBuilder>,
}

impl Declarations {
    pub(crate) const fn new() -> Self {
        Self {
            permission: None,
            conditions: None,
            builders: Vec::new(),
        }
    }

    /// Permission required by every command of the set, in addition to
    /// each command's own.
    pub fn permission(&mut self, permission: impl Into<String>) -> &mut Self {
        self.permission = Some(permission.into());
        self
    }

    /// Conditions checked before each command's own.
    pub fn conditions(&mut self, conditions: impl Into<String>) -> &mut Self {
        self.conditions = Some(conditions.into());
        self
    }

    /// Declare a sub-command. `"set region|setregion"` binds two paths.
    pub fn command(&mut self, sub_path: impl Into<String>) -> &mut DeclarationBuilder {
        self.builders.push(DeclarationBuilder::new(sub_path.into()));
        let last = self.builders.len() - 1;
        &mut self.builders[last]
    }

    /// The handler for the bare root.
    pub fn default_command(&mut self) -> &mut DeclarationBuilder {
        self.command("")
    }

    /// Receives input matching no sub-command.
    pub fn catch_unknown(&mut self) -> &mut DeclarationBuilder {
        let builder = self.command("");
        builder.catch_unknown = true;
        builder
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Validate and freeze every builder. Fails without producing anything
    /// if any declaration is malformed.
    pub(crate) fn build(
        self,
        root: &str,
        owner: &'static str,
        replacements: &CommandReplacements,
        contexts: &CommandContexts,
    ) -> Result<Vec<CommandDeclaration>> {
        let shared = Shared {
            root,
            owner,
            permission: self.permission.as_deref(),
            conditions: self.conditions.as_deref(),
        };
        self.builders
            .into_iter()
            .map(|builder| builder.build(&shared, replacements, contexts))
            .collect()
    }
}

struct Shared<'a> {
    root: &'a str,
    owner: &'static str,
    permission: Option<&'a str>,
    conditions: Option<&'a str>,
}

/// Chained configuration for one declaration.
pub struct DeclarationBuilder {
    sub_path: String,
    params: Vec<ParameterDescriptor>,
    permission: Option<String>,
    conditions: Option<String>,
    description: String,
    syntax: Option<String>,
    allow_trailing: bool,
    catch_unknown: bool,
    private: bool,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
    handler: Option<CommandHandler>,
}

impl DeclarationBuilder {
    fn new(sub_path: String) -> Self {
        Self {
            sub_path,
            params: Vec::new(),
            permission: None,
            conditions: None,
            description: String::new(),
            syntax: None,
            allow_trailing: false,
            catch_unknown: false,
            private: false,
            exception_handler: None,
            handler: None,
        }
    }

    pub fn param(&mut self, param: ParameterDescriptor) -> &mut Self {
        self.params.push(param);
        self
    }

    pub fn permission(&mut self, permission: impl Into<String>) -> &mut Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn conditions(&mut self, conditions: impl Into<String>) -> &mut Self {
        self.conditions = Some(conditions.into());
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    /// Replace the syntax line computed from the parameters.
    pub fn syntax(&mut self, syntax: impl Into<String>) -> &mut Self {
        self.syntax = Some(syntax.into());
        self
    }

    /// Accept tokens left over after the last parameter.
    pub const fn allow_trailing(&mut self) -> &mut Self {
        self.allow_trailing = true;
        self
    }

    pub const fn private(&mut self) -> &mut Self {
        self.private = true;
        self
    }

    pub fn exception_handler<H: ExceptionHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.exception_handler = Some(Arc::new(handler));
        self
    }

    pub fn handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&CommandInvocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    fn build(
        self,
        shared: &Shared<'_>,
        replacements: &CommandReplacements,
        contexts: &CommandContexts,
    ) -> Result<CommandDeclaration> {
        let sub_path_raw = replacements.replace(&self.sub_path).to_lowercase();
        let mut paths = sub_path_raw.split('|').map(|alt| {
            alt.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<String>>()
        });
        let sub_path = paths.next().unwrap_or_default();
        let alternates: Vec<Vec<String>> = paths.filter(|p| !p.is_empty()).collect();
        let command = if sub_path.is_empty() {
            shared.root.to_string()
        } else {
            format!("{} {}", shared.root, sub_path.join(" "))
        };

        let Some(handler) = self.handler else {
            return Err(CommandError::InvalidDeclaration(format!(
                "'{command}' declares no handler"
            )));
        };

        let mut params = self.params;
        for param in &mut params {
            param.completion = param.completion.as_deref().map(|c| replacements.replace(c));
            param.permission = param.permission.as_deref().map(|p| replacements.replace(p));
            param.description = replacements.replace(&param.description);
            for spec in &mut param.conditions {
                spec.config = spec.config.as_deref().map(|c| replacements.replace(c));
            }
        }
        validate_params(&command, &params, contexts)?;

        let permission = [shared.permission, self.permission.as_deref()]
            .into_iter()
            .flatten()
            .map(|p| replacements.replace(p))
            .flat_map(|p| {
                p.split(',')
                    .map(str::trim)
                    .filter(|node| !node.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .join(",");

        let conditions = [shared.conditions, self.conditions.as_deref()]
            .into_iter()
            .flatten()
            .flat_map(|c| ConditionSpec::parse_list(&replacements.replace(c)))
            .collect();

        let syntax = self.syntax.map_or_else(
            || {
                params
                    .iter()
                    .filter_map(|p| contexts.syntax_for(p))
                    .collect::<Vec<_>>()
                    .join(" ")
            },
            |s| replacements.replace(&s),
        );

        Ok(CommandDeclaration {
            root: shared.root.to_string(),
            sub_path,
            alternates,
            params,
            permission,
            conditions,
            description: replacements.replace(&self.description),
            syntax,
            allow_trailing: self.allow_trailing,
            catch_unknown: self.catch_unknown,
            private: self.private,
            owner: shared.owner,
            exception_handler: self.exception_handler,
            handler,
        })
    }
}

fn validate_params(
    command: &str,
    params: &[ParameterDescriptor],
    contexts: &CommandContexts,
) -> Result<()> {
    let last = params.len().saturating_sub(1);
    for (index, param) in params.iter().enumerate() {
        if param.consumes_rest && index != last {
            return Err(CommandError::InvalidDeclaration(format!(
                "'{command}': parameter '{}' consumes the rest of the input but is not last",
                param.name
            )));
        }
        if !contexts.contains(&param.type_tag) {
            return Err(CommandError::InvalidDeclaration(format!(
                "'{command}': no resolver registered for type '{}' of parameter '{}'",
                param.type_tag, param.name
            )));
        }
        if params[..index].iter().any(|p| p.name == param.name) {
            return Err(CommandError::InvalidDeclaration(format!(
                "'{command}': duplicate parameter '{}'",
                param.name
            )));
        }
    }
    Ok(())
}

/// What a handler receives: the resolved arguments plus access to the
/// invocation's context.
pub struct CommandInvocation {
    operation: Rc<CommandOperationContext>,
    args: CommandArgs,
    stack: OperationStack,
}

impl fmt::Debug for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandInvocation")
            .field("operation", &self.operation)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl CommandInvocation {
    pub(crate) const fn new(
        operation: Rc<CommandOperationContext>,
        args: CommandArgs,
        stack: OperationStack,
    ) -> Self {
        Self {
            operation,
            args,
            stack,
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &IssuerRef {
        self.operation.issuer()
    }

    #[must_use]
    pub const fn args(&self) -> &CommandArgs {
        &self.args
    }

    #[must_use]
    pub fn manager(&self) -> &CommandManager {
        self.operation.manager()
    }

    #[must_use]
    pub fn operation(&self) -> &Rc<CommandOperationContext> {
        &self.operation
    }

    /// The stack this invocation runs on.
    #[must_use]
    pub const fn stack(&self) -> &OperationStack {
        &self.stack
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.operation.is_async()
    }

    #[must_use]
    pub fn locale(&self) -> Locale {
        self.manager().issuer_locale(&**self.issuer())
    }

    /// Run another command for the same issuer on the same stack.
    pub fn execute<S: AsRef<str>>(&self, label: &str, args: &[S]) -> bool {
        let mut request = CommandRequest::new(Arc::clone(self.issuer()), label, args);
        if self.is_async() {
            request = request.in_async();
        }
        self.manager().execute_on(&self.stack, request)
    }

    pub fn send_message(&self, category: MessageType, key: &MessageKey, replacements: &Replacements) {
        self.manager()
            .send_message(&**self.issuer(), category, key, replacements);
    }

    pub fn send_info(&self, key: &MessageKey, replacements: &Replacements) {
        self.send_message(MessageType::Info, key, replacements);
    }

    pub fn send_error(&self, key: &MessageKey, replacements: &Replacements) {
        self.send_message(MessageType::Error, key, replacements);
    }

    pub fn send_syntax(&self, key: &MessageKey, replacements: &Replacements) {
        self.send_message(MessageType::Syntax, key, replacements);
    }

    /// Send literal text in the info category.
    pub fn reply(&self, message: impl fmt::Display) {
        self.send_info(
            &keys::INFO_MESSAGE,
            &Replacements::new().with("message", message),
        );
    }
}
