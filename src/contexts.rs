//! Parameter context resolvers: strategies that turn raw tokens into values.
//!
//! Resolution is pull-based. Each resolver takes as many tokens as it needs
//! from the front of the remaining input, so multi-token types (a coordinate
//! pair, a duration like `5 minutes`) need no grammar of their own.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::command::CommandDeclaration;
use crate::error::{CommandError, Result};
use crate::issuer::IssuerRef;
use crate::message::{Replacements, keys};
use crate::operation::CommandOperationContext;
use crate::params::{ArgValue, CommandArgs, ParameterDescriptor};

/// View of the invocation handed to a resolver for one parameter.
pub struct ExecutionContext<'a> {
    command: &'a CommandDeclaration,
    param: &'a ParameterDescriptor,
    index: usize,
    operation: &'a CommandOperationContext,
    args: &'a mut VecDeque<String>,
    passed: &'a CommandArgs,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) const fn new(
        command: &'a CommandDeclaration,
        param: &'a ParameterDescriptor,
        index: usize,
        operation: &'a CommandOperationContext,
        args: &'a mut VecDeque<String>,
        passed: &'a CommandArgs,
    ) -> Self {
        Self {
            command,
            param,
            index,
            operation,
            args,
            passed,
        }
    }

    #[must_use]
    pub const fn command(&self) -> &CommandDeclaration {
        self.command
    }

    #[must_use]
    pub const fn param(&self) -> &ParameterDescriptor {
        self.param
    }

    /// Zero-based position of the parameter in its declaration.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn issuer(&self) -> &IssuerRef {
        self.operation.issuer()
    }

    #[must_use]
    pub const fn operation(&self) -> &CommandOperationContext {
        self.operation
    }

    /// Values bound to earlier parameters.
    #[must_use]
    pub const fn passed_args(&self) -> &CommandArgs {
        self.passed
    }

    #[must_use]
    pub fn first_arg(&self) -> Option<&str> {
        self.args.front().map(String::as_str)
    }

    pub fn pop_first_arg(&mut self) -> Option<String> {
        self.args.pop_front()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.args.len()
    }

    /// Take every remaining token.
    pub fn drain_args(&mut self) -> Vec<String> {
        self.args.drain(..).collect()
    }

    /// Take every remaining token, joined by single spaces.
    pub fn join_args(&mut self) -> String {
        self.drain_args().join(" ")
    }

    #[must_use]
    pub fn is_last_param(&self) -> bool {
        self.index + 1 == self.command.params().len()
    }

    /// Whether this parameter should swallow the rest of the input.
    #[must_use]
    pub fn consumes_rest(&self) -> bool {
        self.param.consumes_rest
    }

    /// Pop one token, failing with too-few-arguments if none is left.
    pub fn require_arg(&mut self) -> Result<String> {
        self.pop_first_arg()
            .ok_or_else(|| CommandError::TooFewArguments {
                param: self.param.name.clone(),
            })
    }

    /// Binding failure for this parameter.
    pub fn invalid(&self, raw: impl Into<String>) -> CommandError {
        CommandError::invalid_value(&self.param.name, raw)
    }
}

/// Converts tokens into a value for one parameter type.
pub trait ContextResolver: Send + Sync {
    fn resolve(&self, ctx: &mut ExecutionContext<'_>) -> Result<ArgValue>;

    /// Resolvers that bind from the invocation itself (the issuer) take no
    /// input and never appear in syntax lines.
    fn consumes_input(&self) -> bool {
        true
    }

    /// Display form used in syntax lines and help. `None` means the
    /// descriptor's own form.
    fn syntax(&self, _param: &ParameterDescriptor) -> Option<String> {
        None
    }
}

impl<F> ContextResolver for F
where
    F: Fn(&mut ExecutionContext<'_>) -> Result<ArgValue> + Send + Sync,
{
    fn resolve(&self, ctx: &mut ExecutionContext<'_>) -> Result<ArgValue> {
        self(ctx)
    }
}

/// Binds the invoking issuer without consuming input.
#[derive(Debug, Clone, Copy, Default)]
pub struct IssuerResolverContext;

impl ContextResolver for IssuerResolverContext {
    fn resolve(&self, ctx: &mut ExecutionContext<'_>) -> Result<ArgValue> {
        Ok(ArgValue::Issuer(Arc::clone(ctx.issuer())))
    }

    fn consumes_input(&self) -> bool {
        false
    }
}

/// Type tag → resolver registry.
pub struct CommandContexts {
    resolvers: RwLock<HashMap<String, Arc<dyn ContextResolver>>>,
}

impl fmt::Debug for CommandContexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<String> = self.resolvers.read().keys().cloned().collect();
        tags.sort();
        f.debug_struct("CommandContexts").field("tags", &tags).finish()
    }
}

impl Default for CommandContexts {
    fn default() -> Self {
        let contexts = Self {
            resolvers: RwLock::new(HashMap::new()),
        };
        contexts.register_defaults();
        contexts
    }
}

impl CommandContexts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver for `type_tag`, replacing any existing one.
    pub fn register<R: ContextResolver + 'static>(&self, type_tag: &str, resolver: R) {
        self.register_arc(type_tag, Arc::new(resolver));
    }

    pub fn register_arc(&self, type_tag: &str, resolver: Arc<dyn ContextResolver>) {
        self.resolvers
            .write()
            .insert(type_tag.to_lowercase(), resolver);
    }

    #[must_use]
    pub fn get(&self, type_tag: &str) -> Option<Arc<dyn ContextResolver>> {
        self.resolvers.read().get(type_tag).cloned()
    }

    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.resolvers.read().contains_key(type_tag)
    }

    /// Syntax fragment for `param`, or `None` if it takes no input.
    #[must_use]
    pub fn syntax_for(&self, param: &ParameterDescriptor) -> Option<String> {
        let resolver = self.get(&param.type_tag);
        if let Some(resolver) = &resolver {
            if !resolver.consumes_input() {
                return None;
            }
            if let Some(syntax) = resolver.syntax(param) {
                return Some(syntax);
            }
        }
        Some(
            param
                .syntax
                .clone()
                .unwrap_or_else(|| param.default_syntax()),
        )
    }

    fn register_defaults(&self) {
        self.register("string", resolve_string);
        self.register("text", |ctx: &mut ExecutionContext<'_>| {
            Ok(ArgValue::Str(ctx.join_args()))
        });
        self.register("list", |ctx: &mut ExecutionContext<'_>| {
            Ok(ArgValue::List(ctx.drain_args()))
        });
        self.register("int", resolve_int);
        self.register("float", resolve_float);
        self.register("bool", resolve_bool);
        self.register("uuid", |ctx: &mut ExecutionContext<'_>| {
            let raw = ctx.require_arg()?;
            Uuid::parse_str(&raw)
                .map(ArgValue::Uuid)
                .map_err(|_| ctx.invalid(raw))
        });
        self.register("issuer", IssuerResolverContext);
    }
}

fn resolve_string(ctx: &mut ExecutionContext<'_>) -> Result<ArgValue> {
    if ctx.consumes_rest() {
        return Ok(ArgValue::Str(ctx.join_args()));
    }
    ctx.require_arg().map(ArgValue::Str)
}

fn resolve_int(ctx: &mut ExecutionContext<'_>) -> Result<ArgValue> {
    let raw = ctx.require_arg()?;
    raw.parse::<i64>().map(ArgValue::Int).map_err(|_| {
        CommandError::invalid_value_with(
            &ctx.param().name,
            &raw,
            keys::MUST_BE_A_NUMBER,
            Replacements::new().with("num", &raw),
        )
    })
}

fn resolve_float(ctx: &mut ExecutionContext<'_>) -> Result<ArgValue> {
    let raw = ctx.require_arg()?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(ArgValue::Float(value)),
        _ => Err(CommandError::invalid_value_with(
            &ctx.param().name,
            &raw,
            keys::MUST_BE_A_NUMBER,
            Replacements::new().with("num", &raw),
        )),
    }
}

fn resolve_bool(ctx: &mut ExecutionContext<'_>) -> Result<ArgValue> {
    let raw = ctx.require_arg()?;
    match raw.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(ArgValue::Bool(true)),
        "false" | "no" | "off" | "0" => Ok(ArgValue::Bool(false)),
        _ => Err(CommandError::invalid_value_with(
            &ctx.param().name,
            &raw,
            keys::PLEASE_SPECIFY_ONE_OF,
            Replacements::new().with("valid", "true, false"),
        )),
    }
}
