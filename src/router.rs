//! Lookup, gating, argument resolution, invocation, and failure routing.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, error, trace, warn};

use crate::command::{CommandDeclaration, CommandInvocation, HandlerFailure};
use crate::completions::CompletionContext;
use crate::contexts::ExecutionContext;
use crate::error::{CommandError, Result};
use crate::issuer::IssuerRef;
use crate::manager::{CommandManager, CommandRequest};
use crate::message::{MessageType, Replacements, keys};
use crate::operation::{CommandOperationContext, OperationStack};
use crate::params::{ArgValue, CommandArgs};

/// Failures collected while trying overloads.
#[derive(Default)]
struct FailureLog {
    failures: Vec<(CommandError, Arc<CommandDeclaration>)>,
}

impl FailureLog {
    fn record(&mut self, err: CommandError, decl: &Arc<CommandDeclaration>) {
        trace!(command = %decl.command_string(), error = %err, "candidate rejected");
        self.failures.push((err, Arc::clone(decl)));
    }

    /// The most specific failure; ties go to the earliest candidate.
    /// Resolution failures outrank condition failures, which outrank
    /// permission denials.
    fn into_best(self) -> Option<(CommandError, Arc<CommandDeclaration>)> {
        self.failures
            .into_iter()
            .rev()
            .max_by_key(|(err, _)| err.specificity())
    }
}

/// Run `request` on `stack`. Returns `false` only when no root matches the label.
pub(crate) fn dispatch(manager: &CommandManager, stack: &OperationStack, request: CommandRequest) -> bool {
    let CommandRequest {
        issuer,
        label,
        args,
        is_async,
    } = request;

    let route = {
        let tree = manager.tree();
        let Some(root) = tree.get_root(&label) else {
            debug!(%label, "no root command for label");
            return false;
        };
        (root.name().to_string(), root.route(&args))
    };
    let (root_name, route) = route;

    let operation = Rc::new(CommandOperationContext::new(
        manager.clone(),
        Arc::clone(&issuer),
        root_name,
        label.as_str(),
        args.clone(),
        is_async,
    ));
    let _guard = stack.push(Rc::clone(&operation));

    if route.candidates.is_empty() {
        let mut command = vec![label.clone()];
        command.extend(args.iter().cloned());
        report(manager, &issuer, &label, None, &CommandError::UnknownCommand(command.join(" ")));
        return true;
    }

    let tokens = &args[route.consumed..];
    let mut failures = FailureLog::default();
    for candidate in &route.candidates {
        operation.set_command(Arc::clone(candidate));
        let attempt = catch_unwind(AssertUnwindSafe(|| {
            gate_and_resolve(manager, &operation, candidate, tokens)
        }));
        let err = match attempt {
            Ok(Ok(resolved)) => {
                debug!(
                    command = %candidate.command_string(),
                    issuer = issuer.name(),
                    is_async,
                    "executing command"
                );
                invoke(manager, stack, &operation, candidate, resolved);
                return true;
            }
            Ok(Err(err)) if err.is_recoverable() => {
                failures.record(err, candidate);
                continue;
            }
            Ok(Err(err)) => anyhow::Error::new(err),
            Err(payload) => anyhow::anyhow!(
                "argument resolution panicked: {}",
                panic_message(&*payload)
            ),
        };
        handle_failure(manager, &operation, candidate, &CommandArgs::new(), err);
        return true;
    }

    if let Some((err, decl)) = failures.into_best() {
        debug!(%label, error = %err, "no candidate accepted the input");
        report(manager, &issuer, &label, Some(&decl), &err);
    }
    true
}

/// Permission, command conditions, then argument binding for one candidate.
fn gate_and_resolve(
    manager: &CommandManager,
    operation: &CommandOperationContext,
    candidate: &CommandDeclaration,
    tokens: &[String],
) -> Result<CommandArgs> {
    if !manager.has_permission(&**operation.issuer(), candidate.permission()) {
        return Err(CommandError::PermissionDenied {
            permission: candidate.permission().to_string(),
        });
    }
    manager
        .command_conditions()
        .validate(operation, candidate.conditions())?;
    resolve_arguments(manager, operation, candidate, tokens)
}

/// Bind `tokens` to `decl`'s parameters, left to right.
pub(crate) fn resolve_arguments(
    manager: &CommandManager,
    operation: &CommandOperationContext,
    decl: &CommandDeclaration,
    tokens: &[String],
) -> Result<CommandArgs> {
    let contexts = manager.command_contexts();
    let conditions = manager.command_conditions();
    let mut queue: VecDeque<String> = tokens.iter().cloned().collect();
    let mut args = CommandArgs::new();

    for (index, param) in decl.params().iter().enumerate() {
        let resolver = contexts.get(&param.type_tag).ok_or_else(|| {
            CommandError::InvalidDeclaration(format!(
                "no resolver registered for type '{}'",
                param.type_tag
            ))
        })?;

        let value = if !resolver.consumes_input() {
            let mut ctx = ExecutionContext::new(decl, param, index, operation, &mut queue, &args);
            resolver.resolve(&mut ctx)?
        } else if queue.is_empty() {
            if let Some(default) = &param.default {
                let mut defaults: VecDeque<String> =
                    default.split_whitespace().map(str::to_string).collect();
                let mut ctx = ExecutionContext::new(decl, param, index, operation, &mut defaults, &args);
                resolver.resolve(&mut ctx)?
            } else if param.consumes_rest && param.optional {
                let mut empty = VecDeque::new();
                let mut ctx = ExecutionContext::new(decl, param, index, operation, &mut empty, &args);
                resolver.resolve(&mut ctx).unwrap_or(ArgValue::Missing)
            } else if param.optional {
                ArgValue::Missing
            } else {
                return Err(CommandError::TooFewArguments {
                    param: param.name.clone(),
                });
            }
        } else {
            if let Some(permission) = &param.permission {
                if !manager.has_permission(&**operation.issuer(), permission) {
                    return Err(CommandError::rejected(
                        keys::PERMISSION_DENIED_PARAMETER,
                        Replacements::new().with("param", &param.name),
                    ));
                }
            }
            if let Some(first) = queue.front() {
                if !param.allows_value(first) {
                    return Err(CommandError::invalid_value_with(
                        &param.name,
                        first,
                        keys::PLEASE_SPECIFY_ONE_OF,
                        Replacements::new().with("valid", param.values.join(", ")),
                    ));
                }
            }
            let mut ctx = ExecutionContext::new(decl, param, index, operation, &mut queue, &args);
            resolver.resolve(&mut ctx)?
        };

        trace!(param = %param.name, value = ?value, "resolved parameter");
        if !value.is_missing() {
            conditions.validate_parameter(operation, param, &value, &param.conditions)?;
        }
        args.push(param.name.clone(), value);
    }

    if !queue.is_empty() && !decl.allows_trailing() {
        return Err(CommandError::TooManyArguments {
            extra: queue.iter().join(" "),
        });
    }
    Ok(args)
}

fn invoke(
    manager: &CommandManager,
    stack: &OperationStack,
    operation: &Rc<CommandOperationContext>,
    decl: &Arc<CommandDeclaration>,
    args: CommandArgs,
) {
    let invocation = CommandInvocation::new(Rc::clone(operation), args, stack.clone());
    let handler = Arc::clone(decl.handler());
    let outcome = catch_unwind(AssertUnwindSafe(|| handler(&invocation)));
    let err = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(payload) => anyhow::anyhow!("handler panicked: {}", panic_message(&*payload)),
    };
    handle_failure(manager, operation, decl, invocation.args(), err);
}

/// Strip invocation wrappers down to the error the handler raised.
fn unwrap_invocation(mut err: anyhow::Error) -> anyhow::Error {
    loop {
        match err.downcast::<CommandError>() {
            Ok(CommandError::HandlerInvocation { source, .. }) => err = source,
            Ok(other) => return anyhow::Error::new(other),
            Err(original) => return original,
        }
    }
}

fn handle_failure(
    manager: &CommandManager,
    operation: &CommandOperationContext,
    decl: &Arc<CommandDeclaration>,
    args: &CommandArgs,
    err: anyhow::Error,
) {
    let err = unwrap_invocation(err);
    if let Some(command_err) = err.downcast_ref::<CommandError>() {
        if command_err.is_user_facing() {
            report(manager, operation.issuer(), operation.label(), Some(decl), command_err);
            return;
        }
    }

    let failure = HandlerFailure {
        command: decl,
        operation,
        args,
        error: &err,
    };
    let handlers = decl
        .exception_handler()
        .cloned()
        .into_iter()
        .chain(manager.default_exception_handler());
    for handler in handlers {
        match catch_unwind(AssertUnwindSafe(|| handler.handle(&failure))) {
            Ok(true) => return,
            Ok(false) => {}
            Err(payload) => {
                warn!(
                    command = %decl.command_string(),
                    panic = panic_message(&*payload),
                    "exception handler panicked"
                );
            }
        }
    }

    if manager.logs_unhandled() {
        error!(
            command = %decl.command_string(),
            issuer = operation.issuer().name(),
            error = ?err,
            "uncaught error while executing command"
        );
    }
    manager.send_message(
        &**operation.issuer(),
        MessageType::Error,
        &keys::ERROR_GENERIC_LOGGED,
        &Replacements::new(),
    );
}

/// Render a resolution or user-facing failure to the issuer.
fn report(
    manager: &CommandManager,
    issuer: &IssuerRef,
    label: &str,
    decl: Option<&Arc<CommandDeclaration>>,
    err: &CommandError,
) {
    let send_syntax = |decl: &CommandDeclaration| {
        let mut command = vec![label.to_string()];
        command.extend(decl.sub_path().iter().cloned());
        manager.send_message(
            &**issuer,
            MessageType::Syntax,
            &keys::INVALID_SYNTAX,
            &Replacements::new()
                .with("command", command.join(" "))
                .with("syntax", decl.syntax()),
        );
    };
    match (err, decl) {
        (CommandError::TooFewArguments { .. } | CommandError::TooManyArguments { .. }, Some(decl)) => {
            send_syntax(&**decl);
        }
        _ => {
            let (key, replacements) = err.message();
            manager.send_message(&**issuer, MessageType::Error, &key, &replacements);
            if let (true, Some(decl)) = (err.shows_syntax(), decl) {
                send_syntax(&**decl);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Completion candidates for `partial` after `preceding`. Never fails:
/// parameters that do not resolve are skipped one token at a time.
pub(crate) fn complete(
    manager: &CommandManager,
    stack: &OperationStack,
    issuer: &IssuerRef,
    label: &str,
    preceding: &[String],
    partial: &str,
) -> Vec<String> {
    let (root_name, route, sub_tokens) = {
        let tree = manager.tree();
        let Some(root) = tree.get_root(label) else {
            return Vec::new();
        };
        let sub_tokens: Vec<String> = root
            .next_tokens(preceding, partial)
            .into_iter()
            .filter(|(_, decls)| {
                decls
                    .iter()
                    .any(|d| !d.is_private() && manager.has_permission(&**issuer, d.permission()))
            })
            .map(|(token, _)| token)
            .collect();
        (root.name().to_string(), root.route(preceding), sub_tokens)
    };

    let operation = Rc::new(CommandOperationContext::new(
        manager.clone(),
        Arc::clone(issuer),
        root_name,
        label,
        preceding.to_vec(),
        false,
    ));
    let _guard = stack.push(Rc::clone(&operation));

    let mut results = sub_tokens;
    for candidate in &route.candidates {
        if candidate.is_private() || !manager.has_permission(&**issuer, candidate.permission()) {
            continue;
        }
        operation.set_command(Arc::clone(candidate));
        let tokens = &preceding[route.consumed..];
        match catch_unwind(AssertUnwindSafe(|| {
            complete_candidate(manager, &operation, candidate, tokens, partial)
        })) {
            Ok(found) => results.extend(found),
            Err(_) => warn!(command = %candidate.command_string(), "completion panicked"),
        }
    }
    results.into_iter().unique().collect()
}

fn complete_candidate(
    manager: &CommandManager,
    operation: &CommandOperationContext,
    decl: &CommandDeclaration,
    tokens: &[String],
    partial: &str,
) -> Vec<String> {
    let contexts = manager.command_contexts();
    let mut queue: VecDeque<String> = tokens.iter().cloned().collect();
    let mut passed = CommandArgs::new();

    for (index, param) in decl.params().iter().enumerate() {
        let Some(resolver) = contexts.get(&param.type_tag) else {
            return Vec::new();
        };
        let consumes = resolver.consumes_input();
        if consumes && (queue.is_empty() || param.consumes_rest) {
            let ctx = CompletionContext::new(
                manager,
                operation.issuer(),
                decl,
                param,
                partial,
                &passed,
            );
            return manager.command_completions().complete(&ctx);
        }
        let before = queue.len();
        let value = {
            let mut ctx = ExecutionContext::new(decl, param, index, operation, &mut queue, &passed);
            resolver.resolve(&mut ctx)
        };
        let value = value.unwrap_or_else(|err| {
            trace!(param = %param.name, error = %err, "skipping unresolved parameter");
            if consumes && queue.len() == before {
                queue.pop_front();
            }
            ArgValue::Missing
        });
        passed.push(param.name.clone(), value);
    }
    Vec::new()
}
