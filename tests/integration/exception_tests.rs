use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cmdframe::command::{CommandSet, Declarations, HandlerFailure};
use cmdframe::conditions::ConditionContext;
use cmdframe::contexts::ExecutionContext;
use cmdframe::test_utils::logging::capture_logs;
use cmdframe::{ArgValue, CommandError, CommandManager, ParameterDescriptor};

use super::common::{demo_manager, issuer};

const GENERIC: &str = "An error occurred. This problem has been logged. Sorry for the inconvenience.";

#[test]
fn test_declaration_handler_claims_its_failure() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "calc", &["divide", "1", "0"]);
    manager.execute(&handle, "calc", &["div", "9", "3"]);
    assert_eq!(
        alex.plain_messages(),
        vec!["Error: cannot divide by zero".to_string(), "= 3".to_string()]
    );
}

#[test]
fn test_unhandled_failure_is_logged_and_reported_generically() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &["calc.admin"]);
    let (handled, logs) = capture_logs("error", || manager.execute(&handle, "calc", &["crash"]));

    assert!(handled);
    assert_eq!(alex.plain_messages(), vec![GENERIC.to_string()]);
    assert!(logs.has_errors(), "{}", logs.format_for_display());
    assert!(logs.contains_message("uncaught error while executing command"));
}

#[test]
fn test_default_handler_sees_unclaimed_failures() {
    let manager = demo_manager();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    manager
        .set_default_exception_handler(
            Some(Arc::new(move |failure: &HandlerFailure<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
                failure.issuer().name() == "alex"
                    && failure.error.to_string().contains("caught fire")
            })),
            false,
        )
        .unwrap();

    let (handle, alex) = issuer("alex", &["calc.admin"]);
    let (other, sam) = issuer("sam", &["calc.admin"]);
    let (_, logs) = capture_logs("error", || {
        manager.execute(&handle, "calc", &["crash"]);
        manager.execute(&other, "calc", &["crash"]);
    });

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(alex.messages().is_empty());
    assert_eq!(sam.plain_messages(), vec![GENERIC.to_string()]);
    // Logging was switched off with the handler installed.
    assert!(!logs.has_errors());
}

#[test]
fn test_logging_cannot_be_disabled_without_handler() {
    let manager = CommandManager::new();
    let err = manager.set_default_exception_handler(None, false).unwrap_err();
    assert!(matches!(err, CommandError::InvalidState(_)));
    assert!(manager.logs_unhandled());
}

struct FragileCommands;

impl CommandSet for FragileCommands {
    fn root(&self) -> &str {
        "fragile"
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations) {
        commands.command("panic").handler(|_| panic!("handler exploded"));

        commands
            .command("guarded")
            .exception_handler(|_: &HandlerFailure<'_>| -> bool { panic!("handler for the handler") })
            .handler(|_| anyhow::bail!("plain failure"));

        commands
            .command("rejected")
            .handler(|_| Err(CommandError::rejected_message("not today").into()));
    }
}

#[test]
fn test_panicking_handler_is_contained() {
    let manager = CommandManager::new();
    manager.register_command(FragileCommands).unwrap();
    let (handle, alex) = issuer("alex", &[]);

    assert!(manager.execute(&handle, "fragile", &["panic"]));
    assert_eq!(alex.plain_messages(), vec![GENERIC.to_string()]);
    assert!(CommandManager::current_operation().is_none());
}

#[test]
fn test_panicking_exception_handler_falls_back_to_generic_message() {
    let manager = CommandManager::new();
    manager.register_command(FragileCommands).unwrap();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "fragile", &["guarded"]);
    assert_eq!(alex.plain_messages(), vec![GENERIC.to_string()]);
}

#[test]
fn test_user_facing_errors_skip_exception_handlers() {
    let manager = CommandManager::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    manager
        .set_default_exception_handler(
            Some(Arc::new(move |_: &HandlerFailure<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            })),
            true,
        )
        .unwrap();
    manager.register_command(FragileCommands).unwrap();

    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "fragile", &["rejected"]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(alex.plain_messages()[0], "Error: not today");
}

struct VolatileCommands;

impl CommandSet for VolatileCommands {
    fn root(&self) -> &str {
        "volatile"
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations) {
        commands
            .command("resolve")
            .param(ParameterDescriptor::new("target", "unstable"))
            .handler(|_| Ok(()));

        commands
            .command("lookup")
            .param(ParameterDescriptor::new("target", "offline"))
            .handler(|_| Ok(()));

        commands
            .command("gated")
            .conditions("explodes")
            .handler(|_| Ok(()));
    }
}

fn volatile_manager() -> CommandManager {
    let manager = CommandManager::new();
    manager.command_contexts().register(
        "unstable",
        |_: &mut ExecutionContext<'_>| -> cmdframe::Result<ArgValue> { panic!("resolver exploded") },
    );
    manager.command_contexts().register(
        "offline",
        |_: &mut ExecutionContext<'_>| -> cmdframe::Result<ArgValue> {
            Err(CommandError::InvalidState("store offline".to_string()))
        },
    );
    manager
        .command_conditions()
        .add_condition("explodes", |_: &ConditionContext<'_>| -> cmdframe::Result<()> {
            panic!("condition exploded")
        });
    manager.register_command(VolatileCommands).unwrap();
    manager
}

#[test]
fn test_panicking_resolver_is_routed_to_exception_handlers() {
    let manager = volatile_manager();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    manager
        .set_default_exception_handler(
            Some(Arc::new(move |failure: &HandlerFailure<'_>| {
                sink.lock().push(failure.error.to_string());
                true
            })),
            true,
        )
        .unwrap();
    let (handle, alex) = issuer("alex", &[]);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        manager.execute(&handle, "volatile", &["resolve", "1"])
    }));

    assert!(matches!(outcome, Ok(true)));
    assert!(alex.messages().is_empty());
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("resolver exploded"), "{seen:?}");
    assert!(CommandManager::current_operation().is_none());
}

#[test]
fn test_panicking_condition_reports_generic_message() {
    let manager = volatile_manager();
    let (handle, alex) = issuer("alex", &[]);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        capture_logs("error", || manager.execute(&handle, "volatile", &["gated"]))
    }));

    let (handled, logs) = outcome.expect("condition panic stays inside dispatch");
    assert!(handled);
    assert_eq!(alex.plain_messages(), vec![GENERIC.to_string()]);
    assert!(logs.contains_message("uncaught error while executing command"));
    assert!(CommandManager::current_operation().is_none());
}

#[test]
fn test_unrecoverable_resolution_error_reaches_exception_handler() {
    let manager = volatile_manager();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    manager
        .set_default_exception_handler(
            Some(Arc::new(move |failure: &HandlerFailure<'_>| {
                sink.lock().push(failure.error.to_string());
                true
            })),
            true,
        )
        .unwrap();
    let (handle, alex) = issuer("alex", &[]);

    assert!(manager.execute(&handle, "volatile", &["lookup", "x"]));
    assert!(alex.messages().is_empty());
    assert_eq!(seen.lock().len(), 1);
    assert!(seen.lock()[0].contains("store offline"));
}
