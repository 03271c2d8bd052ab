use std::rc::Rc;
use std::sync::Arc;

use parking_lot::Mutex;

use cmdframe::command::{CommandSet, Declarations};
use cmdframe::operation::OperationStack;
use cmdframe::{CommandManager, CommandRequest, ParameterDescriptor};

use super::common::issuer;

/// One observation made from inside a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Seen {
    label: String,
    args: Vec<String>,
    depth: usize,
    is_async: bool,
    on_thread_stack: bool,
    command: Option<String>,
}

#[derive(Default)]
struct TraceCommands {
    seen: Arc<Mutex<Vec<Seen>>>,
    frames: Arc<Mutex<Vec<String>>>,
}

impl CommandSet for TraceCommands {
    fn root(&self) -> &str {
        "trace|tr"
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations) {
        let this = Arc::clone(&self);
        commands.command("look").handler(move |inv| {
            let op = CommandManager::current_operation()
                .ok_or_else(|| anyhow::anyhow!("no current operation"))?;
            this.seen.lock().push(Seen {
                label: op.label().to_string(),
                args: op.args().to_vec(),
                depth: inv.stack().depth(),
                is_async: inv.is_async(),
                on_thread_stack: inv.stack().same_as(&OperationStack::current()),
                command: op.command().map(|c| c.command_string()),
            });
            Ok(())
        });

        commands
            .command("nest")
            .param(ParameterDescriptor::new("levels", "int"))
            .handler(|inv| {
                let levels = inv.args().get_i64("levels").unwrap_or(0);
                if levels > 0 {
                    let next = (levels - 1).to_string();
                    inv.execute("trace", &["nest", next.as_str()]);
                } else {
                    inv.execute("tr", &["look"]);
                }
                Ok(())
            });

        let this = Arc::clone(&self);
        commands.command("wrap").handler(move |inv| {
            let frame = |when: &str| {
                CommandManager::current_operation().map_or_else(
                    || format!("{when}: none"),
                    |op| format!("{when}: {} {}", op.label(), Rc::ptr_eq(&op, inv.operation())),
                )
            };
            let before = frame("before");
            inv.execute("tr", &["look"]);
            let after = frame("after");
            this.frames.lock().extend([before, after]);
            Ok(())
        });

        commands.command("boom").handler(|_| panic!("trace failure"));
    }
}

fn trace_manager() -> (CommandManager, Arc<Mutex<Vec<Seen>>>) {
    let manager = CommandManager::new();
    let traced = TraceCommands::default();
    let seen = Arc::clone(&traced.seen);
    manager.register_command(traced).unwrap();
    (manager, seen)
}

#[test]
fn test_handler_sees_its_operation() {
    let (manager, seen) = trace_manager();
    let (handle, _) = issuer("alex", &[]);
    manager.execute(&handle, "TR", &["look"]);

    assert_eq!(
        seen.lock().clone(),
        vec![Seen {
            label: "TR".to_string(),
            args: vec!["look".to_string()],
            depth: 1,
            is_async: false,
            on_thread_stack: true,
            command: Some("trace look".to_string()),
        }]
    );
    assert!(CommandManager::current_operation().is_none());
}

#[test]
fn test_nested_invocations_stack_up_and_unwind() {
    let (manager, seen) = trace_manager();
    let (handle, _) = issuer("alex", &[]);
    manager.execute(&handle, "trace", &["nest", "2"]);

    let seen = seen.lock().clone();
    assert_eq!(seen.len(), 1);
    // nest 2, nest 1, nest 0, look.
    assert_eq!(seen[0].depth, 4);
    assert_eq!(seen[0].label, "tr");
    assert!(OperationStack::current().is_empty());
}

#[test]
fn test_outer_handler_sees_its_own_frame_after_nested_call() {
    let manager = CommandManager::new();
    let traced = TraceCommands::default();
    let frames = Arc::clone(&traced.frames);
    let seen = Arc::clone(&traced.seen);
    manager.register_command(traced).unwrap();
    let (handle, _) = issuer("alex", &[]);

    manager.execute(&handle, "trace", &["wrap"]);

    assert_eq!(
        frames.lock().clone(),
        vec!["before: trace true".to_string(), "after: trace true".to_string()]
    );
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].label, "tr");
    assert_eq!(seen[0].depth, 2);
    assert!(CommandManager::current_operation().is_none());
}

#[test]
fn test_async_flag_propagates_to_nested_commands() {
    let (manager, seen) = trace_manager();
    let (handle, _) = issuer("alex", &[]);
    let request = CommandRequest::new(handle, "trace", &["nest", "1"]).in_async();
    assert!(manager.dispatch(request));
    assert!(seen.lock().iter().all(|s| s.is_async));
}

#[test]
fn test_explicit_stack_is_isolated_from_thread_stack() {
    let (manager, seen) = trace_manager();
    let (handle, _) = issuer("alex", &[]);
    let stack = OperationStack::new();
    manager.execute_on(&stack, CommandRequest::new(handle, "trace", &["nest", "0"]));

    let seen = seen.lock().clone();
    assert_eq!(seen[0].depth, 2);
    assert!(!seen[0].on_thread_stack);
    assert!(stack.is_empty());
    assert!(OperationStack::current().is_empty());
}

#[test]
fn test_stack_is_empty_after_panic() {
    let (manager, _) = trace_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "trace", &["boom"]);
    assert!(OperationStack::current().is_empty());
    assert_eq!(alex.messages().len(), 1);
}

#[test]
fn test_threads_have_separate_stacks() {
    let (manager, seen) = trace_manager();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let manager = manager.clone();
            std::thread::spawn(move || {
                let (handle, _) = issuer(&format!("user{i}"), &[]);
                manager.execute(&handle, "trace", &["nest", "1"]);
                OperationStack::current().is_empty()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }

    let seen = seen.lock().clone();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|s| s.depth == 3));
}
