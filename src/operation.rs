//! Per-invocation operation contexts and the stack they live on.
//!
//! Each execution unit owns one [`OperationStack`]. A handler that runs
//! another command on the same stack pushes a second frame; frames are
//! popped by [`OperationGuard`] on every exit path, unwinding included.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::command::CommandDeclaration;
use crate::issuer::IssuerRef;
use crate::manager::CommandManager;

/// Record of one command invocation.
pub struct CommandOperationContext {
    manager: CommandManager,
    issuer: IssuerRef,
    root: String,
    label: String,
    args: Vec<String>,
    is_async: bool,
    command: RefCell<Option<Arc<CommandDeclaration>>>,
}

impl fmt::Debug for CommandOperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOperationContext")
            .field("issuer", &self.issuer.name())
            .field("label", &self.label)
            .field("args", &self.args)
            .field("is_async", &self.is_async)
            .field(
                "command",
                &self.command.borrow().as_ref().map(|c| c.command_string()),
            )
            .finish_non_exhaustive()
    }
}

impl CommandOperationContext {
    pub(crate) fn new(
        manager: CommandManager,
        issuer: IssuerRef,
        root: impl Into<String>,
        label: impl Into<String>,
        args: Vec<String>,
        is_async: bool,
    ) -> Self {
        Self {
            manager,
            issuer,
            root: root.into(),
            label: label.into(),
            args,
            is_async,
            command: RefCell::new(None),
        }
    }

    #[must_use]
    pub const fn manager(&self) -> &CommandManager {
        &self.manager
    }

    #[must_use]
    pub const fn issuer(&self) -> &IssuerRef {
        &self.issuer
    }

    /// Canonical name of the root command.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The label the command was invoked with, which may be an alias.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Raw tokens after the label.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub const fn is_async(&self) -> bool {
        self.is_async
    }

    /// The declaration currently being tried or executed.
    #[must_use]
    pub fn command(&self) -> Option<Arc<CommandDeclaration>> {
        self.command.borrow().clone()
    }

    pub(crate) fn set_command(&self, command: Arc<CommandDeclaration>) {
        *self.command.borrow_mut() = Some(command);
    }
}

/// LIFO stack of operation contexts for one execution unit.
#[derive(Clone, Default)]
pub struct OperationStack {
    frames: Rc<RefCell<Vec<Rc<CommandOperationContext>>>>,
}

impl fmt::Debug for OperationStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationStack")
            .field("depth", &self.depth())
            .finish()
    }
}

thread_local! {
    static THREAD_STACK: OperationStack = OperationStack::new();
}

impl OperationStack {
    /// A fresh stack, isolated from every other.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The calling thread's default stack, used when a host does not
    /// carry its own.
    #[must_use]
    pub fn current() -> Self {
        THREAD_STACK.with(Clone::clone)
    }

    /// Push `ctx`; it stays on the stack until the guard drops.
    #[must_use = "the frame is popped as soon as the guard is dropped"]
    pub fn push(&self, ctx: Rc<CommandOperationContext>) -> OperationGuard {
        let mut frames = self.frames.borrow_mut();
        frames.push(ctx);
        OperationGuard {
            stack: self.clone(),
            depth: frames.len(),
        }
    }

    /// The innermost context.
    #[must_use]
    pub fn peek(&self) -> Option<Rc<CommandOperationContext>> {
        self.frames.borrow().last().cloned()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.borrow().is_empty()
    }

    /// Whether both handles refer to the same stack.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.frames, &other.frames)
    }
}

/// Pops its frame when dropped.
pub struct OperationGuard {
    stack: OperationStack,
    depth: usize,
}

impl fmt::Debug for OperationGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationGuard")
            .field("depth", &self.depth)
            .finish()
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        let mut frames = self.stack.frames.borrow_mut();
        debug_assert_eq!(frames.len(), self.depth, "operation stack popped out of order");
        frames.truncate(self.depth.saturating_sub(1));
    }
}
