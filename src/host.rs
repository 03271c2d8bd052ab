//! Native-typed entry points for a hosting runtime.

use crate::error::Result;
use crate::help::CommandHelp;
use crate::issuer::{IssuerRef, IssuerResolver};
use crate::locale::Locale;
use crate::manager::{CommandManager, CommandRequest};
use crate::message::{MessageKey, MessageType, Replacements};
use crate::operation::OperationStack;

/// Binds a [`CommandManager`] to a host's native recipient type.
#[derive(Debug)]
pub struct CommandHost<R: IssuerResolver> {
    manager: CommandManager,
    resolver: R,
}

impl<R: IssuerResolver> CommandHost<R> {
    pub const fn new(manager: CommandManager, resolver: R) -> Self {
        Self { manager, resolver }
    }

    #[must_use]
    pub const fn manager(&self) -> &CommandManager {
        &self.manager
    }

    #[must_use]
    pub fn issuer(&self, native: &R::Native) -> IssuerRef {
        self.resolver.resolve_issuer(native)
    }

    /// Returns whether a root command handled `label`.
    pub fn execute<S: AsRef<str>>(&self, native: &R::Native, label: &str, args: &[S]) -> bool {
        self.manager.execute(&self.issuer(native), label, args)
    }

    /// Like [`Self::execute`], flagged as running off the host's main unit.
    pub fn execute_async<S: AsRef<str>>(
        &self,
        native: &R::Native,
        stack: &OperationStack,
        label: &str,
        args: &[S],
    ) -> bool {
        let request = CommandRequest::new(self.issuer(native), label, args).in_async();
        self.manager.execute_on(stack, request)
    }

    pub fn complete<S: AsRef<str>>(
        &self,
        native: &R::Native,
        label: &str,
        partial: &str,
        preceding: &[S],
    ) -> Vec<String> {
        self.manager
            .complete(&self.issuer(native), label, partial, preceding)
    }

    pub fn generate_help(&self, native: &R::Native, root_label: &str) -> Result<CommandHelp> {
        self.manager.generate_help(&self.issuer(native), root_label)
    }

    pub fn set_issuer_locale(&self, native: &R::Native, locale: Locale) -> Option<Locale> {
        self.manager.set_issuer_locale(&*self.issuer(native), locale)
    }

    pub fn send_message(
        &self,
        native: &R::Native,
        category: MessageType,
        key: &MessageKey,
        replacements: &Replacements,
    ) {
        self.manager
            .send_message(&*self.issuer(native), category, key, replacements);
    }
}
