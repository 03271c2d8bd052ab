//! Terminal issuers for the `cmdframe` binary.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::host::CommandHost;
use crate::issuer::{CommandIssuer, IssuerRef, IssuerResolver};
use crate::message::RenderedMessage;

/// Name that resolves to the all-powerful console issuer.
pub const CONSOLE_NAME: &str = "console";

/// Writes delivered messages to a terminal stream.
pub struct ConsoleIssuer {
    id: Uuid,
    name: String,
    /// `None` grants everything.
    permissions: Option<HashSet<String>>,
    ansi: bool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleIssuer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

impl ConsoleIssuer {
    /// The console itself: every permission, not a player.
    #[must_use]
    pub fn console(ansi: bool) -> Self {
        Self::new(CONSOLE_NAME, None, ansi)
    }

    /// A named user holding only `permissions`.
    #[must_use]
    pub fn user<I, S>(name: &str, permissions: I, ansi: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, Some(permissions.into_iter().map(Into::into).collect()), ansi)
    }

    fn new(name: &str, permissions: Option<HashSet<String>>, ansi: bool) -> Self {
        Self {
            // Stable across resolutions, so per-issuer locales stick.
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.to_lowercase().as_bytes()),
            name: name.to_string(),
            permissions,
            ansi,
            out: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    /// Send output somewhere other than stdout.
    #[must_use]
    pub fn with_writer(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = Mutex::new(out);
        self
    }
}

impl CommandIssuer for ConsoleIssuer {
    fn unique_id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .as_ref()
            .is_none_or(|granted| granted.contains(permission))
    }

    fn is_player(&self) -> bool {
        self.permissions.is_some()
    }

    fn deliver(&self, message: &RenderedMessage) {
        let text = if self.ansi {
            message.to_ansi()
        } else {
            message.plain()
        };
        let mut out = self.out.lock();
        // A closed pipe is not worth failing a command over.
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

/// Resolves a user name typed on the command line to an issuer.
#[derive(Debug, Clone, Default)]
pub struct ConsoleResolver {
    grants: Vec<String>,
    ansi: bool,
}

impl ConsoleResolver {
    /// Non-console users resolve holding `grants`.
    #[must_use]
    pub const fn new(grants: Vec<String>, ansi: bool) -> Self {
        Self { grants, ansi }
    }
}

impl IssuerResolver for ConsoleResolver {
    type Native = str;

    fn resolve_issuer(&self, name: &str) -> IssuerRef {
        if name.eq_ignore_ascii_case(CONSOLE_NAME) {
            Arc::new(ConsoleIssuer::console(self.ansi))
        } else {
            Arc::new(ConsoleIssuer::user(name, self.grants.iter().cloned(), self.ansi))
        }
    }
}

pub type ConsoleHost = CommandHost<ConsoleResolver>;
