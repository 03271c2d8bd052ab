//! The invoking entity behind a command.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::message::RenderedMessage;

/// Identity, permissions, and message delivery for whoever issued a command.
///
/// Hosts wrap their native recipient type in an implementation of this
/// trait; it is resolved once per invocation.
pub trait CommandIssuer: Send + Sync {
    fn unique_id(&self) -> Uuid;

    /// Display name.
    fn name(&self) -> &str;

    fn has_permission(&self, permission: &str) -> bool;

    /// Whether this is an interactive user rather than a console or automation.
    fn is_player(&self) -> bool {
        false
    }

    fn deliver(&self, message: &RenderedMessage);
}

pub type IssuerRef = Arc<dyn CommandIssuer>;

impl fmt::Debug for dyn CommandIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandIssuer")
            .field("id", &self.unique_id())
            .field("name", &self.name())
            .finish()
    }
}

/// Maps a host's native recipient onto a [`CommandIssuer`].
pub trait IssuerResolver: Send + Sync {
    type Native: ?Sized;

    fn resolve_issuer(&self, native: &Self::Native) -> IssuerRef;
}
