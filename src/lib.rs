//! cmdframe - declarative command dispatch
//!
//! Command sets declare routes, typed parameters, permissions and
//! conditions; a [`CommandManager`] routes issued input to the right
//! handler, resolves its arguments, offers completions, and renders
//! localized feedback to the issuer.

pub mod command;
pub mod completions;
pub mod conditions;
pub mod config;
pub mod contexts;
pub mod deps;
pub mod error;
pub mod help;
pub mod host;
pub mod issuer;
pub mod locale;
pub mod manager;
pub mod message;
pub mod operation;
pub mod params;
pub mod replacements;
mod router;
pub mod tree;

pub mod console;
pub mod demo;

pub mod test_utils;

pub use command::{CommandInvocation, CommandSet, Declarations, ExceptionHandler};
pub use error::{CommandError, Result};
pub use issuer::{CommandIssuer, IssuerRef};
pub use locale::Locale;
pub use manager::{CommandManager, CommandRequest};
pub use message::{MessageKey, MessageType, Replacements};
pub use params::{ArgValue, CommandArgs, ParameterDescriptor};
