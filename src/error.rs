//! Error types for cmdframe.
//!
//! Resolution-time failures (unknown command, permission, conditions and
//! argument binding) are recoverable per candidate and drive overload
//! fallback in the router. Registration-time failures (dependencies,
//! malformed declarations) keep a command set from becoming routable.

use thiserror::Error;

use crate::message::{MessageKey, Replacements, keys};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("permission denied (requires '{permission}')")]
    PermissionDenied { permission: String },

    #[error("condition '{condition}' failed")]
    ConditionFailed {
        condition: String,
        key: Option<MessageKey>,
        replacements: Replacements,
    },

    #[error("invalid value for parameter '{param}': '{raw}'")]
    InvalidParameterValue {
        param: String,
        raw: String,
        key: Option<MessageKey>,
        replacements: Replacements,
    },

    #[error("too few arguments: missing '{param}'")]
    TooFewArguments { param: String },

    #[error("too many arguments: unexpected '{extra}'")]
    TooManyArguments { extra: String },

    #[error("no registered instance of {type_name} with key '{key}' for {target}")]
    MissingDependency {
        type_name: String,
        key: String,
        target: String,
    },

    #[error("an instance of {type_name} with key '{key}' is already registered")]
    DuplicateDependency { type_name: String, key: String },

    #[error("command '{command}' failed: {source}")]
    HandlerInvocation {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unstable API '{0}' has not been enabled")]
    UnsupportedFeature(String),

    /// Raised by handlers to show a message to the issuer without being
    /// treated as an uncaught failure.
    #[error("{message}")]
    Rejected {
        key: Option<MessageKey>,
        replacements: Replacements,
        message: String,
    },

    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// A rejection that renders `key` to the issuer.
    #[must_use]
    pub fn rejected(key: MessageKey, replacements: Replacements) -> Self {
        Self::Rejected {
            message: key.to_string(),
            key: Some(key),
            replacements,
        }
    }

    /// A rejection carrying a literal message, shown through `error_prefix`.
    pub fn rejected_message(message: impl Into<String>) -> Self {
        Self::Rejected {
            key: None,
            replacements: Replacements::new(),
            message: message.into(),
        }
    }

    /// Condition failure with an optional user-facing message key.
    pub fn condition_failed(condition: impl Into<String>, key: Option<MessageKey>) -> Self {
        Self::ConditionFailed {
            condition: condition.into(),
            key,
            replacements: Replacements::new(),
        }
    }

    /// Binding failure for `param` without a dedicated message.
    pub fn invalid_value(param: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::InvalidParameterValue {
            param: param.into(),
            raw: raw.into(),
            key: None,
            replacements: Replacements::new(),
        }
    }

    /// Binding failure rendered through `key`.
    pub fn invalid_value_with(
        param: impl Into<String>,
        raw: impl Into<String>,
        key: MessageKey,
        replacements: Replacements,
    ) -> Self {
        Self::InvalidParameterValue {
            param: param.into(),
            raw: raw.into(),
            key: Some(key),
            replacements,
        }
    }

    /// Failures that only disqualify the current candidate.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownCommand(_)
                | Self::PermissionDenied { .. }
                | Self::ConditionFailed { .. }
                | Self::InvalidParameterValue { .. }
                | Self::TooFewArguments { .. }
                | Self::TooManyArguments { .. }
                | Self::Rejected { .. }
        )
    }

    /// Errors a handler may raise that are shown to the issuer instead of
    /// being routed to exception handlers.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::ConditionFailed { .. }
                | Self::InvalidParameterValue { .. }
                | Self::TooFewArguments { .. }
                | Self::TooManyArguments { .. }
                | Self::Rejected { .. }
        )
    }

    /// Whether the command's syntax line should follow the error.
    #[must_use]
    pub const fn shows_syntax(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameterValue { .. }
                | Self::TooFewArguments { .. }
                | Self::TooManyArguments { .. }
        )
    }

    /// Rank used when several overloads fail: higher is more specific.
    #[must_use]
    pub const fn specificity(&self) -> u8 {
        match self {
            Self::InvalidParameterValue { .. } | Self::Rejected { .. } => 4,
            Self::TooFewArguments { .. } => 3,
            Self::TooManyArguments { .. } => 2,
            Self::ConditionFailed { .. } => 1,
            _ => 0,
        }
    }

    /// Message key and replacements used to render this error.
    #[must_use]
    pub fn message(&self) -> (MessageKey, Replacements) {
        match self {
            Self::UnknownCommand(label) => (
                keys::UNKNOWN_COMMAND,
                Replacements::new().with("command", label),
            ),
            Self::PermissionDenied { .. } => (keys::PERMISSION_DENIED, Replacements::new()),
            Self::ConditionFailed {
                key: Some(key),
                replacements,
                ..
            }
            | Self::InvalidParameterValue {
                key: Some(key),
                replacements,
                ..
            }
            | Self::Rejected {
                key: Some(key),
                replacements,
                ..
            } => (key.clone(), replacements.clone()),
            Self::ConditionFailed { .. } => (keys::ERROR_PERFORMING_COMMAND, Replacements::new()),
            Self::InvalidParameterValue { param, raw, .. } => (
                keys::INVALID_PARAMETER,
                Replacements::new().with("name", param).with("value", raw),
            ),
            Self::Rejected { message, .. } => (
                keys::ERROR_PREFIX,
                Replacements::new().with("message", message),
            ),
            Self::TooFewArguments { .. } | Self::TooManyArguments { .. } => {
                (keys::INVALID_SYNTAX, Replacements::new())
            }
            _ => (keys::ERROR_GENERIC_LOGGED, Replacements::new()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
