//! Parameter descriptors and resolved argument values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::conditions::ConditionSpec;
use crate::issuer::IssuerRef;

/// Shape of one handler parameter. Order within a declaration is the order
/// tokens are consumed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: String,
    /// Resolver lookup key, lower-cased.
    pub type_tag: String,
    /// Raw text resolved in place of missing input. Implies `optional`.
    pub default: Option<String>,
    pub optional: bool,
    /// Binds every remaining token. Only valid on the last parameter.
    pub consumes_rest: bool,
    /// Overrides the `<name>` / `[name]` form shown in syntax lines.
    pub syntax: Option<String>,
    pub description: String,
    pub conditions: Vec<ConditionSpec>,
    /// Completion source: `@id[:config]` or a `|`-separated literal list.
    pub completion: Option<String>,
    /// Allowed raw values, matched case-insensitively.
    pub values: Vec<String>,
    /// Permission required to supply this parameter explicitly.
    pub permission: Option<String>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, type_tag: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.as_ref().to_lowercase(),
            default: None,
            optional: false,
            consumes_rest: false,
            syntax: None,
            description: String::new(),
            conditions: Vec::new(),
            completion: None,
            values: Vec::new(),
            permission: None,
        }
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self.optional = true;
        self
    }

    #[must_use]
    pub const fn rest(mut self) -> Self {
        self.consumes_rest = true;
        self
    }

    #[must_use]
    pub fn syntax(mut self, syntax: impl Into<String>) -> Self {
        self.syntax = Some(syntax.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append parameter conditions, `"limits:min=1,max=10|other"`.
    #[must_use]
    pub fn conditions(mut self, conditions: &str) -> Self {
        self.conditions.extend(ConditionSpec::parse_list(conditions));
        self
    }

    #[must_use]
    pub fn completion(mut self, completion: impl Into<String>) -> Self {
        self.completion = Some(completion.into());
        self
    }

    #[must_use]
    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }

    /// `<name>` for required parameters, `[name]` otherwise.
    #[must_use]
    pub fn default_syntax(&self) -> String {
        if self.is_required() {
            format!("<{}>", self.name)
        } else {
            format!("[{}]", self.name)
        }
    }

    #[must_use]
    pub fn allows_value(&self, raw: &str) -> bool {
        self.values.is_empty() || self.values.iter().any(|v| v.eq_ignore_ascii_case(raw))
    }
}

/// A bound argument.
#[derive(Clone)]
pub enum ArgValue {
    /// Optional parameter with no input and no default.
    Missing,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    Uuid(Uuid),
    Issuer(IssuerRef),
    Custom(Arc<dyn Any + Send + Sync>),
}

impl ArgValue {
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Self::Custom(Arc::new(value))
    }

    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value of `Int` or `Float`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_issuer(&self) -> Option<&IssuerRef> {
        match self {
            Self::Issuer(issuer) => Some(issuer),
            _ => None,
        }
    }

    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Custom(value) => Arc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("Missing"),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Self::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Uuid(id) => f.debug_tuple("Uuid").field(id).finish(),
            Self::Issuer(issuer) => f.debug_tuple("Issuer").field(&issuer.name()).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => f.write_str(&items.join(" ")),
            Self::Uuid(id) => write!(f, "{id}"),
            Self::Issuer(issuer) => f.write_str(issuer.name()),
            Self::Custom(_) => f.write_str("<custom>"),
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Missing, Self::Missing) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::Issuer(a), Self::Issuer(b)) => a.unique_id() == b.unique_id(),
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Arguments bound for one invocation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs {
    values: Vec<(String, ArgValue)>,
}

impl CommandArgs {
    #[must_use]
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.push((name.into(), value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn positional(&self, index: usize) -> Option<&ArgValue> {
        self.values.get(index).map(|(_, v)| v)
    }

    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_str)
    }

    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgValue::as_i64)
    }

    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ArgValue::as_f64)
    }

    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ArgValue::as_bool)
    }

    #[must_use]
    pub fn get_list(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(ArgValue::as_list)
    }

    #[must_use]
    pub fn get_uuid(&self, name: &str) -> Option<Uuid> {
        self.get(name).and_then(ArgValue::as_uuid)
    }

    /// Value produced by a custom resolver.
    #[must_use]
    pub fn get_custom<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).and_then(ArgValue::downcast::<T>)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
