//! Named predicates that gate command execution beyond permission nodes.
//!
//! Conditions are declared as `id` or `id:config`, several joined with `|`
//! (`"owner|cooldown:seconds=5"`). Issuer conditions run before arguments
//! are resolved; parameter conditions run against a freshly resolved value.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::error::{CommandError, Result};
use crate::issuer::IssuerRef;
use crate::message::{Replacements, keys};
use crate::operation::CommandOperationContext;
use crate::params::{ArgValue, ParameterDescriptor};

/// One parsed entry of a condition list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSpec {
    pub id: String,
    pub config: Option<String>,
}

impl ConditionSpec {
    /// Parse `"a|b:cfg"` into specs, lower-casing ids.
    #[must_use]
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (id, config) = match part.split_once(':') {
                    Some((id, cfg)) => (id, Some(cfg.trim().to_string())),
                    None => (part, None),
                };
                Self {
                    id: id.trim().to_lowercase(),
                    config,
                }
            })
            .collect()
    }
}

impl fmt::Display for ConditionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config {
            Some(cfg) => write!(f, "{}:{cfg}", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// Issuer plus the per-declaration config string of one condition check.
pub struct ConditionContext<'a> {
    issuer: &'a IssuerRef,
    config: Option<&'a str>,
    operation: &'a CommandOperationContext,
}

impl<'a> ConditionContext<'a> {
    #[must_use]
    pub const fn new(
        issuer: &'a IssuerRef,
        config: Option<&'a str>,
        operation: &'a CommandOperationContext,
    ) -> Self {
        Self {
            issuer,
            config,
            operation,
        }
    }

    #[must_use]
    pub const fn issuer(&self) -> &IssuerRef {
        self.issuer
    }

    #[must_use]
    pub const fn config(&self) -> Option<&str> {
        self.config
    }

    #[must_use]
    pub const fn operation(&self) -> &CommandOperationContext {
        self.operation
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.operation.is_async()
    }

    /// Value of `key` in a `k=v,k2=v2` config string.
    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config?
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim())
    }

    /// Whether a bare `flag` (no `=`) appears in the config string.
    #[must_use]
    pub fn has_config(&self, flag: &str) -> bool {
        self.config.is_some_and(|cfg| {
            cfg.split(',')
                .any(|part| part.trim().eq_ignore_ascii_case(flag))
        })
    }
}

pub type IssuerCondition = Arc<dyn Fn(&ConditionContext<'_>) -> Result<()> + Send + Sync>;

pub type ParameterCondition = Arc<
    dyn Fn(&ConditionContext<'_>, &ParameterDescriptor, &ArgValue) -> Result<()> + Send + Sync,
>;

const ANY_TYPE: &str = "*";

/// Registry of issuer and parameter conditions.
pub struct CommandConditions {
    issuer: RwLock<HashMap<String, IssuerCondition>>,
    parameter: RwLock<HashMap<(String, String), ParameterCondition>>,
}

impl fmt::Debug for CommandConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandConditions")
            .field("issuer", &self.issuer.read().keys().collect::<Vec<_>>())
            .field("parameter", &self.parameter.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for CommandConditions {
    fn default() -> Self {
        let conditions = Self {
            issuer: RwLock::new(HashMap::new()),
            parameter: RwLock::new(HashMap::new()),
        };
        conditions.add_parameter_condition(ANY_TYPE, "limits", limits);
        conditions
    }
}

impl CommandConditions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an issuer condition. Returns the one it replaced, if any.
    pub fn add_condition<F>(&self, id: &str, condition: F) -> Option<IssuerCondition>
    where
        F: Fn(&ConditionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.issuer
            .write()
            .insert(id.to_lowercase(), Arc::new(condition))
    }

    /// Register a parameter condition for values of `type_tag` (`"*"` for any).
    pub fn add_parameter_condition<F>(
        &self,
        type_tag: &str,
        id: &str,
        condition: F,
    ) -> Option<ParameterCondition>
    where
        F: Fn(&ConditionContext<'_>, &ParameterDescriptor, &ArgValue) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.parameter.write().insert(
            (type_tag.to_lowercase(), id.to_lowercase()),
            Arc::new(condition),
        )
    }

    #[must_use]
    pub fn has_condition(&self, id: &str) -> bool {
        self.issuer.read().contains_key(&id.to_lowercase())
    }

    /// Run every issuer condition in `specs`, stopping at the first failure.
    /// Unknown ids are logged and skipped.
    pub fn validate(&self, operation: &CommandOperationContext, specs: &[ConditionSpec]) -> Result<()> {
        for spec in specs {
            let condition = self.issuer.read().get(&spec.id).cloned();
            let Some(condition) = condition else {
                warn!(condition = %spec.id, "could not find command condition");
                continue;
            };
            trace!(condition = %spec, "checking condition");
            let ctx = ConditionContext::new(operation.issuer(), spec.config.as_deref(), operation);
            condition(&ctx)?;
        }
        Ok(())
    }

    /// Run parameter conditions in `specs` against a resolved value.
    pub fn validate_parameter(
        &self,
        operation: &CommandOperationContext,
        param: &ParameterDescriptor,
        value: &ArgValue,
        specs: &[ConditionSpec],
    ) -> Result<()> {
        for spec in specs {
            let condition = {
                let registry = self.parameter.read();
                registry
                    .get(&(param.type_tag.clone(), spec.id.clone()))
                    .or_else(|| registry.get(&(ANY_TYPE.to_string(), spec.id.clone())))
                    .cloned()
            };
            let Some(condition) = condition else {
                warn!(condition = %spec.id, param = %param.name, "could not find parameter condition");
                continue;
            };
            let ctx = ConditionContext::new(operation.issuer(), spec.config.as_deref(), operation);
            condition(&ctx, param, value)?;
        }
        Ok(())
    }
}

/// Built-in `limits:min=N,max=M` for numeric values.
fn limits(ctx: &ConditionContext<'_>, param: &ParameterDescriptor, value: &ArgValue) -> Result<()> {
    let Some(number) = value.as_f64() else {
        return Ok(());
    };
    if let Some(min) = ctx.config_value("min").and_then(|v| v.parse::<f64>().ok()) {
        if number < min {
            return Err(CommandError::invalid_value_with(
                &param.name,
                value.to_string(),
                keys::PLEASE_SPECIFY_AT_LEAST,
                Replacements::new().with("min", fmt_bound(min)),
            ));
        }
    }
    if let Some(max) = ctx.config_value("max").and_then(|v| v.parse::<f64>().ok()) {
        if number > max {
            return Err(CommandError::invalid_value_with(
                &param.name,
                value.to_string(),
                keys::PLEASE_SPECIFY_AT_MOST,
                Replacements::new().with("max", fmt_bound(max)),
            ));
        }
    }
    Ok(())
}

fn fmt_bound(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
