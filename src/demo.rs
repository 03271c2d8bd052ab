//! Demo command sets wired up by the `cmdframe` binary.
//!
//! - `region|rg`: injected store, a custom resolver and completion,
//!   conditions, parameter limits, help, and a catch-unknown handler.
//! - `calc`: int/float overloads, nested invocation, and a declaration
//!   level exception handler.
//! - `lang`: per-issuer locales.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::command::{CommandInvocation, CommandSet, Declarations, HandlerFailure};
use crate::completions::CompletionContext;
use crate::conditions::ConditionContext;
use crate::config::Config;
use crate::contexts::{ContextResolver, ExecutionContext};
use crate::deps::Injector;
use crate::error::{CommandError, Result};
use crate::locale::Locale;
use crate::manager::CommandManager;
use crate::message::{MessageKey, MessageType, Replacements, keys};
use crate::params::{ArgValue, ParameterDescriptor};

/// A named circular area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub radius: i64,
    pub owner: String,
}

/// Shared region storage, registered as a dependency.
#[derive(Debug, Default)]
pub struct RegionStore {
    regions: RwLock<BTreeMap<String, Region>>,
}

impl RegionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous region of that name.
    pub fn save(&self, region: Region) -> Option<Region> {
        self.regions
            .write()
            .insert(region.name.to_lowercase(), region)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Region> {
        self.regions.read().get(&name.to_lowercase()).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Region> {
        self.regions.write().remove(&name.to_lowercase())
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.regions.read().values().map(|r| r.name.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.read().is_empty()
    }
}

/// Resolves a token to a stored [`Region`].
struct RegionResolver {
    store: Arc<RegionStore>,
}

impl ContextResolver for RegionResolver {
    fn resolve(&self, ctx: &mut ExecutionContext<'_>) -> Result<ArgValue> {
        let name = ctx.require_arg()?;
        match self.store.get(&name) {
            Some(region) => Ok(ArgValue::custom(region)),
            None => Err(CommandError::invalid_value_with(
                &ctx.param().name,
                &name,
                NO_SUCH_REGION,
                Replacements::new().with("region", &name),
            )),
        }
    }
}

pub const NO_SUCH_REGION: MessageKey = MessageKey::from_static("demo.no_such_region");
pub const REGION_SAVED: MessageKey = MessageKey::from_static("demo.region_saved");
pub const REGION_INFO: MessageKey = MessageKey::from_static("demo.region_info");
pub const REGION_LIST: MessageKey = MessageKey::from_static("demo.region_list");
pub const CALC_RESULT: MessageKey = MessageKey::from_static("demo.calc_result");
pub const PLAYERS_ONLY: MessageKey = MessageKey::from_static("demo.players_only");

const DEMO_MESSAGES: &[(MessageKey, &str)] = &[
    (NO_SUCH_REGION, "Error: No region named <c2>{region}</c2>."),
    (REGION_SAVED, "Saved region <c2>{region}</c2> (radius <c3>{radius}</c3>)."),
    (
        REGION_INFO,
        "Region <c2>{region}</c2>: radius <c3>{radius}</c3>, owner <c3>{owner}</c3>.",
    ),
    (REGION_LIST, "Regions ({count}): <c2>{regions}</c2>"),
    (CALC_RESULT, "= <c2>{result}</c2>"),
    (PLAYERS_ONLY, "Error: Only players may do that."),
];

const GERMAN_MESSAGES: &[(MessageKey, &str)] = &[
    (
        keys::PERMISSION_DENIED,
        "Entschuldigung, du hast keine Berechtigung für diesen Befehl.",
    ),
    (keys::LOCALE_CHANGED, "Sprache auf <c2>{locale}</c2> gesetzt."),
    (NO_SUCH_REGION, "Fehler: Keine Region namens <c2>{region}</c2>."),
    (REGION_SAVED, "Region <c2>{region}</c2> gespeichert (Radius <c3>{radius}</c3>)."),
    (REGION_LIST, "Regionen ({count}): <c2>{regions}</c2>"),
];

/// Build a manager with the demo registries and command sets installed.
pub fn build_manager(config: &Config, store: RegionStore) -> Result<CommandManager> {
    let manager = CommandManager::with_config(config);
    manager.enable_unstable_api("help");
    manager.set_command_prefix("/");

    let locales = manager.locales();
    locales.add_messages(&Locale::ENGLISH, DEMO_MESSAGES.iter().cloned());
    locales.add_messages(&Locale::GERMAN, GERMAN_MESSAGES.iter().cloned());

    let replacements = manager.command_replacements();
    for (key, value) in [("region_edit", "region.edit"), ("calc_admin", "calc.admin")] {
        if replacements.get(key).is_none() {
            replacements.add(key, value);
        }
    }

    let store = Arc::new(store);
    manager.register_dependency_arc(Arc::clone(&store))?;
    manager
        .command_contexts()
        .register("region", RegionResolver {
            store: Arc::clone(&store),
        });
    let names = Arc::clone(&store);
    manager
        .command_completions()
        .register("regions", move |_: &CompletionContext<'_>| names.names());

    manager
        .command_conditions()
        .add_condition("player", |ctx: &ConditionContext<'_>| {
            if ctx.issuer().is_player() {
                Ok(())
            } else {
                Err(CommandError::condition_failed("player", Some(PLAYERS_ONLY)))
            }
        });

    manager.register_command(RegionCommands::default())?;
    manager.register_command(CalcCommands)?;
    manager.register_command_with(|_: &Injector<'_>| Ok(LangCommands))?;
    debug!(roots = ?manager.root_names(), "demo commands registered");
    Ok(manager)
}

/// `region|rg` commands over the injected [`RegionStore`].
#[derive(Debug, Default)]
pub struct RegionCommands {
    store: Arc<RegionStore>,
}

impl CommandSet for RegionCommands {
    fn root(&self) -> &str {
        "region|rg"
    }

    fn inject(&mut self, deps: &Injector<'_>) -> Result<()> {
        self.store = deps.get::<RegionStore>()?;
        Ok(())
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations) {
        let this = Arc::clone(&self);
        commands
            .default_command()
            .description("List regions")
            .handler(move |inv| this.list(inv));

        let this = Arc::clone(&self);
        commands
            .command("list|ls")
            .description("List regions")
            .handler(move |inv| this.list(inv));

        let this = Arc::clone(&self);
        commands
            .command("create|set")
            .permission("%region_edit")
            .description("Create or resize a region")
            .param(ParameterDescriptor::new("name", "string").description("Region name"))
            .param(
                ParameterDescriptor::new("radius", "int")
                    .default_value("16")
                    .conditions("limits:min=1,max=512")
                    .completion("@range:8-16")
                    .description("Radius in blocks"),
            )
            .handler(move |inv| this.create(inv));

        let this = Arc::clone(&self);
        commands
            .command("info")
            .description("Show one region")
            .param(
                ParameterDescriptor::new("region", "region")
                    .completion("@regions")
                    .description("An existing region"),
            )
            .handler(move |inv| this.info(inv));

        let this = Arc::clone(&self);
        commands
            .command("delete|remove")
            .permission("%region_edit")
            .description("Delete a region")
            .param(ParameterDescriptor::new("region", "region").completion("@regions"))
            .handler(move |inv| this.delete(inv));

        commands
            .command("visit")
            .conditions("player")
            .description("Travel to a region")
            .param(ParameterDescriptor::new("region", "region").completion("@regions"))
            .param(ParameterDescriptor::new("by", "issuer"))
            .handler(|inv| {
                let region = required_region(inv, "region")?;
                let by = inv
                    .args()
                    .get("by")
                    .and_then(ArgValue::as_issuer)
                    .map_or_else(|| "someone".to_string(), |i| i.name().to_string());
                inv.reply(format!("{by} arrives at {}.", region.name));
                Ok(())
            });

        commands
            .command("help")
            .description("Show region help")
            .param(ParameterDescriptor::new("page", "int").syntax("[page]"))
            .handler(|inv| {
                let page = inv.args().get_i64("page").unwrap_or(1);
                show_help(inv, usize::try_from(page).unwrap_or(1), &[])
            });

        commands
            .command("help")
            .description("Search region help")
            .param(ParameterDescriptor::new("query", "list").optional().rest())
            .handler(|inv| {
                let terms = inv.args().get_list("query").map(<[String]>::to_vec).unwrap_or_default();
                show_help(inv, 1, &terms)
            });

        commands.catch_unknown().private().allow_trailing().handler(|inv| {
            let attempted = inv.operation().args().join(" ");
            inv.reply(format!("No region sub-command '{attempted}'. Try /region help."));
            Ok(())
        });
    }
}

impl RegionCommands {
    fn list(&self, inv: &CommandInvocation) -> anyhow::Result<()> {
        let names = self.store.names();
        let regions = if names.is_empty() {
            "-".to_string()
        } else {
            names.join(", ")
        };
        inv.send_info(
            &REGION_LIST,
            &Replacements::new()
                .with("count", names.len())
                .with("regions", regions),
        );
        Ok(())
    }

    fn create(&self, inv: &CommandInvocation) -> anyhow::Result<()> {
        let name = inv
            .args()
            .get_str("name")
            .ok_or_else(|| anyhow::anyhow!("name was not bound"))?
            .to_string();
        let radius = inv.args().get_i64("radius").unwrap_or(16);
        self.store.save(Region {
            name: name.clone(),
            radius,
            owner: inv.issuer().name().to_string(),
        });
        inv.send_info(
            &REGION_SAVED,
            &Replacements::new().with("region", name).with("radius", radius),
        );
        Ok(())
    }

    fn info(&self, inv: &CommandInvocation) -> anyhow::Result<()> {
        let region = required_region(inv, "region")?;
        inv.send_info(
            &REGION_INFO,
            &Replacements::new()
                .with("region", &region.name)
                .with("radius", region.radius)
                .with("owner", &region.owner),
        );
        Ok(())
    }

    fn delete(&self, inv: &CommandInvocation) -> anyhow::Result<()> {
        let region = required_region(inv, "region")?;
        self.store.remove(&region.name);
        inv.reply(format!("Deleted {}.", region.name));
        Ok(())
    }
}

fn required_region(inv: &CommandInvocation, name: &str) -> anyhow::Result<Arc<Region>> {
    inv.args()
        .get_custom::<Region>(name)
        .ok_or_else(|| anyhow::anyhow!("parameter {name} did not bind a region"))
}

fn show_help(inv: &CommandInvocation, page: usize, terms: &[String]) -> anyhow::Result<()> {
    let mut help = inv
        .manager()
        .generate_help(inv.issuer(), inv.operation().root())?;
    help.search(terms);
    help.set_page(page);
    help.show();
    Ok(())
}

/// `calc` arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct CalcCommands;

impl CommandSet for CalcCommands {
    fn root(&self) -> &str {
        "calc"
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations) {
        commands
            .command("add")
            .description("Add two whole numbers")
            .param(ParameterDescriptor::new("a", "int"))
            .param(ParameterDescriptor::new("b", "int"))
            .handler(|inv| {
                let (a, b) = (int_arg(inv, "a")?, int_arg(inv, "b")?);
                let sum = a
                    .checked_add(b)
                    .ok_or_else(|| CommandError::rejected_message("result does not fit"))?;
                send_result(inv, sum);
                Ok(())
            });

        commands
            .command("add")
            .description("Add two decimals")
            .param(ParameterDescriptor::new("a", "float"))
            .param(ParameterDescriptor::new("b", "float"))
            .handler(|inv| {
                let a = inv.args().get_f64("a").unwrap_or_default();
                let b = inv.args().get_f64("b").unwrap_or_default();
                send_result(inv, a + b);
                Ok(())
            });

        commands
            .command("double")
            .description("Double a number by adding it to itself")
            .param(ParameterDescriptor::new("n", "string"))
            .handler(|inv| {
                let n = inv.args().get_str("n").unwrap_or_default().to_string();
                inv.execute("calc", &["add", n.as_str(), n.as_str()]);
                Ok(())
            });

        commands
            .command("divide|div")
            .description("Integer division")
            .param(ParameterDescriptor::new("a", "int"))
            .param(ParameterDescriptor::new("b", "int"))
            .exception_handler(|failure: &HandlerFailure<'_>| {
                if failure.error.to_string().contains("division by zero") {
                    failure.operation.manager().send_message(
                        &**failure.issuer(),
                        MessageType::Error,
                        &keys::ERROR_PREFIX,
                        &Replacements::new().with("message", "cannot divide by zero"),
                    );
                    return true;
                }
                false
            })
            .handler(|inv| {
                let (a, b) = (int_arg(inv, "a")?, int_arg(inv, "b")?);
                if b == 0 {
                    anyhow::bail!("division by zero");
                }
                send_result(inv, a / b);
                Ok(())
            });

        commands
            .command("sum")
            .description("Add any number of values")
            .param(ParameterDescriptor::new("values", "list").rest())
            .handler(|inv| {
                let mut total = 0_i64;
                for raw in inv.args().get_list("values").unwrap_or_default() {
                    let value = raw.parse::<i64>().map_err(|_| {
                        CommandError::invalid_value_with(
                            "values",
                            raw,
                            keys::MUST_BE_A_NUMBER,
                            Replacements::new().with("num", raw),
                        )
                    })?;
                    total = total.saturating_add(value);
                }
                send_result(inv, total);
                Ok(())
            });

        commands
            .command("crash")
            .permission("%calc_admin")
            .private()
            .description("Fail on purpose")
            .handler(|_| Err(anyhow::anyhow!("the calculator caught fire")));
    }
}

fn int_arg(inv: &CommandInvocation, name: &str) -> anyhow::Result<i64> {
    inv.args()
        .get_i64(name)
        .ok_or_else(|| anyhow::anyhow!("parameter {name} did not bind an integer"))
}

fn send_result(inv: &CommandInvocation, result: impl ToString) {
    inv.send_info(&CALC_RESULT, &Replacements::new().with("result", result));
}

/// `lang` shows or changes the issuer's locale.
#[derive(Debug, Clone, Copy)]
pub struct LangCommands;

impl CommandSet for LangCommands {
    fn root(&self) -> &str {
        "lang|language"
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations) {
        commands
            .default_command()
            .description("Show your language")
            .handler(|inv| {
                let locale = inv.locale();
                inv.reply(format!("Current language: {locale}"));
                Ok(())
            });

        commands
            .command("set")
            .description("Change your language")
            .param(ParameterDescriptor::new("locale", "string").completion("@locales"))
            .handler(|inv| {
                let tag = inv.args().get_str("locale").unwrap_or_default();
                let locale = Locale::new(tag);
                let manager = inv.manager();
                if !manager.locales().supported_languages().contains(&locale) {
                    let valid = manager
                        .locales()
                        .supported_languages()
                        .iter()
                        .map(Locale::as_str)
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(CommandError::invalid_value_with(
                        "locale",
                        tag,
                        keys::PLEASE_SPECIFY_ONE_OF,
                        Replacements::new().with("valid", valid),
                    )
                    .into());
                }
                if !manager.uses_per_issuer_locale() {
                    manager.use_per_issuer_locale(true);
                }
                manager.set_issuer_locale(&**inv.issuer(), locale.clone());
                inv.send_info(
                    &keys::LOCALE_CHANGED,
                    &Replacements::new().with("locale", locale),
                );
                Ok(())
            });
    }
}
