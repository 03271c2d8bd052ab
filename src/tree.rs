//! Root commands and the sub-command bindings beneath them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::command::CommandDeclaration;

/// Candidates for one invocation and how many tokens their path used.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub candidates: Vec<Arc<CommandDeclaration>>,
    pub consumed: usize,
}

/// One root and every declaration bound beneath it, keyed by the
/// space-joined sub-path. The empty key holds the root default.
#[derive(Debug)]
pub struct RootCommand {
    name: String,
    aliases: Vec<String>,
    sub_commands: HashMap<String, Vec<Arc<CommandDeclaration>>>,
    catch_unknown: Vec<Arc<CommandDeclaration>>,
    ordered: Vec<Arc<CommandDeclaration>>,
    max_depth: usize,
}

impl RootCommand {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            sub_commands: HashMap::new(),
            catch_unknown: Vec::new(),
            ordered: Vec::new(),
            max_depth: 0,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Bind `decl` under each of its paths. Overloads keep registration order.
    pub fn register(&mut self, decl: Arc<CommandDeclaration>) {
        if decl.is_catch_unknown() {
            self.catch_unknown.push(Arc::clone(&decl));
        } else {
            for path in decl.paths() {
                self.max_depth = self.max_depth.max(path.len());
                self.sub_commands
                    .entry(path.join(" "))
                    .or_default()
                    .push(Arc::clone(&decl));
            }
        }
        debug!(root = %self.name, command = %decl.command_string(), "registered command");
        self.ordered.push(decl);
    }

    /// Candidates for `args`: the longest sub-path with a binding wins.
    /// Without one, the root default followed by catch-unknown handlers,
    /// consuming nothing.
    #[must_use]
    pub fn route(&self, args: &[String]) -> RouteMatch {
        for len in (1..=self.max_depth.min(args.len())).rev() {
            let key = args[..len].join(" ").to_lowercase();
            if let Some(found) = self.sub_commands.get(&key).filter(|c| !c.is_empty()) {
                return RouteMatch {
                    candidates: found.clone(),
                    consumed: len,
                };
            }
        }
        let candidates = self
            .sub_commands
            .get("")
            .into_iter()
            .flatten()
            .chain(&self.catch_unknown)
            .cloned()
            .collect();
        RouteMatch {
            candidates,
            consumed: 0,
        }
    }

    /// Next path tokens after `preceding` that start with `partial`,
    /// with the declarations behind each.
    #[must_use]
    pub fn next_tokens(
        &self,
        preceding: &[String],
        partial: &str,
    ) -> Vec<(String, Vec<Arc<CommandDeclaration>>)> {
        let partial = partial.to_lowercase();
        let depth = preceding.len();
        let mut out: Vec<(String, Vec<Arc<CommandDeclaration>>)> = Vec::new();
        let mut keys: Vec<&String> = self.sub_commands.keys().collect();
        keys.sort();
        for key in keys {
            let tokens: Vec<&str> = key.split(' ').filter(|t| !t.is_empty()).collect();
            if tokens.len() <= depth {
                continue;
            }
            let prefix_matches = tokens
                .iter()
                .zip(preceding)
                .all(|(t, p)| t.eq_ignore_ascii_case(p));
            let next = tokens[depth];
            if !prefix_matches || !next.starts_with(&partial) {
                continue;
            }
            let decls = self.sub_commands.get(key).cloned().unwrap_or_default();
            match out.iter_mut().find(|(t, _)| t.as_str() == next) {
                Some((_, existing)) => existing.extend(decls),
                None => out.push((next.to_string(), decls)),
            }
        }
        out
    }

    /// Every declaration in registration order.
    #[must_use]
    pub fn declarations(&self) -> &[Arc<CommandDeclaration>] {
        &self.ordered
    }

    /// Distinct first sub-command tokens, sorted.
    #[must_use]
    pub fn sub_command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sub_commands
            .keys()
            .filter_map(|k| k.split(' ').next())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Every root of a manager, indexed by lower-cased name and alias.
#[derive(Debug, Default)]
pub struct CommandTree {
    roots: Vec<RootCommand>,
    index: HashMap<String, usize>,
}

impl CommandTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The root named `name`, created on first use.
    pub fn obtain_root(&mut self, name: &str) -> &mut RootCommand {
        let key = name.to_lowercase();
        let idx = if let Some(&idx) = self.index.get(&key) {
            idx
        } else {
            self.roots.push(RootCommand::new(key.clone()));
            let idx = self.roots.len() - 1;
            self.index.insert(key, idx);
            idx
        };
        &mut self.roots[idx]
    }

    #[must_use]
    pub fn get_root(&self, name: &str) -> Option<&RootCommand> {
        self.index
            .get(&name.to_lowercase())
            .map(|&idx| &self.roots[idx])
    }

    /// Route `alias` to the root `name`. An alias already owned by a
    /// different root is left alone.
    pub fn add_alias(&mut self, name: &str, alias: &str) -> bool {
        let name = name.to_lowercase();
        let alias = alias.to_lowercase();
        let Some(&target) = self.index.get(&name) else {
            return false;
        };
        match self.index.get(&alias) {
            Some(&existing) if existing != target => {
                warn!(%alias, root = %name, "alias already names another root command");
                false
            }
            Some(_) => true,
            None => {
                self.index.insert(alias.clone(), target);
                self.roots[target].aliases.push(alias);
                true
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.iter().all(|r| r.ordered.is_empty())
    }

    /// Roots in creation order.
    pub fn roots(&self) -> impl Iterator<Item = &RootCommand> {
        self.roots.iter()
    }
}
