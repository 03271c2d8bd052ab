//! Paginated, searchable help for one root command.

use std::ops::Range;
use std::sync::Arc;

use crate::contexts::CommandContexts;
use crate::issuer::IssuerRef;
use crate::manager::CommandManager;
use crate::message::{MessageKey, MessageType, Replacements, keys};
use crate::params::ParameterDescriptor;
use crate::tree::RootCommand;

/// Help line for one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterHelp {
    pub name: String,
    pub syntax: String,
    pub description: String,
}

/// Help line for one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpEntry {
    pub command: String,
    pub parameters: String,
    pub description: String,
    pub parameter_help: Vec<ParameterHelp>,
    sub_path: Vec<String>,
    search_score: u32,
}

impl HelpEntry {
    #[must_use]
    pub const fn search_score(&self) -> u32 {
        self.search_score
    }

    fn score(&self, terms: &[String]) -> u32 {
        let command = self.command.to_lowercase();
        let description = self.description.to_lowercase();
        terms
            .iter()
            .map(|term| {
                let mut score = 0;
                if self.sub_path.iter().any(|t| t == term) {
                    score += 3;
                } else if command.contains(term.as_str()) {
                    score += 2;
                }
                if description.contains(term.as_str()) {
                    score += 1;
                }
                score
            })
            .sum()
    }
}

/// Pagination state, derived from a result count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelpPage {
    pub page: usize,
    pub per_page: usize,
    pub total_results: usize,
    pub total_pages: usize,
}

impl HelpPage {
    /// `page` is one-based; zero is treated as one.
    #[must_use]
    pub fn compute(total_results: usize, per_page: usize, page: usize) -> Self {
        let per_page = per_page.max(1);
        Self {
            page: page.max(1),
            per_page,
            total_results,
            total_pages: total_results.div_ceil(per_page).max(1),
        }
    }

    #[must_use]
    pub const fn is_only_page(&self) -> bool {
        self.total_pages == 1
    }

    #[must_use]
    pub const fn is_last_page(&self) -> bool {
        self.page >= self.total_pages
    }

    /// Index range of the page's entries; empty past the last page.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        let start = (self.page - 1).saturating_mul(self.per_page);
        if start >= self.total_results {
            return 0..0;
        }
        start..(start + self.per_page).min(self.total_results)
    }
}

/// Help for one root as a particular issuer may see it.
#[derive(Debug)]
pub struct CommandHelp {
    manager: CommandManager,
    issuer: IssuerRef,
    command_name: String,
    entries: Vec<HelpEntry>,
    page: usize,
    per_page: usize,
    search: Option<Vec<String>>,
}

impl CommandHelp {
    pub(crate) fn new(manager: &CommandManager, issuer: &IssuerRef, root: &RootCommand) -> Self {
        let contexts = manager.command_contexts();
        let entries = root
            .declarations()
            .iter()
            .filter(|d| !d.is_private() && !d.is_catch_unknown())
            .filter(|d| manager.has_permission(&**issuer, d.permission()))
            .map(|d| HelpEntry {
                command: d.command_string(),
                parameters: d.syntax().to_string(),
                description: d.description().to_string(),
                parameter_help: parameter_help(contexts, d.params()),
                sub_path: d.sub_path().to_vec(),
                search_score: 0,
            })
            .collect();
        Self {
            manager: manager.clone(),
            issuer: Arc::clone(issuer),
            command_name: root.name().to_string(),
            entries,
            page: 1,
            per_page: manager.default_help_per_page(),
            search: None,
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

    #[must_use]
    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    /// Every entry, in registration order or by search score.
    #[must_use]
    pub fn entries(&self) -> &[HelpEntry] {
        &self.entries
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn set_per_page(&mut self, per_page: usize) {
        self.per_page = per_page.max(1);
    }

    /// Keep entries matching any of `terms`, best match first.
    pub fn search<S: AsRef<str>>(&mut self, terms: &[S]) {
        let terms: Vec<String> = terms
            .iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            self.search = None;
            return;
        }
        for entry in &mut self.entries {
            entry.search_score = entry.score(&terms);
        }
        self.entries.retain(|e| e.search_score > 0);
        self.entries.sort_by(|a, b| b.search_score.cmp(&a.search_score));
        self.search = Some(terms);
    }

    #[must_use]
    pub fn search_terms(&self) -> Option<&[String]> {
        self.search.as_deref()
    }

    #[must_use]
    pub fn page_info(&self) -> HelpPage {
        HelpPage::compute(self.entries.len(), self.per_page, self.page)
    }

    /// Entries on the current page.
    #[must_use]
    pub fn visible_entries(&self) -> &[HelpEntry] {
        &self.entries[self.page_info().range()]
    }

    /// The entry whose sub-path is exactly the search, if any.
    #[must_use]
    pub fn exact_match(&self) -> Option<&HelpEntry> {
        let search = self.search.as_ref()?;
        self.entries.iter().find(|e| e.sub_path == *search)
    }

    /// Render to the issuer through the manager's help formatter.
    pub fn show(&self) {
        let formatter = self.manager.help_formatter();
        if let Some(entry) = self.exact_match() {
            formatter.show_detailed_help(self, entry);
            return;
        }
        let visible = self.visible_entries();
        if visible.is_empty() {
            formatter.show_no_results(self);
        } else if self.search.is_some() {
            formatter.show_search_results(self, visible);
        } else {
            formatter.show_all_results(self, visible);
        }
    }

    /// Send one help-category message to the issuer.
    pub fn send(&self, key: &MessageKey, replacements: &Replacements) {
        self.manager
            .send_message(&*self.issuer, MessageType::Help, key, replacements);
    }

    fn base_replacements(&self) -> Replacements {
        Replacements::new()
            .with("commandprefix", self.manager.command_prefix())
            .with("command", &self.command_name)
    }
}

fn parameter_help(contexts: &CommandContexts, params: &[ParameterDescriptor]) -> Vec<ParameterHelp> {
    params
        .iter()
        .filter_map(|p| {
            contexts.syntax_for(p).map(|syntax| ParameterHelp {
                name: p.name.clone(),
                syntax,
                description: p.description.clone(),
            })
        })
        .collect()
}

/// Renders help. Every step has a default built on the help message keys,
/// so implementations override only what they change.
pub trait HelpFormatter: Send + Sync {
    fn show_all_results(&self, help: &CommandHelp, entries: &[HelpEntry]) {
        self.print_header(help);
        for entry in entries {
            self.print_entry(help, entry);
        }
        self.print_footer(help);
    }

    fn show_search_results(&self, help: &CommandHelp, entries: &[HelpEntry]) {
        self.print_search_header(help);
        for entry in entries {
            self.print_entry(help, entry);
        }
        self.print_footer(help);
    }

    fn show_detailed_help(&self, help: &CommandHelp, entry: &HelpEntry) {
        self.print_detailed_header(help);
        self.print_detailed_entry(help, entry);
        for param in &entry.parameter_help {
            self.print_detailed_parameter(help, param);
        }
    }

    fn show_no_results(&self, help: &CommandHelp) {
        match help.search_terms() {
            Some(terms) if help.entries().is_empty() => help.send(
                &keys::NO_COMMAND_MATCHED_SEARCH,
                &Replacements::new().with("search", terms.join(" ")),
            ),
            _ => help.send(&keys::HELP_NO_RESULTS, &Replacements::new()),
        }
    }

    fn print_header(&self, help: &CommandHelp) {
        help.send(&keys::HELP_HEADER, &help.base_replacements());
    }

    fn print_search_header(&self, help: &CommandHelp) {
        let search = help.search_terms().map(|t| t.join(" ")).unwrap_or_default();
        help.send(
            &keys::HELP_SEARCH_HEADER,
            &help.base_replacements().with("search", search),
        );
    }

    fn print_entry(&self, help: &CommandHelp, entry: &HelpEntry) {
        help.send(&keys::HELP_FORMAT, &self.entry_replacements(help, entry));
    }

    fn print_footer(&self, help: &CommandHelp) {
        let page = help.page_info();
        if page.is_only_page() {
            return;
        }
        help.send(
            &keys::HELP_PAGE_INFORMATION,
            &Replacements::new()
                .with("page", page.page)
                .with("totalpages", page.total_pages)
                .with("results", page.total_results),
        );
    }

    fn print_detailed_header(&self, help: &CommandHelp) {
        help.send(&keys::HELP_DETAILED_HEADER, &help.base_replacements());
    }

    fn print_detailed_entry(&self, help: &CommandHelp, entry: &HelpEntry) {
        help.send(
            &keys::HELP_DETAILED_COMMAND_FORMAT,
            &self.entry_replacements(help, entry),
        );
    }

    fn print_detailed_parameter(&self, help: &CommandHelp, param: &ParameterHelp) {
        let description = if param.description.is_empty() {
            param.name.clone()
        } else {
            param.description.clone()
        };
        help.send(
            &keys::HELP_DETAILED_PARAMETER_FORMAT,
            &Replacements::new()
                .with("name", &param.name)
                .with("syntaxorname", &param.syntax)
                .with("description", description),
        );
    }

    fn entry_replacements(&self, help: &CommandHelp, entry: &HelpEntry) -> Replacements {
        let separator = if entry.description.is_empty() { "" } else { "-" };
        Replacements::new()
            .with("commandprefix", help.manager().command_prefix())
            .with(
                "command",
                format!("{}{}", help.manager().command_prefix(), entry.command),
            )
            .with("parameters", &entry.parameters)
            .with("separator", separator)
            .with("description", &entry.description)
    }
}

/// Formatter using every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHelpFormatter;

impl HelpFormatter for DefaultHelpFormatter {}
