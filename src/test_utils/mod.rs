//! Shared test utilities for cmdframe.

pub mod logging;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tempfile::TempDir;
use uuid::Uuid;

use crate::config::Config;
use crate::issuer::CommandIssuer;
use crate::message::{MessageType, RenderedMessage};

/// Table-driven test case structure.
#[derive(Debug, Clone)]
pub struct TestCase<I, E> {
    pub name: &'static str,
    pub input: I,
    pub expected: E,
    pub should_panic: bool,
}

impl<I, E> TestCase<I, E> {
    pub const fn new(name: &'static str, input: I, expected: E) -> Self {
        Self {
            name,
            input,
            expected,
            should_panic: false,
        }
    }
}

/// Run table-driven tests with detailed logging.
pub fn run_table_tests<I, E, F>(cases: Vec<TestCase<I, E>>, test_fn: F) -> Result<(), String>
where
    I: std::fmt::Debug + Clone + std::panic::RefUnwindSafe,
    E: std::fmt::Debug + PartialEq,
    F: Fn(I) -> E + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    for case in cases {
        let start = std::time::Instant::now();
        println!("[TEST] Running: {}", case.name);
        println!("[TEST] Input: {:?}", case.input);

        let result = std::panic::catch_unwind(|| test_fn(case.input.clone()));
        let elapsed = start.elapsed();

        if case.should_panic {
            if result.is_ok() {
                return Err(format!("Test '{}' expected panic", case.name));
            }
            println!("[TEST] PASSED: {} ({elapsed:?}, panicked as expected)\n", case.name);
            continue;
        }

        let Ok(actual) = result else {
            return Err(format!("Test '{}' panicked unexpectedly", case.name));
        };

        println!("[TEST] Expected: {:?}", case.expected);
        println!("[TEST] Actual: {actual:?}");

        if actual != case.expected {
            return Err(format!(
                "Test '{}' failed: expected {:?}, got {:?}",
                case.name, case.expected, actual
            ));
        }
        println!("[TEST] PASSED: {} ({elapsed:?})\n", case.name);
    }
    Ok(())
}

/// Issuer that keeps every message it is sent.
#[derive(Debug)]
pub struct RecordingIssuer {
    id: Uuid,
    name: String,
    player: bool,
    permissions: RwLock<HashSet<String>>,
    messages: Mutex<Vec<RenderedMessage>>,
}

impl RecordingIssuer {
    /// A console-like issuer with no permissions.
    #[must_use]
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, false))
    }

    /// An interactive-user issuer with no permissions.
    #[must_use]
    pub fn player(name: &str) -> Arc<Self> {
        Arc::new(Self::build(name, true))
    }

    fn build(name: &str, player: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            player,
            permissions: RwLock::new(HashSet::new()),
            messages: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_permissions<'a>(self: Arc<Self>, permissions: impl IntoIterator<Item = &'a str>) -> Arc<Self> {
        for permission in permissions {
            self.grant(permission);
        }
        self
    }

    pub fn grant(&self, permission: &str) {
        self.permissions.write().insert(permission.to_string());
    }

    pub fn revoke(&self, permission: &str) {
        self.permissions.write().remove(permission);
    }

    #[must_use]
    pub fn messages(&self) -> Vec<RenderedMessage> {
        self.messages.lock().clone()
    }

    /// Message text with colour tags stripped, oldest first.
    #[must_use]
    pub fn plain_messages(&self) -> Vec<String> {
        self.messages.lock().iter().map(RenderedMessage::plain).collect()
    }

    #[must_use]
    pub fn messages_of(&self, category: MessageType) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.category == category)
            .map(RenderedMessage::plain)
            .collect()
    }

    #[must_use]
    pub fn last_message(&self) -> Option<String> {
        self.messages.lock().last().map(RenderedMessage::plain)
    }

    /// Whether any message contains `needle`.
    #[must_use]
    pub fn received(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|m| m.plain().contains(needle))
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl CommandIssuer for RecordingIssuer {
    fn unique_id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.permissions.read().contains(permission)
    }

    fn is_player(&self) -> bool {
        self.player
    }

    fn deliver(&self, message: &RenderedMessage) {
        self.messages.lock().push(message.clone());
    }
}


/// A `config.toml` written into its own temporary directory.
pub struct ConfigFile {
    _dir: TempDir,
    path: PathBuf,
}

impl ConfigFile {
    #[must_use]
    pub fn new(content: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).expect("Failed to write config file");
        Self { _dir: dir, path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load through the same path the binary uses for `--config`.
    pub fn load(&self) -> crate::Result<Config> {
        Config::load(Some(self.path()))
    }
}
