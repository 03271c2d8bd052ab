use std::sync::Arc;

use cmdframe::command::{CommandSet, Declarations};
use cmdframe::deps::Injector;
use cmdframe::demo::{RegionCommands, RegionStore};
use cmdframe::{CommandError, CommandManager, Result};

use super::common::issuer;

#[test]
fn test_missing_dependency_registers_nothing() {
    let manager = CommandManager::new();
    let err = manager.register_command(RegionCommands::default()).unwrap_err();
    assert!(matches!(err, CommandError::MissingDependency { .. }));
    assert!(!manager.has_registered_commands());
}

#[test]
fn test_duplicate_dependency_is_rejected() {
    let manager = CommandManager::new();
    manager.register_dependency(RegionStore::new()).unwrap();
    let err = manager.register_dependency(RegionStore::new()).unwrap_err();
    assert!(matches!(err, CommandError::DuplicateDependency { .. }));
}

struct Greeting(String);

/// Reads a keyed dependency and a typed one.
#[derive(Default)]
struct GreeterCommands {
    greeting: Option<Arc<Greeting>>,
    farewell: Option<Arc<Greeting>>,
}

impl CommandSet for GreeterCommands {
    fn root(&self) -> &str {
        "greet"
    }

    fn inject(&mut self, deps: &Injector<'_>) -> Result<()> {
        self.greeting = Some(deps.get::<Greeting>()?);
        self.farewell = Some(deps.get_keyed::<Greeting>("farewell")?);
        Ok(())
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations) {
        let this = Arc::clone(&self);
        commands.default_command().handler(move |inv| {
            let hello = this.greeting.as_ref().map_or("", |g| g.0.as_str());
            let bye = this.farewell.as_ref().map_or("", |g| g.0.as_str());
            inv.reply(format!("{hello} {} / {bye}", inv.issuer().name()));
            Ok(())
        });
    }
}

#[test]
fn test_typed_and_keyed_dependencies_are_injected() {
    let manager = CommandManager::new();
    manager.register_dependency(Greeting("hello".into())).unwrap();
    manager
        .register_dependency_keyed("farewell", Greeting("bye".into()))
        .unwrap();
    manager.register_command(GreeterCommands::default()).unwrap();

    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "greet", &[] as &[&str]);
    assert_eq!(alex.last_message().as_deref(), Some("hello alex / bye"));
}

#[test]
fn test_missing_keyed_dependency_names_the_key() {
    let manager = CommandManager::new();
    manager.register_dependency(Greeting("hello".into())).unwrap();
    let err = manager.register_command(GreeterCommands::default()).unwrap_err();
    match err {
        CommandError::MissingDependency { key, .. } => assert_eq!(key, "farewell"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_factory_receives_the_registry() {
    let manager = CommandManager::new();
    let store = Arc::new(RegionStore::new());
    manager.register_dependency_arc(Arc::clone(&store)).unwrap();
    manager
        .register_dependency_keyed("farewell", Greeting("later".into()))
        .unwrap();

    let result = manager.register_command_with(|deps: &Injector<'_>| {
        let store = deps.get::<RegionStore>()?;
        Ok(GreeterCommands {
            greeting: Some(Arc::new(Greeting(format!("{} regions,", store.len())))),
            farewell: None,
        })
    });
    // The set's own inject still runs and needs an unkeyed Greeting.
    assert!(matches!(result, Err(CommandError::MissingDependency { .. })));
    assert!(!manager.has_registered_commands());

    manager.register_dependency(Greeting("hey".into())).unwrap();
    manager
        .register_command_with(|deps: &Injector<'_>| {
            assert!(deps.get::<RegionStore>()?.is_empty());
            Ok(GreeterCommands::default())
        })
        .unwrap();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "greet", &[] as &[&str]);
    assert_eq!(alex.last_message().as_deref(), Some("hey alex / later"));
}
