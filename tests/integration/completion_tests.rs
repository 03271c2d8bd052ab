use std::sync::Arc;

use cmdframe::command::{CommandSet, Declarations};
use cmdframe::completions::CompletionContext;
use cmdframe::{CommandManager, ParameterDescriptor};

use super::common::{demo_manager, issuer};

#[test]
fn test_subcommands_are_filtered_by_permission() {
    let manager = demo_manager();
    let (guest, _) = issuer("guest", &[]);
    let (editor, _) = issuer("editor", &["region.edit"]);

    let guest_sees = manager.complete(&guest, "region", "", &[] as &[&str]);
    assert_eq!(guest_sees, vec!["help", "info", "list", "ls", "visit"]);

    let editor_sees = manager.complete(&editor, "region", "", &[] as &[&str]);
    assert!(editor_sees.contains(&"create".to_string()));
    assert!(editor_sees.contains(&"delete".to_string()));
}

#[test]
fn test_subcommands_match_partial_case_insensitively() {
    let manager = demo_manager();
    let (guest, _) = issuer("guest", &[]);
    assert_eq!(manager.complete(&guest, "rg", "I", &[] as &[&str]), vec!["info"]);
}

#[test]
fn test_registered_provider_completes_parameter() {
    let manager = demo_manager();
    let (guest, _) = issuer("guest", &[]);
    assert_eq!(manager.complete(&guest, "region", "sp", &["info"]), vec!["spawn"]);
    assert!(manager.complete(&guest, "region", "x", &["info"]).is_empty());
}

#[test]
fn test_range_provider_after_resolved_parameter() {
    let manager = demo_manager();
    let (editor, _) = issuer("editor", &["region.edit"]);
    let all = manager.complete(&editor, "region", "", &["create", "home"]);
    assert_eq!(all.len(), 9);
    assert_eq!(all.first().map(String::as_str), Some("8"));
    let tens = manager.complete(&editor, "region", "1", &["create", "home"]);
    assert_eq!(tens, vec!["10", "11", "12", "13", "14", "15", "16"]);
}

#[test]
fn test_locales_provider() {
    let manager = demo_manager();
    let (guest, _) = issuer("guest", &[]);
    assert_eq!(manager.complete(&guest, "lang", "d", &["set"]), vec!["de"]);
}

#[test]
fn test_unknown_root_completes_nothing() {
    let manager = demo_manager();
    let (guest, _) = issuer("guest", &[]);
    assert!(manager.complete(&guest, "nope", "", &[] as &[&str]).is_empty());
}

struct ShapeCommands;

impl CommandSet for ShapeCommands {
    fn root(&self) -> &str {
        "shape"
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations) {
        commands
            .command("paint")
            .param(ParameterDescriptor::new("shape", "string").completion("circle|square"))
            .param(ParameterDescriptor::new("fill", "bool"))
            .param(ParameterDescriptor::new("colour", "string").completion("@colours"))
            .handler(|_| Ok(()));

        commands
            .command("mode")
            .param(ParameterDescriptor::new("mode", "string").values(["fast", "slow"]))
            .handler(|_| Ok(()));

        commands
            .command("broken")
            .param(ParameterDescriptor::new("thing", "string").completion("@explodes"))
            .handler(|_| Ok(()));
    }
}

fn shape_manager() -> CommandManager {
    let manager = CommandManager::new();
    manager
        .command_completions()
        .register("colours", |ctx: &CompletionContext<'_>| {
            // Offer colours that suit the chosen shape.
            match ctx.passed_args().get_str("shape") {
                Some("circle") => vec!["red".to_string(), "rose".to_string()],
                _ => vec!["blue".to_string()],
            }
        });
    manager
        .command_completions()
        .register("explodes", |_: &CompletionContext<'_>| -> Vec<String> {
            panic!("provider bug")
        });
    manager.register_command(ShapeCommands).unwrap();
    manager
}

#[test]
fn test_literal_list_and_type_default_completion() {
    let manager = shape_manager();
    let (guest, _) = issuer("guest", &[]);
    assert_eq!(manager.complete(&guest, "shape", "s", &["paint"]), vec!["square"]);
    assert_eq!(
        manager.complete(&guest, "shape", "", &["paint", "circle"]),
        vec!["true", "false"]
    );
}

#[test]
fn test_provider_sees_previously_resolved_arguments() {
    let manager = shape_manager();
    let (guest, _) = issuer("guest", &[]);
    assert_eq!(
        manager.complete(&guest, "shape", "r", &["paint", "circle", "yes"]),
        vec!["red", "rose"]
    );
    assert_eq!(
        manager.complete(&guest, "shape", "", &["paint", "square", "no"]),
        vec!["blue"]
    );
}

#[test]
fn test_unresolvable_tokens_are_skipped() {
    let manager = shape_manager();
    let (guest, _) = issuer("guest", &[]);
    // "maybe" is not a bool; completion still reaches the colour.
    assert_eq!(
        manager.complete(&guest, "shape", "", &["paint", "square", "maybe"]),
        vec!["blue"]
    );
}

#[test]
fn test_values_list_drives_completion() {
    let manager = shape_manager();
    let (guest, _) = issuer("guest", &[]);
    assert_eq!(manager.complete(&guest, "shape", "F", &["mode"]), vec!["fast"]);
}

#[test]
fn test_panicking_provider_yields_nothing() {
    let manager = shape_manager();
    let (guest, _) = issuer("guest", &[]);
    assert!(manager.complete(&guest, "shape", "", &["broken"]).is_empty());
}
