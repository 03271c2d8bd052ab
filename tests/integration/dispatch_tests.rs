use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cmdframe::command::{CommandSet, Declarations};
use cmdframe::{CommandManager, ParameterDescriptor};

use super::common::{demo_manager, issuer, player};

struct ToggleCommands;

impl CommandSet for ToggleCommands {
    fn root(&self) -> &str {
        "toggle"
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations) {
        commands
            .command("mode")
            .param(ParameterDescriptor::new("mode", "string").values(["fast", "slow"]))
            .handler(|inv| {
                inv.reply(format!("mode={}", inv.args().get_str("mode").unwrap_or_default()));
                Ok(())
            });

        commands
            .command("say")
            .param(ParameterDescriptor::new("times", "int").default_value("1"))
            .param(ParameterDescriptor::new("message", "text").rest())
            .handler(|inv| {
                let times = inv.args().get_i64("times").unwrap_or(1);
                let message = inv.args().get_str("message").unwrap_or_default();
                inv.reply(format!("{times}x {message}"));
                Ok(())
            });

        commands
            .command("flag")
            .param(
                ParameterDescriptor::new("force", "bool")
                    .optional()
                    .permission("toggle.force"),
            )
            .handler(|inv| {
                inv.reply(format!("force={:?}", inv.args().get_bool("force")));
                Ok(())
            });
    }
}

fn toggle_manager() -> CommandManager {
    let manager = CommandManager::new();
    manager.register_command(ToggleCommands).unwrap();
    manager
}

#[test]
fn test_create_then_info_round_trip() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &["region.edit"]);

    assert!(manager.execute(&handle, "region", &["create", "home", "20"]));
    assert!(manager.execute(&handle, "region", &["info", "home"]));

    assert_eq!(
        alex.plain_messages(),
        vec![
            "Saved region home (radius 20).".to_string(),
            "Region home: radius 20, owner alex.".to_string(),
        ]
    );
}

#[test]
fn test_default_value_fills_missing_parameter() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &["region.edit"]);
    manager.execute(&handle, "region", &["create", "home"]);
    assert_eq!(alex.last_message().as_deref(), Some("Saved region home (radius 16)."));
}

#[test]
fn test_unknown_root_is_not_handled() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    assert!(!manager.execute(&handle, "teleport", &["home"]));
    assert!(alex.messages().is_empty());
}

#[test]
fn test_alias_and_alternate_paths_route_to_same_command() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "rg", &["ls"]);
    manager.execute(&handle, "REGION", &["LIST"]);
    manager.execute(&handle, "region", &[] as &[&str]);
    let messages = alex.plain_messages();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m == "Regions (1): spawn"));
}

#[test]
fn test_permission_denied_is_rendered() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    assert!(manager.execute(&handle, "region", &["create", "home"]));
    assert_eq!(
        alex.plain_messages(),
        vec!["I'm sorry, but you do not have permission to perform this command.".to_string()]
    );
}

#[test]
fn test_parameter_limits_reject_out_of_range_values() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &["region.edit"]);
    manager.execute(&handle, "region", &["create", "home", "1000"]);
    assert_eq!(
        alex.plain_messages(),
        vec![
            "Error: Please specify a value of at most 512.".to_string(),
            "Usage: region create <name> [radius]".to_string(),
        ]
    );
}

#[test]
fn test_custom_resolver_failure_uses_its_message() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "region", &["info", "nowhere"]);
    assert_eq!(
        alex.plain_messages(),
        vec![
            "Error: No region named nowhere.".to_string(),
            "Usage: region info <region>".to_string(),
        ]
    );
}

#[test]
fn test_unknown_subcommand_reaches_catch_unknown() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "region", &["frobnicate", "now"]);
    assert_eq!(
        alex.last_message().as_deref(),
        Some("No region sub-command 'frobnicate now'. Try /region help.")
    );
}

#[test]
fn test_overloads_fall_through_to_float() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "calc", &["add", "2", "3"]);
    manager.execute(&handle, "calc", &["add", "2.5", "1"]);
    assert_eq!(alex.plain_messages(), vec!["= 5".to_string(), "= 3.5".to_string()]);
}

#[test]
fn test_overload_failure_reports_earliest_most_specific() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "calc", &["add", "x", "1"]);
    assert_eq!(
        alex.plain_messages(),
        vec![
            "Error: x must be a number.".to_string(),
            "Usage: calc add <a> <b>".to_string(),
        ]
    );
}

#[test]
fn test_too_few_and_too_many_show_only_syntax() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "calc", &["add", "1"]);
    manager.execute(&handle, "calc", &["add", "1", "2", "3"]);
    assert_eq!(
        alex.plain_messages(),
        vec![
            "Usage: calc add <a> <b>".to_string(),
            "Usage: calc add <a> <b>".to_string(),
        ]
    );
}

#[test]
fn test_nested_invocation_reuses_issuer() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "calc", &["double", "21"]);
    assert_eq!(alex.plain_messages(), vec!["= 42".to_string()]);
}

#[test]
fn test_user_facing_handler_error_is_rendered_with_syntax() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "calc", &["sum", "1", "x"]);
    assert_eq!(
        alex.plain_messages(),
        vec![
            "Error: x must be a number.".to_string(),
            "Usage: calc sum <values>".to_string(),
        ]
    );
}

#[test]
fn test_conditions_gate_on_issuer_kind() {
    let manager = demo_manager();
    let (console, console_rec) = issuer("console", &[]);
    let (handle, alex) = player("alex", &[]);

    manager.execute(&console, "region", &["visit", "spawn"]);
    manager.execute(&handle, "region", &["visit", "spawn"]);

    assert_eq!(
        console_rec.plain_messages(),
        vec!["Error: Only players may do that.".to_string()]
    );
    assert_eq!(alex.plain_messages(), vec!["alex arrives at spawn.".to_string()]);
}

#[test]
fn test_values_restriction_lists_valid_values() {
    let manager = toggle_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "toggle", &["mode", "FAST"]);
    manager.execute(&handle, "toggle", &["mode", "medium"]);
    let messages = alex.plain_messages();
    assert_eq!(messages[0], "mode=FAST");
    assert_eq!(messages[1], "Error: Please specify one of (fast, slow).");
}

#[test]
fn test_rest_parameter_joins_remaining_tokens() {
    let manager = toggle_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "toggle", &["say", "3", "hello", "there", "world"]);
    assert_eq!(alex.last_message().as_deref(), Some("3x hello there world"));
}

#[test]
fn test_parameter_permission_applies_only_when_supplied() {
    let manager = toggle_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "toggle", &["flag"]);
    manager.execute(&handle, "toggle", &["flag", "yes"]);
    alex.grant("toggle.force");
    manager.execute(&handle, "toggle", &["flag", "yes"]);
    assert_eq!(
        alex.plain_messages(),
        vec![
            "force=None".to_string(),
            "I'm sorry, but you do not have permission to supply force.".to_string(),
            "force=Some(true)".to_string(),
        ]
    );
}

#[test]
fn test_request_parse_dispatches_raw_lines() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    let request = cmdframe::CommandRequest::parse(handle, "/calc add 40 2").unwrap();
    assert!(manager.dispatch(request));
    assert_eq!(alex.plain_messages(), vec!["= 42".to_string()]);
}

struct SetCommands {
    calls: Arc<AtomicUsize>,
}

impl CommandSet for SetCommands {
    fn root(&self) -> &str {
        "p"
    }

    fn declare(self: Arc<Self>, commands: &mut Declarations) {
        let this = Arc::clone(&self);
        commands
            .command("set region")
            .param(ParameterDescriptor::new("name", "string"))
            .param(ParameterDescriptor::new("radius", "int"))
            .handler(move |inv| {
                this.calls.fetch_add(1, Ordering::SeqCst);
                let name = inv.args().get_str("name").unwrap_or_default();
                let radius = inv.args().get_i64("radius").unwrap_or_default();
                inv.reply(format!("{name}:{radius}"));
                Ok(())
            });
    }
}

#[test]
fn test_multi_word_sub_command_binds_and_reports_missing_argument() {
    let manager = CommandManager::new();
    let calls = Arc::new(AtomicUsize::new(0));
    manager
        .register_command(SetCommands {
            calls: Arc::clone(&calls),
        })
        .unwrap();
    let (handle, alex) = issuer("alex", &[]);

    assert!(manager.execute(&handle, "p", &["set", "region", "spawn", "10"]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(manager.execute(&handle, "p", &["set", "region", "spawn"]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        alex.plain_messages(),
        vec![
            "spawn:10".to_string(),
            "Usage: p set region <name> <radius>".to_string(),
        ]
    );
}
