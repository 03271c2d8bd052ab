use cmdframe::CommandManager;
use cmdframe::CommandError;

use super::common::{demo_manager, issuer};

#[test]
fn test_help_lists_every_visible_declaration() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &["region.edit"]);
    manager.execute(&handle, "region", &["help"]);

    let messages = alex.plain_messages();
    assert_eq!(messages[0], "=== Showing help for /region ===");
    // Header plus eight entries; one page, so no footer.
    assert_eq!(messages.len(), 9);
    assert!(messages.contains(&"/region info <region> - Show one region".to_string()));
    assert!(messages.contains(&"/region create <name> [radius] - Create or resize a region".to_string()));
    assert!(!messages.iter().any(|m| m.contains("crash") || m.contains("sub-command")));
}

#[test]
fn test_help_hides_commands_without_permission() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "region", &["help"]);

    let messages = alex.plain_messages();
    assert_eq!(messages.len(), 7);
    assert!(!messages.iter().any(|m| m.contains("/region create")));
    assert!(!messages.iter().any(|m| m.contains("/region delete")));
}

#[test]
fn test_exact_search_shows_detailed_help() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "region", &["help", "info"]);

    assert_eq!(
        alex.plain_messages(),
        vec![
            "=== Detailed help for /region ===".to_string(),
            "/region info <region> - Show one region".to_string(),
            "<region>: An existing region".to_string(),
        ]
    );
}

#[test]
fn test_search_without_matches() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "region", &["help", "zzz"]);
    assert_eq!(alex.plain_messages(), vec!["No command matched zzz.".to_string()]);
}

#[test]
fn test_partial_search_ranks_results() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    let mut help = manager.generate_help(&handle, "region").unwrap();
    help.search(&["regions"]);

    // Matches only descriptions, so every hit scores the same.
    assert!(!help.entries().is_empty());
    assert!(help.entries().iter().all(|e| e.search_score() == 1));
    assert!(help.exact_match().is_none());

    help.show();
    assert_eq!(
        alex.plain_messages()[0],
        "=== Search results for /region regions ==="
    );
}

#[test]
fn test_pagination_footer() {
    let manager = demo_manager();
    manager.set_default_help_per_page(3);
    let (handle, alex) = issuer("alex", &["region.edit"]);
    manager.execute(&handle, "region", &["help", "2"]);

    let messages = alex.plain_messages();
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[4], "- Showing page 2 of 3 (8 results).");
}

#[test]
fn test_page_past_the_end() {
    let manager = demo_manager();
    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "region", &["help", "9"]);
    assert_eq!(alex.plain_messages(), vec!["Error: No more results.".to_string()]);
}

#[test]
fn test_help_requires_unstable_api() {
    let manager = CommandManager::new();
    let (handle, _) = issuer("alex", &[]);
    let err = manager.generate_help(&handle, "anything").unwrap_err();
    assert!(matches!(err, CommandError::UnsupportedFeature(_)));
}

#[test]
fn test_help_for_unknown_root() {
    let manager = demo_manager();
    let (handle, _) = issuer("alex", &[]);
    assert!(manager.generate_help(&handle, "nope").is_err());
}
