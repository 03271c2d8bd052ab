use cmdframe::config::Config;
use cmdframe::demo::{RegionStore, build_manager};
use cmdframe::test_utils::ConfigFile;

use super::common::issuer;

#[test]
fn test_config_file_drives_manager() {
    let file = ConfigFile::new(
        r#"
[help]
per_page = 2

[replacements]
region_edit = "staff"
"#,
    );
    let config = file.load().unwrap();
    assert_eq!(config.help.per_page, 2);

    let manager = build_manager(&config, RegionStore::new()).unwrap();
    assert_eq!(manager.default_help_per_page(), 2);

    let (staff, staff_rec) = issuer("sam", &["staff"]);
    let (editor, editor_rec) = issuer("alex", &["region.edit"]);
    manager.execute(&staff, "region", &["create", "home"]);
    manager.execute(&editor, "region", &["create", "away"]);

    assert_eq!(
        staff_rec.last_message().as_deref(),
        Some("Saved region home (radius 16).")
    );
    assert_eq!(
        editor_rec.last_message().as_deref(),
        Some("I'm sorry, but you do not have permission to perform this command.")
    );
}

#[test]
fn test_unstable_apis_from_config() {
    let config = Config::from_toml("[unstable]\napis = [\"Help\"]\n").unwrap();
    let manager = cmdframe::CommandManager::with_config(&config);
    assert!(manager.verify_unstable_api("help").is_ok());
    assert!(manager.verify_unstable_api("brigadier").is_err());
}

#[test]
fn test_per_issuer_locale_from_config() {
    let config = Config::from_toml("[locale]\nper_issuer = true\nsupported = [\"en\", \"de\"]\n").unwrap();
    let manager = build_manager(&config, RegionStore::new()).unwrap();
    assert!(manager.uses_per_issuer_locale());

    let (handle, alex) = issuer("alex", &[]);
    manager.execute(&handle, "lang", &["set", "fr"]);
    assert_eq!(
        alex.plain_messages(),
        vec![
            "Error: Please specify one of (en, de).".to_string(),
            "Usage: lang set <locale>".to_string(),
        ]
    );
}

#[test]
fn test_malformed_config_is_an_error() {
    let file = ConfigFile::new("[help\nper_page = ");
    assert!(file.load().is_err());
    assert!(Config::load(Some(file.path())).is_err());
}
