use proptest::prelude::*;

use cmdframe::config::Config;
use cmdframe::demo::{RegionStore, build_manager};
use cmdframe::test_utils::RecordingIssuer;
use cmdframe::{CommandManager, CommandRequest, IssuerRef};

fn demo() -> CommandManager {
    build_manager(&Config::default(), RegionStore::new()).expect("demo manager builds")
}

fn editor() -> IssuerRef {
    RecordingIssuer::new("alex").with_permissions(["region.edit", "calc.admin"])
}

proptest! {
    // =========================================================================
    // Dispatch Safety Tests
    // =========================================================================

    #[test]
    fn test_dispatch_never_panics(
        label in prop_oneof![Just("region".to_string()), Just("calc".to_string()), Just("lang".to_string()), "[a-z]{1,6}"],
        args in prop::collection::vec("[ -~]{0,12}", 0..6),
    ) {
        let manager = demo();
        let issuer = editor();
        let handled = manager.execute(&issuer, &label, args.as_slice());
        let known = ["region", "rg", "calc", "lang", "language"].contains(&label.as_str());
        prop_assert_eq!(handled, known);
    }

    #[test]
    fn test_raw_lines_never_panic(line in "[ -~]{0,60}") {
        let manager = demo();
        if let Some(request) = CommandRequest::parse(editor(), &line) {
            let _ = manager.dispatch(request);
        }
    }

    // =========================================================================
    // Completion Safety Tests
    // =========================================================================

    #[test]
    fn test_complete_never_panics(
        label in prop_oneof![Just("region".to_string()), Just("calc".to_string()), "[a-z]{0,6}"],
        preceding in prop::collection::vec("[ -~]{0,10}", 0..5),
        partial in "[ -~]{0,6}",
    ) {
        let manager = demo();
        let _ = manager.complete(&editor(), &label, &partial, preceding.as_slice());
    }

    // =========================================================================
    // Config Safety Tests
    // =========================================================================

    #[test]
    fn test_config_from_toml_never_panics(input in ".*") {
        let _ = Config::from_toml(&input);
    }

    #[test]
    fn test_config_env_overrides_never_panic(
        per_page in "[ -~]{0,6}",
        apis in "[ -~]{0,20}",
    ) {
        let mut config = Config::default();
        let _ = config.apply_env_overrides(|key| match key {
            "CMDFRAME_HELP_PER_PAGE" => Some(per_page.clone()),
            "CMDFRAME_UNSTABLE_APIS" => Some(apis.clone()),
            _ => None,
        });
    }
}
