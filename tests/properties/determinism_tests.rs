use proptest::prelude::*;

use cmdframe::completions::filter_prefix;
use cmdframe::conditions::ConditionSpec;
use cmdframe::config::Config;
use cmdframe::demo::{RegionStore, build_manager};
use cmdframe::help::HelpPage;
use cmdframe::replacements::CommandReplacements;
use cmdframe::test_utils::RecordingIssuer;
use cmdframe::{CommandRequest, IssuerRef};

proptest! {
    // =========================================================================
    // Completion Filtering
    // =========================================================================

    #[test]
    fn test_filter_prefix_keeps_order_and_prefix(
        candidates in prop::collection::vec("[a-zA-Z]{0,8}", 0..20),
        input in "[a-zA-Z]{0,3}",
    ) {
        let kept = filter_prefix(candidates.clone(), &input);
        let needle = input.to_lowercase();
        let expected: Vec<String> = candidates
            .into_iter()
            .filter(|c| c.to_lowercase().starts_with(&needle))
            .collect();
        prop_assert_eq!(kept, expected);
    }

    // =========================================================================
    // Help Pagination
    // =========================================================================

    #[test]
    fn test_help_pages_partition_results(total in 0usize..200, per_page in 0usize..30) {
        let first = HelpPage::compute(total, per_page, 1);
        prop_assert!(first.total_pages >= 1);

        let mut covered = 0;
        for page in 1..=first.total_pages {
            let info = HelpPage::compute(total, per_page, page);
            let range = info.range();
            prop_assert!(range.end <= total);
            prop_assert!(range.len() <= info.per_page);
            prop_assert_eq!(range.start, covered);
            covered += range.len();
        }
        prop_assert_eq!(covered, total);
        prop_assert!(HelpPage::compute(total, per_page, first.total_pages + 1).range().is_empty());
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_request_parse_splits_words(words in prop::collection::vec("[a-z0-9]{1,6}", 1..6)) {
        let issuer: IssuerRef = RecordingIssuer::new("alex");
        let line = format!("/{}", words.join("  "));
        let request = CommandRequest::parse(issuer, &line).expect("non-empty line parses");
        prop_assert_eq!(&request.label, &words[0]);
        prop_assert_eq!(&request.args[..], &words[1..]);
    }

    #[test]
    fn test_condition_lists_lowercase_ids(ids in prop::collection::vec("[a-zA-Z]{1,6}", 1..5)) {
        let raw = ids.join("|");
        let specs = ConditionSpec::parse_list(&raw);
        prop_assert_eq!(specs.len(), ids.len());
        for (spec, id) in specs.iter().zip(&ids) {
            prop_assert_eq!(&spec.id, &id.to_lowercase());
            prop_assert!(spec.config.is_none());
        }
    }

    #[test]
    fn test_unknown_replacements_leave_text_alone(text in "[ -~]{0,40}") {
        let replacements = CommandReplacements::new();
        prop_assert_eq!(replacements.replace(&text), text);
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    #[test]
    fn test_integer_addition_matches_arithmetic(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
        let manager = build_manager(&Config::default(), RegionStore::new()).expect("demo manager builds");
        let recording = RecordingIssuer::new("alex");
        let issuer: IssuerRef = recording.clone();
        let (a_raw, b_raw) = (a.to_string(), b.to_string());
        manager.execute(&issuer, "calc", &["add", a_raw.as_str(), b_raw.as_str()]);
        manager.execute(&issuer, "calc", &["add", a_raw.as_str(), b_raw.as_str()]);
        let expected = format!("= {}", a + b);
        prop_assert_eq!(recording.plain_messages(), vec![expected.clone(), expected]);
    }
}
