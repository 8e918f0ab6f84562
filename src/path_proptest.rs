//! Property-based tests for path manipulation functions.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::path::{clean_relative_path, segments};
    use proptest::prelude::*;

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just("".to_string()),
                Just(".".to_string()),
                Just("..".to_string()),
                "[a-z0-9_-]{1,8}",
            ],
            0..8,
        )
        .prop_map(|parts| parts.join("/"))
    }

    proptest! {
        /// Property: normalization is idempotent
        #[test]
        fn clean_relative_path_is_idempotent(input in path_strategy()) {
            let once = clean_relative_path(&input);
            let twice = clean_relative_path(&once);
            prop_assert_eq!(once, twice);
        }

        /// Property: a normalized path is never absolute and never climbs
        #[test]
        fn clean_relative_path_stays_inside_root(input in path_strategy()) {
            let result = clean_relative_path(&input);
            prop_assert!(!result.starts_with('/'));
            for segment in result.split('/') {
                prop_assert_ne!(segment, "..");
                prop_assert_ne!(segment, "");
            }
        }

        /// Property: a leading slash makes no difference
        #[test]
        fn clean_relative_path_ignores_leading_slash(input in path_strategy()) {
            let rooted = format!("/{}", input);
            prop_assert_eq!(clean_relative_path(&rooted), clean_relative_path(&input));
        }

        /// Property: segments of a normalized path rejoin to the same path
        #[test]
        fn segments_rejoin_to_normalized(input in path_strategy()) {
            let normalized = clean_relative_path(&input);
            let joined = segments(&normalized).join("/");
            if normalized == "." {
                prop_assert!(joined.is_empty());
            } else {
                prop_assert_eq!(joined, normalized);
            }
        }
    }
}
