//! Unique-ID resolution by right truncation.
//!
//! Catalog identifiers are not always accepted verbatim as control
//! selectors, and a selector may match several devices. Starting from the
//! catalog match, the candidate is shortened one character at a time until
//! the service reports exactly one matching device. An empty candidate is
//! the terminal failure; the loop never runs past it.

use crate::catalog::Catalog;
use crate::control::{ControlCommand, DeviceControl, Selector, reports_unique_match};
use crate::error::{DevmuteError, MatchFailure, Result};

/// Resolve `query` to an identifier the service maps to exactly one device.
///
/// The seed is the first catalog match for `query`. Any service error aborts
/// the search; the cause is kept in [`MatchFailure::Service`].
pub fn resolve_unique(control: &impl DeviceControl, catalog: &Catalog, query: &str) -> Result<String> {
    let Some(seed) = catalog.find_id_by_query(query) else {
        log::debug!("no catalog entry for '{query}'");
        return Err(no_unique(query, MatchFailure::NotInCatalog));
    };
    narrow_to_unique(control, seed).map_err(|reason| no_unique(query, reason))
}

/// Shorten `seed` from the right until `find <candidate>` is unique.
pub fn narrow_to_unique(
    control: &impl DeviceControl,
    seed: &str,
) -> std::result::Result<String, MatchFailure> {
    let mut candidate = seed.to_string();
    while !candidate.is_empty() {
        log::debug!("checking for unique match: {candidate}");
        let lines = control
            .query(ControlCommand::Find, &Selector::id(candidate.as_str()))
            .map_err(|e| {
                log::debug!("unique-id search for {seed} aborted: {e}");
                MatchFailure::Service(e.to_string())
            })?;
        if reports_unique_match(&lines) {
            return Ok(candidate);
        }
        candidate.pop();
    }
    log::debug!("couldn't find a unique id match for {seed}");
    Err(MatchFailure::Exhausted)
}

fn no_unique(query: &str, reason: MatchFailure) -> DevmuteError {
    DevmuteError::NoUniqueMatch {
        query: query.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::UNIQUE_MATCH_MARKER;
    use crate::control::mock::MockControl;

    /// Unique only when the selector is at most `max_len` characters long.
    fn unique_up_to(max_len: usize) -> MockControl {
        MockControl::with_handler(move |command, selector| match (command, selector) {
            (ControlCommand::Find, Selector::Id(id)) => Some(if id.chars().count() <= max_len {
                vec![format!("{UNIQUE_MATCH_MARKER}.")]
            } else {
                vec!["2 matching device(s) found.".to_string()]
            }),
            _ => None,
        })
    }

    #[test]
    fn narrows_until_unique() {
        let mock = unique_up_to(3);
        let catalog = Catalog::from_lines(&["ABCDEFG : Camera"]);
        let id = resolve_unique(&mock, &catalog, "ABCDEFG").unwrap();
        assert_eq!(id, "ABC");
        assert_eq!(
            mock.calls_for(ControlCommand::Find),
            ["ABCDEFG", "ABCDEF", "ABCDE", "ABCD", "ABC"]
                .iter()
                .map(|s| Selector::id(*s))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn exact_id_resolves_without_truncation() {
        let mock = MockControl::new();
        mock.set_unique("cam01");
        let catalog = Catalog::from_lines(&["cam01 : USB Webcam"]);
        assert_eq!(resolve_unique(&mock, &catalog, "webcam").unwrap(), "cam01");
        assert_eq!(mock.calls.borrow().len(), 1);
    }

    #[test]
    fn exhausted_candidate_stops_at_empty() {
        let mock = unique_up_to(0);
        let catalog = Catalog::from_lines(&["ABCDEFG : Camera"]);
        let err = resolve_unique(&mock, &catalog, "camera").unwrap_err();
        assert!(matches!(
            err,
            DevmuteError::NoUniqueMatch {
                reason: MatchFailure::Exhausted,
                ..
            }
        ));
        // One query per non-empty prefix, never the empty string.
        assert_eq!(mock.calls.borrow().len(), 7);
        assert!(!mock.calls_for(ControlCommand::Find).contains(&Selector::id("")));
    }

    #[test]
    fn unknown_query_never_calls_service() {
        let mock = MockControl::new();
        let catalog = Catalog::from_lines(&["cam01 : USB Webcam"]);
        let err = resolve_unique(&mock, &catalog, "printer").unwrap_err();
        assert!(matches!(
            err,
            DevmuteError::NoUniqueMatch {
                reason: MatchFailure::NotInCatalog,
                ..
            }
        ));
        assert!(mock.calls.borrow().is_empty());
    }

    #[test]
    fn service_error_aborts_immediately() {
        let mock = MockControl::new();
        mock.fail_command.set(Some(ControlCommand::Find));
        let catalog = Catalog::from_lines(&["cam01 : USB Webcam"]);
        let err = resolve_unique(&mock, &catalog, "cam01").unwrap_err();
        assert!(matches!(
            err,
            DevmuteError::NoUniqueMatch {
                reason: MatchFailure::Service(_),
                ..
            }
        ));
        assert_eq!(mock.calls.borrow().len(), 1);
    }

    #[test]
    fn resolution_is_idempotent() {
        let mock = unique_up_to(4);
        let catalog = Catalog::from_lines(&["USB\\VID_1 : Cam"]);
        let first = resolve_unique(&mock, &catalog, "cam").unwrap();
        let second = resolve_unique(&mock, &catalog, "cam").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "USB\\");
    }

    #[test]
    fn truncation_is_per_character() {
        let mock = unique_up_to(2);
        assert_eq!(narrow_to_unique(&mock, "kämera").unwrap(), "kä");
    }
}
