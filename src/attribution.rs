// 🧾 Payer Attribution - one payer per claim from coverage history
//
// Latest transition per patient wins. Ordering rule:
//   1. ascending start date, unparseable dates first (Option: None < Some)
//   2. equal dates keep input order (stable sort), so the later row wins
// Without a start-date column the sort is skipped and the last row seen
// per patient wins.

use crate::models::{PayerTransition, UNKNOWN_PAYER};
use crate::schema::NormalizedClaim;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributionOutcome {
    /// One payer per input claim, same order as the input
    pub payers: Vec<String>,
    /// Claims that kept their own PAYERID
    pub direct: usize,
    /// Claims resolved through transition history
    pub from_history: usize,
    /// Claims that fell back to the Unknown payer
    pub unresolved: usize,
    /// Claims with no patient reference at all (subset of unresolved)
    pub null_patient_refs: usize,
}

/// Latest transition's payer per patient
///
/// Transitions without a patient are skipped. A latest transition with an
/// empty payer maps to `None` and never falls back to an older row. `dated`
/// is false when the source had no start-date column at all.
pub fn latest_payer_by_patient(
    transitions: &[PayerTransition],
    dated: bool,
) -> HashMap<String, Option<String>> {
    let mut ordered: Vec<&PayerTransition> = transitions
        .iter()
        .filter(|t| t.patient_id.is_some())
        .collect();

    if dated {
        ordered.sort_by_key(|t| t.start_date);
    }

    let mut latest = HashMap::new();
    for t in ordered {
        if let Some(patient) = &t.patient_id {
            latest.insert(patient.clone(), t.payer_id.clone());
        }
    }

    latest
}

/// Left-join the latest payer onto claims by patient id
///
/// Every claim gets exactly one payer: its direct PAYERID if present, else
/// the patient's latest transition, else `Unknown`.
pub fn attribute_payers(
    claims: &[NormalizedClaim],
    latest: &HashMap<String, Option<String>>,
) -> AttributionOutcome {
    let mut outcome = AttributionOutcome {
        payers: Vec::with_capacity(claims.len()),
        ..Default::default()
    };

    for claim in claims {
        if let Some(direct) = &claim.direct_payer {
            outcome.direct += 1;
            outcome.payers.push(direct.clone());
            continue;
        }

        let resolved = claim
            .patient_id
            .as_ref()
            .and_then(|patient| latest.get(patient))
            .and_then(Option::as_ref);

        match resolved {
            Some(payer) => {
                outcome.from_history += 1;
                outcome.payers.push(payer.clone());
            }
            None => {
                outcome.unresolved += 1;
                if claim.patient_id.is_none() {
                    outcome.null_patient_refs += 1;
                }
                outcome.payers.push(UNKNOWN_PAYER.to_string());
            }
        }
    }

    if outcome.unresolved > 0 {
        warn!(
            unresolved = outcome.unresolved,
            null_patient_refs = outcome.null_patient_refs,
            "claims attributed to the {} payer",
            UNKNOWN_PAYER
        );
    }
    info!(
        claims = claims.len(),
        direct = outcome.direct,
        from_history = outcome.from_history,
        "payer attribution complete"
    );

    outcome
}

/// Convenience: resolve history and attribute in one call
pub fn resolve_payers(
    transitions: &[PayerTransition],
    dated: bool,
    claims: &[NormalizedClaim],
) -> AttributionOutcome {
    let latest = latest_payer_by_patient(transitions, dated);
    attribute_payers(claims, &latest)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_date;

    fn transition(patient: Option<&str>, payer: &str, date: &str) -> PayerTransition {
        PayerTransition {
            patient_id: patient.map(|p| p.to_string()),
            payer_id: Some(payer.to_string()),
            start_date: parse_date(date),
        }
    }

    fn payer_of<'a>(
        latest: &'a HashMap<String, Option<String>>,
        patient: &str,
    ) -> Option<&'a str> {
        latest.get(patient).and_then(|p| p.as_deref())
    }

    fn claim(id: &str, patient: Option<&str>) -> NormalizedClaim {
        NormalizedClaim {
            id: id.to_string(),
            patient_id: patient.map(|p| p.to_string()),
            status: "BILLED".to_string(),
            outstanding_balance: Some(0.0),
            direct_payer: None,
            denial_reason: None,
        }
    }

    #[test]
    fn test_latest_transition_wins() {
        let transitions = vec![
            transition(Some("P1"), "Y", "2021-06-01"),
            transition(Some("P1"), "X", "2020-01-01"),
        ];

        let latest = latest_payer_by_patient(&transitions, true);
        assert_eq!(payer_of(&latest, "P1"), Some("Y"));
    }

    #[test]
    fn test_unparseable_dates_lose_to_valid_dates() {
        let transitions = vec![
            transition(Some("P1"), "DATED", "2019-01-01"),
            transition(Some("P1"), "UNDATED", "not a date"),
        ];

        let latest = latest_payer_by_patient(&transitions, true);
        assert_eq!(payer_of(&latest, "P1"), Some("DATED"));
    }

    #[test]
    fn test_equal_dates_keep_last_in_input_order() {
        let transitions = vec![
            transition(Some("P1"), "FIRST", "2020-01-01"),
            transition(Some("P1"), "SECOND", "2020-01-01"),
        ];

        let latest = latest_payer_by_patient(&transitions, true);
        assert_eq!(payer_of(&latest, "P1"), Some("SECOND"));
    }

    #[test]
    fn test_undated_history_takes_last_seen() {
        let transitions = vec![
            transition(Some("P1"), "A", "2022-01-01"),
            transition(Some("P1"), "B", "2010-01-01"),
        ];

        let latest = latest_payer_by_patient(&transitions, false);
        assert_eq!(payer_of(&latest, "P1"), Some("B"));
    }

    #[test]
    fn test_transitions_without_patient_are_skipped() {
        let transitions = vec![transition(None, "X", "2020-01-01")];
        assert!(latest_payer_by_patient(&transitions, true).is_empty());
    }

    #[test]
    fn test_null_payer_on_latest_transition_is_unknown() {
        let mut blank = transition(Some("P1"), "", "2022-01-01");
        blank.payer_id = None;
        let transitions = vec![transition(Some("P1"), "OLD", "2015-01-01"), blank];

        let latest = latest_payer_by_patient(&transitions, true);
        assert_eq!(latest.get("P1"), Some(&None));

        let outcome = attribute_payers(&[claim("C1", Some("P1"))], &latest);
        assert_eq!(outcome.payers, vec![UNKNOWN_PAYER]);
        assert_eq!(outcome.unresolved, 1);
        assert_eq!(outcome.from_history, 0);
        assert_eq!(outcome.null_patient_refs, 0);
    }

    #[test]
    fn test_join_keeps_every_claim_once() {
        let transitions = vec![
            transition(Some("P1"), "X", "2020-01-01"),
            transition(Some("P1"), "Y", "2021-06-01"),
            transition(Some("P2"), "Z", "2021-06-01"),
        ];
        let claims = vec![
            claim("C1", Some("P1")),
            claim("C2", Some("P1")),
            claim("C3", Some("P3")),
            claim("C4", None),
        ];

        let outcome = resolve_payers(&transitions, true, &claims);

        assert_eq!(outcome.payers.len(), claims.len());
        assert_eq!(outcome.payers, vec!["Y", "Y", UNKNOWN_PAYER, UNKNOWN_PAYER]);
        assert_eq!(outcome.from_history, 2);
        assert_eq!(outcome.unresolved, 2);
        assert_eq!(outcome.null_patient_refs, 1);
    }

    #[test]
    fn test_direct_payer_is_kept() {
        let transitions = vec![transition(Some("P1"), "Y", "2021-06-01")];
        let mut c = claim("C1", Some("P1"));
        c.direct_payer = Some("DIRECT".to_string());

        let outcome = resolve_payers(&transitions, true, &[c]);
        assert_eq!(outcome.payers, vec!["DIRECT"]);
        assert_eq!(outcome.direct, 1);
    }
}
