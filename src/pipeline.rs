// 🔄 Normalization Pipeline
//
// raw tables → schema normalizer → (payer attribution ∥ denial flags) → canonical claims
//
// A pure function of its inputs: the same raw tables always produce the
// same canonical tables.

use crate::attribution::resolve_payers;
use crate::data_quality::{DataQualityEngine, LoadStats, QualityReport};
use crate::denial::derive_denied_flags;
use crate::models::{Claim, ClaimTransaction, Encounter, Patient};
use crate::schema::{
    normalize_claims, normalize_encounters, normalize_patients, normalize_payer_transitions,
    normalize_transactions,
};
use crate::table::RawTable;
use std::collections::BTreeMap;
use tracing::info;

pub const PATIENTS: &str = "patients";
pub const ENCOUNTERS: &str = "encounters";
pub const PAYER_TRANSITIONS: &str = "payer_transitions";
pub const CLAIMS: &str = "claims";
pub const TRANSACTIONS: &str = "transactions";

/// The five source tables, as read
#[derive(Debug, Clone)]
pub struct RawTables {
    pub patients: RawTable,
    pub encounters: RawTable,
    pub payer_transitions: RawTable,
    pub claims: RawTable,
    pub transactions: RawTable,
}

/// Canonical tables handed to aggregation and estimation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalTables {
    pub patients: Vec<Patient>,
    pub encounters: Vec<Encounter>,
    pub claims: Vec<Claim>,
    pub transactions: Vec<ClaimTransaction>,
}

pub fn normalize(raw: RawTables) -> (CanonicalTables, QualityReport) {
    let mut stats = LoadStats {
        table_rows: row_counts(&raw),
        lossy_rows: lossy_row_counts(&raw),
        ..Default::default()
    };

    let (patients, notes) = normalize_patients(&raw.patients);
    stats.schema_notes.extend(notes);

    let (encounters, notes) = normalize_encounters(raw.encounters);
    stats.schema_notes.extend(notes);

    let transitions = normalize_payer_transitions(&raw.payer_transitions);
    stats.schema_notes.extend(transitions.notes.iter().cloned());
    stats.transition_date_column = transitions.date_column.clone();
    stats.undated_transitions = if transitions.date_column.is_some() {
        transitions.rows.iter().filter(|t| t.start_date.is_none()).count()
    } else {
        0
    };

    let normalized = normalize_claims(&raw.claims);
    stats.schema_notes.extend(normalized.notes.iter().cloned());
    stats.has_outstanding_column = normalized.has_outstanding_column;
    stats.null_status_rows = normalized.null_status_rows;

    // Independent derivations over the same normalized rows
    let attribution = resolve_payers(
        &transitions.rows,
        transitions.date_column.is_some(),
        &normalized.rows,
    );
    let denied = derive_denied_flags(&normalized);

    let claims: Vec<Claim> = normalized
        .rows
        .into_iter()
        .zip(attribution.payers.iter())
        .zip(denied)
        .map(|((c, payer), denied)| Claim {
            id: c.id,
            patient_id: c.patient_id,
            status: c.status,
            outstanding_balance: c.outstanding_balance,
            denied,
            payer: payer.clone(),
            denial_reason: c.denial_reason,
        })
        .collect();
    stats.attribution = attribution;

    let transactions = normalize_transactions(&raw.transactions);
    stats.schema_notes.extend(transactions.notes.iter().cloned());
    stats.has_service_date_column = transactions.has_date_column;
    stats.undated_transactions = if transactions.has_date_column {
        transactions.rows.iter().filter(|t| !t.is_dated()).count()
    } else {
        0
    };
    stats.unparsed_amounts = transactions.rows.iter().filter(|t| t.amount.is_none()).count();

    let report = DataQualityEngine::new().review(&stats);

    info!(
        patients = patients.len(),
        encounters = encounters.len(),
        claims = claims.len(),
        transactions = transactions.rows.len(),
        issues = report.issues.len(),
        "normalization complete"
    );

    let tables = CanonicalTables {
        patients,
        encounters,
        claims,
        transactions: transactions.rows,
    };

    (tables, report)
}

/// Row counts per source table, keyed by table name
pub fn row_counts(raw: &RawTables) -> BTreeMap<String, usize> {
    [
        &raw.patients,
        &raw.encounters,
        &raw.payer_transitions,
        &raw.claims,
        &raw.transactions,
    ]
    .iter()
    .map(|t| (t.name.clone(), t.len()))
    .collect()
}

/// Tables that had undecodable cells, with their affected row counts
pub fn lossy_row_counts(raw: &RawTables) -> BTreeMap<String, usize> {
    [
        &raw.patients,
        &raw.encounters,
        &raw.payer_transitions,
        &raw.claims,
        &raw.transactions,
    ]
    .iter()
    .filter(|t| t.lossy_rows() > 0)
    .map(|t| (t.name.clone(), t.lossy_rows()))
    .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UNKNOWN_PAYER, UNKNOWN_STATUS};

    fn raw(name: &str, csv: &str) -> RawTable {
        RawTable::from_reader(name, csv.as_bytes()).unwrap()
    }

    fn fixture() -> RawTables {
        RawTables {
            patients: raw(PATIENTS, "Id,GENDER,BIRTHDATE\nP1,F,1950-01-01\nP2,M,1990-05-05\n"),
            encounters: raw(ENCOUNTERS, "Id,PATIENT,CLASS\nE1,P1,inpatient\nE2,P2,wellness\n"),
            payer_transitions: raw(
                PAYER_TRANSITIONS,
                "PATIENT,PAYER,START_DATE\nP1,X,2020-01-01\nP1,Y,2021-06-01\n",
            ),
            claims: raw(
                CLAIMS,
                "Id,PATIENTID,STATUSP,OUTSTANDINGP\nC1,P1,CLOSED,50\nC2,P1,CLOSED,0\nC3,P2,BILLED,10\nC4,,,5\n",
            ),
            transactions: raw(
                TRANSACTIONS,
                "CLAIMID,FROMDATE,AMOUNT\nC1,2023-01-01,100\nC1,2023-01-01,50\nC2,invalid,9999\n",
            ),
        }
    }

    #[test]
    fn test_worked_example() {
        let (tables, _) = normalize(fixture());
        let c1 = &tables.claims[0];
        let c2 = &tables.claims[1];

        assert_eq!(c1.payer, "Y");
        assert_eq!(c2.payer, "Y");
        assert!(c1.denied);
        assert!(!c2.denied);
    }

    #[test]
    fn test_every_claim_has_status_and_payer() {
        let (tables, _) = normalize(fixture());

        assert_eq!(tables.claims.len(), 4);
        for claim in &tables.claims {
            assert!(!claim.status.is_empty());
            assert!(!claim.payer.is_empty());
        }
        assert_eq!(tables.claims[2].payer, UNKNOWN_PAYER);
        assert_eq!(tables.claims[3].payer, UNKNOWN_PAYER);
        assert_eq!(tables.claims[3].status, UNKNOWN_STATUS);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let (first, first_report) = normalize(fixture());
        let (second, second_report) = normalize(fixture());

        assert_eq!(first, second);
        assert_eq!(first_report, second_report);
    }

    #[test]
    fn test_quality_report_reflects_recoveries() {
        let (_, report) = normalize(fixture());

        // legacy CLASS rename, STATUSP fallback, empty status, unknown payers, bad date
        assert!(report.issues_for(ENCOUNTERS).any(|i| i.field == "ENCOUNTERCLASS"));
        assert!(report.issues_for(CLAIMS).any(|i| i.field == "status"));
        assert!(report.issues_for(CLAIMS).any(|i| i.field == "payer"));
        assert!(report
            .issues_for(TRANSACTIONS)
            .any(|i| i.field == "service_date" && i.affected_rows == 1));
        assert!(!report.has_critical_issues());
    }

    #[test]
    fn test_invalid_utf8_is_reported_not_fatal() {
        let mut raw_tables = fixture();
        let mut bytes = b"CLAIMID,FROMDATE,AMOUNT\nC1,2023-01-01,100\nC2,2023-01-02,".to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(b"\nC3,2023-01-03,25\n");
        raw_tables.transactions = RawTable::from_reader(TRANSACTIONS, bytes.as_slice()).unwrap();

        let (tables, report) = normalize(raw_tables);

        assert_eq!(tables.transactions.len(), 3);
        assert_eq!(tables.transactions[1].amount, None);
        assert!(report
            .issues_for(TRANSACTIONS)
            .any(|i| i.field == "encoding" && i.affected_rows == 1));
    }

    #[test]
    fn test_row_counts() {
        let counts = row_counts(&fixture());
        assert_eq!(counts.get(CLAIMS), Some(&4));
        assert_eq!(counts.get(TRANSACTIONS), Some(&3));
    }
}
