// 📐 Schema Normalizer - many source spellings, one canonical shape
//
// Column resolution is presence-driven and evaluated once per load:
// candidates are tried in order, first present column wins, and a
// sentinel covers the case where none exist. No row-level guessing.

use crate::dates::parse_date;
use crate::models::{
    ClaimTransaction, Encounter, Patient, PayerTransition, UNKNOWN_CATEGORY, UNKNOWN_STATUS,
};
use crate::table::RawTable;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// CANDIDATE COLUMNS
// ============================================================================

pub const PATIENT_ID_COLUMNS: &[&str] = &["Id", "ID", "PATIENT_ID"];
pub const GENDER_COLUMNS: &[&str] = &["GENDER"];
pub const BIRTHDATE_COLUMNS: &[&str] = &["BIRTHDATE"];

pub const ENCOUNTER_ID_COLUMNS: &[&str] = &["Id", "ID"];
pub const ENCOUNTER_PATIENT_COLUMNS: &[&str] = &["PATIENT", "PATIENTID"];
pub const ENCOUNTER_CLASS_COLUMN: &str = "ENCOUNTERCLASS";
pub const LEGACY_CLASS_COLUMN: &str = "CLASS";

pub const TRANSITION_PATIENT_COLUMNS: &[&str] = &["PATIENT", "PATIENTID"];
pub const TRANSITION_PAYER_COLUMNS: &[&str] = &["PAYER", "PAYERID"];
pub const TRANSITION_START_COLUMNS: &[&str] = &["START_DATE", "START"];

pub const CLAIM_ID_COLUMNS: &[&str] = &["Id", "ID", "CLAIMID"];
pub const CLAIM_PATIENT_COLUMNS: &[&str] = &["PATIENTID", "PATIENT"];
/// Canonical status, then the patient-status alias, then the secondary-status alias
pub const STATUS_COLUMNS: &[&str] = &["STATUS", "STATUSP", "STATUS2"];
pub const OUTSTANDING_COLUMNS: &[&str] = &["OUTSTANDINGP", "OUTSTANDING"];
pub const DIRECT_PAYER_COLUMNS: &[&str] = &["PAYERID"];
pub const DENIAL_REASON_COLUMNS: &[&str] = &["DENIAL_REASON"];

pub const TRANSACTION_CLAIM_COLUMNS: &[&str] = &["CLAIMID", "ID"];
pub const SERVICE_DATE_COLUMNS: &[&str] = &["FROMDATE", "SERVICE_DATE", "DATE"];
pub const AMOUNT_COLUMNS: &[&str] = &["AMOUNT"];

// ============================================================================
// COLUMN RESOLUTION
// ============================================================================

/// A candidate column that was found in the headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub index: usize,
    pub name: String,
    /// Position in the candidate list (0 = canonical name)
    pub rank: usize,
}

impl ResolvedColumn {
    pub fn is_fallback(&self) -> bool {
        self.rank > 0
    }
}

/// First candidate present in `headers`, or None
pub fn resolve_column(headers: &[String], candidates: &[&str]) -> Option<ResolvedColumn> {
    candidates.iter().enumerate().find_map(|(rank, candidate)| {
        headers
            .iter()
            .position(|h| h == candidate)
            .map(|index| ResolvedColumn {
                index,
                name: candidate.to_string(),
                rank,
            })
    })
}

/// What happened while mapping a source table onto the canonical schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaNote {
    /// Field was read from an alias instead of its canonical column
    Fallback {
        table: String,
        field: String,
        column: String,
    },
    /// Legacy column renamed to its canonical name
    Renamed {
        table: String,
        from: String,
        to: String,
    },
    /// No candidate column; every row received the sentinel
    Defaulted {
        table: String,
        field: String,
        sentinel: String,
    },
}

impl SchemaNote {
    pub fn table(&self) -> &str {
        match self {
            SchemaNote::Fallback { table, .. } => table,
            SchemaNote::Renamed { table, .. } => table,
            SchemaNote::Defaulted { table, .. } => table,
        }
    }
}

/// Resolve `field` and record a note for fallbacks / absences
fn resolve_noted(
    raw: &RawTable,
    field: &str,
    candidates: &[&str],
    sentinel: Option<&str>,
    notes: &mut Vec<SchemaNote>,
) -> Option<ResolvedColumn> {
    let resolved = resolve_column(raw.headers(), candidates);

    match &resolved {
        Some(col) if col.is_fallback() => {
            notes.push(SchemaNote::Fallback {
                table: raw.name.clone(),
                field: field.to_string(),
                column: col.name.clone(),
            });
        }
        Some(_) => {}
        None => {
            if let Some(sentinel) = sentinel {
                warn!(
                    table = %raw.name,
                    field,
                    candidates = ?candidates,
                    "no source column found, defaulting to {:?}",
                    sentinel
                );
                notes.push(SchemaNote::Defaulted {
                    table: raw.name.clone(),
                    field: field.to_string(),
                    sentinel: sentinel.to_string(),
                });
            }
        }
    }

    resolved
}

fn text(raw: &RawTable, row: usize, column: &Option<ResolvedColumn>) -> Option<String> {
    column
        .as_ref()
        .and_then(|c| raw.cell(row, c.index))
        .map(|v| v.to_string())
}

fn number(raw: &RawTable, row: usize, column: &Option<ResolvedColumn>) -> Option<f64> {
    column
        .as_ref()
        .and_then(|c| raw.cell(row, c.index))
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| !v.is_nan())
}

/// Amounts feed sums, so infinities are treated as unparsed
fn amount(raw: &RawTable, row: usize, column: &Option<ResolvedColumn>) -> Option<f64> {
    number(raw, row, column).filter(|v| v.is_finite())
}

// ============================================================================
// ENCOUNTER CLASS
// ============================================================================

/// Rename legacy `CLASS` to `ENCOUNTERCLASS` when the canonical column is absent
///
/// Returns the note describing what was done. `Defaulted` means neither column
/// exists and the table cannot be grouped by class.
pub fn normalize_encounter_class_column(raw: &mut RawTable) -> Option<SchemaNote> {
    if raw.has_column(ENCOUNTER_CLASS_COLUMN) {
        return None;
    }

    if raw.rename_column(LEGACY_CLASS_COLUMN, ENCOUNTER_CLASS_COLUMN) {
        return Some(SchemaNote::Renamed {
            table: raw.name.clone(),
            from: LEGACY_CLASS_COLUMN.to_string(),
            to: ENCOUNTER_CLASS_COLUMN.to_string(),
        });
    }

    warn!(table = %raw.name, "neither ENCOUNTERCLASS nor CLASS present");
    Some(SchemaNote::Defaulted {
        table: raw.name.clone(),
        field: "encounter_class".to_string(),
        sentinel: UNKNOWN_CATEGORY.to_string(),
    })
}

// ============================================================================
// CLAIM STATUS
// ============================================================================

/// Where claim status comes from for this load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSource {
    Column(ResolvedColumn),
    Sentinel,
}

/// Decide the status source from column presence alone
pub fn resolve_status_source(headers: &[String]) -> StatusSource {
    match resolve_column(headers, STATUS_COLUMNS) {
        Some(col) => StatusSource::Column(col),
        None => StatusSource::Sentinel,
    }
}

// ============================================================================
// NORMALIZED TABLES
// ============================================================================

/// Claim with canonical status, before payer attribution and denial derivation
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedClaim {
    pub id: String,
    pub patient_id: Option<String>,
    pub status: String,
    pub outstanding_balance: Option<f64>,
    pub direct_payer: Option<String>,
    pub denial_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedClaims {
    pub rows: Vec<NormalizedClaim>,
    /// False when no outstanding-balance column exists
    pub has_outstanding_column: bool,
    pub null_status_rows: usize,
    pub notes: Vec<SchemaNote>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedTransitions {
    pub rows: Vec<PayerTransition>,
    /// Start-date column actually used, None when absent
    pub date_column: Option<String>,
    pub notes: Vec<SchemaNote>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedTransactions {
    pub rows: Vec<ClaimTransaction>,
    pub has_date_column: bool,
    pub notes: Vec<SchemaNote>,
}

pub fn normalize_patients(raw: &RawTable) -> (Vec<Patient>, Vec<SchemaNote>) {
    let mut notes = Vec::new();
    let id = resolve_noted(raw, "id", PATIENT_ID_COLUMNS, Some(""), &mut notes);
    let gender = resolve_noted(raw, "gender", GENDER_COLUMNS, Some(UNKNOWN_CATEGORY), &mut notes);
    let birth = resolve_noted(
        raw,
        "birth_date",
        BIRTHDATE_COLUMNS,
        Some(UNKNOWN_CATEGORY),
        &mut notes,
    );

    let patients = (0..raw.len())
        .map(|row| Patient {
            id: text(raw, row, &id).unwrap_or_default(),
            gender: text(raw, row, &gender).unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            birth_date: text(raw, row, &birth).unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
        })
        .collect();

    (patients, notes)
}

/// Normalize encounters, renaming the legacy class column first
pub fn normalize_encounters(mut raw: RawTable) -> (Vec<Encounter>, Vec<SchemaNote>) {
    let mut notes = Vec::new();
    if let Some(note) = normalize_encounter_class_column(&mut raw) {
        notes.push(note);
    }

    let id = resolve_noted(&raw, "id", ENCOUNTER_ID_COLUMNS, Some(""), &mut notes);
    let patient = resolve_noted(&raw, "patient_id", ENCOUNTER_PATIENT_COLUMNS, None, &mut notes);
    let class = resolve_column(raw.headers(), &[ENCOUNTER_CLASS_COLUMN]);

    let encounters = (0..raw.len())
        .map(|row| Encounter {
            id: text(&raw, row, &id).unwrap_or_default(),
            patient_id: text(&raw, row, &patient),
            encounter_class: text(&raw, row, &class)
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
        })
        .collect();

    (encounters, notes)
}

pub fn normalize_payer_transitions(raw: &RawTable) -> NormalizedTransitions {
    let mut notes = Vec::new();
    let patient = resolve_noted(raw, "patient_id", TRANSITION_PATIENT_COLUMNS, None, &mut notes);
    let payer = resolve_noted(raw, "payer_id", TRANSITION_PAYER_COLUMNS, None, &mut notes);
    let start = resolve_noted(raw, "start_date", TRANSITION_START_COLUMNS, None, &mut notes);

    let rows = (0..raw.len())
        .map(|row| PayerTransition {
            patient_id: text(raw, row, &patient),
            payer_id: text(raw, row, &payer),
            start_date: text(raw, row, &start).and_then(|d| parse_date(&d)),
        })
        .collect();

    NormalizedTransitions {
        rows,
        date_column: start.map(|c| c.name),
        notes,
    }
}

/// Normalize claims: canonical status via the fallback chain, raw balance kept as-is
pub fn normalize_claims(raw: &RawTable) -> NormalizedClaims {
    let mut notes = Vec::new();
    let id = resolve_noted(raw, "id", CLAIM_ID_COLUMNS, Some(""), &mut notes);
    let patient = resolve_noted(raw, "patient_id", CLAIM_PATIENT_COLUMNS, None, &mut notes);
    let outstanding =
        resolve_noted(raw, "outstanding_balance", OUTSTANDING_COLUMNS, None, &mut notes);
    let direct_payer = resolve_column(raw.headers(), DIRECT_PAYER_COLUMNS);
    let denial_reason = resolve_column(raw.headers(), DENIAL_REASON_COLUMNS);

    let status_source = resolve_status_source(raw.headers());
    let status_column = match &status_source {
        StatusSource::Column(col) => {
            if col.is_fallback() {
                notes.push(SchemaNote::Fallback {
                    table: raw.name.clone(),
                    field: "status".to_string(),
                    column: col.name.clone(),
                });
            }
            Some(col.clone())
        }
        StatusSource::Sentinel => {
            warn!(table = %raw.name, "no status column, every claim is {}", UNKNOWN_STATUS);
            notes.push(SchemaNote::Defaulted {
                table: raw.name.clone(),
                field: "status".to_string(),
                sentinel: UNKNOWN_STATUS.to_string(),
            });
            None
        }
    };

    let mut null_status_rows = 0;
    let rows = (0..raw.len())
        .map(|row| {
            let status = match text(raw, row, &status_column) {
                Some(status) => status,
                None => {
                    if status_column.is_some() {
                        null_status_rows += 1;
                    }
                    UNKNOWN_STATUS.to_string()
                }
            };

            NormalizedClaim {
                id: text(raw, row, &id).unwrap_or_default(),
                patient_id: text(raw, row, &patient),
                status,
                outstanding_balance: number(raw, row, &outstanding),
                direct_payer: text(raw, row, &direct_payer),
                denial_reason: text(raw, row, &denial_reason),
            }
        })
        .collect();

    NormalizedClaims {
        rows,
        has_outstanding_column: outstanding.is_some(),
        null_status_rows,
        notes,
    }
}

pub fn normalize_transactions(raw: &RawTable) -> NormalizedTransactions {
    let mut notes = Vec::new();
    let claim = resolve_noted(raw, "claim_id", TRANSACTION_CLAIM_COLUMNS, None, &mut notes);
    let date = resolve_noted(raw, "service_date", SERVICE_DATE_COLUMNS, None, &mut notes);
    let amount_column = resolve_noted(raw, "amount", AMOUNT_COLUMNS, None, &mut notes);

    let rows = (0..raw.len())
        .map(|row| ClaimTransaction {
            claim_id: text(raw, row, &claim),
            service_date: text(raw, row, &date).and_then(|d| parse_date(&d)),
            amount: amount(raw, row, &amount_column),
        })
        .collect();

    NormalizedTransactions {
        rows,
        has_date_column: date.is_some(),
        notes,
    }
}

// ============================================================================
// TESTS
// ============================================================================
