use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel status when no status column resolves (or the cell is null)
pub const UNKNOWN_STATUS: &str = "UNKNOWN";

/// Sentinel payer when no transition history resolves one
pub const UNKNOWN_PAYER: &str = "Unknown";

/// Sentinel for categorical patient/encounter fields with no value
pub const UNKNOWN_CATEGORY: &str = "Unknown";

// ============================================================================
// CANONICAL RECORDS
// Built once by the pipeline, then read-only for the rest of the session
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub gender: String,
    /// Birth date as it appeared in the source (histograms group on this)
    pub birth_date: String,
}

impl Patient {
    pub fn parsed_birth_date(&self) -> Option<NaiveDate> {
        crate::dates::parse_date(&self.birth_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: String,
    pub patient_id: Option<String>,
    pub encounter_class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerTransition {
    pub patient_id: Option<String>,
    pub payer_id: Option<String>,
    /// None when the column is absent or the value did not parse
    pub start_date: Option<NaiveDate>,
}

/// Claim after normalization, attribution and denial derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub patient_id: Option<String>,
    pub status: String,
    pub outstanding_balance: Option<f64>,
    /// Heuristic proxy: outstanding patient balance > 0. Not an adjudication label.
    pub denied: bool,
    pub payer: String,
    pub denial_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimTransaction {
    pub claim_id: Option<String>,
    pub service_date: Option<NaiveDate>,
    pub amount: Option<f64>,
}

impl ClaimTransaction {
    /// Rows that may take part in time-windowed exposure sums
    pub fn is_dated(&self) -> bool {
        self.service_date.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_parsed_birth_date() {
        let patient = Patient {
            id: "P1".to_string(),
            gender: "F".to_string(),
            birth_date: "1958-03-15".to_string(),
        };
        assert_eq!(
            patient.parsed_birth_date(),
            NaiveDate::from_ymd_opt(1958, 3, 15)
        );

        let unknown = Patient {
            birth_date: UNKNOWN_CATEGORY.to_string(),
            ..patient
        };
        assert_eq!(unknown.parsed_birth_date(), None);
    }
}
