// 🚩 Denial Flag - a balance-based proxy, not an adjudication label
//
// denied := outstanding patient balance > 0
// A missing balance column (or an unparseable cell) means not denied.

use crate::schema::NormalizedClaims;

/// Denial proxy for a single balance
pub fn is_denied(outstanding_balance: Option<f64>) -> bool {
    matches!(outstanding_balance, Some(balance) if balance > 0.0)
}

/// One flag per claim, same order as the input
pub fn derive_denied_flags(claims: &NormalizedClaims) -> Vec<bool> {
    if !claims.has_outstanding_column {
        return vec![false; claims.rows.len()];
    }

    claims
        .rows
        .iter()
        .map(|c| is_denied(c.outstanding_balance))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::normalize_claims;
    use crate::table::RawTable;

    #[test]
    fn test_positive_balance_is_denied() {
        assert!(is_denied(Some(50.0)));
        assert!(is_denied(Some(0.01)));
    }

    #[test]
    fn test_zero_negative_and_missing_are_not_denied() {
        assert!(!is_denied(Some(0.0)));
        assert!(!is_denied(Some(-10.0)));
        assert!(!is_denied(None));
    }

    #[test]
    fn test_flags_follow_claim_order() {
        let raw = RawTable::from_reader(
            "claims",
            "Id,PATIENTID,OUTSTANDINGP\nC1,P1,50\nC2,P1,0\nC3,P2,abc\n".as_bytes(),
        )
        .unwrap();

        assert_eq!(derive_denied_flags(&normalize_claims(&raw)), vec![true, false, false]);
    }

    #[test]
    fn test_infinite_balance_is_denied() {
        let raw = RawTable::from_reader(
            "claims",
            "Id,PATIENTID,OUTSTANDINGP\nC1,P1,inf\nC2,P1,-inf\n".as_bytes(),
        )
        .unwrap();

        assert_eq!(derive_denied_flags(&normalize_claims(&raw)), vec![true, false]);
    }

    #[test]
    fn test_missing_column_defaults_to_not_denied() {
        let raw = RawTable::from_reader("claims", "Id,PATIENTID\nC1,P1\nC2,P2\n".as_bytes()).unwrap();
        let claims = normalize_claims(&raw);

        assert!(!claims.has_outstanding_column);
        assert_eq!(derive_denied_flags(&claims), vec![false, false]);
    }
}
