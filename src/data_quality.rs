// ✅ Data Quality - every recovered condition is reported, none is fatal
//
// The pipeline never stops on a schema mismatch, a bad date or a missing
// join key. It resolves them to sentinels and hands the evidence here, so
// the dashboard can show what was papered over and how many rows it touched.

use crate::attribution::AttributionOutcome;
use crate::schema::SchemaNote;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical, // A view cannot be computed meaningfully
    Warning,  // Rows were excluded or defaulted
    Info,     // Data was reconciled, results are still complete
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub table: String,
    pub field: String,
    pub issue: String,
    pub recommendation: String,
    /// Rows affected; for column-level issues this is the table size
    pub affected_rows: usize,
}

impl QualityIssue {
    fn new(
        severity: Severity,
        table: &str,
        field: &str,
        issue: String,
        recommendation: &str,
        affected_rows: usize,
    ) -> Self {
        QualityIssue {
            severity,
            table: table.to_string(),
            field: field.to_string(),
            issue,
            recommendation: recommendation.to_string(),
            affected_rows,
        }
    }
}

// ============================================================================
// LOAD STATISTICS (collected by the pipeline)
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    pub table_rows: BTreeMap<String, usize>,
    /// Rows per table with undecodable bytes, only tables that had any
    pub lossy_rows: BTreeMap<String, usize>,
    pub schema_notes: Vec<SchemaNote>,
    pub has_outstanding_column: bool,
    pub null_status_rows: usize,
    pub transition_date_column: Option<String>,
    pub undated_transitions: usize,
    pub attribution: AttributionOutcome,
    pub has_service_date_column: bool,
    pub undated_transactions: usize,
    pub unparsed_amounts: usize,
}

impl LoadStats {
    fn rows(&self, table: &str) -> usize {
        self.table_rows.get(table).copied().unwrap_or(0)
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub table_rows: BTreeMap<String, usize>,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn summary(&self) -> String {
        format!(
            "{} tables, {} rows | {} issues ({} critical, {} warnings)",
            self.table_rows.len(),
            self.table_rows.values().sum::<usize>(),
            self.issues.len(),
            self.count(Severity::Critical),
            self.count(Severity::Warning),
        )
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.count(Severity::Critical) > 0
    }

    pub fn issues_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a QualityIssue> + 'a {
        self.issues.iter().filter(move |i| i.table == table)
    }
}

// ============================================================================
// DATA QUALITY ENGINE
// ============================================================================

pub struct DataQualityEngine;

impl DataQualityEngine {
    pub fn new() -> Self {
        DataQualityEngine
    }

    /// Turn pipeline evidence into a report, most severe issues first
    pub fn review(&self, stats: &LoadStats) -> QualityReport {
        let mut issues: Vec<QualityIssue> = stats
            .schema_notes
            .iter()
            .map(|note| self.review_note(note, stats))
            .collect();

        issues.extend(self.check_encoding(stats));
        issues.extend(self.check_outstanding_column(stats));
        issues.extend(self.check_null_status(stats));
        issues.extend(self.check_transition_dates(stats));
        issues.extend(self.check_attribution(stats));
        issues.extend(self.check_transaction_dates(stats));
        issues.extend(self.check_amounts(stats));

        issues.sort_by(|a, b| a.severity.cmp(&b.severity));

        QualityReport {
            table_rows: stats.table_rows.clone(),
            issues,
        }
    }

    // ========================================================================
    // RULES
    // ========================================================================

    fn review_note(&self, note: &SchemaNote, stats: &LoadStats) -> QualityIssue {
        let rows = stats.rows(note.table());

        match note {
            SchemaNote::Fallback { table, field, column } => QualityIssue::new(
                Severity::Info,
                table,
                field,
                format!("{} read from alias column {}", field, column),
                "No action needed; alias resolved to canonical field",
                rows,
            ),
            SchemaNote::Renamed { table, from, to } => QualityIssue::new(
                Severity::Info,
                table,
                to,
                format!("Legacy column {} renamed to {}", from, to),
                "No action needed; legacy schema recognised",
                rows,
            ),
            SchemaNote::Defaulted { table, field, sentinel } => {
                let severity = if field == "encounter_class" {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                QualityIssue::new(
                    severity,
                    table,
                    field,
                    format!("No column for {}; every row set to {:?}", field, sentinel),
                    "Check the source export includes this column",
                    rows,
                )
            }
        }
    }

    fn check_encoding(&self, stats: &LoadStats) -> Vec<QualityIssue> {
        stats
            .lossy_rows
            .iter()
            .filter(|(_, rows)| **rows > 0)
            .map(|(table, rows)| {
                QualityIssue::new(
                    Severity::Warning,
                    table,
                    "encoding",
                    format!("{} rows contain invalid UTF-8; bytes were replaced", rows),
                    "Re-export the file as UTF-8",
                    *rows,
                )
            })
            .collect()
    }

    fn check_outstanding_column(&self, stats: &LoadStats) -> Option<QualityIssue> {
        if stats.has_outstanding_column {
            return None;
        }
        Some(QualityIssue::new(
            Severity::Warning,
            "claims",
            "outstanding_balance",
            "No outstanding patient balance column; no claim can be flagged denied".to_string(),
            "Provide OUTSTANDINGP so the denial proxy can be derived",
            stats.rows("claims"),
        ))
    }

    fn check_null_status(&self, stats: &LoadStats) -> Option<QualityIssue> {
        if stats.null_status_rows == 0 {
            return None;
        }
        Some(QualityIssue::new(
            Severity::Info,
            "claims",
            "status",
            format!("{} claims had an empty status", stats.null_status_rows),
            "Empty statuses are reported as UNKNOWN",
            stats.null_status_rows,
        ))
    }

    fn check_transition_dates(&self, stats: &LoadStats) -> Option<QualityIssue> {
        match &stats.transition_date_column {
            None => Some(QualityIssue::new(
                Severity::Warning,
                "payer_transitions",
                "start_date",
                "No start-date column; latest payer is the last row seen per patient".to_string(),
                "Provide START_DATE so coverage history can be ordered",
                stats.rows("payer_transitions"),
            )),
            Some(column) if stats.undated_transitions > 0 => Some(QualityIssue::new(
                Severity::Info,
                "payer_transitions",
                "start_date",
                format!(
                    "{} transitions have an unparseable {}; they rank as earliest",
                    stats.undated_transitions, column
                ),
                "Fix date format to YYYY-MM-DD",
                stats.undated_transitions,
            )),
            Some(_) => None,
        }
    }

    fn check_attribution(&self, stats: &LoadStats) -> Vec<QualityIssue> {
        let mut issues = Vec::new();
        let outcome = &stats.attribution;

        if outcome.null_patient_refs > 0 {
            issues.push(QualityIssue::new(
                Severity::Info,
                "claims",
                "patient_id",
                format!("{} claims have no patient reference", outcome.null_patient_refs),
                "These claims are kept and attributed to the Unknown payer",
                outcome.null_patient_refs,
            ));
        }

        if outcome.unresolved > 0 {
            issues.push(QualityIssue::new(
                Severity::Info,
                "claims",
                "payer",
                format!("{} claims attributed to the Unknown payer", outcome.unresolved),
                "Check payer transition coverage for these patients",
                outcome.unresolved,
            ));
        }

        issues
    }

    fn check_transaction_dates(&self, stats: &LoadStats) -> Option<QualityIssue> {
        if !stats.has_service_date_column {
            return Some(QualityIssue::new(
                Severity::Warning,
                "transactions",
                "service_date",
                "No service-date column; exposure cannot be computed".to_string(),
                "Provide FROMDATE for time-windowed exposure",
                stats.rows("transactions"),
            ));
        }

        if stats.undated_transactions == 0 {
            return None;
        }

        Some(QualityIssue::new(
            Severity::Warning,
            "transactions",
            "service_date",
            format!(
                "{} transactions have an unparseable service date and are excluded from exposure",
                stats.undated_transactions
            ),
            "Fix date format to YYYY-MM-DD",
            stats.undated_transactions,
        ))
    }

    fn check_amounts(&self, stats: &LoadStats) -> Option<QualityIssue> {
        if stats.unparsed_amounts == 0 {
            return None;
        }
        Some(QualityIssue::new(
            Severity::Warning,
            "transactions",
            "amount",
            format!("{} transactions have a non-numeric amount", stats.unparsed_amounts),
            "These rows contribute nothing to exposure sums",
            stats.unparsed_amounts,
        ))
    }
}

impl Default for DataQualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_stats() -> LoadStats {
        let mut table_rows = BTreeMap::new();
        table_rows.insert("claims".to_string(), 10);
        table_rows.insert("payer_transitions".to_string(), 4);
        table_rows.insert("transactions".to_string(), 20);

        LoadStats {
            table_rows,
            has_outstanding_column: true,
            transition_date_column: Some("START_DATE".to_string()),
            has_service_date_column: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_load_has_no_issues() {
        let report = DataQualityEngine::new().review(&clean_stats());

        assert!(report.issues.is_empty());
        assert!(!report.has_critical_issues());
        assert!(report.summary().contains("34 rows"));
    }

    #[test]
    fn test_missing_encounter_class_is_critical() {
        let mut stats = clean_stats();
        stats.schema_notes.push(SchemaNote::Defaulted {
            table: "encounters".to_string(),
            field: "encounter_class".to_string(),
            sentinel: "Unknown".to_string(),
        });

        let report = DataQualityEngine::new().review(&stats);

        assert!(report.has_critical_issues());
        assert_eq!(report.issues[0].severity, Severity::Critical);
        assert_eq!(report.issues_for("encounters").count(), 1);
    }

    #[test]
    fn test_excluded_transactions_are_counted() {
        let mut stats = clean_stats();
        stats.undated_transactions = 3;

        let report = DataQualityEngine::new().review(&stats);
        let issue = report.issues_for("transactions").next().unwrap();

        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.affected_rows, 3);
    }

    #[test]
    fn test_invalid_utf8_rows_are_a_warning() {
        let mut stats = clean_stats();
        stats.lossy_rows.insert("transactions".to_string(), 2);

        let report = DataQualityEngine::new().review(&stats);
        let issue = report.issues_for("transactions").next().unwrap();

        assert_eq!(issue.field, "encoding");
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.affected_rows, 2);
        assert!(!report.has_critical_issues());
    }

    #[test]
    fn test_missing_transition_dates_reported() {
        let mut stats = clean_stats();
        stats.transition_date_column = None;

        let report = DataQualityEngine::new().review(&stats);
        let issue = report.issues_for("payer_transitions").next().unwrap();

        assert_eq!(issue.field, "start_date");
        assert_eq!(issue.affected_rows, 4);
    }

    #[test]
    fn test_issues_sorted_by_severity() {
        let mut stats = clean_stats();
        stats.has_outstanding_column = false;
        stats.attribution.unresolved = 2;
        stats.schema_notes.push(SchemaNote::Defaulted {
            table: "encounters".to_string(),
            field: "encounter_class".to_string(),
            sentinel: "Unknown".to_string(),
        });

        let report = DataQualityEngine::new().review(&stats);
        let severities: Vec<Severity> = report.issues.iter().map(|i| i.severity).collect();

        let mut sorted = severities.clone();
        sorted.sort();
        assert_eq!(severities, sorted);
        assert_eq!(report.count(Severity::Critical), 1);
        assert_eq!(report.count(Severity::Warning), 1);
        assert_eq!(report.count(Severity::Info), 1);
    }
}
