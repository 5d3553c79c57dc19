// End-to-end: CSV files on disk → snapshot → aggregation and estimation

use claim_insight::{
    claims_by_payer, compute_denial_rate, dataset_counts, default_exposure_window,
    financial_exposure, Config, DenialRateEstimator, EstimateRequest, LoadError, Prediction,
    Severity, SnapshotCache, UNKNOWN_PAYER, UNKNOWN_STATUS,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

/// A Synthea-shaped export with the usual inconsistencies
fn synthea_export(dir: &Path) {
    write(
        dir,
        "patients.csv",
        "Id,BIRTHDATE,GENDER\nP1,1950-01-01,F\nP2,1990-05-05,M\nP3,2001-09-09,F\n",
    );
    write(
        dir,
        "encounters.csv",
        "Id,PATIENT,CLASS\nE1,P1,inpatient\nE2,P2,ambulatory\nE3,P3,wellness\n",
    );
    write(
        dir,
        "payer_transitions.csv",
        "PATIENT,PAYER,START_DATE\n\
         P1,X,2020-01-01\n\
         P1,Y,2021-06-01\n\
         P2,Z,not-a-date\n\
         P2,W,2019-03-03\n",
    );
    write(
        dir,
        "claims.csv",
        "Id,PATIENTID,STATUSP,OUTSTANDINGP\n\
         C1,P1,CLOSED,50\n\
         C2,P1,CLOSED,0\n\
         C3,P2,BILLED,12.5\n\
         C4,P3,,0\n\
         C5,,BILLED,0\n",
    );
    write(
        dir,
        "claims_transactions.csv",
        "CLAIMID,FROMDATE,AMOUNT\n\
         C1,2023-01-01,100\n\
         C1,2023-01-01,50\n\
         C2,invalid,9999\n\
         C3,2023-02-01,25\n",
    );
}

fn config_for(dir: &Path) -> Config {
    let mut config = Config::default();
    config.apply_overrides(|key| {
        (key == "CLAIM_INSIGHT_DATA_DIR").then(|| dir.to_string_lossy().into_owned())
    });
    config
}

#[test]
fn test_full_load_resolves_every_claim() {
    let dir = TempDir::new().unwrap();
    synthea_export(dir.path());

    let snapshot = SnapshotCache::new()
        .get_or_load(&config_for(dir.path()).load_params())
        .unwrap();
    let claims = snapshot.claims();

    assert_eq!(claims.len(), 5);
    assert_eq!(claims[0].payer, "Y");
    assert_eq!(claims[1].payer, "Y");
    // Dated row beats the unparseable one
    assert_eq!(claims[2].payer, "W");
    assert_eq!(claims[3].payer, UNKNOWN_PAYER);
    assert_eq!(claims[4].payer, UNKNOWN_PAYER);
    assert_eq!(claims[3].status, UNKNOWN_STATUS);

    let denied: Vec<bool> = claims.iter().map(|c| c.denied).collect();
    assert_eq!(denied, vec![true, false, true, false, false]);
}

#[test]
fn test_counts_and_histograms() {
    let dir = TempDir::new().unwrap();
    synthea_export(dir.path());

    let snapshot = SnapshotCache::new()
        .get_or_load(&config_for(dir.path()).load_params())
        .unwrap();

    let counts = dataset_counts(snapshot.patients(), snapshot.encounters(), snapshot.claims());
    assert_eq!(counts.patients, 3);
    assert_eq!(counts.encounters, 3);
    assert_eq!(counts.claims, 5);
    assert_eq!(counts.payers, 2);

    let payers = claims_by_payer(snapshot.claims());
    assert_eq!(payers.iter().map(|p| p.count).sum::<usize>(), 5);
}

#[test]
fn test_exposure_over_default_window() {
    let dir = TempDir::new().unwrap();
    synthea_export(dir.path());

    let snapshot = SnapshotCache::new()
        .get_or_load(&config_for(dir.path()).load_params())
        .unwrap();

    let window = default_exposure_window(snapshot.transactions()).unwrap();
    let report = financial_exposure(snapshot.transactions(), window);

    assert_eq!(report.daily.len(), 2);
    assert_eq!(report.daily[0].amount, 150.0);
    assert_eq!(report.total, 175.0);
    assert_eq!(report.excluded_rows, 1);
}

#[test]
fn test_estimates_against_loaded_claims() {
    let dir = TempDir::new().unwrap();
    synthea_export(dir.path());

    let config = config_for(dir.path());
    let snapshot = SnapshotCache::new().get_or_load(&config.load_params()).unwrap();
    let estimator = DenialRateEstimator::with_settings(config.estimator.clone());

    assert_eq!(compute_denial_rate(snapshot.claims(), "Y"), 50.0);

    let request = EstimateRequest {
        payer: "Z".to_string(),
        encounter_class: "wellness".to_string(),
        cost: 100.0,
        age: 30,
    };
    let estimate = estimator.estimate(snapshot.claims(), &request);
    assert_eq!(estimate.prediction, Prediction::NotDenied);
    assert_eq!(estimate.rate, 0.0);
    assert_eq!(estimate.threshold, 5.0);
}

#[test]
fn test_quality_report_covers_recoveries() {
    let dir = TempDir::new().unwrap();
    synthea_export(dir.path());

    let snapshot = SnapshotCache::new()
        .get_or_load(&config_for(dir.path()).load_params())
        .unwrap();
    let report = snapshot.quality();

    assert!(!report.has_critical_issues());
    assert!(report.issues_for("claims").any(|i| i.field == "status"));
    assert!(report.issues_for("payer_transitions").any(|i| i.severity == Severity::Info));
    assert!(report
        .issues_for("transactions")
        .any(|i| i.field == "service_date" && i.affected_rows == 1));
}

#[test]
fn test_missing_encounter_class_is_critical_not_fatal() {
    let dir = TempDir::new().unwrap();
    synthea_export(dir.path());
    write(dir.path(), "encounters.csv", "Id,PATIENT\nE1,P1\n");

    let snapshot = SnapshotCache::new()
        .get_or_load(&config_for(dir.path()).load_params())
        .unwrap();

    assert!(snapshot.quality().has_critical_issues());
    assert_eq!(snapshot.encounters().len(), 1);
}

#[test]
fn test_missing_table_fails_the_load() {
    let dir = TempDir::new().unwrap();
    synthea_export(dir.path());
    fs::remove_file(dir.path().join("claims_transactions.csv")).unwrap();

    let err = SnapshotCache::new()
        .get_or_load(&config_for(dir.path()).load_params())
        .unwrap_err();

    assert!(matches!(err, LoadError::MissingTable { .. }));
    assert!(err.to_string().contains("claims_transactions.csv"));
}

#[test]
fn test_reload_with_same_params_is_identical() {
    let dir = TempDir::new().unwrap();
    synthea_export(dir.path());
    let params = config_for(dir.path()).load_params();

    let first = SnapshotCache::new().get_or_load(&params).unwrap();
    let second = SnapshotCache::new().get_or_load(&params).unwrap();

    assert_eq!(first.tables(), second.tables());
    assert_eq!(first.quality(), second.quality());
    assert_ne!(first.snapshot_id, second.snapshot_id);
}
