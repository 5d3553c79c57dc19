// Claim Insight - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod error;          // Load failures (the only fatal path)
pub mod table;          // Raw CSV tables
pub mod dates;          // Date parsing shared by every component
pub mod models;         // Canonical records
pub mod schema;         // Schema Normalizer
pub mod attribution;    // Payer Attribution Resolver
pub mod denial;         // Denial Flag Deriver
pub mod data_quality;   // Recovered conditions, surfaced
pub mod pipeline;       // raw → canonical
pub mod snapshot;       // Session snapshot + cache
pub mod aggregation;    // Aggregation Layer
pub mod estimator;      // Denial-Rate Estimator
pub mod config;

// Re-export commonly used types
pub use error::LoadError;
pub use table::RawTable;
pub use dates::{age_on, parse_date};
pub use models::{
    Claim, ClaimTransaction, Encounter, Patient, PayerTransition,
    UNKNOWN_CATEGORY, UNKNOWN_PAYER, UNKNOWN_STATUS,
};
pub use schema::{resolve_column, SchemaNote};
pub use attribution::{attribute_payers, latest_payer_by_patient, AttributionOutcome};
pub use denial::is_denied;
pub use data_quality::{DataQualityEngine, QualityIssue, QualityReport, Severity};
pub use pipeline::{normalize, CanonicalTables, RawTables};
pub use snapshot::{LoadParams, Snapshot, SnapshotCache, SnapshotInfo};
pub use aggregation::{
    claims_by_denial_reason, claims_by_payer, claims_by_status, claims_view, dataset_counts,
    default_exposure_window, encounters_by_class, financial_exposure, patients_by_gender,
    patients_by_gender_and_birthdate, top_denial_reasons, CategoryCount, ClaimsView,
    DatasetCounts, ExposureReport, ExposureWindow, FilterOptions, PatientGroupCount, Selection,
};
pub use estimator::{
    compute_denial_rate, payer_denial_rate, payer_denial_rates, DenialEstimate,
    DenialRateEstimator, EstimateRequest, EstimatorSettings, PayerDenialRate, Prediction,
};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the tracing subscriber used by the binaries
///
/// `RUST_LOG` wins; otherwise the library logs at info.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("claim_insight=info"));

    // A second call (tests, embedded use) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
