// 📸 Session Snapshot - load once, read forever
//
// A snapshot is the canonical tables plus the quality report of one load.
// It is never mutated; callers share it through `Arc`.
//
// The cache is keyed by a fingerprint of the five table paths. An identical
// fingerprint returns the cached snapshot without touching the filesystem.
// There is no invalidation: the cache lives as long as its owner.

use crate::data_quality::QualityReport;
use crate::error::LoadError;
use crate::models::{Claim, ClaimTransaction, Encounter, Patient};
use crate::pipeline::{
    normalize, CanonicalTables, RawTables, CLAIMS, ENCOUNTERS, PATIENTS, PAYER_TRANSITIONS,
    TRANSACTIONS,
};
use crate::table::RawTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// LOAD PARAMETERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadParams {
    pub patients: PathBuf,
    pub encounters: PathBuf,
    pub payer_transitions: PathBuf,
    pub claims: PathBuf,
    pub transactions: PathBuf,
}

impl LoadParams {
    fn paths(&self) -> [(&'static str, &PathBuf); 5] {
        [
            (PATIENTS, &self.patients),
            (ENCOUNTERS, &self.encounters),
            (PAYER_TRANSITIONS, &self.payer_transitions),
            (CLAIMS, &self.claims),
            (TRANSACTIONS, &self.transactions),
        ]
    }

    /// SHA-256 (hex) over the table paths, in a fixed order
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (table, path) in self.paths() {
            hasher.update(table.as_bytes());
            hasher.update(b"=");
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    /// Read all five tables; the first missing or unreadable one aborts the load
    pub fn read_tables(&self) -> Result<RawTables, LoadError> {
        Ok(RawTables {
            patients: RawTable::from_path(PATIENTS, &self.patients)?,
            encounters: RawTable::from_path(ENCOUNTERS, &self.encounters)?,
            payer_transitions: RawTable::from_path(PAYER_TRANSITIONS, &self.payer_transitions)?,
            claims: RawTable::from_path(CLAIMS, &self.claims)?,
            transactions: RawTable::from_path(TRANSACTIONS, &self.transactions)?,
        })
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub snapshot_id: String,
    pub fingerprint: String,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub fingerprint: String,
    pub loaded_at: DateTime<Utc>,
    tables: CanonicalTables,
    quality: QualityReport,
}

impl Snapshot {
    pub fn load(params: &LoadParams) -> Result<Self, LoadError> {
        let raw = params.read_tables()?;
        Ok(Self::from_raw(params.fingerprint(), raw))
    }

    pub fn from_raw(fingerprint: String, raw: RawTables) -> Self {
        let (tables, quality) = normalize(raw);

        Snapshot {
            snapshot_id: uuid::Uuid::new_v4().to_string(),
            fingerprint,
            loaded_at: Utc::now(),
            tables,
            quality,
        }
    }

    pub fn patients(&self) -> &[Patient] {
        &self.tables.patients
    }

    pub fn encounters(&self) -> &[Encounter] {
        &self.tables.encounters
    }

    pub fn claims(&self) -> &[Claim] {
        &self.tables.claims
    }

    pub fn transactions(&self) -> &[ClaimTransaction] {
        &self.tables.transactions
    }

    pub fn tables(&self) -> &CanonicalTables {
        &self.tables
    }

    pub fn quality(&self) -> &QualityReport {
        &self.quality
    }

    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            snapshot_id: self.snapshot_id.clone(),
            fingerprint: self.fingerprint.clone(),
            loaded_at: self.loaded_at,
        }
    }
}

// ============================================================================
// CACHE
// ============================================================================

#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: HashMap<String, Arc<Snapshot>>,
    loads: usize,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, params: &LoadParams) -> Result<Arc<Snapshot>, LoadError> {
        let fingerprint = params.fingerprint();

        if let Some(snapshot) = self.entries.get(&fingerprint) {
            debug!(fingerprint = %fingerprint, "snapshot cache hit");
            return Ok(Arc::clone(snapshot));
        }

        let snapshot = Arc::new(Snapshot::load(params)?);
        self.loads += 1;

        info!(
            snapshot_id = %snapshot.snapshot_id,
            claims = snapshot.claims().len(),
            "snapshot loaded: {}",
            snapshot.quality().summary()
        );

        self.entries.insert(fingerprint, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Number of loads that actually went to disk
    pub fn load_count(&self) -> usize {
        self.loads
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
