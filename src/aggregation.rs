// 📊 Aggregation Layer - read-only summaries over the canonical tables
//
// Every query borrows the tables and returns fresh values; nothing here
// mutates a snapshot, so the same tables serve any number of filters.
//
// Histogram order: count descending, ties by key ascending.

use crate::dates::years_before;
use crate::models::{Claim, ClaimTransaction, Encounter, Patient, UNKNOWN_PAYER};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Literal accepted by every selector to mean "no restriction"
pub const ALL: &str = "All";

// ============================================================================
// SELECTION (equality filter on one categorical field)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    /// `"All"` (or nothing) lifts the restriction
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some(ALL) => Selection::All,
            Some(v) => Selection::Only(v.to_string()),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => wanted == value,
        }
    }
}

impl From<&str> for Selection {
    fn from(value: &str) -> Self {
        Selection::parse(Some(value))
    }
}

impl From<String> for Selection {
    fn from(value: String) -> Self {
        Selection::parse(Some(&value))
    }
}

impl From<Selection> for String {
    fn from(selection: Selection) -> Self {
        selection.to_string()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => write!(f, "{}", ALL),
            Selection::Only(v) => write!(f, "{}", v),
        }
    }
}

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub patients: usize,
    pub encounters: usize,
    pub claims: usize,
    /// Distinct payers, not counting the Unknown sentinel
    pub payers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientGroupCount {
    pub gender: String,
    pub birth_date: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimsView {
    pub status: Selection,
    pub payer: Selection,
    pub histogram: Vec<CategoryCount>,
    /// Matching claims in input order, at most `limit` of them
    pub preview: Vec<Claim>,
    /// Matching claims before the preview limit
    pub matched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub genders: Vec<String>,
    pub encounter_classes: Vec<String>,
    pub statuses: Vec<String>,
    pub payers: Vec<String>,
    pub denial_reasons: Vec<String>,
}

// ============================================================================
// COUNTS & HISTOGRAMS
// ============================================================================

pub fn dataset_counts(
    patients: &[Patient],
    encounters: &[Encounter],
    claims: &[Claim],
) -> DatasetCounts {
    let payers: BTreeSet<&str> = claims
        .iter()
        .map(|c| c.payer.as_str())
        .filter(|p| *p != UNKNOWN_PAYER)
        .collect();

    DatasetCounts {
        patients: patients.len(),
        encounters: encounters.len(),
        claims: claims.len(),
        payers: payers.len(),
    }
}

fn histogram<'a, I>(values: I) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut result: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect();

    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    result
}

/// Patients grouped by (gender, birth date), optionally restricted to one gender
pub fn patients_by_gender_and_birthdate(
    patients: &[Patient],
    gender: &Selection,
) -> Vec<PatientGroupCount> {
    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    for patient in patients.iter().filter(|p| gender.matches(&p.gender)) {
        *counts
            .entry((patient.gender.as_str(), patient.birth_date.as_str()))
            .or_insert(0) += 1;
    }

    let mut result: Vec<PatientGroupCount> = counts
        .into_iter()
        .map(|((gender, birth_date), count)| PatientGroupCount {
            gender: gender.to_string(),
            birth_date: birth_date.to_string(),
            count,
        })
        .collect();

    result.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.gender.cmp(&b.gender))
            .then_with(|| a.birth_date.cmp(&b.birth_date))
    });
    result
}

pub fn patients_by_gender(patients: &[Patient]) -> Vec<CategoryCount> {
    histogram(patients.iter().map(|p| p.gender.as_str()))
}

pub fn encounters_by_class(encounters: &[Encounter], class: &Selection) -> Vec<CategoryCount> {
    histogram(
        encounters
            .iter()
            .filter(|e| class.matches(&e.encounter_class))
            .map(|e| e.encounter_class.as_str()),
    )
}

/// Claims matching both selections, in input order
pub fn filter_claims<'a>(
    claims: &'a [Claim],
    status: &'a Selection,
    payer: &'a Selection,
) -> impl Iterator<Item = &'a Claim> + 'a {
    claims
        .iter()
        .filter(move |c| status.matches(&c.status) && payer.matches(&c.payer))
}

pub fn claims_by_status(
    claims: &[Claim],
    status: &Selection,
    payer: &Selection,
) -> Vec<CategoryCount> {
    histogram(filter_claims(claims, status, payer).map(|c| c.status.as_str()))
}

pub fn claims_view(
    claims: &[Claim],
    status: Selection,
    payer: Selection,
    limit: usize,
) -> ClaimsView {
    let histogram = claims_by_status(claims, &status, &payer);
    let matched = filter_claims(claims, &status, &payer).count();
    let preview = filter_claims(claims, &status, &payer)
        .take(limit)
        .cloned()
        .collect();

    ClaimsView {
        status,
        payer,
        histogram,
        preview,
        matched,
    }
}

/// Claims per canonical payer, Unknown included
pub fn claims_by_payer(claims: &[Claim]) -> Vec<CategoryCount> {
    histogram(claims.iter().map(|c| c.payer.as_str()))
}

/// Claims per denial reason; claims without a reason are left out
pub fn claims_by_denial_reason(claims: &[Claim]) -> Vec<CategoryCount> {
    histogram(claims.iter().filter_map(|c| c.denial_reason.as_deref()))
}

pub fn top_denial_reasons(claims: &[Claim], n: usize) -> Vec<CategoryCount> {
    let mut reasons = claims_by_denial_reason(claims);
    reasons.truncate(n);
    reasons
}

// ============================================================================
// FILTER OPTIONS
// ============================================================================

fn distinct<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl FilterOptions {
    pub fn collect(patients: &[Patient], encounters: &[Encounter], claims: &[Claim]) -> Self {
        FilterOptions {
            genders: distinct(patients.iter().map(|p| p.gender.as_str())),
            encounter_classes: distinct(encounters.iter().map(|e| e.encounter_class.as_str())),
            statuses: distinct(claims.iter().map(|c| c.status.as_str())),
            payers: distinct(claims.iter().map(|c| c.payer.as_str())),
            denial_reasons: distinct(claims.iter().filter_map(|c| c.denial_reason.as_deref())),
        }
    }

    /// Options for a selector that allows "no restriction"
    pub fn with_all(values: &[String]) -> Vec<String> {
        std::iter::once(ALL.to_string())
            .chain(values.iter().cloned())
            .collect()
    }
}

// ============================================================================
// FINANCIAL EXPOSURE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ExposureWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        ExposureWindow { start, end }
    }

    /// Inclusive at both ends
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyExposure {
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureReport {
    pub window: ExposureWindow,
    /// Ascending by date
    pub daily: Vec<DailyExposure>,
    pub total: f64,
    /// Rows without a parseable service date, never counted in any sum
    pub excluded_rows: usize,
}

/// Later of (earliest date, latest date - 10 years) through the latest date.
/// None when no transaction has a parseable service date.
pub fn default_exposure_window(transactions: &[ClaimTransaction]) -> Option<ExposureWindow> {
    let mut dates = transactions.iter().filter_map(|t| t.service_date);
    let first = dates.next()?;
    let (earliest, latest) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));

    let start = earliest.max(years_before(latest, 10));
    Some(ExposureWindow::new(start, latest))
}

pub fn financial_exposure(
    transactions: &[ClaimTransaction],
    window: ExposureWindow,
) -> ExposureReport {
    let excluded_rows = transactions.iter().filter(|t| !t.is_dated()).count();

    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    if !window.is_empty() {
        for t in transactions {
            let Some(date) = t.service_date else { continue };
            if !window.contains(date) {
                continue;
            }
            *by_date.entry(date).or_insert(0.0) += t.amount.unwrap_or(0.0);
        }
    }

    let daily: Vec<DailyExposure> = by_date
        .into_iter()
        .map(|(date, amount)| DailyExposure { date, amount })
        .collect();
    let total = daily.iter().map(|d| d.amount).sum();

    ExposureReport {
        window,
        daily,
        total,
        excluded_rows,
    }
}

// ============================================================================
// TESTS
// ============================================================================
