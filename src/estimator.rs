// ⚖️ Denial-Rate Estimator - an auditable rate-vs-threshold heuristic
//
//   rate      = % of the payer's claims flagged denied (0.0 when it has none)
//   threshold = baseline - high-cost adjustment (cost > boundary)
//                        - elderly adjustment   (age  > boundary)
//   DENIED   iff rate > threshold (a tie is NOT_DENIED)
//
// Encounter class is accepted and echoed back but takes no part in the
// decision (known limitation of the heuristic).

use crate::models::Claim;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    /// Threshold before adjustments, in percent
    pub baseline_threshold: f64,

    /// Cost strictly above this lowers the threshold
    pub high_cost_boundary: f64,
    pub high_cost_adjustment: f64,

    /// Age strictly above this lowers the threshold
    pub elderly_age_boundary: u32,
    pub elderly_adjustment: f64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        EstimatorSettings {
            baseline_threshold: 5.0,
            high_cost_boundary: 2000.0,
            high_cost_adjustment: 1.0,
            elderly_age_boundary: 65,
            elderly_adjustment: 1.0,
        }
    }
}

// ============================================================================
// REQUEST / RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prediction {
    #[serde(rename = "DENIED")]
    Denied,
    #[serde(rename = "NOT_DENIED")]
    NotDenied,
}

impl Prediction {
    pub fn label(&self) -> &'static str {
        match self {
            Prediction::Denied => "DENIED",
            Prediction::NotDenied => "NOT DENIED",
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Prediction::Denied)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub payer: String,
    pub encounter_class: String,
    pub cost: f64,
    pub age: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdAdjustment {
    HighCost { cost: f64, boundary: f64, amount: f64 },
    Elderly { age: u32, boundary: u32, amount: f64 },
}

impl ThresholdAdjustment {
    pub fn amount(&self) -> f64 {
        match self {
            ThresholdAdjustment::HighCost { amount, .. } => *amount,
            ThresholdAdjustment::Elderly { amount, .. } => *amount,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ThresholdAdjustment::HighCost { cost, boundary, amount } => {
                format!("cost {:.2} > {:.2}: -{:.1}", cost, boundary, amount)
            }
            ThresholdAdjustment::Elderly { age, boundary, amount } => {
                format!("age {} > {}: -{:.1}", age, boundary, amount)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenialEstimate {
    pub payer: String,
    /// Echoed from the request; not used by the heuristic
    pub encounter_class: String,
    pub cost: f64,
    pub age: u32,
    pub prediction: Prediction,
    /// Historical denial rate for the payer, in percent
    pub rate: f64,
    /// Threshold the rate was compared against, in percent
    pub threshold: f64,
    pub adjustments: Vec<ThresholdAdjustment>,
    /// Claims on record for the payer
    pub claims_considered: usize,
}

impl DenialEstimate {
    pub fn summary(&self) -> String {
        format!(
            "Prediction: {} | Denial Rate: {:.1}% | Threshold: {:.1}% ({} claims for {})",
            self.prediction.label(),
            self.rate,
            self.threshold,
            self.claims_considered,
            self.payer
        )
    }
}

/// Denial rate for one payer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerDenialRate {
    pub payer: String,
    pub claims: usize,
    pub denied: usize,
    pub rate: f64,
}

// ============================================================================
// RATE COMPUTATION
// ============================================================================

fn percentage(denied: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * denied as f64 / total as f64
}

fn tally(claims: &[Claim], payer: &str) -> (usize, usize) {
    claims
        .iter()
        .filter(|c| c.payer == payer)
        .fold((0usize, 0usize), |(total, denied), c| {
            (total + 1, denied + usize::from(c.denied))
        })
}

/// Percentage of `payer`'s claims flagged denied; 0.0 when the payer has no claims
pub fn compute_denial_rate(claims: &[Claim], payer: &str) -> f64 {
    let (total, denied) = tally(claims, payer);
    percentage(denied, total)
}

/// One payer's counts and rate; a payer without claims is all zeros
pub fn payer_denial_rate(claims: &[Claim], payer: &str) -> PayerDenialRate {
    let (total, denied) = tally(claims, payer);
    PayerDenialRate {
        payer: payer.to_string(),
        claims: total,
        denied,
        rate: percentage(denied, total),
    }
}

/// Every payer's rate, lowest first (ties by payer id)
pub fn payer_denial_rates(claims: &[Claim]) -> Vec<PayerDenialRate> {
    let mut tally: HashMap<&str, (usize, usize)> = HashMap::new();
    for claim in claims {
        let entry = tally.entry(claim.payer.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += usize::from(claim.denied);
    }

    let mut rates: Vec<PayerDenialRate> = tally
        .into_iter()
        .map(|(payer, (total, denied))| PayerDenialRate {
            payer: payer.to_string(),
            claims: total,
            denied,
            rate: percentage(denied, total),
        })
        .collect();

    rates.sort_by(|a, b| {
        a.rate
            .total_cmp(&b.rate)
            .then_with(|| a.payer.cmp(&b.payer))
    });
    rates
}

// ============================================================================
// ESTIMATOR
// ============================================================================

pub struct DenialRateEstimator {
    pub settings: EstimatorSettings,
}

impl DenialRateEstimator {
    pub fn new() -> Self {
        DenialRateEstimator {
            settings: EstimatorSettings::default(),
        }
    }

    pub fn with_settings(settings: EstimatorSettings) -> Self {
        DenialRateEstimator { settings }
    }

    /// Threshold for a request, plus the adjustments that produced it
    pub fn threshold(&self, cost: f64, age: u32) -> (f64, Vec<ThresholdAdjustment>) {
        let s = &self.settings;
        let mut adjustments = Vec::new();

        if cost > s.high_cost_boundary {
            adjustments.push(ThresholdAdjustment::HighCost {
                cost,
                boundary: s.high_cost_boundary,
                amount: s.high_cost_adjustment,
            });
        }

        if age > s.elderly_age_boundary {
            adjustments.push(ThresholdAdjustment::Elderly {
                age,
                boundary: s.elderly_age_boundary,
                amount: s.elderly_adjustment,
            });
        }

        let threshold = s.baseline_threshold - adjustments.iter().map(|a| a.amount()).sum::<f64>();
        (threshold, adjustments)
    }

    pub fn estimate(&self, claims: &[Claim], request: &EstimateRequest) -> DenialEstimate {
        let claims_considered = claims.iter().filter(|c| c.payer == request.payer).count();
        let rate = compute_denial_rate(claims, &request.payer);
        let (threshold, adjustments) = self.threshold(request.cost, request.age);

        let prediction = if rate > threshold {
            Prediction::Denied
        } else {
            Prediction::NotDenied
        };

        debug!(
            payer = %request.payer,
            rate,
            threshold,
            prediction = prediction.label(),
            "denial estimate"
        );

        DenialEstimate {
            payer: request.payer.clone(),
            encounter_class: request.encounter_class.clone(),
            cost: request.cost,
            age: request.age,
            prediction,
            rate,
            threshold,
            adjustments,
            claims_considered,
        }
    }
}

impl Default for DenialRateEstimator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
