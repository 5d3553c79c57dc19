// Claim Insight - Web Server
// JSON REST API over the same snapshot the terminal dashboard reads

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use claim_insight::{
    claims_by_denial_reason, claims_by_payer, claims_view, dataset_counts,
    default_exposure_window, encounters_by_class, financial_exposure, init_tracing,
    parse_date, patients_by_gender, patients_by_gender_and_birthdate, payer_denial_rate,
    payer_denial_rates, top_denial_reasons, CategoryCount, ClaimsView, Config, DatasetCounts,
    DenialEstimate, DenialRateEstimator, EstimateRequest, ExposureReport, ExposureWindow,
    FilterOptions, LoadParams, PatientGroupCount, PayerDenialRate, QualityReport, Selection,
    Snapshot, SnapshotCache, SnapshotInfo,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
struct AppState {
    cache: Arc<Mutex<SnapshotCache>>,
    params: Arc<LoadParams>,
    config: Arc<Config>,
}

impl AppState {
    fn new(config: Config) -> Self {
        Self {
            cache: Arc::new(Mutex::new(SnapshotCache::new())),
            params: Arc::new(config.load_params()),
            config: Arc::new(config),
        }
    }

    /// Every request after the first successful load is a cache hit
    fn snapshot(&self) -> Result<Arc<Snapshot>, ApiError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| ApiError::internal("snapshot cache lock poisoned"))?;

        cache.get_or_load(&self.params).map_err(|e| {
            error!("Error loading snapshot: {}", e);
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            error: None,
        })
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            success: false,
            data: (),
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Query & response shapes
// ============================================================================

#[derive(Deserialize)]
struct GenderQuery {
    gender: Option<String>,
}

#[derive(Deserialize)]
struct ClassQuery {
    class: Option<String>,
}

#[derive(Deserialize)]
struct ClaimsQuery {
    status: Option<String>,
    payer: Option<String>,
}

#[derive(Deserialize)]
struct ExposureQuery {
    start: Option<String>,
    end: Option<String>,
}

/// Numbers arrive as strings so bad input gets the JSON envelope, not a bare 400
#[derive(Deserialize)]
struct PredictQuery {
    payer: Option<String>,
    encounter_class: Option<String>,
    cost: Option<String>,
    age: Option<String>,
}

#[derive(Serialize)]
struct SummaryResponse {
    snapshot: SnapshotInfo,
    counts: DatasetCounts,
    quality: String,
}

#[derive(Serialize)]
struct PatientsResponse {
    gender: Selection,
    by_gender: Vec<CategoryCount>,
    groups: Vec<PatientGroupCount>,
}

#[derive(Serialize)]
struct EncountersResponse {
    class: Selection,
    histogram: Vec<CategoryCount>,
}

#[derive(Serialize)]
struct PayersResponse {
    histogram: Vec<CategoryCount>,
    denial_rates: Vec<PayerDenialRate>,
}

#[derive(Serialize)]
struct PredictResponse {
    estimate: DenialEstimate,
    top_denial_reasons: Vec<CategoryCount>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// GET /api/summary - KPI counts
async fn get_summary(State(state): State<AppState>) -> ApiResult<SummaryResponse> {
    let snapshot = state.snapshot()?;

    Ok(ApiResponse::ok(SummaryResponse {
        snapshot: snapshot.info(),
        counts: dataset_counts(snapshot.patients(), snapshot.encounters(), snapshot.claims()),
        quality: snapshot.quality().summary(),
    }))
}

/// GET /api/filters - Option lists for every selector
async fn get_filters(State(state): State<AppState>) -> ApiResult<FilterOptions> {
    let snapshot = state.snapshot()?;

    Ok(ApiResponse::ok(FilterOptions::collect(
        snapshot.patients(),
        snapshot.encounters(),
        snapshot.claims(),
    )))
}

/// GET /api/patients/histogram?gender=
async fn get_patients_histogram(
    State(state): State<AppState>,
    Query(query): Query<GenderQuery>,
) -> ApiResult<PatientsResponse> {
    let snapshot = state.snapshot()?;
    let gender = Selection::parse(query.gender.as_deref());

    Ok(ApiResponse::ok(PatientsResponse {
        by_gender: patients_by_gender(snapshot.patients()),
        groups: patients_by_gender_and_birthdate(snapshot.patients(), &gender),
        gender,
    }))
}

/// GET /api/encounters/histogram?class=
async fn get_encounters_histogram(
    State(state): State<AppState>,
    Query(query): Query<ClassQuery>,
) -> ApiResult<EncountersResponse> {
    let snapshot = state.snapshot()?;
    let class = Selection::parse(query.class.as_deref());

    Ok(ApiResponse::ok(EncountersResponse {
        histogram: encounters_by_class(snapshot.encounters(), &class),
        class,
    }))
}

/// GET /api/claims?status=&payer= - Status histogram + preview
async fn get_claims(
    State(state): State<AppState>,
    Query(query): Query<ClaimsQuery>,
) -> ApiResult<ClaimsView> {
    let snapshot = state.snapshot()?;

    Ok(ApiResponse::ok(claims_view(
        snapshot.claims(),
        Selection::parse(query.status.as_deref()),
        Selection::parse(query.payer.as_deref()),
        state.config.preview_limit,
    )))
}

/// GET /api/claims/denial-reasons
async fn get_denial_reasons(State(state): State<AppState>) -> ApiResult<Vec<CategoryCount>> {
    let snapshot = state.snapshot()?;
    Ok(ApiResponse::ok(claims_by_denial_reason(snapshot.claims())))
}

/// GET /api/payers - Payer histogram + denial rates
async fn get_payers(State(state): State<AppState>) -> ApiResult<PayersResponse> {
    let snapshot = state.snapshot()?;

    Ok(ApiResponse::ok(PayersResponse {
        histogram: claims_by_payer(snapshot.claims()),
        denial_rates: payer_denial_rates(snapshot.claims()),
    }))
}

/// GET /api/payers/:payer - One payer's denial rate
async fn get_payer(
    State(state): State<AppState>,
    Path(payer): Path<String>,
) -> ApiResult<PayerDenialRate> {
    let snapshot = state.snapshot()?;

    Ok(ApiResponse::ok(payer_denial_rate(snapshot.claims(), &payer)))
}

fn parse_query_date(name: &str, value: &str) -> Result<chrono::NaiveDate, ApiError> {
    parse_date(value)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid {} date: {:?}", name, value)))
}

/// GET /api/exposure?start=&end= - Daily exposure + total (default window when omitted)
async fn get_exposure(
    State(state): State<AppState>,
    Query(query): Query<ExposureQuery>,
) -> ApiResult<ExposureReport> {
    let snapshot = state.snapshot()?;

    let window = match (query.start.as_deref(), query.end.as_deref()) {
        (Some(start), Some(end)) => {
            ExposureWindow::new(parse_query_date("start", start)?, parse_query_date("end", end)?)
        }
        (None, None) => default_exposure_window(snapshot.transactions()).ok_or_else(|| {
            ApiError::not_found("No transactions with a parseable service date")
        })?,
        _ => return Err(ApiError::bad_request("Provide both start and end, or neither")),
    };

    Ok(ApiResponse::ok(financial_exposure(snapshot.transactions(), window)))
}

/// GET /api/predict?payer=&encounter_class=&cost=&age=
async fn get_prediction(
    State(state): State<AppState>,
    Query(query): Query<PredictQuery>,
) -> ApiResult<PredictResponse> {
    let payer = query
        .payer
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing payer"))?;

    let cost: f64 = match query.cost.as_deref() {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::bad_request(format!("Invalid cost: {:?}", raw)))?,
        None => return Err(ApiError::bad_request("Missing cost")),
    };

    let age: u32 = match query.age.as_deref() {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::bad_request(format!("Invalid age: {:?}", raw)))?,
        None => return Err(ApiError::bad_request("Missing age")),
    };

    let request = EstimateRequest {
        payer,
        encounter_class: query.encounter_class.unwrap_or_default(),
        cost,
        age,
    };

    let snapshot = state.snapshot()?;
    let estimator = DenialRateEstimator::with_settings(state.config.estimator.clone());

    Ok(ApiResponse::ok(PredictResponse {
        estimate: estimator.estimate(snapshot.claims(), &request),
        top_denial_reasons: top_denial_reasons(snapshot.claims(), 3),
    }))
}

/// GET /api/quality - Data quality report of the load
async fn get_quality(State(state): State<AppState>) -> ApiResult<QualityReport> {
    let snapshot = state.snapshot()?;
    Ok(ApiResponse::ok(snapshot.quality().clone()))
}

// ============================================================================
// Main Server
// ============================================================================

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/summary", get(get_summary))
        .route("/filters", get(get_filters))
        .route("/patients/histogram", get(get_patients_histogram))
        .route("/encounters/histogram", get(get_encounters_histogram))
        .route("/claims", get(get_claims))
        .route("/claims/denial-reasons", get(get_denial_reasons))
        .route("/payers", get(get_payers))
        .route("/payers/:payer", get(get_payer))
        .route("/exposure", get(get_exposure))
        .route("/predict", get(get_prediction))
        .route("/quality", get(get_quality))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    println!("🌐 Claim Insight - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::load()?;
    let addr = config.server_addr.clone();
    let state = AppState::new(config);

    // Warm the cache; a failure here is retried on the first request
    match state.snapshot() {
        Ok(snapshot) => info!(
            snapshot_id = %snapshot.snapshot_id,
            "✓ Snapshot ready: {}",
            snapshot.quality().summary()
        ),
        Err(e) => warn!("Snapshot not loaded yet: {}", e.message),
    }

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/summary", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn fixture_state(dir: &TempDir) -> AppState {
        let root = dir.path();
        fs::write(root.join("patients.csv"), "Id,GENDER,BIRTHDATE\nP1,F,1950-01-01\nP2,M,1990-05-05\n")
            .unwrap();
        fs::write(
            root.join("encounters.csv"),
            "Id,PATIENT,CLASS\nE1,P1,inpatient\nE2,P2,wellness\nE3,P2,wellness\n",
        )
        .unwrap();
        fs::write(
            root.join("payer_transitions.csv"),
            "PATIENT,PAYER,START_DATE\nP1,X,2020-01-01\nP1,Y,2021-06-01\n",
        )
        .unwrap();
        fs::write(
            root.join("claims.csv"),
            "Id,PATIENTID,STATUS,OUTSTANDINGP,DENIAL_REASON\nC1,P1,CLOSED,50,CO-45\nC2,P1,CLOSED,0,\nC3,P2,BILLED,0,\n",
        )
        .unwrap();
        fs::write(
            root.join("claims_transactions.csv"),
            "CLAIMID,FROMDATE,AMOUNT\nC1,2023-01-01,100\nC1,2023-01-01,50\nC2,invalid,9999\n",
        )
        .unwrap();

        let config = Config {
            data_dir: root.to_path_buf(),
            ..Config::default()
        };
        AppState::new(config)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get_json(router(fixture_state(&dir)), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get_json(router(fixture_state(&dir)), "/api/summary").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["counts"]["patients"], 2);
        assert_eq!(body["data"]["counts"]["encounters"], 3);
        assert_eq!(body["data"]["counts"]["claims"], 3);
        assert_eq!(body["data"]["counts"]["payers"], 1);
    }

    #[tokio::test]
    async fn test_requests_share_one_load() {
        let dir = TempDir::new().unwrap();
        let state = fixture_state(&dir);

        get_json(router(state.clone()), "/api/summary").await;
        get_json(router(state.clone()), "/api/payers").await;

        assert_eq!(state.cache.lock().unwrap().load_count(), 1);
    }

    #[tokio::test]
    async fn test_claims_filters() {
        let dir = TempDir::new().unwrap();
        let (_, body) =
            get_json(router(fixture_state(&dir)), "/api/claims?status=CLOSED&payer=All").await;

        assert_eq!(body["data"]["status"], "CLOSED");
        assert_eq!(body["data"]["payer"], "All");
        assert_eq!(body["data"]["matched"], 2);
        assert_eq!(body["data"]["histogram"][0]["count"], 2);
    }

    #[tokio::test]
    async fn test_encounter_class_from_legacy_column() {
        let dir = TempDir::new().unwrap();
        let (_, body) = get_json(router(fixture_state(&dir)), "/api/encounters/histogram").await;

        assert_eq!(body["data"]["histogram"][0]["category"], "wellness");
        assert_eq!(body["data"]["histogram"][0]["count"], 2);
    }

    #[tokio::test]
    async fn test_exposure_default_window() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get_json(router(fixture_state(&dir)), "/api/exposure").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 150.0);
        assert_eq!(body["data"]["excluded_rows"], 1);
    }

    #[tokio::test]
    async fn test_exposure_rejects_half_window() {
        let dir = TempDir::new().unwrap();
        let (status, body) =
            get_json(router(fixture_state(&dir)), "/api/exposure?start=2023-01-01").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_predict() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get_json(
            router(fixture_state(&dir)),
            "/api/predict?payer=Y&encounter_class=inpatient&cost=2001&age=66",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["estimate"]["prediction"], "DENIED");
        assert_eq!(body["data"]["estimate"]["rate"], 50.0);
        assert_eq!(body["data"]["estimate"]["threshold"], 3.0);
        assert_eq!(body["data"]["top_denial_reasons"][0]["category"], "CO-45");
    }

    #[tokio::test]
    async fn test_predict_unknown_payer() {
        let dir = TempDir::new().unwrap();
        let (_, body) =
            get_json(router(fixture_state(&dir)), "/api/predict?payer=Z&cost=100&age=30").await;

        assert_eq!(body["data"]["estimate"]["prediction"], "NOT_DENIED");
        assert_eq!(body["data"]["estimate"]["rate"], 0.0);
        assert_eq!(body["data"]["estimate"]["threshold"], 5.0);
    }

    #[tokio::test]
    async fn test_predict_bad_cost() {
        let dir = TempDir::new().unwrap();
        let (status, body) =
            get_json(router(fixture_state(&dir)), "/api/predict?payer=Y&cost=abc&age=30").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("cost"));
    }

    #[tokio::test]
    async fn test_single_payer() {
        let dir = TempDir::new().unwrap();
        let (status, body) = get_json(router(fixture_state(&dir)), "/api/payers/Y").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["claims"], 2);

        let (status, body) = get_json(router(fixture_state(&dir)), "/api/payers/NOPE").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["claims"], 0);
        assert_eq!(body["data"]["rate"], 0.0);
    }

    #[tokio::test]
    async fn test_missing_table_is_service_unavailable() {
        let dir = TempDir::new().unwrap();
        let state = fixture_state(&dir);
        fs::remove_file(dir.path().join("claims.csv")).unwrap();

        let (status, body) = get_json(router(state), "/api/summary").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("claims"));
    }

    #[tokio::test]
    async fn test_quality_reports_legacy_rename() {
        let dir = TempDir::new().unwrap();
        let (_, body) = get_json(router(fixture_state(&dir)), "/api/quality").await;

        let issues = body["data"]["issues"].as_array().unwrap();
        assert!(issues.iter().any(|i| i["field"] == "ENCOUNTERCLASS"));
    }
}
