// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use claim_insight::{
    dataset_counts, default_exposure_window, financial_exposure, init_tracing, parse_date,
    top_denial_reasons, Config, DenialRateEstimator, EstimateRequest, ExposureWindow, Severity,
    Snapshot, SnapshotCache,
};
use std::env;
use std::sync::Arc;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let config = Config::load()?;

    match args.get(1).map(String::as_str) {
        Some("summary") => run_summary(&config),
        Some("predict") => run_predict(&config, &args[2..]),
        Some("exposure") => run_exposure(&config, &args[2..]),
        Some("quality") => run_quality(&config),
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("Unknown command: {}", other)
        }
        // UI mode (default)
        None => run_ui_mode(&config),
    }
}

fn print_usage() {
    println!("Usage: claim-insight [COMMAND]");
    println!();
    println!("  (no command)                          terminal dashboard");
    println!("  summary                               dataset counts");
    println!("  predict <payer> <class> <cost> <age>  denial estimate");
    println!("  exposure [start end]                  financial exposure (YYYY-MM-DD)");
    println!("  quality                               data quality report");
}

fn load_snapshot(config: &Config) -> Result<Arc<Snapshot>> {
    println!("📂 Loading tables from {:?}...", config.data_dir);

    let snapshot = SnapshotCache::new()
        .get_or_load(&config.load_params())
        .context("Failed to load claims data")?;

    println!("✓ {}\n", snapshot.quality().summary());
    Ok(snapshot)
}

fn run_summary(config: &Config) -> Result<()> {
    println!("📊 Claim Insight - Summary");
    println!("{}", RULE);

    let snapshot = load_snapshot(config)?;
    let counts = dataset_counts(snapshot.patients(), snapshot.encounters(), snapshot.claims());

    println!("  Patients:   {}", counts.patients);
    println!("  Encounters: {}", counts.encounters);
    println!("  Claims:     {}", counts.claims);
    println!("  Payers:     {}", counts.payers);
    println!("  Denied:     {}", snapshot.claims().iter().filter(|c| c.denied).count());

    Ok(())
}

fn run_predict(config: &Config, args: &[String]) -> Result<()> {
    let [payer, class, cost, age] = args else {
        bail!("Usage: claim-insight predict <payer> <class> <cost> <age>");
    };

    let request = EstimateRequest {
        payer: payer.clone(),
        encounter_class: class.clone(),
        cost: cost
            .parse()
            .with_context(|| format!("Invalid cost: {:?}", cost))?,
        age: age.parse().with_context(|| format!("Invalid age: {:?}", age))?,
    };

    println!("⚖️  Claim Insight - Denial Estimate");
    println!("{}", RULE);

    let snapshot = load_snapshot(config)?;
    let estimator = DenialRateEstimator::with_settings(config.estimator.clone());
    let estimate = estimator.estimate(snapshot.claims(), &request);

    let icon = if estimate.prediction.is_denied() { "❌" } else { "✅" };
    println!("{} {}", icon, estimate.summary());
    for adjustment in &estimate.adjustments {
        println!("   threshold adjusted: {}", adjustment.describe());
    }

    if estimate.prediction.is_denied() {
        let reasons = top_denial_reasons(snapshot.claims(), 3);
        if !reasons.is_empty() {
            println!("\n🔍 Most frequent denial reasons:");
            for reason in reasons {
                println!("   {} ({} claims)", reason.category, reason.count);
            }
        }
    }

    Ok(())
}

fn run_exposure(config: &Config, args: &[String]) -> Result<()> {
    println!("💰 Claim Insight - Financial Exposure");
    println!("{}", RULE);

    let snapshot = load_snapshot(config)?;

    let window = match args {
        [] => match default_exposure_window(snapshot.transactions()) {
            Some(window) => window,
            None => {
                println!("⚠️  No transactions with a parseable service date");
                return Ok(());
            }
        },
        [start, end] => {
            let start =
                parse_date(start).with_context(|| format!("Invalid start date: {:?}", start))?;
            let end = parse_date(end).with_context(|| format!("Invalid end date: {:?}", end))?;
            ExposureWindow::new(start, end)
        }
        _ => bail!("Usage: claim-insight exposure [start end]"),
    };

    let report = financial_exposure(snapshot.transactions(), window);

    println!("  Window: {} → {}", report.window.start, report.window.end);
    for day in &report.daily {
        println!("  {}  {:>14.2}", day.date, day.amount);
    }
    println!("{}", RULE);
    println!("  Total:  {:.2}", report.total);
    if report.excluded_rows > 0 {
        println!("  ({} transactions without a service date excluded)", report.excluded_rows);
    }

    Ok(())
}

fn run_quality(config: &Config) -> Result<()> {
    println!("✅ Claim Insight - Data Quality");
    println!("{}", RULE);

    let snapshot = load_snapshot(config)?;
    let report = snapshot.quality();

    for (table, rows) in &report.table_rows {
        println!("  {:<18} {} rows", table, rows);
    }
    println!();

    if report.issues.is_empty() {
        println!("🎉 No issues found");
        return Ok(());
    }

    for issue in &report.issues {
        let icon = match issue.severity {
            Severity::Critical => "🔴",
            Severity::Warning => "🟡",
            Severity::Info => "🔵",
        };
        println!("{} {}.{}: {}", icon, issue.table, issue.field, issue.issue);
        println!("     → {} ({} rows)", issue.recommendation, issue.affected_rows);
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    println!("🖥️  Loading Claim Insight dashboard...\n");

    let snapshot = load_snapshot(config)?;
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(snapshot, config);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use a headless command: claim-insight summary");
    eprintln!("   Or the REST API: cargo run --bin claim-server --features server");
    std::process::exit(1);
}
