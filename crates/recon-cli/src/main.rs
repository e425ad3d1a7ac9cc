//! Circuit Recon CLI
//!
//! The `circuit-recon` command reconciles the circuit inventory feeds in a
//! directory and prints vendor rollups.
//!
//! ## Commands
//!
//! - `reconcile`: Print merged circuit records
//! - `rollup`: Per-vendor metrics for named segments
//! - `report`: Composed vendor-by-segment table
//! - `cutovers`: Cutover-complete rows per vendor status feed

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use recon_core::telemetry::init_tracing;
use recon_core::{
    render_diagnostics_md, render_report_md, write_report_json, ComposedReport, DirectoryFeedSource,
    LifecycleCounts, ReconConfig, Reconciler, Reconciliation, SegmentDefinition, SegmentRollup,
    VendorMetric,
};

#[derive(Parser)]
#[command(name = "circuit-recon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Circuit inventory reconciliation and vendor rollup", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the feed files (overrides RECON_FEED_DIR)
    #[arg(long, global = true)]
    feed_dir: Option<PathBuf>,

    /// Only pick feed files whose name contains this token (overrides RECON_PERIOD)
    #[arg(long, global = true)]
    period: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged, deduplicated circuit records
    Reconcile {
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Per-vendor metrics for one or more segments
    Rollup {
        /// Segment to roll up (repeatable; default: every configured segment)
        #[arg(short, long = "segment")]
        segments: Vec<String>,

        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Composed vendor-by-segment report
    Report {
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Count cutover-complete rows in each vendor status feed
    Cutovers,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref(), cli.feed_dir, cli.period)?;
    let source = DirectoryFeedSource::new(config.feeds.clone());
    let reconciler = Reconciler::new(source, config).context("invalid configuration")?;

    match cli.command {
        Commands::Reconcile { format } => cmd_reconcile(&reconciler, format),
        Commands::Rollup { segments, format } => cmd_rollup(&reconciler, &segments, format),
        Commands::Report { format, output } => cmd_report(&reconciler, format, output.as_deref()),
        Commands::Cutovers => cmd_cutovers(&reconciler),
    }
}

/// Config file, then environment, then flags.
fn load_config(
    path: Option<&Path>,
    feed_dir: Option<PathBuf>,
    period: Option<String>,
) -> Result<ReconConfig> {
    let mut config = match path {
        Some(path) => ReconConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReconConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(dir) = feed_dir {
        config.feeds.dir = dir;
    }
    if let Some(period) = period {
        config.feeds.period = Some(period);
    }
    info!(dir = %config.feeds.dir.display(), period = ?config.feeds.period, "feed location");
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

fn opt_money(value: Option<f64>) -> String {
    value.map(money).unwrap_or_else(|| "-".to_string())
}

fn cmd_reconcile(reconciler: &Reconciler<DirectoryFeedSource>, format: Format) -> Result<()> {
    let run = reconciler.reconcile()?;
    match format {
        Format::Json => print_json(&run),
        Format::Text => {
            println!("{}", records_table("Merged records", &run));
            println!();
            print!("{}", render_diagnostics_md(&run.diagnostics));
            Ok(())
        }
    }
}

fn records_table(title: &str, run: &Reconciliation) -> String {
    let mut table = new_table(vec![
        "circuit", "vendor", "phase", "status", "vendor status", "yearly", "legacy yearly",
    ]);
    for record in &run.records {
        table.add_row(vec![
            record
                .circuit_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.vendor.clone().unwrap_or_else(|| "-".to_string()),
            record
                .phase
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.status_text.clone().unwrap_or_default(),
            record.vendor_statuses.join("; "),
            opt_money(record.yearly_cost()),
            opt_money(record.legacy_yearly_cost()),
        ]);
    }
    format!(
        "{title}: {} records, {} special program\n{table}",
        run.records.len(),
        run.special_program.len()
    )
}

fn metric_row(label: &str, metric: &VendorMetric) -> Vec<String> {
    vec![
        label.to_string(),
        metric.assigned_count.to_string(),
        metric.deployed_count.to_string(),
        money(metric.current_yearly_cost),
        money(metric.legacy_yearly_cost),
        money(metric.yearly_savings()),
    ]
}

const METRIC_HEADER: [&str; 6] = [
    "vendor",
    "assigned",
    "deployed",
    "yearly",
    "legacy yearly",
    "savings",
];

fn rollup_table(rollup: &SegmentRollup) -> Table {
    let mut table = new_table(METRIC_HEADER.to_vec());
    for (vendor, metric) in &rollup.metrics {
        table.add_row(metric_row(vendor, metric));
    }
    table
}

fn cmd_rollup(
    reconciler: &Reconciler<DirectoryFeedSource>,
    names: &[String],
    format: Format,
) -> Result<()> {
    let config = reconciler.config();
    let definitions: Vec<SegmentDefinition> = if names.is_empty() {
        config.segments.clone()
    } else {
        names
            .iter()
            .map(|name| config.segment(name).cloned())
            .collect::<Result<_, _>>()?
    };

    let run = reconciler.reconcile()?;
    let rollups = run.rollup_by_segment(&definitions)?;
    match format {
        Format::Json => print_json(&rollups),
        Format::Text => {
            for rollup in &rollups {
                println!(
                    "{} ({} ambiguous, {} without vendor)",
                    rollup.segment, rollup.ambiguous, rollup.unassigned_records
                );
                println!("{}", rollup_table(rollup));
            }
            print_lifecycle(&run.lifecycle_breakdown());
            Ok(())
        }
    }
}

fn print_lifecycle(breakdown: &BTreeMap<String, LifecycleCounts>) {
    let mut table = new_table(vec![
        "vendor",
        "unknown",
        "assigned",
        "in progress",
        "deployed",
    ]);
    for (vendor, counts) in breakdown {
        table.add_row(vec![
            vendor.clone(),
            counts.unknown.to_string(),
            counts.assigned.to_string(),
            counts.in_progress.to_string(),
            counts.deployed.to_string(),
        ]);
    }
    println!("Lifecycle breakdown");
    println!("{table}");
}

fn report_table(report: &ComposedReport) -> Table {
    let mut header = vec!["vendor".to_string()];
    for segment in &report.segments {
        header.push(format!("{segment} assigned"));
        header.push(format!("{segment} deployed"));
        header.push(format!("{segment} yearly"));
    }
    header.extend(["total yearly", "total legacy yearly", "last cutover"].map(String::from));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for row in &report.rows {
        let mut cells = vec![row.vendor.clone()];
        for segment in &report.segments {
            let metric = row.segment(segment);
            cells.push(metric.map_or(0, |m| m.assigned_count).to_string());
            cells.push(metric.map_or(0, |m| m.deployed_count).to_string());
            cells.push(money(metric.map_or(0.0, |m| m.current_yearly_cost)));
        }
        cells.push(money(row.total.current_yearly_cost));
        cells.push(money(row.total.legacy_yearly_cost));
        cells.push(
            row.total
                .last_cutover
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
        table.add_row(cells);
    }
    table
}

fn cmd_report(
    reconciler: &Reconciler<DirectoryFeedSource>,
    format: ReportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let report = reconciler.final_report()?;

    if let (ReportFormat::Json, Some(path)) = (format, output) {
        write_report_json(path, &report)?;
        println!("Report written to {}", path.display());
        return Ok(());
    }

    let rendered = match format {
        ReportFormat::Json => serde_json::to_string_pretty(&report)?,
        ReportFormat::Markdown => render_report_md(&report),
        ReportFormat::Text => {
            let grand = report.grand_total();
            let mut totals = new_table(METRIC_HEADER.to_vec());
            totals.add_row(metric_row("all vendors", &grand));
            format!(
                "{}\n{}\ninput digest: {}\n",
                report_table(&report),
                totals,
                report.input_digest
            )
        }
    };

    match output {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("write {:?}", path))?;
            println!("Report written to {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn cmd_cutovers(reconciler: &Reconciler<DirectoryFeedSource>) -> Result<()> {
    let run = reconciler.reconcile()?;
    let mut table = new_table(vec!["vendor feed", "rows", "cutover complete"]);
    let counts = run.cutover_complete_counts();
    for feed in &run.snapshot().vendor_status {
        table.add_row(vec![
            feed.vendor.clone(),
            feed.rows.len().to_string(),
            counts.get(&feed.vendor).copied().unwrap_or(0).to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
