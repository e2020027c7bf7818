use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use store_quadrant::aggregate::{self, RecordFilter, StoreSelection};
use store_quadrant::db;
use store_quadrant::error::StoreError;
use store_quadrant::models::Thresholds;
use store_quadrant::period::{DateRange, YearMonth};
use store_quadrant::quadrant;
use store_quadrant::records::{self, RecordDraft};
use store_quadrant::report::{self, QuadrantReport, ReportFormat};
use store_quadrant::settings::{
    self, FileSettingsStore, Settings, SettingsStore, DEFAULT_SETTINGS_PATH,
};

#[derive(Parser)]
#[command(name = "store-quadrant")]
#[command(about = "Track store revenue and compliance against targets", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    /// Settings file holding the persisted targets
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH, global = true)]
    settings: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample stores and records
    Seed,
    /// Import records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Manage stores
    #[command(subcommand)]
    Store(StoreCommand),
    /// Manage monthly records
    #[command(subcommand)]
    Record(RecordCommand),
    /// Show or change the revenue and compliance targets
    #[command(subcommand)]
    Targets(TargetsCommand),
    /// Classify stores into quadrants for a period
    Quadrant {
        #[command(flatten)]
        scope: Scope,
    },
    /// Write a quadrant report
    Report {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,
    },
}

#[derive(Subcommand)]
enum StoreCommand {
    Add {
        name: String,
    },
    Rename {
        id: Uuid,
        name: String,
    },
    /// Delete a store; its records are kept
    Delete {
        id: Uuid,
    },
    List,
}

#[derive(Subcommand)]
enum RecordCommand {
    Add {
        #[command(flatten)]
        entry: EntryArgs,
    },
    /// Replace every field of an existing record
    Edit {
        id: Uuid,
        #[command(flatten)]
        entry: EntryArgs,
    },
    Delete {
        id: Uuid,
    },
    /// List one month's records, newest first
    List {
        /// Month as YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<YearMonth>,
        #[arg(long = "store")]
        stores: Vec<Uuid>,
    },
}

#[derive(Subcommand)]
enum TargetsCommand {
    Show,
    Set {
        #[arg(long)]
        revenue: Option<f64>,
        #[arg(long)]
        compliance: Option<f64>,
    },
}

#[derive(Args)]
struct EntryArgs {
    #[arg(long)]
    store: Uuid,
    /// Defaults to today when adding; an edit keeps the record's date
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Revenue as a percentage of the store's goal
    #[arg(long)]
    revenue: f64,
    #[arg(long)]
    standardization: f64,
    #[arg(long)]
    layout: f64,
    #[arg(long)]
    culture: f64,
}

impl EntryArgs {
    fn into_draft(self, default_date: NaiveDate) -> RecordDraft {
        RecordDraft {
            store_id: self.store,
            date: self.date.unwrap_or(default_date),
            revenue_score: self.revenue,
            standardization: self.standardization,
            layout: self.layout,
            culture: self.culture,
        }
    }
}

#[derive(Args)]
struct Scope {
    /// First day of the period, defaults to the start of this month
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day of the period, defaults to the end of this month
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Restrict to these stores (repeatable)
    #[arg(long = "store")]
    stores: Vec<Uuid>,
    /// Override the saved revenue target for this run
    #[arg(long)]
    target_revenue: Option<f64>,
    /// Override the saved compliance target for this run
    #[arg(long)]
    target_compliance: Option<f64>,
}

impl Scope {
    fn filter(&self, today: NaiveDate) -> anyhow::Result<RecordFilter> {
        let default = DateRange::current_month(today);
        Ok(RecordFilter {
            date_range: Some(DateRange::checked(
                self.from.unwrap_or(default.start),
                self.to.unwrap_or(default.end),
            )?),
            stores: StoreSelection::from_ids(self.stores.iter().copied()),
        })
    }

    fn thresholds(&self, saved: Thresholds) -> Thresholds {
        Thresholds {
            target_revenue: self.target_revenue.unwrap_or(saved.target_revenue),
            target_compliance: self.target_compliance.unwrap_or(saved.target_compliance),
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "store_quadrant=debug,sqlx=warn"
    } else {
        "info,sqlx=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url =
        database_url.context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<StoreError>() {
            Some(conflict @ StoreError::Conflict { .. }) => {
                eprintln!("Rejected: {conflict}");
            }
            _ => {
                tracing::error!("command failed: {err:#}");
                eprintln!("Error: {err:#}");
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings_store = FileSettingsStore::new(&cli.settings);
    let load_settings = || -> anyhow::Result<Settings> {
        let settings = settings_store
            .load()
            .context("failed to load settings")?;
        tracing::debug!(path = %settings_store.path().display(), "settings loaded");
        Ok(settings)
    };

    match cli.command {
        Commands::InitDb => {
            let pool = connect(cli.database_url.as_deref()).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(cli.database_url.as_deref()).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(cli.database_url.as_deref()).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} records from {}.", csv.display());
        }
        Commands::Store(command) => {
            let pool = connect(cli.database_url.as_deref()).await?;
            run_store_command(&pool, command).await?;
        }
        Commands::Record(command) => {
            let pool = connect(cli.database_url.as_deref()).await?;
            run_record_command(&pool, command).await?;
        }
        Commands::Targets(TargetsCommand::Show) => {
            let thresholds = load_settings()?.thresholds();
            println!("Revenue target: {:.1}%", thresholds.target_revenue);
            println!("Compliance target: {:.1}%", thresholds.target_compliance);
        }
        Commands::Targets(TargetsCommand::Set {
            revenue,
            compliance,
        }) => {
            let settings = settings::load_or_default(&settings_store);
            let current = settings.thresholds();
            let updated = Thresholds {
                target_revenue: revenue.unwrap_or(current.target_revenue),
                target_compliance: compliance.unwrap_or(current.target_compliance),
            };
            settings_store
                .save(&settings.with_thresholds(updated))
                .context("failed to save settings")?;
            println!(
                "Targets updated: revenue {:.1}%, compliance {:.1}%.",
                updated.target_revenue, updated.target_compliance
            );
        }
        Commands::Quadrant { scope } => {
            let pool = connect(cli.database_url.as_deref()).await?;
            let settings = load_settings()?;
            let filter = scope.filter(Utc::now().date_naive())?;
            let thresholds = scope.thresholds(settings.thresholds());
            let stores = db::fetch_stores(&pool).await?;
            let records = db::fetch_records(&pool, filter.date_range).await?;

            let points = aggregate::aggregate(&records, &stores, &filter);
            if points.is_empty() {
                println!("No records found for this period.");
                return Ok(());
            }

            let classification = quadrant::classify(&points, &thresholds);
            let summary = quadrant::period_summary(&points);

            println!(
                "Targets: revenue {:.1}%, compliance {:.1}%",
                thresholds.target_revenue, thresholds.target_compliance
            );
            for entry in &classification.classified {
                println!(
                    "- {} [{}] revenue {:.1}% compliance {:.1}% across {} records",
                    entry.point.store_name,
                    entry.quadrant,
                    entry.point.avg_revenue,
                    entry.point.avg_compliance,
                    entry.point.count
                );
            }
            println!();
            for (quadrant, count) in &classification.tally {
                println!("{quadrant}: {count}");
            }
            println!(
                "Overall: revenue {:.1}%, compliance {:.1}% over {} records",
                summary.avg_revenue, summary.avg_compliance, summary.record_count
            );
        }
        Commands::Report { scope, out, format } => {
            let pool = connect(cli.database_url.as_deref()).await?;
            let settings = load_settings()?;
            let filter = scope.filter(Utc::now().date_naive())?;
            let thresholds = scope.thresholds(settings.thresholds());
            let stores = db::fetch_stores(&pool).await?;
            let records = db::fetch_records(&pool, filter.date_range).await?;

            let report = QuadrantReport::build(&records, &stores, &filter, thresholds);
            let rendered = report::render(&report, format, settings.report.top_stores)?;
            let out = out.unwrap_or_else(|| settings.report.output.clone());
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn run_store_command(pool: &PgPool, command: StoreCommand) -> anyhow::Result<()> {
    match command {
        StoreCommand::Add { name } => {
            let store = db::add_store(pool, &name).await?;
            println!("Store {:?} added ({}).", store.name, store.id);
        }
        StoreCommand::Rename { id, name } => {
            let store = db::rename_store(pool, id, &name).await?;
            println!("Store renamed to {:?}.", store.name);
        }
        StoreCommand::Delete { id } => {
            let orphaned = db::delete_store(pool, id).await?;
            if orphaned > 0 {
                println!(
                    "Store deleted. {orphaned} records remain and will show as an unknown store."
                );
            } else {
                println!("Store deleted.");
            }
        }
        StoreCommand::List => {
            let stores = db::fetch_stores(pool).await?;
            if stores.is_empty() {
                println!("No stores yet.");
            }
            for store in stores {
                println!("{}  {}", store.id, store.name);
            }
        }
    }
    Ok(())
}

async fn run_record_command(pool: &PgPool, command: RecordCommand) -> anyhow::Result<()> {
    match command {
        RecordCommand::Add { entry } => {
            let today = Utc::now().date_naive();
            let record = db::create_record(pool, entry.into_draft(today)).await?;
            println!(
                "Record {} added (compliance {:.1}%).",
                record.id, record.compliance_score
            );
        }
        RecordCommand::Edit { id, entry } => {
            let current = db::fetch_record(pool, id).await?;
            let record = db::update_record(pool, id, entry.into_draft(current.date)).await?;
            println!(
                "Record {} updated (compliance {:.1}%).",
                record.id, record.compliance_score
            );
        }
        RecordCommand::Delete { id } => {
            db::delete_record(pool, id).await?;
            println!("Record deleted.");
        }
        RecordCommand::List { month, stores } => {
            let month = month.unwrap_or_else(|| YearMonth::of(Utc::now().date_naive()));
            let all_stores = db::fetch_stores(pool).await?;
            let all_records = db::fetch_records(pool, Some(DateRange::month(month))).await?;
            let selection = StoreSelection::from_ids(stores);
            let listed = records::records_for_month(&all_records, month, &selection);

            if listed.is_empty() {
                println!("No records for {month}.");
                return Ok(());
            }

            println!("Records for {month}:");
            for record in listed {
                println!(
                    "{}  {}  {}  revenue {:.1}%  compliance {:.1}%",
                    record.id,
                    record.date.format("%d/%m/%Y"),
                    records::store_label(&all_stores, record.store_id),
                    record.revenue_score,
                    record.compliance_score
                );
            }
        }
    }
    Ok(())
}
