pub mod categorize;
pub mod category;
pub mod duplicates;
pub mod filters;
pub mod import;
pub mod init;
pub mod report;
pub mod transactions;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{Result, WmmError};
use crate::importer::parse_date;
use crate::reports::resolve_window;
use crate::settings::{load_settings, Settings};

/// Opens the configured database, refusing to create one implicitly.
pub(crate) fn open_db(settings: &Settings) -> Result<Connection> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(WmmError::Settings(format!(
            "No database found at {}\nRun `wmm init` to create one.",
            db_path.display()
        )));
    }
    get_connection(&db_path)
}

pub(crate) fn connect() -> Result<(Settings, Connection)> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    Ok((settings, conn))
}

/// Accepts `YYYY-MM` or a bare month number.
pub(crate) fn parse_month_opt(month: &Option<String>) -> Result<(Option<i32>, Option<u32>)> {
    let Some(m) = month else {
        return Ok((None, None));
    };
    let bad = || WmmError::InvalidDate(m.clone());
    match m.split_once('-') {
        Some((y, mm)) => Ok((
            Some(y.parse().map_err(|_| bad())?),
            Some(mm.parse().map_err(|_| bad())?),
        )),
        None => Ok((None, Some(m.parse().map_err(|_| bad())?))),
    }
}

pub(crate) fn parse_date_opt(raw: &Option<String>) -> Result<Option<NaiveDate>> {
    raw.as_deref().map(parse_date).transpose()
}

/// Reporting window shared by every aggregate command.
#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// Month: YYYY-MM, or MM together with --year
    #[arg(long)]
    pub month: Option<String>,
    /// Calendar year (default: current year)
    #[arg(long)]
    pub year: Option<i32>,
    /// Start date (inclusive), requires --to
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// End date (inclusive), requires --from
    #[arg(long = "to")]
    pub to_date: Option<String>,
}

impl WindowArgs {
    pub fn resolve(&self) -> Result<(NaiveDate, NaiveDate)> {
        let (my, mm) = parse_month_opt(&self.month)?;
        resolve_window(
            self.year.or(my),
            mm,
            parse_date_opt(&self.from_date)?,
            parse_date_opt(&self.to_date)?,
        )
    }
}

#[derive(Parser)]
#[command(name = "wmm", version, about = "Classify, deduplicate and report on bank transactions.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for wmm data (default: ~/.local/share/wmm)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Merge a bank CSV export, superseding rows from its earliest date on.
    Import {
        /// Path to a CSV with date, description, amount and optional external_id columns
        file: String,
        /// Bank the rows belong to
        #[arg(long)]
        bank: String,
        /// Skip running filters after the import
        #[arg(long = "no-categorize")]
        no_categorize: bool,
    },
    /// Add a single transaction by hand.
    Add {
        #[arg(long)]
        bank: String,
        /// YYYY-MM-DD or MM/DD/YYYY
        #[arg(long)]
        date: String,
        #[arg(long)]
        description: String,
        /// Signed amount; negative for outflows
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "external-id")]
        external_id: Option<String>,
    },
    /// Run filters over uncategorized transactions.
    Categorize {
        /// Apply only this pattern, to this category
        #[arg(long, requires = "pattern")]
        category: Option<String>,
        #[arg(long, requires = "category")]
        pattern: Option<String>,
    },
    /// Clear the category of transactions.
    Reset {
        /// Every transaction of this category
        #[arg(long, conflicts_with = "filter", required_unless_present = "filter")]
        category: Option<String>,
        /// Only transactions classified by this filter ID
        #[arg(long)]
        filter: Option<i64>,
    },
    /// Categorize transactions by ID.
    SetCategory {
        #[arg(required = true)]
        ids: Vec<i64>,
        #[arg(long)]
        category: String,
    },
    /// Manage filters.
    Filters {
        #[command(subcommand)]
        command: FiltersCommands,
    },
    /// Manage categories.
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Find and resolve duplicate transactions.
    Duplicates {
        #[command(subcommand)]
        command: DuplicatesCommands,
    },
    /// List transactions.
    Transactions {
        #[arg(long)]
        bank: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Description contains
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List banks with transactions.
    Banks,
    /// List years with transactions.
    Years,
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
pub enum FiltersCommands {
    /// Add a filter and apply it to uncategorized transactions.
    Add {
        /// Substring matched against descriptions
        pattern: String,
        #[arg(long)]
        category: String,
        /// Display name
        #[arg(long)]
        label: Option<String>,
        /// Store the filter without applying it
        #[arg(long = "no-apply")]
        no_apply: bool,
    },
    /// List filters in classification order.
    List {
        /// Only filters of this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Change a filter's pattern or label.
    Update {
        /// Filter ID (shown in `wmm filters list`)
        id: i64,
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        label: Option<String>,
    },
    /// Delete a filter and uncategorize what it classified.
    Delete {
        /// Filter ID (shown in `wmm filters list`)
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Rename a category on transactions and filters.
    Rename { old: String, new: String },
    /// Uncategorize a category's transactions and drop its filters.
    Delete { name: String },
    /// List known categories.
    List,
}

#[derive(Subcommand)]
pub enum DuplicatesCommands {
    /// List suspected duplicates.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Confirm transactions are not duplicates.
    Dismiss {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Delete transactions.
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Balance of one bank.
    Bank {
        bank: String,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        json: bool,
    },
    /// Balance and monthly averages of a category, one row per filter.
    Category {
        category: String,
        /// Only this filter pattern
        #[arg(long)]
        pattern: Option<String>,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        json: bool,
    },
    /// Amounts over time for a bank or a category.
    Timeline {
        #[arg(long, conflicts_with = "category", required_unless_present = "category")]
        bank: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// year, month, day or unit
        #[arg(long, default_value = "month")]
        granularity: String,
        /// Break a category down by these filter patterns, one point per transaction
        #[arg(long = "filter", requires = "category", conflicts_with = "granularity")]
        filters: Vec<String>,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        json: bool,
    },
    /// Category transactions not matched by any of its filters.
    Residual {
        category: String,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        json: bool,
    },
}
