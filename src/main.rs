mod categorizer;
mod cli;
mod db;
mod duplicates;
mod error;
mod fmt;
mod importer;
mod models;
mod reports;
mod settings;
mod store;

use std::io::IsTerminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{CategoryCommands, Cli, Commands, DuplicatesCommands, FiltersCommands, ReportCommands};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings::load_settings().log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import {
            file,
            bank,
            no_categorize,
        } => cli::import::run(&file, &bank, no_categorize),
        Commands::Add {
            bank,
            date,
            description,
            amount,
            category,
            external_id,
        } => cli::import::add(&bank, &date, &description, &amount, category.as_deref(), external_id),
        Commands::Categorize { category, pattern } => {
            cli::categorize::run(category.as_deref(), pattern.as_deref())
        }
        Commands::Reset { category, filter } => cli::categorize::reset(category.as_deref(), filter),
        Commands::SetCategory { ids, category } => cli::categorize::set(&ids, &category),
        Commands::Filters { command } => match command {
            FiltersCommands::Add {
                pattern,
                category,
                label,
                no_apply,
            } => cli::filters::add(&pattern, &category, label.as_deref(), no_apply),
            FiltersCommands::List { category } => cli::filters::list(category.as_deref()),
            FiltersCommands::Update { id, pattern, label } => {
                cli::filters::update(id, pattern.as_deref(), label.as_deref())
            }
            FiltersCommands::Delete { id } => cli::filters::delete(id),
        },
        Commands::Category { command } => match command {
            CategoryCommands::Rename { old, new } => cli::category::rename(&old, &new),
            CategoryCommands::Delete { name } => cli::category::delete(&name),
            CategoryCommands::List => cli::category::list(),
        },
        Commands::Duplicates { command } => match command {
            DuplicatesCommands::List { json } => cli::duplicates::list(json),
            DuplicatesCommands::Dismiss { ids } => cli::duplicates::dismiss(&ids),
            DuplicatesCommands::Delete { ids } => cli::duplicates::delete(&ids),
        },
        Commands::Transactions {
            bank,
            category,
            pattern,
            from_date,
            to_date,
            json,
        } => cli::transactions::list(bank, category, pattern, from_date, to_date, json),
        Commands::Banks => cli::transactions::banks(),
        Commands::Years => cli::transactions::list_years(),
        Commands::Report { command } => match command {
            ReportCommands::Bank { bank, window, json } => cli::report::bank(&bank, &window, json),
            ReportCommands::Category {
                category,
                pattern,
                window,
                json,
            } => cli::report::category(&category, pattern.as_deref(), &window, json),
            ReportCommands::Timeline {
                bank,
                category,
                granularity,
                filters,
                window,
                json,
            } => cli::report::timeline(
                bank.as_deref(),
                category.as_deref(),
                &granularity,
                &filters,
                &window,
                json,
            ),
            ReportCommands::Residual {
                category,
                window,
                json,
            } => cli::report::residual(&category, &window, json),
        },
    };

    if let Err(e) = result {
        tracing::error!(?args, error = %e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(if e.is_client_fault() { 2 } else { 1 });
    }
}
