mod budget;
mod cmd;
mod config;
mod core;
mod filter;
mod import;
mod period;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "budgetc",
    version,
    about = "Normalize, categorize and reconcile bank transactions, then report against a budget"
)]
struct Cli {
    /// JSON config file (defaults to ./budgetc.json when present)
    #[arg(long, global = true, env = "BUDGETC_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert raw bank exports into canonical transactions
    Normalize(cmd::normalize::NormalizeCommand),
    /// Partition transactions into one file per period
    Split(cmd::split::SplitCommand),
    /// Apply changesets to a transaction file
    Apply(cmd::apply::ApplyCommand),
    /// Assign categories interactively, writing a changeset
    Categorize(cmd::categorize::CategorizeCommand),
    /// List and filter transactions
    List(cmd::list::ListCommand),
    /// Budget vs. actual report
    Report(cmd::report::ReportCommand),
    /// Create starter budget, config or changeset files
    Init(cmd::init::InitCommand),
    /// Print file format documentation
    Schema(cmd::schema::SchemaCommand),
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Normalize(normalize) => normalize.exec(&config),
        Command::Split(split) => split.exec(),
        Command::Apply(apply) => apply.exec(&config),
        Command::Categorize(categorize) => categorize.exec(&config),
        Command::List(list) => list.exec(&config),
        Command::Report(report) => report.exec(),
        Command::Init(init) => init.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
