use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tablemap_core::TableInfo;
use tablemap_sqlite::{Storage, StorageConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tablemap")]
#[command(version)]
#[command(about = "Inspect the schema of tablemap SQLite databases")]
struct Cli {
    /// Log every SQL statement and sync decision to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the tables of a database.
    Tables(TablesArgs),
    /// Show the live columns of a table.
    Info(TableArgs),
    /// Report whether a table exists.
    Exists(TableArgs),
    /// Write a storage configuration file with default settings.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
struct DbArgs {
    /// Database file path.
    #[arg(long, conflicts_with = "config", required_unless_present = "config")]
    db: Option<PathBuf>,
    /// Storage configuration YAML file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct TablesArgs {
    #[command(flatten)]
    db: DbArgs,
}

#[derive(Debug, Args)]
struct TableArgs {
    /// Table name.
    table: String,
    #[command(flatten)]
    db: DbArgs,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    /// Output YAML path.
    #[arg(long)]
    output: PathBuf,
    /// Database file the configuration points at.
    #[arg(long)]
    db: Option<PathBuf>,
    /// Keep rows when live tables carry undeclared columns.
    #[arg(long)]
    preserve_extra_columns: bool,
}

#[derive(Debug, Serialize)]
struct ExistsReport<'a> {
    table: &'a str,
    exists: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Tables(args) => run_tables(args),
        Command::Info(args) => run_info(args),
        Command::Exists(args) => run_exists(args),
        Command::InitConfig(args) => run_init_config(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("tablemap=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tablemap=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn open_storage(args: &DbArgs) -> Result<Storage, String> {
    let config = match (&args.db, &args.config) {
        (Some(db), _) => {
            if !db.exists() {
                return Err(format!("Database '{}' does not exist", db.display()));
            }
            StorageConfig::file(db)
        }
        (None, Some(path)) => StorageConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        (None, None) => return Err("Specify --db or --config".to_string()),
    };
    debug!(path = ?config.path, "Opening database");
    Storage::from_config(config, Vec::new()).map_err(|e| format!("Failed to open database: {e}"))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize output: {e}"))
}

fn run_tables(args: TablesArgs) -> Result<(), String> {
    let storage = open_storage(&args.db)?;
    let names = storage
        .table_names()
        .map_err(|e| format!("Failed to list tables: {e}"))?;
    if args.db.json {
        println!("{}", to_json(&names)?);
    } else {
        for name in &names {
            println!("{name}");
        }
    }
    Ok(())
}

fn run_info(args: TableArgs) -> Result<(), String> {
    let storage = open_storage(&args.db)?;
    let columns = storage
        .table_info(&args.table)
        .map_err(|e| format!("Failed to read table info: {e}"))?;
    if columns.is_empty() {
        return Err(format!("Table '{}' does not exist", args.table));
    }
    if args.db.json {
        println!("{}", to_json(&columns)?);
    } else {
        print!("{}", format_columns(&columns));
    }
    Ok(())
}

fn format_columns(columns: &[TableInfo]) -> String {
    let width = columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for column in columns {
        let mut flags = Vec::new();
        if column.is_primary_key() {
            flags.push("PRIMARY KEY".to_string());
        }
        if column.not_null {
            flags.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default_value {
            flags.push(format!("DEFAULT {default}"));
        }
        let line = format!(
            "{:>3}  {:<width$}  {:<8} {}",
            column.cid,
            column.name,
            column.sql_type,
            flags.join(" ")
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn run_exists(args: TableArgs) -> Result<(), String> {
    let storage = open_storage(&args.db)?;
    let exists = storage
        .table_exists(&args.table)
        .map_err(|e| format!("Failed to query catalog: {e}"))?;
    if args.db.json {
        let report = ExistsReport {
            table: &args.table,
            exists,
        };
        println!("{}", to_json(&report)?);
    } else {
        println!("{exists}");
    }
    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<(), String> {
    let config = StorageConfig {
        path: args.db,
        preserve_extra_columns: args.preserve_extra_columns,
        ..StorageConfig::default()
    };
    config
        .save(&args.output)
        .map_err(|e| format!("Failed to write config '{}': {e}", args.output.display()))?;
    println!("Configuration written to '{}'.", args.output.display());
    Ok(())
}
