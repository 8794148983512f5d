// crates/market-store-cli/src/main.rs
// ============================================================================
// Module: Market Store CLI Entry Point
// Description: Command dispatcher for market store maintenance and ingestion.
// Purpose: Import, inspect, and delete bar and tick series from the shell.
// Dependencies: clap, market-store-config, market-store-core, market-store-sqlite,
//               serde_json, thiserror, time, tracing-subscriber.
// ============================================================================

//! ## Overview
//! The market store CLI opens the `SQLite` series store and overview ledger
//! described by `market-store.toml` and exposes save, load, overview, and
//! delete operations. Records are exchanged as JSON lines. Security posture:
//! input files are untrusted; reads are size-limited and every record is
//! validated before any write.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use market_store_config::MarketStoreConfig;
use market_store_config::config_toml_example;
use market_store_core::Exchange;
use market_store_core::Interval;
use market_store_core::MarketDatabase;
use market_store_core::RecordKind;
use market_store_core::RowCodec;
use market_store_core::SaveReceipt;
use market_store_core::SeriesKey;
use market_store_core::SeriesOverview;
use market_store_core::SharedOverviewLedger;
use market_store_core::TableName;
use market_store_core::TagOverviewLedger;
use market_store_core::WriteMode;
use market_store_sqlite::SqliteOverviewLedger;
use market_store_sqlite::SqliteSeriesStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Limits and Constants
// ============================================================================

/// Maximum size of an import file.
const MAX_IMPORT_BYTES: usize = 256 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "market-store", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to market-store.toml or `MARKET_STORE_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the store files and both templates.
    Init,
    /// Import bars or ticks from a JSON-lines file.
    Import(ImportCommand),
    /// Print the records of one series within a time range.
    Load(LoadCommand),
    /// Print the overviews of every series of a record kind.
    Overview(OverviewCommand),
    /// Drop one series and its overview.
    Delete(SeriesArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration file.
    Validate,
    /// Print a canonical example configuration.
    Example,
}

/// Record kind selector.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum KindArg {
    /// OHLCV bars.
    Bar,
    /// Order-book ticks.
    Tick,
}

impl From<KindArg> for RecordKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Bar => Self::Bar,
            KindArg::Tick => Self::Tick,
        }
    }
}

/// Arguments for `import`.
#[derive(Args, Debug)]
struct ImportCommand {
    /// JSON-lines file with one record per line.
    #[arg(long, value_name = "PATH")]
    file: PathBuf,
    /// Record kind contained in the file.
    #[arg(long, value_enum)]
    kind: KindArg,
    /// Treat the file as live data appended after existing records.
    #[arg(long)]
    stream: bool,
}

/// Series identity arguments.
#[derive(Args, Debug)]
struct SeriesArgs {
    /// Instrument symbol.
    #[arg(long)]
    symbol: String,
    /// Exchange token (`CFFEX`, `SSE`, ...).
    #[arg(long)]
    exchange: Exchange,
    /// Bar interval (`1m`, `1h`, `1d`, `1w`); omit for tick series.
    #[arg(long)]
    interval: Option<Interval>,
}

impl SeriesArgs {
    /// Builds the series key.
    fn key(&self) -> CliResult<SeriesKey> {
        SeriesKey::new(self.symbol.clone(), self.exchange, self.interval)
            .map_err(|err| CliError::new(err.to_string()))
    }
}

/// Arguments for `load`.
#[derive(Args, Debug)]
struct LoadCommand {
    /// Series to load.
    #[command(flatten)]
    series: SeriesArgs,
    /// Inclusive range start (RFC 3339).
    #[arg(long, value_parser = parse_timestamp)]
    start: OffsetDateTime,
    /// Inclusive range end (RFC 3339).
    #[arg(long, value_parser = parse_timestamp)]
    end: OffsetDateTime,
}

/// Arguments for `overview`.
#[derive(Args, Debug)]
struct OverviewCommand {
    /// Record kind to list.
    #[arg(long, value_enum)]
    kind: KindArg,
}

/// Output of `delete`.
#[derive(Debug, Serialize)]
struct DeleteReport {
    /// Dropped table.
    table: TableName,
    /// Rows stored before deletion.
    deleted_rows: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors raised by bounded file reads.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// I/O failure.
    #[error("{0}")]
    Io(std::io::Error),
    /// File exceeds the limit.
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Observed size.
        size: u64,
        /// Allowed size.
        limit: usize,
    },
}

/// Database type used by every data command.
type CliDatabase = MarketDatabase<SqliteSeriesStore, SharedOverviewLedger>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    if let Commands::Config {
        command,
    } = command
    {
        return command_config(&command, cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.logging.filter)?;
    let db = open_database(&config)?;
    match command {
        Commands::Init => command_init(&config),
        Commands::Import(command) => command_import(&db, &command),
        Commands::Load(command) => command_load(&db, &command),
        Commands::Overview(command) => command_overview(&db, &command),
        Commands::Delete(series) => command_delete(&db, &series),
        Commands::Config {
            ..
        } => Ok(ExitCode::SUCCESS),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error(&err)))?;
    write_stdout_line("")
}

// ============================================================================
// SECTION: Setup
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<MarketStoreConfig> {
    MarketStoreConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Installs the stderr tracing subscriber; `RUST_LOG` overrides the config filter.
fn init_logging(filter: &str) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|err| CliError::new(format!("invalid logging filter: {err}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| CliError::new(format!("logging init failed: {err}")))
}

/// Opens the series store, the configured overview ledger, and the orchestrator.
fn open_database(config: &MarketStoreConfig) -> CliResult<CliDatabase> {
    let options = config.database_options().map_err(|err| CliError::new(err.to_string()))?;
    let store = SqliteSeriesStore::open(config.store.sqlite_config())
        .map_err(|err| CliError::new(format!("store open failed: {err}")))?;
    let ledger = match config.ledger_sqlite_config() {
        Some(ledger_config) => SharedOverviewLedger::from_ledger(
            SqliteOverviewLedger::open(&ledger_config, options.zone)
                .map_err(|err| CliError::new(format!("ledger open failed: {err}")))?,
        ),
        None => SharedOverviewLedger::from_ledger(TagOverviewLedger::new(store.clone(), options.zone)),
    };
    MarketDatabase::open(store, ledger, options)
        .map_err(|err| CliError::new(format!("store init failed: {err}")))
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `init`; opening the database already provisioned everything.
fn command_init(config: &MarketStoreConfig) -> CliResult<ExitCode> {
    write_stdout_line(&format!("initialized market store at {}", config.store.path.display()))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `import` and prints one receipt per saved series.
fn command_import(db: &CliDatabase, command: &ImportCommand) -> CliResult<ExitCode> {
    let mode = if command.stream { WriteMode::Stream } else { WriteMode::Backfill };
    let receipts = import_file(db, &command.file, command.kind, mode)?;
    for receipt in &receipts {
        write_json_line(receipt)?;
    }
    info!(file = %command.file.display(), series = receipts.len(), "import finished");
    Ok(ExitCode::SUCCESS)
}

/// Executes `load` and prints one record per line.
fn command_load(db: &CliDatabase, command: &LoadCommand) -> CliResult<ExitCode> {
    let key = command.series.key()?;
    match key.kind() {
        RecordKind::Bar => {
            for bar in db.load_bars(&key, command.start, command.end).map_err(cli_error)? {
                write_json_line(&bar)?;
            }
        }
        RecordKind::Tick => {
            for tick in db.load_ticks(&key, command.start, command.end).map_err(cli_error)? {
                write_json_line(&tick)?;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `overview`.
fn command_overview(db: &CliDatabase, command: &OverviewCommand) -> CliResult<ExitCode> {
    let overviews: Vec<SeriesOverview> = db.overviews(command.kind.into()).map_err(cli_error)?;
    for overview in &overviews {
        write_json_line(overview)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `delete`.
fn command_delete(db: &CliDatabase, series: &SeriesArgs) -> CliResult<ExitCode> {
    let key = series.key()?;
    let deleted_rows = db.delete_series(&key).map_err(cli_error)?;
    write_json_line(&DeleteReport {
        table: key.table_name(),
        deleted_rows,
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Executes config subcommands.
fn command_config(command: &ConfigCommand, path: Option<&Path>) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate => {
            load_config(path)?;
            write_stdout_line("config ok")?;
        }
        ConfigCommand::Example => write_stdout_line(config_toml_example().trim_end())?,
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Import
// ============================================================================

/// Reads a JSON-lines file and saves it series by series.
fn import_file(
    db: &CliDatabase,
    path: &Path,
    kind: KindArg,
    mode: WriteMode,
) -> CliResult<Vec<SaveReceipt>> {
    let bytes = read_bytes_with_limit(path, MAX_IMPORT_BYTES)
        .map_err(|err| CliError::new(format!("cannot read {}: {err}", path.display())))?;
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| CliError::new(format!("{} must be utf-8", path.display())))?;
    match kind {
        KindArg::Bar => import_records::<market_store_core::Bar>(db, content, mode),
        KindArg::Tick => import_records::<market_store_core::Tick>(db, content, mode),
    }
}

/// Parses, groups, and saves records of one kind.
fn import_records<R>(db: &CliDatabase, content: &str, mode: WriteMode) -> CliResult<Vec<SaveReceipt>>
where
    R: RowCodec + DeserializeOwned,
{
    let records = parse_jsonl::<R>(content)?;
    group_by_series(records)?
        .into_iter()
        .map(|(_, batch)| db.save(&batch, mode).map_err(cli_error))
        .collect()
}

/// Parses one JSON value per non-blank line.
fn parse_jsonl<R>(content: &str) -> CliResult<Vec<R>>
where
    R: DeserializeOwned,
{
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map_err(|err| CliError::new(format!("line {}: {err}", index + 1)))
        })
        .collect()
}

/// Splits records into single-series batches in first-seen order.
fn group_by_series<R>(records: Vec<R>) -> CliResult<Vec<(SeriesKey, Vec<R>)>>
where
    R: RowCodec,
{
    let mut positions: HashMap<SeriesKey, usize> = HashMap::new();
    let mut groups: Vec<(SeriesKey, Vec<R>)> = Vec::new();
    for record in records {
        let key = record.series_key().map_err(|err| CliError::new(err.to_string()))?;
        if let Some(&position) = positions.get(&key) {
            if let Some((_, batch)) = groups.get_mut(position) {
                batch.push(record);
            }
        } else {
            positions.insert(key.clone(), groups.len());
            groups.push((key, vec![record]));
        }
    }
    Ok(groups)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses an RFC 3339 timestamp argument.
fn parse_timestamp(value: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|err| format!("invalid RFC 3339 timestamp: {err}"))
}

/// Reads a file, failing once it exceeds `max_bytes`.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Converts any displayable error into a [`CliError`].
fn cli_error(error: impl std::fmt::Display) -> CliError {
    CliError::new(error.to_string())
}

/// Serializes a value as one JSON line on stdout.
fn write_json_line<T: Serialize>(value: &T) -> CliResult<()> {
    let line = serde_json::to_string(value).map_err(cli_error)?;
    write_stdout_line(&line)
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::new(output_error(&err)))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(error: &std::io::Error) -> String {
    format!("failed to write output: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
