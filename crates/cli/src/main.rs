// GridHub CLI - headless tabular pipeline operations
//
// Every subcommand hydrates the session from the durable store, so state
// carries across invocations the same way it carries across tabs.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::EnvFilter;

use gridhub_engine::aggregate::{self, AggregateMode};
use gridhub_engine::cell::CellValue;
use gridhub_io::export::ExportFormat;
use gridhub_store::notice::{Notice, NoticeKind, NoticeSink};
use gridhub_store::session::SessionState;
use gridhub_store::settings::Settings;
use gridhub_store::KvStore;

#[derive(Parser)]
#[command(name = "ghub")]
#[command(about = "Tabular data pipeline (headless dashboard operations)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a spreadsheet or CSV file into the session
    #[command(after_help = "\
Examples:
  ghub load sales.xlsx
  ghub load export.csv")]
    Load {
        /// File to load (.xlsx, .xls, .xlsm, .xlsb, .csv, .ods)
        file: PathBuf,
    },

    /// Print the visible rows under the given search/filters
    #[command(after_help = "\
Examples:
  ghub show --search jakarta
  ghub show --filter 0=Widget --filter '2=In Stock'")]
    Show {
        /// Free-text search over every cell
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Column filter, repeatable
        #[arg(long, value_name = "COL=VALUE")]
        filter: Vec<String>,

        /// Maximum data rows to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Aggregate a category column into a chart-ready series
    #[command(after_help = "\
Examples:
  ghub summary --category 0 --mode count
  ghub summary --category 2 --value 3 --mode sum --search widget")]
    Summary {
        /// Category column index
        #[arg(long, short = 'c', default_value_t = 0)]
        category: usize,

        /// Numeric column index (sum mode)
        #[arg(long, short = 'v', default_value_t = 1)]
        value: usize,

        #[arg(long, value_enum, default_value = "sum")]
        mode: Mode,

        #[arg(long, short = 's')]
        search: Option<String>,

        #[arg(long, value_name = "COL=VALUE")]
        filter: Vec<String>,
    },

    /// Per-column numeric statistics
    Stats,

    /// Set one cell (data rows start at 1; row 0 is the header)
    Set {
        row: usize,
        col: usize,
        value: String,
    },

    /// Insert an empty row
    AddRow {
        /// Insert after this row index (default: append)
        #[arg(long)]
        after: Option<usize>,
    },

    /// Delete a data row
    DeleteRow { row: usize },

    /// Export header + visible rows
    #[command(after_help = "\
Examples:
  ghub export csv
  ghub export xlsx --out /tmp --filter 0=Widget")]
    Export {
        #[arg(value_enum)]
        format: Format,

        /// Output directory (default: settings export.dir, else cwd)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        #[arg(long, short = 's')]
        search: Option<String>,

        #[arg(long, value_name = "COL=VALUE")]
        filter: Vec<String>,
    },

    /// Clear the session and its durable copy
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Count,
    Sum,
}

impl From<Mode> for AggregateMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Count => AggregateMode::Count,
            Mode::Sum => AggregateMode::Sum,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Xlsx,
    Csv,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Xlsx => ExportFormat::Xlsx,
            Format::Csv => ExportFormat::Csv,
        }
    }
}

/// Renders session notices on the terminal.
struct PrintSink;

impl NoticeSink for PrintSink {
    fn notify(&mut self, notice: Notice) {
        match notice.kind {
            NoticeKind::Success => println!("{} — {}", notice.title, notice.description),
            NoticeKind::Error => eprintln!("{} — {}", notice.title, notice.description),
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_session(settings: &Settings) -> SessionState {
    let store = match KvStore::open(&settings.effective_store_path()) {
        Ok(store) => Some(store),
        Err(err) => {
            tracing::warn!("durable store unavailable, session will not persist: {err}");
            None
        }
    };
    let mut session = SessionState::new(store).with_notifier(Box::new(PrintSink));
    session.hydrate();
    session
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    let settings = Settings::load();
    let session = open_session(&settings);

    match run(cli.command, session, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, mut session: SessionState, settings: &Settings) -> Result<(), String> {
    match command {
        Commands::Load { file } => {
            session.load_file(&file).map_err(|e| e.to_string())?;
            Ok(())
        }

        Commands::Show {
            search,
            filter,
            limit,
        } => {
            apply_view(&mut session, search, &filter)?;
            if session.grid().is_empty() {
                println!("no data loaded — run `ghub load <file>` first");
                return Ok(());
            }
            let header: Vec<String> = session
                .headers()
                .iter()
                .map(CellValue::to_display_string)
                .collect();
            println!("{}", header.join(" | "));

            let rows = session.visible_data_rows();
            for row in rows.iter().take(limit) {
                let cells: Vec<String> = row.iter().map(CellValue::to_display_string).collect();
                println!("{}", cells.join(" | "));
            }
            if rows.len() > limit {
                println!("… {} more rows", rows.len() - limit);
            }
            Ok(())
        }

        Commands::Summary {
            category,
            value,
            mode,
            search,
            filter,
        } => {
            apply_view(&mut session, search, &filter)?;
            let series = aggregate::aggregate(
                session.visible_data_rows(),
                category,
                value,
                mode.into(),
            );
            if series.is_empty() {
                println!("no categories to aggregate — check the column indexes");
                return Ok(());
            }
            for entry in &series {
                println!(
                    "{:<20} {:>10}  ({})",
                    entry.display_label,
                    aggregate::format_axis_number(entry.value),
                    entry.full_label
                );
            }
            let total: f64 = series.iter().map(|e| e.value).sum();
            println!("total: {}", aggregate::format_axis_number(total));
            Ok(())
        }

        Commands::Stats => {
            let stats = aggregate::column_stats(session.headers(), session.grid().data_rows());
            if stats.is_empty() {
                println!("no numeric columns found");
                return Ok(());
            }
            for s in stats {
                println!(
                    "{:<20} count={} sum={} avg={:.2} min={} max={}",
                    s.column, s.count, s.sum, s.avg, s.min, s.max
                );
            }
            Ok(())
        }

        Commands::Set { row, col, value } => {
            if row == 0 {
                return Err("row 0 is the header and cannot be edited".to_string());
            }
            session.enter_edit_mode();
            if !session.update_cell(row, col, CellValue::from_raw_text(&value)) {
                return Err("cell update was not applied".to_string());
            }
            session.save_changes();
            Ok(())
        }

        Commands::AddRow { after } => {
            session.enter_edit_mode();
            if session.add_row(after).is_none() {
                return Err("row insert was not applied".to_string());
            }
            session.save_changes();
            Ok(())
        }

        Commands::DeleteRow { row } => {
            if row == 0 {
                return Err("row 0 is the header and cannot be deleted".to_string());
            }
            session.enter_edit_mode();
            if !session.delete_row(row) {
                return Err(format!("no row {row} to delete"));
            }
            session.save_changes();
            Ok(())
        }

        Commands::Export {
            format,
            out,
            search,
            filter,
        } => {
            apply_view(&mut session, search, &filter)?;
            let out_dir = out.unwrap_or_else(|| settings.effective_export_dir());
            session
                .export(format.into(), &out_dir)
                .map_err(|e| e.to_string())?;
            Ok(())
        }

        Commands::Clear => {
            session.clear();
            Ok(())
        }
    }
}

/// Apply transient search/filter arguments to the session view.
fn apply_view(
    session: &mut SessionState,
    search: Option<String>,
    filters: &[String],
) -> Result<(), String> {
    if let Some(term) = search {
        session.set_search_term(term);
    }
    for (col, value) in parse_filters(filters)? {
        session.toggle_column_filter(col, value);
    }
    Ok(())
}

/// Parse repeatable `COL=VALUE` filter arguments.
fn parse_filters(args: &[String]) -> Result<Vec<(usize, String)>, String> {
    args.iter()
        .map(|arg| {
            let (col, value) = arg
                .split_once('=')
                .ok_or_else(|| format!("invalid filter '{arg}': expected COL=VALUE"))?;
            let col: usize = col
                .trim()
                .parse()
                .map_err(|_| format!("invalid filter column in '{arg}'"))?;
            Ok((col, value.to_string()))
        })
        .collect()
}
