use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod columns;
mod controller;
mod data;
mod debounce;
mod domain;
mod filter;
mod filter_rows;
mod inputter;
mod matcher;
mod model;
mod render;
mod ui;

use columns::ColumnOptions;
use controller::Controller;
use data::{Dataset, expand_path};
use domain::{DEFAULT_CSV_PATH, DEFAULT_DEBOUNCE_MS, SiftConfig, SiftError};
use filter::{ALL_COLUMNS_ID, ColumnSelector, FilterCondition, MatchMode, evaluate};
use filter_rows::FilterRows;
use matcher::MatchOptions;
use model::{Model, Status};
use render::{TableRenderer, TextRenderer};
use ui::TableUI;

/// Search and filter the rows of a csv file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV file to load
    #[arg(default_value = DEFAULT_CSV_PATH)]
    path: String,

    /// Initial search query
    #[arg(short, long, default_value = "")]
    query: String,

    /// Column the search query applies to, `__all__` searches every column
    #[arg(short, long, default_value = ALL_COLUMNS_ID)]
    column: String,

    /// Filter row as COLUMN=QUERY, can be given multiple times
    #[arg(short, long = "filter", value_name = "COLUMN=QUERY")]
    filters: Vec<FilterCondition>,

    /// How filter rows combine: all (AND) or any (OR)
    #[arg(short, long, default_value_t = MatchMode::All)]
    match_mode: MatchMode,

    /// Match case exactly
    #[arg(short = 's', long)]
    case_sensitive: bool,

    /// Treat queries as regular expressions
    #[arg(short, long)]
    regex: bool,

    /// Quiet period after typing before the table is filtered again
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS)]
    debounce_ms: u64,

    /// Maximum rendered width of a column
    #[arg(long, default_value_t = 40)]
    max_column_width: usize,

    /// Log file, defaults to csvsift.log in the temp directory
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the filtered table to stdout instead of starting the tui
    #[arg(short, long)]
    print: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("csvsift.log"));
    if let Err(e) = init_logging(&log_file) {
        eprintln!("Logging disabled, cannot open {}: {e}", log_file.display());
    }

    match run(args) {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(code) => code,
    }
}

fn init_logging(path: &Path) -> Result<(), SiftError> {
    let file = File::create(path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<ExitCode, SiftError> {
    info!("Starting csvsift with {args:?}");
    let config = SiftConfig::default()
        .debounce_ms(args.debounce_ms)
        .max_column_width(args.max_column_width);
    let path = expand_path(&args.path)?;
    let search = FilterCondition::new(ColumnSelector::from_id(&args.column), args.query.trim());
    let options = MatchOptions {
        case_sensitive: args.case_sensitive,
        regex: args.regex,
    };

    if args.print {
        print_table(&path, &search, &args.filters, options, args.match_mode, &config)
    } else {
        run_tui(&path, &search, &args.filters, options, args.match_mode, &config)
    }
}

fn print_table(
    path: &Path,
    search: &FilterCondition,
    filters: &[FilterCondition],
    options: MatchOptions,
    mode: MatchMode,
    config: &SiftConfig,
) -> Result<ExitCode, SiftError> {
    let mut renderer = TextRenderer::new(io::stdout().lock(), config.max_column_width);
    let data = match Dataset::load(path) {
        Ok(data) => data,
        Err(e) => {
            error!("Loading {} failed: {e}", path.display());
            renderer.render_message(&[], &format!("Error loading CSV: {e}"))?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let columns = ColumnOptions::build(data.headers());
    let mut rows = FilterRows::default();
    for f in filters {
        rows.add_filter_row(&columns, f.column.clone(), &f.query);
    }
    let fallback = FilterCondition::new(columns.resolve(&search.column), search.query.clone());
    let visible = evaluate(&data, &rows.conditions(), &fallback, options, mode);
    let count = renderer.render(&data, &visible)?;
    info!("Printed {count} rows");
    Ok(ExitCode::SUCCESS)
}

fn run_tui(
    path: &Path,
    search: &FilterCondition,
    filters: &[FilterCondition],
    options: MatchOptions,
    mode: MatchMode,
    config: &SiftConfig,
) -> Result<ExitCode, SiftError> {
    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, path, search, filters, options, mode, config);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    path: &Path,
    search: &FilterCondition,
    filters: &[FilterCondition],
    options: MatchOptions,
    mode: MatchMode,
    config: &SiftConfig,
) -> Result<ExitCode, SiftError> {
    let size = terminal.size()?;
    let mut model = Model::init(config, size.height as usize);
    model.load_data_file(path);
    model.set_search(search);
    for f in filters {
        model.add_filter_row(f.column.clone(), &f.query);
    }
    model.set_match_options(options, mode);

    let mut ui = TableUI::new();
    let controller = Controller::new();

    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    Ok(ExitCode::SUCCESS)
}
