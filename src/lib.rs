pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod grid;
pub mod io_utils;
pub mod mapping;
pub mod paste;
pub mod schema;
pub mod selection;
pub mod session;
pub mod table;
pub mod validation;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};
use serde::Serialize;

use crate::{
    cli::{Cli, Commands},
    config::SessionConfig,
    mapping::MappingSummary,
    session::Session,
    validation::{ValidationError, ValidationStats},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("grid_managed", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => handle_validate(&args),
        Commands::Mapping(args) => handle_mapping(&args),
        Commands::Columns(args) => handle_columns(&args),
        Commands::Init(args) => handle_init(&args),
    }
}

fn load_session(path: Option<&Path>) -> Result<Session> {
    let config = match path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("Loading session from {path:?}"))?,
        None => {
            debug!("No session file given; using the built-in session");
            SessionConfig::default()
        }
    };
    Session::from_config(&config).context("Building session")
}

#[derive(Debug, Serialize)]
struct ValidationReport<'a> {
    title: &'a str,
    rows: usize,
    mapping: MappingSummary,
    stats: ValidationStats,
    errors: &'a [ValidationError],
}

fn handle_validate(args: &cli::ValidateArgs) -> Result<()> {
    let mut session = load_session(args.config.as_deref())?;
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    info!(
        "Loading '{}' with delimiter '{}'",
        args.input.display(),
        io_utils::printable_delimiter(delimiter)
    );
    let records = io_utils::read_records(&args.input, delimiter, encoding)?;

    let data_rows = if args.headers {
        records.len().saturating_sub(1)
    } else {
        records.len()
    };
    session.ensure_rows(data_rows);

    let widest = records.iter().map(Vec::len).max().unwrap_or(0);
    if widest > session.grid().column_count() {
        warn!(
            "Input has {widest} column(s) but the grid defines {}; extra cells are dropped",
            session.grid().column_count()
        );
    }

    if args.headers {
        let outcome = session.paste_header_block(0, &records);
        debug!(
            "Header paste renamed {} column(s) and wrote {} cell(s)",
            outcome.renamed, outcome.written
        );
    } else {
        session.paste_block(0, 0, &records);
    }

    let summary = session.mapping_summary();
    if !summary.is_valid {
        let labels = summary
            .unmapped_columns
            .iter()
            .map(|column| column.label.as_str())
            .collect::<Vec<_>>();
        warn!("Required column(s) not mapped: {}", labels.join(", "));
    }

    let result = session.validation();
    let stats = result.stats();
    if args.json {
        let report = ValidationReport {
            title: session.title(),
            rows: session.grid().row_count(),
            mapping: summary,
            stats,
            errors: result.errors(),
        };
        let text =
            serde_json::to_string_pretty(&report).context("Serializing validation report")?;
        println!("{text}");
    } else if !result.is_valid() {
        table::error_table(result, session.destination()).print();
    }

    if stats.is_valid {
        info!(
            "'{}': {} row(s) passed validation",
            session.title(),
            session.grid().row_count()
        );
        Ok(())
    } else {
        bail!(
            "{} validation error(s) across {} row(s)",
            stats.total_errors,
            stats.rows_with_errors
        )
    }
}

fn handle_mapping(args: &cli::MappingArgs) -> Result<()> {
    let session = load_session(args.config.as_deref())?;
    let summary = session.mapping_summary();
    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("Serializing mapping summary")?;
        println!("{text}");
        return Ok(());
    }
    let mut table = table::TextTable::new(["Destination", "Required", "Source"]);
    for column in session.destination().columns() {
        let source = session
            .mapping()
            .source_for(&column.key)
            .and_then(|key| session.source_schema().column_by_key(key))
            .map(|source| format!("{} ({})", source.label, source.key))
            .unwrap_or_else(|| "-".to_string());
        table.push_row(vec![
            column.label.clone(),
            if column.optional { "no" } else { "yes" }.to_string(),
            source,
        ]);
    }
    table.print();
    println!(
        "{} of {} column(s) mapped; {} required column(s) unmapped",
        summary.mapped_columns,
        summary.total_dest_columns,
        summary.unmapped_columns.len()
    );
    Ok(())
}

fn handle_columns(args: &cli::ColumnsArgs) -> Result<()> {
    let session = load_session(args.config.as_deref())?;
    let table = if args.source {
        table::column_table(session.source_schema(), None)
    } else {
        table::column_table(session.destination(), Some(session.mapping()))
    };
    table.print();
    Ok(())
}

fn handle_init(args: &cli::InitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "{:?} already exists; pass --force to replace it",
            args.output
        );
    }
    SessionConfig::default()
        .save(&args.output)
        .with_context(|| format!("Writing session to {:?}", args.output))?;
    info!("Default session written to {:?}", args.output);
    Ok(())
}
