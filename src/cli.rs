use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Validate tabular data against a typed destination schema",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a delimited file into a session grid and report validation errors
    Validate(ValidateArgs),
    /// Show how destination columns are mapped to source columns
    Mapping(MappingArgs),
    /// List the columns defined by a session file
    Columns(ColumnsArgs),
    /// Write the built-in default session to a YAML file
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Session file describing schemas and mapping (defaults to the built-in session)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Input file to paste into the grid ('-' reads stdin)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Field delimiter (supports ',', 'tab', ';', '|'); inferred from the extension otherwise
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Treat the first input row as column labels and paste it into the header row
    #[arg(long)]
    pub headers: bool,
    /// Emit the validation report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MappingArgs {
    /// Session file describing schemas and mapping
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Emit the mapping summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Session file describing schemas and mapping
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// List source grid columns instead of destination columns
    #[arg(long)]
    pub source: bool,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Destination YAML file
    #[arg(short, long)]
    pub output: PathBuf,
    /// Replace the file if it already exists
    #[arg(long)]
    pub force: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
