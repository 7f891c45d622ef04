//! Reading delimited input for the command line.
//!
//! Input is decoded with `encoding_rs` (UTF-8 unless told otherwise) and
//! split with the `csv` crate. Records may have different lengths; the grid
//! paste clips whatever does not fit. `-` reads standard input.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::paste::CellBlock;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

/// `.tsv` and `.tab` files default to tabs, everything else to commas.
pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab") => {
            DEFAULT_TSV_DELIMITER
        }
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        return Ok(Box::new(std::io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    Ok(Box::new(BufReader::new(file)))
}

pub fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// Parses delimited text into rows of cells. The first row is returned
/// like any other; callers decide whether it carries labels.
pub fn parse_records<R>(reader: R, delimiter: u8, encoding: &'static Encoding) -> Result<CellBlock>
where
    R: Read,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("Reading record {}", rows.len() + 1))?
    {
        let cells = record
            .iter()
            .map(|field| decode_field(field, encoding))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Decoding record {}", rows.len() + 1))?;
        rows.push(cells);
    }
    Ok(rows)
}

pub fn read_records(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<CellBlock> {
    let reader = open_input(path)?;
    parse_records(reader, delimiter, encoding).with_context(|| format!("Parsing {path:?}"))
}
