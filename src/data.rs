//! Typed interpretation of cell text.
//!
//! The grid stores every cell as a string. This module turns that text into
//! numbers and dates when a column's declared type asks for it, and renders
//! values back for display.
//!
//! Date formats use the familiar `yyyy/MM/dd` token style and are compiled
//! once into a chrono format string by [`DateFormat::compile`].

use std::sync::OnceLock;

use chrono::NaiveDate;
use log::warn;
use regex::Regex;

use crate::{
    error::DateFormatError,
    schema::{ColumnDefinition, ColumnType},
};

static DECIMAL_GRAMMAR: OnceLock<Regex> = OnceLock::new();

fn decimal_grammar() -> &'static Regex {
    DECIMAL_GRAMMAR.get_or_init(|| {
        Regex::new(r"^-?[0-9]*\.?[0-9]+$").expect("decimal grammar pattern compiles")
    })
}

/// Outcome of reading a cell as a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberCheck {
    Valid(f64),
    /// Numeric, but not written in plain decimal notation (`1e3`, `+5`, `5.`).
    NotDecimal,
    NotNumber,
}

pub fn check_number(value: &str) -> NumberCheck {
    let trimmed = value.trim();
    if decimal_grammar().is_match(trimmed) {
        // Digit runs past f64 range parse to infinity and still count as numbers.
        return trimmed
            .parse::<f64>()
            .map_or(NumberCheck::NotNumber, NumberCheck::Valid);
    }
    match trimmed.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => NumberCheck::NotDecimal,
        _ => NumberCheck::NotNumber,
    }
}

pub fn parse_decimal(value: &str) -> Option<f64> {
    match check_number(value) {
        NumberCheck::Valid(parsed) => Some(parsed),
        _ => None,
    }
}

/// A compiled `yyyy/MM/dd`-style date format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
    chrono_format: String,
}

impl DateFormat {
    pub fn compile(pattern: &str) -> Result<Self, DateFormatError> {
        if pattern.trim().is_empty() {
            return Err(DateFormatError::Empty);
        }
        let mut chrono_format = String::with_capacity(pattern.len() * 2);
        let (mut has_year, mut has_month, mut has_day) = (false, false, false);
        let chars: Vec<char> = pattern.chars().collect();
        let mut idx = 0;
        while idx < chars.len() {
            let ch = chars[idx];
            if ch == '\'' {
                idx += 1;
                if chars.get(idx) == Some(&'\'') {
                    chrono_format.push('\'');
                    idx += 1;
                    continue;
                }
                let mut closed = false;
                while idx < chars.len() {
                    if chars[idx] == '\'' {
                        if chars.get(idx + 1) == Some(&'\'') {
                            chrono_format.push('\'');
                            idx += 2;
                            continue;
                        }
                        closed = true;
                        idx += 1;
                        break;
                    }
                    push_literal(&mut chrono_format, chars[idx]);
                    idx += 1;
                }
                if !closed {
                    return Err(DateFormatError::UnterminatedLiteral {
                        format: pattern.to_string(),
                    });
                }
                continue;
            }
            if !ch.is_ascii_alphabetic() {
                push_literal(&mut chrono_format, ch);
                idx += 1;
                continue;
            }
            let run = chars[idx..].iter().take_while(|c| **c == ch).count();
            let token: String = std::iter::repeat_n(ch, run).collect();
            let translated = match (ch, run) {
                ('y', 1 | 4) => {
                    has_year = true;
                    "%Y"
                }
                ('y', 2) => {
                    has_year = true;
                    "%y"
                }
                ('M', 1 | 2) => {
                    has_month = true;
                    "%m"
                }
                ('M', 3) => {
                    has_month = true;
                    "%b"
                }
                ('M', 4) => {
                    has_month = true;
                    "%B"
                }
                ('d', 1 | 2) => {
                    has_day = true;
                    "%d"
                }
                _ => {
                    return Err(DateFormatError::UnsupportedToken {
                        token,
                        format: pattern.to_string(),
                    });
                }
            };
            chrono_format.push_str(translated);
            idx += run;
        }
        for (present, part) in [(has_year, "year"), (has_month, "month"), (has_day, "day")] {
            if !present {
                return Err(DateFormatError::MissingPart {
                    part,
                    format: pattern.to_string(),
                });
            }
        }
        Ok(Self {
            pattern: pattern.to_string(),
            chrono_format,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parses `value` as a calendar date; rejects impossible dates such as
    /// month 13 or February 30.
    pub fn parse(&self, value: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(value.trim(), &self.chrono_format).ok()
    }

    pub fn format(&self, date: NaiveDate) -> String {
        date.format(&self.chrono_format).to_string()
    }
}

fn push_literal(target: &mut String, ch: char) {
    if ch == '%' {
        target.push_str("%%");
    } else {
        target.push(ch);
    }
}

/// Display rendering for a cell. Numbers are shown canonically and dates are
/// re-rendered in the column's format; anything unparsable is shown as typed.
pub fn format_cell_value(value: &str, column: &ColumnDefinition) -> String {
    if value.trim().is_empty() {
        return String::new();
    }
    match column.column_type {
        Some(ColumnType::Number) => match parse_decimal(value) {
            Some(parsed) => format_number(parsed),
            None => value.to_string(),
        },
        Some(ColumnType::Date) => {
            let pattern = column.validation.date_format();
            match DateFormat::compile(pattern) {
                Ok(format) => format
                    .parse(value)
                    .map(|date| format.format(date))
                    .unwrap_or_else(|| value.to_string()),
                Err(err) => {
                    warn!("Column '{}': {err}", column.key);
                    value.to_string()
                }
            }
        }
        _ => value.to_string(),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}
