//! Line-protocol framing for engine replies
//!
//! A reply is either a single status line or a block bounded by a start
//! sentinel and an end sentinel, with one pipe-delimited record per line.
//! This module knows the framing rules but not what any record means.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

/// Prefix of an engine-reported failure line
pub const ERROR_PREFIX: &str = "ERROR";

/// Separator between the fields of one record
pub const FIELD_DELIMITER: char = '|';

/// Fatal decode failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("No output from engine")]
    EmptyResponse,

    #[error("{message}")]
    EngineError { message: String },

    #[error("Unexpected reply: expected {expected}, got {found:?}")]
    UnexpectedGrammar { expected: &'static str, found: String },
}

impl ProtocolError {
    pub fn engine(message: impl Into<String>) -> Self {
        Self::EngineError {
            message: message.into(),
        }
    }

    pub fn unexpected(expected: &'static str, found: impl Into<String>) -> Self {
        Self::UnexpectedGrammar {
            expected,
            found: found.into(),
        }
    }
}

/// Split raw reply text into lines
///
/// Surrounding blank space is dropped and `\r\n` endings are accepted. Blank
/// output is an error, never an empty result.
pub fn lines(raw: &str) -> Result<Vec<&str>, ProtocolError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::EmptyResponse);
    }
    Ok(trimmed.lines().map(str::trim_end).collect())
}

/// Fail with [`ProtocolError::EngineError`] when the line reports an engine error
pub fn check_engine_error(first_line: &str) -> Result<(), ProtocolError> {
    match strip_status(first_line, ERROR_PREFIX) {
        Some(message) => Err(ProtocolError::engine(message)),
        None => Ok(()),
    }
}

/// Strip a status token and its optional `:` from the start of a line
///
/// Returns `None` when the line does not start with the token.
pub fn strip_status<'a>(line: &'a str, token: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(token)?;
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    Some(rest.trim_start())
}

/// Sentinel layout of one block-shaped reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Accepted first lines that open the block
    pub start: &'static [&'static str],
    /// Lines that close the block; anything after them is ignored
    pub end: &'static [&'static str],
    /// First line that stands for a valid empty result
    pub empty: Option<&'static str>,
    /// Prefix of a closing line whose content the caller wants back
    pub terminator: Option<&'static str>,
    /// Lines inside the block that carry no record
    pub skip: &'static [&'static str],
}

/// Outcome of scanning a reply against a [`Block`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan<'a> {
    /// The empty sentinel was found
    Empty,
    Body {
        header: &'a str,
        /// Data lines with their 1-based line numbers
        rows: Vec<(usize, &'a str)>,
        /// The terminator line, when the block has one and it was reached
        terminator: Option<&'a str>,
    },
}

impl Block {
    pub const fn new(start: &'static [&'static str], end: &'static [&'static str]) -> Self {
        Self {
            start,
            end,
            empty: None,
            terminator: None,
            skip: &[],
        }
    }

    pub const fn with_empty(self, empty: &'static str) -> Self {
        Self {
            empty: Some(empty),
            ..self
        }
    }

    pub const fn with_terminator(self, prefix: &'static str) -> Self {
        Self {
            terminator: Some(prefix),
            ..self
        }
    }

    pub const fn skipping(self, skip: &'static [&'static str]) -> Self {
        Self { skip, ..self }
    }

    /// Name used in error messages
    pub fn name(&self) -> &'static str {
        self.start.first().copied().unwrap_or("block")
    }

    /// Locate the block's data lines
    ///
    /// A block without its end sentinel runs to the end of input.
    pub fn scan<'a>(&self, lines: &[&'a str]) -> Result<Scan<'a>, ProtocolError> {
        let Some((&header, rest)) = lines.split_first() else {
            return Err(ProtocolError::EmptyResponse);
        };

        if self.empty == Some(header) {
            return Ok(Scan::Empty);
        }
        if !self.start.contains(&header) {
            return Err(ProtocolError::unexpected(self.name(), header));
        }

        let mut rows = Vec::new();
        let mut terminator = None;

        for (index, &line) in rest.iter().enumerate() {
            if self.end.contains(&line) {
                break;
            }
            if let Some(prefix) = self.terminator {
                if line.starts_with(prefix) {
                    terminator = Some(line);
                    break;
                }
            }
            if line.trim().is_empty() || self.skip.contains(&line) {
                continue;
            }
            // header is line 1
            rows.push((index + 2, line));
        }

        Ok(Scan::Body {
            header,
            rows,
            terminator,
        })
    }
}

/// Why a record was skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    #[error("expected at least {expected} fields, found {found}")]
    MissingFields { expected: usize, found: usize },

    #[error("field `{field}` is not a valid value: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// A data line that could not be decoded
///
/// Non-fatal: the line is dropped and the rest of the block still decodes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Skipped record on line {line_number} ({reason}): {line}")]
pub struct MalformedRecord {
    pub line_number: usize,
    pub line: String,
    pub reason: Reason,
}

/// One pipe-delimited data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    line_number: usize,
    line: &'a str,
    fields: Vec<&'a str>,
}

impl<'a> Record<'a> {
    /// Split a line into fields, requiring at least `min_fields`
    pub fn split(line_number: usize, line: &'a str, min_fields: usize) -> Result<Self, MalformedRecord> {
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();
        let record = Self {
            line_number,
            line,
            fields,
        };
        if record.fields.len() < min_fields {
            let found = record.fields.len();
            return Err(record.malformed(Reason::MissingFields {
                expected: min_fields,
                found,
            }));
        }
        Ok(record)
    }

    /// Text of a field, or the empty string past the end of the record
    pub fn text(&self, index: usize) -> &'a str {
        self.fields.get(index).copied().unwrap_or("")
    }

    /// Parse a required field
    pub fn parse<T: FromStr>(&self, index: usize, field: &'static str) -> Result<T, MalformedRecord> {
        let value = self.text(index);
        value
            .parse()
            .map_err(|_| self.invalid(field, value))
    }

    /// Parse a trailing field that the engine may leave out or leave blank
    pub fn parse_optional<T: FromStr>(
        &self,
        index: usize,
        field: &'static str,
    ) -> Result<Option<T>, MalformedRecord> {
        match self.text(index) {
            "" => Ok(None),
            _ => self.parse(index, field).map(Some),
        }
    }

    /// Build the error for a field that parsed but failed a range check
    pub fn invalid(&self, field: &'static str, value: impl fmt::Display) -> MalformedRecord {
        self.malformed(Reason::InvalidValue {
            field,
            value: value.to_string(),
        })
    }

    fn malformed(&self, reason: Reason) -> MalformedRecord {
        MalformedRecord {
            line_number: self.line_number,
            line: self.line.to_string(),
            reason,
        }
    }
}

/// Keep decoded records, logging and dropping the malformed ones
pub fn keep_valid<T>(records: impl IntoIterator<Item = Result<T, MalformedRecord>>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| match record {
            Ok(value) => Some(value),
            Err(skipped) => {
                warn!(line = skipped.line_number, "{}", skipped);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: Block = Block::new(&["ALL_PRODUCTS"], &["PRODUCTS_END"]);
    const SEARCH: Block = Block::new(&["SEARCH_RESULTS", "CATEGORY_SEARCH_RESULTS"], &["SEARCH_END", "CATEGORY_SEARCH_END"])
        .with_empty("NO_RESULTS");
    const CART: Block = Block::new(&["CART_START"], &[])
        .with_empty("CART_EMPTY")
        .with_terminator("TOTAL:")
        .skipping(&["CART_END"]);

    #[test]
    fn test_lines_rejects_blank_output() {
        assert_eq!(lines(""), Err(ProtocolError::EmptyResponse));
        assert_eq!(lines("  \n\n"), Err(ProtocolError::EmptyResponse));
    }

    #[test]
    fn test_lines_strips_crlf_and_surrounding_blank_lines() {
        let got = lines("\nALL_PRODUCTS\r\nA|1|2|x\r\nPRODUCTS_END\r\n").unwrap();
        assert_eq!(got, vec!["ALL_PRODUCTS", "A|1|2|x", "PRODUCTS_END"]);
    }

    #[test]
    fn test_engine_error_prefix_is_stripped() {
        assert_eq!(
            check_engine_error("ERROR: Product not found"),
            Err(ProtocolError::engine("Product not found"))
        );
        assert_eq!(check_engine_error("ERROR"), Err(ProtocolError::engine("")));
        assert!(check_engine_error("SUCCESS: Added").is_ok());
    }

    #[test]
    fn test_strip_status() {
        assert_eq!(strip_status("SUCCESS: added", "SUCCESS"), Some("added"));
        assert_eq!(strip_status("SUCCESS", "SUCCESS"), Some(""));
        assert_eq!(strip_status("TOTAL_PAID: 12.5", "TOTAL_PAID"), Some("12.5"));
        assert_eq!(strip_status("FAILED", "SUCCESS"), None);
    }

    #[test]
    fn test_scan_stops_at_end_sentinel() {
        let input = ["ALL_PRODUCTS", "A|1|2|x", "PRODUCTS_END", "trailing|1|2|x"];
        let scan = LIST.scan(&input).unwrap();
        assert_eq!(
            scan,
            Scan::Body {
                header: "ALL_PRODUCTS",
                rows: vec![(2, "A|1|2|x")],
                terminator: None,
            }
        );
    }

    #[test]
    fn test_scan_without_end_sentinel_runs_to_end() {
        let input = ["ALL_PRODUCTS", "A|1|2|x", "B|1|2|x"];
        match LIST.scan(&input).unwrap() {
            Scan::Body { rows, .. } => assert_eq!(rows.len(), 2),
            Scan::Empty => panic!("expected body"),
        }
    }

    #[test]
    fn test_scan_empty_sentinel() {
        assert_eq!(SEARCH.scan(&["NO_RESULTS"]).unwrap(), Scan::Empty);
    }

    #[test]
    fn test_scan_accepts_alternate_start_sentinel() {
        let input = ["CATEGORY_SEARCH_RESULTS", "A|1|2|x", "CATEGORY_SEARCH_END"];
        assert!(matches!(SEARCH.scan(&input).unwrap(), Scan::Body { header: "CATEGORY_SEARCH_RESULTS", .. }));
    }

    #[test]
    fn test_scan_unexpected_first_line() {
        let err = LIST.scan(&["WHATEVER"]).unwrap_err();
        assert_eq!(err, ProtocolError::unexpected("ALL_PRODUCTS", "WHATEVER"));
    }

    #[test]
    fn test_scan_terminator_and_skipped_lines() {
        let input = ["CART_START", "Widget|2|9.99|19.98", "CART_END", "TOTAL: 19.98", "junk"];
        let scan = CART.scan(&input).unwrap();
        assert_eq!(
            scan,
            Scan::Body {
                header: "CART_START",
                rows: vec![(2, "Widget|2|9.99|19.98")],
                terminator: Some("TOTAL: 19.98"),
            }
        );
    }

    #[test]
    fn test_record_split_requires_min_fields() {
        let err = Record::split(3, "Widget|9.99", 4).unwrap_err();
        assert_eq!(err.line_number, 3);
        assert_eq!(err.reason, Reason::MissingFields { expected: 4, found: 2 });
    }

    #[test]
    fn test_record_field_parsing() {
        let record = Record::split(2, "Widget| 9.99 |7|Tools", 4).unwrap();
        assert_eq!(record.text(0), "Widget");
        assert_eq!(record.parse::<f64>(1, "price").unwrap(), 9.99);
        assert_eq!(record.parse::<u32>(2, "stock").unwrap(), 7);
        assert_eq!(record.parse_optional::<f64>(4, "rating").unwrap(), None);

        let err = record.parse::<u32>(3, "stock").unwrap_err();
        assert_eq!(
            err.reason,
            Reason::InvalidValue {
                field: "stock",
                value: "Tools".to_string()
            }
        );
    }

    #[test]
    fn test_keep_valid_drops_failures() {
        let records = vec![
            Ok(1),
            Err(Record::split(2, "x", 2).unwrap_err()),
            Ok(3),
        ];
        assert_eq!(keep_valid(records), vec![1, 3]);
    }
}
