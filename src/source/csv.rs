//! CSV parsing into header-keyed rows.

use crate::error::{Result, WorklogError};
use crate::model::SourceRow;
use csv::{ReaderBuilder, Trim};
use std::iter;

/// Parse CSV text with a header row.
///
/// Quoted fields may contain the delimiter, doubled quotes and newlines.
/// Empty lines are skipped, cells are trimmed, and short rows are padded
/// with empty values. `SourceRow::line` is the physical line the record
/// starts on.
///
/// # Errors
///
/// Returns `CsvParse` if the reader rejects a record.
pub fn parse_csv(content: &str, delimiter: u8) -> Result<Vec<SourceRow>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let header: Vec<String> = reader
        .headers()
        .map_err(parse_error)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut lines = LineCounter::new(content);
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(parse_error)?;
        let line = record
            .position()
            .map_or(0, |pos| lines.line_at(usize::try_from(pos.byte()).unwrap_or(usize::MAX)));

        let cells = header
            .iter()
            .cloned()
            .zip(
                record
                    .iter()
                    .map(str::to_string)
                    .chain(iter::repeat_with(String::new)),
            )
            .collect();
        rows.push(SourceRow::new(line, cells));
    }
    Ok(rows)
}

fn parse_error(err: csv::Error) -> WorklogError {
    let line = err
        .position()
        .map_or(0, |pos| usize::try_from(pos.line()).unwrap_or(usize::MAX));
    WorklogError::CsvParse {
        line,
        reason: err.to_string(),
    }
}

/// Maps record byte offsets to 1-based line numbers.
///
/// A record position may sit on the terminators of preceding empty lines;
/// those are skipped so the line is the one holding the record's first byte.
struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    const fn new(content: &'a str) -> Self {
        Self {
            bytes: content.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, byte: usize) -> usize {
        let mut start = byte.min(self.bytes.len());
        while matches!(self.bytes.get(start), Some(b'\r' | b'\n')) {
            start += 1;
        }
        if start >= self.offset {
            self.line += self.bytes[self.offset..start]
                .iter()
                .filter(|b| **b == b'\n')
                .count();
            self.offset = start;
        }
        self.line
    }
}
