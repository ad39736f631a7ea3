//! Reading molecules from delimited SMILES text.
//!
//! Each non-blank line is one record. Column 0 holds the SMILES string and column 1 the name;
//! any further columns are ignored. There is no header line. Lines starting with `#` are
//! comments.

use std::iter::Enumerate;
use std::str::Lines;

use crate::chem::mol::Molecule;
use crate::chem::smiles::{parse_smiles, SmilesError};

/// A successfully parsed record.
#[derive(Debug, Clone)]
pub struct Record {
    /// One-based line number in the input.
    pub line: usize,
    pub molecule: Molecule,
}

impl Record {
    pub fn name(&self) -> &str {
        &self.molecule.name
    }
}

/// A record whose SMILES could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordError {
    pub line: usize,
    pub smiles: String,
    pub error: SmilesError,
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self { line, smiles, error } = self;
        write!(f, "could not parse SMILES {smiles:?} on line {line}: {error}")
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Iterates over the records in delimited SMILES text.
///
/// Every character of the delimiter separates fields and consecutive separators count as one,
/// so a delimiter of `" \t"` splits on any run of spaces and tabs. An empty delimiter splits on
/// whitespace.
pub struct SmilesSupplier<'s> {
    lines: Enumerate<Lines<'s>>,
    delimiter: String,
    index: usize,
}

impl<'s> SmilesSupplier<'s> {
    pub fn new(text: &'s str, delimiter: &str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            delimiter: delimiter.to_string(),
            index: 0,
        }
    }

    fn fields<'l>(&self, line: &'l str) -> Vec<&'l str> {
        if self.delimiter.is_empty() {
            return line.split_whitespace().collect();
        }
        line.split(|c| self.delimiter.contains(c)).filter(|field| !field.is_empty()).collect()
    }
}

impl Iterator for SmilesSupplier<'_> {
    type Item = Result<Record, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        for (ln, line) in self.lines.by_ref() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let ln = ln + 1;
            let index = self.index;
            self.index += 1;

            let fields = self.fields(line);
            let smiles = fields.first().copied().unwrap_or_default();
            let name = match fields.get(1) {
                Some(name) => name.to_string(),
                None => index.to_string(),
            };
            let record = match parse_smiles(smiles) {
                Ok(mut molecule) => {
                    molecule.name = name;
                    Ok(Record { line: ln, molecule })
                }
                Err(error) => Err(RecordError {
                    line: ln,
                    smiles: smiles.to_string(),
                    error,
                }),
            };
            return Some(record);
        }
        None
    }
}
