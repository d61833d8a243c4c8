use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RangeParseError {
    #[error("range `{0}` must have the form `A:G`, `A2:G` or `Sheet!A1:G10`")]
    Malformed(String),
    #[error("range `{0}` ends before it starts")]
    Inverted(String),
}

/// An A1-notation range restricted to what the puzzle sheet uses: a column
/// span with optional row bounds and an optional sheet name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct A1Range {
    pub sheet: Option<String>,
    pub first_column: usize,
    pub last_column: usize,
    pub first_row: Option<usize>,
    pub last_row: Option<usize>,
}

impl A1Range {
    pub fn width(&self) -> usize {
        self.last_column - self.first_column + 1
    }

    /// The same column span narrowed to a single physical row.
    pub fn single_row(&self, row_index: usize) -> Self {
        Self { first_row: Some(row_index), last_row: Some(row_index), ..self.clone() }
    }

    /// The same rows narrowed to the first `width` columns of the span.
    pub fn leading_columns(&self, width: usize) -> Self {
        let last_column = self.first_column + width.max(1) - 1;
        Self { last_column: last_column.min(self.last_column), ..self.clone() }
    }
}

impl FromStr for A1Range {
    type Err = RangeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || RangeParseError::Malformed(value.to_owned());
        let trimmed = value.trim();

        let (sheet, cells) = match trimmed.rsplit_once('!') {
            Some((sheet, cells)) => {
                let sheet = sheet.trim_matches('\'');
                if sheet.is_empty() {
                    return Err(malformed());
                }
                (Some(sheet.to_owned()), cells)
            }
            None => (None, trimmed),
        };

        let (start, end) = cells.split_once(':').ok_or_else(malformed)?;
        let (first_column, first_row) = parse_cell(start).ok_or_else(malformed)?;
        let (last_column, last_row) = parse_cell(end).ok_or_else(malformed)?;

        if last_column < first_column {
            return Err(RangeParseError::Inverted(value.to_owned()));
        }
        if let (Some(first), Some(last)) = (first_row, last_row) {
            if last < first {
                return Err(RangeParseError::Inverted(value.to_owned()));
            }
        }

        Ok(Self { sheet, first_column, last_column, first_row, last_row })
    }
}

impl fmt::Display for A1Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            if sheet.contains(' ') {
                write!(f, "'{sheet}'!")?;
            } else {
                write!(f, "{sheet}!")?;
            }
        }
        write!(f, "{}", column_letters(self.first_column))?;
        if let Some(row) = self.first_row {
            write!(f, "{row}")?;
        }
        write!(f, ":{}", column_letters(self.last_column))?;
        if let Some(row) = self.last_row {
            write!(f, "{row}")?;
        }
        Ok(())
    }
}

fn parse_cell(cell: &str) -> Option<(usize, Option<usize>)> {
    let cell = cell.trim();
    let split = cell.find(|ch: char| !ch.is_ascii_alphabetic()).unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() {
        return None;
    }

    let column = letters
        .chars()
        .try_fold(0usize, |acc, ch| {
            acc.checked_mul(26)?.checked_add((ch.to_ascii_uppercase() as u8 - b'A') as usize + 1)
        })?
        - 1;

    let row = if digits.is_empty() {
        None
    } else {
        match digits.parse::<usize>() {
            Ok(0) | Err(_) => return None,
            Ok(row) => Some(row),
        }
    };

    Some((column, row))
}

/// Converts a zero-based column index to its letter form (`0` is `A`).
pub fn column_letters(index: usize) -> String {
    let mut remaining = index + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        let offset = (remaining - 1) % 26;
        letters.push((b'A' + offset as u8) as char);
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}
