use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single cell as returned by the tabular store. Cells are loosely typed on
/// the wire (strings, numbers, booleans, or nothing at all).
pub type Cell = Value;

/// A physical sheet row. Trailing empty cells are routinely elided by the
/// store, so a row may be shorter than [`COLUMN_COUNT`].
pub type Row = Vec<Cell>;

/// Number of columns in the puzzle sheet layout.
pub const COLUMN_COUNT: usize = 7;

/// Fixed column positions. The round column was prepended when the layout
/// widened from six to seven columns; later columns keep their relative order.
pub mod column {
    pub const ROUND: usize = 0;
    pub const NAME: usize = 1;
    pub const ANSWER: usize = 2;
    pub const SHEET_LINK: usize = 3;
    pub const DOC_LINK: usize = 4;
    pub const CHANNEL_ID: usize = 5;
    pub const VOICE_CHANNEL_ID: usize = 6;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Sheet,
    Doc,
}

impl DocumentKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Sheet => "application/vnd.google-apps.spreadsheet",
            Self::Doc => "application/vnd.google-apps.document",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sheet => "sheet",
            Self::Doc => "doc",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleRecord {
    pub round: Option<String>,
    pub name: String,
    pub answer: Option<String>,
    pub sheet_link: Option<String>,
    pub doc_link: Option<String>,
    pub channel_id: Option<String>,
    pub voice_channel_id: Option<String>,
}

impl PuzzleRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn is_solved(&self) -> bool {
        self.answer.as_deref().is_some_and(|answer| !answer.is_empty())
    }

    pub fn is_bound(&self) -> bool {
        self.channel_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn document_link(&self, kind: DocumentKind) -> Option<&str> {
        match kind {
            DocumentKind::Sheet => self.sheet_link.as_deref(),
            DocumentKind::Doc => self.doc_link.as_deref(),
        }
    }

    pub fn set_document_link(&mut self, kind: DocumentKind, link: impl Into<String>) {
        let link = Some(link.into());
        match kind {
            DocumentKind::Sheet => self.sheet_link = link,
            DocumentKind::Doc => self.doc_link = link,
        }
    }
}

/// Decodes a row by fixed position. Missing trailing cells and empty cells
/// both decode to an unset field.
pub fn decode(row: &[Cell]) -> PuzzleRecord {
    let field = |index: usize| row.get(index).and_then(cell_text).filter(|text| !text.is_empty());

    PuzzleRecord {
        round: field(column::ROUND),
        name: field(column::NAME).unwrap_or_default(),
        answer: field(column::ANSWER),
        sheet_link: field(column::SHEET_LINK),
        doc_link: field(column::DOC_LINK),
        channel_id: field(column::CHANNEL_ID),
        voice_channel_id: field(column::VOICE_CHANNEL_ID),
    }
}

/// Encodes a record as a full-width row; the store overwrites whole rows, so
/// unset fields must still occupy their column.
pub fn encode(record: &PuzzleRecord) -> Row {
    let text = |value: Option<&str>| Value::String(value.unwrap_or_default().to_owned());

    vec![
        text(record.round.as_deref()),
        Value::String(record.name.clone()),
        text(record.answer.as_deref()),
        text(record.sheet_link.as_deref()),
        text(record.doc_link.as_deref()),
        text(record.channel_id.as_deref()),
        text(record.voice_channel_id.as_deref()),
    ]
}

/// Renders a cell as text. Nulls, arrays and objects have no text form.
pub fn cell_text(cell: &Cell) -> Option<String> {
    match cell {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Case-insensitive substring match against every cell of a row.
pub fn row_contains_ignore_case(row: &[Cell], query: &str) -> bool {
    let needle = query.to_lowercase();
    row.iter()
        .filter_map(cell_text)
        .any(|text| text.to_lowercase().contains(&needle))
}

/// Exact match of any cell against `value`.
pub fn row_contains_exact(row: &[Cell], value: &str) -> bool {
    row.iter().filter_map(cell_text).any(|text| text == value)
}
