//! Puzzle Directory - the shared puzzle sheet treated as a small database.
//!
//! Every lookup re-reads the authoritative range: humans edit the sheet
//! out-of-band, so row positions are rediscovered by linear scan before each
//! write. The only local state is the round/name [`NameCache`] used for
//! suggestions.
//!
//! When several rows match a lookup, the lowest row index wins.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{A1Range, ChannelService, DocumentService, TabularStore};
use crate::domain::answer::CanonicalAnswer;
use crate::domain::puzzle::{
    cell_text, column, decode, encode, row_contains_exact, row_contains_ignore_case,
    DocumentKind, PuzzleRecord, Row,
};
use crate::errors::DirectoryError;

pub mod cache;
mod import;

pub use cache::{NameCache, MAX_SUGGESTIONS};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryLayout {
    pub record_range: A1Range,
    pub header_rows: usize,
    pub puzzle_category_id: String,
    pub solved_category_id: String,
    pub hunt_folder_id: String,
}

impl DirectoryLayout {
    pub fn new(
        record_range: A1Range,
        puzzle_category_id: impl Into<String>,
        solved_category_id: impl Into<String>,
        hunt_folder_id: impl Into<String>,
    ) -> Self {
        Self {
            record_range,
            header_rows: 1,
            puzzle_category_id: puzzle_category_id.into(),
            solved_category_id: solved_category_id.into(),
            hunt_folder_id: hunt_folder_id.into(),
        }
    }

    /// Round and name columns only.
    pub fn name_range(&self) -> A1Range {
        self.record_range.leading_columns(column::NAME + 1)
    }

    fn first_row(&self) -> usize {
        self.record_range.first_row.unwrap_or(1)
    }
}

#[derive(Clone, Debug, PartialEq)]
struct SheetRow {
    index: usize,
    cells: Row,
}

pub struct PuzzleDirectory {
    store: Arc<dyn TabularStore>,
    documents: Arc<dyn DocumentService>,
    channels: Arc<dyn ChannelService>,
    layout: DirectoryLayout,
    cache: NameCache,
}

impl PuzzleDirectory {
    pub fn new(
        store: Arc<dyn TabularStore>,
        documents: Arc<dyn DocumentService>,
        channels: Arc<dyn ChannelService>,
        layout: DirectoryLayout,
    ) -> Self {
        Self { store, documents, channels, layout, cache: NameCache::default() }
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    pub fn channels(&self) -> &Arc<dyn ChannelService> {
        &self.channels
    }

    /// Every record with some cell containing `query`, ignoring case, in row
    /// order. An empty query matches every row that has a text cell.
    pub async fn find_by_name(&self, query: &str) -> Result<Vec<PuzzleRecord>, DirectoryError> {
        let rows = self.scan(&self.layout.record_range).await?;
        Ok(rows
            .iter()
            .filter(|row| row_contains_ignore_case(&row.cells, query))
            .map(|row| decode(&row.cells))
            .collect())
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<PuzzleRecord>, DirectoryError> {
        let rows = self.scan(&self.layout.record_range).await?;
        Ok(rows
            .iter()
            .find(|row| row_contains_ignore_case(&row.cells, name))
            .map(|row| decode(&row.cells)))
    }

    pub async fn get_by_channel_id(
        &self,
        channel_id: &str,
    ) -> Result<Option<PuzzleRecord>, DirectoryError> {
        Ok(self.locate_by_channel(channel_id).await?.map(|(_, record)| record))
    }

    /// Registers a puzzle and provisions its text channel. A puzzle whose name
    /// already exists (ignoring case) is returned as-is.
    pub async fn create(
        &self,
        name: &str,
        round: Option<&str>,
    ) -> Result<PuzzleRecord, DirectoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DirectoryError::EmptyName);
        }
        let round = round.map(str::trim).filter(|round| !round.is_empty());

        let rows = self.scan(&self.layout.record_range).await?;
        let lowered = name.to_lowercase();
        if let Some(existing) = rows
            .iter()
            .map(|row| decode(&row.cells))
            .find(|record| record.name.trim().to_lowercase() == lowered)
        {
            debug!(
                event_name = "directory.puzzle.exists",
                puzzle = %existing.name,
                "puzzle already registered; returning existing record"
            );
            self.cache.record(existing.round.as_deref(), &existing.name).await;
            return Ok(existing);
        }

        let channel_id =
            self.channels.create_text_channel(name, &self.layout.puzzle_category_id).await?;
        let record = PuzzleRecord {
            round: round.map(str::to_owned),
            channel_id: Some(channel_id),
            ..PuzzleRecord::new(name)
        };

        self.store.append_row(&self.layout.record_range.to_string(), encode(&record)).await?;
        self.cache.record(record.round.as_deref(), &record.name).await;

        info!(
            event_name = "directory.puzzle.created",
            puzzle = %record.name,
            round = record.round.as_deref().unwrap_or(""),
            channel_id = record.channel_id.as_deref().unwrap_or(""),
            "puzzle registered"
        );
        Ok(record)
    }

    /// Creates the sheet or doc for the puzzle bound to `channel_id`, unless it
    /// already has one.
    pub async fn attach_document(
        &self,
        kind: DocumentKind,
        channel_id: &str,
    ) -> Result<Option<PuzzleRecord>, DirectoryError> {
        let Some((row_index, mut record)) = self.locate_by_channel(channel_id).await? else {
            return Ok(None);
        };
        if record.document_link(kind).is_some() {
            return Ok(Some(record));
        }

        let document =
            self.documents.create_document(&record.name, &self.layout.hunt_folder_id, kind).await?;
        record.set_document_link(kind, document.link);
        self.store.update_row(row_index, encode(&record)).await?;

        info!(
            event_name = "directory.document.attached",
            puzzle = %record.name,
            kind = kind.label(),
            document_id = %document.id,
            row_index,
            "document attached to puzzle"
        );
        Ok(Some(record))
    }

    pub async fn attach_voice_channel(
        &self,
        channel_id: &str,
        voice_channel_id: &str,
    ) -> Result<Option<PuzzleRecord>, DirectoryError> {
        let Some((row_index, mut record)) = self.locate_by_channel(channel_id).await? else {
            return Ok(None);
        };

        record.voice_channel_id = Some(voice_channel_id.to_owned());
        self.store.update_row(row_index, encode(&record)).await?;

        info!(
            event_name = "directory.voice.attached",
            puzzle = %record.name,
            voice_channel_id,
            row_index,
            "voice channel attached to puzzle"
        );
        Ok(Some(record))
    }

    /// Records the answer, then moves the channel to the solved category. The
    /// answer stays persisted when the move fails.
    pub async fn solve(
        &self,
        channel_id: &str,
        answer: &CanonicalAnswer,
    ) -> Result<Option<PuzzleRecord>, DirectoryError> {
        let Some((row_index, mut record)) = self.locate_by_channel(channel_id).await? else {
            return Ok(None);
        };

        record.answer = Some(answer.as_str().to_owned());
        self.store.update_row(row_index, encode(&record)).await?;

        info!(
            event_name = "directory.puzzle.solved",
            puzzle = %record.name,
            answer = %answer,
            row_index,
            "puzzle solved"
        );

        if let Err(error) =
            self.channels.move_channel(channel_id, &self.layout.solved_category_id).await
        {
            warn!(
                event_name = "directory.channel.move_failed",
                puzzle = %record.name,
                channel_id,
                error = %error,
                "answer recorded but channel could not be moved to the solved category"
            );
        }

        Ok(Some(record))
    }

    /// Replaces the caches from a scan of the round and name columns.
    pub async fn rebuild_caches(&self) -> Result<(), DirectoryError> {
        let rebuild = self.cache.begin_rebuild();
        let rows = self.scan(&self.layout.name_range()).await?;
        let text_at = |row: &SheetRow, index: usize| row.cells.get(index).and_then(cell_text);

        let rounds = rows.iter().filter_map(|row| text_at(row, column::ROUND)).collect::<Vec<_>>();
        let names = rows.iter().filter_map(|row| text_at(row, column::NAME)).collect::<Vec<_>>();
        rebuild.finish(rounds, names).await;

        let (round_count, name_count) = self.cache.counts().await;
        debug!(
            event_name = "directory.cache.rebuilt",
            rounds = round_count,
            puzzles = name_count,
            "round and puzzle name caches rebuilt"
        );
        Ok(())
    }

    pub async fn list_rounds(&self) -> Vec<String> {
        self.cache.rounds().await
    }

    pub async fn list_puzzle_names(&self) -> Vec<String> {
        self.cache.names().await
    }

    pub async fn suggest_rounds(&self, query: &str, limit: usize) -> Vec<String> {
        self.cache.suggest_rounds(query, limit).await
    }

    pub async fn suggest_puzzle_names(&self, query: &str, limit: usize) -> Vec<String> {
        self.cache.suggest_names(query, limit).await
    }

    /// Cached `(rounds, puzzles)` counts.
    pub async fn cache_counts(&self) -> (usize, usize) {
        self.cache.counts().await
    }

    /// Cheap reachability probe: reads the first row of the sheet.
    pub async fn probe(&self) -> Result<(), DirectoryError> {
        let header = self.layout.record_range.single_row(self.layout.first_row());
        self.store.read_range(&header.to_string()).await?;
        Ok(())
    }

    async fn locate_by_channel(
        &self,
        channel_id: &str,
    ) -> Result<Option<(usize, PuzzleRecord)>, DirectoryError> {
        let rows = self.scan(&self.layout.record_range).await?;
        Ok(rows
            .into_iter()
            .find(|row| row_contains_exact(&row.cells, channel_id))
            .map(|row| (row.index, decode(&row.cells))))
    }

    /// Reads `range` and pairs each data row with its 1-based physical index,
    /// dropping header rows.
    async fn scan(&self, range: &A1Range) -> Result<Vec<SheetRow>, DirectoryError> {
        let rows = self.store.read_range(&range.to_string()).await?;
        let first_row = range.first_row.unwrap_or(1);
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(offset, cells)| SheetRow { index: first_row + offset, cells })
            .filter(|row| row.index > self.layout.header_rows)
            .collect())
    }
}
