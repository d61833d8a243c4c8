use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::backend::RowUpdate;
use crate::domain::puzzle::{decode, encode, PuzzleRecord};
use crate::errors::{BackendError, DirectoryError};

use super::PuzzleDirectory;

impl PuzzleDirectory {
    /// Binds every named row that lacks a channel to a freshly created one.
    ///
    /// Channel creation runs concurrently, one task per row. Row updates are
    /// staged and flushed in a single batch only after every task succeeded;
    /// any failure abandons the run without writing to the sheet. Returns the
    /// newly bound records in row order.
    pub async fn bulk_import(&self) -> Result<Vec<PuzzleRecord>, DirectoryError> {
        let rows = self.scan(&self.layout.record_range).await?;
        let records =
            rows.iter().map(|row| (row.index, decode(&row.cells))).collect::<Vec<_>>();

        for (_, record) in &records {
            self.cache.record(record.round.as_deref(), &record.name).await;
        }

        let pending = records
            .into_iter()
            .filter(|(_, record)| record.is_valid() && !record.is_bound())
            .collect::<Vec<_>>();
        if pending.is_empty() {
            info!(
                event_name = "directory.import.noop",
                scanned = rows.len(),
                "bulk import found no unbound puzzles"
            );
            return Ok(Vec::new());
        }

        let mut tasks = JoinSet::new();
        for (row_index, record) in pending {
            let channels = Arc::clone(&self.channels);
            let category_id = self.layout.puzzle_category_id.clone();
            tasks.spawn(async move {
                let created = channels.create_text_channel(&record.name, &category_id).await;
                (row_index, record, created)
            });
        }

        let mut staged = Vec::new();
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((row_index, mut record, Ok(channel_id))) => {
                    record.channel_id = Some(channel_id);
                    staged.push((row_index, record));
                }
                Ok((_, record, Err(source))) => {
                    failure.get_or_insert(DirectoryError::PartialImportFailure {
                        puzzle: record.name,
                        source,
                    });
                }
                Err(join_error) => {
                    failure.get_or_insert(DirectoryError::PartialImportFailure {
                        puzzle: "<unknown>".to_owned(),
                        source: BackendError::Channels(join_error.to_string()),
                    });
                }
            }
        }

        if let Some(error) = failure {
            let orphaned = staged
                .iter()
                .filter_map(|(_, record)| record.channel_id.as_deref())
                .collect::<Vec<_>>()
                .join(",");
            warn!(
                event_name = "directory.import.abandoned",
                error = %error,
                orphaned_channels = %orphaned,
                "bulk import abandoned; channels created in this run were not recorded"
            );
            return Err(error);
        }

        staged.sort_by_key(|(row_index, _)| *row_index);
        let updates = staged
            .iter()
            .map(|(row_index, record)| RowUpdate { row_index: *row_index, row: encode(record) })
            .collect::<Vec<_>>();
        self.store.batch_update(updates).await?;

        info!(
            event_name = "directory.import.completed",
            scanned = rows.len(),
            imported = staged.len(),
            "bulk import bound new puzzles to channels"
        );
        Ok(staged.into_iter().map(|(_, record)| record).collect())
    }
}
