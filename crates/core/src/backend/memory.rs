use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::puzzle::{DocumentKind, Row};
use crate::errors::BackendError;

use super::{
    A1Range, Channel, ChannelKind, ChannelService, CreatedDocument, DocumentService, RowUpdate,
    TabularStore,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub reads: Vec<String>,
    pub appends: usize,
    pub row_updates: Vec<usize>,
    pub batch_updates: Vec<Vec<usize>>,
}

#[derive(Default)]
struct StoreState {
    rows: Vec<Row>,
    calls: StoreCalls,
    failure: Option<String>,
}

/// A sheet held in memory. Reads behave like the remote store: trailing empty
/// cells and trailing empty rows are elided.
#[derive(Default)]
pub struct InMemoryTabularStore {
    state: Mutex<StoreState>,
}

impl InMemoryTabularStore {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self { state: Mutex::new(StoreState { rows, ..StoreState::default() }) }
    }

    pub async fn rows(&self) -> Vec<Row> {
        self.state.lock().await.rows.clone()
    }

    pub async fn calls(&self) -> StoreCalls {
        self.state.lock().await.calls.clone()
    }

    pub async fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().await.failure = Some(message.into());
    }

    pub async fn recover(&self) {
        self.state.lock().await.failure = None;
    }
}

fn check_failure(failure: &Option<String>) -> Result<(), BackendError> {
    match failure {
        Some(message) => Err(BackendError::Store(message.clone())),
        None => Ok(()),
    }
}

fn is_blank(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn trim_trailing_blanks(mut row: Row) -> Row {
    while row.last().is_some_and(is_blank) {
        row.pop();
    }
    row
}

fn write_row(rows: &mut Vec<Row>, row_index: usize, row: Row) -> Result<(), BackendError> {
    if row_index == 0 {
        return Err(BackendError::Store("row indices start at 1".to_owned()));
    }
    if rows.len() < row_index {
        rows.resize(row_index, Vec::new());
    }
    rows[row_index - 1] = row;
    Ok(())
}

#[async_trait]
impl TabularStore for InMemoryTabularStore {
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, BackendError> {
        let mut state = self.state.lock().await;
        state.calls.reads.push(range.to_owned());
        check_failure(&state.failure)?;

        let range: A1Range =
            range.parse().map_err(|error| BackendError::Store(format!("{error}")))?;
        let first_row = range.first_row.unwrap_or(1);
        let last_row = range.last_row.unwrap_or(state.rows.len()).min(state.rows.len());

        let mut rows: Vec<Row> = (first_row..=last_row)
            .map(|index| {
                let row = &state.rows[index - 1];
                let cells = row
                    .iter()
                    .skip(range.first_column)
                    .take(range.width())
                    .cloned()
                    .collect::<Row>();
                trim_trailing_blanks(cells)
            })
            .collect();

        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }
        Ok(rows)
    }

    async fn append_row(&self, _range: &str, row: Row) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        check_failure(&state.failure)?;
        state.calls.appends += 1;

        while state.rows.last().is_some_and(|row| row.iter().all(is_blank)) {
            state.rows.pop();
        }
        state.rows.push(row);
        Ok(())
    }

    async fn update_row(&self, row_index: usize, row: Row) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        check_failure(&state.failure)?;
        state.calls.row_updates.push(row_index);
        write_row(&mut state.rows, row_index, row)
    }

    async fn batch_update(&self, updates: Vec<RowUpdate>) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        check_failure(&state.failure)?;
        state.calls.batch_updates.push(updates.iter().map(|update| update.row_index).collect());

        for update in updates {
            write_row(&mut state.rows, update.row_index, update.row)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRequest {
    pub name: String,
    pub parent_folder_id: String,
    pub kind: DocumentKind,
}

#[derive(Default)]
struct DocumentState {
    created: Vec<DocumentRequest>,
    failure: Option<String>,
}

#[derive(Default)]
pub struct InMemoryDocumentService {
    state: Mutex<DocumentState>,
}

impl InMemoryDocumentService {
    pub async fn created(&self) -> Vec<DocumentRequest> {
        self.state.lock().await.created.clone()
    }

    pub async fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().await.failure = Some(message.into());
    }
}

#[async_trait]
impl DocumentService for InMemoryDocumentService {
    async fn create_document(
        &self,
        name: &str,
        parent_folder_id: &str,
        kind: DocumentKind,
    ) -> Result<CreatedDocument, BackendError> {
        let mut state = self.state.lock().await;
        if let Some(message) = &state.failure {
            return Err(BackendError::Documents(message.clone()));
        }

        state.created.push(DocumentRequest {
            name: name.to_owned(),
            parent_folder_id: parent_folder_id.to_owned(),
            kind,
        });
        let id = format!("doc-{}", state.created.len());
        let path = match kind {
            DocumentKind::Sheet => "spreadsheets",
            DocumentKind::Doc => "document",
        };
        let link = format!("https://docs.google.com/{path}/d/{id}/edit");
        Ok(CreatedDocument { id, link })
    }
}

#[derive(Default)]
struct ChannelState {
    channels: BTreeMap<String, Channel>,
    created: Vec<String>,
    moves: Vec<(String, String)>,
    next_id: u64,
    failing_names: BTreeSet<String>,
    failure: Option<String>,
    move_failure: Option<String>,
}

/// Channels held in memory. Ids are sequential numeric strings, creation can be
/// made to fail for specific names, and moves can fail independently.
pub struct InMemoryChannelService {
    state: Mutex<ChannelState>,
}

impl Default for InMemoryChannelService {
    fn default() -> Self {
        Self { state: Mutex::new(ChannelState { next_id: 5_000, ..ChannelState::default() }) }
    }
}

impl InMemoryChannelService {
    pub async fn insert(&self, channel: Channel) {
        self.state.lock().await.channels.insert(channel.id.clone(), channel);
    }

    pub async fn channel(&self, channel_id: &str) -> Option<Channel> {
        self.state.lock().await.channels.get(channel_id).cloned()
    }

    /// Names passed to `create_text_channel`, in call order.
    pub async fn created(&self) -> Vec<String> {
        self.state.lock().await.created.clone()
    }

    pub async fn moves(&self) -> Vec<(String, String)> {
        self.state.lock().await.moves.clone()
    }

    pub async fn fail_creation_of(&self, name: impl Into<String>) {
        self.state.lock().await.failing_names.insert(name.into());
    }

    pub async fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().await.failure = Some(message.into());
    }

    pub async fn fail_moves_with(&self, message: impl Into<String>) {
        self.state.lock().await.move_failure = Some(message.into());
    }
}

#[async_trait]
impl ChannelService for InMemoryChannelService {
    async fn create_text_channel(
        &self,
        name: &str,
        parent_category_id: &str,
    ) -> Result<String, BackendError> {
        let mut state = self.state.lock().await;
        if let Some(message) = &state.failure {
            return Err(BackendError::Channels(message.clone()));
        }
        if state.failing_names.contains(name) {
            return Err(BackendError::Channels(format!("could not create channel `{name}`")));
        }

        state.next_id += 1;
        let id = state.next_id.to_string();
        state.created.push(name.to_owned());
        state.channels.insert(
            id.clone(),
            Channel {
                id: id.clone(),
                name: name.to_owned(),
                kind: ChannelKind::Text,
                parent_id: Some(parent_category_id.to_owned()),
            },
        );
        Ok(id)
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Channel, BackendError> {
        let state = self.state.lock().await;
        if let Some(message) = &state.failure {
            return Err(BackendError::Channels(message.clone()));
        }
        state
            .channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| BackendError::Channels(format!("unknown channel `{channel_id}`")))
    }

    async fn move_channel(
        &self,
        channel_id: &str,
        parent_category_id: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.move_failure.clone().or_else(|| state.failure.clone()) {
            return Err(BackendError::Channels(message));
        }

        let channel = state
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| BackendError::Channels(format!("unknown channel `{channel_id}`")))?;
        channel.parent_id = Some(parent_category_id.to_owned());
        state.moves.push((channel_id.to_owned(), parent_category_id.to_owned()));
        Ok(())
    }

    async fn find_channel_by_name(&self, name: &str) -> Result<Option<Channel>, BackendError> {
        let state = self.state.lock().await;
        if let Some(message) = &state.failure {
            return Err(BackendError::Channels(message.clone()));
        }
        Ok(state.channels.values().find(|channel| channel.name == name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{InMemoryChannelService, InMemoryDocumentService, InMemoryTabularStore};
    use crate::backend::{ChannelService, DocumentService, RowUpdate, TabularStore};
    use crate::domain::puzzle::DocumentKind;
    use crate::errors::BackendError;

    #[tokio::test]
    async fn reads_project_columns_and_elide_trailing_blanks() {
        let store = InMemoryTabularStore::with_rows(vec![
            vec![json!("Round"), json!("Name"), json!("Answer")],
            vec![json!("Act I"), json!("Alpha"), json!(""), json!("")],
            vec![],
            vec![json!(""), json!("")],
        ]);

        let rows = store.read_range("A:B").await.expect("read");
        assert_eq!(
            rows,
            vec![vec![json!("Round"), json!("Name")], vec![json!("Act I"), json!("Alpha")]]
        );

        let tail = store.read_range("A2:G").await.expect("read");
        assert_eq!(tail, vec![vec![json!("Act I"), json!("Alpha")]]);
    }

    #[tokio::test]
    async fn updates_and_appends_are_recorded() {
        let store = InMemoryTabularStore::with_rows(vec![vec![json!("header")]]);

        store.append_row("A:G", vec![json!(""), json!("Alpha")]).await.expect("append");
        store.update_row(2, vec![json!("Act I"), json!("Alpha")]).await.expect("update");
        store
            .batch_update(vec![RowUpdate { row_index: 3, row: vec![json!(""), json!("Beta")] }])
            .await
            .expect("batch");

        let calls = store.calls().await;
        assert_eq!(calls.appends, 1);
        assert_eq!(calls.row_updates, vec![2]);
        assert_eq!(calls.batch_updates, vec![vec![3]]);
        assert_eq!(store.rows().await.len(), 3);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_backend_errors() {
        let store = InMemoryTabularStore::default();
        store.fail_with("offline").await;
        assert!(matches!(store.read_range("A:G").await, Err(BackendError::Store(_))));

        let documents = InMemoryDocumentService::default();
        documents.fail_with("quota").await;
        assert!(matches!(
            documents.create_document("Alpha", "folder", DocumentKind::Doc).await,
            Err(BackendError::Documents(_))
        ));

        let channels = InMemoryChannelService::default();
        channels.fail_creation_of("alpha").await;
        assert!(channels.create_text_channel("alpha", "cat").await.is_err());
        assert!(channels.create_text_channel("beta", "cat").await.is_ok());
    }

    #[tokio::test]
    async fn channel_moves_change_parent() {
        let channels = InMemoryChannelService::default();
        let id = channels.create_text_channel("alpha", "open").await.expect("create");

        channels.move_channel(&id, "solved").await.expect("move");

        let channel = channels.get_channel(&id).await.expect("get");
        assert_eq!(channel.parent_id.as_deref(), Some("solved"));
        assert_eq!(channels.moves().await, vec![(id, "solved".to_owned())]);
    }
}
