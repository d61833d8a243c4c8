//! Collaborator contracts the puzzle directory depends on.
//!
//! - `TabularStore` - the shared spreadsheet, addressed by A1 ranges and
//!   1-based physical row indices
//! - `DocumentService` - document creation inside a drive folder
//! - `ChannelService` - chat channel creation, lookup and relocation
//!
//! Production implementations live in `huntbot-google` and `huntbot-discord`;
//! `memory` holds in-process implementations used by tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::puzzle::{DocumentKind, Row};
use crate::errors::BackendError;

pub mod memory;
pub mod range;

pub use range::{A1Range, RangeParseError};

#[derive(Clone, Debug, PartialEq)]
pub struct RowUpdate {
    pub row_index: usize,
    pub row: Row,
}

#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn read_range(&self, range: &str) -> Result<Vec<Row>, BackendError>;
    async fn append_row(&self, range: &str, row: Row) -> Result<(), BackendError>;
    async fn update_row(&self, row_index: usize, row: Row) -> Result<(), BackendError>;
    async fn batch_update(&self, updates: Vec<RowUpdate>) -> Result<(), BackendError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedDocument {
    pub id: String,
    pub link: String,
}

#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn create_document(
        &self,
        name: &str,
        parent_folder_id: &str,
        kind: DocumentKind,
    ) -> Result<CreatedDocument, BackendError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<String>,
}

#[async_trait]
pub trait ChannelService: Send + Sync {
    async fn create_text_channel(
        &self,
        name: &str,
        parent_category_id: &str,
    ) -> Result<String, BackendError>;
    async fn get_channel(&self, channel_id: &str) -> Result<Channel, BackendError>;
    async fn move_channel(
        &self,
        channel_id: &str,
        parent_category_id: &str,
    ) -> Result<(), BackendError>;
    async fn find_channel_by_name(&self, name: &str) -> Result<Option<Channel>, BackendError>;
}
