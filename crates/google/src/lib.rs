//! Google Sheets and Drive adapters for the puzzle directory's tabular store
//! and document service.

mod client;
pub mod drive;
pub mod sheets;

pub use drive::GoogleDriveDocuments;
pub use sheets::GoogleSheetsStore;
