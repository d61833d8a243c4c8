pub mod backend;
pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;

pub use backend::{
    A1Range, Channel, ChannelKind, ChannelService, CreatedDocument, DocumentService, RowUpdate,
    TabularStore,
};
pub use directory::{DirectoryLayout, NameCache, PuzzleDirectory, MAX_SUGGESTIONS};
pub use domain::answer::CanonicalAnswer;
pub use domain::puzzle::{DocumentKind, PuzzleRecord};
pub use errors::{BackendError, DirectoryError, InterfaceError};
