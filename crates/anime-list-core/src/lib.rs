pub mod error;
pub mod gallery;
pub mod list_store;
pub mod list_view;

pub use error::{GalleryError, ListError};
pub use gallery::GalleryService;
pub use list_store::{list_path, ListState, ListStore, Mutation, SyncPhase};
pub use list_view::{status_counts, ListQuery, SortOrder, StatusFilter};
