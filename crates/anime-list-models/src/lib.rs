pub mod catalog;
pub mod gallery_image;
pub mod list_item;
pub mod media;
pub mod timestamp;
pub mod user;
pub mod user_list;

pub use catalog::{CatalogMedia, CharacterEdge, CoverImage, MediaSummary, MediaTag, MediaTitle};
pub use gallery_image::GalleryImage;
pub use list_item::{ListItem, ListTitle};
pub use media::{FuzzyDate, MediaStatus, Season};
pub use user::UserId;
pub use user_list::UserList;
