pub mod client;
pub mod types;

pub use client::MalClient;
pub use types::{MalAnime, MalPicture, SeasonalPage};
