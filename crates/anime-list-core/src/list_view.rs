//! Filtering and ordering of the mirrored list for display.

use anime_list_models::{ListItem, MediaStatus};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest additions first
    #[default]
    RecentlyAdded,
    TitleAsc,
    TitleDesc,
    /// Latest start date first; undated entries last
    ReleaseDate,
}

impl SortOrder {
    pub const ALL: [SortOrder; 4] = [
        SortOrder::RecentlyAdded,
        SortOrder::TitleAsc,
        SortOrder::TitleDesc,
        SortOrder::ReleaseDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::RecentlyAdded => "recently-added",
            SortOrder::TitleAsc => "title-asc",
            SortOrder::TitleDesc => "title-desc",
            SortOrder::ReleaseDate => "release-date",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == s.to_lowercase())
            .ok_or_else(|| {
                format!(
                    "Invalid sort order: {} (expected one of recently-added, title-asc, title-desc, release-date)",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(MediaStatus),
}

impl StatusFilter {
    fn matches(&self, status: MediaStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Case-insensitive substring of the romaji or English title
    pub text: Option<String>,
    pub status: StatusFilter,
    pub sort: SortOrder,
}

impl ListQuery {
    pub fn matches(&self, item: &ListItem) -> bool {
        if !self.status.matches(item.status) {
            return false;
        }
        match self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            None => true,
            Some(text) => {
                let needle = text.to_lowercase();
                item.title.romaji.to_lowercase().contains(&needle)
                    || item
                        .title
                        .english
                        .as_deref()
                        .map_or(false, |english| english.to_lowercase().contains(&needle))
            }
        }
    }

    pub fn apply<'a>(&self, items: &'a [ListItem]) -> Vec<&'a ListItem> {
        let mut selected: Vec<&ListItem> = items.iter().filter(|item| self.matches(item)).collect();
        match self.sort {
            SortOrder::RecentlyAdded => selected.sort_by(|a, b| b.added_at.cmp(&a.added_at)),
            SortOrder::TitleAsc => selected.sort_by(|a, b| compare_titles(a, b)),
            SortOrder::TitleDesc => selected.sort_by(|a, b| compare_titles(b, a)),
            SortOrder::ReleaseDate => selected.sort_by(|a, b| {
                let start_a = a.start_date.and_then(|d| d.to_naive_date());
                let start_b = b.start_date.and_then(|d| d.to_naive_date());
                // `None` orders below any date, so reversing puts undated entries last
                start_b.cmp(&start_a)
            }),
        }
        selected
    }
}

fn compare_titles(a: &ListItem, b: &ListItem) -> Ordering {
    a.title
        .romaji
        .to_lowercase()
        .cmp(&b.title.romaji.to_lowercase())
        .then_with(|| a.title.romaji.cmp(&b.title.romaji))
}

/// Number of items per status, in display order, skipping empty buckets
pub fn status_counts(items: &[ListItem]) -> Vec<(MediaStatus, usize)> {
    MediaStatus::ALL
        .into_iter()
        .chain(std::iter::once(MediaStatus::Unknown))
        .map(|status| (status, items.iter().filter(|item| item.status == status).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
}
