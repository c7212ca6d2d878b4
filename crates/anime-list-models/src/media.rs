use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a catalog entry as reported by AniList
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Finished,
    Releasing,
    NotYetReleased,
    Cancelled,
    Hiatus,
    #[serde(other)]
    Unknown,
}

impl MediaStatus {
    pub const ALL: [MediaStatus; 5] = [
        MediaStatus::Releasing,
        MediaStatus::Finished,
        MediaStatus::NotYetReleased,
        MediaStatus::Cancelled,
        MediaStatus::Hiatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Finished => "FINISHED",
            MediaStatus::Releasing => "RELEASING",
            MediaStatus::NotYetReleased => "NOT_YET_RELEASED",
            MediaStatus::Cancelled => "CANCELLED",
            MediaStatus::Hiatus => "HIATUS",
            MediaStatus::Unknown => "UNKNOWN",
        }
    }

    /// Human label used in list output
    pub fn label(&self) -> &'static str {
        match self {
            MediaStatus::Finished => "Finished",
            MediaStatus::Releasing => "Airing",
            MediaStatus::NotYetReleased => "Upcoming",
            MediaStatus::Cancelled => "Cancelled",
            MediaStatus::Hiatus => "Hiatus",
            MediaStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "FINISHED" => Ok(MediaStatus::Finished),
            "RELEASING" | "AIRING" => Ok(MediaStatus::Releasing),
            "NOT_YET_RELEASED" | "UPCOMING" => Ok(MediaStatus::NotYetReleased),
            "CANCELLED" => Ok(MediaStatus::Cancelled),
            "HIATUS" => Ok(MediaStatus::Hiatus),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

/// Broadcast season. AniList spells these in upper case, MyAnimeList in lower case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// Season containing the given calendar month (1 = January)
    pub fn for_month(month: u32) -> Self {
        match month {
            1..=3 => Season::Winter,
            4..=6 => Season::Spring,
            7..=9 => Season::Summer,
            _ => Season::Fall,
        }
    }

    pub fn for_date(date: impl Datelike) -> (i32, Self) {
        (date.year(), Self::for_month(date.month()))
    }

    /// Path segment used by the MyAnimeList seasonal endpoint
    pub fn as_mal_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mal_str())
    }
}

/// Partially known calendar date (AniList `FuzzyDate`)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FuzzyDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl FuzzyDate {
    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none()
    }

    /// Resolve to a concrete date. Requires a year; a missing month or day counts as the first.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        let year = self.year?;
        NaiveDate::from_ymd_opt(year, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }
}

impl fmt::Display for FuzzyDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.year, self.month, self.day) {
            (Some(y), Some(m), Some(d)) => write!(f, "{:04}-{:02}-{:02}", y, m, d),
            (Some(y), Some(m), None) => write!(f, "{:04}-{:02}", y, m),
            (Some(y), None, _) => write!(f, "{:04}", y),
            _ => f.write_str("?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_for_month() {
        assert_eq!(Season::for_month(1), Season::Winter);
        assert_eq!(Season::for_month(3), Season::Winter);
        assert_eq!(Season::for_month(4), Season::Spring);
        assert_eq!(Season::for_month(8), Season::Summer);
        assert_eq!(Season::for_month(10), Season::Fall);
        assert_eq!(Season::for_month(12), Season::Fall);
    }

    #[test]
    fn test_season_for_date() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();
        assert_eq!(Season::for_date(date), (2025, Season::Summer));
    }

    #[test]
    fn test_media_status_wire_format() {
        let status: MediaStatus = serde_json::from_str("\"NOT_YET_RELEASED\"").unwrap();
        assert_eq!(status, MediaStatus::NotYetReleased);
        assert_eq!(serde_json::to_string(&MediaStatus::Releasing).unwrap(), "\"RELEASING\"");

        let unknown: MediaStatus = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(unknown, MediaStatus::Unknown);
    }

    #[test]
    fn test_media_status_from_str_aliases() {
        assert_eq!("airing".parse::<MediaStatus>().unwrap(), MediaStatus::Releasing);
        assert_eq!("not-yet-released".parse::<MediaStatus>().unwrap(), MediaStatus::NotYetReleased);
        assert!("watching".parse::<MediaStatus>().is_err());
    }

    #[test]
    fn test_fuzzy_date_resolution() {
        let full = FuzzyDate { year: Some(2013), month: Some(4), day: Some(7) };
        assert_eq!(full.to_naive_date(), NaiveDate::from_ymd_opt(2013, 4, 7));
        assert_eq!(full.to_string(), "2013-04-07");

        let year_only = FuzzyDate { year: Some(2013), month: None, day: None };
        assert_eq!(year_only.to_naive_date(), NaiveDate::from_ymd_opt(2013, 1, 1));

        let unknown = FuzzyDate::default();
        assert!(unknown.is_empty());
        assert!(unknown.to_naive_date().is_none());
    }
}
