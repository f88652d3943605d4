//! Data structures and traits for the catalog metadata graph.
//!
//! This module provides structures to represent shows, seasons, episodes and
//! files as read-only snapshots handed over by a catalog backend, as well as
//! the [`GraphSource`] trait used to look those snapshots up by library path
//! or by identifier.
mod snapshot;
mod snapshot_types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use snapshot::SnapshotSource;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while looking up graph snapshots.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Failed to read a snapshot file
    #[error("Failed to read snapshot file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse a snapshot file
    #[error("Failed to parse snapshot file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A file references an episode that is not part of any season
    #[error("File {file_id} references unknown episode {episode_id}")]
    DanglingEpisode { file_id: String, episode_id: String },

    /// A file references a season that is not part of any show
    #[error("File {file_id} references unknown season {season_id}")]
    DanglingSeason { file_id: String, season_id: String },

    /// The backend could not answer the lookup
    #[error("Graph backend unavailable: {0}")]
    Unavailable(String),
}

/// Kind of a season ("series" in catalog terms).
///
/// Drives title construction: movie seasons prefer the season name over the
/// placeholder titles their episodes usually carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonType {
    Movie,
    Tv,
    Ova,
    Web,
    Other,
}

/// Kind of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeType {
    /// A regular episode in the normal numbering sequence
    Normal,
    /// A special, numbered by its position in the season's specials list
    Special,
    Trailer,
    /// Either an opening or an ending song
    ThemeSong,
    OpeningSong,
    EndingSong,
    Parody,
    Interview,
    /// A DVD or BD extra, e.g. menus or deleted scenes
    Extra,
    /// Catch-all for anything the catalog can't classify
    #[serde(alias = "unknown")]
    Other,
}

/// Catalog a title or description candidate was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextSource {
    /// The primary anime database
    #[serde(rename = "AniDB")]
    AniDb,
    #[serde(rename = "TvDB")]
    TvDb,
    #[serde(rename = "TMDB")]
    Tmdb,
    /// The catalog server's own curated values
    #[serde(rename = "Shoko")]
    Catalog,
    #[serde(other)]
    Other,
}

/// A single `(source, language, value)` text candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCandidate {
    pub source: TextSource,
    /// Language code, e.g. `en`, `ja` or `x-jat`
    pub language: String,
    pub value: String,
}

impl TextCandidate {
    pub fn new(source: TextSource, language: &str, value: &str) -> Self {
        Self {
            source,
            language: language.to_string(),
            value: value.to_string(),
        }
    }
}

/// A rating on an arbitrary scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub value: f64,
    pub max_value: f64,
}

impl Rating {
    /// Converts the rating to the given scale, e.g. `to_scale(10.0)`.
    pub fn to_scale(&self, scale: f64) -> f32 {
        if self.max_value <= 0.0 {
            return 0.0;
        }
        (self.value * scale / self.max_value) as f32
    }

    /// True if the rating carries a usable, positive value
    pub fn is_positive(&self) -> bool {
        self.value > 0.0 && self.max_value > 0.0
    }
}

/// Cross-reference hint placing a special relative to normal content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementHint {
    /// The special airs before the referenced normal episode
    BeforeEpisode { episode_id: String },
    /// The special airs after the referenced season's run
    AfterSeason { season_id: String },
}

/// Represents a single episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    /// Stable catalog identifier
    pub id: String,
    #[serde(rename = "type")]
    pub episode_type: EpisodeType,
    /// Native number, unique within the season and episode type
    pub number: i32,
    #[serde(default)]
    pub titles: Vec<TextCandidate>,
    /// Catalog default title used when no candidate matches
    #[serde(default)]
    pub default_title: String,
    #[serde(default)]
    pub descriptions: Vec<TextCandidate>,
    #[serde(default)]
    pub default_description: String,
    #[serde(default)]
    pub aired_at: Option<NaiveDate>,
    #[serde(default)]
    pub runtime: Option<Duration>,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub anidb_id: Option<String>,
    #[serde(default)]
    pub tmdb_id: Option<String>,
    #[serde(default)]
    pub tvdb_id: Option<String>,
    #[serde(default)]
    pub placement: Option<PlacementHint>,
}

impl EpisodeInfo {
    /// Returns the first title from `source` in `language`, if any.
    pub fn title_for(&self, source: TextSource, language: &str) -> Option<&str> {
        self.titles
            .iter()
            .find(|t| t.source == source && t.language.eq_ignore_ascii_case(language))
            .map(|t| t.value.as_str())
    }
}

/// Represents a season (a single catalog "series").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub season_type: SeasonType,
    /// Display name, the canonical fallback title
    pub name: String,
    #[serde(default)]
    pub titles: Vec<TextCandidate>,
    #[serde(default)]
    pub descriptions: Vec<TextCandidate>,
    #[serde(default)]
    pub default_description: String,
    /// Normal episodes in native order
    #[serde(default)]
    pub episodes: Vec<EpisodeInfo>,
    /// Specials; the list position is the display ordinal
    #[serde(default)]
    pub specials: Vec<EpisodeInfo>,
    /// Trailers, songs, parodies and other non-normal entries
    #[serde(default)]
    pub extras: Vec<EpisodeInfo>,
    /// Country of origin, e.g. `JP`
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub rating: Option<Rating>,
    /// Content rating keyed by country code
    #[serde(default)]
    pub content_ratings: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub studios: Vec<String>,
    #[serde(default)]
    pub aired_at: Option<NaiveDate>,
}

impl SeasonInfo {
    /// Iterates every episode of the season regardless of type
    pub fn all_episodes(&self) -> impl Iterator<Item = &EpisodeInfo> {
        self.episodes
            .iter()
            .chain(self.specials.iter())
            .chain(self.extras.iter())
    }

    pub fn find_episode(&self, episode_id: &str) -> Option<&EpisodeInfo> {
        self.all_episodes().find(|e| e.id == episode_id)
    }

    /// Number of entries counted as movies: normal episodes plus specials
    pub fn movie_entry_count(&self) -> usize {
        self.episodes.len() + self.specials.len()
    }
}

/// Represents a show (a group of seasons).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowInfo {
    #[serde(default)]
    pub group_id: Option<String>,
    pub name: String,
    /// Seasons in canonical release/relation order
    pub seasons: Vec<SeasonInfo>,
    #[serde(default)]
    pub custom_rating: Option<String>,
    /// Auxiliary season ids merged into the show's primary season
    #[serde(default)]
    pub extra_ids: BTreeSet<String>,
}

impl ShowInfo {
    /// Finds a season by id.
    ///
    /// Ids listed in `extra_ids` resolve to the primary (first) season.
    pub fn resolve_season(&self, season_id: &str) -> Option<&SeasonInfo> {
        if let Some(season) = self.seasons.iter().find(|s| s.id == season_id) {
            return Some(season);
        }

        if self.extra_ids.contains(season_id) {
            return self.seasons.first();
        }

        None
    }

    /// Finds the season owning the given episode
    pub fn season_of(&self, episode_id: &str) -> Option<&SeasonInfo> {
        self.seasons
            .iter()
            .find(|s| s.find_episode(episode_id).is_some())
    }
}

/// File-level cross-reference data for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    /// Share of the episode covered by the file, in percent
    pub percentage: u8,
}

impl Default for CrossReference {
    fn default() -> Self {
        Self { percentage: 100 }
    }
}

/// An episode linked to a file together with its cross-reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEpisode {
    pub episode: EpisodeInfo,
    pub cross_reference: CrossReference,
}

/// Represents a file known to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    /// Owning season id
    pub season_id: String,
    /// More than one entry means a multi-episode file
    pub episodes: Vec<FileEpisode>,
}

impl FileInfo {
    pub fn first_episode(&self) -> Option<&EpisodeInfo> {
        self.episodes.first().map(|e| &e.episode)
    }

    pub fn is_multi_episode(&self) -> bool {
        self.episodes.len() > 1
    }
}

/// Result of a path lookup: the file and the season and show it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct FileLookup {
    pub file: FileInfo,
    pub season: SeasonInfo,
    pub show: ShowInfo,
}

/// Trait for backends that can hand out graph snapshots.
///
/// Implementors wrap whatever client talks to the catalog. Every lookup
/// returns `Ok(None)` when the requested node does not exist; errors are
/// reserved for backend failures.
pub trait GraphSource {
    /// Looks a file up by its library path
    fn file_by_path(&self, path: &Path) -> Result<Option<FileLookup>, GraphError>;

    /// Looks an episode up by id
    fn episode(&self, episode_id: &str) -> Result<Option<EpisodeInfo>, GraphError>;

    /// Finds the season owning the given episode
    fn season_for_episode(&self, episode_id: &str) -> Result<Option<SeasonInfo>, GraphError>;

    /// Finds the show owning the given season
    fn show_for_season(&self, season_id: &str) -> Result<Option<ShowInfo>, GraphError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_to_scale() {
        let rating = Rating {
            value: 850.0,
            max_value: 1000.0,
        };
        assert!((rating.to_scale(10.0) - 8.5).abs() < f32::EPSILON);
        assert!(rating.is_positive());

        let broken = Rating {
            value: 5.0,
            max_value: 0.0,
        };
        assert_eq!(broken.to_scale(10.0), 0.0);
        assert!(!broken.is_positive());
    }

    #[test]
    fn test_resolve_season_with_extra_ids() {
        let show = fixtures::two_season_show();

        assert_eq!(show.resolve_season("s2").map(|s| s.id.as_str()), Some("s2"));
        // Extra ids fold into the primary season
        assert_eq!(show.resolve_season("x9").map(|s| s.id.as_str()), Some("s1"));
        assert!(show.resolve_season("missing").is_none());
    }

    #[test]
    fn test_season_of_finds_specials() {
        let show = fixtures::two_season_show();

        assert_eq!(show.season_of("s2-sp1").map(|s| s.id.as_str()), Some("s2"));
        assert_eq!(show.season_of("s1-e3").map(|s| s.id.as_str()), Some("s1"));
        assert!(show.season_of("nope").is_none());
    }

    #[test]
    fn test_episode_type_deserializes_unknown_alias() {
        let parsed: EpisodeType = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(parsed, EpisodeType::Other);

        let source: TextSource = serde_json::from_str("\"AniDB\"").unwrap();
        assert_eq!(source, TextSource::AniDb);
        let other: TextSource = serde_json::from_str("\"Wikipedia\"").unwrap();
        assert_eq!(other, TextSource::Other);
    }
}
