//! anisynth - Display-ready metadata for anime libraries
//!
//! This library takes read-only snapshots of a catalog's show → season →
//! episode → file graph and synthesizes what a media library shows for each
//! item: episode and season numbers, titles in the preferred language,
//! cleaned-up synopses and the placement of specials. It also merges library
//! entries that are just different file versions of the same episode, and
//! splits them again.

pub mod config;
pub mod graph;
pub mod merge;
pub mod ordering;
pub mod synopsis;
pub mod synthesis;
pub mod titles;

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use synthesis::provider::{ItemLookupInfo, ItemMetadataProvider};
use thiserror::Error;

// Re-export error types
pub use config::ConfigError;
pub use graph::GraphError;
pub use merge::{LibraryError, MergeError};
pub use ordering::OrderingError;
pub use synthesis::SynthesisError;
pub use synthesis::provider::ProviderError;

// Re-export the main entry points
pub use config::Config;
pub use graph::{GraphSource, SnapshotSource};
pub use merge::{
    CancelFlag, InMemoryLibrary, Library, LibraryEpisodeEntry, MergeOutcome, MergeVersionsManager,
};
pub use synopsis::{SynopsisConfig, sanitize_synopsis};
pub use synthesis::provider::Lookup;
pub use synthesis::{EpisodeMetadata, Locale, MovieMetadata, VideoMetadata};

/// Kind of record to synthesize for a library item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Episode,
    Movie,
    Video,
}

/// Metadata synthesized for a single library item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemMetadata {
    Episode(EpisodeMetadata),
    Movie(MovieMetadata),
    Video(VideoMetadata),
}

/// Progress event emitted while refreshing library items
///
/// These events allow library users to track progress and provide feedback
/// during a refresh.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Refresh started
    Started { total: usize },

    /// Looking up a specific item
    ProcessingItem {
        index: usize,
        total: usize,
        path: PathBuf,
    },

    /// Metadata was synthesized for the item
    ItemFound { path: PathBuf, name: String },

    /// The catalog has nothing to say about the item
    ItemSkipped { path: PathBuf },

    /// Refresh complete
    Complete { found_count: usize },
}

/// Outcome of refreshing a single item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshResult {
    /// Library path of the item
    pub path: PathBuf,

    /// The synthesized metadata, if the catalog knows the item
    pub metadata: Option<ItemMetadata>,
}

/// Top-level error type for anisynth operations
#[derive(Debug, Error)]
pub enum AnisynthError {
    /// Error while loading configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error while reading the metadata graph
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Error while computing episode or season numbers
    #[error("Ordering error: {0}")]
    Ordering(#[from] OrderingError),

    /// Error while synthesizing metadata
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Error while serving an item
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the host library
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// Error while merging or splitting entries
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Synthesizes metadata for a batch of library paths
///
/// Each path is looked up through `source` and turned into the record of the
/// requested kind. Items the catalog doesn't know, or whose lookup failed,
/// come back without metadata; failures are logged by the provider.
///
/// Progress events are emitted through the provided callback, allowing library
/// users to track progress, display status, or remain silent.
///
/// # Arguments
///
/// * `source` - The graph backend to look items up in
/// * `paths` - Library paths of the items to refresh
/// * `kind` - Which record to build for every item
/// * `locale` - Language and country the metadata is requested in
/// * `config` - The configuration snapshot to apply
/// * `progress_callback` - Closure called with progress events
///
/// # Examples
///
/// ```no_run
/// use anisynth::{refresh_items, Config, ItemKind, Locale, SnapshotSource};
/// use std::path::{Path, PathBuf};
///
/// let source = SnapshotSource::open(Path::new("graph.json")).unwrap();
/// let results = refresh_items(
///     &source,
///     &[PathBuf::from("/library/Show/Show S01E01.mkv")],
///     ItemKind::Episode,
///     &Locale::default(),
///     &Config::default(),
///     |_| {} // Ignore all progress events
/// );
/// ```
pub fn refresh_items<S, F>(
    source: &S,
    paths: &[PathBuf],
    kind: ItemKind,
    locale: &Locale,
    config: &Config,
    mut progress_callback: F,
) -> Vec<RefreshResult>
where
    S: GraphSource,
    F: FnMut(ProgressEvent),
{
    let provider = ItemMetadataProvider::new(source);
    let total = paths.len();
    let mut results = Vec::with_capacity(total);

    progress_callback(ProgressEvent::Started { total });

    for (index, path) in paths.iter().enumerate() {
        progress_callback(ProgressEvent::ProcessingItem {
            index,
            total,
            path: path.clone(),
        });

        let info = ItemLookupInfo::for_path(path.clone(), locale.clone());
        let metadata = match kind {
            ItemKind::Episode => provider.episode(&info, config).item().map(ItemMetadata::Episode),
            ItemKind::Movie => provider.movie(&info, config).item().map(ItemMetadata::Movie),
            ItemKind::Video => provider.video(&info, config).item().map(ItemMetadata::Video),
        };

        match &metadata {
            Some(item) => progress_callback(ProgressEvent::ItemFound {
                path: path.clone(),
                name: item.name().to_string(),
            }),
            None => progress_callback(ProgressEvent::ItemSkipped { path: path.clone() }),
        }

        results.push(RefreshResult {
            path: path.clone(),
            metadata,
        });
    }

    let found_count = results.iter().filter(|r| r.metadata.is_some()).count();
    progress_callback(ProgressEvent::Complete { found_count });

    results
}

impl ItemMetadata {
    /// Display name of the item
    pub fn name(&self) -> &str {
        match self {
            ItemMetadata::Episode(episode) => &episode.name,
            ItemMetadata::Movie(movie) => &movie.name,
            ItemMetadata::Video(video) => &video.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures;
    use std::fs;

    fn write_snapshot(dir: &std::path::Path) -> PathBuf {
        let show = fixtures::two_season_show();
        let document = serde_json::json!({
            "shows": [show],
            "files": [
                {
                    "id": "f1",
                    "path": "/library/Test Show/Test Show S01E01.mkv",
                    "season_id": "s1",
                    "episodes": [ { "episode_id": "s1-e1" } ]
                }
            ]
        });

        let path = dir.join("graph.json");
        fs::write(&path, document.to_string()).unwrap();
        path
    }

    #[test]
    fn test_refresh_items_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let source = SnapshotSource::open(&write_snapshot(dir.path())).unwrap();
        let paths = vec![
            PathBuf::from("/library/Test Show/Test Show S01E01.mkv"),
            PathBuf::from("/library/Unknown/unknown.mkv"),
        ];

        let mut events = Vec::new();
        let results = refresh_items(
            &source,
            &paths,
            ItemKind::Episode,
            &Locale::default(),
            &Config::default(),
            |event| events.push(event),
        );

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].metadata.as_ref().map(|m| m.name()), Some("First 1"));
        assert!(results[1].metadata.is_none());

        assert!(matches!(events.first(), Some(ProgressEvent::Started { total: 2 })));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::Complete { found_count: 1 })
        ));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ProgressEvent::ItemSkipped { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_item_metadata_serializes_with_kind_tag() {
        let dir = tempfile::tempdir().unwrap();
        let source = SnapshotSource::open(&write_snapshot(dir.path())).unwrap();
        let paths = vec![PathBuf::from("/library/Test Show/Test Show S01E01.mkv")];

        let results = refresh_items(
            &source,
            &paths,
            ItemKind::Video,
            &Locale::default(),
            &Config::default(),
            |_| {},
        );

        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(json["metadata"]["kind"], "video");
        assert_eq!(json["metadata"]["name"], "First 1");
    }

    #[test]
    fn test_errors_convert_into_top_level_error() {
        let error: AnisynthError = MergeError::UnknownFile {
            file_id: "f1".to_string(),
        }
        .into();
        assert!(matches!(error, AnisynthError::Merge(_)));
        assert!(error.to_string().contains("f1"));
    }
}
