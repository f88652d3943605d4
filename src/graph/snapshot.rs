//! JSON snapshot graph source implementation.
use super::snapshot_types::{SnapshotDocument, SnapshotFileRecord};
use super::{
    CrossReference, EpisodeInfo, FileEpisode, FileInfo, FileLookup, GraphError, GraphSource,
    SeasonInfo, ShowInfo,
};
use std::fs;
use std::path::Path;

/// Graph source backed by an exported JSON snapshot.
///
/// The whole document is kept in memory; lookups scan the show tree, which
/// is fine for the size of a single library export.
#[derive(Debug, Default)]
pub struct SnapshotSource {
    shows: Vec<ShowInfo>,
    files: Vec<SnapshotFileRecord>,
}

impl SnapshotSource {
    /// Opens and parses the snapshot stored at `path`.
    pub fn open(path: &Path) -> Result<Self, GraphError> {
        let content = fs::read_to_string(path).map_err(|e| GraphError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let document: SnapshotDocument =
            serde_json::from_str(&content).map_err(|e| GraphError::ParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        log::debug!(
            "Loaded snapshot {} with {} show(s) and {} file(s)",
            path.display(),
            document.shows.len(),
            document.files.len()
        );

        Ok(Self::from_document(document))
    }

    /// Builds a source from shows only (no file records)
    pub fn from_shows(shows: Vec<ShowInfo>) -> Self {
        Self {
            shows,
            files: Vec::new(),
        }
    }

    fn from_document(document: SnapshotDocument) -> Self {
        Self {
            shows: document.shows,
            files: document.files,
        }
    }

    /// Finds the show and season an episode belongs to.
    fn locate_episode(&self, episode_id: &str) -> Option<(&ShowInfo, &SeasonInfo, &EpisodeInfo)> {
        self.shows.iter().find_map(|show| {
            show.seasons.iter().find_map(|season| {
                season
                    .find_episode(episode_id)
                    .map(|episode| (show, season, episode))
            })
        })
    }

    fn show_for(&self, season_id: &str) -> Option<&ShowInfo> {
        self.shows
            .iter()
            .find(|show| show.resolve_season(season_id).is_some())
    }

    /// Converts a snapshot file record into a resolved file lookup.
    ///
    /// Episode references are resolved against the show tree; a reference
    /// to an episode that doesn't exist means the snapshot is inconsistent.
    fn convert_file(&self, record: &SnapshotFileRecord) -> Result<FileLookup, GraphError> {
        let show = self
            .show_for(&record.season_id)
            .ok_or_else(|| GraphError::DanglingSeason {
                file_id: record.id.clone(),
                season_id: record.season_id.clone(),
            })?;

        let season = show
            .resolve_season(&record.season_id)
            .ok_or_else(|| GraphError::DanglingSeason {
                file_id: record.id.clone(),
                season_id: record.season_id.clone(),
            })?;

        let mut episodes = Vec::with_capacity(record.episodes.len());
        for reference in &record.episodes {
            let (_, _, episode) = self.locate_episode(&reference.episode_id).ok_or_else(|| {
                GraphError::DanglingEpisode {
                    file_id: record.id.clone(),
                    episode_id: reference.episode_id.clone(),
                }
            })?;

            episodes.push(FileEpisode {
                episode: episode.clone(),
                cross_reference: reference
                    .percentage
                    .map(|percentage| CrossReference { percentage })
                    .unwrap_or_default(),
            });
        }

        Ok(FileLookup {
            file: FileInfo {
                id: record.id.clone(),
                season_id: record.season_id.clone(),
                episodes,
            },
            season: season.clone(),
            show: show.clone(),
        })
    }
}

impl GraphSource for SnapshotSource {
    fn file_by_path(&self, path: &Path) -> Result<Option<FileLookup>, GraphError> {
        match self.files.iter().find(|record| record.path == path) {
            Some(record) => self.convert_file(record).map(Some),
            None => Ok(None),
        }
    }

    fn episode(&self, episode_id: &str) -> Result<Option<EpisodeInfo>, GraphError> {
        Ok(self
            .locate_episode(episode_id)
            .map(|(_, _, episode)| episode.clone()))
    }

    fn season_for_episode(&self, episode_id: &str) -> Result<Option<SeasonInfo>, GraphError> {
        Ok(self
            .locate_episode(episode_id)
            .map(|(_, season, _)| season.clone()))
    }

    fn show_for_season(&self, season_id: &str) -> Result<Option<ShowInfo>, GraphError> {
        Ok(self.show_for(season_id).cloned())
    }
}
