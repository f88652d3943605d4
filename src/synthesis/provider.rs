//! Item metadata providers
//!
//! The entry points the host calls per library item. Each provider looks the
//! item up in a [`GraphSource`], hands the result to the synthesizer and
//! turns the outcome into a [`Lookup`]: found, nothing to say, or failed.
//! Failures are logged here so callers can treat them like a miss.

use super::{
    EpisodeMetadata, Locale, MovieMetadata, SynthesisError, VideoMetadata, synthesize_episode,
    synthesize_movie, synthesize_video,
};
use crate::config::Config;
use crate::graph::{EpisodeInfo, FileInfo, FileLookup, GraphError, GraphSource, SeasonInfo, ShowInfo};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors a provider can run into while serving an item
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Graph lookup failed: {0}")]
    Graph(#[from] GraphError),

    #[error("Failed to synthesize metadata: {0}")]
    Synthesis(#[from] SynthesisError),
}

/// Outcome of a provider call
#[derive(Debug)]
pub enum Lookup<T> {
    /// Metadata was synthesized
    Found(T),
    /// The item is unknown to the catalog
    NotFound,
    /// The lookup failed; already logged
    Failed(ProviderError),
}

impl<T> Lookup<T> {
    /// Collapses the outcome into "metadata or nothing"
    pub fn item(self) -> Option<T> {
        match self {
            Lookup::Found(item) => Some(item),
            Lookup::NotFound | Lookup::Failed(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// What the host knows about the item it wants metadata for
#[derive(Debug, Clone, Default)]
pub struct ItemLookupInfo {
    /// Library path of the item, if it is backed by a file
    pub path: Option<PathBuf>,
    /// Catalog episode id, set for placeholder items of missing episodes
    pub episode_id: Option<String>,
    /// The item stands in for an episode without a file
    pub is_missing: bool,
    pub locale: Locale,
}

impl ItemLookupInfo {
    /// Lookup info for a file-backed item
    pub fn for_path(path: impl Into<PathBuf>, locale: Locale) -> Self {
        Self {
            path: Some(path.into()),
            locale,
            ..Self::default()
        }
    }

    /// Lookup info for a missing episode known only by id
    pub fn for_missing_episode(episode_id: impl Into<String>, locale: Locale) -> Self {
        Self {
            episode_id: Some(episode_id.into()),
            is_missing: true,
            locale,
            ..Self::default()
        }
    }

    fn describe(&self) -> String {
        match (&self.path, &self.episode_id) {
            (Some(path), _) => format!("path {}", path.display()),
            (None, Some(id)) => format!("episode {}", id),
            (None, None) => "an item without path or id".to_string(),
        }
    }
}

/// Everything needed to synthesize one episode item
struct ResolvedEpisode {
    file: Option<FileInfo>,
    season: SeasonInfo,
    show: ShowInfo,
    episode: EpisodeInfo,
}

/// Serves episode, movie and video metadata from a graph source
pub struct ItemMetadataProvider<'a, S>
where
    S: GraphSource,
{
    source: &'a S,
}

impl<'a, S> ItemMetadataProvider<'a, S>
where
    S: GraphSource,
{
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Synthesizes episode metadata for a library item.
    ///
    /// File-backed items are resolved by path; missing episodes by their
    /// catalog id.
    pub fn episode(&self, info: &ItemLookupInfo, config: &Config) -> Lookup<EpisodeMetadata> {
        self.finish(info, "episode", self.try_episode(info, config))
    }

    /// Synthesizes movie metadata for a file-backed library item
    pub fn movie(&self, info: &ItemLookupInfo, config: &Config) -> Lookup<MovieMetadata> {
        self.finish(info, "movie", self.try_movie(info, config))
    }

    /// Synthesizes metadata for a plain video below the virtual root
    pub fn video(&self, info: &ItemLookupInfo, config: &Config) -> Lookup<VideoMetadata> {
        self.finish(info, "video", self.try_video(info, config))
    }

    fn finish<T>(
        &self,
        info: &ItemLookupInfo,
        kind: &str,
        result: Result<Option<T>, ProviderError>,
    ) -> Lookup<T> {
        match result {
            Ok(Some(item)) => Lookup::Found(item),
            Ok(None) => Lookup::NotFound,
            Err(e) => {
                log::error!(
                    "Threw unexpectedly while refreshing {} for {}: {}",
                    kind,
                    info.describe(),
                    e
                );
                Lookup::Failed(e)
            }
        }
    }

    /// Looks a file up by path, logging a miss
    fn lookup_file(&self, path: &Path) -> Result<Option<FileLookup>, ProviderError> {
        let lookup = self.source.file_by_path(path)?;
        if lookup.is_none() {
            log::warn!("Unable to find file info for path {}", path.display());
        }
        Ok(lookup)
    }

    fn resolve_episode(&self, info: &ItemLookupInfo) -> Result<Option<ResolvedEpisode>, ProviderError> {
        if !info.is_missing {
            let Some(path) = info.path.as_deref() else {
                return Ok(None);
            };
            let Some(lookup) = self.lookup_file(path)? else {
                return Ok(None);
            };
            let Some(episode) = lookup.file.first_episode().cloned() else {
                log::warn!("File {} is not linked to any episode", lookup.file.id);
                return Ok(None);
            };

            return Ok(Some(ResolvedEpisode {
                file: Some(lookup.file),
                season: lookup.season,
                show: lookup.show,
                episode,
            }));
        }

        let Some(episode_id) = info.episode_id.as_deref() else {
            return Ok(None);
        };
        let Some(episode) = self.source.episode(episode_id)? else {
            log::warn!("Unable to find episode info for id {}", episode_id);
            return Ok(None);
        };
        let Some(season) = self.source.season_for_episode(episode_id)? else {
            log::warn!("Unable to find series info for episode {}", episode_id);
            return Ok(None);
        };
        let Some(show) = self.source.show_for_season(&season.id)? else {
            log::warn!("Unable to find group info for series {}", season.id);
            return Ok(None);
        };
        if show.seasons.is_empty() {
            log::warn!("Group for series {} has no seasons", season.id);
            return Ok(None);
        }

        Ok(Some(ResolvedEpisode {
            file: None,
            season,
            show,
            episode,
        }))
    }

    fn try_episode(
        &self,
        info: &ItemLookupInfo,
        config: &Config,
    ) -> Result<Option<EpisodeMetadata>, ProviderError> {
        let Some(resolved) = self.resolve_episode(info)? else {
            return Ok(None);
        };

        let metadata = synthesize_episode(
            &resolved.show,
            &resolved.season,
            &resolved.episode,
            resolved.file.as_ref(),
            &info.locale,
            config,
        )?;

        log::info!(
            "Found episode {:?} (File={:?},Episode={},Series={},ExtraSeries={},Group={:?})",
            metadata.name,
            resolved.file.as_ref().map(|f| f.id.as_str()),
            resolved.episode.id,
            resolved.season.id,
            resolved.show.extra_ids.len(),
            resolved.show.group_id
        );

        Ok(Some(metadata))
    }

    fn try_movie(
        &self,
        info: &ItemLookupInfo,
        config: &Config,
    ) -> Result<Option<MovieMetadata>, ProviderError> {
        let Some(path) = info.path.as_deref() else {
            return Ok(None);
        };
        let Some(lookup) = self.lookup_file(path)? else {
            return Ok(None);
        };
        if lookup.file.episodes.is_empty() {
            log::warn!("File {} is not linked to any episode", lookup.file.id);
            return Ok(None);
        }

        let metadata = synthesize_movie(&lookup.season, &lookup.file, &info.locale, config)?;

        log::info!(
            "Found movie {:?} (File={},Series={},Group={:?})",
            metadata.name,
            lookup.file.id,
            lookup.season.id,
            lookup.show.group_id
        );

        Ok(Some(metadata))
    }

    fn try_video(
        &self,
        info: &ItemLookupInfo,
        config: &Config,
    ) -> Result<Option<VideoMetadata>, ProviderError> {
        let Some(path) = info.path.as_deref() else {
            return Ok(None);
        };

        if let Some(root) = config.virtual_root.as_deref() {
            if !path.starts_with(root) {
                log::debug!(
                    "Skipping {}; not below virtual root {}",
                    path.display(),
                    root.display()
                );
                return Ok(None);
            }
        }

        let Some(lookup) = self.lookup_file(path)? else {
            return Ok(None);
        };
        let Some(episode) = lookup.file.first_episode() else {
            log::warn!("File {} is not linked to any episode", lookup.file.id);
            return Ok(None);
        };

        let metadata = synthesize_video(&lookup.season, episode, &info.locale, config);

        log::info!(
            "Found video {:?} (File={},Episode={},Series={})",
            metadata.name,
            lookup.file.id,
            episode.id,
            lookup.season.id
        );

        Ok(Some(metadata))
    }
}
