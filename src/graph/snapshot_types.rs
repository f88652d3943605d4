//! Snapshot file types for deserialization.
//!
//! These structures mirror the JSON layout of a graph snapshot as exported
//! by the catalog backend: the show tree inline, files referencing episodes
//! by id.
use super::ShowInfo;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The top-level snapshot document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct SnapshotDocument {
    /// Every show with its full season tree
    #[serde(default)]
    pub shows: Vec<ShowInfo>,
    /// Files known to the catalog
    #[serde(default)]
    pub files: Vec<SnapshotFileRecord>,
}

/// A single file entry in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct SnapshotFileRecord {
    pub id: String,
    /// Library path the file is known under
    pub path: PathBuf,
    pub season_id: String,
    pub episodes: Vec<SnapshotFileEpisode>,
}

/// Episode reference of a snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct SnapshotFileEpisode {
    pub episode_id: String,
    /// Share of the episode covered by the file (defaults to 100)
    #[serde(default)]
    pub percentage: Option<u8>,
}
