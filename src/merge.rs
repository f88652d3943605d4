//! Merging and splitting of library episode entries
//!
//! A library entry can stand for several file versions of the same logical
//! episode. Two versions belong together when they cross-reference exactly
//! the same set of catalog episodes; that set is the entry's grouping key.
//!
//! The manager works one series at a time. Each series is planned by a pure
//! function and committed through a single [`Library::apply`] call, so a
//! cancelled or failed run never leaves a series half-done.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use ulid::Ulid;

/// Errors raised by a library backend
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Failed to read a library file
    #[error("Failed to read library file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse a library file
    #[error("Failed to parse library file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to serialize the library
    #[error("Failed to serialize library: {0}")]
    SerializeFailed(serde_json::Error),

    /// Failed to write a library file
    #[error("Failed to write library file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A change references an entry that does not exist
    #[error("Unknown library entry {id}")]
    UnknownEntry { id: String },

    /// An entry was left without any file version
    #[error("Entry {id} has no file versions")]
    EmptyEntry { id: String },

    /// An entry's primary file is not one of its versions
    #[error("Primary file {file_id} is not a version of entry {id}")]
    PrimaryNotOwned { id: String, file_id: String },

    /// A file is claimed by more than one entry
    #[error("File {file_id} belongs to more than one entry")]
    DuplicateFile { file_id: String },

    /// A change set would drop a backing file
    #[error("File {file_id} would no longer belong to any entry")]
    LostFile { file_id: String },

    /// The backend could not serve the request
    #[error("Library backend failed: {0}")]
    Backend(String),
}

/// Errors raised by the merge/split manager
#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Library(#[from] LibraryError),

    /// No entry owns the requested file
    #[error("No library entry owns file {file_id}")]
    UnknownFile { file_id: String },
}

/// One file backing a library entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersion {
    pub file_id: String,
    /// Catalog episodes the file cross-references
    pub episode_ids: BTreeSet<String>,
}

impl FileVersion {
    pub fn new<'a>(file_id: &str, episode_ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            file_id: file_id.to_string(),
            episode_ids: episode_ids.into_iter().map(str::to_string).collect(),
        }
    }
}

/// An episode item of the host library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEpisodeEntry {
    pub id: String,
    pub series_id: String,
    /// Never empty
    pub versions: Vec<FileVersion>,
    pub primary_file_id: String,
}

impl LibraryEpisodeEntry {
    /// Creates an entry backed by a single file
    pub fn single(id: &str, series_id: &str, version: FileVersion) -> Self {
        Self {
            id: id.to_string(),
            series_id: series_id.to_string(),
            primary_file_id: version.file_id.clone(),
            versions: vec![version],
        }
    }

    /// The primary version, falling back to the first one
    pub fn primary_version(&self) -> Option<&FileVersion> {
        self.versions
            .iter()
            .find(|v| v.file_id == self.primary_file_id)
            .or_else(|| self.versions.first())
    }

    /// The grouping key: the primary version's episode set
    pub fn key(&self) -> Option<&BTreeSet<String>> {
        self.primary_version().map(|v| &v.episode_ids)
    }

    pub fn owns_file(&self, file_id: &str) -> bool {
        self.versions.iter().any(|v| v.file_id == file_id)
    }
}

/// A single mutation of the host library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryChange {
    /// Create the entry, or replace the entry with the same id
    Upsert(LibraryEpisodeEntry),
    Remove { id: String },
}

/// Host library the manager mutates
pub trait Library {
    /// Ids of every series that owns episode entries
    fn series_ids(&self) -> Result<Vec<String>, LibraryError>;

    /// The episode entries of a series
    fn entries(&self, series_id: &str) -> Result<Vec<LibraryEpisodeEntry>, LibraryError>;

    /// Applies a change set atomically: either every change lands or none
    fn apply(&mut self, changes: Vec<EntryChange>) -> Result<(), LibraryError>;
}

/// On-disk layout of an [`InMemoryLibrary`]
#[derive(Debug, Default, Serialize, Deserialize)]
struct LibraryDocument {
    #[serde(default)]
    entries: Vec<LibraryEpisodeEntry>,
}

/// Library kept in memory and persisted as a JSON document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryLibrary {
    entries: BTreeMap<String, LibraryEpisodeEntry>,
}

impl InMemoryLibrary {
    pub fn from_entries(entries: impl IntoIterator<Item = LibraryEpisodeEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    /// Loads the library stored at `path`
    pub fn open(path: &Path) -> Result<Self, LibraryError> {
        let content = fs::read_to_string(path).map_err(|e| LibraryError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let document: LibraryDocument =
            serde_json::from_str(&content).map_err(|e| LibraryError::ParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        let library = Self::from_entries(document.entries);
        validate(&library.entries)?;
        log::debug!(
            "Loaded library {} with {} entries",
            path.display(),
            library.entries.len()
        );

        Ok(library)
    }

    /// Writes the library to `path` as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), LibraryError> {
        let document = LibraryDocument {
            entries: self.entries.values().cloned().collect(),
        };
        let json =
            serde_json::to_string_pretty(&document).map_err(LibraryError::SerializeFailed)?;

        fs::write(path, json).map_err(|e| LibraryError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn entry(&self, id: &str) -> Option<&LibraryEpisodeEntry> {
        self.entries.get(id)
    }

    /// The entry owning `file_id`, if any
    pub fn entry_for_file(&self, file_id: &str) -> Option<&LibraryEpisodeEntry> {
        self.entries.values().find(|e| e.owns_file(file_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Library for InMemoryLibrary {
    fn series_ids(&self) -> Result<Vec<String>, LibraryError> {
        let ids: BTreeSet<&str> = self.entries.values().map(|e| e.series_id.as_str()).collect();
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    fn entries(&self, series_id: &str) -> Result<Vec<LibraryEpisodeEntry>, LibraryError> {
        Ok(self
            .entries
            .values()
            .filter(|e| e.series_id == series_id)
            .cloned()
            .collect())
    }

    fn apply(&mut self, changes: Vec<EntryChange>) -> Result<(), LibraryError> {
        let mut next = self.entries.clone();

        for change in changes {
            match change {
                EntryChange::Upsert(entry) => {
                    next.insert(entry.id.clone(), entry);
                }
                EntryChange::Remove { id } => {
                    if next.remove(&id).is_none() {
                        return Err(LibraryError::UnknownEntry { id });
                    }
                }
            }
        }

        validate(&next)?;

        let remaining = file_ids(&next);
        if let Some(lost) = file_ids(&self.entries).difference(&remaining).next() {
            return Err(LibraryError::LostFile {
                file_id: lost.to_string(),
            });
        }

        self.entries = next;
        Ok(())
    }
}

fn file_ids(entries: &BTreeMap<String, LibraryEpisodeEntry>) -> BTreeSet<&str> {
    entries
        .values()
        .flat_map(|e| e.versions.iter().map(|v| v.file_id.as_str()))
        .collect()
}

/// Checks the structural invariants of a set of entries
fn validate(entries: &BTreeMap<String, LibraryEpisodeEntry>) -> Result<(), LibraryError> {
    let mut seen = BTreeSet::new();

    for entry in entries.values() {
        if entry.versions.is_empty() {
            return Err(LibraryError::EmptyEntry {
                id: entry.id.clone(),
            });
        }
        if !entry.owns_file(&entry.primary_file_id) {
            return Err(LibraryError::PrimaryNotOwned {
                id: entry.id.clone(),
                file_id: entry.primary_file_id.clone(),
            });
        }
        for version in &entry.versions {
            if !seen.insert(version.file_id.as_str()) {
                return Err(LibraryError::DuplicateFile {
                    file_id: version.file_id.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Cooperative cancellation signal shared with a running batch
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub series_total: usize,
    pub series_processed: usize,
    /// Series that failed and were left untouched
    pub series_skipped: usize,
    /// Entries folded into another entry
    pub merged_entries: usize,
    /// File versions moved to an entry of their own
    pub split_files: usize,
    /// The run stopped early on request
    pub cancelled: bool,
}

/// Changes planned for one series
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EntryPlan {
    pub changes: Vec<EntryChange>,
    pub merged_entries: usize,
    pub split_files: usize,
}

/// Generates ids for entries created by a split
pub type IdGenerator<'a> = &'a mut dyn FnMut() -> String;

/// Entries of one series being reshaped, diffed against their start state
struct Workspace {
    original: BTreeMap<String, LibraryEpisodeEntry>,
    current: BTreeMap<String, LibraryEpisodeEntry>,
    merged_entries: usize,
    split_files: usize,
}

impl Workspace {
    fn new(entries: Vec<LibraryEpisodeEntry>) -> Self {
        let original: BTreeMap<_, _> = entries.into_iter().map(|e| (e.id.clone(), e)).collect();
        Self {
            current: original.clone(),
            original,
            merged_entries: 0,
            split_files: 0,
        }
    }

    /// Moves a version out of entry `id` into a fresh entry
    fn split_off(&mut self, id: &str, file_id: &str, new_id: IdGenerator<'_>) {
        let Some(entry) = self.current.get_mut(id) else {
            return;
        };
        if entry.versions.len() < 2 {
            return;
        }
        let Some(index) = entry.versions.iter().position(|v| v.file_id == file_id) else {
            return;
        };

        let version = entry.versions.remove(index);
        if entry.primary_file_id == file_id {
            entry.primary_file_id = entry.versions[0].file_id.clone();
        }
        let series_id = entry.series_id.clone();

        let fresh = LibraryEpisodeEntry::single(&new_id(), &series_id, version);
        log::debug!("Split file {} off entry {} into {}", file_id, id, fresh.id);
        self.current.insert(fresh.id.clone(), fresh);
        self.split_files += 1;
    }

    /// Splits off every version whose episode set differs from its entry's key
    fn split_stale(&mut self, new_id: IdGenerator<'_>) {
        let stale: Vec<(String, String)> = self
            .current
            .values()
            .flat_map(|entry| {
                let key = entry.key().cloned().unwrap_or_default();
                entry
                    .versions
                    .iter()
                    .filter(move |v| v.episode_ids != key)
                    .map(move |v| (entry.id.clone(), v.file_id.clone()))
            })
            .collect();

        for (id, file_id) in stale {
            self.split_off(&id, &file_id, new_id);
        }
    }

    /// Folds entries sharing a key into a single entry.
    ///
    /// The surviving entry is one that existed before this run if any does,
    /// then the one with the most versions, then the smallest id.
    fn merge_by_key(&mut self) {
        let mut buckets: BTreeMap<BTreeSet<String>, Vec<String>> = BTreeMap::new();
        for entry in self.current.values() {
            match entry.key() {
                Some(key) if !key.is_empty() => {
                    buckets.entry(key.clone()).or_default().push(entry.id.clone());
                }
                _ => {}
            }
        }

        for ids in buckets.into_values().filter(|ids| ids.len() > 1) {
            // Ids come out of a BTreeMap sorted, so ties keep the smallest id
            let Some(primary_id) = ids
                .iter()
                .rev()
                .max_by_key(|id| {
                    let versions = self.current.get(*id).map_or(0, |e| e.versions.len());
                    (self.original.contains_key(*id), versions)
                })
                .cloned()
            else {
                continue;
            };

            for id in ids.iter().filter(|id| **id != primary_id) {
                let Some(absorbed) = self.current.remove(id) else {
                    continue;
                };
                if let Some(primary) = self.current.get_mut(&primary_id) {
                    log::debug!("Merged entry {} into {}", absorbed.id, primary.id);
                    primary.versions.extend(absorbed.versions);
                    self.merged_entries += 1;
                }
            }
        }
    }

    fn into_plan(self) -> EntryPlan {
        let mut changes = Vec::new();

        for id in self.original.keys() {
            if !self.current.contains_key(id) {
                changes.push(EntryChange::Remove { id: id.clone() });
            }
        }
        for (id, entry) in self.current {
            if self.original.get(&id) != Some(&entry) {
                changes.push(EntryChange::Upsert(entry));
            }
        }

        EntryPlan {
            changes,
            merged_entries: self.merged_entries,
            split_files: self.split_files,
        }
    }
}

/// Plans the merge of one series' entries.
///
/// Versions that no longer match their entry's key are split off first,
/// then entries sharing a key are folded together. Running the plan on its
/// own result yields no changes.
pub fn plan_merge(entries: Vec<LibraryEpisodeEntry>, new_id: IdGenerator<'_>) -> EntryPlan {
    let mut workspace = Workspace::new(entries);
    workspace.split_stale(new_id);
    workspace.merge_by_key();
    workspace.into_plan()
}

/// Plans splitting every grouped entry into one entry per file
pub fn plan_split_all(entries: Vec<LibraryEpisodeEntry>, new_id: IdGenerator<'_>) -> EntryPlan {
    let mut workspace = Workspace::new(entries);

    let secondary: Vec<(String, String)> = workspace
        .current
        .values()
        .flat_map(|entry| {
            entry
                .versions
                .iter()
                .filter(move |v| v.file_id != entry.primary_file_id)
                .map(move |v| (entry.id.clone(), v.file_id.clone()))
        })
        .collect();

    for (id, file_id) in secondary {
        workspace.split_off(&id, &file_id, new_id);
    }

    workspace.into_plan()
}

/// Plans moving one file out of its entry.
///
/// Returns `None` if no entry owns the file. A file that is the only
/// version of its entry yields an empty plan.
pub fn plan_split_file(
    entries: Vec<LibraryEpisodeEntry>,
    file_id: &str,
    new_id: IdGenerator<'_>,
) -> Option<EntryPlan> {
    let owner = entries.iter().find(|e| e.owns_file(file_id))?.id.clone();

    let mut workspace = Workspace::new(entries);
    workspace.split_off(&owner, file_id, new_id);
    Some(workspace.into_plan())
}

fn new_entry_id() -> String {
    Ulid::new().to_string()
}

type Planner = for<'a> fn(Vec<LibraryEpisodeEntry>, IdGenerator<'a>) -> EntryPlan;

/// Batch manager merging and splitting library entries
///
/// The manager does not serialize runs: callers must make sure at most one
/// batch runs against a library at a time. Entries changed by someone else
/// between reading a series and applying its plan are not detected; the
/// plan is computed from the entries as read and may overwrite such edits.
pub struct MergeVersionsManager<L>
where
    L: Library,
{
    library: L,
}

impl<L> MergeVersionsManager<L>
where
    L: Library,
{
    pub fn new(library: L) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    pub fn into_library(self) -> L {
        self.library
    }

    /// Merges the file versions of every series.
    ///
    /// Progress is reported as a percentage after each series; cancellation
    /// is checked before each series. A failing series is logged, counted
    /// as skipped and left untouched.
    ///
    /// # Errors
    ///
    /// Fails only if the list of series can't be read.
    pub fn run<F>(&mut self, progress: F, cancel: &CancelFlag) -> Result<MergeOutcome, MergeError>
    where
        F: FnMut(f64),
    {
        self.run_batch("merge", plan_merge, progress, cancel)
    }

    /// Splits every grouped entry back into one entry per file
    pub fn split_all<F>(&mut self, progress: F, cancel: &CancelFlag) -> Result<MergeOutcome, MergeError>
    where
        F: FnMut(f64),
    {
        self.run_batch("split", plan_split_all, progress, cancel)
    }

    /// Moves a single file out of its entry.
    ///
    /// Returns `false` when the file is the only version of its entry.
    pub fn split_file(&mut self, file_id: &str) -> Result<bool, MergeError> {
        for series_id in self.library.series_ids()? {
            let entries = self.library.entries(&series_id)?;
            let Some(plan) = plan_split_file(entries, file_id, &mut new_entry_id) else {
                continue;
            };

            if plan.changes.is_empty() {
                log::info!("File {} is the only version of its entry; nothing to split", file_id);
                return Ok(false);
            }

            self.library.apply(plan.changes)?;
            log::info!("Split file {} into its own entry", file_id);
            return Ok(true);
        }

        Err(MergeError::UnknownFile {
            file_id: file_id.to_string(),
        })
    }

    fn run_batch<F>(
        &mut self,
        action: &str,
        planner: Planner,
        mut progress: F,
        cancel: &CancelFlag,
    ) -> Result<MergeOutcome, MergeError>
    where
        F: FnMut(f64),
    {
        let series_ids = self.library.series_ids()?;
        let total = series_ids.len();
        let mut outcome = MergeOutcome {
            series_total: total,
            ..MergeOutcome::default()
        };

        log::info!("Starting {} of {} series", action, total);
        progress(0.0);

        for (index, series_id) in series_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Cancelled {} after {} of {} series", action, index, total);
                outcome.cancelled = true;
                return Ok(outcome);
            }

            match self.process_series(series_id, planner) {
                Ok(plan) => {
                    outcome.series_processed += 1;
                    outcome.merged_entries += plan.merged_entries;
                    outcome.split_files += plan.split_files;
                }
                Err(e) => {
                    log::error!("Failed to {} versions of series {}: {}", action, series_id, e);
                    outcome.series_skipped += 1;
                }
            }

            progress((index + 1) as f64 * 100.0 / total as f64);
        }

        if total == 0 {
            progress(100.0);
        }

        log::info!(
            "Finished {}: {} merged, {} split, {} series skipped",
            action,
            outcome.merged_entries,
            outcome.split_files,
            outcome.series_skipped
        );

        Ok(outcome)
    }

    /// Plans and commits one series; the returned plan has its changes drained
    fn process_series(&mut self, series_id: &str, planner: Planner) -> Result<EntryPlan, LibraryError> {
        let entries = self.library.entries(series_id)?;
        let mut plan = planner(entries, &mut new_entry_id);

        let changes = std::mem::take(&mut plan.changes);
        if !changes.is_empty() {
            self.library.apply(changes)?;
        }

        Ok(plan)
    }
}
