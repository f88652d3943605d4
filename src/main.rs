use anisynth::synthesis::provider::{ItemLookupInfo, ItemMetadataProvider};
use anisynth::{
    AnisynthError, CancelFlag, Config, InMemoryLibrary, ItemKind, ItemMetadata, Locale,
    MergeOutcome, MergeVersionsManager, ProgressEvent, RefreshResult, SnapshotSource,
    refresh_items,
};
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

/// Synthesize display metadata for anime library items
#[derive(Debug, Parser)]
#[command(name = "anisynth", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print episode metadata for library files or missing episodes
    Episode {
        #[command(flatten)]
        items: ItemArgs,

        /// Catalog ids of missing episodes to describe
        #[arg(long = "missing")]
        missing: Vec<String>,
    },
    /// Print movie metadata for library files
    Movie {
        #[command(flatten)]
        items: ItemArgs,
    },
    /// Print video metadata for library files
    Video {
        #[command(flatten)]
        items: ItemArgs,
    },
    /// Merge entries that are versions of the same episode
    Merge {
        #[command(flatten)]
        library: LibraryArgs,
    },
    /// Split merged entries back into one entry per file
    Split {
        #[command(flatten)]
        library: LibraryArgs,

        /// Only move this file out of its entry
        #[arg(long)]
        file: Option<String>,
    },
}

#[derive(Debug, Args)]
struct ItemArgs {
    /// JSON graph snapshot exported from the catalog
    #[arg(long)]
    graph: PathBuf,

    /// Language to request metadata in
    #[arg(long, default_value = "en")]
    language: String,

    /// Country to look content ratings up for
    #[arg(long, default_value = "US")]
    country: String,

    /// Library paths of the items
    paths: Vec<PathBuf>,
}

impl ItemArgs {
    fn locale(&self) -> Locale {
        Locale {
            language: self.language.clone(),
            country: self.country.clone(),
        }
    }
}

#[derive(Debug, Args)]
struct LibraryArgs {
    /// JSON library snapshot to read and update
    #[arg(long)]
    library: PathBuf,

    /// Write the result without asking
    #[arg(short, long)]
    yes: bool,
}

fn setup_logger(level: u8) {
    let mut builder = pretty_env_logger::formatted_timed_builder();

    let log_level = match level {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    builder.filter_level(log_level);
    builder.format_timestamp_millis();
    builder.init();
}

/// Handles progress events and prints formatted output to stderr
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::Started { total } => {
            eprintln!("Refreshing {} item(s)...", total);
        }
        ProgressEvent::ProcessingItem { index, total, path } => {
            eprintln!("[{}/{}] {}", index + 1, total, path.display());
        }
        ProgressEvent::ItemFound { name, .. } => {
            eprintln!("  Found: {}", name);
        }
        ProgressEvent::ItemSkipped { .. } => {
            eprintln!("  No metadata");
        }
        ProgressEvent::Complete { found_count } => {
            eprintln!("Done. Found metadata for {} item(s).", found_count);
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AnisynthError> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    println!("{}", json);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config, AnisynthError> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    Ok(config)
}

fn refresh(items: &ItemArgs, kind: ItemKind, config: &Config) -> Result<Vec<RefreshResult>, AnisynthError> {
    let source = SnapshotSource::open(&items.graph)?;
    Ok(refresh_items(
        &source,
        &items.paths,
        kind,
        &items.locale(),
        config,
        handle_progress_event,
    ))
}

/// Describes missing episodes by catalog id
fn describe_missing(items: &ItemArgs, ids: &[String], config: &Config) -> Result<Vec<Option<ItemMetadata>>, AnisynthError> {
    let source = SnapshotSource::open(&items.graph)?;
    let provider = ItemMetadataProvider::new(&source);

    Ok(ids
        .iter()
        .map(|id| {
            let info = ItemLookupInfo::for_missing_episode(id.as_str(), items.locale());
            provider.episode(&info, config).item().map(ItemMetadata::Episode)
        })
        .collect())
}

fn confirm(prompt: &str) -> Result<bool, AnisynthError> {
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .map_err(|e| io::Error::other(e.to_string()))?;
    Ok(confirmed)
}

/// Writes the library back if anything changed and the user agrees
fn save_library(
    library: &InMemoryLibrary,
    args: &LibraryArgs,
    changed: bool,
) -> Result<(), AnisynthError> {
    if !changed {
        eprintln!("Nothing changed.");
        return Ok(());
    }

    let prompt = format!("Write changes to {}?", args.library.display());
    if !args.yes && !confirm(&prompt)? {
        eprintln!("Aborted; {} was not modified.", args.library.display());
        return Ok(());
    }

    library.save(&args.library)?;
    eprintln!("Wrote {}", args.library.display());
    Ok(())
}

fn report_progress(percent: f64) {
    log::info!("Progress: {:.0}%", percent);
}

fn outcome_changed(outcome: &MergeOutcome) -> bool {
    outcome.merged_entries > 0 || outcome.split_files > 0
}

fn run(cli: Cli) -> Result<(), AnisynthError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Episode { items, missing } => {
            if missing.is_empty() {
                print_json(&refresh(&items, ItemKind::Episode, &config)?)
            } else {
                print_json(&describe_missing(&items, &missing, &config)?)
            }
        }
        Command::Movie { items } => print_json(&refresh(&items, ItemKind::Movie, &config)?),
        Command::Video { items } => print_json(&refresh(&items, ItemKind::Video, &config)?),
        Command::Merge { library } => {
            let mut manager = MergeVersionsManager::new(InMemoryLibrary::open(&library.library)?);
            let outcome = manager.run(report_progress, &CancelFlag::new())?;
            print_json(&outcome)?;
            save_library(manager.library(), &library, outcome_changed(&outcome))
        }
        Command::Split { library, file } => {
            let mut manager = MergeVersionsManager::new(InMemoryLibrary::open(&library.library)?);
            let changed = match file {
                Some(file_id) => manager.split_file(&file_id)?,
                None => {
                    let outcome = manager.split_all(report_progress, &CancelFlag::new())?;
                    print_json(&outcome)?;
                    outcome_changed(&outcome)
                }
            };
            save_library(manager.library(), &library, changed)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    setup_logger(cli.verbose);
    log::trace!("Args: {:?}", cli);

    if let Err(e) = run(cli) {
        eprintln!("\nError: {}", e);
        process::exit(1);
    }
}
