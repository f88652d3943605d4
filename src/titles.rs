//! Title and description resolution
//!
//! Picks display strings out of the multilingual candidates a catalog hands
//! out, following an ordered language preference list. Also home to the
//! movie-title rules, multi-episode joining and the type prefixes used to
//! mark specials.

use crate::graph::{EpisodeInfo, EpisodeType, SeasonInfo, SeasonType, TextCandidate, TextSource};
use crate::ordering::{OrderingError, special_index};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog whose titles count as the "original" ones
pub const PRIMARY_SOURCE: TextSource = TextSource::AniDb;

/// Episode titles that carry no information of their own.
///
/// Single-movie seasons usually name their only episode like this.
pub const PLACEHOLDER_TITLES: &[&str] = &[
    "Complete Movie",
    "Music Video",
    "OAD",
    "OVA",
    "Short Movie",
    "Special",
    "TV Special",
    "Web",
];

/// Title of the main entry in a movie season
pub const MAIN_MOVIE_TITLE: &str = "Complete Movie";

/// A single entry of a language preference list.
///
/// Serialized as a plain string: `metadata`, `origin`, `default` or a
/// language code such as `en`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TitleLanguage {
    /// The language the host asked for when requesting the item
    Metadata,
    /// The native language of the season's country of origin
    Origin,
    /// Stop looking and use the catalog default
    Default,
    /// A literal language code
    Code(String),
}

impl From<String> for TitleLanguage {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "metadata" => TitleLanguage::Metadata,
            "origin" => TitleLanguage::Origin,
            "default" => TitleLanguage::Default,
            code => TitleLanguage::Code(code.to_string()),
        }
    }
}

impl From<TitleLanguage> for String {
    fn from(value: TitleLanguage) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TitleLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TitleLanguage::Metadata => write!(f, "metadata"),
            TitleLanguage::Origin => write!(f, "origin"),
            TitleLanguage::Default => write!(f, "default"),
            TitleLanguage::Code(code) => write!(f, "{}", code),
        }
    }
}

/// How values of a multi-episode file are joined into one string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinPolicy {
    pub title_separator: String,
    pub description_separator: String,
    /// Drop a value equal to the one right before it
    pub dedupe_adjacent: bool,
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self {
            title_separator: " / ".to_string(),
            description_separator: "\n\n".to_string(),
            dedupe_adjacent: true,
        }
    }
}

/// Language context of a single resolution request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageContext<'a> {
    /// Language requested by the host for the item
    pub metadata_language: &'a str,
    /// Native language of the content, if known
    pub origin_language: Option<&'a str>,
}

impl<'a> LanguageContext<'a> {
    /// Builds the context for an item of `season`
    pub fn for_season(metadata_language: &'a str, season: &SeasonInfo) -> Self {
        Self {
            metadata_language,
            origin_language: season.country_code.as_deref().and_then(origin_language),
        }
    }
}

/// Display title plus the original-language alternate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTitles {
    pub display: String,
    pub alternate: Option<String>,
}

/// Maps a country of origin to the language its titles are written in
pub fn origin_language(country_code: &str) -> Option<&'static str> {
    match country_code.to_ascii_uppercase().as_str() {
        "JP" => Some("ja"),
        "KR" => Some("ko"),
        "CN" | "TW" | "HK" => Some("zh"),
        _ => None,
    }
}

/// Picks the candidate matching the first satisfiable preference.
///
/// Falls back to `fallback` when nothing matches or a `default` entry is
/// reached first. Empty candidates never match.
pub fn resolve_text(
    candidates: &[TextCandidate],
    preferences: &[TitleLanguage],
    context: &LanguageContext<'_>,
    fallback: &str,
) -> String {
    for preference in preferences {
        let language = match preference {
            TitleLanguage::Default => break,
            TitleLanguage::Metadata => context.metadata_language,
            TitleLanguage::Origin => match context.origin_language {
                Some(language) => language,
                None => continue,
            },
            TitleLanguage::Code(code) => code.as_str(),
        };

        let found = candidates
            .iter()
            .find(|c| c.language.eq_ignore_ascii_case(language) && !c.value.trim().is_empty());

        if let Some(candidate) = found {
            return candidate.value.clone();
        }
    }

    fallback.to_string()
}

/// Picks the original-language title from the primary catalog.
///
/// Prefers a value different from `display`; returns `None` when the
/// primary catalog has no title in the origin language.
pub fn alternate_title(
    candidates: &[TextCandidate],
    display: &str,
    context: &LanguageContext<'_>,
) -> Option<String> {
    let language = context.origin_language?;

    let mut native = candidates.iter().filter(|c| {
        c.source == PRIMARY_SOURCE
            && c.language.eq_ignore_ascii_case(language)
            && !c.value.trim().is_empty()
    });

    let first = native.next()?;
    if first.value != display {
        return Some(first.value.clone());
    }

    native
        .find(|c| c.value != display)
        .map(|c| c.value.clone())
        .or_else(|| Some(first.value.clone()))
}

fn resolve_titles(
    candidates: &[TextCandidate],
    fallback: &str,
    preferences: &[TitleLanguage],
    context: &LanguageContext<'_>,
) -> ResolvedTitles {
    let display = resolve_text(candidates, preferences, context, fallback);
    let alternate = alternate_title(candidates, &display, context);
    ResolvedTitles { display, alternate }
}

/// Resolves the titles of an episode
pub fn episode_titles(
    episode: &EpisodeInfo,
    preferences: &[TitleLanguage],
    context: &LanguageContext<'_>,
) -> ResolvedTitles {
    resolve_titles(&episode.titles, &episode.default_title, preferences, context)
}

/// Resolves the titles of a season, falling back to its display name
pub fn season_titles(
    season: &SeasonInfo,
    preferences: &[TitleLanguage],
    context: &LanguageContext<'_>,
) -> ResolvedTitles {
    resolve_titles(&season.titles, &season.name, preferences, context)
}

/// The episode's primary-catalog English title, or its default title
fn main_title(episode: &EpisodeInfo) -> &str {
    episode
        .title_for(PRIMARY_SOURCE, "en")
        .unwrap_or(&episode.default_title)
        .trim()
}

/// True if the episode's main title is one of [`PLACEHOLDER_TITLES`]
pub fn has_placeholder_title(episode: &EpisodeInfo) -> bool {
    PLACEHOLDER_TITLES.contains(&main_title(episode))
}

/// True if the episode is the main entry of a movie season
pub fn is_main_movie_entry(episode: &EpisodeInfo) -> bool {
    episode.episode_type == EpisodeType::Normal && main_title(episode) == MAIN_MOVIE_TITLE
}

/// Decides whether an episode is titled as a movie.
///
/// Episodes of movie seasons always are; elsewhere the first normal episode
/// is, when its title is a placeholder.
pub fn uses_movie_title(season: &SeasonInfo, episode: &EpisodeInfo) -> bool {
    match episode.episode_type {
        EpisodeType::Normal | EpisodeType::Special if season.season_type == SeasonType::Movie => {
            true
        }
        EpisodeType::Normal => episode.number == 1 && has_placeholder_title(episode),
        EpisodeType::Special
        | EpisodeType::Trailer
        | EpisodeType::ThemeSong
        | EpisodeType::OpeningSong
        | EpisodeType::EndingSong
        | EpisodeType::Parody
        | EpisodeType::Interview
        | EpisodeType::Extra
        | EpisodeType::Other => false,
    }
}

/// Resolves the titles of a movie entry.
///
/// The season name wins when the episode title is a placeholder or the
/// season holds a single movie. Entries of a multi-movie collection keep
/// their own titles.
pub fn movie_titles(
    episode: &EpisodeInfo,
    season: &SeasonInfo,
    preferences: &[TitleLanguage],
    context: &LanguageContext<'_>,
) -> ResolvedTitles {
    if has_placeholder_title(episode) || season.movie_entry_count() <= 1 {
        season_titles(season, preferences, context)
    } else {
        episode_titles(episode, preferences, context)
    }
}

/// Resolves the titles of a single entry of an episode item, switching to
/// the movie rules where they apply
pub fn item_titles(
    episode: &EpisodeInfo,
    season: &SeasonInfo,
    preferences: &[TitleLanguage],
    context: &LanguageContext<'_>,
) -> ResolvedTitles {
    if uses_movie_title(season, episode) {
        movie_titles(episode, season, preferences, context)
    } else {
        episode_titles(episode, preferences, context)
    }
}

/// Joins per-episode values into one string.
///
/// Empty values are skipped; with `dedupe_adjacent` a value equal to the one
/// before it is skipped too. Returns `None` if nothing is left.
pub fn join_text<I>(values: I, separator: &str, dedupe_adjacent: bool) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let mut kept: Vec<String> = Vec::new();

    for value in values {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if dedupe_adjacent && kept.last().is_some_and(|last| last == value) {
            continue;
        }
        kept.push(value.to_string());
    }

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(separator))
    }
}

/// Returns the tag marking a non-normal episode, e.g. `S3` or `C1`.
///
/// Specials use their 1-based position in the season's specials list, every
/// other type its native number. Normal episodes get no tag.
pub fn type_prefix(season: &SeasonInfo, episode: &EpisodeInfo) -> Result<Option<String>, OrderingError> {
    let prefix = match episode.episode_type {
        EpisodeType::Normal => return Ok(None),
        EpisodeType::Special => {
            let index = special_index(season, episode)?;
            format!("S{}", index + 1)
        }
        EpisodeType::ThemeSong | EpisodeType::OpeningSong | EpisodeType::EndingSong => {
            format!("C{}", episode.number)
        }
        EpisodeType::Trailer => format!("T{}", episode.number),
        EpisodeType::Parody => format!("P{}", episode.number),
        EpisodeType::Interview | EpisodeType::Extra | EpisodeType::Other => {
            format!("U{}", episode.number)
        }
    };

    Ok(Some(prefix))
}

/// Prefixes both titles with the episode's type tag
pub fn apply_type_prefix(
    titles: ResolvedTitles,
    season: &SeasonInfo,
    episode: &EpisodeInfo,
) -> Result<ResolvedTitles, OrderingError> {
    let Some(prefix) = type_prefix(season, episode)? else {
        return Ok(titles);
    };

    Ok(ResolvedTitles {
        display: format!("{} {}", prefix, titles.display),
        alternate: titles.alternate.map(|alt| format!("{} {}", prefix, alt)),
    })
}
