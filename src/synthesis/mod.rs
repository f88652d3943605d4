//! Metadata synthesis
//!
//! This module turns a resolved graph tuple (show, season, episode and an
//! optional file) into the normalized records handed to the host's item
//! model: one for episodes, one for movies and one for plain videos. It
//! performs no I/O; [`provider`] wraps it with graph lookups.

pub mod provider;

use crate::config::Config;
use crate::graph::{EpisodeInfo, FileInfo, Rating, SeasonInfo, ShowInfo};
use crate::ordering::{self, OrderingError};
use crate::synopsis::sanitize_synopsis;
use crate::titles::{
    LanguageContext, ResolvedTitles, apply_type_prefix, episode_titles, is_main_movie_entry,
    item_titles, join_text, movie_titles, resolve_text,
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while synthesizing a record
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The graph snapshot violates an ordering invariant
    #[error("Ordering invariant violated: {0}")]
    Ordering(#[from] OrderingError),

    /// A file without any linked episode was handed in
    #[error("File {file_id} is not linked to any episode")]
    EmptyFile { file_id: String },
}

/// Language and country the host requests metadata in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    /// Language code, e.g. `en`
    pub language: String,
    /// Country code, e.g. `US`
    pub country: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            country: "US".to_string(),
        }
    }
}

/// Identifier tags attached to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ProviderKey {
    #[serde(rename = "Catalog Episode")]
    Episode,
    #[serde(rename = "Catalog File")]
    File,
    #[serde(rename = "Catalog Series")]
    Season,
    #[serde(rename = "AniDB")]
    AniDb,
    #[serde(rename = "Tmdb")]
    Tmdb,
    #[serde(rename = "Tvdb")]
    Tvdb,
}

pub type ProviderIds = BTreeMap<ProviderKey, String>;

/// Normalized metadata of an episode item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeMetadata {
    pub name: String,
    pub original_title: Option<String>,
    pub index_number: i32,
    /// Last episode number covered by a multi-episode file
    pub index_number_end: Option<i32>,
    pub parent_index_number: i32,
    pub airs_before_episode_number: Option<i32>,
    pub airs_before_season_number: Option<i32>,
    pub airs_after_season_number: Option<i32>,
    pub overview: Option<String>,
    pub premiere_date: Option<NaiveDate>,
    pub runtime: Option<Duration>,
    /// Rating on a 0-10 scale
    pub community_rating: Option<f32>,
    pub custom_rating: Option<String>,
    /// Content rating, e.g. `TV-14`
    pub official_rating: Option<String>,
    pub production_locations: Vec<String>,
    pub provider_ids: ProviderIds,
}

/// Normalized metadata of a movie item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieMetadata {
    pub name: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub premiere_date: Option<NaiveDate>,
    pub production_year: Option<i32>,
    pub community_rating: Option<f32>,
    pub official_rating: Option<String>,
    pub tags: Vec<String>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub provider_ids: ProviderIds,
}

/// Normalized metadata of a plain video item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub name: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub premiere_date: Option<NaiveDate>,
    pub production_year: Option<i32>,
    pub community_rating: Option<f32>,
}

/// Builds the episode record for an episode of `season`.
///
/// For a multi-episode `file` every linked episode is titled and described
/// on its own and the results are joined; numbering and type tags always
/// follow `episode`, the file's first entry.
///
/// # Errors
///
/// Fails only when the snapshot breaks an ordering invariant, e.g. a
/// special that is missing from its season's specials list.
pub fn synthesize_episode(
    show: &ShowInfo,
    season: &SeasonInfo,
    episode: &EpisodeInfo,
    file: Option<&FileInfo>,
    locale: &Locale,
    config: &Config,
) -> Result<EpisodeMetadata, SynthesisError> {
    let context = LanguageContext::for_season(&locale.language, season);
    let policy = config.ordering();
    let multi_file = file.filter(|f| f.is_multi_episode());

    let (titles, overview) = match multi_file {
        Some(file) => {
            let mut displays = Vec::with_capacity(file.episodes.len());
            let mut alternates = Vec::with_capacity(file.episodes.len());
            let mut descriptions = Vec::with_capacity(file.episodes.len());

            for entry in &file.episodes {
                let titles = item_titles(&entry.episode, season, &config.title_languages, &context);
                alternates.push(titles.alternate);
                displays.push(titles.display);
                descriptions.push(episode_description(&entry.episode, config, &context));
            }

            // Episodes without an alternate contribute their display title
            let join = &config.join;
            let alternate = if alternates.iter().any(Option::is_some) {
                let aligned = alternates
                    .into_iter()
                    .zip(&displays)
                    .map(|(alternate, display)| alternate.unwrap_or_else(|| display.clone()));
                join_text(aligned, &join.title_separator, join.dedupe_adjacent)
            } else {
                None
            };
            let titles = ResolvedTitles {
                display: join_text(displays, &join.title_separator, join.dedupe_adjacent)
                    .unwrap_or_default(),
                alternate,
            };
            let overview = join_text(
                descriptions,
                &join.description_separator,
                join.dedupe_adjacent,
            );
            (titles, overview)
        }
        None => (
            item_titles(episode, season, &config.title_languages, &context),
            non_empty(episode_description(episode, config, &context)),
        ),
    };

    let titles = if config.mark_specials_when_grouped {
        apply_type_prefix(titles, season, episode)?
    } else {
        titles
    };

    let episode_number = ordering::episode_number(show, season, episode, &policy)?;
    let season_number = ordering::season_number(show, season, episode, &policy);
    let placement = ordering::special_placement(show, season, episode, &policy)?;

    let index_number_end = multi_file.and_then(|file| {
        let end = episode_number + file.episodes.len() as i32 - 1;
        (end != episode_number && episode.number != end).then_some(end)
    });

    let name = if titles.display.is_empty() {
        format!("Episode {}", episode_number)
    } else {
        titles.display
    };

    Ok(EpisodeMetadata {
        name,
        original_title: titles.alternate,
        index_number: episode_number,
        index_number_end,
        parent_index_number: season_number,
        airs_before_episode_number: placement.airs_before_episode,
        airs_before_season_number: placement.airs_before_season,
        airs_after_season_number: placement.airs_after_season,
        overview,
        premiere_date: episode.aired_at,
        runtime: episode.runtime,
        community_rating: community_rating(episode.rating.as_ref(), season.rating.as_ref()),
        custom_rating: show.custom_rating.clone(),
        official_rating: content_rating(season, &locale.country),
        production_locations: production_locations(season),
        provider_ids: provider_ids(episode, file, config),
    })
}

/// Builds the movie record for the movie stored in `file`.
///
/// Collections holding several movies describe and rate each entry on its
/// own, except the main entry which speaks for the whole season.
pub fn synthesize_movie(
    season: &SeasonInfo,
    file: &FileInfo,
    locale: &Locale,
    config: &Config,
) -> Result<MovieMetadata, SynthesisError> {
    let episode = file.first_episode().ok_or_else(|| SynthesisError::EmptyFile {
        file_id: file.id.clone(),
    })?;
    let context = LanguageContext::for_season(&locale.language, season);

    let titles = movie_titles(episode, season, &config.title_languages, &context);

    let is_multi_entry = season.movie_entry_count() > 1;
    let is_main_entry = is_main_movie_entry(episode);
    let per_entry = is_multi_entry && !is_main_entry;

    let (overview, rating) = if per_entry {
        (
            episode_description(episode, config, &context),
            scaled(episode.rating.as_ref()),
        )
    } else {
        (
            season_description(season, config, &context),
            scaled(season.rating.as_ref()),
        )
    };

    let name = if titles.display.is_empty() {
        season.name.clone()
    } else {
        titles.display
    };

    Ok(MovieMetadata {
        name,
        original_title: titles.alternate,
        overview: non_empty(overview),
        premiere_date: episode.aired_at,
        production_year: episode.aired_at.map(|date| date.year()),
        community_rating: rating,
        official_rating: content_rating(season, &locale.country),
        tags: season.tags.clone(),
        genres: season.genres.clone(),
        studios: season.studios.clone(),
        provider_ids: provider_ids(episode, Some(file), config),
    })
}

/// Builds the record for a plain video backed by `episode`
pub fn synthesize_video(
    season: &SeasonInfo,
    episode: &EpisodeInfo,
    locale: &Locale,
    config: &Config,
) -> VideoMetadata {
    let context = LanguageContext::for_season(&locale.language, season);
    let titles = episode_titles(episode, &config.title_languages, &context);

    VideoMetadata {
        name: titles.display,
        original_title: titles.alternate,
        overview: non_empty(episode_description(episode, config, &context)),
        premiere_date: episode.aired_at,
        production_year: episode.aired_at.or(season.aired_at).map(|date| date.year()),
        community_rating: scaled(episode.rating.as_ref()),
    }
}

/// Resolves and sanitizes the description of an episode
fn episode_description(episode: &EpisodeInfo, config: &Config, context: &LanguageContext<'_>) -> String {
    let raw = resolve_text(
        &episode.descriptions,
        &config.description_languages,
        context,
        &episode.default_description,
    );
    sanitize_synopsis(&raw, &config.synopsis)
}

/// Resolves and sanitizes the description of a season
fn season_description(season: &SeasonInfo, config: &Config, context: &LanguageContext<'_>) -> String {
    let raw = resolve_text(
        &season.descriptions,
        &config.description_languages,
        context,
        &season.default_description,
    );
    sanitize_synopsis(&raw, &config.synopsis)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// A positive rating on the 0-10 scale
fn scaled(rating: Option<&Rating>) -> Option<f32> {
    rating
        .filter(|r| r.is_positive())
        .map(|r| r.to_scale(10.0))
}

/// The episode's own rating when usable, else the season's
fn community_rating(episode: Option<&Rating>, season: Option<&Rating>) -> Option<f32> {
    scaled(episode).or_else(|| scaled(season))
}

/// Looks the content rating up for the requested country, falling back to
/// the season's country of origin
fn content_rating(season: &SeasonInfo, country: &str) -> Option<String> {
    let lookup = |code: &str| {
        season
            .content_ratings
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(code))
            .map(|(_, rating)| rating.clone())
    };

    lookup(country).or_else(|| season.country_code.as_deref().and_then(lookup))
}

/// Production locations derived from the season's country of origin
fn production_locations(season: &SeasonInfo) -> Vec<String> {
    season
        .country_code
        .as_deref()
        .map(|code| country_name(code).map_or_else(|| code.to_string(), str::to_string))
        .into_iter()
        .collect()
}

fn country_name(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "JP" => Some("Japan"),
        "KR" => Some("South Korea"),
        "CN" => Some("China"),
        "TW" => Some("Taiwan"),
        "HK" => Some("Hong Kong"),
        "US" => Some("United States of America"),
        "GB" => Some("United Kingdom"),
        "FR" => Some("France"),
        _ => None,
    }
}

/// True if a secondary catalog id is worth tagging
fn usable_id(id: Option<&str>) -> Option<&str> {
    id.filter(|id| !id.is_empty() && *id != "0")
}

/// Collects the identifier tags of a record.
///
/// The episode id is always present, file and season ids whenever a file is
/// known, secondary catalog ids only when enabled and set.
fn provider_ids(episode: &EpisodeInfo, file: Option<&FileInfo>, config: &Config) -> ProviderIds {
    let mut ids = ProviderIds::new();
    ids.insert(ProviderKey::Episode, episode.id.clone());

    if let Some(file) = file {
        if !file.id.is_empty() {
            ids.insert(ProviderKey::File, file.id.clone());
        }
        if !file.season_id.is_empty() {
            ids.insert(ProviderKey::Season, file.season_id.clone());
        }
    }

    let secondary = [
        (config.add_anidb_id, ProviderKey::AniDb, episode.anidb_id.as_deref()),
        (config.add_tmdb_id, ProviderKey::Tmdb, episode.tmdb_id.as_deref()),
        (config.add_tvdb_id, ProviderKey::Tvdb, episode.tvdb_id.as_deref()),
    ];
    for (enabled, key, id) in secondary {
        if let Some(id) = usable_id(id).filter(|_| enabled) {
            ids.insert(key, id.to_string());
        }
    }

    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EpisodeType, SeasonType, fixtures};
    use crate::titles::TitleLanguage;

    fn config() -> Config {
        Config {
            title_languages: vec![TitleLanguage::Metadata],
            ..Config::default()
        }
    }

    #[test]
    fn test_episode_record_basics() {
        let mut show = fixtures::two_season_show();
        show.custom_rating = Some("Custom".to_string());
        show.seasons[1].content_ratings.insert("US".to_string(), "TV-14".to_string());
        show.seasons[1].episodes[0].rating = Some(Rating {
            value: 8.0,
            max_value: 10.0,
        });
        let season = &show.seasons[1];
        let episode = &season.episodes[0];

        let record =
            synthesize_episode(&show, season, episode, None, &Locale::default(), &config()).unwrap();

        assert_eq!(record.name, "Second 1");
        assert_eq!(record.original_title.as_deref(), Some("Second 1 (ja)"));
        assert_eq!(record.index_number, 1);
        assert_eq!(record.parent_index_number, 1);
        assert_eq!(record.index_number_end, None);
        assert_eq!(record.overview.as_deref(), Some("About Second 1."));
        assert_eq!(record.community_rating, Some(8.0));
        assert_eq!(record.custom_rating.as_deref(), Some("Custom"));
        assert_eq!(record.official_rating.as_deref(), Some("TV-14"));
        assert_eq!(record.production_locations, vec!["Japan".to_string()]);
        assert_eq!(
            record.provider_ids.get(&ProviderKey::Episode).map(String::as_str),
            Some("s2-e1")
        );
    }

    #[test]
    fn test_grouped_episode_numbers_flow_into_record() {
        let show = fixtures::two_season_show();
        let season = &show.seasons[1];
        let config = Config {
            use_groups: true,
            ..config()
        };

        let record =
            synthesize_episode(&show, season, &season.episodes[1], None, &Locale::default(), &config)
                .unwrap();
        assert_eq!(record.index_number, 5);
        assert_eq!(record.parent_index_number, 2);
    }

    #[test]
    fn test_marked_special_title_and_placement() {
        let mut show = fixtures::two_season_show();
        show.seasons[1].specials[2].titles.clear();
        show.seasons[1].specials[2].default_title = "Recap".to_string();
        let season = &show.seasons[1];
        let special = &season.specials[2];
        let config = Config {
            mark_specials_when_grouped: true,
            use_groups: true,
            ..config()
        };

        let record =
            synthesize_episode(&show, season, special, None, &Locale::default(), &config).unwrap();

        assert_eq!(record.name, "S3 Recap");
        assert_eq!(record.original_title, None);
        assert_eq!(record.parent_index_number, 0);
        assert_eq!(record.airs_after_season_number, Some(2));
    }

    #[test]
    fn test_unlisted_special_fails_synthesis() {
        let show = fixtures::two_season_show();
        let season = &show.seasons[0];
        let stray = fixtures::episode("stray", EpisodeType::Special, 1, "Stray");
        let config = Config {
            mark_specials_when_grouped: true,
            ..config()
        };

        let result = synthesize_episode(&show, season, &stray, None, &Locale::default(), &config);
        assert!(matches!(result, Err(SynthesisError::Ordering(_))));
    }

    #[test]
    fn test_multi_episode_file_joins_titles_and_descriptions() {
        let show = fixtures::two_season_show();
        let season = &show.seasons[0];
        let first = &season.episodes[0];
        let second = &season.episodes[1];
        let file = fixtures::file("f1", "s1", &[first, second]);

        let record =
            synthesize_episode(&show, season, first, Some(&file), &Locale::default(), &config())
                .unwrap();

        assert_eq!(record.name, "First 1 / First 2");
        assert_eq!(record.original_title.as_deref(), Some("First 1 (ja) / First 2 (ja)"));
        assert_eq!(record.overview.as_deref(), Some("About First 1.\n\nAbout First 2."));
        assert_eq!(record.index_number, 1);
        assert_eq!(record.index_number_end, Some(2));
        assert_eq!(record.provider_ids.get(&ProviderKey::File).map(String::as_str), Some("f1"));
        assert_eq!(record.provider_ids.get(&ProviderKey::Season).map(String::as_str), Some("s1"));
    }

    #[test]
    fn test_multi_episode_alternate_covers_every_episode() {
        let mut show = fixtures::two_season_show();
        show.seasons[0].episodes[0].titles.clear();
        show.seasons[0].episodes[0].default_title = "Plain".to_string();
        let season = &show.seasons[0];
        let file = fixtures::file("f1", "s1", &[&season.episodes[0], &season.episodes[1]]);

        let record =
            synthesize_episode(&show, season, &season.episodes[0], Some(&file), &Locale::default(), &config())
                .unwrap();

        assert_eq!(record.name, "Plain / First 2");
        assert_eq!(record.original_title.as_deref(), Some("Plain / First 2 (ja)"));
    }

    #[test]
    fn test_multi_episode_join_policy_is_configurable() {
        let mut show = fixtures::two_season_show();
        for episode in &mut show.seasons[0].episodes {
            episode.titles.clear();
            episode.default_title = "Double Feature".to_string();
        }
        let season = &show.seasons[0];
        let file = fixtures::file("f1", "s1", &[&season.episodes[0], &season.episodes[1]]);

        let deduped =
            synthesize_episode(&show, season, &season.episodes[0], Some(&file), &Locale::default(), &config())
                .unwrap();
        assert_eq!(deduped.name, "Double Feature");

        let mut keep_all = config();
        keep_all.join.dedupe_adjacent = false;
        keep_all.join.title_separator = " | ".to_string();
        let kept =
            synthesize_episode(&show, season, &season.episodes[0], Some(&file), &Locale::default(), &keep_all)
                .unwrap();
        assert_eq!(kept.name, "Double Feature | Double Feature");
    }

    #[test]
    fn test_movie_season_episode_uses_season_name() {
        let mut season = fixtures::season("m", SeasonType::Movie, "Movie Collection");
        season.episodes = vec![
            fixtures::episode("m-e1", EpisodeType::Normal, 1, "Complete Movie"),
            fixtures::episode("m-e2", EpisodeType::Normal, 2, "Complete Movie"),
        ];
        let show = fixtures::show(vec![season.clone()]);

        let record = synthesize_episode(
            &show,
            &season,
            &season.episodes[0],
            None,
            &Locale::default(),
            &config(),
        )
        .unwrap();
        assert_eq!(record.name, "Movie Collection");
        assert_ne!(record.name, "Complete Movie");
    }

    #[test]
    fn test_rating_falls_back_to_season() {
        let mut show = fixtures::two_season_show();
        show.seasons[0].rating = Some(Rating {
            value: 700.0,
            max_value: 1000.0,
        });
        show.seasons[0].episodes[0].rating = Some(Rating {
            value: 0.0,
            max_value: 10.0,
        });
        let season = &show.seasons[0];

        let record =
            synthesize_episode(&show, season, &season.episodes[0], None, &Locale::default(), &config())
                .unwrap();
        assert_eq!(record.community_rating, Some(7.0));
    }

    #[test]
    fn test_secondary_ids_follow_toggles() {
        let mut episode = fixtures::episode("e1", EpisodeType::Normal, 1, "x");
        episode.anidb_id = Some("123".to_string());
        episode.tmdb_id = Some("0".to_string());
        episode.tvdb_id = Some("456".to_string());

        let mut config = config();
        config.add_tvdb_id = false;

        let ids = provider_ids(&episode, None, &config);
        assert_eq!(ids.get(&ProviderKey::AniDb).map(String::as_str), Some("123"));
        assert!(!ids.contains_key(&ProviderKey::Tmdb));
        assert!(!ids.contains_key(&ProviderKey::Tvdb));
        assert!(!ids.contains_key(&ProviderKey::File));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_content_rating_falls_back_to_origin_country() {
        let mut season = fixtures::season("s", SeasonType::Tv, "S");
        season.content_ratings.insert("jp".to_string(), "R15+".to_string());

        assert_eq!(content_rating(&season, "US").as_deref(), Some("R15+"));
        season.country_code = None;
        assert_eq!(content_rating(&season, "US"), None);
    }

    #[test]
    fn test_movie_record_main_and_side_entries() {
        let mut season = fixtures::season("m", SeasonType::Movie, "Collection");
        season.rating = Some(Rating {
            value: 9.0,
            max_value: 10.0,
        });
        let mut main = fixtures::episode("m-e1", EpisodeType::Normal, 1, "Complete Movie");
        main.rating = Some(Rating {
            value: 5.0,
            max_value: 10.0,
        });
        let mut side = fixtures::episode("m-e2", EpisodeType::Normal, 2, "Side Story");
        side.rating = Some(Rating {
            value: 6.0,
            max_value: 10.0,
        });
        side.aired_at = NaiveDate::from_ymd_opt(2016, 8, 26);
        season.episodes = vec![main.clone(), side.clone()];

        let main_file = fixtures::file("f-main", "m", &[&main]);
        let record = synthesize_movie(&season, &main_file, &Locale::default(), &config()).unwrap();
        assert_eq!(record.name, "Collection");
        assert_eq!(record.community_rating, Some(9.0));
        assert_eq!(record.overview.as_deref(), Some("The story of Collection."));

        let side_file = fixtures::file("f-side", "m", &[&side]);
        let record = synthesize_movie(&season, &side_file, &Locale::default(), &config()).unwrap();
        assert_eq!(record.name, "Side Story");
        assert_eq!(record.community_rating, Some(6.0));
        assert_eq!(record.overview.as_deref(), Some("About Side Story."));
        assert_eq!(record.production_year, Some(2016));
        assert_eq!(
            record.provider_ids.get(&ProviderKey::File).map(String::as_str),
            Some("f-side")
        );
    }

    #[test]
    fn test_movie_from_empty_file_fails() {
        let season = fixtures::season("m", SeasonType::Movie, "Collection");
        let file = fixtures::file("empty", "m", &[]);
        let result = synthesize_movie(&season, &file, &Locale::default(), &config());
        assert!(matches!(result, Err(SynthesisError::EmptyFile { .. })));
    }

    #[test]
    fn test_video_record() {
        let mut season = fixtures::season("s", SeasonType::Web, "Shorts");
        season.aired_at = NaiveDate::from_ymd_opt(2020, 1, 1);
        let episode = fixtures::episode("e", EpisodeType::Normal, 1, "Short One");

        let record = synthesize_video(&season, &episode, &Locale::default(), &config());
        assert_eq!(record.name, "Short One");
        assert_eq!(record.production_year, Some(2020));
        assert_eq!(record.community_rating, None);
    }

    #[test]
    fn test_description_is_sanitized() {
        let mut show = fixtures::two_season_show();
        show.seasons[0].episodes[0].descriptions = vec![crate::graph::TextCandidate::new(
            crate::graph::TextSource::AniDb,
            "en",
            "Plot http://anidb.net/ch1 [Hero] acts.\nSource: ANN",
        )];
        let season = &show.seasons[0];

        let record =
            synthesize_episode(&show, season, &season.episodes[0], None, &Locale::default(), &config())
                .unwrap();
        assert_eq!(record.overview.as_deref(), Some("Plot  acts."));
    }
}
