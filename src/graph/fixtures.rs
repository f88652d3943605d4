//! Hand-built graph snapshots shared by the unit tests.

use super::*;

pub(crate) fn episode(id: &str, episode_type: EpisodeType, number: i32, title: &str) -> EpisodeInfo {
    EpisodeInfo {
        id: id.to_string(),
        episode_type,
        number,
        titles: vec![
            TextCandidate::new(TextSource::AniDb, "en", title),
            TextCandidate::new(TextSource::AniDb, "ja", &format!("{title} (ja)")),
        ],
        default_title: title.to_string(),
        descriptions: vec![TextCandidate::new(
            TextSource::AniDb,
            "en",
            &format!("About {title}."),
        )],
        default_description: String::new(),
        aired_at: None,
        runtime: None,
        rating: None,
        anidb_id: None,
        tmdb_id: None,
        tvdb_id: None,
        placement: None,
    }
}

pub(crate) fn season(id: &str, season_type: SeasonType, name: &str) -> SeasonInfo {
    SeasonInfo {
        id: id.to_string(),
        season_type,
        name: name.to_string(),
        titles: vec![
            TextCandidate::new(TextSource::AniDb, "en", name),
            TextCandidate::new(TextSource::AniDb, "ja", &format!("{name} (ja)")),
        ],
        descriptions: vec![TextCandidate::new(
            TextSource::AniDb,
            "en",
            &format!("The story of {name}."),
        )],
        default_description: String::new(),
        episodes: Vec::new(),
        specials: Vec::new(),
        extras: Vec::new(),
        country_code: Some("JP".to_string()),
        rating: None,
        content_ratings: BTreeMap::new(),
        tags: Vec::new(),
        genres: Vec::new(),
        studios: Vec::new(),
        aired_at: None,
    }
}

/// Season with `normal` regular episodes and `specials` specials, ids
/// `{id}-e{n}` and `{id}-sp{n}`.
pub(crate) fn tv_season(id: &str, name: &str, normal: i32, specials: i32) -> SeasonInfo {
    let mut season = season(id, SeasonType::Tv, name);
    season.episodes = (1..=normal)
        .map(|n| episode(&format!("{id}-e{n}"), EpisodeType::Normal, n, &format!("{name} {n}")))
        .collect();
    season.specials = (1..=specials)
        .map(|n| {
            episode(
                &format!("{id}-sp{n}"),
                EpisodeType::Special,
                n,
                &format!("{name} Special {n}"),
            )
        })
        .collect();
    season
}

pub(crate) fn show(seasons: Vec<SeasonInfo>) -> ShowInfo {
    ShowInfo {
        group_id: Some("g1".to_string()),
        name: "Test Show".to_string(),
        seasons,
        custom_rating: None,
        extra_ids: BTreeSet::new(),
    }
}

/// Two TV seasons: `s1` with 3 episodes and 2 specials, `s2` with 2 episodes
/// and 3 specials. `x9` is an extra id of the show.
pub(crate) fn two_season_show() -> ShowInfo {
    let mut show = show(vec![
        tv_season("s1", "First", 3, 2),
        tv_season("s2", "Second", 2, 3),
    ]);
    show.extra_ids.insert("x9".to_string());
    show
}

pub(crate) fn file(id: &str, season_id: &str, episodes: &[&EpisodeInfo]) -> FileInfo {
    FileInfo {
        id: id.to_string(),
        season_id: season_id.to_string(),
        episodes: episodes
            .iter()
            .map(|e| FileEpisode {
                episode: (*e).clone(),
                cross_reference: CrossReference::default(),
            })
            .collect(),
    }
}
