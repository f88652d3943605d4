//! Episode and season numbering
//!
//! This module computes display numbers for episodes: the episode index, the
//! season index and the placement of specials relative to normal content.
//! Every function here is pure; the show-level grouping policy is passed in
//! explicitly.

use crate::graph::{EpisodeInfo, EpisodeType, PlacementHint, SeasonInfo, SeasonType, ShowInfo};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when the graph snapshot breaks an ordering invariant
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderingError {
    /// A special is missing from its own season's specials list
    #[error("Special {episode_id} is not listed in the specials of season {season_id}")]
    SpecialNotListed {
        episode_id: String,
        season_id: String,
    },
}

/// Which seasons take part in continuous numbering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupFilter {
    /// Every season of the show
    #[default]
    Default,
    /// Only movie seasons
    Movies,
    /// Every season except movies
    Others,
}

impl GroupFilter {
    /// Returns true if a season of the given type participates
    pub fn admits(self, season_type: SeasonType) -> bool {
        match self {
            GroupFilter::Default => true,
            GroupFilter::Movies => season_type == SeasonType::Movie,
            GroupFilter::Others => season_type != SeasonType::Movie,
        }
    }
}

/// Show-level numbering policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderingPolicy {
    /// Flatten participating seasons into one continuous run
    pub use_groups: bool,
    pub group_filter: GroupFilter,
}

/// Where a special airs relative to normal content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpecialPlacement {
    pub airs_before_episode: Option<i32>,
    pub airs_before_season: Option<i32>,
    pub airs_after_season: Option<i32>,
    pub is_special: bool,
}

impl SpecialPlacement {
    /// Sentinel returned for every non-special episode
    pub const NOT_SPECIAL: SpecialPlacement = SpecialPlacement {
        airs_before_episode: None,
        airs_before_season: None,
        airs_after_season: None,
        is_special: false,
    };
}

/// Seasons of the show that take part in grouped numbering, in show order
fn participating<'a>(
    show: &'a ShowInfo,
    policy: &'a OrderingPolicy,
) -> impl Iterator<Item = &'a SeasonInfo> + 'a {
    show.seasons
        .iter()
        .filter(move |s| policy.group_filter.admits(s.season_type))
}

/// Returns the 0-based position of `season` within the grouped run, or
/// `None` when the season is numbered on its own.
fn grouped_position(show: &ShowInfo, season: &SeasonInfo, policy: &OrderingPolicy) -> Option<usize> {
    if !policy.use_groups || !policy.group_filter.admits(season.season_type) {
        return None;
    }

    participating(show, policy).position(|s| s.id == season.id)
}

/// 1-based ordinal of the season: its grouped position, or 1 when ungrouped
pub fn season_ordinal(show: &ShowInfo, season: &SeasonInfo, policy: &OrderingPolicy) -> i32 {
    grouped_position(show, season, policy).map_or(1, |position| position as i32 + 1)
}

/// Returns the 0-based position of a special within its season's list.
///
/// The episode is expected to come from `season.specials`; not finding it
/// means the snapshot is corrupted and is reported as an error the caller
/// must not paper over.
pub fn special_index(season: &SeasonInfo, episode: &EpisodeInfo) -> Result<usize, OrderingError> {
    season
        .specials
        .iter()
        .position(|s| s.id == episode.id)
        .ok_or_else(|| OrderingError::SpecialNotListed {
            episode_id: episode.id.clone(),
            season_id: season.id.clone(),
        })
}

/// Computes the display episode number.
///
/// Ungrouped seasons keep the native number. In a grouped run normal
/// episodes are offset by the normal episode counts of every preceding
/// participating season, and specials are numbered by their list position
/// offset by the specials of preceding seasons.
pub fn episode_number(
    show: &ShowInfo,
    season: &SeasonInfo,
    episode: &EpisodeInfo,
    policy: &OrderingPolicy,
) -> Result<i32, OrderingError> {
    let Some(position) = grouped_position(show, season, policy) else {
        return Ok(episode.number);
    };

    let preceding = participating(show, policy).take(position);

    match episode.episode_type {
        EpisodeType::Normal => {
            let offset: usize = preceding.map(|s| s.episodes.len()).sum();
            Ok(episode.number + offset as i32)
        }
        EpisodeType::Special => {
            let index = special_index(season, episode)?;
            let offset: usize = preceding.map(|s| s.specials.len()).sum();
            Ok((offset + index) as i32 + 1)
        }
        EpisodeType::Trailer
        | EpisodeType::ThemeSong
        | EpisodeType::OpeningSong
        | EpisodeType::EndingSong
        | EpisodeType::Parody
        | EpisodeType::Interview
        | EpisodeType::Extra
        | EpisodeType::Other => Ok(episode.number),
    }
}

/// Computes the display season number.
///
/// Specials always land in season 0.
pub fn season_number(
    show: &ShowInfo,
    season: &SeasonInfo,
    episode: &EpisodeInfo,
    policy: &OrderingPolicy,
) -> i32 {
    match episode.episode_type {
        EpisodeType::Special => 0,
        EpisodeType::Normal
        | EpisodeType::Trailer
        | EpisodeType::ThemeSong
        | EpisodeType::OpeningSong
        | EpisodeType::EndingSong
        | EpisodeType::Parody
        | EpisodeType::Interview
        | EpisodeType::Extra
        | EpisodeType::Other => season_ordinal(show, season, policy),
    }
}

/// Computes where a special airs relative to normal content.
///
/// Placement hints from cross-references win; a hint pointing outside the
/// show is ignored. Without a usable hint the special airs after the season
/// it belongs to.
pub fn special_placement(
    show: &ShowInfo,
    season: &SeasonInfo,
    episode: &EpisodeInfo,
    policy: &OrderingPolicy,
) -> Result<SpecialPlacement, OrderingError> {
    match episode.episode_type {
        EpisodeType::Special => {}
        EpisodeType::Normal
        | EpisodeType::Trailer
        | EpisodeType::ThemeSong
        | EpisodeType::OpeningSong
        | EpisodeType::EndingSong
        | EpisodeType::Parody
        | EpisodeType::Interview
        | EpisodeType::Extra
        | EpisodeType::Other => return Ok(SpecialPlacement::NOT_SPECIAL),
    }

    if let Some(hint) = &episode.placement {
        if let Some(placement) = resolve_hint(show, hint, policy)? {
            return Ok(placement);
        }
        log::debug!(
            "Ignoring placement hint {:?} of special {}; target is not part of the show",
            hint,
            episode.id
        );
    }

    Ok(SpecialPlacement {
        airs_after_season: Some(season_ordinal(show, season, policy)),
        is_special: true,
        ..SpecialPlacement::NOT_SPECIAL
    })
}

/// Resolves a placement hint against the show, `None` if the target is unknown
fn resolve_hint(
    show: &ShowInfo,
    hint: &PlacementHint,
    policy: &OrderingPolicy,
) -> Result<Option<SpecialPlacement>, OrderingError> {
    match hint {
        PlacementHint::BeforeEpisode { episode_id } => {
            let target = show.seasons.iter().find_map(|s| {
                s.episodes
                    .iter()
                    .find(|e| &e.id == episode_id)
                    .map(|e| (s, e))
            });

            let Some((target_season, target_episode)) = target else {
                return Ok(None);
            };

            Ok(Some(SpecialPlacement {
                airs_before_episode: Some(episode_number(
                    show,
                    target_season,
                    target_episode,
                    policy,
                )?),
                airs_before_season: Some(season_number(
                    show,
                    target_season,
                    target_episode,
                    policy,
                )),
                airs_after_season: None,
                is_special: true,
            }))
        }
        PlacementHint::AfterSeason { season_id } => {
            Ok(show
                .seasons
                .iter()
                .find(|s| &s.id == season_id)
                .map(|target| SpecialPlacement {
                    airs_after_season: Some(season_ordinal(show, target, policy)),
                    is_special: true,
                    ..SpecialPlacement::NOT_SPECIAL
                }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures;

    const GROUPED: OrderingPolicy = OrderingPolicy {
        use_groups: true,
        group_filter: GroupFilter::Default,
    };

    const UNGROUPED: OrderingPolicy = OrderingPolicy {
        use_groups: false,
        group_filter: GroupFilter::Default,
    };

    #[test]
    fn test_ungrouped_keeps_native_numbers() {
        let show = fixtures::two_season_show();
        let season = &show.seasons[1];
        let episode = &season.episodes[1];

        assert_eq!(episode_number(&show, season, episode, &UNGROUPED).unwrap(), 2);
        assert_eq!(season_number(&show, season, episode, &UNGROUPED), 1);
    }

    #[test]
    fn test_grouped_numbers_are_continuous() {
        let show = fixtures::show(vec![
            fixtures::tv_season("a", "A", 12, 0),
            fixtures::tv_season("b", "B", 13, 1),
            fixtures::tv_season("c", "C", 4, 0),
        ]);

        let mut previous = 0;
        for (k, season) in show.seasons.iter().enumerate() {
            let preceding: usize = show.seasons[..k].iter().map(|s| s.episodes.len()).sum();
            for (i, episode) in season.episodes.iter().enumerate() {
                let number = episode_number(&show, season, episode, &GROUPED).unwrap();
                assert!(number > previous, "numbers must be strictly increasing");
                if i == 0 {
                    assert_eq!(number, 1 + preceding as i32);
                }
                previous = number;
            }
        }
        assert_eq!(previous, 29);
    }

    #[test]
    fn test_grouped_season_numbers_are_ordinals() {
        let show = fixtures::two_season_show();
        for (k, season) in show.seasons.iter().enumerate() {
            for episode in &season.episodes {
                let number = season_number(&show, season, episode, &GROUPED);
                assert_eq!(number, k as i32 + 1);
                assert_ne!(number, 0);
            }
        }
    }

    #[test]
    fn test_specials_are_always_season_zero() {
        let show = fixtures::two_season_show();
        for policy in [GROUPED, UNGROUPED] {
            for season in &show.seasons {
                for special in &season.specials {
                    assert_eq!(season_number(&show, season, special, &policy), 0);
                }
            }
        }
    }

    #[test]
    fn test_grouped_specials_use_list_positions() {
        let show = fixtures::two_season_show();
        let season = &show.seasons[1];

        // s1 holds two specials, so the first special of s2 is number 3
        let number = episode_number(&show, season, &season.specials[0], &GROUPED).unwrap();
        assert_eq!(number, 3);
        let number = episode_number(&show, season, &season.specials[2], &GROUPED).unwrap();
        assert_eq!(number, 5);
    }

    #[test]
    fn test_unlisted_special_is_an_invariant_violation() {
        let show = fixtures::two_season_show();
        let season = &show.seasons[0];
        let stray = fixtures::episode("stray", EpisodeType::Special, 9, "Stray");

        let result = episode_number(&show, season, &stray, &GROUPED);
        assert_eq!(
            result,
            Err(OrderingError::SpecialNotListed {
                episode_id: "stray".to_string(),
                season_id: "s1".to_string(),
            })
        );
        assert!(special_index(season, &stray).is_err());
    }

    #[test]
    fn test_group_filter_excludes_movies() {
        let mut movie = fixtures::tv_season("m", "Movie", 1, 0);
        movie.season_type = SeasonType::Movie;
        let show = fixtures::show(vec![
            fixtures::tv_season("a", "A", 10, 0),
            movie,
            fixtures::tv_season("b", "B", 10, 0),
        ]);
        let policy = OrderingPolicy {
            use_groups: true,
            group_filter: GroupFilter::Others,
        };

        let b = &show.seasons[2];
        assert_eq!(episode_number(&show, b, &b.episodes[0], &policy).unwrap(), 11);
        assert_eq!(season_number(&show, b, &b.episodes[0], &policy), 2);

        // The movie is outside the filter and numbered on its own
        let m = &show.seasons[1];
        assert_eq!(episode_number(&show, m, &m.episodes[0], &policy).unwrap(), 1);
        assert_eq!(season_number(&show, m, &m.episodes[0], &policy), 1);
    }

    #[test]
    fn test_placement_defaults_to_after_own_season() {
        let show = fixtures::two_season_show();
        let season = &show.seasons[1];
        let special = &season.specials[0];

        let placement = special_placement(&show, season, special, &GROUPED).unwrap();
        assert_eq!(
            placement,
            SpecialPlacement {
                airs_after_season: Some(2),
                is_special: true,
                ..SpecialPlacement::NOT_SPECIAL
            }
        );
    }

    #[test]
    fn test_placement_for_normal_episode_is_sentinel() {
        let show = fixtures::two_season_show();
        let season = &show.seasons[0];
        let placement = special_placement(&show, season, &season.episodes[0], &GROUPED).unwrap();
        assert_eq!(placement, SpecialPlacement::NOT_SPECIAL);
    }

    #[test]
    fn test_placement_hint_before_episode() {
        let mut show = fixtures::two_season_show();
        show.seasons[0].specials[0].placement = Some(PlacementHint::BeforeEpisode {
            episode_id: "s2-e2".to_string(),
        });
        let season = &show.seasons[0];

        let placement = special_placement(&show, season, &season.specials[0], &GROUPED).unwrap();
        assert_eq!(placement.airs_before_episode, Some(5));
        assert_eq!(placement.airs_before_season, Some(2));
        assert_eq!(placement.airs_after_season, None);
        assert!(placement.is_special);
    }

    #[test]
    fn test_placement_hint_after_season_and_unknown_target() {
        let mut show = fixtures::two_season_show();
        show.seasons[0].specials[0].placement = Some(PlacementHint::AfterSeason {
            season_id: "s2".to_string(),
        });
        show.seasons[0].specials[1].placement = Some(PlacementHint::BeforeEpisode {
            episode_id: "elsewhere".to_string(),
        });
        let season = &show.seasons[0];

        let hinted = special_placement(&show, season, &season.specials[0], &GROUPED).unwrap();
        assert_eq!(hinted.airs_after_season, Some(2));

        let fallback = special_placement(&show, season, &season.specials[1], &GROUPED).unwrap();
        assert_eq!(fallback.airs_after_season, Some(1));
        assert_eq!(fallback.airs_before_episode, None);
    }
}
