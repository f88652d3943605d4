//! Synopsis cleanup
//!
//! Catalog descriptions come with citation links, trivia bullets and source
//! notes that have no place in a library overview. This module strips them
//! with four independent rules, applied in a fixed order.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// `http://host/path [label]` citations
static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+ \[[^\]]+\]").expect("valid link pattern"));

/// Whole lines starting with `* `, `-- ` or `~ `, including their line break
static MISC_LINE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:\*|--|~) .*(?:\n|$)").expect("valid misc line pattern"));

/// A `Source:`/`Note:`/`Summary:` line and everything after it
static SUMMARY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^(?:Source|Note|Summary):.*").expect("valid summary pattern")
});

/// Two or more consecutive line breaks
static MULTI_EMPTY_LINE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n)+").expect("valid empty line pattern"));

/// Toggles for the synopsis cleanup rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynopsisConfig {
    /// Strip `url [label]` citations
    pub clean_links: bool,
    /// Strip bullet-marked trivia lines
    pub clean_misc_lines: bool,
    /// Strip trailing `Source:`/`Note:`/`Summary:` blocks
    pub remove_summary: bool,
    /// Remove runs of blank lines
    pub clean_multi_empty_lines: bool,
}

impl Default for SynopsisConfig {
    fn default() -> Self {
        Self {
            clean_links: true,
            clean_misc_lines: true,
            remove_summary: true,
            clean_multi_empty_lines: true,
        }
    }
}

impl SynopsisConfig {
    /// Every rule switched off
    pub const NONE: SynopsisConfig = SynopsisConfig {
        clean_links: false,
        clean_misc_lines: false,
        remove_summary: false,
        clean_multi_empty_lines: false,
    };
}

/// Applies the enabled cleanup rules to a raw description.
///
/// Rules run in order (links, bullet lines, summary block, blank line runs),
/// each on the output of the previous one. The result is trimmed.
///
/// # Examples
///
/// ```
/// use anisynth::{sanitize_synopsis, SynopsisConfig};
///
/// let raw = "Based on http://anidb.net/a1 [the novel].\nSource: ANN";
/// assert_eq!(sanitize_synopsis(raw, &SynopsisConfig::default()), "Based on .");
/// ```
pub fn sanitize_synopsis(text: &str, config: &SynopsisConfig) -> String {
    let mut summary = text.replace("\r\n", "\n");

    if config.clean_links {
        summary = LINK_PATTERN.replace_all(&summary, "").into_owned();
    }

    if config.clean_misc_lines {
        summary = MISC_LINE_PATTERN.replace_all(&summary, "").into_owned();
    }

    if config.remove_summary {
        summary = SUMMARY_PATTERN.replace_all(&summary, "").into_owned();
    }

    if config.clean_multi_empty_lines {
        summary = MULTI_EMPTY_LINE_PATTERN.replace_all(&summary, "").into_owned();
    }

    summary.trim().to_string()
}
