//! Types for title parsing and candidate ranking.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured data recovered from a release title or file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTitle {
    pub raw_title: String,
    /// Title with release tokens stripped.
    pub parsed_title: String,
    #[serde(default)]
    pub seasons: BTreeSet<u32>,
    #[serde(default)]
    pub episodes: BTreeSet<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Country code as written in the title, e.g. `US`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Release claims to contain the whole series or season.
    #[serde(default)]
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
}

impl ParsedTitle {
    /// No season and no episode numbers.
    pub fn is_movie_like(&self) -> bool {
        self.seasons.is_empty() && self.episodes.is_empty()
    }

    /// Seasons named, but no specific episodes.
    pub fn is_season_pack(&self) -> bool {
        !self.seasons.is_empty() && self.episodes.is_empty()
    }
}

/// Input of a single [`TitleRanker::rank`] call.
#[derive(Debug, Clone, Copy)]
pub struct RankRequest<'a> {
    pub raw_title: &'a str,
    pub infohash: &'a str,
    /// Canonical title of the requested item.
    pub correct_title: &'a str,
    /// Alternative titles accepted as a match.
    pub aliases: &'a [String],
    pub remove_trash: bool,
}

/// A title that parsed and passed the ranker's own quality checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedTorrent {
    pub infohash: String,
    pub data: ParsedTitle,
    pub rank: i64,
}

/// Why a title was skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RankError {
    #[error("Malformed title: {0}")]
    MalformedTitle(String),

    #[error("Rejected title: {0}")]
    Rejected(String),
}

/// Title parse/rank primitive.
///
/// Implementations are pure and synchronous; the candidate ranker calls
/// them once per unique infohash.
pub trait TitleRanker: Send + Sync {
    /// Returns the name of this ranker, for logging.
    fn name(&self) -> &str;

    /// Parse a release title or file name.
    fn parse(&self, title: &str) -> Result<ParsedTitle, RankError>;

    /// Parse and score a release against the requested title.
    fn rank(&self, request: &RankRequest<'_>) -> Result<RankedTorrent, RankError>;

    /// Total order over ranked torrents, best first.
    fn compare(&self, a: &RankedTorrent, b: &RankedTorrent) -> Ordering {
        b.rank
            .cmp(&a.rank)
            .then_with(|| a.infohash.cmp(&b.infohash))
    }
}

/// A ranked candidate stored for a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Lowercase hex infohash.
    pub infohash: String,
    pub raw_title: String,
    pub rank: i64,
    pub parsed: ParsedTitle,
    /// Once set, never cleared.
    #[serde(default)]
    pub blacklisted: bool,
}

impl Stream {
    pub fn from_ranked(ranked: RankedTorrent) -> Self {
        Self {
            infohash: ranked.infohash.to_lowercase(),
            raw_title: ranked.data.raw_title.clone(),
            rank: ranked.rank,
            parsed: ranked.data,
            blacklisted: false,
        }
    }

    /// Mark the stream as blacklisted. Returns `true` if it was not already.
    pub fn blacklist(&mut self) -> bool {
        if self.blacklisted {
            return false;
        }
        self.blacklisted = true;
        true
    }
}

/// Output of [`CandidateRanker::rank`](super::CandidateRanker::rank).
///
/// `processed` counts unique candidates handed to the title ranker and always
/// equals the sum of accepted, malformed, rejected, wrong-country and
/// inadmissible candidates.
#[derive(Debug, Clone, Default)]
pub struct RankReport {
    /// Accepted streams, best first.
    pub streams: Vec<Stream>,
    pub processed: usize,
    pub duplicates: usize,
    pub malformed: usize,
    pub rejected: usize,
    pub wrong_country: usize,
    pub inadmissible: usize,
}

impl RankReport {
    pub fn accepted(&self) -> usize {
        self.streams.len()
    }
}
