//! Title ranker with scripted answers.

use std::collections::HashMap;

use crate::ranking::{ParsedTitle, RankError, RankRequest, RankedTorrent, TitleRanker};

#[derive(Debug, Clone)]
enum Script {
    Parsed { parsed: ParsedTitle, rank: i64 },
    Error(RankError),
}

/// A [`TitleRanker`] that answers from a fixed table keyed by title.
///
/// Unscripted titles are `MalformedTitle`.
///
/// # Example
///
/// ```rust,ignore
/// let ranker = ScriptedTitleRanker::new()
///     .with_parsed("Movie.2019.mkv", fixtures::movie("Movie.2019.mkv", 2019), 10)
///     .with_error("Movie.2019.CAM", RankError::Rejected("cam".into()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedTitleRanker {
    scripts: HashMap<String, Script>,
}

impl ScriptedTitleRanker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `title` with `parsed` and `rank`.
    pub fn with_parsed(mut self, title: impl Into<String>, parsed: ParsedTitle, rank: i64) -> Self {
        self.scripts
            .insert(title.into(), Script::Parsed { parsed, rank });
        self
    }

    /// Fail `title` with `error`.
    pub fn with_error(mut self, title: impl Into<String>, error: RankError) -> Self {
        self.scripts.insert(title.into(), Script::Error(error));
        self
    }

    fn lookup(&self, title: &str) -> Result<(ParsedTitle, i64), RankError> {
        match self.scripts.get(title) {
            Some(Script::Parsed { parsed, rank }) => Ok((parsed.clone(), *rank)),
            Some(Script::Error(error)) => Err(error.clone()),
            None => Err(RankError::MalformedTitle(title.to_string())),
        }
    }
}

impl TitleRanker for ScriptedTitleRanker {
    fn name(&self) -> &str {
        "scripted"
    }

    fn parse(&self, title: &str) -> Result<ParsedTitle, RankError> {
        self.lookup(title).map(|(parsed, _)| parsed)
    }

    fn rank(&self, request: &RankRequest<'_>) -> Result<RankedTorrent, RankError> {
        let (data, rank) = self.lookup(request.raw_title)?;
        Ok(RankedTorrent {
            infohash: request.infohash.to_string(),
            data,
            rank,
        })
    }
}
