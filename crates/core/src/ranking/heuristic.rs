//! Regex based title parser and ranker.
//!
//! Recognizes the common scene and anime naming conventions: `S01E02`,
//! `1x02`, `Season 1`, `S01-S03`, `Episode 5`, `Show - 05`, plus year,
//! resolution, codec and bracketed country tokens.

use std::collections::BTreeSet;

use regex_lite::Regex;

use super::types::{ParsedTitle, RankError, RankRequest, RankedTorrent, TitleRanker};

/// Minimum share of the requested title's words the release must contain.
const MIN_TITLE_COVERAGE: f64 = 0.8;
/// Words in the release title beyond the requested ones that are tolerated.
const MAX_EXTRA_WORDS: usize = 2;
/// Episode ranges wider than this are treated as noise.
const MAX_EPISODE_RANGE: u32 = 200;

struct Patterns {
    extension: Regex,
    group_prefix: Regex,
    date: Regex,
    season_episode: Regex,
    cross: Regex,
    season_range: Regex,
    season_word: Regex,
    season_bare: Regex,
    episode_word: Regex,
    anime_episode: Regex,
    complete: Regex,
    year: Regex,
    resolution: Regex,
    codec: Regex,
    country: Regex,
    trash: Regex,
    title_end: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex_lite::Error> {
        Ok(Self {
            extension: Regex::new(r"(?i)\.(mkv|mp4|avi|m4v|mov|wmv|webm)$")?,
            group_prefix: Regex::new(r"^\s*\[[^\]]*\]\s*")?,
            date: Regex::new(r"\b(?:19|20)\d{2}[- ](?:0[1-9]|1[0-2])[- ](?:0[1-9]|[12]\d|3[01])\b")?,
            season_episode: Regex::new(
                r"(?i)\bS(\d{1,2}) ?E(\d{1,3})(?:(?: ?- ?E?| ?E)(\d{1,3}))?\b",
            )?,
            cross: Regex::new(r"(?i)\b(\d{1,2})x(\d{2,3})\b")?,
            season_range: Regex::new(r"(?i)\bS(\d{1,2}) ?- ?S(\d{1,2})\b")?,
            season_word: Regex::new(r"(?i)\bSeasons? ?(\d{1,2})(?: ?(?:-|to|&) ?(\d{1,2}))?\b")?,
            season_bare: Regex::new(r"(?i)\bS(\d{1,2})\b")?,
            episode_word: Regex::new(r"(?i)\b(?:Episode|Ep) ?(\d{1,3})\b")?,
            anime_episode: Regex::new(r" - (\d{1,3})(?:v\d)?\b")?,
            complete: Regex::new(r"(?i)\b(?:complete|integrale|all seasons|full series)\b")?,
            year: Regex::new(r"\b((?:19|20)\d{2})\b")?,
            resolution: Regex::new(r"(?i)\b(2160p|4k|uhd|1080p|1080i|720p|576p|480p)\b")?,
            codec: Regex::new(r"(?i)\b(x265|h\.?265|hevc|x264|h\.?264|avc|av1)\b")?,
            country: Regex::new(r"[\[(](US|UK|GB|AU|CA|NZ|IE|FR|DE|JP|KR)[\])]")?,
            trash: Regex::new(
                r"(?i)\b(?:cam|camrip|hdcam|telesync|hdts|telecine|hdtc|screener|dvdscr)\b",
            )?,
            title_end: Regex::new(
                r"(?i)\b(?:S\d{1,2}|\d{1,2}x\d{2}|Seasons? ?\d|Episode ?\d|complete|(?:19|20)\d{2}\b|2160p|1080p|1080i|720p|576p|480p|4k)",
            )?,
        })
    }
}

/// Default [`TitleRanker`].
pub struct HeuristicTitleRanker {
    patterns: Patterns,
}

struct ParsedRelease {
    parsed: ParsedTitle,
    /// Everything before the first season, episode or quality token.
    full_title: String,
    year_after_full_title: Option<i32>,
}

impl HeuristicTitleRanker {
    pub fn new() -> Result<Self, regex_lite::Error> {
        Ok(Self {
            patterns: Patterns::compile()?,
        })
    }

    fn numbers(&self, clean: &str, parsed: &mut ParsedTitle) {
        let p = &self.patterns;

        for caps in p.season_episode.captures_iter(clean) {
            let (Some(season), Some(first)) = (num(caps.get(1)), num(caps.get(2))) else {
                continue;
            };
            parsed.seasons.insert(season);
            let last = num(caps.get(3))
                .filter(|last| *last >= first && last - first <= MAX_EPISODE_RANGE);
            parsed.episodes.extend(first..=last.unwrap_or(first));
        }

        for caps in p.cross.captures_iter(clean) {
            if let (Some(season), Some(episode)) = (num(caps.get(1)), num(caps.get(2))) {
                parsed.seasons.insert(season);
                parsed.episodes.insert(episode);
            }
        }

        for caps in p.season_range.captures_iter(clean) {
            if let (Some(from), Some(to)) = (num(caps.get(1)), num(caps.get(2))) {
                if from <= to {
                    parsed.seasons.extend(from..=to);
                }
            }
        }

        for caps in p.season_word.captures_iter(clean) {
            let Some(from) = num(caps.get(1)) else {
                continue;
            };
            match num(caps.get(2)) {
                Some(to) if to >= from => parsed.seasons.extend(from..=to),
                Some(other) => {
                    parsed.seasons.insert(from);
                    parsed.seasons.insert(other);
                }
                None => {
                    parsed.seasons.insert(from);
                }
            }
        }

        for caps in p.season_bare.captures_iter(clean) {
            if let Some(season) = num(caps.get(1)) {
                parsed.seasons.insert(season);
            }
        }

        for caps in p.episode_word.captures_iter(clean) {
            if let Some(episode) = num(caps.get(1)) {
                parsed.episodes.insert(episode);
            }
        }

        if parsed.episodes.is_empty() {
            if let Some(episode) = p.anime_episode.captures(clean).and_then(|c| num(c.get(1))) {
                parsed.episodes.insert(episode);
            }
        }
    }

    fn parse_release(&self, title: &str) -> Result<ParsedRelease, RankError> {
        let p = &self.patterns;

        let stripped = p.extension.replace(title, "");
        let stripped = p.group_prefix.replace(&stripped, "");
        let clean: String = stripped
            .chars()
            .map(|c| if c == '.' || c == '_' { ' ' } else { c })
            .collect();

        if p.date.is_match(&clean) {
            return Err(RankError::MalformedTitle(format!(
                "date in title: {}",
                title
            )));
        }

        let mut parsed = ParsedTitle {
            raw_title: title.to_string(),
            ..Default::default()
        };

        self.numbers(&clean, &mut parsed);
        parsed.complete = p.complete.is_match(&clean);
        parsed.resolution = p
            .resolution
            .captures(&clean)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase());
        parsed.codec = p
            .codec
            .captures(&stripped)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase().replace('.', ""));
        parsed.country = p
            .country
            .captures(title)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let (cut, hard_end) = self.title_bounds(&clean);
        parsed.parsed_title = self.title_text(&clean[..cut]);
        parsed.year = self.last_year(&clean[cut..]);

        Ok(ParsedRelease {
            full_title: self.title_text(&clean[..hard_end]),
            year_after_full_title: self.last_year(&clean[hard_end..]),
            parsed,
        })
    }

    /// Where the title ends: `(cut, hard_end)`.
    ///
    /// `hard_end` is the first season, episode, resolution or `complete`
    /// token. Years before it may belong to the title itself, so the title is
    /// cut at the last of them, and a year opening the name never cuts.
    fn title_bounds(&self, clean: &str) -> (usize, usize) {
        let p = &self.patterns;
        let lead = clean.len() - clean.trim_start().len();

        let mut hard_end = clean.len();
        let mut last_year = None;
        for m in p.title_end.find_iter(clean) {
            if is_year(m.as_str()) {
                if m.start() > lead {
                    last_year = Some(m.start());
                }
                continue;
            }
            hard_end = m.start();
            break;
        }
        if let Some(m) = p.anime_episode.find(clean) {
            hard_end = hard_end.min(m.start());
        }

        let cut = last_year.filter(|start| *start < hard_end).unwrap_or(hard_end);
        (cut, hard_end)
    }

    fn title_text(&self, head: &str) -> String {
        let head = self.patterns.country.replace_all(head, "");
        head.trim_end_matches(|c: char| c == '(' || c == '[' || c == '-' || c.is_whitespace())
            .trim()
            .to_string()
    }

    fn last_year(&self, text: &str) -> Option<i32> {
        self.patterns
            .year
            .captures_iter(text)
            .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
            .last()
    }

    fn score(&self, parsed: &ParsedTitle, raw_title: &str) -> i64 {
        let mut score = match parsed.resolution.as_deref() {
            Some("2160p") | Some("4k") | Some("uhd") => 120,
            Some("1080p") | Some("1080i") => 100,
            Some("720p") => 60,
            Some(_) => 20,
            None => 0,
        };

        score += match parsed.codec.as_deref() {
            Some("x265") | Some("h265") | Some("hevc") => 15,
            Some("av1") => 10,
            Some(_) => 5,
            None => 0,
        };

        let lower = raw_title.to_lowercase();
        let bonuses: [(&[&str], i64); 4] = [
            (&["remux"], 30),
            (&["bluray", "blu-ray", "bdrip"], 20),
            (&["web-dl", "webdl", "webrip", "web "], 15),
            (&["hdr", "dolby vision", ".dv.", " dv "], 10),
        ];
        for (needles, bonus) in bonuses {
            if needles.iter().any(|needle| lower.contains(needle)) {
                score += bonus;
            }
        }
        if lower.contains("proper") || lower.contains("repack") {
            score += 5;
        }

        score
    }
}

impl TitleRanker for HeuristicTitleRanker {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn parse(&self, title: &str) -> Result<ParsedTitle, RankError> {
        self.parse_release(title).map(|release| release.parsed)
    }

    fn rank(&self, request: &RankRequest<'_>) -> Result<RankedTorrent, RankError> {
        let ParsedRelease {
            mut parsed,
            full_title,
            year_after_full_title,
        } = self.parse_release(request.raw_title)?;

        if request.remove_trash && self.patterns.trash.is_match(request.raw_title) {
            return Err(RankError::Rejected(format!(
                "low quality source: {}",
                request.raw_title
            )));
        }

        if parsed.parsed_title.is_empty() {
            return Err(RankError::MalformedTitle(format!(
                "no title in: {}",
                request.raw_title
            )));
        }

        let matches_title = |candidate: &str| {
            std::iter::once(request.correct_title)
                .chain(request.aliases.iter().map(String::as_str))
                .any(|wanted| title_matches(candidate, wanted))
        };
        if !matches_title(&parsed.parsed_title) {
            // Years before the season or quality tokens can be part of the
            // name, e.g. "Blade Runner 2049 1080p".
            if full_title == parsed.parsed_title || !matches_title(&full_title) {
                return Err(RankError::Rejected(format!(
                    "'{}' does not match '{}'",
                    parsed.parsed_title, request.correct_title
                )));
            }
            parsed.parsed_title = full_title;
            parsed.year = year_after_full_title;
        }

        let rank = self.score(&parsed, request.raw_title);
        Ok(RankedTorrent {
            infohash: request.infohash.to_string(),
            data: parsed,
            rank,
        })
    }
}

fn is_year(token: &str) -> bool {
    token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit())
}

fn num(m: Option<regex_lite::Match<'_>>) -> Option<u32> {
    m.and_then(|m| m.as_str().parse().ok())
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('&', " and ")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn title_matches(parsed: &str, wanted: &str) -> bool {
    let wanted = words(wanted);
    if wanted.is_empty() {
        return false;
    }
    let parsed: BTreeSet<String> = words(parsed).into_iter().collect();
    let matched = wanted.iter().filter(|w| parsed.contains(*w)).count();
    let coverage = matched as f64 / wanted.len() as f64;
    let extra = parsed.len().saturating_sub(matched);
    coverage >= MIN_TITLE_COVERAGE && extra <= MAX_EXTRA_WORDS
}
