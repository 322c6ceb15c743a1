//! Arena of media items with JSON snapshot persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{
    ActiveStream, ItemDetails, ItemId, ItemState, LibraryError, MediaItem, MediaKind,
};
use crate::debrid::Selection;

/// Owns every media item. Children are referenced by [`ItemId`] from their
/// parents, and parents by [`ItemId`] from their children.
#[derive(Debug, Clone, Default)]
pub struct MediaLibrary {
    items: BTreeMap<ItemId, MediaItem>,
    next_id: u64,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    items: Vec<MediaItem>,
}

impl MediaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn allocate(&mut self, kind: MediaKind, details: ItemDetails) -> ItemId {
        self.next_id += 1;
        let id = ItemId(self.next_id);
        self.items.insert(id, MediaItem::new(id, kind, details));
        id
    }

    pub fn add_movie(&mut self, details: ItemDetails) -> ItemId {
        self.allocate(MediaKind::Movie, details)
    }

    pub fn add_show(&mut self, details: ItemDetails) -> ItemId {
        self.allocate(
            MediaKind::Show {
                seasons: Vec::new(),
            },
            details,
        )
    }

    /// Add a season under `show`, keeping the show's seasons ordered by number.
    pub fn add_season(
        &mut self,
        show: ItemId,
        number: u32,
        details: ItemDetails,
    ) -> Result<ItemId, LibraryError> {
        let existing = self.seasons(show)?.to_vec();
        self.ensure_unique(show, &existing, number)?;

        let id = self.allocate(
            MediaKind::Season {
                number,
                show,
                episodes: Vec::new(),
            },
            details,
        );
        let numbers = self.number_lookup();
        if let Some(MediaKind::Show { seasons }) = self.items.get_mut(&show).map(|i| &mut i.kind) {
            seasons.push(id);
            seasons.sort_by_key(|s| numbers.get(s).copied().unwrap_or(number));
        }
        Ok(id)
    }

    /// Add an episode under `season`, keeping the season's episodes ordered by number.
    pub fn add_episode(
        &mut self,
        season: ItemId,
        number: u32,
        details: ItemDetails,
    ) -> Result<ItemId, LibraryError> {
        let existing = self.episodes(season)?.to_vec();
        self.ensure_unique(season, &existing, number)?;

        let id = self.allocate(MediaKind::Episode { number, season }, details);
        let numbers = self.number_lookup();
        if let Some(MediaKind::Season { episodes, .. }) =
            self.items.get_mut(&season).map(|i| &mut i.kind)
        {
            episodes.push(id);
            episodes.sort_by_key(|e| numbers.get(e).copied().unwrap_or(number));
        }
        Ok(id)
    }

    fn ensure_unique(
        &self,
        parent: ItemId,
        siblings: &[ItemId],
        number: u32,
    ) -> Result<(), LibraryError> {
        let taken = siblings
            .iter()
            .filter_map(|id| self.items.get(id))
            .any(|item| item.number() == Some(number));
        if taken {
            return Err(LibraryError::DuplicateNumber { parent, number });
        }
        Ok(())
    }

    fn number_lookup(&self) -> HashMap<ItemId, u32> {
        self.items
            .values()
            .filter_map(|item| item.number().map(|n| (item.id, n)))
            .collect()
    }

    pub fn get(&self, id: ItemId) -> Option<&MediaItem> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut MediaItem> {
        self.items.get_mut(&id)
    }

    /// Like [`get`](Self::get) but a missing item is an error.
    pub fn item(&self, id: ItemId) -> Result<&MediaItem, LibraryError> {
        self.items.get(&id).ok_or(LibraryError::UnknownItem(id))
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut MediaItem, LibraryError> {
        self.items.get_mut(&id).ok_or(LibraryError::UnknownItem(id))
    }

    /// Movies and shows, in insertion order.
    pub fn root_ids(&self) -> Vec<ItemId> {
        self.items
            .values()
            .filter(|item| matches!(item.kind, MediaKind::Movie | MediaKind::Show { .. }))
            .map(|item| item.id)
            .collect()
    }

    pub fn seasons(&self, show: ItemId) -> Result<&[ItemId], LibraryError> {
        let item = self.item(show)?;
        match &item.kind {
            MediaKind::Show { seasons } => Ok(seasons),
            other => Err(wrong_kind(show, "show", other)),
        }
    }

    pub fn episodes(&self, season: ItemId) -> Result<&[ItemId], LibraryError> {
        let item = self.item(season)?;
        match &item.kind {
            MediaKind::Season { episodes, .. } => Ok(episodes),
            other => Err(wrong_kind(season, "season", other)),
        }
    }

    /// The show owning `id`. A show is its own show.
    pub fn show_of(&self, id: ItemId) -> Result<ItemId, LibraryError> {
        let item = self.item(id)?;
        match &item.kind {
            MediaKind::Show { .. } => Ok(id),
            MediaKind::Season { show, .. } => Ok(*show),
            MediaKind::Episode { season, .. } => self.show_of(*season),
            other => Err(wrong_kind(id, "show", other)),
        }
    }

    /// The season owning episode `id`.
    pub fn season_of(&self, id: ItemId) -> Result<ItemId, LibraryError> {
        let item = self.item(id)?;
        match &item.kind {
            MediaKind::Episode { season, .. } => Ok(*season),
            other => Err(wrong_kind(id, "episode", other)),
        }
    }

    /// The top-level item: the movie itself, or the owning show.
    fn top(&self, id: ItemId) -> Result<&MediaItem, LibraryError> {
        let item = self.item(id)?;
        match item.kind {
            MediaKind::Movie | MediaKind::Show { .. } => Ok(item),
            _ => self.item(self.show_of(id)?),
        }
    }

    /// Canonical title used for ranking: the show title for seasons and episodes.
    pub fn top_title(&self, id: ItemId) -> Result<&str, LibraryError> {
        Ok(&self.top(id)?.title)
    }

    pub fn top_imdb_id(&self, id: ItemId) -> Result<Option<&str>, LibraryError> {
        Ok(self.top(id)?.imdb_id.as_deref())
    }

    pub fn top_aliases(&self, id: ItemId) -> Result<&HashMap<String, Vec<String>>, LibraryError> {
        Ok(&self.top(id)?.aliases)
    }

    /// Country releases are filtered on: the show's for seasons and episodes.
    pub fn effective_country(&self, id: ItemId) -> Result<Option<&str>, LibraryError> {
        Ok(self.top(id)?.country.as_deref())
    }

    /// Whether the item (or its show) is flagged as anime.
    pub fn is_anime(&self, id: ItemId) -> Result<bool, LibraryError> {
        Ok(self.item(id)?.is_anime || self.top(id)?.is_anime)
    }

    /// Human readable label such as `Title S01E02`.
    pub fn log_string(&self, id: ItemId) -> String {
        let Some(item) = self.get(id) else {
            return id.to_string();
        };
        let title = self.top_title(id).unwrap_or(item.title.as_str());
        match &item.kind {
            MediaKind::Movie | MediaKind::Show { .. } => title.to_string(),
            MediaKind::Season { number, .. } => format!("{} S{:02}", title, number),
            MediaKind::Episode { number, season } => {
                let season_number = self.get(*season).and_then(|s| s.number()).unwrap_or(0);
                format!("{} S{:02}E{:02}", title, season_number, number)
            }
        }
    }

    /// Season numbers of the owning show that still need a source.
    ///
    /// Empty for movies.
    pub fn needed_seasons(&self, id: ItemId) -> Result<BTreeSet<u32>, LibraryError> {
        if matches!(self.item(id)?.kind, MediaKind::Movie) {
            return Ok(BTreeSet::new());
        }
        let show = self.show_of(id)?;
        Ok(self
            .seasons(show)?
            .iter()
            .filter_map(|s| self.get(*s))
            .filter(|season| !season.state.is_satisfied())
            .filter_map(|season| season.number())
            .collect())
    }

    /// Released episodes of `season` that still need a source, as `(number, id)`.
    pub fn needed_episodes(
        &self,
        season: ItemId,
        now: DateTime<Utc>,
    ) -> Result<Vec<(u32, ItemId)>, LibraryError> {
        Ok(self
            .episodes(season)?
            .iter()
            .filter_map(|e| self.get(*e))
            .filter(|episode| !episode.state.is_satisfied() && episode.is_released(now))
            .filter_map(|episode| episode.number().map(|n| (n, episode.id)))
            .collect())
    }

    pub fn mark_scraped(&mut self, id: ItemId, now: DateTime<Utc>) -> Result<(), LibraryError> {
        self.item_mut(id)?.scraped_at = Some(now);
        Ok(())
    }

    pub fn set_state(&mut self, id: ItemId, state: ItemState) -> Result<(), LibraryError> {
        let item = self.item_mut(id)?;
        debug!(item = %id, from = %item.state, to = %state, "State change");
        item.state = state;
        Ok(())
    }

    /// Record a resolved selection on the requested item and every item a file
    /// was assigned to, then refresh the states of affected parents.
    pub fn apply_selection(&mut self, selection: &Selection) -> Result<(), LibraryError> {
        let stream = ActiveStream {
            infohash: selection.infohash.clone(),
            torrent_id: selection.torrent_id.to_string(),
        };

        for assignment in &selection.assignments {
            let item = self.item_mut(assignment.item_id)?;
            if assignment.item_id != selection.item_id && item.state.is_satisfied() {
                continue;
            }
            item.file = Some(assignment.file.name.clone());
            item.active_stream = Some(stream.clone());
            item.state = ItemState::Downloaded;
        }

        let requested = self.item_mut(selection.item_id)?;
        requested.active_stream = Some(stream);
        requested.state = ItemState::Downloaded;

        match self.item(selection.item_id)?.kind.clone() {
            MediaKind::Movie => {}
            MediaKind::Show { seasons } => {
                for season in seasons {
                    self.roll_up(season)?;
                }
            }
            MediaKind::Season { show, .. } => self.roll_up(show)?,
            MediaKind::Episode { season, .. } => {
                self.roll_up(season)?;
                let show = self.show_of(season)?;
                self.roll_up(show)?;
            }
        }
        Ok(())
    }

    /// Promote a season or show from its children's states. Never demotes.
    fn roll_up(&mut self, id: ItemId) -> Result<(), LibraryError> {
        let children: Vec<ItemId> = match &self.item(id)?.kind {
            MediaKind::Show { seasons } => seasons.clone(),
            MediaKind::Season { episodes, .. } => episodes.clone(),
            _ => return Ok(()),
        };
        if children.is_empty() {
            return Ok(());
        }

        let states: Vec<ItemState> = children
            .iter()
            .filter_map(|c| self.get(*c))
            .map(|c| c.state)
            .collect();
        let satisfied = states.iter().filter(|s| s.is_satisfied()).count();
        let partial = states.contains(&ItemState::PartiallyCompleted);

        let next = if satisfied == states.len() {
            ItemState::Downloaded
        } else if satisfied > 0 || partial {
            ItemState::PartiallyCompleted
        } else {
            return Ok(());
        };

        let current = self.item(id)?.state;
        if current.is_satisfied() || current == next {
            return Ok(());
        }
        self.set_state(id, next)
    }

    /// Load a snapshot written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LibraryError::Io(format!("{}: {}", path.display(), e)))?;
        let snapshot: Snapshot =
            serde_json::from_str(&raw).map_err(|e| LibraryError::Serialization(e.to_string()))?;

        let mut items = BTreeMap::new();
        let mut next_id = snapshot.next_id;
        for item in snapshot.items {
            next_id = next_id.max(item.id.0);
            items.insert(item.id, item);
        }
        Ok(Self { items, next_id })
    }

    /// Write the library as JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), LibraryError> {
        let snapshot = Snapshot {
            next_id: self.next_id,
            items: self.items.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| LibraryError::Serialization(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| LibraryError::Io(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| LibraryError::Io(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}

fn wrong_kind(id: ItemId, expected: &'static str, actual: &MediaKind) -> LibraryError {
    LibraryError::WrongKind {
        id,
        expected,
        actual: actual.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debrid::{DebridFile, FileAssignment, Selection, TorrentId};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn aired() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    fn show_with_episodes(library: &mut MediaLibrary) -> (ItemId, ItemId, Vec<ItemId>) {
        let show = library.add_show(
            ItemDetails::new("Severance")
                .with_imdb_id("tt11280740")
                .with_country("us")
                .with_state(ItemState::Content),
        );
        let season = library
            .add_season(show, 1, ItemDetails::new("Season 1").aired(aired()))
            .unwrap();
        let episodes = (1..=3)
            .map(|n| {
                library
                    .add_episode(
                        season,
                        n,
                        ItemDetails::new(format!("Episode {}", n)).aired(aired()),
                    )
                    .unwrap()
            })
            .collect();
        (show, season, episodes)
    }

    #[test]
    fn test_children_are_ordered_by_number() {
        let mut library = MediaLibrary::new();
        let show = library.add_show(ItemDetails::new("Show"));
        let s2 = library.add_season(show, 2, ItemDetails::new("S2")).unwrap();
        let s1 = library.add_season(show, 1, ItemDetails::new("S1")).unwrap();
        assert_eq!(library.seasons(show).unwrap(), &[s1, s2]);
    }

    #[test]
    fn test_duplicate_number_rejected() {
        let mut library = MediaLibrary::new();
        let show = library.add_show(ItemDetails::new("Show"));
        library.add_season(show, 1, ItemDetails::new("S1")).unwrap();
        let err = library
            .add_season(show, 1, ItemDetails::new("again"))
            .unwrap_err();
        assert!(matches!(
            err,
            LibraryError::DuplicateNumber { number: 1, .. }
        ));
    }

    #[test]
    fn test_season_under_movie_is_wrong_kind() {
        let mut library = MediaLibrary::new();
        let movie = library.add_movie(ItemDetails::new("Heat"));
        let err = library
            .add_season(movie, 1, ItemDetails::new("S1"))
            .unwrap_err();
        assert!(matches!(err, LibraryError::WrongKind { .. }));
    }

    #[test]
    fn test_ancestry_resolution() {
        let mut library = MediaLibrary::new();
        let (show, season, episodes) = show_with_episodes(&mut library);

        assert_eq!(library.show_of(episodes[0]).unwrap(), show);
        assert_eq!(library.season_of(episodes[0]).unwrap(), season);
        assert_eq!(library.top_title(episodes[1]).unwrap(), "Severance");
        assert_eq!(library.top_imdb_id(season).unwrap(), Some("tt11280740"));
        assert_eq!(library.effective_country(episodes[2]).unwrap(), Some("us"));
        assert_eq!(library.log_string(episodes[1]), "Severance S01E02");
        assert_eq!(library.log_string(season), "Severance S01");
        assert_eq!(library.root_ids(), vec![show]);
    }

    #[test]
    fn test_country_comes_from_show() {
        let mut library = MediaLibrary::new();
        let (show, season, episodes) = show_with_episodes(&mut library);
        library.get_mut(season).unwrap().country = Some("gb".to_string());
        library.get_mut(episodes[0]).unwrap().country = Some("jp".to_string());

        assert_eq!(library.effective_country(show).unwrap(), Some("us"));
        assert_eq!(library.effective_country(season).unwrap(), Some("us"));
        assert_eq!(library.effective_country(episodes[0]).unwrap(), Some("us"));

        library.get_mut(show).unwrap().country = None;
        assert_eq!(library.effective_country(season).unwrap(), None);
    }

    #[test]
    fn test_needed_coverage() {
        let mut library = MediaLibrary::new();
        let (show, season, episodes) = show_with_episodes(&mut library);
        let season2 = library.add_season(show, 2, ItemDetails::new("S2")).unwrap();
        library.set_state(season2, ItemState::Completed).unwrap();
        library.set_state(episodes[0], ItemState::Completed).unwrap();

        let unaired = library
            .add_episode(
                season,
                4,
                ItemDetails::new("Future").aired(Utc::now() + Duration::days(30)),
            )
            .unwrap();

        assert_eq!(
            library.needed_seasons(episodes[1]).unwrap(),
            BTreeSet::from([1])
        );
        let needed = library.needed_episodes(season, Utc::now()).unwrap();
        assert_eq!(needed, vec![(2, episodes[1]), (3, episodes[2])]);
        assert!(!needed.iter().any(|(_, id)| *id == unaired));
    }

    #[test]
    fn test_apply_episode_selection_rolls_up() {
        let mut library = MediaLibrary::new();
        let (show, season, episodes) = show_with_episodes(&mut library);
        let selection = Selection {
            item_id: episodes[0],
            infohash: "abc".to_string(),
            torrent_id: TorrentId::new("42"),
            torrent_name: None,
            files: vec![DebridFile::new("Severance.S01E01.mkv", 1_000_000)],
            assignments: vec![FileAssignment {
                item_id: episodes[0],
                file: DebridFile::new("Severance.S01E01.mkv", 1_000_000),
            }],
        };
        library.apply_selection(&selection).unwrap();

        let episode = library.item(episodes[0]).unwrap();
        assert_eq!(episode.state, ItemState::Downloaded);
        assert_eq!(episode.file.as_deref(), Some("Severance.S01E01.mkv"));
        assert_eq!(episode.active_stream.as_ref().unwrap().torrent_id, "42");
        assert_eq!(
            library.item(season).unwrap().state,
            ItemState::PartiallyCompleted
        );
        assert_eq!(
            library.item(show).unwrap().state,
            ItemState::PartiallyCompleted
        );
    }

    #[test]
    fn test_apply_season_selection_skips_satisfied_episodes() {
        let mut library = MediaLibrary::new();
        let (_, season, episodes) = show_with_episodes(&mut library);
        library.set_state(episodes[0], ItemState::Completed).unwrap();

        let assignments = episodes
            .iter()
            .enumerate()
            .map(|(i, id)| FileAssignment {
                item_id: *id,
                file: DebridFile::new(format!("E{:02}.mkv", i + 1), 1_000_000),
            })
            .collect();
        let selection = Selection {
            item_id: season,
            infohash: "def".to_string(),
            torrent_id: TorrentId::new("7"),
            torrent_name: Some("Pack".to_string()),
            files: Vec::new(),
            assignments,
        };
        library.apply_selection(&selection).unwrap();

        assert_eq!(library.item(episodes[0]).unwrap().state, ItemState::Completed);
        assert!(library.item(episodes[0]).unwrap().file.is_none());
        assert_eq!(library.item(episodes[2]).unwrap().state, ItemState::Downloaded);
        assert_eq!(library.item(season).unwrap().state, ItemState::Downloaded);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.json");

        let mut library = MediaLibrary::new();
        let (show, _, episodes) = show_with_episodes(&mut library);
        library.mark_scraped(episodes[0], aired()).unwrap();
        library.save(&path).unwrap();

        let mut loaded = MediaLibrary::load(&path).unwrap();
        assert_eq!(loaded.len(), library.len());
        assert_eq!(loaded.item(episodes[0]).unwrap().scraped_at, Some(aired()));
        assert_eq!(loaded.log_string(episodes[2]), "Severance S01E03");

        let movie = loaded.add_movie(ItemDetails::new("New"));
        assert!(movie.0 > show.0 && movie.0 > episodes[2].0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MediaLibrary::load(Path::new("/nonexistent/library.json")).unwrap_err();
        assert!(matches!(err, LibraryError::Io(_)));
    }
}
