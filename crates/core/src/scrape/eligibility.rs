//! Decides which items get scraped in a pass.

use chrono::{DateTime, Duration, Utc};

use crate::media::{ItemId, ItemState, MediaItem, MediaKind, MediaLibrary};

/// Minimum time between two scrapes of the same item.
pub const DEFAULT_SCRAPE_COOLDOWN: Duration = Duration::minutes(30);

/// Whether `item_id` should be scraped now.
///
/// Shows waiting for content keep being eligible since they gain episodes over
/// time. Everything else must have aired, be waiting for a source, and be
/// outside its cooldown window. Unknown items are never eligible.
pub fn should_scrape(
    library: &MediaLibrary,
    item_id: ItemId,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> bool {
    let Some(item) = library.get(item_id) else {
        return false;
    };

    match item.kind {
        MediaKind::Show { .. } => {
            matches!(item.state, ItemState::Content | ItemState::PartiallyCompleted)
        }
        _ => {
            item.is_released(now)
                && item.state == ItemState::Content
                && cooldown_elapsed(item, now, cooldown)
        }
    }
}

/// Never scraped, or last scraped at least `cooldown` ago.
pub fn cooldown_elapsed(item: &MediaItem, now: DateTime<Utc>, cooldown: Duration) -> bool {
    match item.scraped_at {
        None => true,
        Some(scraped_at) => now - scraped_at >= cooldown,
    }
}
