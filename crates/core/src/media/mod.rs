//! Media items (movies, shows, seasons, episodes) and the library that owns them.

mod library;
mod types;

pub use library::MediaLibrary;
pub use types::*;
