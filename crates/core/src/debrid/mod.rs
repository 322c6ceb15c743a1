//! Debrid provider abstraction, file matching and availability resolution.

mod file_matcher;
mod resolver;
mod torbox;
mod types;

pub use file_matcher::{FileMatcher, FileMatcherConfig};
pub use resolver::{AvailabilityResolver, DEFAULT_BATCH_SIZE};
pub use torbox::TorBoxDebrid;
pub use types::*;
