//! Toonshift Weights - pretrained style assets
//!
//! Maps a named style to its published generator weight file, downloads it
//! once into a local cache, and reuses the cached copy on later runs. Local
//! weight files bypass all of this and are used as-is.

pub mod cache;
pub mod style;

pub use cache::{WeightCache, WeightError};
pub use style::{Style, WeightSource, ASSET_HOST};
