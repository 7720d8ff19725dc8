pub mod analysis;
pub mod record;
pub mod stats;

pub use analysis::ImageAnalysis;
pub use record::{DetectedObject, Face, ImageRecord, MoodSummary, Scene, TextFragment};
pub use stats::CollectionStats;
