//! Mood enrichment of warehouse rows.

mod classifier;
mod enricher;

pub use classifier::{
    build_prompt, parse_mood_response, Classified, MoodClassification, MoodClassifier,
    FALLBACK_MOOD, FALLBACK_SCORE, MOOD_LABELS,
};
pub use enricher::{EnrichmentSummary, MoodEnricher};
