mod batch;
mod config;
mod ranking;
mod reference;
mod scoring;
mod text;
mod topics;

pub use batch::{default_worker_count, suggest_batch};
pub use config::MatchConfig;
pub use ranking::{
    ManualSuggestions, MapReferences, RankOptions, Suggestion, SuggestionReport, SuggestionStatus,
};
pub use scoring::{Matcher, PreparedCorpus};
