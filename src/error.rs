use thiserror::Error;

/// Rule configuration problems. Raised while loading, before any scoring.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to decode rule configuration: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("config_version must not be empty")]
    MissingVersion,

    #[error("duplicate {kind} entry: '{pattern}'")]
    Duplicate { kind: &'static str, pattern: String },

    #[error("{kind} '{pattern}' has weight {weight}; weights must be finite and non-negative")]
    InvalidWeight {
        kind: &'static str,
        pattern: String,
        weight: f64,
    },

    #[error("{kind} entry is empty after normalization")]
    EmptyPattern { kind: &'static str },

    #[error("keyword '{0}' contains more than one word; declare it as a phrase")]
    MultiWordKeyword(String),

    #[error("phrase '{0}' has a single word; declare it as a keyword")]
    SingleWordPhrase(String),

    #[error("topic '{0}' has no triggers")]
    EmptyTopic(String),

    #[error("topic '{topic}' excludes unknown topic '{excluded}'")]
    UnknownExclusion { topic: String, excluded: String },

    #[error("topic '{0}' excludes itself")]
    SelfExclusion(String),

    #[error("reference '{key}' has an invalid alias pattern: {source}")]
    InvalidAlias {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("reference '{key}' has no alias patterns")]
    MissingAlias { key: String },

    #[error("reference '{key}' lists {kind} '{term}' which is not in the {kind} table")]
    UnknownReferenceTerm {
        key: String,
        kind: &'static str,
        term: String,
    },

    #[error("max_suggestions_per_type must be at least 1")]
    ZeroSuggestionCap,

    #[error("{name} must be {expectation}, got {value}")]
    InvalidSetting {
        name: &'static str,
        expectation: &'static str,
        value: f64,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question qid must not be empty")]
    MissingQid,
}

/// Failures reported by a text extraction backend. The parser turns these into
/// a `fail` quality verdict.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {seconds}s")]
    TimedOut {
        program: &'static str,
        seconds: u64,
    },

    #[error("{program} exited with {status}: {stderr}")]
    NonZeroExit {
        program: &'static str,
        status: String,
        stderr: String,
    },

    #[error("failed while waiting for {program}: {source}")]
    Wait {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read output of {program}: {source}")]
    Output {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Snapshot cache problems. Surfaced to the command layer through `anyhow`.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode corpus snapshot {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot {path} holds manual '{found}', expected '{expected}'")]
    IdMismatch {
        path: String,
        expected: String,
        found: String,
    },
}
