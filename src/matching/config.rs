use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::manual::ParserSettings;
use crate::util::sha256_bytes;

use super::reference::{ReferenceCatalog, ReferenceEntry};
use super::text::{normalize_term, term_needle, word_count};
use super::topics::{Topic, TopicClassifier};

const BUILTIN_RULES: &str = include_str!("../../config/match_rules.json");

/// On-disk rule tables, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    pub config_version: String,
    #[serde(default)]
    pub keywords: Vec<WeightedTermRule>,
    #[serde(default)]
    pub phrases: Vec<WeightedTermRule>,
    #[serde(default)]
    pub topics: Vec<TopicRule>,
    #[serde(default)]
    pub references: Vec<ReferenceRule>,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub parser: ParserSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightedTermRule {
    pub term: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicRule {
    pub name: String,
    pub triggers: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub title_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceRule {
    pub key: String,
    #[serde(default)]
    pub title: String,
    pub aliases: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringSettings {
    pub citation_bonus: f64,
    pub exclusion_penalty: f64,
    pub min_selection_score: f64,
    pub max_suggestions_per_type: usize,
    pub child_preference_ratio: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            citation_bonus: 5.0,
            exclusion_penalty: 8.0,
            min_selection_score: 2.0,
            max_suggestions_per_type: 4,
            child_preference_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTerm {
    pub term: String,
    pub needle: String,
    pub weight: f64,
}

/// Validated, immutable rule set shared by every scoring call.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub version: String,
    pub fingerprint: String,
    pub keywords: Vec<WeightedTerm>,
    pub phrases: Vec<WeightedTerm>,
    pub classifier: TopicClassifier,
    pub references: ReferenceCatalog,
    pub scoring: ScoringSettings,
    pub parser: ParserSettings,
}

impl MatchConfig {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json_str(BUILTIN_RULES)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read rule configuration {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("invalid rule configuration {}", path.display()))
    }

    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin().context("built-in rule configuration is invalid"),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let rules: RuleFile = serde_json::from_str(raw)?;
        Self::from_rules(rules)
    }

    pub fn from_rules(rules: RuleFile) -> Result<Self, ConfigError> {
        let version = rules.config_version.trim().to_string();
        if version.is_empty() {
            return Err(ConfigError::MissingVersion);
        }

        let keywords = validate_terms("keyword", &rules.keywords, TermShape::SingleWord)?;
        let phrases = validate_terms("phrase", &rules.phrases, TermShape::MultiWord)?;
        let classifier = validate_topics(&rules.topics)?;
        let references = validate_references(&rules.references, &keywords, &phrases)?;
        validate_scoring(&rules.scoring)?;

        let canonical = serde_json::to_vec(&rules)?;

        Ok(Self {
            version,
            fingerprint: sha256_bytes(&canonical),
            keywords,
            phrases,
            classifier,
            references,
            scoring: rules.scoring,
            parser: rules.parser,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermShape {
    SingleWord,
    MultiWord,
}

fn check_weight(kind: &'static str, pattern: &str, weight: f64) -> Result<(), ConfigError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(ConfigError::InvalidWeight {
            kind,
            pattern: pattern.to_string(),
            weight,
        });
    }
    Ok(())
}

fn validate_terms(
    kind: &'static str,
    rules: &[WeightedTermRule],
    shape: TermShape,
) -> Result<Vec<WeightedTerm>, ConfigError> {
    let mut seen = BTreeSet::<String>::new();
    let mut terms = Vec::with_capacity(rules.len());

    for rule in rules {
        let term = normalize_term(&rule.term);
        if term.is_empty() {
            return Err(ConfigError::EmptyPattern { kind });
        }
        match (shape, word_count(&term)) {
            (TermShape::SingleWord, count) if count > 1 => {
                return Err(ConfigError::MultiWordKeyword(rule.term.clone()));
            }
            (TermShape::MultiWord, 1) => {
                return Err(ConfigError::SingleWordPhrase(rule.term.clone()));
            }
            _ => {}
        }
        check_weight(kind, &rule.term, rule.weight)?;
        if !seen.insert(term.clone()) {
            return Err(ConfigError::Duplicate {
                kind,
                pattern: rule.term.clone(),
            });
        }

        terms.push(WeightedTerm {
            needle: term_needle(&term),
            term,
            weight: rule.weight,
        });
    }

    Ok(terms)
}

fn validate_topics(rules: &[TopicRule]) -> Result<TopicClassifier, ConfigError> {
    let names = rules
        .iter()
        .map(|rule| rule.name.trim().to_string())
        .collect::<Vec<String>>();
    let mut known = BTreeSet::<&str>::new();
    for name in &names {
        if name.is_empty() {
            return Err(ConfigError::EmptyPattern { kind: "topic" });
        }
        if !known.insert(name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "topic",
                pattern: name.clone(),
            });
        }
    }

    let mut topics = Vec::with_capacity(rules.len());
    for (rule, name) in rules.iter().zip(&names) {
        if rule.triggers.is_empty() {
            return Err(ConfigError::EmptyTopic(name.clone()));
        }

        let mut seen = BTreeSet::<String>::new();
        let mut triggers = Vec::with_capacity(rule.triggers.len());
        for trigger in &rule.triggers {
            let normalized = normalize_term(trigger);
            if normalized.is_empty() {
                return Err(ConfigError::EmptyPattern {
                    kind: "topic trigger",
                });
            }
            if !seen.insert(normalized.clone()) {
                return Err(ConfigError::Duplicate {
                    kind: "topic trigger",
                    pattern: trigger.clone(),
                });
            }
            triggers.push(term_needle(&normalized));
        }

        let mut excludes = BTreeSet::<String>::new();
        for excluded in &rule.excludes {
            let excluded = excluded.trim();
            if excluded == name {
                return Err(ConfigError::SelfExclusion(name.clone()));
            }
            if !known.contains(excluded) {
                return Err(ConfigError::UnknownExclusion {
                    topic: name.clone(),
                    excluded: excluded.to_string(),
                });
            }
            if !excludes.insert(excluded.to_string()) {
                return Err(ConfigError::Duplicate {
                    kind: "topic exclusion",
                    pattern: excluded.to_string(),
                });
            }
        }

        check_weight("topic title_bonus", name, rule.title_bonus)?;
        topics.push(Topic {
            name: name.clone(),
            triggers,
            excludes,
            title_bonus: rule.title_bonus,
        });
    }

    Ok(TopicClassifier::new(topics))
}

fn validate_references(
    rules: &[ReferenceRule],
    keywords: &[WeightedTerm],
    phrases: &[WeightedTerm],
) -> Result<ReferenceCatalog, ConfigError> {
    let keyword_index = index_terms(keywords);
    let phrase_index = index_terms(phrases);
    let mut seen = BTreeSet::<String>::new();
    let mut entries = Vec::with_capacity(rules.len());

    for rule in rules {
        let key = rule.key.trim().to_string();
        if key.is_empty() {
            return Err(ConfigError::EmptyPattern { kind: "reference" });
        }
        if !seen.insert(key.clone()) {
            return Err(ConfigError::Duplicate {
                kind: "reference",
                pattern: key,
            });
        }
        if rule.aliases.is_empty() {
            return Err(ConfigError::MissingAlias { key });
        }

        let mut aliases = Vec::with_capacity(rule.aliases.len());
        for alias in &rule.aliases {
            let compiled = RegexBuilder::new(alias)
                .case_insensitive(true)
                .build()
                .map_err(|source| ConfigError::InvalidAlias {
                    key: key.clone(),
                    source,
                })?;
            aliases.push(compiled);
        }

        let keyword_indices = resolve_terms(&key, "keyword", &rule.keywords, &keyword_index)?;
        let phrase_indices = resolve_terms(&key, "phrase", &rule.phrases, &phrase_index)?;

        entries.push(ReferenceEntry {
            key,
            title: rule.title.trim().to_string(),
            aliases,
            keyword_indices,
            phrase_indices,
        });
    }

    Ok(ReferenceCatalog::new(entries))
}

fn index_terms(terms: &[WeightedTerm]) -> BTreeMap<&str, usize> {
    terms
        .iter()
        .enumerate()
        .map(|(index, term)| (term.term.as_str(), index))
        .collect()
}

fn resolve_terms(
    key: &str,
    kind: &'static str,
    raw_terms: &[String],
    table: &BTreeMap<&str, usize>,
) -> Result<Vec<usize>, ConfigError> {
    let mut indices = BTreeSet::new();
    for raw in raw_terms {
        let normalized = normalize_term(raw);
        let index = table
            .get(normalized.as_str())
            .ok_or_else(|| ConfigError::UnknownReferenceTerm {
                key: key.to_string(),
                kind,
                term: raw.clone(),
            })?;
        indices.insert(*index);
    }
    Ok(indices.into_iter().collect())
}

fn validate_scoring(settings: &ScoringSettings) -> Result<(), ConfigError> {
    let non_negative = [
        ("citation_bonus", settings.citation_bonus),
        ("exclusion_penalty", settings.exclusion_penalty),
        ("min_selection_score", settings.min_selection_score),
    ];
    for (name, value) in non_negative {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidSetting {
                name,
                expectation: "finite and non-negative",
                value,
            });
        }
    }

    let ratio = settings.child_preference_ratio;
    if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
        return Err(ConfigError::InvalidSetting {
            name: "child_preference_ratio",
            expectation: "between 0 and 1",
            value: ratio,
        });
    }

    if settings.max_suggestions_per_type == 0 {
        return Err(ConfigError::ZeroSuggestionCap);
    }

    Ok(())
}
