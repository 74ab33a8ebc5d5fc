use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::citation::CitationExtractor;
use crate::model::{ManualCorpus, ManualSection, Question};

use super::config::{MatchConfig, WeightedTerm};
use super::text::NormalizedText;

/// Why a section scored the way it did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchSignal {
    pub keyword_hits: BTreeMap<String, f64>,
    pub phrase_hits: BTreeMap<String, f64>,
    pub citation_matches: Vec<String>,
    pub citation_bonus: f64,
    pub title_topics: Vec<String>,
    pub title_bonus: f64,
    pub excluded_topics: BTreeMap<String, f64>,
    pub reference_keys: Vec<String>,
    pub total_score: f64,
}

impl MatchSignal {
    /// Sums in reporting order: keywords, phrases, citation, title, exclusions.
    fn finish(mut self) -> Self {
        self.total_score = self.keyword_hits.values().sum::<f64>()
            + self.phrase_hits.values().sum::<f64>()
            + self.citation_bonus
            + self.title_bonus
            + self.excluded_topics.values().sum::<f64>();
        self
    }
}

#[derive(Debug, Clone)]
pub struct PreparedQuestion {
    pub qid: String,
    topics: BTreeSet<String>,
    citations: BTreeSet<String>,
    keyword_mask: Vec<bool>,
    phrase_mask: Vec<bool>,
    reference_keys: Vec<String>,
    reference_titles: BTreeMap<String, String>,
}

impl PreparedQuestion {
    pub fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    pub fn reference_keys(&self) -> &[String] {
        &self.reference_keys
    }

    /// Titles of the detected references that have one, by key.
    pub fn reference_titles(&self) -> &BTreeMap<String, String> {
        &self.reference_titles
    }
}

#[derive(Debug, Clone)]
pub struct PreparedSection {
    title_topics: BTreeSet<String>,
    topics: BTreeSet<String>,
    citations: BTreeSet<String>,
    keyword_mask: Vec<bool>,
    phrase_mask: Vec<bool>,
}

/// A corpus with every section pre-classified, ready to score many questions.
#[derive(Debug, Clone)]
pub struct PreparedCorpus {
    pub corpus: Arc<ManualCorpus>,
    pub sections: Vec<PreparedSection>,
}

#[derive(Debug, Clone)]
pub struct Matcher {
    config: Arc<MatchConfig>,
    citations: Arc<CitationExtractor>,
}

impl Matcher {
    pub fn new(config: Arc<MatchConfig>) -> Result<Self> {
        Ok(Self {
            config,
            citations: Arc::new(CitationExtractor::new()?),
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn prepare_question(&self, question: &Question) -> PreparedQuestion {
        let text = NormalizedText::from_parts(
            std::iter::once(question.text.as_str())
                .chain(question.topic_hints.iter().map(String::as_str)),
        );
        let topics = self.config.classifier.classify(&text);

        let mut citations = question.citations.iter().cloned().collect::<BTreeSet<String>>();
        citations.extend(self.citations.extract(&question.text));

        let mut keyword_mask = term_mask(&self.config.keywords, &text);
        let mut phrase_mask = term_mask(&self.config.phrases, &text);

        let reference_sources = std::iter::once(question.text.as_str())
            .chain(question.topic_hints.iter().map(String::as_str))
            .chain(question.citations.iter().map(String::as_str));
        let references = self.config.references.detect(reference_sources);
        for entry in &references {
            for index in &entry.keyword_indices {
                keyword_mask[*index] = true;
            }
            for index in &entry.phrase_indices {
                phrase_mask[*index] = true;
            }
        }

        PreparedQuestion {
            qid: question.qid.clone(),
            topics,
            citations,
            keyword_mask,
            phrase_mask,
            reference_keys: references.iter().map(|entry| entry.key.clone()).collect(),
            reference_titles: references
                .iter()
                .filter(|entry| !entry.title.is_empty())
                .map(|entry| (entry.key.clone(), entry.title.clone()))
                .collect(),
        }
    }

    pub fn prepare_section(&self, section: &ManualSection) -> PreparedSection {
        let title = NormalizedText::new(&section.title);
        let full = NormalizedText::from_parts([section.title.as_str(), section.body_text.as_str()]);

        PreparedSection {
            title_topics: self.config.classifier.classify(&title),
            topics: self.config.classifier.classify(&full),
            citations: section.citations.iter().cloned().collect(),
            keyword_mask: term_mask(&self.config.keywords, &full),
            phrase_mask: term_mask(&self.config.phrases, &full),
        }
    }

    pub fn prepare_corpus(&self, corpus: Arc<ManualCorpus>) -> PreparedCorpus {
        let sections = corpus
            .sections
            .iter()
            .map(|section| self.prepare_section(section))
            .collect();
        PreparedCorpus { corpus, sections }
    }

    /// Scores one pair. Never fails; absent fields contribute nothing.
    pub fn score(&self, question: &PreparedQuestion, section: &PreparedSection) -> MatchSignal {
        let scoring = &self.config.scoring;
        let mut signal = MatchSignal {
            keyword_hits: shared_hits(
                &self.config.keywords,
                &question.keyword_mask,
                &section.keyword_mask,
            ),
            phrase_hits: shared_hits(
                &self.config.phrases,
                &question.phrase_mask,
                &section.phrase_mask,
            ),
            reference_keys: question.reference_keys.clone(),
            ..MatchSignal::default()
        };

        signal.citation_matches = question
            .citations
            .intersection(&section.citations)
            .cloned()
            .collect();
        if !signal.citation_matches.is_empty() {
            signal.citation_bonus = scoring.citation_bonus;
        }

        for topic_name in question.topics.intersection(&section.title_topics) {
            if let Some(topic) = self.config.classifier.topic(topic_name) {
                signal.title_topics.push(topic_name.clone());
                signal.title_bonus += topic.title_bonus;
            }
        }

        for topic_name in &question.topics {
            let Some(topic) = self.config.classifier.topic(topic_name) else {
                continue;
            };
            for excluded in &topic.excludes {
                if section.topics.contains(excluded) {
                    signal
                        .excluded_topics
                        .insert(excluded.clone(), -scoring.exclusion_penalty);
                }
            }
        }

        signal.finish()
    }

    #[cfg(test)]
    pub fn score_pair(&self, question: &Question, section: &ManualSection) -> MatchSignal {
        self.score(&self.prepare_question(question), &self.prepare_section(section))
    }
}

fn term_mask(terms: &[WeightedTerm], text: &NormalizedText) -> Vec<bool> {
    terms
        .iter()
        .map(|term| text.contains_needle(&term.needle))
        .collect()
}

fn shared_hits(
    terms: &[WeightedTerm],
    question: &[bool],
    section: &[bool],
) -> BTreeMap<String, f64> {
    terms
        .iter()
        .zip(question.iter().zip(section))
        .filter(|(_, (in_question, in_section))| **in_question && **in_section)
        .map(|(term, _)| (term.term.clone(), term.weight))
        .collect()
}
