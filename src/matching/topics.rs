use std::collections::BTreeSet;

use super::text::NormalizedText;

#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub name: String,
    /// Padded needles, see [`super::text::term_needle`].
    pub triggers: Vec<String>,
    pub excludes: BTreeSet<String>,
    pub title_bonus: f64,
}

/// Maps text to coarse topic labels. A topic applies when any of its
/// triggers occurs on word boundaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicClassifier {
    topics: Vec<Topic>,
}

impl TopicClassifier {
    pub fn new(mut topics: Vec<Topic>) -> Self {
        topics.sort_by(|left, right| left.name.cmp(&right.name));
        Self { topics }
    }

    pub fn classify(&self, text: &NormalizedText) -> BTreeSet<String> {
        if text.is_empty() {
            return BTreeSet::new();
        }

        self.topics
            .iter()
            .filter(|topic| {
                topic
                    .triggers
                    .iter()
                    .any(|needle| text.contains_needle(needle))
            })
            .map(|topic| topic.name.clone())
            .collect()
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics
            .binary_search_by(|topic| topic.name.as_str().cmp(name))
            .ok()
            .map(|index| &self.topics[index])
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::text::{normalize_term, term_needle};

    fn topic(name: &str, triggers: &[&str], excludes: &[&str]) -> Topic {
        Topic {
            name: name.to_string(),
            triggers: triggers
                .iter()
                .map(|trigger| term_needle(&normalize_term(trigger)))
                .collect(),
            excludes: excludes.iter().map(|name| name.to_string()).collect(),
            title_bonus: 1.0,
        }
    }

    fn classifier() -> TopicClassifier {
        TopicClassifier::new(vec![
            topic("training_program", &["training", "curriculum"], &[]),
            topic("mel", &["mel", "minimum equipment list"], &[]),
            topic("ad_management", &["airworthiness directive", "ad", "ads"], &["mel"]),
        ])
    }

    #[test]
    fn classifies_by_any_trigger_on_word_boundaries() {
        let classifier = classifier();
        let topics = classifier.classify(&NormalizedText::new(
            "Recurring ADs and the Minimum Equipment List",
        ));
        assert_eq!(
            topics.into_iter().collect::<Vec<String>>(),
            vec!["ad_management".to_string(), "mel".to_string()]
        );

        assert!(classifier.classify(&NormalizedText::new("Train the crew")).is_empty());
        assert!(classifier.classify(&NormalizedText::new("")).is_empty());
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = classifier();
        let text = NormalizedText::new("Training curriculum for AD tracking");
        assert_eq!(classifier.classify(&text), classifier.classify(&text));
        assert_eq!(classifier.classify(&text).len(), 2);
    }

    #[test]
    fn looks_up_topics_by_name() {
        let classifier = classifier();
        assert!(classifier.topic("mel").is_some());
        assert!(
            classifier
                .topic("ad_management")
                .is_some_and(|topic| topic.excludes.contains("mel"))
        );
        assert!(classifier.topic("records").is_none());
    }
}
