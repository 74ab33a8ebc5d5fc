use regex::Regex;

/// A regulatory reference document and the vocabulary it implies. Term
/// indices point into the keyword and phrase tables of the owning config.
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub key: String,
    pub title: String,
    pub aliases: Vec<Regex>,
    pub keyword_indices: Vec<usize>,
    pub phrase_indices: Vec<usize>,
}

impl ReferenceEntry {
    pub fn mentioned_in(&self, text: &str) -> bool {
        self.aliases.iter().any(|alias| alias.is_match(text))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceCatalog {
    pub fn new(mut entries: Vec<ReferenceEntry>) -> Self {
        entries.sort_by(|left, right| left.key.cmp(&right.key));
        Self { entries }
    }

    /// References mentioned anywhere in `texts`, ordered by key.
    pub fn detect<'a, I>(&self, texts: I) -> Vec<&ReferenceEntry>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let texts = texts
            .into_iter()
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<&str>>();
        self.entries
            .iter()
            .filter(|entry| texts.iter().any(|text| entry.mentioned_in(text)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use regex::RegexBuilder;

    use super::*;

    fn alias(pattern: &str) -> Regex {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("alias regex")
    }

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::new(vec![
            ReferenceEntry {
                key: "FAA ORDER 8900.1 VOL 3 CH 59 SEC 1".to_string(),
                title: String::new(),
                aliases: vec![alias(
                    r"\b8900\.1\b.*\bVol(?:ume)?\s*3\b.*\bCh(?:apter)?\s*59\b.*\bSec(?:tion)?\s*1\b",
                )],
                keyword_indices: vec![0],
                phrase_indices: Vec::new(),
            },
            ReferenceEntry {
                key: "AC-39-9".to_string(),
                title: "Airworthiness Directives Management Process".to_string(),
                aliases: vec![alias(r"\bAC\s*[- ]?39-9\b")],
                keyword_indices: vec![0, 1],
                phrase_indices: vec![0],
            },
        ])
    }

    #[test]
    fn detects_aliases_case_insensitively_in_any_text() {
        let catalog = catalog();
        let found = catalog.detect(["", "See ac 39-9 for guidance"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "AC-39-9");

        let both = catalog.detect(["FAA Order 8900.1, Volume 3, Chapter 59, Section 1; AC-39-9"]);
        let keys = both.iter().map(|entry| entry.key.as_str()).collect::<Vec<&str>>();
        assert_eq!(keys, vec!["AC-39-9", "FAA ORDER 8900.1 VOL 3 CH 59 SEC 1"]);
    }

    #[test]
    fn unrelated_text_detects_nothing() {
        assert!(catalog().detect(["14 CFR 121.369", "AC 120-16G"]).is_empty());
    }
}
