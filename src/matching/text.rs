/// Lower-cased, punctuation-free text padded with single spaces so that a
/// term lookup is a plain substring search on token boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn new(raw: &str) -> Self {
        let tokens = normalize_term(raw);
        if tokens.is_empty() {
            return Self(String::new());
        }
        Self(format!(" {tokens} "))
    }

    pub fn from_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let joined = parts.into_iter().collect::<Vec<&str>>().join(" ");
        Self::new(&joined)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `needle` must come from [`term_needle`].
    pub fn contains_needle(&self, needle: &str) -> bool {
        !self.0.is_empty() && self.0.contains(needle)
    }
}

/// Canonical token sequence for a keyword, phrase or trigger.
pub fn normalize_term(raw: &str) -> String {
    let mapped = raw
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    mapped.split_whitespace().collect::<Vec<&str>>().join(" ")
}

pub fn term_needle(normalized: &str) -> String {
    format!(" {normalized} ")
}

pub fn word_count(normalized: &str) -> usize {
    normalized.split(' ').filter(|word| !word.is_empty()).count()
}
