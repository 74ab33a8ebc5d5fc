use std::collections::{BTreeMap, BTreeSet};

use super::extract::ExtractedLine;

const EDGE_LINES_PER_SIDE: usize = 2;
const MIN_REPEATED_PAGES: usize = 3;
const MAX_EDGE_KEY_CHARS: usize = 120;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationCounts {
    pub header_footer_lines_removed: usize,
    pub revision_lines_dropped: usize,
    pub toc_lines_dropped: usize,
    pub dehyphenation_merges: usize,
}

/// Change-tracking lines are recognized by their first word or by a marker
/// token anywhere in the line. After a leading section number the verb only
/// counts in change-log form (`Added:`, `Revised 03/2024`, `Added recurring
/// checks`), so a title-cased heading such as `9.3 Removed Parts Control`
/// survives.
#[derive(Debug, Clone)]
pub struct RevisionFilter {
    verbs: BTreeSet<String>,
    markers: Vec<String>,
}

impl RevisionFilter {
    pub fn new(verbs: &[String], markers: &[String]) -> Self {
        Self {
            verbs: verbs
                .iter()
                .map(|verb| verb.trim().to_ascii_lowercase())
                .filter(|verb| !verb.is_empty())
                .collect(),
            markers: markers
                .iter()
                .map(|marker| marker.trim().to_ascii_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
        }
    }

    pub fn is_revision_line(&self, line: &str) -> bool {
        let lowered = line.to_ascii_lowercase();
        if self.markers.iter().any(|marker| lowered.contains(marker)) {
            return true;
        }

        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            return false;
        };
        if !looks_like_section_number(first) {
            return self.is_leading_verb(first);
        }

        let Some(verb) = words.next() else {
            return false;
        };
        let change_log_form = verb.ends_with(':')
            || words
                .next()
                .and_then(|next| next.chars().next())
                .is_some_and(|ch| ch.is_ascii_digit() || ch.is_lowercase());
        change_log_form && self.is_leading_verb(verb)
    }

    fn is_leading_verb(&self, token: &str) -> bool {
        let word = token.trim_end_matches([':', ',', ';', '.']);
        let capitalized = word
            .chars()
            .next()
            .map(char::is_uppercase)
            .unwrap_or(false);
        capitalized && self.verbs.contains(&word.to_ascii_lowercase())
    }
}

fn looks_like_section_number(word: &str) -> bool {
    let trimmed = word.trim_end_matches(['.', ':']);
    !trimmed.is_empty()
        && trimmed.chars().all(|ch| ch.is_ascii_digit() || ch == '.')
        && trimmed.chars().next().map(|ch| ch.is_ascii_digit()).unwrap_or(false)
}

/// Case-folded, whitespace-collapsed, with digit runs masked so running page
/// numbers do not defeat repetition detection.
pub fn edge_key(line: &str) -> String {
    let mut key = String::with_capacity(line.len());
    let mut in_digits = false;
    for word in line.split_whitespace() {
        if !key.is_empty() {
            key.push(' ');
            in_digits = false;
        }
        for character in word.chars() {
            if character.is_ascii_digit() {
                if !in_digits {
                    key.push('#');
                    in_digits = true;
                }
                continue;
            }
            in_digits = false;
            key.extend(character.to_lowercase());
        }
    }
    key
}

fn group_by_page(lines: Vec<ExtractedLine>) -> BTreeMap<u32, Vec<ExtractedLine>> {
    let mut pages = BTreeMap::<u32, Vec<ExtractedLine>>::new();
    for line in lines {
        pages.entry(line.page).or_default().push(line);
    }
    pages
}

fn edge_indices(lines: &[ExtractedLine]) -> BTreeSet<usize> {
    let non_empty = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.text.trim().is_empty())
        .map(|(index, _)| index)
        .collect::<Vec<usize>>();

    non_empty
        .iter()
        .take(EDGE_LINES_PER_SIDE)
        .chain(non_empty.iter().rev().take(EDGE_LINES_PER_SIDE))
        .copied()
        .collect()
}

/// Removes running headers and footers. A repeated line that looks like a
/// heading keeps its first occurrence so the section it opens still exists.
/// Returns the kept lines in input order and the number of lines removed.
pub fn strip_repeated_edge_lines(
    lines: Vec<ExtractedLine>,
    is_heading: impl Fn(&str) -> bool,
) -> (Vec<ExtractedLine>, usize) {
    let pages = group_by_page(lines);
    let page_count = pages.len();

    let mut pages_per_key = BTreeMap::<String, usize>::new();
    for page_lines in pages.values() {
        let keys = edge_indices(page_lines)
            .into_iter()
            .map(|index| edge_key(&page_lines[index].text))
            .filter(|key| !key.is_empty() && key.chars().count() <= MAX_EDGE_KEY_CHARS)
            .collect::<BTreeSet<String>>();
        for key in keys {
            *pages_per_key.entry(key).or_insert(0) += 1;
        }
    }

    let repeated = pages_per_key
        .into_iter()
        .filter(|(_, count)| *count >= MIN_REPEATED_PAGES && count * 2 >= page_count)
        .map(|(key, _)| key)
        .collect::<BTreeSet<String>>();

    let mut kept = Vec::new();
    let mut removed = 0usize;
    let mut headings_seen = BTreeSet::<String>::new();
    for page_lines in pages.into_values() {
        let edges = edge_indices(&page_lines);
        for (index, line) in page_lines.into_iter().enumerate() {
            if edges.contains(&index) {
                let key = edge_key(&line.text);
                let first_heading = is_heading(&line.text) && headings_seen.insert(key.clone());
                if repeated.contains(&key) && !first_heading {
                    removed += 1;
                    continue;
                }
            }
            kept.push(line);
        }
    }

    (kept, removed)
}

/// Joins `main-` / `tenance` pairs split across consecutive lines of a page.
pub fn merge_hyphenated_lines(lines: Vec<ExtractedLine>) -> (Vec<ExtractedLine>, usize) {
    let mut merged = Vec::<ExtractedLine>::with_capacity(lines.len());
    let mut merges = 0usize;
    let mut iter = lines.into_iter().peekable();

    while let Some(current) = iter.next() {
        let joins_next = iter.peek().is_some_and(|next| {
            next.page == current.page && should_merge_hyphenated_pair(&current.text, &next.text)
        });
        if joins_next {
            let Some(next) = iter.next() else {
                break;
            };
            let text = format!(
                "{}{}",
                current.text.trim_end().trim_end_matches('-'),
                next.text.trim_start()
            );
            merged.push(ExtractedLine::new(text, current.page));
            merges += 1;
            continue;
        }
        merged.push(current);
    }

    (merged, merges)
}

fn should_merge_hyphenated_pair(current: &str, next: &str) -> bool {
    let left = current.trim_end();
    if !left.ends_with('-') {
        return false;
    }

    let right = next.trim_start();
    let starts_with_lowercase = right
        .chars()
        .next()
        .map(|character| character.is_ascii_lowercase())
        .unwrap_or(false);
    if !starts_with_lowercase {
        return false;
    }

    left.trim_end_matches('-')
        .chars()
        .last()
        .map(|character| character.is_ascii_alphabetic())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, page: u32) -> ExtractedLine {
        ExtractedLine::new(text, page)
    }

    fn default_filter() -> RevisionFilter {
        let verbs = ["Revised", "Added", "Deleted", "Updated", "Removed"]
            .iter()
            .map(|verb| verb.to_string())
            .collect::<Vec<String>>();
        RevisionFilter::new(&verbs, &["=to=".to_string()])
    }

    #[test]
    fn revision_filter_matches_leading_verbs_and_markers() {
        let filter = default_filter();
        assert!(filter.is_revision_line("Revised 03/2024: updated procedure"));
        assert!(filter.is_revision_line("6.4.1 Added: recurring AD tracking"));
        assert!(filter.is_revision_line("REVISED section 5"));
        assert!(filter.is_revision_line("Page 12 =to= page 13"));
        assert!(!filter.is_revision_line("6.4.1 AD Management Process"));
        assert!(!filter.is_revision_line("added to the tracking list when received"));
        assert!(!filter.is_revision_line("Records are updated monthly"));
    }

    #[test]
    fn numbered_headings_starting_with_a_verb_are_not_revision_lines() {
        let filter = default_filter();
        assert!(!filter.is_revision_line("9.3 Removed Parts Control"));
        assert!(!filter.is_revision_line("4.2 Updated Tooling Requirements"));
        assert!(filter.is_revision_line("6.4 Revised 03/2024"));
        assert!(filter.is_revision_line("9.3 Removed: Obsolete Parts Tags"));
        assert!(filter.is_revision_line("6.4.1 Added recurring AD tracking"));
        assert!(filter.is_revision_line("Removed Parts Control"));
    }

    #[test]
    fn edge_key_masks_digit_runs() {
        assert_eq!(edge_key("  Page 12 of  340 "), "page # of #");
        assert_eq!(edge_key("GMM Rev. 7"), "gmm rev. #");
        assert_eq!(edge_key("Page 3 of 340"), edge_key("page 19 of 340"));
    }

    #[test]
    fn strips_repeated_headers_and_keeps_first_repeated_heading() {
        let words = ["alpha", "beta", "gamma", "delta"];
        let mut lines = Vec::new();
        for page in 1..=4u32 {
            lines.push(line("ACME Airlines General Maintenance Manual", page));
            lines.push(line("6.4 Airworthiness Directives", page));
            lines.push(line("shared middle paragraph", page));
            lines.push(line(words[page as usize - 1], page));
            lines.push(line(&format!("Page {page} of 4"), page));
        }

        let (kept, removed) =
            strip_repeated_edge_lines(lines, |text| text.starts_with("6.4"));

        assert_eq!(removed, 11);
        assert_eq!(kept.len(), 9);
        assert!(kept.iter().all(|line| !line.text.contains("ACME")));
        let headings = kept
            .iter()
            .filter(|line| line.text.starts_with("6.4"))
            .collect::<Vec<&ExtractedLine>>();
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].page, 1);
    }

    #[test]
    fn keeps_lines_repeated_on_too_few_pages() {
        let mut lines = Vec::new();
        for page in 1..=8 {
            let header = if page <= 3 { "Appendix banner" } else { "unique" };
            lines.push(line(&format!("{header} {}", if page <= 3 { "" } else { "x" }), page));
            lines.push(line(&format!("distinct body {page} alpha"), page));
            lines.push(line(&format!("more words {page} beta gamma"), page));
            lines.push(line(&format!("closing sentence {page} delta"), page));
            lines.push(line(&format!("final remark {page} epsilon"), page));
        }

        let (kept, _) = strip_repeated_edge_lines(lines, |_| false);
        assert_eq!(
            kept.iter()
                .filter(|line| line.text.starts_with("Appendix banner"))
                .count(),
            3
        );
    }

    #[test]
    fn merges_hyphenated_words_within_a_page() {
        let lines = vec![
            line("routine main-", 1),
            line("tenance schedule", 1),
            line("cross-", 1),
            line("Check", 1),
            line("end of page re-", 1),
            line("vision", 2),
        ];
        let (merged, merges) = merge_hyphenated_lines(lines);
        assert_eq!(merges, 1);
        assert_eq!(merged[0].text, "routine maintenance schedule");
        assert_eq!(merged.len(), 5);
    }
}
