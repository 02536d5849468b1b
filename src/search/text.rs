//! Text-in-image ranking over the inverted word index

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{IndexError, Result};
use crate::index::{normalize_phrase, tokenize, IndexEntry, IndexStore};

use super::{snippet, TextHit};

/// One candidate image for a text query
pub(crate) struct TextMatch<'a> {
    pub entry: &'a IndexEntry,
    pub matched_words: Vec<String>,
    pub phrase_match: bool,
}

impl TextMatch<'_> {
    pub fn into_hit(self, snippet_chars: usize) -> TextHit {
        TextHit {
            image_id: self.entry.image_id.clone(),
            matched_words: self.matched_words,
            phrase_match: self.phrase_match,
            snippet: snippet(&self.entry.ocr_text, snippet_chars),
            metadata: self.entry.metadata.clone(),
        }
    }
}

/// Distinct query tokens in order of first appearance
fn query_words(query: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tokenize(query)
        .into_iter()
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// True if the token sequence of `phrase` occurs in `text` on word boundaries
fn contains_phrase(text: &str, phrase: &str) -> bool {
    let text = format!(" {} ", normalize_phrase(text));
    text.contains(&format!(" {} ", phrase))
}

/// Rank every image matching at least one query word, best first.
///
/// Order: more distinct query words matched, then phrase matches, then
/// ascending image id.
pub(crate) fn rank<'a>(store: &'a IndexStore, query: &str) -> Result<Vec<TextMatch<'a>>> {
    let words = query_words(query);
    if words.is_empty() {
        return Err(IndexError::InvalidQuery(format!(
            "text query {:?} contains no searchable words",
            query
        )));
    }

    if let [word] = words.as_slice() {
        let Some(ids) = store.postings(word) else {
            return Ok(Vec::new());
        };
        // postings are already in ascending id order
        return ids
            .iter()
            .map(|id| {
                Ok(TextMatch {
                    entry: store.get(id)?,
                    matched_words: vec![word.clone()],
                    phrase_match: true,
                })
            })
            .collect();
    }

    let mut candidates: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for word in &words {
        if let Some(ids) = store.postings(word) {
            for id in ids {
                candidates.entry(id.as_str()).or_default().push(word.clone());
            }
        }
    }

    let phrase = normalize_phrase(query);
    let mut matches = candidates
        .into_iter()
        .map(|(id, matched_words)| {
            let entry = store.get(id)?;
            Ok(TextMatch {
                phrase_match: contains_phrase(&entry.ocr_text, &phrase),
                entry,
                matched_words,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    matches.sort_by(|a, b| {
        let key = |m: &TextMatch| (Reverse(m.matched_words.len()), Reverse(m.phrase_match));
        key(a)
            .cmp(&key(b))
            .then_with(|| a.entry.image_id.cmp(&b.entry.image_id))
    });

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fixtures::*;
    use crate::search::SearchEngine;

    fn ids(hits: &[TextHit]) -> Vec<&str> {
        hits.iter().map(|h| h.image_id.as_str()).collect()
    }

    #[test]
    fn test_scenario_text() {
        let store = two_images();
        let engine = SearchEngine::default();

        assert_eq!(ids(&engine.text(&store, "python", 10).unwrap()), vec!["B"]);
        assert_eq!(ids(&engine.text(&store, "hello", 10).unwrap()), vec!["A", "B"]);
        assert_eq!(ids(&engine.text(&store, "HELLO!", 10).unwrap()), vec!["A", "B"]);
    }

    #[test]
    fn test_unknown_word_is_empty() {
        let store = two_images();
        assert!(SearchEngine::default()
            .text(&store, "rust", 10)
            .unwrap()
            .is_empty());
        assert!(SearchEngine::default()
            .text(&store, "rust golang", 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_query_without_words_is_invalid() {
        let store = two_images();
        for q in ["", "   ", "?!."] {
            assert!(matches!(
                SearchEngine::default().text(&store, q, 10),
                Err(IndexError::InvalidQuery(_))
            ));
        }
    }

    #[test]
    fn test_multi_word_ranking() {
        let mut store = IndexStore::new();
        let e = vec![1.0, 0.0];
        store.upsert(entry("a", e.clone(), "learning about machines")).unwrap();
        store.upsert(entry("b", e.clone(), "machine learning rocks")).unwrap();
        store.upsert(entry("c", e.clone(), "learning machine basics")).unwrap();
        store.upsert(entry("d", e.clone(), "deep learning")).unwrap();
        store.upsert(entry("e", e.clone(), "unrelated")).unwrap();

        let hits = SearchEngine::default()
            .text(&store, "machine learning", 10)
            .unwrap();

        // b: both words + phrase, c: both words, a/d: one word each
        assert_eq!(ids(&hits), vec!["b", "c", "a", "d"]);
        assert!(hits[0].phrase_match);
        assert!(!hits[1].phrase_match);
        assert_eq!(hits[0].matched_words, vec!["machine", "learning"]);
        assert_eq!(hits[2].matched_words, vec!["learning"]);
    }

    #[test]
    fn test_phrase_respects_word_boundaries() {
        assert!(contains_phrase("Hello, World!", "hello world"));
        assert!(!contains_phrase("shello worlds", "hello world"));
    }

    #[test]
    fn test_max_results_and_snippet() {
        let mut store = IndexStore::new();
        let long_text = format!("hello {}", "x".repeat(500));
        store.upsert(entry("a", vec![1.0, 0.0], &long_text)).unwrap();
        store.upsert(entry("b", vec![1.0, 0.0], "hello")).unwrap();

        let engine = SearchEngine::default();
        let hits = engine.text(&store, "hello", 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].image_id, "a");
        assert!(hits[0].snippet.ends_with("..."));
        assert!(hits[0].snippet.chars().count() <= engine.config().snippet_chars + 3);

        assert!(engine.text(&store, "hello", 0).unwrap().is_empty());
    }
}
