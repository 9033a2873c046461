//! TF-IDF vector model over word unigrams and bigrams.
//!
//! Tokens are lowercase runs of two or more word characters. Term weights
//! are raw counts scaled by smoothed IDF, `ln((1 + n) / (1 + df)) + 1`, and
//! every vector is L2-normalized, so a dot product is a cosine similarity.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CheckError, CheckResult};

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token regex"));

/// Sparse vector as `(term index, weight)` pairs sorted by term index.
pub type SparseVector = Vec<(usize, f32)>;

/// Unigrams followed by bigrams of consecutive tokens.
fn analyze(doc: &str) -> Vec<String> {
    let lower = doc.to_lowercase();
    let tokens: Vec<&str> = TOKEN_RE.find_iter(&lower).map(|m| m.as_str()).collect();
    let mut terms: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    terms.extend(tokens.windows(2).map(|w| format!("{} {}", w[0], w[1])));
    terms
}

fn count_terms(doc: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for term in analyze(doc) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    /// Learn the vocabulary and IDF weights, keeping at most `max_features`
    /// terms by corpus frequency (ties resolved alphabetically).
    pub fn fit(docs: &[String], max_features: usize) -> CheckResult<Self> {
        let mut total: HashMap<String, usize> = HashMap::new();
        let mut df: HashMap<String, usize> = HashMap::new();
        for doc in docs {
            for (term, count) in count_terms(doc) {
                *total.entry(term.clone()).or_insert(0) += count;
                *df.entry(term).or_insert(0) += 1;
            }
        }
        if total.is_empty() {
            return Err(CheckError::IndexBuild(
                "empty vocabulary; the corpus has no indexable words".to_string(),
            ));
        }

        let mut terms: Vec<(String, usize)> = total.into_iter().collect();
        if terms.len() > max_features {
            terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            terms.truncate(max_features);
        }
        let mut kept: Vec<String> = terms.into_iter().map(|(t, _)| t).collect();
        kept.sort();

        let n = docs.len() as f32;
        let idf = kept
            .iter()
            .map(|t| {
                let d = df.get(t).copied().unwrap_or(0) as f32;
                ((1.0 + n) / (1.0 + d)).ln() + 1.0
            })
            .collect();
        let vocabulary = kept.into_iter().enumerate().map(|(i, t)| (t, i)).collect();

        Ok(TfidfVectorizer { vocabulary, idf })
    }

    pub fn transform(&self, doc: &str) -> SparseVector {
        let mut vector: SparseVector = count_terms(doc)
            .into_iter()
            .filter_map(|(term, count)| {
                let &idx = self.vocabulary.get(&term)?;
                Some((idx, count as f32 * self.idf[idx]))
            })
            .collect();
        vector.sort_by_key(|&(idx, _)| idx);

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut vector {
                *w /= norm;
            }
        }
        vector
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    fn dot(a: &SparseVector, b: &SparseVector) -> f32 {
        let b: HashMap<usize, f32> = b.iter().copied().collect();
        a.iter().map(|(i, w)| w * b.get(i).copied().unwrap_or(0.0)).sum()
    }

    #[test]
    fn test_analyze_unigrams_and_bigrams() {
        assert_eq!(
            analyze("Крымская война, 1853"),
            vec!["крымская", "война", "1853", "крымская война", "война 1853"]
        );
        // single characters are not tokens
        assert_eq!(analyze("в бой"), vec!["бой"]);
    }

    #[test]
    fn test_fit_vocabulary_size() {
        let v = TfidfVectorizer::fit(&docs(&["крымская война", "северная война"]), 100).unwrap();
        // крымская, война, северная, крымская война, северная война
        assert_eq!(v.vocabulary_len(), 5);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let v = TfidfVectorizer::fit(&docs(&["война мир", "война битва", "война"]), 1).unwrap();
        assert_eq!(v.vocabulary_len(), 1);
        assert!(!v.transform("война").is_empty());
        assert!(v.transform("мир").is_empty());
    }

    #[test]
    fn test_transform_is_unit_length() {
        let v = TfidfVectorizer::fit(&docs(&["крымская война", "северная война"]), 100).unwrap();
        let q = v.transform("крымская война");
        let norm: f32 = q.iter().map(|(_, w)| w * w).sum();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_single_doc_similarity() {
        let v = TfidfVectorizer::fit(&docs(&["крымская война"]), 100).unwrap();
        let doc = v.transform("крымская война");
        let query = v.transform("война началась");
        // one of three equally weighted document terms
        assert!((dot(&doc, &query) - 1.0 / 3f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_rarer_terms_weigh_more() {
        let v = TfidfVectorizer::fit(&docs(&["крымская война", "северная война"]), 100).unwrap();
        let crimean = v.transform("крымская война");
        let rare = dot(&crimean, &v.transform("крымская"));
        let common = dot(&crimean, &v.transform("война"));
        assert!(rare > common);
    }

    #[test]
    fn test_empty_corpus_fails() {
        assert!(matches!(
            TfidfVectorizer::fit(&docs(&["", "а"]), 100),
            Err(CheckError::IndexBuild(_))
        ));
    }
}
