//! The event index: curated historical events searchable by description.
//!
//! The index itself is immutable once built. Year filtering produces an
//! [`EventFilter`] value that the caller threads into [`EventIndex::search`],
//! so essays checked concurrently against one shared index never see each
//! other's filters.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use date_check_types::{DateSpec, KnowledgeRecord};

use crate::error::{CheckError, CheckResult};
use crate::lemma::{Lemmatizer, normalize_text};
use crate::tfidf::TfidfVectorizer;

/// A historical event with its known dates.
#[derive(Debug, Clone)]
pub struct KnowledgeEvent {
    pub description: String,
    pub dates: Vec<DateSpec>,
}

impl KnowledgeEvent {
    /// Years this event touches: plain dates and both ends of intervals.
    fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.dates
            .iter()
            .flat_map(|d| match d {
                DateSpec::Date(p) => vec![p.year_number()],
                DateSpec::DateInterval { start, end } => {
                    vec![start.year_number(), end.year_number()]
                }
                DateSpec::Decade { .. } => Vec::new(),
            })
            .flatten()
    }
}

// ── Filter ───────────────────────────────────────────────────────────

/// The subset of events a search may return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventFilter {
    /// `None` admits every event
    members: Option<BTreeSet<usize>>,
}

impl EventFilter {
    pub fn all() -> Self {
        EventFilter { members: None }
    }

    pub fn only(members: impl IntoIterator<Item = usize>) -> Self {
        EventFilter {
            members: Some(members.into_iter().collect()),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.as_ref().is_none_or(|m| m.contains(&index))
    }

    /// Number of admitted events, `None` when unrestricted.
    pub fn size(&self) -> Option<usize> {
        self.members.as_ref().map(BTreeSet::len)
    }
}

// ── Index ────────────────────────────────────────────────────────────

/// One ranked search result.
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    pub index: usize,
    pub event: &'a KnowledgeEvent,
    pub score: f32,
}

pub struct EventIndex {
    events: Vec<KnowledgeEvent>,
    vectorizer: TfidfVectorizer,
    /// term index → (event index, weight)
    postings: Vec<Vec<(usize, f32)>>,
    lemmatizer: Arc<dyn Lemmatizer>,
    retrieval_depth: usize,
}

impl EventIndex {
    /// Normalize every description and fit the vector model over them.
    pub fn build(
        records: Vec<KnowledgeRecord>,
        lemmatizer: Arc<dyn Lemmatizer>,
        max_features: usize,
        retrieval_depth: usize,
    ) -> CheckResult<Self> {
        if records.is_empty() {
            return Err(CheckError::IndexBuild("knowledge base is empty".to_string()));
        }
        for (i, r) in records.iter().enumerate() {
            if r.event.trim().is_empty() {
                return Err(CheckError::IndexBuild(format!(
                    "record {i} has an empty event description"
                )));
            }
            if r.dates.is_empty() {
                return Err(CheckError::IndexBuild(format!(
                    "record {i} ('{}') has no dates",
                    r.event
                )));
            }
        }

        let events: Vec<KnowledgeEvent> = records
            .into_iter()
            .map(|r| KnowledgeEvent {
                description: r.event,
                dates: r.dates,
            })
            .collect();
        let normalized: Vec<String> = events
            .iter()
            .map(|e| normalize_text(&e.description, lemmatizer.as_ref()))
            .collect();

        let vectorizer = TfidfVectorizer::fit(&normalized, max_features)?;
        let mut postings = vec![Vec::new(); vectorizer.vocabulary_len()];
        for (doc, text) in normalized.iter().enumerate() {
            for (term, weight) in vectorizer.transform(text) {
                postings[term].push((doc, weight));
            }
        }

        log::info!(
            "event index: {} events, {} terms",
            events.len(),
            vectorizer.vocabulary_len()
        );

        Ok(EventIndex {
            events,
            vectorizer,
            postings,
            lemmatizer,
            retrieval_depth,
        })
    }

    /// Read a JSON knowledge-base file and build the index from it.
    pub fn load(
        path: &Path,
        lemmatizer: Arc<dyn Lemmatizer>,
        max_features: usize,
        retrieval_depth: usize,
    ) -> CheckResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CheckError::IndexBuild(format!("cannot read knowledge base {}: {e}", path.display()))
        })?;
        let records: Vec<KnowledgeRecord> = serde_json::from_str(&content).map_err(|e| {
            CheckError::IndexBuild(format!("cannot parse knowledge base {}: {e}", path.display()))
        })?;
        Self::build(records, lemmatizer, max_features, retrieval_depth)
    }

    /// Events with a date year, or an interval start or end year, inside
    /// `[start_year, end_year]`.
    pub fn filter(&self, start_year: i32, end_year: i32) -> EventFilter {
        let range = start_year..=end_year;
        EventFilter::only(
            self.events
                .iter()
                .enumerate()
                .filter(|(_, e)| e.years().any(|y| range.contains(&y)))
                .map(|(i, _)| i),
        )
    }

    /// Rank events by similarity to `query`.
    ///
    /// The top `retrieval_depth` events over the whole corpus are taken
    /// (ties in corpus order) and then restricted to `filter`, so narrowing
    /// the filter never reorders what remains.
    pub fn search(&self, query: &str, filter: &EventFilter) -> Vec<Hit<'_>> {
        let normalized = normalize_text(query, self.lemmatizer.as_ref());
        self.search_normalized(&normalized, filter)
    }

    /// [`search`](Self::search) for a query already passed through
    /// [`normalize_text`] with this index's lemmatizer.
    pub fn search_normalized(&self, normalized: &str, filter: &EventFilter) -> Vec<Hit<'_>> {
        let mut scores = vec![0f32; self.events.len()];
        for (term, q_weight) in self.vectorizer.transform(normalized) {
            for &(doc, d_weight) in &self.postings[term] {
                scores[doc] += q_weight * d_weight;
            }
        }

        let mut order: Vec<usize> = (0..self.events.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
        order.truncate(self.retrieval_depth);

        order
            .into_iter()
            .filter(|&i| filter.contains(i))
            .map(|i| Hit {
                index: i,
                event: &self.events[i],
                score: scores[i],
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn lemmatizer(&self) -> &dyn Lemmatizer {
        self.lemmatizer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lemma::SuffixLemmatizer;
    use date_check_types::PartialDate;

    pub(crate) fn record(event: &str, dates: Vec<DateSpec>) -> KnowledgeRecord {
        KnowledgeRecord {
            event: event.to_string(),
            dates,
        }
    }

    fn year(y: &str) -> DateSpec {
        DateSpec::Date(PartialDate::year(y))
    }

    fn interval(a: &str, b: &str) -> DateSpec {
        DateSpec::DateInterval {
            start: PartialDate::year(a),
            end: PartialDate::year(b),
        }
    }

    fn index(records: Vec<KnowledgeRecord>) -> EventIndex {
        EventIndex::build(records, Arc::new(SuffixLemmatizer), 100_000, 100).unwrap()
    }

    fn sample() -> EventIndex {
        index(vec![
            record("Крымская война", vec![interval("1853", "1856")]),
            record("Северная война", vec![interval("1700", "1721")]),
            record("Отечественная война", vec![year("1812")]),
            record("Отмена крепостного права", vec![year("1861")]),
            record("Декабристское восстание", vec![year("1825")]),
        ])
    }

    #[test]
    fn test_build_rejects_empty_and_malformed() {
        let l: Arc<dyn Lemmatizer> = Arc::new(SuffixLemmatizer);
        assert!(matches!(
            EventIndex::build(vec![], l.clone(), 100, 100),
            Err(CheckError::IndexBuild(_))
        ));
        assert!(matches!(
            EventIndex::build(vec![record("  ", vec![year("1812")])], l.clone(), 100, 100),
            Err(CheckError::IndexBuild(_))
        ));
        assert!(matches!(
            EventIndex::build(vec![record("Война", vec![])], l, 100, 100),
            Err(CheckError::IndexBuild(_))
        ));
    }

    #[test]
    fn test_search_ranks_best_match_first() {
        let idx = sample();
        let hits = idx.search("крымской войны", &EventFilter::all());
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].event.description, "Крымская война");
        assert!(hits[0].score > hits[1].score);
        // the other wars share "война" and outrank unrelated events
        assert!(hits[1].score > 0.0);
        assert_eq!(hits[3].score, 0.0);
    }

    #[test]
    fn test_search_ties_in_corpus_order() {
        let idx = sample();
        let hits = idx.search("полностью несвязанный запрос", &EventFilter::all());
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_filter_years_inclusive() {
        let idx = sample();
        let f = idx.filter(1853, 1856);
        assert!(f.contains(0));
        assert!(!f.contains(1));
        assert_eq!(f.size(), Some(1));

        // interval end inside the range counts
        let f = idx.filter(1720, 1812);
        assert!(f.contains(1));
        assert!(f.contains(2));
        assert!(!f.contains(0));
    }

    #[test]
    fn test_filter_narrowing_keeps_relative_order() {
        let idx = sample();
        let all = idx.search("война", &EventFilter::all());
        let narrow = idx.search("война", &idx.filter(1800, 1860));
        assert!(narrow.len() <= all.len());
        let all_order: Vec<usize> = all
            .iter()
            .map(|h| h.index)
            .filter(|i| narrow.iter().any(|h| h.index == *i))
            .collect();
        let narrow_order: Vec<usize> = narrow.iter().map(|h| h.index).collect();
        assert_eq!(all_order, narrow_order);
    }

    #[test]
    fn test_empty_intersection_is_empty_result() {
        let idx = sample();
        let hits = idx.search("Крымская война", &idx.filter(100, 200));
        assert!(hits.is_empty());
    }

    #[test]
    fn test_retrieval_depth_applies_before_filter() {
        let idx = EventIndex::build(
            vec![
                record("Крымская война", vec![year("1853")]),
                record("Северная война", vec![year("1700")]),
                record("Крымская кампания", vec![year("1854")]),
            ],
            Arc::new(SuffixLemmatizer),
            100,
            1,
        )
        .unwrap();
        // best overall hit is outside the filter, so nothing survives
        let hits = idx.search("крымская война", &idx.filter(1700, 1700));
        assert!(hits.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(
            &path,
            r#"[{"event": "Крымская война", "dates": [{"date_interval": {"start": {"year": "1853"}, "end": {"year": 1856}}}]},
                {"event": "Стоглавый собор", "dates": [{"date": {"year": "1551", "month": 2, "day": "23"}}]}]"#,
        )
        .unwrap();
        let idx = EventIndex::load(&path, Arc::new(SuffixLemmatizer), 100, 100).unwrap();
        assert_eq!(idx.len(), 2);

        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(
            EventIndex::load(&path, Arc::new(SuffixLemmatizer), 100, 100),
            Err(CheckError::IndexBuild(_))
        ));
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            EventIndex::load(&path, Arc::new(SuffixLemmatizer), 100, 100),
            Err(CheckError::IndexBuild(_))
        ));
    }
}
