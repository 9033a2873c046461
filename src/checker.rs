//! The consistency checker: ties date extraction, event-phrase
//! reconstruction and event retrieval together and decides which date
//! mentions contradict the knowledge base.
//!
//! A [`DateChecker`] is built once at startup and only read afterwards;
//! every per-essay value (the topical year filter included) lives on the
//! stack of [`DateChecker::check`].

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use date_check_types::{
    BatchRequest, DateSpec, ErrorRecord, EssayRequest, EssayResponse, FACTUAL_DATE_ERROR,
    PartialDate, SentenceParse,
};
use regex::Regex;

use crate::config::CheckerConfig;
use crate::conllu::ParseTree;
use crate::dates::{DateMention, find_dates};
use crate::error::{CheckError, CheckResult};
use crate::index::{EventFilter, EventIndex};
use crate::lemma::{DictionaryLemmatizer, Lemmatizer, SuffixLemmatizer};
use crate::phrase::reconstruct;

static RE_TOPIC_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{3,4}").expect("topic year regex"));

// ── Topic ────────────────────────────────────────────────────────────

/// The topical year range: exactly two 3–4 digit numbers in the topic,
/// returned in ascending order.
pub fn topic_years(topic: &str) -> Option<(i32, i32)> {
    let years: Vec<i32> = RE_TOPIC_YEAR
        .find_iter(topic)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    match years.as_slice() {
        &[a, b] => Some((a.min(b), a.max(b))),
        _ => None,
    }
}

// ── Sentence cleanup ─────────────────────────────────────────────────

/// Repair spacing around commas and periods left behind by upstream text
/// cleanup: `a,b` → `a, b`, `a ,` → `a,`, `a.B` → `a. B`, `a .B` → `a. B`.
///
/// Windows are collected over the whole input first and then replaced
/// everywhere, in discovery order.
pub fn sanitize_punctuation(text: &str) -> String {
    let mut text = text.replace("=\"\"", "");
    let chars: Vec<char> = text.chars().collect();
    let mut replacements: Vec<(String, String)> = Vec::new();

    for i in 0..chars.len().saturating_sub(3) {
        let (a, b, c, d) = (chars[i], chars[i + 1], chars[i + 2], chars[i + 3]);
        if !a.is_lowercase() {
            continue;
        }
        if b == ',' && c.is_lowercase() {
            replacements.push((format!("{a}{b}{c}"), format!("{a}{b} {c}")));
        }
        if b == ' ' && c == ',' {
            replacements.push((format!("{a}{b}{c}"), format!("{a}{c}")));
        }
        if b == '.' && c.is_uppercase() {
            replacements.push((format!("{a}{b}{c}"), format!("{a}{b} {c}")));
        }
        if b == ' ' && c == '.' && d.is_uppercase() {
            replacements.push((format!("{a}{b}{c}{d}"), format!("{a}. {d}")));
        }
    }

    for (from, to) in replacements {
        text = text.replace(&from, &to);
    }
    text
}

/// Unwrap parenthesized dates, then repair punctuation.
pub fn prepare_sentence(sentence: &str, mentions: &[DateMention]) -> String {
    let mut sentence = sentence.to_string();
    for mention in mentions {
        for text in mention.search_texts() {
            sentence = sentence.replace(&format!("({text})"), text);
        }
    }
    sanitize_punctuation(&sentence)
}

// ── Date comparison ──────────────────────────────────────────────────

/// Numeric when both sides are numbers ("05" = "5"), textual otherwise.
fn same_value(a: &str, b: &str) -> bool {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a.trim() == b.trim(),
    }
}

/// Field-wise agreement; a field missing on either side matches anything.
fn fields_agree(mention: &PartialDate, candidate: &PartialDate) -> bool {
    let month = match (mention.month, candidate.month) {
        (Some(m), Some(c)) => m == c,
        _ => true,
    };
    let day = match (&mention.day, &candidate.day) {
        (Some(m), Some(c)) => same_value(m, c),
        _ => true,
    };
    same_value(&mention.year, &candidate.year) && month && day
}

/// Whether one knowledge-base date agrees with the mentioned date.
///
/// A plain date is held against another plain date or against the start of
/// an interval; an interval only against another interval. Decades are
/// never refuted.
fn date_agrees(mention: &DateSpec, candidate: &DateSpec) -> bool {
    match (mention, candidate) {
        (DateSpec::Decade { .. }, _) => true,
        (DateSpec::Date(m), DateSpec::Date(c)) => fields_agree(m, c),
        (DateSpec::Date(m), DateSpec::DateInterval { start, .. }) => fields_agree(m, start),
        (
            DateSpec::DateInterval { start, end },
            DateSpec::DateInterval {
                start: c_start,
                end: c_end,
            },
        ) => fields_agree(start, c_start) && fields_agree(end, c_end),
        _ => false,
    }
}

/// A candidate event contradicts the mention if any of its dates disagrees.
pub fn candidate_disagrees(mention: &DateSpec, candidate_dates: &[DateSpec]) -> bool {
    candidate_dates.iter().any(|c| !date_agrees(mention, c))
}

// ── Checker ──────────────────────────────────────────────────────────

/// Pick the lemmatizer named by the configuration.
pub fn build_lemmatizer(config: &CheckerConfig) -> CheckResult<Arc<dyn Lemmatizer>> {
    let lemmatizer: Arc<dyn Lemmatizer> = match &config.lemma_dictionary {
        Some(path) => Arc::new(DictionaryLemmatizer::from_path(path)?),
        None => Arc::new(SuffixLemmatizer),
    };
    Ok(lemmatizer)
}

pub struct DateChecker {
    index: EventIndex,
    config: CheckerConfig,
}

impl DateChecker {
    pub fn new(index: EventIndex, config: CheckerConfig) -> Self {
        DateChecker { index, config }
    }

    /// Load the lemmatizer and the knowledge base named by `config`.
    pub fn from_config(config: CheckerConfig) -> CheckResult<Self> {
        config.validate()?;
        let lemmatizer = build_lemmatizer(&config)?;
        let index = EventIndex::load(
            &config.knowledge_base,
            lemmatizer,
            config.max_features,
            config.retrieval_depth,
        )?;
        Ok(DateChecker::new(index, config))
    }

    pub fn index(&self) -> &EventIndex {
        &self.index
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Events plausible for an essay on `topic`.
    pub fn topic_filter(&self, topic: &str) -> EventFilter {
        match topic_years(topic) {
            Some((start, end)) => self.index.filter(start, end),
            None => EventFilter::all(),
        }
    }

    /// Whether `mention` is consistent with the knowledge base.
    ///
    /// Without a located event phrase, or without a candidate scoring
    /// strictly above the threshold, nothing can refute the mention. With
    /// one, the mention fails only if every examined candidate disagrees.
    pub fn check_date(
        &self,
        tree: &ParseTree,
        mention: &DateMention,
        filter: &EventFilter,
    ) -> bool {
        let Some(date_info) = &mention.date_info else {
            return true;
        };
        let Some(query) = reconstruct(
            tree,
            mention,
            self.index.lemmatizer(),
            self.config.fuzzy_threshold,
        ) else {
            return true;
        };

        let hits = self.index.search_normalized(&query.text, filter);
        let Some(best) = hits.first() else {
            log::debug!("'{}': no candidate events", mention.matched_text);
            return true;
        };
        log::debug!(
            "'{}': best candidate '{}' scored {:.4}",
            mention.matched_text,
            best.event.description,
            best.score
        );
        if best.score <= self.config.score_threshold {
            return true;
        }

        let examined = hits.len().min(self.config.examined_candidates);
        let mismatches = hits[..examined]
            .iter()
            .filter(|h| candidate_disagrees(date_info, &h.event.dates))
            .count();
        mismatches < examined
    }

    /// Check one essay. Sentences, parses and offsets correspond one to one.
    pub fn check(
        &self,
        sentences: &[String],
        parses: &[SentenceParse],
        topic: &str,
        offsets: &[(usize, usize)],
    ) -> CheckResult<Vec<ErrorRecord>> {
        if sentences.len() != parses.len() || sentences.len() != offsets.len() {
            return Err(CheckError::ContractViolation {
                sentences: sentences.len(),
                parses: parses.len(),
                offsets: offsets.len(),
            });
        }

        let filter = self.topic_filter(topic);
        if let Some(size) = filter.size() {
            log::debug!("topic '{topic}' narrows the index to {size} events");
        }

        let mut errors = Vec::new();
        for ((sentence, parse), &(offset, _)) in sentences.iter().zip(parses).zip(offsets) {
            let mentions = find_dates(sentence);
            if mentions.is_empty() {
                continue;
            }
            let sentence = prepare_sentence(sentence, &mentions);
            let tree = match ParseTree::from_parse(parse) {
                Ok(tree) => tree,
                Err(e) => {
                    log::warn!("skipping sentence '{sentence}': {e}");
                    continue;
                }
            };

            for mention in &mentions {
                if self.check_date(&tree, mention, &filter) {
                    continue;
                }
                match locate_in_sentence(&sentence, mention) {
                    Some((text, start)) => {
                        let start_span = offset + start;
                        errors.push(ErrorRecord {
                            kind: FACTUAL_DATE_ERROR.to_string(),
                            end_span: start_span + text.chars().count(),
                            text: text.to_string(),
                            start_span,
                        });
                    }
                    None => log::warn!(
                        "cannot locate '{}' in sentence '{sentence}'",
                        mention.matched_text
                    ),
                }
            }
        }
        Ok(errors)
    }

    /// Check one essay request, skipping subjects the checker is not set up for.
    pub fn handle(&self, request: &EssayRequest) -> CheckResult<EssayResponse> {
        if !self.config.subjects.iter().any(|s| s == &request.subject) {
            log::debug!("subject '{}' not checked", request.subject);
            return Ok(EssayResponse::default());
        }

        let sentences: Vec<String> = request
            .sentences
            .iter()
            .flatten()
            .map(|s| s.text.clone())
            .collect();
        let parses: Vec<SentenceParse> = request.parses.iter().flatten().cloned().collect();
        let offsets: Vec<(usize, usize)> = request.offsets.iter().flatten().copied().collect();

        let mistakes = self.check(&sentences, &parses, request.topic(), &offsets)?;
        Ok(EssayResponse { mistakes })
    }

    pub fn handle_batch(&self, batch: &BatchRequest) -> CheckResult<Vec<EssayResponse>> {
        let started = Instant::now();
        let responses = batch
            .input_data
            .iter()
            .map(|request| self.handle(request))
            .collect::<CheckResult<Vec<_>>>()?;
        log::info!(
            "checked {} essays in {:.3}s",
            responses.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(responses)
    }
}

/// Character position of the first occurrence of the mention in `sentence`,
/// with the text that was found.
fn locate_in_sentence<'a>(sentence: &str, mention: &'a DateMention) -> Option<(&'a str, usize)> {
    mention.search_texts().find_map(|text| {
        let byte = sentence.find(text)?;
        Some((text, sentence[..byte].chars().count()))
    })
}
