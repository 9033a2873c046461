//! Event-phrase reconstruction: from a date mention in a parsed sentence to
//! the words describing the event that date belongs to.
//!
//! The mention is located among the tree tokens by fuzzy comparison, then
//! the tree is climbed from the token after it to the clause head. The
//! clause head, its subject and the climbed branch supply the event words.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::conllu::{ParseTree, ROOT_RELATION};
use crate::dates::DateMention;
use crate::lemma::{Lemmatizer, is_stopword, normalize_text};

/// Relations at which the upward walk stops.
const TERMINAL_RELATIONS: &[&str] = &["root", "parataxis", "conj", "nsubj", ROOT_RELATION];

/// Child relations left out of a clause subtree.
const DETACHED_RELATIONS: &[&str] = &["acl:relcl", "acl", "conj"];

/// Adjectival clauses starting with this participle ("получивший название...")
/// still belong to the event.
const RESULT_PARTICIPLE: &str = "получивш";

const YEAR_STEM: &str = "год";

const DEMONSTRATIVE: &str = "это";

// ── Fuzzy token similarity ───────────────────────────────────────────

/// Normalized indel similarity on characters, 0..=100.
///
/// `100 * (1 - indel / (|a| + |b|))`, where indel distance counts insertions
/// and deletions only; equivalently `200 * lcs / (|a| + |b|)`.
pub fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[b.len()];
    200.0 * lcs as f64 / total as f64
}

// ── Span location ────────────────────────────────────────────────────

/// First run of tree tokens that matches `words` one by one with at least
/// `threshold` similarity. Returns token ordinals.
pub fn locate_span(
    tree: &ParseTree,
    words: &[&str],
    threshold: f64,
) -> Option<RangeInclusive<usize>> {
    let tokens = tree.tokens();
    if words.is_empty() || words.len() > tokens.len() {
        return None;
    }
    (0..=tokens.len() - words.len())
        .find(|&i| {
            words
                .iter()
                .enumerate()
                .all(|(j, w)| indel_ratio(&tokens[i + j].form, w) >= threshold)
        })
        .map(|i| tokens[i].ord..=tokens[i + words.len() - 1].ord)
}

fn mention_words(text: &str) -> Vec<&str> {
    text.split(' ').filter(|w| !w.is_empty()).collect()
}

// ── Reconstruction ───────────────────────────────────────────────────

/// The event words recovered for one date mention.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    /// Normalized query text
    pub text: String,
    /// Ordinals of the matched date tokens
    pub span: RangeInclusive<usize>,
    pub anchor: usize,
    /// Clause head the walk stopped at
    pub terminal: usize,
    pub subject_found: bool,
    /// "это" plus a numeral modifier under the clause head
    pub definition: bool,
}

/// Clause subtree: descends into every child except detached clauses.
fn collect_clause(tree: &ParseTree, id: usize, out: &mut BTreeSet<usize>) {
    out.insert(id);
    for &child in tree.children(id) {
        let token = tree.node(child);
        let detached = DETACHED_RELATIONS.contains(&token.deprel.as_str())
            && !(token.deprel == "acl" && token.form.starts_with(RESULT_PARTICIPLE));
        if !detached {
            collect_clause(tree, child, out);
        }
    }
}

fn collect_subtree(tree: &ParseTree, id: usize, out: &mut BTreeSet<usize>) {
    out.insert(id);
    for &child in tree.children(id) {
        collect_subtree(tree, child, out);
    }
}

/// Climb from `anchor` to the clause head. Returns `(terminal, previous)`,
/// where `previous` is the last token visited below the terminal. An `acl`
/// token ends the climb at its parent.
fn climb(tree: &ParseTree, anchor: usize) -> (usize, usize) {
    let mut node = anchor;
    let mut prev = anchor;
    while !TERMINAL_RELATIONS.contains(&tree.node(node).deprel.as_str()) {
        let Some(parent) = tree.parent(node) else {
            break;
        };
        let is_acl = tree.node(node).deprel == "acl";
        prev = node;
        node = parent;
        if is_acl {
            break;
        }
    }
    (node, prev)
}

/// Build the event query for `mention` from the sentence's parse tree.
///
/// Returns `None` when the mention carries no structured date or its words
/// cannot be found among the tree tokens.
pub fn reconstruct(
    tree: &ParseTree,
    mention: &DateMention,
    lemmatizer: &dyn Lemmatizer,
    fuzzy_threshold: f64,
) -> Option<EventQuery> {
    mention.date_info.as_ref()?;

    let (words, span) = mention.search_texts().find_map(|text| {
        let words = mention_words(text);
        let span = locate_span(tree, &words, fuzzy_threshold)?;
        Some((words, span))
    })?;

    let anchor = if *span.end() < tree.len() {
        span.end() + 1
    } else {
        *span.end()
    };
    let (terminal, prev) = climb(tree, anchor);

    let mut picked = BTreeSet::new();
    picked.insert(terminal);
    collect_clause(tree, prev, &mut picked);

    let mut subject_found = false;
    for &child in tree.children(terminal) {
        if tree.node(child).deprel == "nsubj" {
            subject_found = true;
            collect_subtree(tree, child, &mut picked);
        }
    }

    let marks: usize = tree
        .children(terminal)
        .iter()
        .map(|&c| {
            let t = tree.node(c);
            usize::from(t.form == DEMONSTRATIVE) + usize::from(t.deprel == "nummod")
        })
        .sum();
    let definition = marks == 2;

    if !subject_found || definition {
        collect_clause(tree, terminal, &mut picked);
    }

    let date_words: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let kept: Vec<String> = picked
        .into_iter()
        .filter(|&id| id != 0)
        .map(|id| tree.node(id).form.to_lowercase())
        .filter(|form| {
            form.chars().any(char::is_alphanumeric)
                && !is_stopword(form)
                && !date_words.contains(form)
                && !form.starts_with(YEAR_STEM)
        })
        .collect();
    let text = normalize_text(&kept.join(" "), lemmatizer);

    log::debug!(
        "event query for '{}': '{}' (terminal {}, subject {}, definition {})",
        mention.matched_text,
        text,
        terminal,
        subject_found,
        definition
    );

    Some(EventQuery {
        text,
        span,
        anchor,
        terminal,
        subject_found,
        definition,
    })
}
