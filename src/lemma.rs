//! Lexical normalization: lemmatizers, stopwords and query normalization.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use crate::error::CheckResult;

/// Maps a word form to its dictionary form.
pub trait Lemmatizer: Send + Sync {
    fn lemma(&self, word: &str) -> String;
}

// ── Rule-based normalizer ────────────────────────────────────────────

/// Reflexive verb suffixes, stripped before inflectional endings.
const REFLEXIVE: &[&str] = &["ся", "сь"];

/// Russian inflectional endings (nouns, adjectives, participles, verbs).
/// Ordered longest first; the first one leaving a long enough stem wins.
const ENDINGS: &[&str] = &[
    // 4
    "иями", "ями", "ами",
    // 3
    "ого", "его", "ому", "ему", "ыми", "ими", "иях", "иям", "ией", "ать", "ять", "ить", "еть",
    "уть", "ешь", "ете", "ишь", "ите", "ала", "ила", "ало", "ило", "али", "или", "ует", "уют",
    "ают", "яют",
    // 2
    "ая", "яя", "ое", "ее", "ые", "ие", "ый", "ий", "ой", "ей", "ом", "ем", "ам", "ям", "ах", "ях",
    "ую", "юю", "ью", "ия", "ию", "ии", "ов", "ев", "ть", "ла", "ло", "ли", "ет", "ит", "ут", "ют",
    "ат", "ят", "ых", "их", "ым", "им",
    // 1
    "а", "я", "о", "е", "ы", "и", "у", "ю", "ь", "й",
];

const MIN_STEM: usize = 3;

/// Deterministic suffix-stripping normalizer for Russian.
///
/// Produces a stable stem rather than a true dictionary lemma; every text
/// that passes through the same normalizer lands on the same form, which is
/// all the retrieval step needs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SuffixLemmatizer;

fn is_cyrillic(c: char) -> bool {
    matches!(c, 'а'..='я' | 'ё')
}

fn strip_suffix_keeping_stem<'a>(word: &'a str, suffixes: &[&str]) -> &'a str {
    let len = word.chars().count();
    for suffix in suffixes {
        let suffix_len = suffix.chars().count();
        if len >= suffix_len + MIN_STEM
            && let Some(stem) = word.strip_suffix(suffix)
        {
            return stem;
        }
    }
    word
}

impl Lemmatizer for SuffixLemmatizer {
    fn lemma(&self, word: &str) -> String {
        let lower: String = word.to_lowercase().replace('ё', "е");
        if !lower.chars().all(|c| is_cyrillic(c) || c == '-') || lower.chars().count() <= MIN_STEM {
            return lower;
        }
        let stem = strip_suffix_keeping_stem(&lower, REFLEXIVE);
        strip_suffix_keeping_stem(stem, ENDINGS).to_string()
    }
}

// ── Dictionary-backed lemmatizer ─────────────────────────────────────

/// Lemma table exported from a morphological analyzer, one `form<TAB>lemma`
/// pair per line. Unknown forms fall back to [`SuffixLemmatizer`].
#[derive(Debug, Default, Clone)]
pub struct DictionaryLemmatizer {
    table: HashMap<String, String>,
    fallback: SuffixLemmatizer,
}

impl DictionaryLemmatizer {
    pub fn from_tsv(content: &str) -> Self {
        let mut table = HashMap::new();
        let mut skipped = 0usize;
        for line in content.lines() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('\t') {
                Some((form, lemma)) if !form.is_empty() && !lemma.trim().is_empty() => {
                    table.insert(fold(form), fold(lemma.trim()));
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            log::warn!("lemma dictionary: skipped {skipped} malformed lines");
        }
        DictionaryLemmatizer {
            table,
            fallback: SuffixLemmatizer,
        }
    }

    pub fn from_path(path: &Path) -> CheckResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let lemmatizer = Self::from_tsv(&content);
        log::info!(
            "loaded {} lemma entries from {}",
            lemmatizer.len(),
            path.display()
        );
        Ok(lemmatizer)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
}

fn fold(word: &str) -> String {
    word.to_lowercase().replace('ё', "е")
}

impl Lemmatizer for DictionaryLemmatizer {
    fn lemma(&self, word: &str) -> String {
        match self.table.get(&fold(word)) {
            Some(lemma) => lemma.clone(),
            None => self.fallback.lemma(word),
        }
    }
}

// ── Stopwords ────────────────────────────────────────────────────────

const RUSSIAN_STOPWORDS: &[&str] = &[
    "и", "в", "во", "не", "что", "он", "на", "я", "с", "со", "как", "а", "то", "все", "она", "так",
    "его", "но", "да", "ты", "к", "у", "же", "вы", "за", "бы", "по", "только", "ее", "мне", "было",
    "вот", "от", "меня", "еще", "нет", "о", "из", "ему", "теперь", "когда", "даже", "ну", "вдруг",
    "ли", "если", "уже", "или", "ни", "быть", "был", "него", "до", "вас", "нибудь", "опять", "уж",
    "вам", "ведь", "там", "потом", "себя", "ничего", "ей", "может", "они", "тут", "где", "есть",
    "надо", "ней", "для", "мы", "тебя", "их", "чем", "была", "сам", "чтоб", "без", "будто", "чего",
    "раз", "тоже", "себе", "под", "будет", "ж", "тогда", "кто", "этот", "того", "потому", "этого",
    "какой", "совсем", "ним", "здесь", "этом", "один", "почти", "мой", "тем", "чтобы", "нее",
    "сейчас", "были", "куда", "зачем", "всех", "никогда", "можно", "при", "наконец", "два", "об",
    "другой", "хоть", "после", "над", "больше", "тот", "через", "эти", "нас", "про", "всего", "них",
    "какая", "много", "разве", "три", "эту", "моя", "впрочем", "хорошо", "свою", "этой", "перед",
    "иногда", "лучше", "чуть", "том", "нельзя", "такой", "им", "более", "всегда", "конечно", "всю",
    "между",
];

static STOPWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| RUSSIAN_STOPWORDS.iter().copied().collect());

/// Whether a lowercase word is a Russian function word.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

// ── Text normalization ───────────────────────────────────────────────

/// Lemmatize every space-separated word, keep the first occurrence of each
/// lemma and rejoin with single spaces.
pub fn normalize_text(text: &str, lemmatizer: &dyn Lemmatizer) -> String {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = Vec::new();
    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let lemma = lemmatizer.lemma(word);
        if !lemma.is_empty() && seen.insert(lemma.clone()) {
            out.push(lemma);
        }
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_lemmatizer_groups_case_forms() {
        let l = SuffixLemmatizer;
        assert_eq!(l.lemma("война"), l.lemma("войны"));
        assert_eq!(l.lemma("войной"), l.lemma("Война"));
        assert_eq!(l.lemma("крымская"), l.lemma("Крымской"));
        assert_eq!(l.lemma("году"), "год");
    }

    #[test]
    fn test_suffix_lemmatizer_keeps_short_and_foreign_words() {
        let l = SuffixLemmatizer;
        assert_eq!(l.lemma("мир"), "мир");
        assert_eq!(l.lemma("1812"), "1812");
        assert_eq!(l.lemma("XIX"), "xix");
        assert_eq!(l.lemma("ёлка"), l.lemma("елки"));
    }

    #[test]
    fn test_suffix_lemmatizer_strips_reflexive() {
        let l = SuffixLemmatizer;
        assert_eq!(l.lemma("началась"), "нач");
    }

    #[test]
    fn test_dictionary_lemmatizer_lookup_and_fallback() {
        let l = DictionaryLemmatizer::from_tsv(
            "# form\tlemma\nвойны\tвойна\nНачалась\tначаться\nbroken line\n",
        );
        assert_eq!(l.len(), 2);
        assert_eq!(l.lemma("Войны"), "война");
        assert_eq!(l.lemma("началась"), "начаться");
        assert_eq!(l.lemma("году"), "год");
    }

    #[test]
    fn test_dictionary_lemmatizer_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lemmas.tsv");
        std::fs::write(&path, "битвы\tбитва\n").unwrap();
        let l = DictionaryLemmatizer::from_path(&path).unwrap();
        assert_eq!(l.lemma("битвы"), "битва");
        assert!(DictionaryLemmatizer::from_path(&dir.path().join("missing.tsv")).is_err());
    }

    #[test]
    fn test_stopwords() {
        assert!(is_stopword("в"));
        assert!(is_stopword("после"));
        assert!(!is_stopword("война"));
        assert!(!is_stopword("это"));
    }

    #[test]
    fn test_normalize_text_dedups_in_order() {
        let l = SuffixLemmatizer;
        assert_eq!(
            normalize_text("Крымская  война войны", &l),
            format!("{} {}", l.lemma("крымская"), l.lemma("война"))
        );
        assert_eq!(normalize_text("", &l), "");
    }
}
