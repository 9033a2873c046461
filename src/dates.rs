//! Date extraction from essay sentences.
//!
//! A fixed, priority-ordered grammar of date patterns is tried against each
//! sentence. The first pattern that matches anywhere in the sentence is
//! applied to all of its matches and every lower-priority pattern is skipped
//! for that sentence, even when it would have found a different date.

use std::sync::LazyLock;

use date_check_types::{DateSpec, PartialDate};
use regex::{Captures, Regex};
use serde::Serialize;

// ── Date mention ─────────────────────────────────────────────────────

/// A date found in a sentence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateMention {
    pub date_info: Option<DateSpec>,
    /// Canonical rendering of the match, e.g. "c 11 января 1900 года по 12 февраля 1901"
    pub matched_text: String,
    /// The substring exactly as it appeared in the sentence
    pub source_text: String,
}

impl DateMention {
    /// Candidate substrings for locating this mention, rendered form first.
    pub fn search_texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.matched_text.as_str())
            .chain((self.source_text != self.matched_text).then_some(self.source_text.as_str()))
    }
}

// ── Months ───────────────────────────────────────────────────────────

const MONTHS_GENITIVE: &str =
    "января|февраля|марта|апреля|мая|июня|июля|августа|сентября|октября|ноября|декабря";
const MONTHS_NOMINATIVE: &str =
    "январь|февраль|март|апрель|май|июнь|июль|август|сентябрь|октябрь|ноябрь|декабрь";
const MONTHS_PREPOSITIONAL: &str =
    "январе|феврале|марте|апреле|мае|июне|июле|августе|сентябре|октябре|ноябре|декабре";

/// Resolve a month name in any case form by its first three letters.
pub(crate) fn month_number(name: &str) -> Option<u8> {
    let prefix: String = name.chars().take(3).flat_map(char::to_lowercase).collect();
    match prefix.as_str() {
        "янв" => Some(1),
        "фев" => Some(2),
        "мар" => Some(3),
        "апр" => Some(4),
        "май" | "мая" | "мае" => Some(5),
        "июн" => Some(6),
        "июл" => Some(7),
        "авг" => Some(8),
        "сен" => Some(9),
        "окт" => Some(10),
        "ноя" => Some(11),
        "дек" => Some(12),
        _ => None,
    }
}

// ── Grammar ──────────────────────────────────────────────────────────

/// Which structured date a pattern produces, and from which groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    /// day month year … day month year
    FullInterval,
    /// month year … month year
    MonthInterval,
    /// day month year
    FullDate,
    /// month year
    MonthYear,
    /// "1990-е годы"
    Decade,
    /// year … year
    YearRange,
    /// year
    Year,
}

struct DatePattern {
    category: Category,
    regex: Regex,
    /// `{}` placeholders are filled with the capture groups in order
    template: &'static str,
}

fn pattern(category: Category, re: &str, template: &'static str) -> DatePattern {
    DatePattern {
        category,
        regex: Regex::new(re).expect("date pattern"),
        template,
    }
}

static DATE_PATTERNS: LazyLock<Vec<DatePattern>> = LazyLock::new(|| {
    let gen_ = MONTHS_GENITIVE;
    let nom = MONTHS_NOMINATIVE;
    let prep = MONTHS_PREPOSITIONAL;
    vec![
        // с 11 января 1900 года по 12 февраля 1901
        pattern(
            Category::FullInterval,
            &format!("с ([0-9]{{1,2}}) ({gen_}) ([0-9]{{3,4}}) года по ([0-9]{{1,2}}) ({gen_}) ([0-9]{{3,4}})"),
            "c {} {} {} года по {} {} {}",
        ),
        // с 11 января 1900 по 12 февраля 1901
        pattern(
            Category::FullInterval,
            &format!("с ([0-9]{{1,2}}) ({gen_}) ([0-9]{{3,4}}) по ([0-9]{{1,2}}) ({gen_}) ([0-9]{{3,4}})"),
            "c {} {} {} по {} {} {}",
        ),
        // с января 1900 года по февраль 1901
        pattern(
            Category::MonthInterval,
            &format!("с ({gen_}) ([0-9]{{3,4}}) года по ({nom}) ([0-9]{{3,4}})"),
            "c {} {} года по {} {}",
        ),
        // с января 1900 по февраль 1901
        pattern(
            Category::MonthInterval,
            &format!("с ({gen_}) ([0-9]{{3,4}}) по ({nom}) ([0-9]{{3,4}})"),
            "c {} {} по {} {}",
        ),
        // 11 января 1900
        pattern(
            Category::FullDate,
            &format!("([0-9]{{1,2}}) ({gen_}) ([0-9]{{3,4}})"),
            "{} {} {}",
        ),
        // в январе 1900
        pattern(
            Category::MonthYear,
            &format!("в ({prep}) ([0-9]{{3,4}})"),
            "в {} {}",
        ),
        // январь 1900
        pattern(Category::MonthYear, &format!("({nom}) ([0-9]{{3,4}})"), "{} {}"),
        pattern(Category::Decade, "([0-9]{3,4})-е годы", "{}-е годы"),
        pattern(Category::Decade, "([0-9]{3,4})-[xх] годах", "{}-x годах"),
        pattern(Category::YearRange, "([0-9]{3,4})-([0-9]{3,4})", "{}-{}"),
        pattern(Category::YearRange, "([0-9]{3,4}) - ([0-9]{3,4})", "{} - {}"),
        pattern(Category::YearRange, "с ([0-9]{3,4}) по ([0-9]{3,4})", "с {} по {}"),
        pattern(Category::Year, r"([0-9]{3,4}) г\.", "{} г."),
        pattern(Category::Year, "([0-9]{3,4}) г ", "{} г"),
        pattern(Category::Year, "([0-9]{3,4})", "{}"),
    ]
});

fn group<'a>(caps: &'a Captures, i: usize) -> &'a str {
    caps.get(i).map_or("", |m| m.as_str())
}

fn day_month_year(caps: &Captures, day: usize, month: usize, year: usize) -> Option<PartialDate> {
    Some(PartialDate {
        year: group(caps, year).to_string(),
        month: Some(month_number(group(caps, month))?),
        day: Some(group(caps, day).to_string()),
    })
}

fn month_year(caps: &Captures, month: usize, year: usize) -> Option<PartialDate> {
    Some(PartialDate {
        year: group(caps, year).to_string(),
        month: Some(month_number(group(caps, month))?),
        day: None,
    })
}

impl Category {
    /// Build the structured date; `None` when a month name does not resolve.
    fn build(self, caps: &Captures) -> Option<DateSpec> {
        let spec = match self {
            Category::FullInterval => DateSpec::DateInterval {
                start: day_month_year(caps, 1, 2, 3)?,
                end: day_month_year(caps, 4, 5, 6)?,
            },
            Category::MonthInterval => DateSpec::DateInterval {
                start: month_year(caps, 1, 2)?,
                end: month_year(caps, 3, 4)?,
            },
            Category::FullDate => DateSpec::Date(day_month_year(caps, 1, 2, 3)?),
            Category::MonthYear => DateSpec::Date(month_year(caps, 1, 2)?),
            Category::Decade => DateSpec::Decade {
                value: group(caps, 1).to_string(),
            },
            Category::YearRange => DateSpec::DateInterval {
                start: PartialDate::year(group(caps, 1)),
                end: PartialDate::year(group(caps, 2)),
            },
            Category::Year => DateSpec::Date(PartialDate::year(group(caps, 1))),
        };
        Some(spec)
    }
}

impl DatePattern {
    fn render(&self, caps: &Captures) -> String {
        let mut out = String::new();
        let mut pieces = self.template.split("{}");
        if let Some(first) = pieces.next() {
            out.push_str(first);
        }
        for (i, piece) in pieces.enumerate() {
            out.push_str(group(caps, i + 1));
            out.push_str(piece);
        }
        out
    }
}

// ── Extraction ───────────────────────────────────────────────────────

/// Extract all date mentions of the highest-priority matching pattern.
///
/// Matches are consumed by position: the scan resumes after the end of each
/// match, so overlapping text is never matched twice while identical dates
/// elsewhere in the sentence are still reported. Output follows match
/// discovery order.
pub fn find_dates(sentence: &str) -> Vec<DateMention> {
    let Some(pattern) = DATE_PATTERNS.iter().find(|p| p.regex.is_match(sentence)) else {
        return Vec::new();
    };

    let mut mentions = Vec::new();
    for caps in pattern.regex.captures_iter(sentence) {
        let source = group(&caps, 0);
        let Some(date_info) = pattern.category.build(&caps) else {
            log::debug!("skipping unresolved date '{source}'");
            continue;
        };
        mentions.push(DateMention {
            date_info: Some(date_info),
            matched_text: pattern.render(&caps),
            source_text: source.to_string(),
        });
    }
    mentions
}
