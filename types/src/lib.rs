use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

// ── Structured dates ─────────────────────────────────────────────────────

/// A calendar point where only the year is mandatory.
///
/// Years and days stay textual, as they appear in the knowledge base and in
/// essays; absent fields act as wildcards when two dates are compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDate {
    #[serde(alias = "value", deserialize_with = "text_or_number")]
    pub year: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u8>,
    #[serde(
        default,
        deserialize_with = "opt_text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub day: Option<String>,
}

impl PartialDate {
    pub fn year(year: impl Into<String>) -> Self {
        PartialDate {
            year: year.into(),
            month: None,
            day: None,
        }
    }

    pub fn year_number(&self) -> Option<i32> {
        self.year.trim().parse().ok()
    }
}

/// Structured date attached to a knowledge-base event or extracted from an essay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSpec {
    /// `{"date": {"year": "1812", "month": 6}}`
    Date(PartialDate),
    /// `{"date_interval": {"start": {...}, "end": {...}}}`
    DateInterval { start: PartialDate, end: PartialDate },
    /// `{"decade": {"value": "1990"}}`
    Decade {
        #[serde(deserialize_with = "text_or_number")]
        value: String,
    },
}

// ── Knowledge base ───────────────────────────────────────────────────────

/// One curated historical event as stored in the knowledge-base file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub event: String,
    pub dates: Vec<DateSpec>,
}

// ── Output ───────────────────────────────────────────────────────────────

/// Error label used for factual date mistakes.
pub const FACTUAL_DATE_ERROR: &str = "И.факт";

/// A located factual error, spans in the essay's character coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub start_span: usize,
    pub end_span: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EssayResponse {
    pub mistakes: Vec<ErrorRecord>,
}

// ── Input ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
}

/// One cell of a tabular parse row; parsers emit ids and heads either as
/// strings or as integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParseCell {
    Text(String),
    Number(i64),
}

impl ParseCell {
    pub fn as_text(&self) -> String {
        match self {
            ParseCell::Text(s) => s.clone(),
            ParseCell::Number(n) => n.to_string(),
        }
    }
}

/// The dependency parse of one sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SentenceParse {
    /// A CoNLL-U block
    Conllu(String),
    /// Ten-field CoNLL-U rows
    Rows(Vec<Vec<ParseCell>>),
}

/// One essay with the annotations produced upstream.
/// Sentences, parses and offsets are grouped by paragraph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EssayRequest {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default)]
    pub meta: HashMap<String, String>,
    pub sentences: Vec<Vec<Sentence>>,
    pub parses: Vec<Vec<SentenceParse>>,
    pub offsets: Vec<Vec<(usize, usize)>>,
}

impl EssayRequest {
    /// The essay topic: the header for the `neznaika` dataset, the `тема`
    /// meta field otherwise.
    pub fn topic(&self) -> &str {
        if self.dataset_name.as_deref() == Some("neznaika") {
            self.header.as_deref().unwrap_or("")
        } else {
            self.meta.get("тема").map(String::as_str).unwrap_or("")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub input_data: Vec<EssayRequest>,
}

// ── Lenient scalars ──────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(i64),
}

impl From<TextOrNumber> for String {
    fn from(v: TextOrNumber) -> String {
        match v {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn text_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    TextOrNumber::deserialize(d).map(String::from)
}

fn opt_text_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<TextOrNumber>::deserialize(d)?.map(String::from))
}
