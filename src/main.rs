mod checker;
mod config;
mod conllu;
mod dates;
mod error;
mod index;
mod lemma;
mod phrase;
mod scanner;
mod tfidf;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use date_check_types::{BatchRequest, DateSpec, EssayResponse};
use serde::Serialize;

use checker::DateChecker;
use config::{CheckerConfig, load_config};
use conllu::ParseTree;
use error::{CheckError, CheckResult};
use index::EventFilter;

#[derive(Parser)]
#[command(
    name = "date-check",
    about = "Factual date checker for Russian history essays"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Knowledge-base JSON file, overrides the configured one
    #[arg(long, global = true)]
    kb: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check essay batches → JSON mistakes on stdout
    Check {
        /// Batch-request JSON file, or a directory of them
        path: PathBuf,
    },
    /// Extract date mentions from one sentence
    Dates {
        /// Sentence text, e.g. "В 1812 году началась война"
        text: Vec<String>,
    },
    /// Rank knowledge-base events against a query
    Search {
        /// Free text, e.g. "крымская война"
        query: Vec<String>,
        /// First year of the filter range
        #[arg(long, requires = "to")]
        from: Option<i32>,
        /// Last year of the filter range
        #[arg(long, requires = "from")]
        to: Option<i32>,
    },
    /// Show the event query and best candidate for each date in a parsed sentence
    Link {
        /// One sentence in CoNLL-U
        conllu: PathBuf,
        /// Essay topic used for year filtering
        #[arg(long, default_value = "")]
        topic: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path).unwrap_or_else(|e| {
            eprintln!("Cannot load config: {e}");
            std::process::exit(2);
        }),
        None => CheckerConfig::default(),
    };
    if let Some(kb) = cli.kb {
        config.knowledge_base = kb;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    let result = match cli.command {
        Command::Check { path } => run_check(config, &path),
        Command::Dates { text } => run_dates(&text.join(" ")),
        Command::Search { query, from, to } => run_search(config, &query.join(" "), from.zip(to)),
        Command::Link { conllu, topic } => run_link(config, &conllu, &topic),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  OUTPUT HELPERS
// ═══════════════════════════════════════════════════════════════════════

fn print_json<T: Serialize>(data: &T) -> CheckResult<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

fn read_batch(path: &Path) -> CheckResult<BatchRequest> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

// ═══════════════════════════════════════════════════════════════════════
//  CHECK MODE: batch files → mistakes
// ═══════════════════════════════════════════════════════════════════════

fn run_check(config: CheckerConfig, path: &Path) -> CheckResult<()> {
    let files = scanner::scan_requests(path);
    if files.is_empty() {
        eprintln!("No request files found under {}", path.display());
        return Ok(());
    }

    let checker = DateChecker::from_config(config)?;
    eprintln!(
        "Loaded {} events, checking {} file(s)",
        checker.index().len(),
        files.len()
    );

    let mut results: BTreeMap<String, Vec<EssayResponse>> = BTreeMap::new();
    let mut failed = 0usize;
    for file in &files {
        match read_batch(file).and_then(|batch| checker.handle_batch(&batch)) {
            Ok(responses) => {
                let mistakes: usize = responses.iter().map(|r| r.mistakes.len()).sum();
                eprintln!(
                    "  {}: {} essay(s), {} mistake(s)",
                    file.display(),
                    responses.len(),
                    mistakes
                );
                results.insert(file.display().to_string(), responses);
            }
            Err(e) => {
                eprintln!("  {}: {e}", file.display());
                failed += 1;
            }
        }
    }

    // A single file prints its responses directly
    if path.is_file() {
        if let Some(responses) = results.into_values().next() {
            print_json(&responses)?;
        }
    } else {
        print_json(&results)?;
    }

    if failed > 0 {
        return Err(CheckError::BatchFailures {
            failed,
            total: files.len(),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  DATES MODE: one sentence → mentions
// ═══════════════════════════════════════════════════════════════════════

fn run_dates(text: &str) -> CheckResult<()> {
    let mentions = dates::find_dates(text);
    eprintln!("Found {} date mention(s)", mentions.len());
    print_json(&mentions)
}

// ═══════════════════════════════════════════════════════════════════════
//  SEARCH MODE: free text → ranked events
// ═══════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct RankedEvent<'a> {
    id: usize,
    event: &'a str,
    score: f32,
    dates: &'a [DateSpec],
}

fn run_search(config: CheckerConfig, query: &str, years: Option<(i32, i32)>) -> CheckResult<()> {
    let checker = DateChecker::from_config(config)?;
    let index = checker.index();
    let filter = match years {
        Some((from, to)) => index.filter(from.min(to), from.max(to)),
        None => EventFilter::all(),
    };

    let hits = index.search(query, &filter);
    eprintln!(
        "{} candidate(s) for '{}' ({} of {} events admitted)",
        hits.len(),
        query,
        filter.size().unwrap_or(index.len()),
        index.len()
    );

    let ranked: Vec<RankedEvent> = hits
        .iter()
        .take(checker.config().examined_candidates)
        .map(|h| RankedEvent {
            id: h.index,
            event: &h.event.description,
            score: h.score,
            dates: &h.event.dates,
        })
        .collect();
    print_json(&ranked)
}

// ═══════════════════════════════════════════════════════════════════════
//  LINK MODE: parsed sentence → event queries
// ═══════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct LinkedMention<'a> {
    matched_text: &'a str,
    date_info: Option<&'a DateSpec>,
    query: Option<String>,
    /// Ordinals of the date tokens, then the anchor token
    tokens: Option<(usize, usize, usize)>,
    /// Clause head as "form (lemma, UPOS)"
    head: Option<String>,
    subject_found: bool,
    definition: bool,
    best: Option<RankedEvent<'a>>,
    consistent: bool,
}

fn run_link(config: CheckerConfig, path: &Path, topic: &str) -> CheckResult<()> {
    let tree = ParseTree::from_conllu(&std::fs::read_to_string(path)?)?;
    if tree.is_empty() {
        eprintln!("No tokens in {}", path.display());
        return Ok(());
    }
    let checker = DateChecker::from_config(config)?;
    let index = checker.index();
    let filter = checker.topic_filter(topic);

    let sentence = tree.text();
    let mentions = dates::find_dates(&sentence);
    eprintln!("{sentence}");
    eprintln!("Found {} date mention(s)", mentions.len());

    let mut linked = Vec::new();
    for mention in &mentions {
        let query = phrase::reconstruct(
            &tree,
            mention,
            index.lemmatizer(),
            checker.config().fuzzy_threshold,
        );
        let best = query
            .as_ref()
            .and_then(|q| index.search_normalized(&q.text, &filter).into_iter().next());
        linked.push(LinkedMention {
            matched_text: &mention.matched_text,
            date_info: mention.date_info.as_ref(),
            tokens: query
                .as_ref()
                .map(|q| (*q.span.start(), *q.span.end(), q.anchor)),
            head: query.as_ref().map(|q| {
                let t = tree.node(q.terminal);
                format!("{} ({}, {})", t.form, t.lemma, t.upos)
            }),
            subject_found: query.as_ref().is_some_and(|q| q.subject_found),
            definition: query.as_ref().is_some_and(|q| q.definition),
            query: query.map(|q| q.text),
            best: best.map(|h| RankedEvent {
                id: h.index,
                event: &h.event.description,
                score: h.score,
                dates: &h.event.dates,
            }),
            consistent: checker.check_date(&tree, mention, &filter),
        });
    }
    print_json(&linked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_kb(dir: &Path) -> CheckerConfig {
        let kb = dir.join("kb.json");
        std::fs::write(&kb, r#"[{"event": "Крымская война", "dates": [{"date": {"year": "1853"}}]}]"#).unwrap();
        CheckerConfig {
            knowledge_base: kb,
            ..CheckerConfig::default()
        }
    }

    #[test]
    fn test_run_check_reports_failed_files_as_error() {
        let kb_dir = tempfile::tempdir().unwrap();
        let requests = tempfile::tempdir().unwrap();
        std::fs::write(requests.path().join("a.json"), r#"{"input_data": []}"#).unwrap();
        std::fs::write(requests.path().join("b.json"), "{not json").unwrap();

        let err = run_check(config_with_kb(kb_dir.path()), requests.path()).unwrap_err();
        assert!(matches!(
            err,
            CheckError::BatchFailures {
                failed: 1,
                total: 2
            }
        ));
    }

    #[test]
    fn test_run_check_succeeds_when_every_file_is_read() {
        let kb_dir = tempfile::tempdir().unwrap();
        let requests = tempfile::tempdir().unwrap();
        std::fs::write(requests.path().join("a.json"), r#"{"input_data": []}"#).unwrap();

        assert!(run_check(config_with_kb(kb_dir.path()), requests.path()).is_ok());
    }
}
