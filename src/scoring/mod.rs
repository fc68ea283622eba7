//! Word error rate scoring against reference transcripts.
//!
//! The scorer works on whitespace tokens, case-insensitively. Transcript
//! files hold one `"<id> <text>"` line per utterance; `wer_from_files`
//! aligns the two files by id and aggregates over the matched pairs.

pub mod catalog;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Levenshtein word edit distance between `reference` and `hypothesis`.
///
/// Tokens are compared case-insensitively; substitution, insertion and
/// deletion each cost one. Returns `(errors, reference_word_count)`, so
/// `score(x, x) == (0, x word count)`.
pub fn score(reference: &str, hypothesis: &str) -> (usize, usize) {
    let reference: Vec<String> = reference
        .split_whitespace()
        .map(str::to_uppercase)
        .collect();
    let hypothesis: Vec<String> = hypothesis
        .split_whitespace()
        .map(str::to_uppercase)
        .collect();

    let errors = strsim::generic_levenshtein(&reference, &hypothesis);
    (errors, reference.len())
}

/// WER for a single id matched across the two transcript files.
#[derive(Debug, Clone, Serialize)]
pub struct FileWer {
    pub id: String,
    pub errors: usize,
    pub words: usize,
}

impl FileWer {
    pub fn percent(&self) -> f64 {
        if self.words == 0 {
            0.0
        } else {
            self.errors as f64 / self.words as f64 * 100.0
        }
    }
}

/// Aggregate scoring result over a reference/hypothesis file pair.
#[derive(Debug, Clone, Serialize)]
pub struct WerReport {
    pub total_errors: usize,
    pub total_words: usize,
    pub per_file: Vec<FileWer>,
    /// Ids present in the reference but absent from the hypothesis. Reported
    /// only; they do not enter the aggregate.
    pub missing: Vec<String>,
    /// Ids present in the hypothesis but absent from the reference. Also
    /// reported only.
    pub unexpected: Vec<String>,
}

impl WerReport {
    pub fn aggregate_percent(&self) -> f64 {
        if self.total_words == 0 {
            0.0
        } else {
            self.total_errors as f64 / self.total_words as f64 * 100.0
        }
    }
}

/// Parse a transcript file into `(id, uppercased text)` pairs.
///
/// Each line is `"<id> <text>"`; the first whitespace token is the id and
/// the remainder is the text. Lines without both parts are skipped with a
/// warning.
pub fn load_transcriptions<P: AsRef<Path>>(path: P) -> Result<Vec<(String, String)>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read transcript file {:?}", path))?;

    let mut entries = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once(char::is_whitespace) {
            Some((id, text)) => {
                entries.push((id.to_string(), text.trim().to_uppercase()));
            }
            None => {
                warn!(
                    "Skipping malformed line {} in {:?}: '{}'",
                    number + 1,
                    path,
                    line
                );
            }
        }
    }
    Ok(entries)
}

/// Score `hypothesis_path` against `reference_path`, aligning lines by id.
pub fn wer_from_files<P: AsRef<Path>>(reference_path: P, hypothesis_path: P) -> Result<WerReport> {
    let references = load_transcriptions(reference_path)?;
    let hypotheses = load_transcriptions(hypothesis_path)?;

    let mut report = WerReport {
        total_errors: 0,
        total_words: 0,
        per_file: Vec::new(),
        missing: Vec::new(),
        unexpected: Vec::new(),
    };

    for (id, reference) in &references {
        let Some((_, hypothesis)) = hypotheses.iter().find(|(hid, _)| hid == id) else {
            report.missing.push(id.clone());
            continue;
        };

        let (errors, words) = score(reference, hypothesis);
        report.total_errors += errors;
        report.total_words += words;
        report.per_file.push(FileWer {
            id: id.clone(),
            errors,
            words,
        });
    }

    for (id, _) in &hypotheses {
        if !references.iter().any(|(rid, _)| rid == id) {
            report.unexpected.push(id.clone());
        }
    }

    info!(
        "Scored {} file(s), {} missing, {} unexpected, overall WER {:.2}%",
        report.per_file.len(),
        report.missing.len(),
        report.unexpected.len(),
        report.aggregate_percent()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn identical_texts_score_zero() {
        assert_eq!(score("THE CAT SAT", "THE CAT SAT"), (0, 3));
    }

    #[test]
    fn substitution_costs_one() {
        assert_eq!(score("THE CAT SAT", "THE DOG SAT"), (1, 3));
    }

    #[test]
    fn deletion_costs_one() {
        assert_eq!(score("A B C", "A B"), (1, 3));
    }

    #[test]
    fn insertion_costs_one() {
        assert_eq!(score("A B", "A B C"), (1, 2));
    }

    #[test]
    fn distance_counts_words_not_characters() {
        // One substituted token is one error regardless of its spelling.
        assert_eq!(score("INTERNATIONALIZATION NOW", "LOCALIZATION NOW"), (1, 2));
    }

    #[test]
    fn comparison_ignores_case() {
        assert_eq!(score("hello world", "HELLO WORLD"), (0, 2));
    }

    #[test]
    fn empty_hypothesis_deletes_everything() {
        assert_eq!(score("ONE TWO THREE", ""), (3, 3));
        assert_eq!(score("", ""), (0, 0));
    }

    #[test]
    fn transcript_lines_split_on_first_whitespace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "clip_1 the cat sat").unwrap();
        writeln!(file, "clip_2 hello world").unwrap();
        writeln!(file, "lonely-id-without-text").unwrap();
        writeln!(file).unwrap();

        let entries = load_transcriptions(file.path()).unwrap();
        assert_eq!(
            entries,
            vec![
                ("clip_1".to_string(), "THE CAT SAT".to_string()),
                ("clip_2".to_string(), "HELLO WORLD".to_string()),
            ]
        );
    }

    #[test]
    fn files_align_by_id_and_report_missing() {
        let mut reference = tempfile::NamedTempFile::new().unwrap();
        writeln!(reference, "a the cat sat").unwrap();
        writeln!(reference, "b quick brown fox").unwrap();
        writeln!(reference, "c never transcribed").unwrap();

        let mut hypothesis = tempfile::NamedTempFile::new().unwrap();
        writeln!(hypothesis, "b quick brown fox").unwrap();
        writeln!(hypothesis, "a the dog sat").unwrap();
        writeln!(hypothesis, "d stray utterance").unwrap();

        let report = wer_from_files(reference.path(), hypothesis.path()).unwrap();
        assert_eq!(report.total_errors, 1);
        assert_eq!(report.total_words, 6);
        assert_eq!(report.missing, vec!["c".to_string()]);
        assert_eq!(report.unexpected, vec!["d".to_string()]);
        assert_eq!(report.per_file.len(), 2);
        assert!((report.aggregate_percent() - 100.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(wer_from_files("/nonexistent/ref.txt", "/nonexistent/hyp.txt").is_err());
    }
}
