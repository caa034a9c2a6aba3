//! TF-IDF feature extraction for free-text log lines
//!
//! The vocabulary is rebuilt from every batch; nothing is carried between
//! calls.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Tokens are runs of two or more word characters
const TOKEN_PATTERN: &str = r"\b\w\w+\b";

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn token_regex() -> &'static Regex {
    TOKEN_RE.get_or_init(|| Regex::new(TOKEN_PATTERN).expect("token pattern is valid"))
}

/// Split a line into lowercase terms
pub fn tokenize(line: &str) -> Vec<String> {
    let lowered = line.to_lowercase();
    token_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Dense TF-IDF matrix with its column vocabulary
#[derive(Debug, Clone)]
pub struct TfidfMatrix {
    /// Column terms, sorted
    pub vocabulary: Vec<String>,
    /// One L2-normalised row per input document
    pub rows: Vec<Vec<f64>>,
}

impl TfidfMatrix {
    pub fn n_terms(&self) -> usize {
        self.vocabulary.len()
    }

    /// Weight of `term` in document `row`, if the term is in the vocabulary
    pub fn weight(&self, row: usize, term: &str) -> Option<f64> {
        let column = self.vocabulary.binary_search_by(|t| t.as_str().cmp(term)).ok()?;
        self.rows.get(row).map(|r| r[column])
    }
}

/// Term-frequency / inverse-document-frequency vectorizer
///
/// Uses smoothed idf, `ln((1 + n) / (1 + df)) + 1`, so a term present in
/// every document still keeps a weight of one.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer;

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self
    }

    pub fn fit_transform<S: AsRef<str>>(&self, documents: &[S]) -> TfidfMatrix {
        let tokenized: Vec<Vec<String>> =
            documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let vocabulary: Vec<String> = tokenized
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns: BTreeMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        let n_docs = documents.len() as f64;
        let mut doc_freq = vec![0usize; vocabulary.len()];
        for tokens in &tokenized {
            let unique: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                doc_freq[columns[term]] += 1;
            }
        }
        let idf: Vec<f64> = doc_freq
            .iter()
            .map(|&df| ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let rows = tokenized
            .iter()
            .map(|tokens| {
                let mut row = vec![0.0; vocabulary.len()];
                for term in tokens {
                    row[columns[term.as_str()]] += 1.0;
                }
                for (weight, idf) in row.iter_mut().zip(&idf) {
                    *weight *= idf;
                }
                let norm = row.iter().map(|w| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    row.iter_mut().for_each(|w| *w /= norm);
                }
                row
            })
            .collect();

        TfidfMatrix { vocabulary, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_single_chars_and_lowercases() {
        assert_eq!(
            tokenize("User login from IP 192.168.1.1"),
            vec!["user", "login", "from", "ip", "192", "168"]
        );
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_rare_terms_outweigh_common_terms() {
        let docs = [
            "User login from IP 192.168.1.1",
            "Failed login attempt from IP 192.168.1.2",
        ];
        let matrix = TfidfVectorizer::new().fit_transform(&docs);

        assert_eq!(matrix.rows.len(), 2);
        assert_eq!(
            matrix.vocabulary,
            vec!["168", "192", "attempt", "failed", "from", "ip", "login", "user"]
        );

        let common = matrix.weight(1, "login").unwrap();
        let rare = matrix.weight(1, "failed").unwrap();
        assert!(rare > common);
        assert_eq!(matrix.weight(0, "failed"), Some(0.0));
    }

    #[test]
    fn test_rows_are_unit_length() {
        let docs = ["disk full on /var", "disk ok", "kernel panic panic"];
        let matrix = TfidfVectorizer::new().fit_transform(&docs);
        for row in &matrix.rows {
            let norm: f64 = row.iter().map(|w| w * w).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_blank_documents_yield_empty_vocabulary() {
        let docs = ["", "   ", "\t"];
        let matrix = TfidfVectorizer::new().fit_transform(&docs);
        assert_eq!(matrix.n_terms(), 0);
        assert_eq!(matrix.rows.len(), 3);
        assert!(matrix.rows.iter().all(|r| r.is_empty()));
    }
}
