use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Serialize;

use super::catalog::{normalize_key, Catalog};
use super::composer::ConcatError;
use super::rules::validate_partition;
use super::syllabifier::{classify, Syllabifier};

const EDGE_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ':', ';', '(', ')', '[', ']', '{', '}', '"', '\'', '«', '»',
];

/// Extract the distinct words of a text, lowercased and sorted.
///
/// Hyphens split words, punctuation is stripped from word edges and
/// anything still containing a non-letter (digits, symbols) is dropped.
pub fn load_words(text: &str) -> Vec<String> {
    let words: BTreeSet<String> = text
        .replace('-', " ")
        .split_whitespace()
        .map(|w| w.trim_matches(EDGE_PUNCTUATION).to_lowercase())
        .filter(|w| !w.is_empty() && w.chars().all(|c| classify(c).is_some()))
        .collect();
    words.into_iter().collect()
}

/// Word to syllable segmentation, stored as `word syl1 syl2 ...` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyllableListing {
    entries: BTreeMap<String, Vec<String>>,
}

impl SyllableListing {
    /// Segment every word with `syllabifier`. Words it rejects are skipped.
    pub fn from_words<I, S>(words: I, syllabifier: &Syllabifier) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = BTreeMap::new();
        for word in words {
            let word = word.as_ref();
            match syllabifier.syllabify(word) {
                Ok(parts) => {
                    entries.insert(normalize_key(word), parts);
                }
                Err(e) => log::warn!("Skipping {word:?}: {e}"),
            }
        }
        Self { entries }
    }

    /// Parse the line format. Blank lines, single-token lines and lines
    /// whose syllables do not spell the word syllable by syllable are
    /// skipped with a warning.
    pub fn parse(content: &str) -> Self {
        let mut entries = BTreeMap::new();
        for (line_no, line) in content.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let parts: Vec<String> = fields.map(str::to_lowercase).collect();
            let word = normalize_key(word);
            if parts.is_empty() || validate_partition(&word, &parts).is_err() {
                log::warn!("Ignoring listing line {}: {line:?}", line_no + 1);
                continue;
            }
            entries.insert(word, parts);
        }
        Self { entries }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (word, parts) in &self.entries {
            out.push_str(word);
            for part in parts {
                out.push(' ');
                out.push_str(part);
            }
            out.push('\n');
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self, ConcatError> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConcatError> {
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn get(&self, word: &str) -> Option<&[String]> {
        self.entries.get(&normalize_key(word)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(w, p)| (w.as_str(), p.as_slice()))
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, Vec<String>)> {
        self.entries.into_iter()
    }

    /// Occurrences of each syllable key across all listed words.
    pub fn syllable_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for part in self.entries.values().flatten() {
            *counts.entry(normalize_key(part)).or_insert(0) += 1;
        }
        counts
    }

    /// Distinct syllable keys, sorted.
    pub fn unique_syllables(&self) -> Vec<String> {
        self.syllable_counts().into_keys().collect()
    }

    /// Compare the listing against a catalog. Without a catalog every
    /// syllable counts as missing.
    pub fn coverage(&self, catalog: Option<&Catalog>) -> CoverageReport {
        let syllable_counts = self.syllable_counts();
        let (recorded, missing): (Vec<String>, Vec<String>) = syllable_counts
            .keys()
            .cloned()
            .partition(|key| catalog.is_some_and(|c| c.contains(key)));

        let distinct = syllable_counts.len();
        let coverage_ratio = if distinct == 0 {
            1.0
        } else {
            recorded.len() as f64 / distinct as f64
        };

        CoverageReport {
            total_words: self.entries.len(),
            distinct_syllables: distinct,
            syllable_counts,
            recorded,
            missing,
            coverage_ratio,
        }
    }
}

/// Syllable statistics of a word list and how much of it a catalog covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub total_words: usize,
    pub distinct_syllables: usize,
    pub syllable_counts: BTreeMap<String, usize>,
    pub recorded: Vec<String>,
    pub missing: Vec<String>,
    pub coverage_ratio: f64,
}

impl CoverageReport {
    pub fn to_json(&self) -> Result<String, ConcatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
