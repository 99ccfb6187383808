use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::catalog::normalize_key;
use super::composer::ConcatError;
use super::syllabifier::{classify, fold, CharClass};

/// How a consonant sequence behaves when it sits between two vowels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterPolicy {
    /// The sequence is one consonant unit and is never split (digraphs like `дж`).
    Indivisible,
    /// When an intervocalic cluster ends with the sequence, all of it opens
    /// the following syllable.
    Onset,
}

/// A single entry of the phonotactic rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRule {
    /// Consonant letters (lowercase, no markers).
    pub cluster: String,
    pub policy: ClusterPolicy,
}

impl ClusterRule {
    pub fn new(cluster: &str, policy: ClusterPolicy) -> Self {
        Self {
            cluster: cluster.to_string(),
            policy,
        }
    }

    fn len(&self) -> usize {
        self.cluster.chars().count()
    }

    fn matches(&self, consonants: &[char]) -> bool {
        self.cluster.chars().map(fold).eq(consonants.iter().copied().map(fold))
    }
}

/// Declarative syllabification rules: cluster policies plus a per-word
/// exception list.
///
/// The table is data, independent from the traversal in
/// [`Syllabifier`](super::syllabifier::Syllabifier), so it can be loaded
/// from `rules.json` and tested on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default = "builtin_clusters")]
    pub clusters: Vec<ClusterRule>,
    /// Word to explicit segmentation, consulted before any rule. Keys are
    /// matched lowercase with apostrophes unified.
    #[serde(default)]
    pub exceptions: HashMap<String, Vec<String>>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            clusters: builtin_clusters(),
            exceptions: HashMap::new(),
        }
    }
}

/// Ukrainian digraphs that spell a single affricate.
fn builtin_clusters() -> Vec<ClusterRule> {
    vec![
        ClusterRule::new("дж", ClusterPolicy::Indivisible),
        ClusterRule::new("дз", ClusterPolicy::Indivisible),
    ]
}

impl RuleTable {
    /// Check that every cluster is made of consonants and that every
    /// exception is a strict partition of its word.
    pub fn validate(&self) -> Result<(), ConcatError> {
        for rule in &self.clusters {
            if rule.len() < 2 && rule.policy == ClusterPolicy::Indivisible {
                return Err(ConcatError::Rules(format!(
                    "indivisible cluster {:?} must have at least two letters",
                    rule.cluster
                )));
            }
            if rule.cluster.is_empty() {
                return Err(ConcatError::Rules("empty cluster".to_string()));
            }
            if let Some(ch) = rule
                .cluster
                .chars()
                .find(|&c| classify(c) != Some(CharClass::Consonant))
            {
                return Err(ConcatError::Rules(format!(
                    "cluster {:?} contains non-consonant {ch:?}",
                    rule.cluster
                )));
            }
        }

        for (word, parts) in &self.exceptions {
            validate_partition(word, parts)?;
        }

        Ok(())
    }

    /// Longest indivisible cluster starting at the head of `consonants`,
    /// in letters. Zero when nothing matches.
    pub fn indivisible_at(&self, consonants: &[char]) -> usize {
        self.clusters
            .iter()
            .filter(|r| r.policy == ClusterPolicy::Indivisible)
            .filter(|r| r.len() <= consonants.len() && r.matches(&consonants[..r.len()]))
            .map(ClusterRule::len)
            .max()
            .unwrap_or(0)
    }

    /// Longest onset cluster that `consonants` ends with, in letters.
    pub fn onset_suffix(&self, consonants: &[char]) -> usize {
        self.clusters
            .iter()
            .filter(|r| r.policy == ClusterPolicy::Onset)
            .filter(|r| {
                r.len() <= consonants.len() && r.matches(&consonants[consonants.len() - r.len()..])
            })
            .map(ClusterRule::len)
            .max()
            .unwrap_or(0)
    }

    /// Explicit segmentation for `word`, if one is listed.
    pub fn exception(&self, word: &str) -> Option<&[String]> {
        self.exceptions.get(&normalize_key(word)).map(Vec::as_slice)
    }

    /// Add exceptions without replacing ones already present.
    pub fn extend_exceptions<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        for (word, parts) in entries {
            self.exceptions.entry(normalize_key(&word)).or_insert(parts);
        }
    }

    fn normalize_exception_keys(&mut self) {
        self.exceptions = std::mem::take(&mut self.exceptions)
            .into_iter()
            .map(|(word, parts)| (normalize_key(&word), parts))
            .collect();
    }
}

/// Parts must spell `word` and look like syllables: one vowel each (a
/// vowelless word stays whole) and no part after the first opening with a
/// marker.
pub(crate) fn validate_partition(word: &str, parts: &[String]) -> Result<(), ConcatError> {
    if parts.is_empty() || parts.iter().any(String::is_empty) {
        return Err(ConcatError::Rules(format!(
            "exception for {word:?} has empty syllables"
        )));
    }
    if normalize_key(&parts.concat()) != normalize_key(word) {
        return Err(ConcatError::Rules(format!(
            "exception {parts:?} does not spell {word:?}"
        )));
    }

    let vowels = |text: &str| {
        text.chars()
            .filter(|&c| classify(c) == Some(CharClass::Vowel))
            .count()
    };
    if let Some(ch) = word.chars().find(|&c| classify(c).is_none()) {
        return Err(ConcatError::Rules(format!(
            "exception for {word:?} contains unsupported {ch:?}"
        )));
    }
    if vowels(word) == 0 {
        if parts.len() != 1 {
            return Err(ConcatError::Rules(format!(
                "{word:?} has no vowel and cannot be split"
            )));
        }
        return Ok(());
    }

    for (idx, part) in parts.iter().enumerate() {
        if vowels(part.as_str()) != 1 {
            return Err(ConcatError::Rules(format!(
                "syllable {part:?} of {word:?} must hold exactly one vowel"
            )));
        }
        let opens_with_marker = part
            .chars()
            .next()
            .is_some_and(|c| classify(c) == Some(CharClass::Marker));
        if idx > 0 && opens_with_marker {
            return Err(ConcatError::Rules(format!(
                "syllable {part:?} of {word:?} starts with a marker"
            )));
        }
    }
    Ok(())
}

/// Load a rule table from a JSON file.
///
/// Missing fields fall back to the built-in table, so a file holding only
/// `"exceptions"` keeps the default clusters.
pub fn load_rules(path: &Path) -> Result<RuleTable, ConcatError> {
    let content = std::fs::read_to_string(path)?;
    let mut table: RuleTable = serde_json::from_str(&content)
        .map_err(|e| ConcatError::Rules(format!("Failed to parse {}: {e}", path.display())))?;
    table.validate()?;
    table.normalize_exception_keys();
    Ok(table)
}
