use super::composer::ConcatError;
use super::rules::{validate_partition, RuleTable};

/// Phonological class of a single letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Vowel,
    Consonant,
    /// Apostrophe or soft sign; modifies the consonant before it.
    Marker,
}

/// Lowercase a single letter. Every supported letter folds to one char.
pub(crate) fn fold(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

/// Apostrophe spellings found in Ukrainian text.
pub(crate) fn is_apostrophe(ch: char) -> bool {
    matches!(ch, '\'' | '\u{2019}' | '\u{02BC}' | '\u{2018}' | '`')
}

/// Classify a character, or `None` when it is outside the supported alphabet.
pub fn classify(ch: char) -> Option<CharClass> {
    if is_apostrophe(ch) {
        return Some(CharClass::Marker);
    }
    match fold(ch) {
        'а' | 'е' | 'є' | 'и' | 'і' | 'ї' | 'о' | 'у' | 'ю' | 'я' => Some(CharClass::Vowel),
        'б' | 'в' | 'г' | 'ґ' | 'д' | 'ж' | 'з' | 'й' | 'к' | 'л' | 'м' | 'н' | 'п' | 'р'
        | 'с' | 'т' | 'ф' | 'х' | 'ц' | 'ч' | 'ш' | 'щ' => Some(CharClass::Consonant),
        'ь' => Some(CharClass::Marker),
        // Latin letters show up in abbreviations and loan tokens.
        'a' | 'e' | 'i' | 'o' | 'u' | 'y' => Some(CharClass::Vowel),
        'a'..='z' => Some(CharClass::Consonant),
        _ => None,
    }
}

/// Rule-driven Ukrainian syllabifier.
///
/// Segmentation is a strict partition of the input: the returned syllables
/// concatenate back to the original word, character for character, and there
/// is exactly one syllable per vowel.
#[derive(Debug, Clone, Default)]
pub struct Syllabifier {
    rules: RuleTable,
}

impl Syllabifier {
    pub fn new(rules: RuleTable) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Seed explicit segmentations (for example from a syllable listing).
    /// Entries that are not a valid partition of their word are dropped.
    pub fn extend_exceptions<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let valid = entries.into_iter().filter(|(word, parts)| {
            let ok = validate_partition(word, parts).is_ok();
            if !ok {
                log::warn!("Ignoring invalid segmentation for {word:?}: {parts:?}");
            }
            ok
        });
        self.rules.extend_exceptions(valid);
    }

    /// Split a word into syllables.
    pub fn syllabify(&self, word: &str) -> Result<Vec<String>, ConcatError> {
        if word.is_empty() {
            return Err(ConcatError::EmptyWord);
        }

        let chars: Vec<char> = word.chars().collect();
        let classes = chars
            .iter()
            .map(|&ch| {
                classify(ch).ok_or_else(|| ConcatError::InvalidInput {
                    word: word.to_string(),
                    ch,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(parts) = self.rules.exception(word) {
            if parts.iter().map(|p| p.chars().count()).sum::<usize>() == chars.len() {
                return Ok(split_like(&chars, parts));
            }
        }

        let vowels: Vec<usize> = classes
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == CharClass::Vowel)
            .map(|(i, _)| i)
            .collect();

        if vowels.len() <= 1 {
            return Ok(vec![word.to_string()]);
        }

        let boundaries: Vec<usize> = vowels
            .windows(2)
            .map(|pair| self.boundary(&chars, &classes, pair[0] + 1, pair[1]))
            .collect();

        let mut syllables = Vec::with_capacity(vowels.len());
        let mut start = 0;
        let total = chars.len();
        for &end in boundaries.iter().chain(std::iter::once(&total)) {
            syllables.push(chars[start..end].iter().collect());
            start = end;
        }
        Ok(syllables)
    }

    /// Index where the syllable after the intervocalic span `start..end`
    /// begins. Always in `start..=end`.
    fn boundary(&self, chars: &[char], classes: &[CharClass], start: usize, end: usize) -> usize {
        let units = self.consonant_units(chars, classes, start, end);
        if units.is_empty() {
            return end;
        }

        let consonants: Vec<char> = (start..end)
            .filter(|&i| classes[i] == CharClass::Consonant)
            .map(|i| chars[i])
            .collect();

        let mut onset_units = 1;
        let onset_len = self.rules.onset_suffix(&consonants);
        if onset_len > 0 {
            // Only honour the rule when it ends on a unit boundary.
            let mut covered = 0;
            for (count, unit) in units.iter().rev().enumerate() {
                covered += unit.consonants;
                if covered == onset_len {
                    onset_units = onset_units.max(count + 1);
                    break;
                }
                if covered > onset_len {
                    break;
                }
            }
        }

        units[units.len() - onset_units].start
    }

    /// Group the span into consonant units: one consonant (or an indivisible
    /// cluster) plus the markers that follow it. Markers before the first
    /// consonant stay with the previous syllable and are not part of a unit.
    fn consonant_units(
        &self,
        chars: &[char],
        classes: &[CharClass],
        start: usize,
        end: usize,
    ) -> Vec<Unit> {
        let mut units = Vec::new();
        let mut i = start;
        while i < end {
            if classes[i] != CharClass::Consonant {
                i += 1;
                continue;
            }

            let run_end = (i..end)
                .find(|&j| classes[j] != CharClass::Consonant)
                .unwrap_or(end);
            let matched = self.rules.indivisible_at(&chars[i..run_end]);
            let consonants = matched.max(1);

            let mut unit_end = i + consonants;
            while unit_end < end && classes[unit_end] == CharClass::Marker {
                unit_end += 1;
            }

            units.push(Unit {
                start: i,
                consonants,
            });
            i = unit_end;
        }
        units
    }
}

#[derive(Debug, Clone, Copy)]
struct Unit {
    start: usize,
    consonants: usize,
}

/// Cut `chars` at the lengths of `parts`, keeping the original spelling.
fn split_like(chars: &[char], parts: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(parts.len());
    let mut start = 0;
    for part in parts {
        let end = start + part.chars().count();
        out.push(chars[start..end].iter().collect());
        start = end;
    }
    out
}

/// Syllabify with the built-in rule table.
pub fn syllabify(word: &str) -> Result<Vec<String>, ConcatError> {
    Syllabifier::default().syllabify(word)
}
