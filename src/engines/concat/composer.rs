use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;

use crate::SynthesisResult;

use super::catalog::{normalize_key, AudioUnit, Catalog};
use super::dsp::{
    append_with_crossfade, fade_in, fade_out, ms_to_samples, normalization_gain, silence,
    trim_silence,
};
use super::engine::ConcatInferenceParams;
use super::select::TakeSelector;
use super::syllabifier::Syllabifier;
use super::tokenizer::{tokenize, Token};

/// Sample rate used for silence when the catalog is empty.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

#[derive(thiserror::Error, Debug)]
pub enum ConcatError {
    #[error("Unsupported character {ch:?} in word {word:?}")]
    InvalidInput { word: String, ch: char },
    #[error("Cannot syllabify an empty word")]
    EmptyWord,
    #[error("No recording for word {word:?} (missing syllables: {})", .missing.join(", "))]
    NoAudioAvailable { word: String, missing: Vec<String> },
    #[error("Catalog not loaded. Call load_model() first.")]
    CatalogNotLoaded,
    #[error("Invalid catalog: {0}")]
    Catalog(String),
    #[error("Sample rate mismatch for '{key}': expected {expected} Hz, found {found} Hz")]
    SampleRateMismatch {
        key: String,
        expected: u32,
        found: u32,
    },
    #[error("Invalid catalog key {0:?}")]
    InvalidKey(String),
    #[error("Invalid rule table: {0}")]
    Rules(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A word that could not be rendered and was replaced by silence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedWord {
    pub word: String,
    /// Syllable keys with no recording.
    pub missing: Vec<String>,
}

/// What happened to each word of a composition request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompositionReport {
    /// Words seen in the input.
    pub words: usize,
    /// Words rendered from a whole-word recording instead of syllables.
    pub whole_words: Vec<String>,
    pub skipped: Vec<SkippedWord>,
}

/// The assembled waveform for one input text.
#[derive(Debug, Clone)]
pub struct ComposedUtterance {
    /// Units used, in text order. Shared with the catalog.
    pub units: Vec<Arc<AudioUnit>>,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub report: CompositionReport,
}

impl ComposedUtterance {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// True when no word was skipped.
    pub fn is_complete(&self) -> bool {
        self.report.skipped.is_empty()
    }

    pub fn into_result(self) -> SynthesisResult {
        SynthesisResult {
            samples: self.samples,
            sample_rate: self.sample_rate,
        }
    }
}

/// A chosen take and the audible part of its samples.
struct Trimmed {
    unit: Arc<AudioUnit>,
    range: Range<usize>,
}

enum Resolution {
    Units {
        units: Vec<Trimmed>,
        whole_word: bool,
    },
    Missing(Vec<String>),
}

enum Segment {
    /// Units of one word, crossfaded into each other.
    Word(Vec<Trimmed>),
    /// Silence standing in for a skipped word.
    Gap(usize),
    Pause(usize),
}

/// Turns text into audio using a catalog and a syllabifier.
///
/// Holds only shared references; composing never mutates either.
pub struct Composer<'a> {
    catalog: &'a Catalog,
    syllabifier: &'a Syllabifier,
}

impl<'a> Composer<'a> {
    pub fn new(catalog: &'a Catalog, syllabifier: &'a Syllabifier) -> Self {
        Self {
            catalog,
            syllabifier,
        }
    }

    /// Render `text` into one continuous buffer.
    ///
    /// In strict mode the first word without audio fails the request with
    /// [`ConcatError::NoAudioAvailable`]; otherwise the word is replaced by a
    /// silence gap and listed in the report.
    pub fn compose(
        &self,
        text: &str,
        params: &ConcatInferenceParams,
        selector: &mut dyn TakeSelector,
    ) -> Result<ComposedUtterance, ConcatError> {
        let sample_rate = self.catalog.sample_rate().unwrap_or(DEFAULT_SAMPLE_RATE);
        let mut report = CompositionReport::default();
        let mut timeline = Vec::new();

        for token in tokenize(text) {
            match token {
                Token::Pause(kind) => {
                    push_pause(&mut timeline, ms_to_samples(params.pause_ms(kind), sample_rate));
                }
                Token::Word(word) => {
                    report.words += 1;
                    let segment = match self.resolve_word(&word, params, selector)? {
                        Resolution::Units { units, whole_word } => {
                            if whole_word {
                                report.whole_words.push(word);
                            }
                            Segment::Word(units)
                        }
                        Resolution::Missing(missing) => {
                            if params.strict {
                                return Err(ConcatError::NoAudioAvailable { word, missing });
                            }
                            log::warn!(
                                "Skipping '{word}': no recording for {}",
                                missing.join(", ")
                            );
                            report.skipped.push(SkippedWord { word, missing });
                            let gap = ms_to_samples(params.missing_gap_ms, sample_rate);
                            if gap == 0 {
                                continue;
                            }
                            Segment::Gap(gap)
                        }
                    };

                    if matches!(timeline.last(), Some(Segment::Word(_) | Segment::Gap(_))) {
                        push_pause(&mut timeline, ms_to_samples(params.word_gap_ms, sample_rate));
                    }
                    timeline.push(segment);
                }
            }
        }

        if matches!(timeline.last(), Some(Segment::Pause(_))) {
            timeline.pop();
        }

        let (samples, units) = assemble(&timeline, sample_rate, params);
        Ok(ComposedUtterance {
            units,
            samples,
            sample_rate,
            report,
        })
    }

    /// Syllables first, then the whole word. A word is only rendered from
    /// syllables when every one of them is recorded. Takes that trim to
    /// nothing are dropped; a word left without audio counts as missing.
    fn resolve_word(
        &self,
        word: &str,
        params: &ConcatInferenceParams,
        selector: &mut dyn TakeSelector,
    ) -> Result<Resolution, ConcatError> {
        let syllables = self.syllabifier.syllabify(word)?;
        let word_key = normalize_key(word);

        if params.prefer_whole_words && self.catalog.contains(&word_key) {
            let unit = self.pick(&word_key, selector);
            return Ok(audible(vec![unit], true, params));
        }

        let keys: Vec<String> = syllables.iter().map(|s| normalize_key(s)).collect();
        let missing: Vec<String> = keys
            .iter()
            .filter(|k| !self.catalog.contains(k))
            .cloned()
            .collect();

        if missing.is_empty() {
            log::debug!("'{word}' -> {}", keys.join("-"));
            let units = keys.iter().map(|k| self.pick(k, selector)).collect();
            return Ok(audible(units, false, params));
        }

        if self.catalog.contains(&word_key) {
            log::debug!("'{word}' missing {}, using whole-word take", missing.join(", "));
            let unit = self.pick(&word_key, selector);
            return Ok(audible(vec![unit], true, params));
        }

        Ok(Resolution::Missing(missing))
    }

    /// Caller guarantees the key has at least one take.
    fn pick(&self, key: &str, selector: &mut dyn TakeSelector) -> Arc<AudioUnit> {
        let takes = self.catalog.lookup(key);
        let idx = selector.select(key, takes.len()).min(takes.len() - 1);
        Arc::clone(&takes[idx])
    }
}

/// Trim every take; fails with the keys of the silent takes when none of
/// them has audio left.
fn audible(
    units: Vec<Arc<AudioUnit>>,
    whole_word: bool,
    params: &ConcatInferenceParams,
) -> Resolution {
    let mut kept = Vec::with_capacity(units.len());
    let mut silent = Vec::new();
    for unit in units {
        let range = trim_silence(
            unit.samples(),
            unit.sample_rate(),
            params.trim_top_db,
            params.trim_frame_ms,
        );
        if range.is_empty() {
            silent.push(unit.key().to_string());
        } else {
            kept.push(Trimmed { unit, range });
        }
    }

    if kept.is_empty() {
        return Resolution::Missing(silent);
    }
    if !silent.is_empty() {
        log::debug!("Dropping silent takes for {}", silent.join(", "));
    }
    Resolution::Units {
        units: kept,
        whole_word,
    }
}

/// Pauses never lead the utterance; adjacent pauses merge into the longest.
fn push_pause(timeline: &mut Vec<Segment>, len: usize) {
    match timeline.last_mut() {
        None => {}
        Some(Segment::Pause(existing)) => *existing = (*existing).max(len),
        Some(_) if len > 0 => timeline.push(Segment::Pause(len)),
        Some(_) => {}
    }
}

/// Trim, level and join every unit of the timeline.
fn assemble(
    timeline: &[Segment],
    sample_rate: u32,
    params: &ConcatInferenceParams,
) -> (Vec<f32>, Vec<Arc<AudioUnit>>) {
    let crossfade = ms_to_samples(params.crossfade_ms, sample_rate);
    let curve = params.fade_curve;

    let mut out = Vec::new();
    let mut used = Vec::new();
    // Length of the unit at the end of `out`, if the buffer ends in audio.
    let mut tail: Option<usize> = None;

    for segment in timeline {
        match segment {
            Segment::Word(units) => {
                for Trimmed { unit, range } in units {
                    used.push(Arc::clone(unit));

                    let voiced = &unit.samples()[range.clone()];
                    let gain = normalization_gain(
                        voiced,
                        params.normalization,
                        params.target_level,
                        params.peak_ceiling,
                    );
                    let mut scaled: Vec<f32> = voiced.iter().map(|s| s * gain).collect();

                    match tail {
                        Some(prev) => {
                            let overlap = crossfade.min(prev / 2).min(scaled.len() / 2);
                            append_with_crossfade(&mut out, &scaled, overlap, curve);
                        }
                        None => {
                            let ramp = crossfade.min(scaled.len() / 2);
                            fade_in(&mut scaled, ramp, curve);
                            out.extend_from_slice(&scaled);
                        }
                    }
                    tail = Some(scaled.len());
                }
            }
            Segment::Gap(len) | Segment::Pause(len) => {
                close_tail(&mut out, tail.take(), crossfade, params);
                out.extend(silence(*len));
            }
        }
    }

    close_tail(&mut out, tail, crossfade, params);
    (out, used)
}

fn close_tail(
    out: &mut [f32],
    tail: Option<usize>,
    crossfade: usize,
    params: &ConcatInferenceParams,
) {
    if let Some(prev) = tail {
        fade_out(out, crossfade.min(prev / 2), params.fade_curve);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::concat::dsp::{rms, Normalization};
    use crate::engines::concat::select::{FirstTakeSelector, RoundRobinSelector, SeededSelector};

    const SR: u32 = 16000;

    /// 200 Hz tone; 80-sample period, so 10 ms crossfades stay in phase.
    /// The phase offset keeps every sample non-zero.
    fn tone(len: usize, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amp * (2.0 * std::f32::consts::PI * 200.0 * i as f32 / SR as f32 + 0.25).sin()
            })
            .collect()
    }

    fn padded_tone(len: usize, amp: f32) -> Vec<f32> {
        let mut samples = silence(800);
        samples.extend(tone(len, amp));
        samples.extend(silence(480));
        samples
    }

    fn catalog(keys: &[(&str, f32)]) -> Catalog {
        let mut builder = Catalog::builder();
        for &(key, amp) in keys {
            builder.insert(AudioUnit::new(key, padded_tone(3200, amp), SR));
        }
        builder.build().unwrap()
    }

    fn compose(
        catalog: &Catalog,
        text: &str,
        params: &ConcatInferenceParams,
    ) -> Result<ComposedUtterance, ConcatError> {
        let syllabifier = Syllabifier::default();
        Composer::new(catalog, &syllabifier).compose(text, params, &mut FirstTakeSelector)
    }

    fn zero_runs(samples: &[f32], min_len: usize) -> Vec<usize> {
        let mut runs = Vec::new();
        let mut run = 0;
        for &s in samples {
            if s == 0.0 {
                run += 1;
            } else {
                if run >= min_len {
                    runs.push(run);
                }
                run = 0;
            }
        }
        if run >= min_len {
            runs.push(run);
        }
        runs
    }

    #[test]
    fn composes_two_words_with_one_pause() {
        let catalog = catalog(&[("ко", 0.3), ("жен", 0.05), ("день", 0.6)]);
        let params = ConcatInferenceParams::default();
        let utterance = compose(&catalog, "кожен день", &params).unwrap();

        assert!(utterance.is_complete());
        assert_eq!(utterance.units.len(), 3);
        let keys: Vec<&str> = utterance.units.iter().map(|u| u.key()).collect();
        assert_eq!(keys, vec!["ко", "жен", "день"]);

        // Leading/trailing silence trimmed, so the only long run of zeros is
        // the inter-word pause.
        let pause = ms_to_samples(params.word_gap_ms, SR);
        assert_eq!(zero_runs(&utterance.samples, 16), vec![pause]);

        let crossfade = ms_to_samples(params.crossfade_ms, SR);
        assert_eq!(utterance.samples.len(), 3 * 3200 - crossfade + pause);
    }

    #[test]
    fn unit_boundaries_have_no_energy_jumps() {
        let catalog = catalog(&[("ко", 0.3), ("жен", 0.05), ("день", 0.6)]);
        let params = ConcatInferenceParams::default();
        let utterance = compose(&catalog, "кожен день", &params).unwrap();

        // First word: 2 units minus one crossfade.
        let word = &utterance.samples[..2 * 3200 - ms_to_samples(params.crossfade_ms, SR)];
        let ramp = ms_to_samples(params.crossfade_ms, SR);
        let body = &word[ramp..word.len() - ramp];
        for window in body.chunks_exact(80) {
            let level = rms(window);
            assert!(
                (level - params.target_level).abs() < 0.15 * params.target_level,
                "window level {level}"
            );
        }
        let max_step = word
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0_f32, f32::max);
        assert!(max_step < 0.05, "step {max_step}");
    }

    #[test]
    fn falls_back_to_whole_word() {
        let catalog = catalog(&[("сло", 0.3), ("слово", 0.3)]);
        let utterance = compose(&catalog, "слово", &ConcatInferenceParams::default()).unwrap();
        assert!(utterance.is_complete());
        assert_eq!(utterance.report.whole_words, vec!["слово"]);
        assert_eq!(utterance.units.len(), 1);
        assert_eq!(utterance.units[0].key(), "слово");
    }

    #[test]
    fn prefers_whole_word_when_asked() {
        let catalog = catalog(&[("сло", 0.3), ("во", 0.3), ("слово", 0.3)]);
        let params = ConcatInferenceParams {
            prefer_whole_words: true,
            ..Default::default()
        };
        let utterance = compose(&catalog, "слово", &params).unwrap();
        assert_eq!(utterance.units[0].key(), "слово");

        let utterance = compose(&catalog, "слово", &ConcatInferenceParams::default()).unwrap();
        assert_eq!(utterance.units.len(), 2);
    }

    #[test]
    fn whole_word_preference_is_reported_for_single_syllables() {
        let catalog = catalog(&[("день", 0.3)]);
        let params = ConcatInferenceParams {
            prefer_whole_words: true,
            ..Default::default()
        };
        let utterance = compose(&catalog, "день", &params).unwrap();
        assert_eq!(utterance.report.whole_words, vec!["день"]);
    }

    #[test]
    fn silent_take_is_skipped_like_a_missing_word() {
        let mut builder = Catalog::builder();
        builder.insert(AudioUnit::new("так", padded_tone(3200, 0.3), SR));
        builder.insert(AudioUnit::new("ні", padded_tone(3200, 0.3), SR));
        builder.insert(AudioUnit::new("ко", silence(4480), SR));
        let catalog = builder.build().unwrap();

        let params = ConcatInferenceParams::default();
        let silent = compose(&catalog, "так ко ні", &params).unwrap();
        let unrecorded = compose(&catalog, "так ба ні", &params).unwrap();
        assert_eq!(silent.samples.len(), unrecorded.samples.len());
        assert_eq!(silent.units.len(), 2);
        assert_eq!(
            silent.report.skipped,
            vec![SkippedWord {
                word: "ко".into(),
                missing: vec!["ко".into()],
            }]
        );

        let no_gap = ConcatInferenceParams {
            missing_gap_ms: 0,
            ..Default::default()
        };
        let plain = compose(&catalog, "так ні", &no_gap).unwrap();
        let silent = compose(&catalog, "так ко ні", &no_gap).unwrap();
        assert_eq!(silent.samples.len(), plain.samples.len());
        assert_eq!(
            zero_runs(&silent.samples, 16),
            vec![ms_to_samples(no_gap.word_gap_ms, SR)]
        );

        let strict = ConcatInferenceParams {
            strict: true,
            ..Default::default()
        };
        assert!(matches!(
            compose(&catalog, "так ко", &strict),
            Err(ConcatError::NoAudioAvailable { .. })
        ));
    }

    #[test]
    fn missing_word_becomes_reported_gap() {
        let catalog = catalog(&[("ко", 0.3), ("жен", 0.3), ("сло", 0.3)]);
        let params = ConcatInferenceParams::default();
        let full = compose(&catalog, "кожен", &params).unwrap();
        let utterance = compose(&catalog, "кожен слово", &params).unwrap();

        assert!(!utterance.is_complete());
        assert_eq!(
            utterance.report.skipped,
            vec![SkippedWord {
                word: "слово".into(),
                missing: vec!["во".into()],
            }]
        );
        assert_eq!(utterance.units.len(), 2);

        let pause = ms_to_samples(params.word_gap_ms, SR);
        let gap = ms_to_samples(params.missing_gap_ms, SR);
        assert_eq!(utterance.samples.len(), full.samples.len() + pause + gap);
    }

    #[test]
    fn strict_mode_fails_on_missing_audio() {
        let catalog = catalog(&[("ко", 0.3), ("жен", 0.3)]);
        let params = ConcatInferenceParams {
            strict: true,
            ..Default::default()
        };
        match compose(&catalog, "кожен день", &params) {
            Err(ConcatError::NoAudioAvailable { word, missing }) => {
                assert_eq!(word, "день");
                assert_eq!(missing, vec!["день"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn invalid_characters_are_surfaced() {
        let catalog = catalog(&[("ко", 0.3)]);
        let result = compose(&catalog, "ко 42", &ConcatInferenceParams::default());
        assert!(matches!(result, Err(ConcatError::InvalidInput { ch: '4', .. })));
    }

    #[test]
    fn punctuation_sets_pause_length() {
        let catalog = catalog(&[("так", 0.3), ("ні", 0.3)]);
        let params = ConcatInferenceParams::default();

        let utterance = compose(&catalog, "так. ні!", &params).unwrap();
        let runs = zero_runs(&utterance.samples, 16);
        assert_eq!(runs, vec![ms_to_samples(params.sentence_pause_ms, SR)]);

        let utterance = compose(&catalog, "так, ні", &params).unwrap();
        let runs = zero_runs(&utterance.samples, 16);
        assert_eq!(runs, vec![ms_to_samples(params.clause_pause_ms, SR)]);

        // Leading punctuation adds nothing.
        let utterance = compose(&catalog, "... так", &params).unwrap();
        assert!(zero_runs(&utterance.samples, 16).is_empty());
    }

    #[test]
    fn normalization_levels_units() {
        let catalog = catalog(&[("так", 0.02), ("ні", 0.5)]);
        let params = ConcatInferenceParams {
            crossfade_ms: 0,
            ..Default::default()
        };
        let utterance = compose(&catalog, "так ні", &params).unwrap();
        let first = rms(&utterance.samples[..3200]);
        let second = rms(&utterance.samples[utterance.samples.len() - 3200..]);
        assert!((first - params.target_level).abs() < 1e-3);
        assert!((second - params.target_level).abs() < 1e-3);

        let raw = ConcatInferenceParams {
            normalization: Normalization::Off,
            crossfade_ms: 0,
            ..Default::default()
        };
        let utterance = compose(&catalog, "так ні", &raw).unwrap();
        assert!(rms(&utterance.samples[..3200]) < 0.05);
    }

    #[test]
    fn take_selection_is_reproducible_for_a_seed() {
        let mut builder = Catalog::builder();
        for amp in [0.1, 0.2, 0.3, 0.4] {
            builder.insert(AudioUnit::new("ма", padded_tone(3200, amp), SR));
        }
        let catalog = builder.build().unwrap();
        let syllabifier = Syllabifier::default();
        let composer = Composer::new(&catalog, &syllabifier);
        let params = ConcatInferenceParams::default();
        let text = "ма ма ма ма ма ма ма ма";

        let a = composer.compose(text, &params, &mut SeededSelector::new(3)).unwrap();
        let b = composer.compose(text, &params, &mut SeededSelector::new(3)).unwrap();
        let peaks = |u: &ComposedUtterance| u.units.iter().map(|x| x.peak()).collect::<Vec<_>>();
        assert_eq!(peaks(&a), peaks(&b));
        assert_eq!(a.samples, b.samples);

        let rr = composer
            .compose("ма ма ма ма ма", &params, &mut RoundRobinSelector::new())
            .unwrap();
        assert!(Arc::ptr_eq(&rr.units[0], &rr.units[4]));
        assert!(!Arc::ptr_eq(&rr.units[0], &rr.units[1]));
    }

    #[test]
    fn empty_text_yields_empty_buffer() {
        let catalog = Catalog::default();
        let utterance = compose(&catalog, " , ", &ConcatInferenceParams::default()).unwrap();
        assert!(utterance.samples.is_empty());
        assert_eq!(utterance.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(utterance.report.words, 0);
    }

    #[test]
    fn units_are_shared_not_copied() {
        let catalog = catalog(&[("день", 0.3)]);
        let utterance = compose(&catalog, "день", &ConcatInferenceParams::default()).unwrap();
        assert!(Arc::ptr_eq(&utterance.units[0], &catalog.lookup("день")[0]));
    }
}
