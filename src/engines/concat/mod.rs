//! Syllable-concatenation text-to-speech engine for Ukrainian.
//!
//! Text is tokenized into words and punctuation pauses, each word is split
//! into syllables by a rule-based syllabifier, and every syllable is looked
//! up in a catalog of recorded takes. The takes are trimmed, normalized and
//! crossfaded into one waveform. A word whose syllables are not all recorded
//! falls back to a whole-word recording; a word with neither is skipped
//! (reported in the [`CompositionReport`]) or, in strict mode, fails the
//! request.
//!
//! # Dataset Directory Layout
//!
//! ```text
//! dataset/
//! ├── catalog.json            # Manifest: key -> takes (file, rate, duration, loudness)
//! ├── rules.json              # Optional cluster rules and exceptions
//! ├── unique_syllables.txt    # Optional "word syl1 syl2 ..." listing
//! ├── сло/
//! │   ├── recording.wav
//! │   └── take_2.wav
//! └── во/
//!     └── recording.wav
//! ```
//!
//! Recordings are mono WAV files that all share one sample rate. Keys are
//! lowercase, with any apostrophe variant stored as `'`.
//!
//! # Syllabification
//!
//! Every character is classified as a vowel, a consonant or a marker (the
//! soft sign and apostrophes). A word has one syllable per vowel; between two
//! vowels only the last consonant (with its markers) starts the next
//! syllable, except that indivisible clusters such as `дж` and `дз` move as
//! one unit. Both the cluster table and a list of per-word exceptions are
//! data, loaded from `rules.json`:
//!
//! ```rust
//! use sklad_tts::engines::concat::syllabifier::syllabify;
//!
//! assert_eq!(syllabify("слово")?, vec!["сло", "во"]);
//! assert_eq!(syllabify("п'ять")?, vec!["п'ять"]);
//! assert_eq!(syllabify("ходжу")?, vec!["хо", "джу"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use sklad_tts::{SynthesisEngine, engines::concat::ConcatEngine};
//! use std::path::PathBuf;
//!
//! let mut engine = ConcatEngine::new();
//! engine.load_model(&PathBuf::from("dataset"))?;
//!
//! let result = engine.synthesize("Добрий день, друже!", None)?;
//! println!("Generated {} samples at {}Hz", result.samples.len(), result.sample_rate);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Coverage Report and Reproducible Takes
//!
//! ```rust,no_run
//! use sklad_tts::engines::concat::{ConcatEngine, ConcatInferenceParamsBuilder};
//! use sklad_tts::SynthesisEngine;
//! use std::path::PathBuf;
//!
//! let mut engine = ConcatEngine::new();
//! engine.load_model(&PathBuf::from("dataset"))?;
//!
//! let params = ConcatInferenceParamsBuilder::default()
//!     .seed(42)
//!     .crossfade_ms(15)
//!     .build()?;
//!
//! let utterance = engine.compose("Сьогодні гарна погода.", &params)?;
//! for skipped in &utterance.report.skipped {
//!     println!("no audio for {} (missing {:?})", skipped.word, skipped.missing);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod composer;
pub mod coverage;
pub mod dsp;
pub mod engine;
pub mod rules;
pub mod select;
pub mod syllabifier;
pub mod tokenizer;

pub use catalog::{AudioUnit, Catalog, CatalogBuilder, CatalogManifest, DatasetWriter};
pub use composer::{ComposedUtterance, Composer, CompositionReport, ConcatError, SkippedWord};
pub use coverage::{load_words, CoverageReport, SyllableListing};
pub use dsp::{FadeCurve, Normalization};
pub use engine::{
    ConcatEngine, ConcatInferenceParams, ConcatInferenceParamsBuilder, ConcatModelParams,
};
pub use rules::{ClusterPolicy, ClusterRule, RuleTable};
pub use select::{FirstTakeSelector, RoundRobinSelector, SeededSelector, TakeSelector};
pub use syllabifier::Syllabifier;
pub use tokenizer::{tokenize, PauseKind, Token};
