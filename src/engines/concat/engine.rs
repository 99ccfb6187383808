use std::path::{Path, PathBuf};
use std::sync::Arc;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{SynthesisEngine, SynthesisResult};

use super::catalog::Catalog;
use super::composer::{ComposedUtterance, Composer, ConcatError};
use super::coverage::SyllableListing;
use super::dsp::{FadeCurve, Normalization};
use super::rules::{load_rules, RuleTable};
use super::select::{SeededSelector, TakeSelector};
use super::syllabifier::Syllabifier;
use super::tokenizer::PauseKind;

/// Parameters for loading a dataset directory.
#[derive(Debug, Clone)]
pub struct ConcatModelParams {
    /// Catalog manifest, relative to the dataset directory.
    pub catalog_file: String,
    /// Optional rule table overriding the built-in clusters.
    pub rules_file: String,
    /// Optional `word syl1 syl2 ...` listing used to pre-seed syllabification.
    pub listing_file: String,
    /// Also pick up `<key>/recording.wav` and `<key>/take_*.wav` files that
    /// the manifest does not list.
    pub scan_directories: bool,
    /// Use the listing file when present.
    pub use_listing: bool,
}

impl Default for ConcatModelParams {
    fn default() -> Self {
        Self {
            catalog_file: "catalog.json".to_string(),
            rules_file: "rules.json".to_string(),
            listing_file: "unique_syllables.txt".to_string(),
            scan_directories: true,
            use_listing: true,
        }
    }
}

/// Parameters for a single composition request.
///
/// Deserializes from JSON with every field optional:
///
/// ```rust
/// use sklad_tts::engines::concat::ConcatInferenceParams;
///
/// let params: ConcatInferenceParams =
///     serde_json::from_str(r#"{ "strict": true, "word_gap_ms": 200 }"#)?;
/// assert!(params.strict);
/// assert_eq!(params.crossfade_ms, 10);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct ConcatInferenceParams {
    /// Fail on the first word without audio instead of skipping it.
    pub strict: bool,
    /// Use a whole-word recording whenever one exists.
    pub prefer_whole_words: bool,
    pub crossfade_ms: u32,
    pub fade_curve: FadeCurve,
    /// Silence between words.
    pub word_gap_ms: u32,
    /// Pause for `, ; : —`.
    pub clause_pause_ms: u32,
    /// Pause for `. ! ?` and line breaks.
    pub sentence_pause_ms: u32,
    /// Silence that replaces a skipped word.
    pub missing_gap_ms: u32,
    pub normalization: Normalization,
    /// Linear level for the chosen normalization (RMS or peak).
    pub target_level: f32,
    /// Peak limit applied after normalization; `0` disables it.
    pub peak_ceiling: f32,
    /// Frames this far below the loudest frame count as silence.
    pub trim_top_db: f32,
    pub trim_frame_ms: u32,
    /// Fixed seed for take selection; `None` varies takes between runs.
    #[builder(setter(strip_option))]
    pub seed: Option<u64>,
}

impl Default for ConcatInferenceParams {
    fn default() -> Self {
        Self {
            strict: false,
            prefer_whole_words: false,
            crossfade_ms: 10,
            fade_curve: FadeCurve::Linear,
            word_gap_ms: 300,
            clause_pause_ms: 450,
            sentence_pause_ms: 600,
            missing_gap_ms: 300,
            normalization: Normalization::Rms,
            target_level: 0.1,
            peak_ceiling: 0.98,
            trim_top_db: 35.0,
            trim_frame_ms: 10,
            seed: None,
        }
    }
}

impl ConcatInferenceParams {
    pub fn pause_ms(&self, kind: PauseKind) -> u32 {
        match kind {
            PauseKind::Clause => self.clause_pause_ms,
            PauseKind::Sentence => self.sentence_pause_ms,
        }
    }

    fn selector(&self) -> SeededSelector {
        match self.seed {
            Some(seed) => SeededSelector::new(seed),
            None => SeededSelector::from_entropy(),
        }
    }
}

/// Syllable-concatenation text-to-speech engine.
///
/// "Loading a model" means loading a dataset directory: the catalog of
/// recorded takes, an optional rule table and an optional syllable listing.
/// The catalog is immutable once loaded and handed out as an `Arc`, so
/// several threads can compose against it; [`reload`](Self::reload) swaps in
/// a fresh one.
///
/// # Quick Start
///
/// ```rust,no_run
/// use sklad_tts::{SynthesisEngine, engines::concat::ConcatEngine};
/// use std::path::PathBuf;
///
/// let mut engine = ConcatEngine::new();
/// engine.load_model(&PathBuf::from("dataset"))?;
/// let result = engine.synthesize("Добрий день", None)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ConcatEngine {
    catalog: Option<Arc<Catalog>>,
    syllabifier: Arc<Syllabifier>,
    dataset_dir: Option<PathBuf>,
    params: ConcatModelParams,
}

impl Default for ConcatEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcatEngine {
    /// Create an engine with the built-in rule table and no catalog.
    pub fn new() -> Self {
        Self {
            catalog: None,
            syllabifier: Arc::new(Syllabifier::default()),
            dataset_dir: None,
            params: ConcatModelParams::default(),
        }
    }

    /// Create an engine around an already built catalog.
    pub fn with_catalog(catalog: Catalog, syllabifier: Syllabifier) -> Self {
        Self {
            catalog: Some(Arc::new(catalog)),
            syllabifier: Arc::new(syllabifier),
            dataset_dir: None,
            params: ConcatModelParams::default(),
        }
    }

    /// Shared handle to the loaded catalog.
    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.catalog.clone()
    }

    pub fn syllabifier(&self) -> &Syllabifier {
        &self.syllabifier
    }

    pub fn dataset_dir(&self) -> Option<&Path> {
        self.dataset_dir.as_deref()
    }

    /// Load the dataset again from the directory and parameters of the last
    /// successful load. On failure the current catalog stays in place.
    pub fn reload(&mut self) -> Result<(), ConcatError> {
        let dir = self
            .dataset_dir
            .clone()
            .ok_or(ConcatError::CatalogNotLoaded)?;
        let params = self.params.clone();
        self.load_dataset(&dir, params)
    }

    /// Compose `text` and return the utterance with its coverage report.
    pub fn compose(
        &self,
        text: &str,
        params: &ConcatInferenceParams,
    ) -> Result<ComposedUtterance, ConcatError> {
        self.compose_with_selector(text, params, &mut params.selector())
    }

    /// Compose with a caller-supplied take selector.
    pub fn compose_with_selector(
        &self,
        text: &str,
        params: &ConcatInferenceParams,
        selector: &mut dyn TakeSelector,
    ) -> Result<ComposedUtterance, ConcatError> {
        let catalog = self.catalog.as_ref().ok_or(ConcatError::CatalogNotLoaded)?;
        Composer::new(catalog, &self.syllabifier).compose(text, params, selector)
    }

    fn load_dataset(&mut self, dir: &Path, params: ConcatModelParams) -> Result<(), ConcatError> {
        let rules_path = dir.join(&params.rules_file);
        let rules = if rules_path.exists() {
            log::info!("Loading syllable rules from {}", rules_path.display());
            load_rules(&rules_path)?
        } else {
            RuleTable::default()
        };

        let mut syllabifier = Syllabifier::new(rules);
        let listing_path = dir.join(&params.listing_file);
        if params.use_listing && listing_path.exists() {
            let listing = SyllableListing::load(&listing_path)?;
            log::info!("Loaded {} listed words", listing.len());
            syllabifier.extend_exceptions(listing.into_entries());
        }

        let catalog = Catalog::load(dir, &params)?;

        self.catalog = Some(Arc::new(catalog));
        self.syllabifier = Arc::new(syllabifier);
        self.dataset_dir = Some(dir.to_path_buf());
        self.params = params;
        Ok(())
    }
}

impl Drop for ConcatEngine {
    fn drop(&mut self) {
        self.unload_model();
    }
}

impl SynthesisEngine for ConcatEngine {
    type SynthesisParams = ConcatInferenceParams;
    type ModelParams = ConcatModelParams;

    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.load_dataset(model_path, params)?;
        Ok(())
    }

    fn unload_model(&mut self) {
        self.catalog = None;
        self.dataset_dir = None;
    }

    fn synthesize(
        &mut self,
        text: &str,
        params: Option<Self::SynthesisParams>,
    ) -> Result<SynthesisResult, Box<dyn std::error::Error>> {
        let p = params.unwrap_or_default();
        let utterance = self.compose(text, &p)?;
        Ok(utterance.into_result())
    }
}
