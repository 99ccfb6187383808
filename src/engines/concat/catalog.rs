use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::composer::ConcatError;
use super::dsp::{peak, rms};
use super::engine::ConcatModelParams;
use super::syllabifier::is_apostrophe;

/// File name of the primary take inside a key directory.
pub const RECORDING_FILE: &str = "recording.wav";

/// Current `catalog.json` format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Normalize a syllable or word into a catalog key.
///
/// Lowercases and maps every apostrophe spelling to `'`, so `М’Я` and `м'я`
/// share one recording.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if is_apostrophe(c) { '\'' } else { c })
        .collect()
}

/// One recorded take of a syllable or word.
///
/// Samples are shared, so cloning a unit or handing it to a composed
/// utterance never copies audio.
#[derive(Debug, Clone)]
pub struct AudioUnit {
    key: String,
    samples: Arc<[f32]>,
    sample_rate: u32,
    peak: f32,
    rms: f32,
    source: Option<PathBuf>,
}

impl AudioUnit {
    pub fn new(key: &str, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            key: normalize_key(key),
            peak: peak(&samples),
            rms: rms(&samples),
            samples: samples.into(),
            sample_rate,
            source: None,
        }
    }

    /// Decode a WAV file. Multi-channel files keep their first channel.
    pub fn from_wav(key: &str, path: &Path) -> Result<Self, ConcatError> {
        let (samples, sample_rate) = read_wav_mono(path)?;
        let mut unit = Self::new(key, samples, sample_rate);
        unit.source = Some(path.to_path_buf());
        Ok(unit)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn rms(&self) -> f32 {
        self.rms
    }

    /// File the unit was decoded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32), ConcatError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok((
        interleaved.into_iter().step_by(channels).collect(),
        spec.sample_rate,
    ))
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), ConcatError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Immutable mapping from normalized keys to recorded takes.
///
/// Built once (from a dataset directory or a [`CatalogBuilder`]) and only
/// read afterwards; share it across threads behind an `Arc`.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: HashMap<String, Vec<Arc<AudioUnit>>>,
    sample_rate: Option<u32>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Load every take listed in the manifest, plus (when enabled) recordings
    /// found in `<key>/` directories that the manifest does not mention.
    ///
    /// Any unreadable metadata or recording fails the whole load.
    pub fn load(dataset_dir: &Path, params: &ConcatModelParams) -> Result<Self, ConcatError> {
        if !dataset_dir.is_dir() {
            return Err(ConcatError::Catalog(format!(
                "dataset directory {} not found",
                dataset_dir.display()
            )));
        }

        let manifest_path = dataset_dir.join(&params.catalog_file);
        let manifest = if manifest_path.exists() {
            log::info!("Loading catalog manifest from {}", manifest_path.display());
            CatalogManifest::load(&manifest_path)?
        } else {
            CatalogManifest::default()
        };

        let mut builder = Catalog::builder();
        let mut listed = HashSet::new();

        for (key, takes) in &manifest.entries {
            for take in takes {
                let path = dataset_dir.join(&take.file);
                if !path.is_file() {
                    return Err(ConcatError::Catalog(format!(
                        "recording {} for '{key}' is missing",
                        path.display()
                    )));
                }
                let unit = AudioUnit::from_wav(key, &path)?;
                if unit.sample_rate() != take.sample_rate {
                    return Err(ConcatError::Catalog(format!(
                        "{} is {} Hz but the manifest says {} Hz",
                        path.display(),
                        unit.sample_rate(),
                        take.sample_rate
                    )));
                }
                listed.insert(take.file.clone());
                builder.insert(unit);
            }
        }

        if params.scan_directories {
            for (key, relative) in scan_recordings(dataset_dir)? {
                if listed.contains(&relative) {
                    continue;
                }
                log::debug!("Found unlisted recording {relative}");
                builder.insert(AudioUnit::from_wav(&key, &dataset_dir.join(&relative))?);
            }
        }

        let catalog = builder.build()?;
        log::info!(
            "Loaded {} catalog keys ({} takes){}",
            catalog.len(),
            catalog.take_count(),
            catalog
                .sample_rate()
                .map(|sr| format!(" at {sr} Hz"))
                .unwrap_or_default()
        );
        Ok(catalog)
    }

    /// Takes recorded for `key`; empty on a miss. The key is normalized first.
    pub fn lookup(&self, key: &str) -> &[Arc<AudioUnit>] {
        self.entries
            .get(&normalize_key(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        !self.lookup(key).is_empty()
    }

    /// All keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn take_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Shared sample rate of all takes; `None` for an empty catalog.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }
}

/// `(key, "key/file.wav")` for every `recording.wav` / `take_*.wav`, sorted.
fn scan_recordings(dataset_dir: &Path) -> Result<Vec<(String, String)>, ConcatError> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dataset_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(key) = entry.file_name().to_str().map(str::to_string) else {
            log::warn!("Skipping non UTF-8 directory {:?}", entry.file_name());
            continue;
        };

        for file in fs::read_dir(entry.path())? {
            let file = file?;
            let name = file.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let is_take = name == RECORDING_FILE
                || (name.starts_with("take_") && name.ends_with(".wav"));
            if is_take && file.file_type()?.is_file() {
                found.push((key.clone(), format!("{key}/{name}")));
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Collects units and checks them into an immutable [`Catalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: HashMap<String, Vec<Arc<AudioUnit>>>,
}

impl CatalogBuilder {
    /// Add a take under its (normalized) key.
    pub fn insert(&mut self, unit: AudioUnit) -> &mut Self {
        self.entries
            .entry(unit.key().to_string())
            .or_default()
            .push(Arc::new(unit));
        self
    }

    pub fn with_unit(mut self, unit: AudioUnit) -> Self {
        self.insert(unit);
        self
    }

    /// Finish the catalog. All takes must share one sample rate.
    pub fn build(self) -> Result<Catalog, ConcatError> {
        let mut sample_rate: Option<u32> = None;

        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort_unstable();
        for key in keys {
            for unit in &self.entries[key] {
                match sample_rate {
                    None => sample_rate = Some(unit.sample_rate()),
                    Some(expected) if expected != unit.sample_rate() => {
                        return Err(ConcatError::SampleRateMismatch {
                            key: key.clone(),
                            expected,
                            found: unit.sample_rate(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Catalog {
            entries: self.entries,
            sample_rate,
        })
    }
}

/// Metadata for one take as persisted in `catalog.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestTake {
    /// Path relative to the dataset directory, `/`-separated.
    pub file: String,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub peak: f32,
    pub rms: f32,
}

impl ManifestTake {
    pub fn describe(file: String, unit: &AudioUnit) -> Self {
        Self {
            file,
            sample_rate: unit.sample_rate(),
            duration_secs: unit.duration_secs(),
            peak: unit.peak(),
            rms: unit.rms(),
        }
    }
}

/// Persisted catalog metadata: key to takes.
///
/// Updates are incremental: registering a take whose file is already listed
/// is a no-op, so re-running a recording session never duplicates entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogManifest {
    pub version: u32,
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ManifestTake>>,
}

impl Default for CatalogManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl CatalogManifest {
    pub fn load(path: &Path) -> Result<Self, ConcatError> {
        let content = fs::read_to_string(path)?;
        let manifest: CatalogManifest = serde_json::from_str(&content).map_err(|e| {
            ConcatError::Catalog(format!("failed to parse {}: {e}", path.display()))
        })?;
        if manifest.version > MANIFEST_VERSION {
            return Err(ConcatError::Catalog(format!(
                "unsupported manifest version {} (expected <= {MANIFEST_VERSION})",
                manifest.version
            )));
        }
        Ok(manifest)
    }

    /// Load the manifest, or start an empty one when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConcatError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write through a temporary file so a crash never leaves a torn manifest.
    pub fn save(&self, path: &Path) -> Result<(), ConcatError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Add a take. Returns `false` when its file was already registered.
    pub fn register(&mut self, key: &str, take: ManifestTake) -> bool {
        let takes = self.entries.entry(normalize_key(key)).or_default();
        if takes.iter().any(|t| t.file == take.file) {
            return false;
        }
        takes.push(take);
        true
    }

    pub fn is_recorded(&self, key: &str) -> bool {
        !self.takes(key).is_empty()
    }

    pub fn takes(&self, key: &str) -> &[ManifestTake] {
        self.entries
            .get(&normalize_key(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Write side of a dataset, used by recording tools.
///
/// Stores takes as `<key>/recording.wav` (first take) and
/// `<key>/take_<n>.wav`, keeping `catalog.json` in step.
pub struct DatasetWriter {
    dataset_dir: PathBuf,
    manifest_path: PathBuf,
    manifest: CatalogManifest,
    skip_recorded: bool,
}

impl DatasetWriter {
    /// Open (and create if needed) a dataset directory.
    ///
    /// With `skip_recorded`, keys that already have a take are left alone.
    pub fn open(
        dataset_dir: &Path,
        params: &ConcatModelParams,
        skip_recorded: bool,
    ) -> Result<Self, ConcatError> {
        fs::create_dir_all(dataset_dir)?;
        let manifest_path = dataset_dir.join(&params.catalog_file);
        let manifest = CatalogManifest::load_or_default(&manifest_path)?;
        Ok(Self {
            dataset_dir: dataset_dir.to_path_buf(),
            manifest_path,
            manifest,
            skip_recorded,
        })
    }

    pub fn manifest(&self) -> &CatalogManifest {
        &self.manifest
    }

    pub fn is_recorded(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.manifest.is_recorded(&key) || self.dataset_dir.join(&key).join(RECORDING_FILE).is_file()
    }

    /// Store a take for `key`. Returns the written path, or `None` when the
    /// key was skipped as already recorded.
    pub fn add_take(
        &mut self,
        key: &str,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Option<PathBuf>, ConcatError> {
        let key = normalize_key(key);
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(ConcatError::InvalidKey(key));
        }

        if self.skip_recorded && self.is_recorded(&key) {
            log::info!("Skipping already recorded '{key}'");
            return Ok(None);
        }

        let key_dir = self.dataset_dir.join(&key);
        fs::create_dir_all(&key_dir)?;

        let file_name = if key_dir.join(RECORDING_FILE).exists() {
            let mut n = self.manifest.takes(&key).len().max(1) + 1;
            while key_dir.join(format!("take_{n}.wav")).exists() {
                n += 1;
            }
            format!("take_{n}.wav")
        } else {
            RECORDING_FILE.to_string()
        };

        let path = key_dir.join(&file_name);
        write_wav(&path, samples, sample_rate)?;

        let unit = AudioUnit::new(&key, samples.to_vec(), sample_rate);
        self.manifest
            .register(&key, ManifestTake::describe(format!("{key}/{file_name}"), &unit));
        self.manifest.save(&self.manifest_path)?;

        log::info!("Saved take for '{key}' to {}", path.display());
        Ok(Some(path))
    }
}
