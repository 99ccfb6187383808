use std::path::PathBuf;
use std::time::Instant;

use sklad_tts::{
    engines::concat::{
        load_words, ConcatEngine, ConcatInferenceParamsBuilder, ConcatModelParams, SyllableListing,
    },
    SynthesisEngine,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let dataset = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("dataset"));

    let mut engine = ConcatEngine::new();
    let load_start = Instant::now();
    engine.load_model_with_params(&dataset, ConcatModelParams::default())?;
    println!("Dataset loaded in {:.2?}", load_start.elapsed());

    let text = "Добрий день! Сьогодні гарна погода, і ми йдемо гуляти.";

    let listing = SyllableListing::from_words(load_words(text), engine.syllabifier());
    let coverage = listing.coverage(engine.catalog().as_deref());
    println!(
        "Coverage: {}/{} syllables recorded ({:.0}%)",
        coverage.recorded.len(),
        coverage.distinct_syllables,
        coverage.coverage_ratio * 100.0
    );
    if !coverage.missing.is_empty() {
        println!("Missing: {}", coverage.missing.join(" "));
    }

    let params = ConcatInferenceParamsBuilder::default().seed(7).build()?;

    let synth_start = Instant::now();
    let utterance = engine.compose(text, &params)?;
    let synth_dur = synth_start.elapsed();

    println!(
        "Composed {:.2}s audio from {} units in {:.2?}",
        utterance.duration_secs(),
        utterance.units.len(),
        synth_dur
    );
    for skipped in &utterance.report.skipped {
        println!("Skipped '{}' (missing {:?})", skipped.word, skipped.missing);
    }

    utterance
        .into_result()
        .write_wav(&PathBuf::from("output.wav"))?;
    println!("Saved to output.wav");

    engine.unload_model();
    Ok(())
}
