//! Whisper ASR transcription using whisper-rs (whisper.cpp bindings).
//!
//! Loads a GGML model once at startup, then transcribes f32 audio
//! samples (16kHz mono) to text on demand.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::config::WhisperConfig;

/// WhisperContext is Send+Sync, so we wrap it in Arc for sharing.
#[derive(Clone)]
pub struct WhisperTranscriber {
    ctx: Arc<WhisperContext>,
    language: String,
}

impl WhisperTranscriber {
    /// Load the Whisper GGML model.
    pub fn load(config: &WhisperConfig) -> Result<Self, String> {
        let model_path = find_model(&config.model)?;
        let model_str = model_path
            .to_str()
            .ok_or_else(|| format!("Model path is not UTF-8: {}", model_path.display()))?;

        info!("Loading Whisper model from {}", model_path.display());
        let t0 = Instant::now();

        let params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(model_str, params)
            .map_err(|e| format!("Failed to load Whisper model: {e}"))?;

        info!("Whisper model loaded in {}ms", t0.elapsed().as_millis());

        Ok(Self {
            ctx: Arc::new(ctx),
            language: config.language.clone(),
        })
    }

    /// Transcribe audio samples (f32, 16kHz, mono) to text.
    pub fn transcribe(&self, samples: &[f32]) -> Result<String, String> {
        let t0 = Instant::now();

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| format!("Failed to create whisper state: {e}"))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(self.language.as_str()));
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_single_segment(true);
        params.set_token_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| format!("Whisper inference failed: {e}"))?;

        let text = (0..state.full_n_segments())
            .filter_map(|i| state.get_segment(i))
            .filter_map(|segment| segment.to_str_lossy().ok().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        info!(
            "Transcribed {:.1}s audio in {}ms: \"{text}\"",
            samples.len() as f64 / 16000.0,
            t0.elapsed().as_millis()
        );

        Ok(text)
    }
}

/// Whisper marks non-speech with bracketed tags like `[BLANK_AUDIO]`.
pub fn is_non_speech(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty()
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('(') && trimmed.ends_with(')'))
}

/// Find the GGML model file.
fn find_model(model_name: &str) -> Result<PathBuf, String> {
    let direct = PathBuf::from(model_name);
    if direct.exists() && direct.extension().is_some() {
        return Ok(direct);
    }

    let filenames = [
        format!("ggml-{}.bin", model_name.replace('/', "-")),
        "ggml-base.en.bin".to_string(),
        "ggml-small.en.bin".to_string(),
        "ggml-base.bin".to_string(),
    ];

    let search_dirs: Vec<PathBuf> = [
        std::env::current_dir().ok(),
        dirs::home_dir().map(|h| h.join(".cache/whisper")),
        dirs::data_dir().map(|d| d.join("med-assistant")),
    ]
    .into_iter()
    .flatten()
    .collect();

    for dir in &search_dirs {
        for filename in &filenames {
            let path = dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    Err(format!(
        "Whisper GGML model not found. Download with:\n  \
         wget https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.en.bin\n\
         Searched in: {:?}",
        search_dirs
    ))
}
