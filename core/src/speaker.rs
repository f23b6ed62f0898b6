use crate::{
    play_wave, MouthError, OutputDevice, Playback, RateNegotiator, Result,
    Synthesizer, WaveReader,
};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Runs one utterance at a time through synthesis and playback.
pub struct Speaker<S: Synthesizer, D: OutputDevice> {
    synthesizer: S,
    negotiator: RateNegotiator,
    device: D,
    keep_output: Option<PathBuf>,
}

impl<S: Synthesizer, D: OutputDevice> Speaker<S, D> {
    pub fn new(synthesizer: S, negotiator: RateNegotiator, device: D) -> Self {
        Speaker {
            synthesizer,
            negotiator,
            device,
            keep_output: None,
        }
    }

    /// Copy each synthesized container to `path` before playing it.
    pub fn keep_output(mut self, path: Option<PathBuf>) -> Self {
        self.keep_output = path;
        self
    }

    /// Synthesize `text` and play it, blocking until playback ends.
    ///
    /// Blank text is skipped and yields `Ok(None)`. The intermediate
    /// container is removed however this returns.
    pub fn speak(&mut self, text: &str) -> Result<Option<Playback>> {
        let text = text.trim();

        if text.is_empty() {
            info!("Input text is empty, nothing to synthesize");
            return Ok(None);
        }

        let container = tempfile::Builder::new()
            .prefix("mouth-")
            .suffix(".wav")
            .tempfile()?;

        self.synthesizer.synthesize(text, container.path())?;

        if let Some(keep) = &self.keep_output {
            fs::copy(container.path(), keep).map_err(|e| {
                MouthError::Config(format!("{}: {}", keep.display(), e))
            })?;
        }

        let reader = WaveReader::open(container.path())?;
        let playback = play_wave(reader, &self.negotiator, &mut self.device)?;

        Ok(Some(playback))
    }

    pub fn negotiator(&self) -> &RateNegotiator {
        &self.negotiator
    }

    pub fn into_device(self) -> D {
        self.device
    }
}
