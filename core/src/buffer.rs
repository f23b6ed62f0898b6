use std::time::Duration;

/// Normalized mono signal tagged with its frame rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    frame_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, frame_rate: u32) -> Self {
        AudioBuffer {
            samples,
            frame_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.frame_rate == 0 {
            return Duration::ZERO;
        }

        let millis = self.samples.len() as u64 * 1000 / u64::from(self.frame_rate);
        Duration::from_millis(millis)
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0f32, |peak, s| peak.max(s.abs()))
    }

    /// Scale the whole buffer down by its peak if the peak exceeds unity.
    ///
    /// This is a global gain change, so relative dynamics are kept. Returns
    /// the gain applied (1.0 when nothing changed).
    pub fn limit_peak(&mut self) -> f32 {
        let peak = self.peak();

        if peak <= 1.0 {
            return 1.0;
        }

        // Clamp only catches a last-ulp overshoot from the division
        for s in self.samples.iter_mut() {
            *s = (*s / peak).clamp(-1.0, 1.0);
        }

        1.0 / peak
    }
}
