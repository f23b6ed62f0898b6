use serde::Deserialize;

/// Frame rates tried when the device cannot be asked, highest first.
pub const STANDARD_RATES: [u32; 4] = [48000, 44100, 22050, 16000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleEncoding {
    Float32,
    Fixed16,
}

impl std::fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleEncoding::Float32 => write!(f, "f32"),
            SampleEncoding::Fixed16 => write!(f, "i16"),
        }
    }
}

/// Mono samples in the encoding a device is being asked to accept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackSamples<'a> {
    Float32(&'a [f32]),
    Fixed16(&'a [i16]),
}

impl PlaybackSamples<'_> {
    pub fn encoding(&self) -> SampleEncoding {
        match self {
            PlaybackSamples::Float32(_) => SampleEncoding::Float32,
            PlaybackSamples::Fixed16(_) => SampleEncoding::Fixed16,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PlaybackSamples::Float32(s) => s.len(),
            PlaybackSamples::Fixed16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a device reported for one render attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Played,
    /// The frame rate was refused; another rate may work.
    RateRejected,
    /// The rate is fine but the sample encoding was refused.
    FormatRejected,
    /// No usable device, or it failed while rendering.
    DeviceUnavailable(String),
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptOutcome::Played => write!(f, "played"),
            AttemptOutcome::RateRejected => write!(f, "rate rejected"),
            AttemptOutcome::FormatRejected => write!(f, "format rejected"),
            AttemptOutcome::DeviceUnavailable(reason) => {
                write!(f, "device unavailable ({})", reason)
            }
        }
    }
}

/// An audio sink that renders a whole mono buffer per call.
///
/// `render` blocks until the device has finished playing, or returns as
/// soon as the attempt is known to have failed. Whatever the device holds
/// for the attempt must be released before returning.
pub trait OutputDevice {
    fn render(
        &mut self,
        samples: PlaybackSamples<'_>,
        frame_rate: u32,
    ) -> AttemptOutcome;
}

impl<D: OutputDevice + ?Sized> OutputDevice for &mut D {
    fn render(
        &mut self,
        samples: PlaybackSamples<'_>,
        frame_rate: u32,
    ) -> AttemptOutcome {
        (**self).render(samples, frame_rate)
    }
}

/// Rates to try, highest fidelity first, and the encoding to fall back to
/// when float output is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCapability {
    pub candidate_rates: Vec<u32>,
    pub fallback: SampleEncoding,
}

impl DeviceCapability {
    pub fn new(candidate_rates: Vec<u32>) -> Self {
        DeviceCapability {
            candidate_rates,
            fallback: SampleEncoding::Fixed16,
        }
    }

    /// Keep the rates `supported` accepts, plus `default_rate`, sorted from
    /// highest to lowest with duplicates removed.
    pub fn from_supported(
        rates: &[u32],
        default_rate: Option<u32>,
        supported: impl Fn(u32) -> bool,
    ) -> Self {
        let mut candidate_rates = rates
            .iter()
            .copied()
            .filter(|&rate| supported(rate))
            .chain(default_rate)
            .filter(|&rate| rate > 0)
            .collect::<Vec<_>>();

        candidate_rates.sort_unstable_by(|a, b| b.cmp(a));
        candidate_rates.dedup();

        Self::new(candidate_rates)
    }
}

impl Default for DeviceCapability {
    fn default() -> Self {
        Self::new(STANDARD_RATES.to_vec())
    }
}
