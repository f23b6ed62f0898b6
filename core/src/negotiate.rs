use crate::resample::resample;
use crate::{
    Attempt, AttemptOutcome, AudioBuffer, DeviceCapability, MouthError,
    OutputDevice, PlaybackDriver, Result, SampleEncoding,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Order in which rates and encodings are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// At each rate try float, then fixed-point, before moving on.
    #[default]
    PerRate,
    /// Try every rate as float, then revisit the rates that were not
    /// refused outright with fixed-point samples.
    FloatFirst,
}

impl std::str::FromStr for FallbackPolicy {
    type Err = MouthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "per-rate" => Ok(FallbackPolicy::PerRate),
            "float-first" => Ok(FallbackPolicy::FloatFirst),
            other => Err(MouthError::Config(format!(
                "Unknown fallback policy \"{}\"",
                other
            ))),
        }
    }
}

/// Successful negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct Playback {
    pub frame_rate: u32,
    pub encoding: SampleEncoding,
    pub resampled: bool,
    /// Gain applied after resampling to keep the peak at or below 1.0
    pub gain: f32,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateNegotiator {
    capability: DeviceCapability,
    policy: FallbackPolicy,
}

impl RateNegotiator {
    pub fn new(capability: DeviceCapability, policy: FallbackPolicy) -> Self {
        RateNegotiator { capability, policy }
    }

    pub fn capability(&self) -> &DeviceCapability {
        &self.capability
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// Rates to visit for a buffer at `native_rate`: the native rate, then
    /// the candidates in order, without repeats.
    pub fn rate_plan(&self, native_rate: u32) -> Vec<u32> {
        let mut plan = vec![native_rate];

        for &rate in &self.capability.candidate_rates {
            if !plan.contains(&rate) {
                plan.push(rate);
            }
        }

        plan
    }

    /// Find a rate and encoding the device accepts and play `buffer` there.
    ///
    /// Success is only reported once the device has confirmed both the rate
    /// and the encoding. A device that is absent ends negotiation at once.
    pub fn negotiate<D: OutputDevice>(
        &self,
        buffer: &AudioBuffer,
        device: D,
    ) -> Result<Playback> {
        let native_rate = buffer.frame_rate();
        let fallback = self.capability.fallback;
        let plan = self.rate_plan(native_rate);
        let mut driver = PlaybackDriver::new(device, fallback);

        let mut prepared = HashMap::<u32, (AudioBuffer, f32)>::new();
        let mut refused_rates = HashSet::<u32>::new();

        // `None` lets the driver pick float then fallback within one rate
        let passes = match self.policy {
            FallbackPolicy::PerRate => vec![None],
            FallbackPolicy::FloatFirst
                if fallback == SampleEncoding::Float32 =>
            {
                vec![Some(SampleEncoding::Float32)]
            }
            FallbackPolicy::FloatFirst => {
                vec![Some(SampleEncoding::Float32), Some(fallback)]
            }
        };

        for encoding in passes {
            for &rate in &plan {
                if refused_rates.contains(&rate) {
                    continue;
                }

                if !prepared.contains_key(&rate) {
                    prepared.insert(rate, prepare(buffer, rate)?);
                }

                let (candidate, gain) = &prepared[&rate];

                let outcome = match encoding {
                    None => driver.play(candidate),
                    Some(encoding) => driver.attempt(candidate, encoding),
                };

                match outcome {
                    AttemptOutcome::Played => {
                        let attempts = driver.take_attempts();
                        let encoding = attempts
                            .last()
                            .map(|a| a.encoding)
                            .unwrap_or(SampleEncoding::Float32);

                        info!(
                            rate,
                            encoding = %encoding,
                            attempts = attempts.len(),
                            "Playback complete"
                        );

                        return Ok(Playback {
                            frame_rate: rate,
                            encoding,
                            resampled: rate != native_rate,
                            gain: *gain,
                            attempts,
                        });
                    }
                    AttemptOutcome::RateRejected => {
                        debug!(rate, "Rate refused, moving on");
                        refused_rates.insert(rate);
                    }
                    AttemptOutcome::FormatRejected => {
                        debug!(rate, "Encoding refused at this rate");
                    }
                    AttemptOutcome::DeviceUnavailable(reason) => {
                        warn!(%reason, "Output device unavailable");
                        return Err(MouthError::PlaybackUnavailable {
                            attempts: driver.attempts().len(),
                            reason,
                        });
                    }
                }
            }
        }

        let attempts = driver.take_attempts();
        let reason = attempts
            .last()
            .map(|a| {
                format!(
                    "last attempt {} Hz {}: {}",
                    a.frame_rate, a.encoding, a.outcome
                )
            })
            .unwrap_or_else(|| String::from("no candidates"));

        Err(MouthError::PlaybackUnavailable {
            attempts: attempts.len(),
            reason,
        })
    }
}

/// Bring `buffer` to `rate`: resample if needed, then pull the peak back to
/// unity if resampling overshot. Returns the buffer and the gain applied.
pub fn prepare(buffer: &AudioBuffer, rate: u32) -> Result<(AudioBuffer, f32)> {
    if buffer.frame_rate() == rate {
        return Ok((buffer.clone(), 1.0));
    }

    let mut resampled = resample(buffer, rate)?;
    let gain = resampled.limit_peak();

    if gain < 1.0 {
        debug!(rate, gain, "Rescaled resampled buffer");
    }

    Ok((resampled, gain))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiator(rates: &[u32]) -> RateNegotiator {
        RateNegotiator::new(
            DeviceCapability::new(rates.to_vec()),
            FallbackPolicy::PerRate,
        )
    }

    #[test]
    fn test_rate_plan_starts_native_and_skips_duplicate() {
        let n = negotiator(&[48000, 44100, 22050, 16000]);
        assert_eq!(n.rate_plan(22050), vec![22050, 48000, 44100, 16000]);
        assert_eq!(n.rate_plan(8000), vec![8000, 48000, 44100, 22050, 16000]);
    }

    #[test]
    fn test_prepare_native_rate_untouched() {
        let buffer = AudioBuffer::new(vec![0.3, -0.9, 0.1], 44100);
        let (prepared, gain) = prepare(&buffer, 44100).unwrap();

        assert_eq!(prepared, buffer);
        assert_eq!(gain, 1.0);
    }

    #[test]
    fn test_prepare_square_wave_never_clips() {
        // Full-scale square wave rings past unity once band limited
        let samples = (0..800)
            .map(|i| if (i / 20) % 2 == 0 { 1.0 } else { -1.0 })
            .collect::<Vec<f32>>();
        let buffer = AudioBuffer::new(samples, 8000);

        let raw = resample(&buffer, 44100).unwrap();
        assert!(raw.peak() > 1.0);

        let (prepared, gain) = prepare(&buffer, 44100).unwrap();
        assert_eq!(prepared.len(), 4410);
        assert!(prepared.peak() <= 1.0);
        assert!(gain < 1.0);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "float-first".parse::<FallbackPolicy>().unwrap(),
            FallbackPolicy::FloatFirst
        );
        assert!("sideways".parse::<FallbackPolicy>().is_err());
    }
}
