use crate::codec::to_i16;
use crate::{AttemptOutcome, AudioBuffer, OutputDevice, PlaybackSamples};
use crate::SampleEncoding;
use std::borrow::Cow;
use tracing::{debug, warn};

/// One render request and what the device said about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub frame_rate: u32,
    pub encoding: SampleEncoding,
    pub outcome: AttemptOutcome,
}

/// Hands buffers to an output device, converting them to the requested
/// encoding and keeping a log of every attempt.
pub struct PlaybackDriver<D: OutputDevice> {
    device: D,
    fallback: SampleEncoding,
    attempts: Vec<Attempt>,
}

impl<D: OutputDevice> PlaybackDriver<D> {
    pub fn new(device: D, fallback: SampleEncoding) -> Self {
        PlaybackDriver {
            device,
            fallback,
            attempts: Vec::new(),
        }
    }

    /// Render at the buffer's own rate: float first, then the fallback
    /// encoding if (and only if) the device refused the float format.
    pub fn play(&mut self, buffer: &AudioBuffer) -> AttemptOutcome {
        let outcome = self.attempt(buffer, SampleEncoding::Float32);

        if outcome != AttemptOutcome::FormatRejected
            || self.fallback == SampleEncoding::Float32
        {
            return outcome;
        }

        warn!(
            rate = buffer.frame_rate(),
            fallback = %self.fallback,
            "Device refused float samples, retrying"
        );

        self.attempt(buffer, self.fallback)
    }

    /// A single render attempt in one encoding.
    pub fn attempt(
        &mut self,
        buffer: &AudioBuffer,
        encoding: SampleEncoding,
    ) -> AttemptOutcome {
        let frame_rate = buffer.frame_rate();

        let outcome = match encoding {
            SampleEncoding::Float32 => {
                let samples = unity_bounded(buffer);
                self.device
                    .render(PlaybackSamples::Float32(&samples), frame_rate)
            }
            SampleEncoding::Fixed16 => {
                let samples = buffer
                    .samples()
                    .iter()
                    .map(|&s| to_i16(s))
                    .collect::<Vec<_>>();
                self.device
                    .render(PlaybackSamples::Fixed16(&samples), frame_rate)
            }
        };

        debug!(
            rate = frame_rate,
            encoding = %encoding,
            outcome = %outcome,
            "Playback attempt"
        );

        self.attempts.push(Attempt {
            frame_rate,
            encoding,
            outcome: outcome.clone(),
        });

        outcome
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn take_attempts(&mut self) -> Vec<Attempt> {
        std::mem::take(&mut self.attempts)
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

fn unity_bounded(buffer: &AudioBuffer) -> Cow<'_, [f32]> {
    if buffer.peak() <= 1.0 {
        Cow::Borrowed(buffer.samples())
    } else {
        let mut limited = buffer.clone();
        limited.limit_peak();
        Cow::Owned(limited.into_samples())
    }
}
