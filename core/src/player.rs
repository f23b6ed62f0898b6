use crate::{
    AttemptOutcome, DeviceCapability, OutputDevice, PlaybackSamples,
    STANDARD_RATES,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BuildStreamError, Sample, SampleFormat, SampleRate, SizedSample,
    SupportedStreamConfig, SupportedStreamConfigRange,
};
use std::sync::mpsc;
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, error, info};

const NO_OUTPUT: &str = "No output device found";

// Time allowed past the buffer's nominal length before giving up on the
// device, and time left for the last callback's buffer to drain
const COMPLETION_GRACE: Duration = Duration::from_secs(2);
const DRAIN_TIME: Duration = Duration::from_millis(150);

enum StreamEvent {
    Finished,
    Failed(String),
}

/// The host's default output device.
///
/// The device is looked up and a stream opened per render, so nothing is
/// held between utterances.
pub struct CpalDevice {
    host: cpal::Host,
}

impl CpalDevice {
    pub fn new() -> Self {
        CpalDevice {
            host: cpal::default_host(),
        }
    }

    pub fn device_name(&self) -> Option<String> {
        self.host
            .default_output_device()
            .and_then(|device| device.name().ok())
    }

    /// Rates from `rates` (plus the device's default rate) that some
    /// supported output configuration can run at.
    ///
    /// Returns `None` when there is no device or it cannot be queried.
    pub fn capability(&self, rates: &[u32]) -> Option<DeviceCapability> {
        let device = self.host.default_output_device()?;

        let default_rate = device
            .default_output_config()
            .ok()
            .map(|cfg| cfg.sample_rate().0);

        let ranges = device
            .supported_output_configs()
            .map_err(|e| debug!("Could not query output configs: {}", e))
            .ok()?
            .filter(|range| {
                matches!(
                    range.sample_format(),
                    SampleFormat::F32 | SampleFormat::I16
                )
            })
            .collect::<Vec<_>>();

        let capability =
            DeviceCapability::from_supported(rates, default_rate, |rate| {
                ranges.iter().any(|range| {
                    range.min_sample_rate().0 <= rate
                        && rate <= range.max_sample_rate().0
                })
            });

        if capability.candidate_rates.is_empty() {
            None
        } else {
            Some(capability)
        }
    }

    pub fn standard_capability(&self) -> Option<DeviceCapability> {
        self.capability(&STANDARD_RATES)
    }
}

impl Default for CpalDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDevice for CpalDevice {
    fn render(
        &mut self,
        samples: PlaybackSamples<'_>,
        frame_rate: u32,
    ) -> AttemptOutcome {
        let device = match self.host.default_output_device() {
            Some(device) => device,
            None => {
                return AttemptOutcome::DeviceUnavailable(NO_OUTPUT.into())
            }
        };

        let format = match samples {
            PlaybackSamples::Float32(_) => SampleFormat::F32,
            PlaybackSamples::Fixed16(_) => SampleFormat::I16,
        };

        let config = match stream_config(&device, format, frame_rate) {
            Ok(config) => config,
            Err(outcome) => return outcome,
        };

        let duration = Duration::from_millis(
            samples.len() as u64 * 1000 / u64::from(frame_rate.max(1)),
        );

        match samples {
            PlaybackSamples::Float32(s) => {
                play_blocking(&device, config, s.to_vec(), duration)
            }
            PlaybackSamples::Fixed16(s) => {
                play_blocking(&device, config, s.to_vec(), duration)
            }
        }
    }
}

/// Query the device's output configurations and pick one for `format` at
/// `rate`.
fn stream_config(
    device: &cpal::Device,
    format: SampleFormat,
    rate: u32,
) -> Result<SupportedStreamConfig, AttemptOutcome> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| AttemptOutcome::DeviceUnavailable(e.to_string()))?
        .collect::<Vec<_>>();

    select_config(&ranges, format, rate)
}

/// Pick a configuration with sample format `format` running at exactly
/// `rate`, preferring mono, then stereo, then anything.
///
/// A rate no configuration covers is `RateRejected`. A rate covered only in
/// other sample formats is `FormatRejected`.
fn select_config(
    ranges: &[SupportedStreamConfigRange],
    format: SampleFormat,
    rate: u32,
) -> Result<SupportedStreamConfig, AttemptOutcome> {
    let covers_rate = |range: &SupportedStreamConfigRange| {
        range.min_sample_rate().0 <= rate && rate <= range.max_sample_rate().0
    };

    if !ranges.iter().any(covers_rate) {
        return Err(AttemptOutcome::RateRejected);
    }

    let mut candidates = ranges
        .iter()
        .filter(|range| range.sample_format() == format)
        .collect::<Vec<_>>();

    candidates.sort_by_key(|range| match range.channels() {
        1 => 0,
        2 => 1,
        _ => 2,
    });

    candidates
        .into_iter()
        .find_map(|range| range.try_with_sample_rate(SampleRate(rate)))
        .ok_or(AttemptOutcome::FormatRejected)
}

fn play_blocking<T>(
    device: &cpal::Device,
    config: SupportedStreamConfig,
    samples: Vec<T>,
    duration: Duration,
) -> AttemptOutcome
where
    T: SizedSample + Send + 'static,
{
    let channels = config.channels();
    let (events, finished) = mpsc::channel();
    let error_events = events.clone();

    let stream = match device.build_output_stream(
        &config.into(),
        stream_callback(samples, channels, events),
        move |e| {
            error!("Output stream error: {}", e);
            let _ = error_events.send(StreamEvent::Failed(e.to_string()));
        },
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => return build_outcome(e),
    };

    if let Err(e) = stream.play() {
        return AttemptOutcome::DeviceUnavailable(e.to_string());
    }

    info!(
        channels,
        millis = duration.as_millis() as u64,
        "Playing. . ."
    );

    // The stream is dropped, releasing the device, on every return below
    match finished.recv_timeout(duration + COMPLETION_GRACE) {
        Ok(StreamEvent::Finished) => {
            sleep(DRAIN_TIME);
            AttemptOutcome::Played
        }
        Ok(StreamEvent::Failed(reason)) => {
            AttemptOutcome::DeviceUnavailable(reason)
        }
        Err(_) => AttemptOutcome::DeviceUnavailable(String::from(
            "Timed out waiting for playback to finish",
        )),
    }
}

fn build_outcome(e: BuildStreamError) -> AttemptOutcome {
    match e {
        BuildStreamError::DeviceNotAvailable => {
            AttemptOutcome::DeviceUnavailable(e.to_string())
        }
        BuildStreamError::StreamConfigNotSupported => {
            AttemptOutcome::RateRejected
        }
        BuildStreamError::InvalidArgument => AttemptOutcome::FormatRejected,
        // Backends report rates the hardware cannot clock as generic errors
        other => {
            debug!("Stream build failed: {}", other);
            AttemptOutcome::RateRejected
        }
    }
}

fn stream_callback<T>(
    samples: Vec<T>,
    channels: u16,
    events: mpsc::Sender<StreamEvent>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: Sample + Send + 'static,
{
    let channels = usize::from(channels.max(1));
    let mut offset = 0usize;
    let mut done = false;

    move |buf: &mut [T], _: &cpal::OutputCallbackInfo| {
        offset += fill_frames(buf, &samples[offset..], channels);

        if offset >= samples.len() && !done {
            done = true;
            let _ = events.send(StreamEvent::Finished);
        }
    }
}

/// Write mono samples to every channel of an interleaved output buffer,
/// padding with silence once the input runs out. Returns the number of
/// input samples consumed.
fn fill_frames<T: Sample>(
    buf: &mut [T],
    samples: &[T],
    channels: usize,
) -> usize {
    let write_count = (buf.len() / channels).min(samples.len());

    for (frame, &s) in buf
        .chunks_exact_mut(channels)
        .zip(&samples[..write_count])
    {
        frame.fill(s);
    }

    buf[write_count * channels..].fill(T::EQUILIBRIUM);
    write_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::SupportedBufferSize;

    fn range(
        channels: u16,
        min: u32,
        max: u32,
        format: SampleFormat,
    ) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn test_select_float_rate() {
        let ranges = [
            range(2, 8000, 192000, SampleFormat::I16),
            range(1, 44100, 48000, SampleFormat::F32),
        ];

        let config = select_config(&ranges, SampleFormat::F32, 48000).unwrap();
        assert_eq!(config.sample_rate(), SampleRate(48000));
        assert_eq!(config.sample_format(), SampleFormat::F32);
        assert_eq!(config.channels(), 1);
    }

    #[test]
    fn test_rate_only_in_fixed_is_format_rejected() {
        let ranges = [
            range(1, 44100, 44100, SampleFormat::F32),
            range(1, 48000, 48000, SampleFormat::I16),
        ];

        assert_eq!(
            select_config(&ranges, SampleFormat::F32, 48000).unwrap_err(),
            AttemptOutcome::FormatRejected
        );

        let config = select_config(&ranges, SampleFormat::I16, 48000).unwrap();
        assert_eq!(config.sample_format(), SampleFormat::I16);
    }

    #[test]
    fn test_missing_format_is_format_rejected() {
        let ranges = [range(2, 8000, 48000, SampleFormat::I16)];

        assert_eq!(
            select_config(&ranges, SampleFormat::F32, 22050).unwrap_err(),
            AttemptOutcome::FormatRejected
        );
    }

    #[test]
    fn test_rate_only_in_stereo() {
        let ranges = [
            range(1, 16000, 16000, SampleFormat::F32),
            range(2, 8000, 192000, SampleFormat::F32),
        ];

        let config = select_config(&ranges, SampleFormat::F32, 48000).unwrap();
        assert_eq!(config.channels(), 2);
        assert_eq!(config.sample_rate(), SampleRate(48000));

        let config = select_config(&ranges, SampleFormat::F32, 16000).unwrap();
        assert_eq!(config.channels(), 1);
    }

    #[test]
    fn test_uncovered_rate_is_rate_rejected() {
        let ranges = [
            range(1, 44100, 48000, SampleFormat::F32),
            range(2, 44100, 48000, SampleFormat::I16),
        ];

        for format in [SampleFormat::F32, SampleFormat::I16] {
            assert_eq!(
                select_config(&ranges, format, 8000).unwrap_err(),
                AttemptOutcome::RateRejected
            );
        }
    }

    #[test]
    fn test_no_configs_is_rate_rejected() {
        assert_eq!(
            select_config(&[], SampleFormat::F32, 48000).unwrap_err(),
            AttemptOutcome::RateRejected
        );
    }

    #[test]
    fn test_fill_duplicates_channels_and_pads() {
        let mut buf = vec![9.0f32; 6];
        let consumed = fill_frames(&mut buf, &[0.5, -0.5], 2);

        assert_eq!(consumed, 2);
        assert_eq!(buf, vec![0.5, 0.5, -0.5, -0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_fill_stops_at_buffer_end() {
        let mut buf = vec![0i16; 3];
        let consumed = fill_frames(&mut buf, &[1, 2, 3, 4, 5], 1);

        assert_eq!(consumed, 3);
        assert_eq!(buf, vec![1, 2, 3]);
    }

    #[test]
    fn test_fill_silence_when_exhausted() {
        let mut buf = vec![7i16; 4];
        assert_eq!(fill_frames(&mut buf, &[], 2), 0);
        assert_eq!(buf, vec![0, 0, 0, 0]);
    }
}
