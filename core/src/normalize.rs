use crate::{AudioBuffer, DecodedWave, MouthError, Result, SampleCodec};

/// Turn decoded container data into a normalized mono buffer at the
/// container's frame rate.
pub fn normalize(wave: &DecodedWave) -> Result<AudioBuffer> {
    let metadata = &wave.metadata;
    let codec = SampleCodec::for_width(metadata.sample_width)?;

    if metadata.frame_rate == 0 {
        return Err(MouthError::format("Frame rate must be non-zero"));
    }

    let interleaved = codec.decode_all(&wave.data);

    let samples = match metadata.channels {
        1 => interleaved,
        2 => downmix_stereo(&interleaved),
        n => {
            return Err(MouthError::format(format!(
                "Unsupported channel count: {}",
                n
            )))
        }
    };

    if samples.is_empty() {
        return Err(MouthError::format("No audio frames"));
    }

    Ok(AudioBuffer::new(samples, metadata.frame_rate))
}

/// Average interleaved left/right pairs. A dangling final sample is dropped.
///
/// `(x + x) / 2.0` is exact in binary floating point, so identical
/// channels come back unchanged.
pub fn downmix_stereo(interleaved: &[f32]) -> Vec<f32> {
    interleaved
        .chunks_exact(2)
        .map(|frame| (frame[0] + frame[1]) / 2.0)
        .collect()
}
