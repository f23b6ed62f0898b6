use crate::{MouthError, Result};
use hound::SampleFormat;
use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind, Read};
use std::path::Path;
use tracing::debug;

/// Container header fields, as declared by the file.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Metadata {
    pub channels: u16,
    /// Bytes per sample (per channel)
    pub sample_width: u16,
    pub frame_rate: u32,
    pub frame_count: u32,
}

impl Metadata {
    pub fn duration_secs(&self) -> f64 {
        f64::from(self.frame_count) / f64::from(self.frame_rate)
    }

    fn data_len(&self) -> Option<usize> {
        usize::try_from(self.frame_count)
            .ok()?
            .checked_mul(usize::from(self.channels))?
            .checked_mul(usize::from(self.sample_width))
    }
}

/// Header plus the raw interleaved sample bytes of the data chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedWave {
    pub metadata: Metadata,
    pub data: Vec<u8>,
}

pub struct WaveReader<R: Read> {
    reader: hound::WavReader<R>,
}

impl WaveReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> WaveReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let reader = hound::WavReader::new(reader)?;
        let spec = reader.spec();

        if spec.sample_format != SampleFormat::Int {
            return Err(MouthError::format("Float samples are unsupported"));
        }

        if spec.bits_per_sample % 8 != 0 {
            return Err(MouthError::format(format!(
                "Samples must be whole bytes, got {} bits",
                spec.bits_per_sample
            )));
        }

        Ok(WaveReader { reader })
    }

    pub fn metadata(&self) -> Metadata {
        let spec = self.reader.spec();

        Metadata {
            channels: spec.channels,
            sample_width: spec.bits_per_sample / 8,
            frame_rate: spec.sample_rate,
            frame_count: self.reader.duration(),
        }
    }

    /// Consume the reader, returning the header and the data chunk bytes.
    pub fn into_decoded(self) -> Result<DecodedWave> {
        let metadata = self.metadata();

        if metadata.frame_count == 0 {
            return Err(MouthError::format("No audio frames"));
        }

        let data_len = metadata
            .data_len()
            .ok_or_else(|| MouthError::format("Data chunk too large"))?;

        // hound leaves the inner reader at the start of the data chunk
        let mut inner = self.reader.into_inner();
        let mut data = vec![0u8; data_len];

        inner.read_exact(&mut data).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                MouthError::format("Data chunk shorter than declared")
            } else {
                MouthError::Io(e)
            }
        })?;

        debug!(
            channels = metadata.channels,
            width = metadata.sample_width,
            rate = metadata.frame_rate,
            frames = metadata.frame_count,
            "Decoded wave container"
        );

        Ok(DecodedWave { metadata, data })
    }
}

/// Decode an in-memory WAV byte stream.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedWave> {
    WaveReader::new(Cursor::new(bytes))?.into_decoded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn wav_bytes(spec: WavSpec, samples: &[i32]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn int_spec(channels: u16, bits: u16, rate: u32) -> WavSpec {
        WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        }
    }

    #[test]
    fn test_decode_exposes_header_untouched() {
        let bytes = wav_bytes(int_spec(2, 16, 22050), &[1, -1, 2, -2]);
        let decoded = decode_wav(&bytes).unwrap();

        assert_eq!(
            decoded.metadata,
            Metadata {
                channels: 2,
                sample_width: 2,
                frame_rate: 22050,
                frame_count: 2,
            }
        );
        assert_eq!(decoded.data, vec![1, 0, 255, 255, 2, 0, 254, 255]);
    }

    #[test]
    fn test_decode_8_bit_keeps_unsigned_bytes() {
        let bytes = wav_bytes(int_spec(1, 8, 8000), &[-128, 0, 127]);
        let decoded = decode_wav(&bytes).unwrap();

        assert_eq!(decoded.metadata.sample_width, 1);
        assert_eq!(decoded.data, vec![0, 128, 255]);
    }

    #[test]
    fn test_zero_frames_is_format_error() {
        let bytes = wav_bytes(int_spec(1, 16, 16000), &[]);
        let err = decode_wav(&bytes).unwrap_err();
        assert!(matches!(err, MouthError::Format(_)));
    }

    #[test]
    fn test_not_a_wave() {
        let err = decode_wav(b"definitely not RIFF data").unwrap_err();
        assert!(matches!(err, MouthError::Format(_)));
    }

    #[test]
    fn test_float_container_rejected() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0.25f32).unwrap();
            writer.finalize().unwrap();
        }

        let err = decode_wav(cursor.get_ref()).unwrap_err();
        assert!(matches!(err, MouthError::Format(_)));
    }

    #[test]
    fn test_truncated_data_chunk() {
        let mut bytes = wav_bytes(int_spec(1, 16, 16000), &[1, 2, 3, 4]);
        bytes.truncate(bytes.len() - 3);

        let err = decode_wav(&bytes).unwrap_err();
        assert!(matches!(err, MouthError::Format(_)));
    }
}
