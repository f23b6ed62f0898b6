use crate::{MouthError, Result};

/// Conversion between one PCM sample width and normalized floats.
///
/// Each supported width is a table entry pairing a decoder (little-endian
/// sample bytes to `[-1.0, 1.0]`) with the matching encoder. Adding a width
/// means adding an entry to `CODECS`, nothing else.
#[derive(Clone, Copy)]
pub struct SampleCodec {
    width: u16,
    decode: fn(&[u8]) -> f32,
    encode: fn(f32, &mut Vec<u8>),
}

static CODECS: [SampleCodec; 3] = [
    SampleCodec {
        width: 1,
        decode: decode_u8,
        encode: encode_u8,
    },
    SampleCodec {
        width: 2,
        decode: decode_i16,
        encode: encode_i16,
    },
    SampleCodec {
        width: 4,
        decode: decode_i32,
        encode: encode_i32,
    },
];

impl SampleCodec {
    /// Look up the codec for a sample width given in bytes.
    pub fn for_width(width: u16) -> Result<&'static SampleCodec> {
        CODECS.iter().find(|c| c.width == width).ok_or_else(|| {
            MouthError::format(format!(
                "Unsupported sample width: {} byte(s)",
                width
            ))
        })
    }

    pub fn for_bits(bits: u16) -> Result<&'static SampleCodec> {
        if bits % 8 != 0 {
            return Err(MouthError::format(format!(
                "Unsupported bit depth: {}",
                bits
            )));
        }

        Self::for_width(bits / 8)
    }

    /// Sample width in bytes
    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn bits(&self) -> u16 {
        self.width * 8
    }

    /// Decode one sample. `bytes` must be exactly `width()` long.
    pub fn decode(&self, bytes: &[u8]) -> f32 {
        (self.decode)(bytes)
    }

    pub fn encode(&self, sample: f32, out: &mut Vec<u8>) {
        (self.encode)(sample, out)
    }

    /// Decode a run of interleaved samples. Trailing bytes that do not
    /// form a whole sample are ignored.
    pub fn decode_all(&self, data: &[u8]) -> Vec<f32> {
        data.chunks_exact(usize::from(self.width))
            .map(self.decode)
            .collect()
    }

    pub fn encode_all(&self, samples: &[f32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(samples.len() * usize::from(self.width));

        for &s in samples {
            (self.encode)(s, &mut out);
        }

        out
    }
}

impl std::fmt::Debug for SampleCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SampleCodec({}-bit)", self.bits())
    }
}

impl PartialEq for SampleCodec {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
    }
}

/// Fixed-point conversion used for 16-bit output, both when writing
/// containers and when a device refuses float samples.
pub fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0)
        .round()
        .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

fn decode_u8(bytes: &[u8]) -> f32 {
    (f32::from(bytes[0]) - 128.0) / 128.0
}

fn encode_u8(sample: f32, out: &mut Vec<u8>) {
    let s = (sample * 128.0 + 128.0).round().clamp(0.0, 255.0);
    out.push(s as u8);
}

fn decode_i16(bytes: &[u8]) -> f32 {
    f32::from(i16::from_le_bytes([bytes[0], bytes[1]])) / 32768.0
}

fn encode_i16(sample: f32, out: &mut Vec<u8>) {
    out.extend_from_slice(&to_i16(sample).to_le_bytes());
}

fn decode_i32(bytes: &[u8]) -> f32 {
    let raw = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    (f64::from(raw) / 2147483648.0) as f32
}

fn encode_i32(sample: f32, out: &mut Vec<u8>) {
    let s = (f64::from(sample) * 2147483647.0)
        .round()
        .clamp(f64::from(i32::MIN), f64::from(i32::MAX));
    out.extend_from_slice(&(s as i32).to_le_bytes());
}
