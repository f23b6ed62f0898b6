use crate::{AudioBuffer, Result, SampleCodec};
use hound::{WavSpec, WavWriter};
use std::fs::OpenOptions;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tracing::info;

/// Write `buffer` as a mono PCM container using `codec`'s sample width.
pub fn write_wav<W: Write + Seek>(
    buffer: &AudioBuffer,
    codec: &SampleCodec,
    writer: W,
) -> Result<()> {
    let wave_spec = WavSpec {
        channels: 1,
        sample_format: hound::SampleFormat::Int,
        sample_rate: buffer.frame_rate(),
        bits_per_sample: codec.bits(),
    };

    let mut wav_writer = WavWriter::new(writer, wave_spec)?;
    let encoded = codec.encode_all(buffer.samples());

    for sample in encoded.chunks_exact(usize::from(codec.width())) {
        wav_writer.write_sample(pcm_value(sample))?;
    }

    wav_writer.finalize()?;
    Ok(())
}

pub fn write_wav_file(
    buffer: &AudioBuffer,
    codec: &SampleCodec,
    outpath: impl AsRef<Path>,
) -> Result<()> {
    let outfile = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(outpath.as_ref())?;

    write_wav(buffer, codec, BufWriter::new(outfile))?;

    info!(
        path = %outpath.as_ref().display(),
        samples = buffer.len(),
        bits = codec.bits(),
        "Wrote wave file"
    );

    Ok(())
}

// hound takes signed values and re-biases 8-bit samples itself
fn pcm_value(le_bytes: &[u8]) -> i32 {
    match le_bytes {
        [b] => i32::from(*b) - 128,
        [b0, b1] => i32::from(i16::from_le_bytes([*b0, *b1])),
        [b0, b1, b2, b3] => i32::from_le_bytes([*b0, *b1, *b2, *b3]),
        _ => 0,
    }
}
