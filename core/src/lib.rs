mod error;
pub use error::*;

mod codec;
pub use codec::*;

mod buffer;
pub use buffer::*;

mod reader;
pub use reader::*;

mod normalize;
pub use normalize::*;

mod resample;
pub use resample::*;

mod device;
pub use device::*;

mod playback;
pub use playback::*;

mod negotiate;
pub use negotiate::*;

mod player;
pub use player::*;

mod writer;
pub use writer::*;

mod config;
pub use config::*;

mod synth;
pub use synth::*;

mod speaker;
pub use speaker::*;

use std::io::Read;

/// Decode a container and normalize it to a mono buffer.
pub fn load_buffer<R: Read>(reader: WaveReader<R>) -> Result<AudioBuffer> {
    let wave = reader.into_decoded()?;
    normalize(&wave)
}

/// Decode, normalize, and play a container on `device`.
pub fn play_wave<R: Read, D: OutputDevice>(
    reader: WaveReader<R>,
    negotiator: &RateNegotiator,
    device: D,
) -> Result<Playback> {
    let buffer = load_buffer(reader)?;
    negotiator.negotiate(&buffer, device)
}
