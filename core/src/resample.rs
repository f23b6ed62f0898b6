use crate::{AudioBuffer, MouthError, Result};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Length of a signal of `len` frames after conversion from `inrate` to
/// `outrate`, rounded to the nearest frame.
pub fn resampled_len(len: usize, inrate: u32, outrate: u32) -> usize {
    (len as f64 * f64::from(outrate) / f64::from(inrate)).round() as usize
}

/// Resample by truncating or zero-padding the signal's spectrum.
///
/// The whole buffer is treated as one period, so the output is the band
/// limited interpolation of the input at the new rate. Output may overshoot
/// unity near sharp transients; see `AudioBuffer::limit_peak`.
pub fn resample(buffer: &AudioBuffer, outrate: u32) -> Result<AudioBuffer> {
    let inrate = buffer.frame_rate();

    if inrate == 0 || outrate == 0 {
        return Err(MouthError::Config(String::from(
            "Frame rate must be non-zero",
        )));
    }

    if inrate == outrate {
        return Ok(buffer.clone());
    }

    let input = buffer.samples();
    let in_len = input.len();
    let out_len = resampled_len(in_len, inrate, outrate);

    if in_len == 0 {
        return Ok(AudioBuffer::new(Vec::new(), outrate));
    }

    if out_len == 0 {
        return Err(MouthError::Format(format!(
            "{} frame(s) at {} Hz leave nothing to play at {} Hz",
            in_len, inrate, outrate
        )));
    }

    let mut planner = FftPlanner::<f64>::new();

    let mut spectrum = input
        .iter()
        .map(|&s| Complex::new(f64::from(s), 0.0))
        .collect::<Vec<_>>();
    planner.plan_fft_forward(in_len).process(&mut spectrum);

    let mut signal = resize_spectrum(&spectrum, out_len);
    planner.plan_fft_inverse(out_len).process(&mut signal);

    // rustfft leaves both transforms unnormalized; dividing by the input
    // length also applies the out_len / in_len amplitude correction
    let scale = in_len as f64;
    let samples = signal.iter().map(|c| (c.re / scale) as f32).collect();

    Ok(AudioBuffer::new(samples, outrate))
}

fn resize_spectrum(
    spectrum: &[Complex<f64>],
    out_len: usize,
) -> Vec<Complex<f64>> {
    let in_len = spectrum.len();
    let shared = in_len.min(out_len);
    let mut resized = vec![Complex::new(0.0, 0.0); out_len];

    resized[0] = spectrum[0];

    // Bins strictly below the shared Nyquist keep their conjugate partners
    for k in 1..(shared + 1) / 2 {
        resized[k] = spectrum[k];
        resized[out_len - k] = spectrum[in_len - k];
    }

    if shared % 2 == 0 {
        let nyquist = shared / 2;

        if out_len > in_len {
            // Split the input Nyquist bin across both halves
            let half = spectrum[nyquist] * 0.5;
            resized[nyquist] = half;
            resized[out_len - nyquist] = half;
        } else {
            // Fold the two bins that alias onto the output Nyquist
            resized[nyquist] = spectrum[nyquist] + spectrum[in_len - nyquist];
        }
    }

    resized
}
