//! Audio normalization.
//!
//! Turns a floating point waveform into a mono 16-bit PCM WAV container and
//! computes the durations reported in synthesis metadata.

use std::io::Cursor;

use crate::errors::TtsError;

/// Number of bytes per PCM16 sample.
pub const PCM16_BYTES_PER_SAMPLE: usize = 2;

/// Bitrate assumed for compressed streams when estimating duration.
///
/// Matches the `audio-24khz-48kbitrate-mono-mp3` output format requested from
/// the cloud voice service.
pub const DEFAULT_COMPRESSED_BITRATE_KBPS: u32 = 48;

/// Clamp a sample to `[-1.0, 1.0]` and scale it to the 16-bit signed range.
///
/// NaN maps to silence.
pub fn quantize_sample(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let clamped = sample.clamp(-1.0, 1.0);
    (clamped * 32767.0).round() as i16
}

/// Quantize a whole waveform.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(quantize_sample).collect()
}

/// Encode a waveform as a mono 16-bit WAV file held in memory.
///
/// Out-of-range samples are clamped silently.
///
/// ## Errors
///
/// Returns `TtsError::Synthesis` for an empty waveform, a zero sample rate,
/// or if the WAV writer fails.
pub fn encode_pcm16_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, TtsError> {
    if samples.is_empty() {
        return Err(TtsError::synthesis("backend returned an empty waveform"));
    }
    if sample_rate == 0 {
        return Err(TtsError::synthesis("sample rate must be positive"));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * PCM16_BYTES_PER_SAMPLE));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(TtsError::synthesis)?;
        for &sample in samples {
            writer
                .write_sample(quantize_sample(sample))
                .map_err(TtsError::synthesis)?;
        }
        writer.finalize().map_err(TtsError::synthesis)?;
    }

    Ok(cursor.into_inner())
}

/// Decode a WAV file into floating point samples and its sample rate.
///
/// Integer formats are scaled by their full-scale value; multi-channel audio
/// is downmixed by averaging each frame.
///
/// ## Errors
///
/// Returns `TtsError::Synthesis` if the bytes are not a readable WAV file.
pub fn decode_wav<R: std::io::Read>(reader: R) -> Result<(u32, Vec<f32>), TtsError> {
    let mut reader = hound::WavReader::new(reader).map_err(TtsError::synthesis)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(TtsError::synthesis)?,
        hound::SampleFormat::Int => {
            let full_scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()
                .map_err(TtsError::synthesis)?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((spec.sample_rate, samples))
}

/// Exact duration of a PCM16 mono payload.
pub fn pcm_duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f64 / f64::from(sample_rate)
}

/// Approximate duration of a compressed stream from its size.
///
/// This does not decode the stream; variable bitrate content and container
/// overhead make the estimate drift from the true length.
pub fn estimate_compressed_duration_secs(byte_len: usize, bitrate_kbps: u32) -> f64 {
    if bitrate_kbps == 0 {
        return 0.0;
    }
    let bytes_per_second = f64::from(bitrate_kbps) * 1000.0 / 8.0;
    byte_len as f64 / bytes_per_second
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn quantize_scales_and_rounds() {
        assert_eq!(quantize_sample(0.0), 0);
        assert_eq!(quantize_sample(1.0), 32767);
        assert_eq!(quantize_sample(-1.0), -32767);
        assert_eq!(quantize_sample(0.5), 16384);
    }

    #[test]
    fn quantize_clamps_out_of_range() {
        assert_eq!(quantize_sample(3.7), 32767);
        assert_eq!(quantize_sample(-12.0), -32767);
        assert_eq!(quantize_sample(f32::INFINITY), 32767);
        assert_eq!(quantize_sample(f32::NEG_INFINITY), -32767);
        assert_eq!(quantize_sample(f32::NAN), 0);
    }

    #[test]
    fn wav_round_trip_keeps_count_and_rate() {
        let samples: Vec<f32> = (0..2400).map(|i| (i as f32 / 40.0).sin() * 1.4).collect();
        let bytes = encode_pcm16_wav(&samples, 24_000).unwrap();

        let reader = hound::WavReader::new(Cursor::new(&bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(reader.len() as usize, samples.len());

        let decoded: Vec<i16> = reader.into_samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(decoded, quantize(&samples));
    }

    #[test]
    fn encoding_is_deterministic() {
        let samples = vec![0.1, -0.2, 0.3, 2.0, -2.0];
        assert_eq!(
            encode_pcm16_wav(&samples, 24_000).unwrap(),
            encode_pcm16_wav(&samples, 24_000).unwrap()
        );
    }

    #[test]
    fn empty_waveform_is_an_error() {
        assert!(matches!(
            encode_pcm16_wav(&[], 24_000),
            Err(TtsError::Synthesis { .. })
        ));
    }

    #[test]
    fn decode_scales_integer_samples() {
        let bytes = encode_pcm16_wav(&[1.0, -1.0, 0.0], 16_000).unwrap();
        let (rate, samples) = decode_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(samples.len(), 3);
        assert!((samples[0] - 32767.0 / 32768.0).abs() < 1e-6);
        assert!((samples[1] + 32767.0 / 32768.0).abs() < 1e-6);
        assert_eq!(samples[2], 0.0);
    }

    #[test]
    fn decode_downmixes_stereo() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 24_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.5_f32, 0.1, -0.4, 0.0] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        let (_, samples) = decode_wav(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.3).abs() < 1e-6);
        assert!((samples[1] + 0.2).abs() < 1e-6);
    }

    #[test]
    fn durations() {
        assert_eq!(pcm_duration_secs(48_000, 24_000), 2.0);
        assert_eq!(pcm_duration_secs(10, 0), 0.0);
        assert_eq!(estimate_compressed_duration_secs(12_000, 48), 2.0);
        assert_eq!(estimate_compressed_duration_secs(12_000, 0), 0.0);
    }

    proptest! {
        #[test]
        fn quantized_samples_stay_in_i16_range(sample in proptest::num::f32::ANY) {
            let q = i32::from(quantize_sample(sample));
            prop_assert!((-32768..=32767).contains(&q));
        }

        #[test]
        fn in_range_samples_round_to_nearest(sample in -1.0f32..=1.0) {
            let expected = (sample * 32767.0).round() as i16;
            prop_assert_eq!(quantize_sample(sample), expected);
        }

        #[test]
        fn wav_length_is_header_plus_two_bytes_per_sample(
            samples in proptest::collection::vec(-4.0f32..4.0, 1..512)
        ) {
            let bytes = encode_pcm16_wav(&samples, 24_000).unwrap();
            prop_assert_eq!(bytes.len(), 44 + samples.len() * PCM16_BYTES_PER_SAMPLE);
            prop_assert_eq!(bytes.len() % 2, 0);
        }
    }
}
