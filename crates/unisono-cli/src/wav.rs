//! WAV output for rendered buffers.

use hound::{SampleFormat, WavWriter};
use std::path::Path;
use unisono_core::AudioBuffer;

/// WAV file specification.
#[derive(Debug, Clone, Copy)]
pub struct WavSpec {
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample (16, 24 or 32).
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// The spec matching `buffer` at the given bit depth.
    pub fn for_buffer(buffer: &AudioBuffer, bits_per_sample: u16) -> Self {
        Self {
            channels: buffer.number_of_channels() as u16,
            sample_rate: buffer.sample_rate().round() as u32,
            bits_per_sample,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// Writes every channel of `buffer`, interleaved.
///
/// 32-bit files are IEEE float; 16 and 24-bit files are clamped PCM.
pub fn write_buffer<P: AsRef<Path>>(
    path: P,
    buffer: &AudioBuffer,
    bits_per_sample: u16,
) -> Result<(), hound::Error> {
    let spec = WavSpec::for_buffer(buffer, bits_per_sample);
    let mut writer = WavWriter::create(path, hound::WavSpec::from(spec))?;
    let channels = buffer.channels();

    if bits_per_sample == 32 {
        for frame in 0..buffer.length() {
            for channel in channels {
                writer.write_sample(channel[frame])?;
            }
        }
    } else {
        let max_val = (1i32 << (bits_per_sample - 1)) as f32;
        for frame in 0..buffer.length() {
            for channel in channels {
                let int_sample = (channel[frame] * max_val).clamp(-max_val, max_val - 1.0) as i32;
                writer.write_sample(int_sample)?;
            }
        }
    }

    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;
    use tempfile::NamedTempFile;

    fn stereo() -> AudioBuffer {
        AudioBuffer::from_channels(vec![vec![0.5, -0.5, 1.5], vec![0.25, 0.0, -2.0]], 8000.0)
            .unwrap()
    }

    #[test]
    fn test_float_interleaved() {
        let file = NamedTempFile::new().unwrap();
        write_buffer(file.path(), &stereo(), 32).unwrap();

        let mut reader = WavReader::open(file.path()).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<f32> = reader.samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(samples, [0.5, 0.25, -0.5, 0.0, 1.5, -2.0]);
    }

    #[test]
    fn test_pcm_clamped() {
        let file = NamedTempFile::new().unwrap();
        write_buffer(file.path(), &stereo(), 16).unwrap();

        let mut reader = WavReader::open(file.path()).unwrap();
        assert_eq!(reader.spec().sample_format, SampleFormat::Int);
        let samples: Vec<i32> = reader.samples::<i32>().map(Result::unwrap).collect();
        assert_eq!(samples[0], 16384);
        assert_eq!(samples[4], 32767);
        assert_eq!(samples[5], -32768);
    }
}
