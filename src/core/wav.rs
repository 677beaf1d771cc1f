use super::error::EngineError;
use std::io::Cursor;

/// Scale one float sample to signed 16-bit, asymmetric so both -1.0 and 1.0
/// map to the full range.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode planar float channels as an interleaved 16-bit PCM WAV file.
///
/// Channels shorter than the longest one are padded with silence.
pub fn encode_wav(channels: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>, EngineError> {
    let channel_count = channels.len().max(1) as u16;
    let spec = hound::WavSpec {
        channels: channel_count,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);

    let mut cursor = Cursor::new(Vec::with_capacity(44 + frames * channel_count as usize * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for i in 0..frames {
            if channels.is_empty() {
                writer.write_sample(0i16)?;
                continue;
            }
            for ch in channels {
                writer.write_sample(sample_to_i16(ch.get(i).copied().unwrap_or(0.0)))?;
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
