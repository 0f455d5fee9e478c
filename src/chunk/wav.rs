use crate::error::{PipelineError, Result};

const SAMPLE_RATE: u32 = 24_000;
const BITS_PER_SAMPLE: u16 = 16;
const CHANNELS: u16 = 1;
const HEADER_LEN: usize = 44;

/// Builds a canonical 44-byte RIFF/WAVE/fmt /data header for 16-bit mono PCM
/// at 24 kHz, little-endian, sized for `data_len` bytes of PCM payload.
pub fn build_header(data_len: u32) -> [u8; HEADER_LEN] {
    let byte_rate = SAMPLE_RATE * CHANNELS as u32 * (BITS_PER_SAMPLE as u32 / 8);
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);
    let riff_chunk_size = 36 + data_len;

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&SAMPLE_RATE.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}

/// Wraps raw PCM bytes in a canonical WAV header.
pub fn wrap_pcm(pcm: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + pcm.len());
    out.extend_from_slice(&build_header(pcm.len() as u32));
    out.extend_from_slice(pcm);
    out
}

/// Bits-per-sample and sample rate parsed out of a raw-audio MIME type such
/// as `audio/L16;rate=24000`, as the remote TTS service reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub bits_per_sample: u16,
    pub rate: u32,
}

pub fn parse_audio_mime_type(mime_type: &str) -> AudioParams {
    let mut params = AudioParams {
        bits_per_sample: 16,
        rate: 24_000,
    };
    if mime_type.is_empty() {
        return params;
    }
    for part in mime_type.split(';') {
        let part = part.trim();
        if let Some(rate_str) = part.to_lowercase().strip_prefix("rate=").map(String::from) {
            if let Ok(rate) = rate_str.parse() {
                params.rate = rate;
            }
        } else if let Some(bits_str) = part.strip_prefix("audio/L") {
            if let Ok(bits) = bits_str.parse() {
                params.bits_per_sample = bits;
            }
        }
    }
    params
}

/// Wraps raw (possibly not-yet-WAV) audio bytes in a WAV header derived
/// from `mime_type`, unless the MIME type already says `audio/wav`.
pub fn convert_to_wav(audio_data: &[u8], mime_type: &str) -> Vec<u8> {
    if mime_type.starts_with("audio/wav") {
        return audio_data.to_vec();
    }
    let params = parse_audio_mime_type(mime_type);
    let byte_rate = params.rate * (params.bits_per_sample as u32 / 8);
    let block_align = (params.bits_per_sample / 8) as u16;
    let data_len = audio_data.len() as u32;

    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&1u16.to_le_bytes());
    header[24..28].copy_from_slice(&params.rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&params.bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());

    let mut out = Vec::with_capacity(HEADER_LEN + audio_data.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(audio_data);
    out
}

/// Checks the minimal RIFF/WAVE magic bytes a valid chunk must carry.
pub fn has_wav_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Reads the sample rate recorded in a WAV header, falling back to the
/// pipeline's canonical rate if the header is short or malformed.
fn header_sample_rate(bytes: &[u8]) -> u32 {
    if bytes.len() >= 28 {
        u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]])
    } else {
        SAMPLE_RATE
    }
}

/// Computes duration in seconds from a WAV byte buffer, falling back to an
/// estimate (`len / 48000`) if the header can't be parsed — mirrors the
/// source system's defensive fallback for truncated chunks.
pub fn calculate_duration_seconds(bytes: &[u8]) -> f64 {
    if !has_wav_magic(bytes) || bytes.len() < HEADER_LEN {
        return bytes.len() as f64 / 48_000.0;
    }
    let sample_rate = header_sample_rate(bytes);
    let data_size = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
    if sample_rate == 0 {
        return bytes.len() as f64 / 48_000.0;
    }
    // mono, 16-bit: 2 bytes per sample
    data_size as f64 / (sample_rate as f64 * 2.0)
}

/// Strips the 44-byte header from chunks 2..N and concatenates raw PCM onto
/// the first chunk's payload, then rebuilds a single header sized to the
/// combined length. The sample rate is taken from the first chunk.
pub fn concatenate(chunks: &[Vec<u8>]) -> Result<Vec<u8>> {
    let first = chunks
        .first()
        .ok_or_else(|| PipelineError::fatal_external("no chunks to concatenate"))?;
    if !has_wav_magic(first) || first.len() < HEADER_LEN {
        return Err(PipelineError::Wav("first chunk has no valid header".into()));
    }

    let mut pcm = Vec::new();
    pcm.extend_from_slice(&first[HEADER_LEN..]);
    for chunk in &chunks[1..] {
        if !has_wav_magic(chunk) || chunk.len() < HEADER_LEN {
            return Err(PipelineError::Wav("chunk has no valid header".into()));
        }
        pcm.extend_from_slice(&chunk[HEADER_LEN..]);
    }

    Ok(wrap_pcm(&pcm))
}

/// Window size for silence scanning: 100ms at 24kHz mono 16-bit.
const WINDOW_SAMPLES: usize = (SAMPLE_RATE as usize) / 10;
const SILENCE_DBFS_THRESHOLD: f64 = -45.0;
const SILENCE_SECONDS_THRESHOLD: f64 = 5.0;
const FAST_MODE_STRIDE: usize = 5;

/// Scans PCM samples in 100ms windows (sampling every Nth window) and
/// returns `true` if at least `SILENCE_SECONDS_THRESHOLD` seconds of
/// continuous silence below `SILENCE_DBFS_THRESHOLD` are found, exiting as
/// soon as the threshold is crossed.
pub fn has_extended_silence(bytes: &[u8]) -> bool {
    if !has_wav_magic(bytes) || bytes.len() <= HEADER_LEN {
        return false;
    }
    let pcm = &bytes[HEADER_LEN..];
    let samples: Vec<i16> = pcm
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    let total_windows = samples.len() / WINDOW_SAMPLES;
    let mut silent_windows_run = 0usize;
    let window_seconds = WINDOW_SAMPLES as f64 / SAMPLE_RATE as f64;

    let mut window_index = 0;
    while window_index < total_windows {
        let start = window_index * WINDOW_SAMPLES;
        let window = &samples[start..start + WINDOW_SAMPLES];
        let dbfs = window_rms_dbfs(window);

        if dbfs < SILENCE_DBFS_THRESHOLD {
            silent_windows_run += FAST_MODE_STRIDE;
            if silent_windows_run as f64 * window_seconds >= SILENCE_SECONDS_THRESHOLD {
                return true;
            }
        } else {
            silent_windows_run = 0;
        }

        window_index += FAST_MODE_STRIDE;
    }

    false
}

/// RMS level in dBFS for a window of 16-bit PCM samples. Silent (all-zero)
/// windows are treated as the floor rather than `-inf`.
fn window_rms_dbfs(window: &[i16]) -> f64 {
    if window.is_empty() {
        return f64::NEG_INFINITY;
    }
    let sum_squares: f64 = window.iter().map(|&s| (s as f64).powi(2)).sum();
    let rms = (sum_squares / window.len() as f64).sqrt();
    if rms <= 0.0 {
        return -120.0;
    }
    20.0 * (rms / i16::MAX as f64).log10()
}

/// Validates a rendered chunk: size, duration bounds, WAV magic, and
/// extended silence. Returns `Ok(())` or a `FatalExternal` error describing
/// the failed check.
pub fn validate_chunk(bytes: &[u8], reported_duration_s: f64) -> Result<()> {
    if bytes.len() < 1024 {
        return Err(PipelineError::fatal_external(format!(
            "chunk too small: {} bytes",
            bytes.len()
        )));
    }
    if !(1.0..=300.0).contains(&reported_duration_s) {
        return Err(PipelineError::fatal_external(format!(
            "chunk duration out of bounds: {:.2}s",
            reported_duration_s
        )));
    }
    if !has_wav_magic(bytes) {
        return Err(PipelineError::fatal_external("invalid WAV header"));
    }
    if reported_duration_s > 3.0 && has_extended_silence(bytes) {
        return Err(PipelineError::fatal_external(
            "chunk contains extended silence, likely a failed synthesis",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_wav(seconds: f64) -> Vec<u8> {
        let sample_count = (SAMPLE_RATE as f64 * seconds) as usize;
        let pcm = vec![0u8; sample_count * 2];
        wrap_pcm(&pcm)
    }

    fn tone_wav(seconds: f64) -> Vec<u8> {
        let sample_count = (SAMPLE_RATE as f64 * seconds) as usize;
        let mut pcm = Vec::with_capacity(sample_count * 2);
        for i in 0..sample_count {
            let sample = ((i as f64 * 0.1).sin() * 10_000.0) as i16;
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
        wrap_pcm(&pcm)
    }

    #[test]
    fn header_round_trips_sample_rate_and_duration() {
        let wav = silent_wav(2.0);
        assert!(has_wav_magic(&wav));
        assert!((calculate_duration_seconds(&wav) - 2.0).abs() < 0.01);
    }

    #[test]
    fn malformed_bytes_fall_back_to_estimate() {
        let bytes = vec![0u8; 9600];
        let duration = calculate_duration_seconds(&bytes);
        assert!((duration - 0.2).abs() < 0.01);
    }

    #[test]
    fn concatenate_combines_pcm_and_rebuilds_header() {
        let a = tone_wav(1.0);
        let b = tone_wav(1.0);
        let combined = concatenate(&[a, b]).unwrap();
        assert!((calculate_duration_seconds(&combined) - 2.0).abs() < 0.01);
    }

    #[test]
    fn silent_chunk_over_five_seconds_is_detected() {
        let wav = silent_wav(6.0);
        assert!(has_extended_silence(&wav));
    }

    #[test]
    fn tone_chunk_is_not_flagged_silent() {
        let wav = tone_wav(6.0);
        assert!(!has_extended_silence(&wav));
    }

    #[test]
    fn validate_rejects_too_small_chunk() {
        let bytes = vec![0u8; 10];
        assert!(validate_chunk(&bytes, 2.0).is_err());
    }

    #[test]
    fn validate_rejects_silent_chunk() {
        let wav = silent_wav(6.0);
        let duration = calculate_duration_seconds(&wav);
        assert!(validate_chunk(&wav, duration).is_err());
    }

    #[test]
    fn validate_accepts_well_formed_chunk() {
        let wav = tone_wav(2.0);
        let duration = calculate_duration_seconds(&wav);
        assert!(validate_chunk(&wav, duration).is_ok());
    }

    #[test]
    fn parse_audio_mime_type_reads_rate_and_bits() {
        let params = parse_audio_mime_type("audio/L16;rate=24000");
        assert_eq!(params.bits_per_sample, 16);
        assert_eq!(params.rate, 24_000);
    }

    #[test]
    fn parse_audio_mime_type_defaults_on_empty() {
        let params = parse_audio_mime_type("");
        assert_eq!(params.rate, 24_000);
        assert_eq!(params.bits_per_sample, 16);
    }

    #[test]
    fn convert_to_wav_wraps_raw_pcm() {
        let pcm = vec![1u8, 2, 3, 4];
        let wav = convert_to_wav(&pcm, "audio/L16;rate=24000");
        assert!(has_wav_magic(&wav));
        assert_eq!(&wav[HEADER_LEN..], &pcm[..]);
    }

    #[test]
    fn convert_to_wav_passes_through_existing_wav() {
        let existing = tone_wav(1.0);
        let result = convert_to_wav(&existing, "audio/wav");
        assert_eq!(result, existing);
    }
}
