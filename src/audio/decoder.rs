use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::media::probe::AudioStream;
use crate::{MediaError, Result};

/// Interleaved samples at the file's native rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Channel average per frame.
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks_exact(self.channels)
            .map(|frame| frame.iter().sum::<f32>() / self.channels as f32)
            .collect()
    }
}

/// Decodes the audio track of a file. Symphonia is tried first; containers or
/// codecs it cannot handle are decoded by `ffmpeg` at the probed rate. Both
/// paths read the last audio stream, the one the metadata describes.
pub struct AudioDecoder {
    ffmpeg: PathBuf,
}

impl AudioDecoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// `ordinal` is the stream's position among the file's audio streams.
    pub fn decode(
        &self,
        path: &Path,
        stream: Option<&AudioStream>,
        ordinal: Option<usize>,
    ) -> Result<DecodedAudio> {
        match decode_with_symphonia(path) {
            Ok(audio) => Ok(audio),
            Err(e) => {
                log::debug!(
                    "Symphonia could not decode {} ({}), falling back to {}",
                    path.display(),
                    e,
                    self.ffmpeg.display()
                );
                self.decode_with_ffmpeg(path, stream, ordinal)
            }
        }
    }

    fn decode_with_ffmpeg(
        &self,
        path: &Path,
        stream: Option<&AudioStream>,
        ordinal: Option<usize>,
    ) -> Result<DecodedAudio> {
        let sample_rate = stream
            .and_then(|s| s.sample_rate)
            .filter(|&rate| rate > 0)
            .ok_or_else(|| MediaError::Decode("unknown native sample rate".into()))?;
        let channels = stream.and_then(|s| s.channels).unwrap_or(1).max(1) as usize;

        let output = Command::new(&self.ffmpeg)
            .args(f32le_args(path, ordinal, channels, sample_rate))
            .output()
            .map_err(|e| {
                MediaError::Decode(format!("failed to run {}: {}", self.ffmpeg.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Decode(format!(
                "ffmpeg exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }

        let samples = f32_samples_from_le_bytes(&output.stdout)?;
        if samples.is_empty() {
            return Err(MediaError::Decode("no audio samples decoded".into()));
        }

        Ok(DecodedAudio::new(samples, channels, sample_rate))
    }
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

fn f32le_args(path: &Path, ordinal: Option<usize>, channels: usize, sample_rate: u32) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-v".into(), "error".into(), "-nostdin".into(), "-i".into()];
    args.push(path.into());
    if let Some(n) = ordinal {
        args.push("-map".into());
        args.push(format!("0:a:{}", n).into());
    }
    for arg in ["-vn", "-f", "f32le", "-acodec", "pcm_f32le", "-ac"] {
        args.push(arg.into());
    }
    args.push(channels.to_string().into());
    args.push("-ar".into());
    args.push(sample_rate.to_string().into());
    args.push("pipe:1".into());
    args
}

/// Last track carrying a real codec and a sample rate. Video tracks show up
/// with a null codec.
fn select_audio_track(tracks: &[Track]) -> Option<&Track> {
    tracks
        .iter()
        .rev()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
}

pub fn decode_with_symphonia(path: &Path) -> Result<DecodedAudio> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MediaError::Decode(format!("probe: {}", e)))?;
    let mut format = probed.format;

    let track = select_audio_track(format.tracks())
        .ok_or_else(|| MediaError::Decode("no decodable audio track".into()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| MediaError::Decode("unknown sample rate".into()))?;
    let mut channels = codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| MediaError::Decode(format!("codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(MediaError::Decode(format!("packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt audio packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(MediaError::Decode(format!("decode: {}", e))),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        if num_frames == 0 {
            continue;
        }
        if channels.is_none() {
            channels = Some(spec.channels.count());
        }

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() {
        return Err(MediaError::Decode("no audio samples decoded".into()));
    }

    Ok(DecodedAudio::new(samples, channels.unwrap_or(1), sample_rate))
}

fn f32_samples_from_le_bytes(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(MediaError::Decode(format!(
            "raw sample stream of {} bytes is not a whole number of f32 samples",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let data_size = (samples.len() * 2) as u32;
        let block_align = channels * 2;
        let mut wav = Vec::with_capacity(44 + data_size as usize);
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_size).to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&channels.to_le_bytes());
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        wav.extend_from_slice(&block_align.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_size.to_le_bytes());
        for s in samples {
            wav.extend_from_slice(&s.to_le_bytes());
        }
        std::fs::write(path, wav).unwrap();
    }

    #[test]
    fn decodes_wav_at_native_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<i16> = (0..22_050).map(|i| if i % 2 == 0 { 1000 } else { -1000 }).collect();
        write_wav(&path, 22_050, 1, &samples);

        let audio = decode_with_symphonia(&path).unwrap();

        assert_eq!(audio.sample_rate(), 22_050);
        assert_eq!(audio.channels(), 1);
        assert_eq!(audio.frames(), 22_050);
        assert!((audio.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stereo_downmix_averages_channels() {
        let audio = DecodedAudio::new(vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2, 8_000);
        assert_eq!(audio.frames(), 3);
        assert_eq!(audio.to_mono(), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn zero_byte_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.dummy");
        std::fs::File::create(&path).unwrap();

        let decoder = AudioDecoder::new("/nonexistent/ffmpeg");
        assert!(matches!(decoder.decode(&path, None, None), Err(MediaError::Decode(_))));
    }

    #[test]
    fn last_audio_track_is_selected() {
        use symphonia::core::codecs::{CodecParameters, CODEC_TYPE_AAC, CODEC_TYPE_PCM_S16LE};

        let mut first = CodecParameters::new();
        first.for_codec(CODEC_TYPE_AAC).with_sample_rate(48_000);
        let video = CodecParameters::new();
        let mut last = CodecParameters::new();
        last.for_codec(CODEC_TYPE_PCM_S16LE).with_sample_rate(16_000);

        let tracks = vec![Track::new(1, first), Track::new(2, last), Track::new(3, video)];

        let selected = select_audio_track(&tracks).unwrap();
        assert_eq!(selected.id, 2);
        assert_eq!(selected.codec_params.sample_rate, Some(16_000));
    }

    #[test]
    fn ffmpeg_fallback_maps_the_selected_stream() {
        let args = f32le_args(Path::new("clip.mp4"), Some(1), 2, 44_100);
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        let map = args.iter().position(|a| a == "-map").unwrap();
        assert_eq!(args[map + 1], "0:a:1");
        assert!(args.windows(2).any(|w| w[0] == "-ar" && w[1] == "44100"));

        let unmapped = f32le_args(Path::new("clip.mp4"), None, 1, 8_000);
        assert!(!unmapped.iter().any(|a| a == "-map"));
    }

    #[test]
    fn raw_bytes_must_align_to_samples() {
        assert!(f32_samples_from_le_bytes(&[0, 0, 0]).is_err());
        let bytes = 0.5f32.to_le_bytes();
        assert_eq!(f32_samples_from_le_bytes(&bytes).unwrap(), vec![0.5]);
    }
}
