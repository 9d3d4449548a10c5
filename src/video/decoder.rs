//! Raw RGB frame extraction through an `ffmpeg` subprocess.

use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use ndarray::{Array4, ArrayView3};

use crate::{MediaError, Result};

/// Decoded frames shaped `[frame_count, height, width, 3]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedVideo {
    frames: Array4<u8>,
}

impl DecodedVideo {
    pub fn frames(&self) -> &Array4<u8> {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.shape()[0]
    }

    pub fn height(&self) -> usize {
        self.frames.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.frames.shape()[2]
    }
}

pub struct VideoDecoder {
    ffmpeg: PathBuf,
}

impl VideoDecoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Decode every frame of the `ordinal`-th video stream as `rgb24` into one
    /// tensor. `width` and `height` come from that probed stream.
    pub fn decode(&self, path: &Path, ordinal: Option<usize>, width: u32, height: u32) -> Result<DecodedVideo> {
        let mut bytes = Vec::new();
        self.for_each_frame(path, ordinal, width, height, |frame| bytes.extend(frame.iter()))?;
        frames_from_raw(bytes, width as usize, height as usize)
    }

    /// Stream the frames one at a time without keeping them, returning how many
    /// were decoded. A stream that does not divide into whole frames of the
    /// probed size is an error.
    pub fn for_each_frame<F>(
        &self,
        path: &Path,
        ordinal: Option<usize>,
        width: u32,
        height: u32,
        on_frame: F,
    ) -> Result<usize>
    where
        F: FnMut(ArrayView3<u8>),
    {
        let mut child = Command::new(&self.ffmpeg)
            .args(rawvideo_args(path, ordinal))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MediaError::Decode(format!("failed to run {}: {}", self.ffmpeg.display(), e))
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::Decode("ffmpeg stdout is not captured".into()))?;
        let read = read_frames(&mut stdout, width as usize, height as usize, on_frame);
        drop(stdout);

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Decode(format!(
                "ffmpeg exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }
        let frame_count = read?;

        log::debug!(
            "Decoded {} frames ({}x{}) from {}",
            frame_count,
            width,
            height,
            path.display()
        );
        Ok(frame_count)
    }
}

impl Default for VideoDecoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

fn rawvideo_args(path: &Path, ordinal: Option<usize>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-v".into(), "error".into(), "-nostdin".into(), "-i".into()];
    args.push(path.into());
    if let Some(n) = ordinal {
        args.push("-map".into());
        args.push(format!("0:v:{}", n).into());
    }
    for arg in ["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"] {
        args.push(arg.into());
    }
    args
}

fn frame_size(width: usize, height: usize) -> Result<usize> {
    match width * height * 3 {
        0 => Err(MediaError::Decode(format!(
            "invalid frame dimensions {}x{}",
            width, height
        ))),
        size => Ok(size),
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

pub fn read_frames<R, F>(reader: &mut R, width: usize, height: usize, mut on_frame: F) -> Result<usize>
where
    R: Read,
    F: FnMut(ArrayView3<u8>),
{
    let size = frame_size(width, height)?;
    let mut buf = vec![0u8; size];
    let mut frame_count = 0;

    loop {
        let filled = read_full(reader, &mut buf)?;
        if filled == 0 {
            break;
        }
        if filled < size {
            return Err(MediaError::Decode(format!(
                "{} trailing bytes do not form a whole {}x{} RGB frame",
                filled, width, height
            )));
        }
        let frame = ArrayView3::from_shape((height, width, 3), &buf[..])
            .map_err(|e| MediaError::Decode(format!("reshape: {}", e)))?;
        on_frame(frame);
        frame_count += 1;
    }

    if frame_count == 0 {
        return Err(MediaError::Decode("no video frames decoded".into()));
    }
    Ok(frame_count)
}

pub fn frames_from_raw(bytes: Vec<u8>, width: usize, height: usize) -> Result<DecodedVideo> {
    let size = frame_size(width, height)?;
    if bytes.is_empty() {
        return Err(MediaError::Decode("no video frames decoded".into()));
    }
    if bytes.len() % size != 0 {
        return Err(MediaError::Decode(format!(
            "{} bytes do not form whole {}x{} RGB frames",
            bytes.len(),
            width,
            height
        )));
    }

    let frame_count = bytes.len() / size;
    let frames = Array4::from_shape_vec((frame_count, height, width, 3), bytes)
        .map_err(|e| MediaError::Decode(format!("reshape: {}", e)))?;
    Ok(DecodedVideo { frames })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reshapes_whole_frames() {
        let bytes: Vec<u8> = (0..2 * 2 * 3 * 3).map(|i| i as u8).collect();
        let video = frames_from_raw(bytes, 3, 2).unwrap();

        assert_eq!(video.frames().shape(), &[2, 2, 3, 3]);
        assert_eq!(video.frame_count(), 2);
        // second frame, first row, second pixel, green channel
        assert_eq!(video.frames()[[1, 0, 1, 1]], 18 + 3 + 1);
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let bytes = vec![0u8; 2 * 2 * 3 + 1];
        assert!(matches!(frames_from_raw(bytes, 2, 2), Err(MediaError::Decode(_))));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(frames_from_raw(vec![0u8; 12], 0, 2).is_err());
        assert!(read_frames(&mut Cursor::new(vec![0u8; 12]), 2, 0, |_| {}).is_err());
    }

    #[test]
    fn streamed_frames_match_the_tensor_layout() {
        let bytes: Vec<u8> = (0..2 * 2 * 3 * 3).map(|i| i as u8).collect();
        let mut greens = Vec::new();

        let count = read_frames(&mut Cursor::new(bytes), 3, 2, |frame| {
            assert_eq!(frame.shape(), &[2, 3, 3]);
            greens.push(frame[[0, 1, 1]]);
        })
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(greens, vec![4, 18 + 3 + 1]);
    }

    #[test]
    fn partial_trailing_frame_is_fatal() {
        let bytes = vec![0u8; 2 * 2 * 3 + 5];
        let err = read_frames(&mut Cursor::new(bytes), 2, 2, |_| {}).unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)));

        let empty = read_frames(&mut Cursor::new(Vec::new()), 2, 2, |_| {});
        assert!(matches!(empty, Err(MediaError::Decode(_))));
    }

    #[test]
    fn decoding_maps_the_selected_video_stream() {
        let args: Vec<_> = rawvideo_args(Path::new("clip.mp4"), Some(1))
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let map = args.iter().position(|a| a == "-map").unwrap();
        assert_eq!(args[map + 1], "0:v:1");
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));

        assert!(!rawvideo_args(Path::new("clip.mp4"), None).iter().any(|a| a == "-map"));
    }

    #[test]
    fn missing_backend_is_a_decode_error() {
        let decoder = VideoDecoder::new("/nonexistent/ffmpeg");
        let err = decoder.decode(Path::new("clip.mp4"), None, 2, 2).unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)));
    }
}
