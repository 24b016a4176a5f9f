//! Host-side decoder backed by symphonia's format probe.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use common::{Clip, ClipHandle};
use library::{DecodeError, DecodeRequest, Decoder};
use parking_lot::Mutex;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipInfo {
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
    pub duration: Option<Duration>,
    pub codec: String,
}

/// A probed file. Preloaded clips keep the encoded bytes in memory until
/// released.
pub struct ProbedClip {
    name: String,
    info: ClipInfo,
    data: Mutex<Option<Bytes>>,
    loaded: AtomicBool,
}

impl ProbedClip {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &ClipInfo {
        &self.info
    }

    pub fn is_preloaded(&self) -> bool {
        self.data.lock().is_some()
    }

    pub fn preloaded_len(&self) -> usize {
        self.data.lock().as_ref().map(Bytes::len).unwrap_or(0)
    }
}

impl Clip for ProbedClip {
    fn release(&self) {
        if self.loaded.swap(false, Ordering::SeqCst) {
            debug!("Releasing clip {}", self.name);
        }
        self.data.lock().take();
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

/// Validates files by probing their container and default track.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProbeDecoder;

impl ProbeDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Decoder for ProbeDecoder {
    async fn decode(&self, request: DecodeRequest) -> Result<ClipHandle, DecodeError> {
        let clip = tokio::task::spawn_blocking(move || probe(&request))
            .await
            .map_err(|err| DecodeError::Format(err.to_string()))??;
        let clip: ClipHandle = Arc::new(clip);
        Ok(clip)
    }
}

pub fn probe(request: &DecodeRequest) -> Result<ProbedClip, DecodeError> {
    let (source, data): (Box<dyn MediaSource>, Option<Bytes>) = if request.stream {
        let file = std::fs::File::open(&request.path)?;
        (Box::new(file) as Box<dyn MediaSource>, None)
    } else {
        let bytes = Bytes::from(std::fs::read(&request.path)?);
        (Box::new(Cursor::new(bytes.clone())) as Box<dyn MediaSource>, Some(bytes))
    };
    let info = probe_source(&request.path, source)?;
    debug!(
        "Probed {} ({}, {:?} Hz, {:?} channels, preloaded: {})",
        request.name,
        info.codec,
        info.sample_rate,
        info.channels,
        data.is_some()
    );
    Ok(ProbedClip {
        name: request.name.clone(),
        info,
        data: Mutex::new(data),
        loaded: AtomicBool::new(true),
    })
}

fn probe_source(path: &Path, source: Box<dyn MediaSource>) -> Result<ClipInfo, DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(map_error)?;
    let track = probed
        .format
        .default_track()
        .ok_or_else(|| DecodeError::Format("no default audio track".to_string()))?;
    let params = &track.codec_params;
    let codec = symphonia::default::get_codecs()
        .get_codec(params.codec)
        .map(|descriptor| descriptor.short_name.to_string())
        .ok_or_else(|| DecodeError::Unsupported(format!("codec {}", params.codec)))?;

    let duration = match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => {
            Some(Duration::from_secs_f64(frames as f64 / rate as f64))
        }
        _ => None,
    };
    Ok(ClipInfo {
        sample_rate: params.sample_rate,
        channels: params.channels.map(|channels| channels.count()),
        duration,
        codec,
    })
}

fn map_error(err: SymphoniaError) -> DecodeError {
    match err {
        SymphoniaError::IoError(err) => DecodeError::Io(err),
        SymphoniaError::Unsupported(what) => DecodeError::Unsupported(what.to_string()),
        other => DecodeError::Format(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use common::DecodeHint;

    use super::*;

    fn wav_bytes(sample_rate: u32, frames: u32) -> Vec<u8> {
        let data_len = frames * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(out.len() + data_len as usize, 0);
        out
    }

    fn request(path: PathBuf, stream: bool) -> DecodeRequest {
        DecodeRequest {
            hint: DecodeHint::from_path(&path),
            path,
            stream,
            name: "Tone - Test".to_string(),
        }
    }

    #[tokio::test]
    async fn preloads_wav_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Tone - Test.wav");
        std::fs::write(&path, wav_bytes(8000, 8000)).unwrap();

        let clip = probe(&request(path, false)).unwrap();
        assert_eq!(clip.name(), "Tone - Test");
        assert_eq!(clip.info().sample_rate, Some(8000));
        assert_eq!(clip.info().channels, Some(1));
        assert_eq!(clip.info().duration, Some(Duration::from_secs(1)));
        assert!(clip.is_preloaded());
        assert_eq!(clip.preloaded_len(), 44 + 16000);

        clip.release();
        assert!(!clip.is_loaded());
        assert!(!clip.is_preloaded());
        clip.release();
        assert!(!clip.is_loaded());
    }

    #[tokio::test]
    async fn streaming_clip_holds_no_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Tone - Test.wav");
        std::fs::write(&path, wav_bytes(22050, 100)).unwrap();

        let clip = ProbeDecoder::new()
            .decode(request(path, true))
            .await
            .unwrap();
        assert!(clip.is_loaded());
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Noise - Junk.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        assert!(ProbeDecoder::new().decode(request(path, false)).await.is_err());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = probe(&request(dir.path().join("gone.ogg"), true));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }
}
