//! PCM frames and their conversion into per-channel texture payloads.

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Unsigned,
    Signed,
    Float,
}

/// Element types the audio textures accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
}

impl SampleFormat {
    /// The fixed support table. Anything not listed is dropped.
    pub fn from_parts(kind: SampleKind, bits: u16) -> Option<Self> {
        match (kind, bits) {
            (SampleKind::Unsigned, 8) => Some(Self::U8),
            (SampleKind::Signed, 8) => Some(Self::I8),
            (SampleKind::Unsigned, 16) => Some(Self::U16),
            (SampleKind::Signed, 16) => Some(Self::I16),
            (SampleKind::Unsigned, 32) => Some(Self::U32),
            (SampleKind::Signed, 32) => Some(Self::I32),
            (SampleKind::Float, 32) => Some(Self::F32),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "u8" => Some(Self::U8),
            "i8" => Some(Self::I8),
            "u16" => Some(Self::U16),
            "i16" => Some(Self::I16),
            "u32" => Some(Self::U32),
            "i32" => Some(Self::I32),
            "f32" => Some(Self::F32),
            _ => None,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::F32 => "f32",
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block of interleaved PCM as delivered by the capture device.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub kind: SampleKind,
    pub bits: u16,
    pub channels: u16,
    pub bytes: Vec<u8>,
}

impl AudioFrame {
    /// Wrap typed samples without copying element by element.
    pub fn from_samples<T: bytemuck::Pod>(kind: SampleKind, channels: u16, samples: &[T]) -> Self {
        Self {
            kind,
            bits: (std::mem::size_of::<T>() * 8) as u16,
            channels,
            bytes: bytemuck::cast_slice(samples).to_vec(),
        }
    }

    pub fn format(&self) -> Option<SampleFormat> {
        SampleFormat::from_parts(self.kind, self.bits)
    }
}

/// Raw bytes for the left and right audio textures.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelBuffers {
    /// Both texture slots sample the same data.
    Mono(Vec<u8>),
    Stereo { left: Vec<u8>, right: Vec<u8> },
}

impl ChannelBuffers {
    pub fn left(&self) -> &[u8] {
        match self {
            Self::Mono(b) => b,
            Self::Stereo { left, .. } => left,
        }
    }

    pub fn right(&self) -> &[u8] {
        match self {
            Self::Mono(b) => b,
            Self::Stereo { right, .. } => right,
        }
    }
}

/// A frame ready for upload: element type plus one buffer per texture slot.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    pub format: SampleFormat,
    pub channels: ChannelBuffers,
}

impl AudioPayload {
    /// Texel count of each texture.
    pub fn samples_per_channel(&self) -> usize {
        self.channels.left().len() / self.format.bytes_per_sample()
    }
}

/// Validate and de-interleave a frame.
///
/// Returns `None` for unsupported sample layouts or channel counts other than 1 and 2.
/// Trailing bytes that do not form a whole frame are discarded.
pub fn split_channels(frame: &AudioFrame) -> Option<AudioPayload> {
    let format = frame.format()?;
    let width = format.bytes_per_sample();
    let channels = match frame.channels {
        1 => {
            let whole = frame.bytes.len() - frame.bytes.len() % width;
            ChannelBuffers::Mono(frame.bytes[..whole].to_vec())
        }
        2 => {
            let stride = width * 2;
            let frames = frame.bytes.len() / stride;
            let mut left = Vec::with_capacity(frames * width);
            let mut right = Vec::with_capacity(frames * width);
            for pair in frame.bytes.chunks_exact(stride) {
                left.extend_from_slice(&pair[..width]);
                right.extend_from_slice(&pair[width..]);
            }
            ChannelBuffers::Stereo { left, right }
        }
        _ => return None,
    };
    Some(AudioPayload { format, channels })
}

/// Latest-wins handoff from the capture thread to the render thread.
///
/// The producer overwrites whatever is pending; the consumer takes at most one frame per tick.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<Option<AudioFrame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: AudioFrame) {
        let mut slot = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(frame);
    }

    pub fn take(&self) -> Option<AudioFrame> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_u16(bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|b| u16::from_ne_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn support_table() {
        assert_eq!(SampleFormat::from_parts(SampleKind::Unsigned, 16), Some(SampleFormat::U16));
        assert_eq!(SampleFormat::from_parts(SampleKind::Float, 32), Some(SampleFormat::F32));
        assert_eq!(SampleFormat::from_parts(SampleKind::Float, 64), None);
        assert_eq!(SampleFormat::from_parts(SampleKind::Float, 16), None);
        assert_eq!(SampleFormat::from_parts(SampleKind::Signed, 24), None);
        assert_eq!(SampleFormat::parse(" F32 "), Some(SampleFormat::F32));
        assert_eq!(SampleFormat::parse("f64"), None);
    }

    #[test]
    fn stereo_u16_deinterleaves_even_and_odd_samples() {
        let samples: [u16; 6] = [10, 11, 20, 21, 30, 31];
        let frame = AudioFrame::from_samples(SampleKind::Unsigned, 2, &samples);
        let n = frame.bytes.len();
        let payload = split_channels(&frame).unwrap();

        assert_eq!(payload.format, SampleFormat::U16);
        assert_eq!(payload.samples_per_channel(), n / 4);
        assert_eq!(as_u16(payload.channels.left()), vec![10, 20, 30]);
        assert_eq!(as_u16(payload.channels.right()), vec![11, 21, 31]);
    }

    #[test]
    fn mono_aliases_both_slots() {
        let frame = AudioFrame::from_samples(SampleKind::Float, 1, &[0.5f32, -0.5]);
        let payload = split_channels(&frame).unwrap();
        assert!(matches!(payload.channels, ChannelBuffers::Mono(_)));
        assert_eq!(payload.channels.left(), payload.channels.right());
        assert_eq!(payload.samples_per_channel(), 2);
    }

    #[test]
    fn partial_trailing_frame_is_dropped() {
        let frame = AudioFrame {
            kind: SampleKind::Signed,
            bits: 8,
            channels: 2,
            bytes: vec![1, 2, 3, 4, 5],
        };
        let payload = split_channels(&frame).unwrap();
        assert_eq!(payload.channels.left(), &[1, 3]);
        assert_eq!(payload.channels.right(), &[2, 4]);
    }

    #[test]
    fn unsupported_frames_are_rejected() {
        let odd = AudioFrame {
            kind: SampleKind::Signed,
            bits: 24,
            channels: 2,
            bytes: vec![0; 12],
        };
        assert!(split_channels(&odd).is_none());
        let surround = AudioFrame::from_samples(SampleKind::Float, 6, &[0.0f32; 12]);
        assert!(split_channels(&surround).is_none());
    }

    #[test]
    fn slot_keeps_only_the_latest_frame() {
        let slot = FrameSlot::new();
        slot.publish(AudioFrame::from_samples(SampleKind::Float, 1, &[1.0f32]));
        slot.publish(AudioFrame::from_samples(SampleKind::Float, 1, &[2.0f32]));
        let got = slot.take().unwrap();
        assert_eq!(got.bytes, 2.0f32.to_ne_bytes().to_vec());
        assert!(slot.take().is_none());
    }

    #[test]
    fn slot_crosses_threads() {
        let slot = FrameSlot::new();
        let producer = slot.clone();
        std::thread::spawn(move || {
            producer.publish(AudioFrame::from_samples(SampleKind::Signed, 2, &[1i16, 2]));
        })
        .join()
        .unwrap();
        assert_eq!(slot.take().map(|f| f.channels), Some(2));
    }
}
