//! Audio capture (cpal)
//!
//! Opens one input stream and publishes every callback buffer into the engine's `FrameSlot`
//! as raw interleaved PCM. Conversion to textures happens on the render thread.
//!
//! Device choice: the last input whose name contains one of `prefer_device_contains`
//! (loopback/monitor devices are usually called "... output ..."), stopping early at one that
//! is also "analog"; otherwise the host's default input.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, SizedSample, StreamConfig, SupportedStreamConfig};

use glsandbox_engine::audio::{AudioFrame, FrameSlot, SampleFormat, SampleKind};
use glsandbox_engine::config::AudioConfig;
use glsandbox_engine::AudioError;

use crate::{logi, logw};

/// A running capture stream. Dropping it stops capture.
pub struct AudioCapture {
    _stream: cpal::Stream,
}

/// Index of the preferred device among `names`.
pub fn pick_device(names: &[String], prefer: &[String]) -> Option<usize> {
    let mut picked = None;
    for (i, name) in names.iter().enumerate() {
        let lower = name.to_lowercase();
        if prefer.iter().any(|p| !p.is_empty() && lower.contains(&p.to_lowercase())) {
            picked = Some(i);
            if lower.contains("analog") {
                break;
            }
        }
    }
    picked
}

/// Shape of one `SupportedStreamConfigRange`, detached from cpal for scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigRange {
    pub channels: u16,
    pub min_rate: u32,
    pub max_rate: u32,
    pub format: cpal::SampleFormat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wanted {
    pub channels: u16,
    pub rate: u32,
    pub format: cpal::SampleFormat,
}

/// Index of the closest range plus the sample rate to request from it.
///
/// Channel count matters most, then sample format, then distance to the wanted rate.
pub fn nearest_config(ranges: &[ConfigRange], want: Wanted) -> Option<(usize, u32)> {
    ranges
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let rate = want.rate.clamp(r.min_rate, r.max_rate.max(r.min_rate));
            let score = (
                r.channels != want.channels,
                r.channels.abs_diff(want.channels),
                r.format != want.format,
                rate.abs_diff(want.rate),
            );
            (score, i, rate)
        })
        .min_by_key(|(score, _, _)| *score)
        .map(|(_, i, rate)| (i, rate))
}

pub fn to_cpal_format(format: SampleFormat) -> cpal::SampleFormat {
    match format {
        SampleFormat::U8 => cpal::SampleFormat::U8,
        SampleFormat::I8 => cpal::SampleFormat::I8,
        SampleFormat::U16 => cpal::SampleFormat::U16,
        SampleFormat::I16 => cpal::SampleFormat::I16,
        SampleFormat::U32 => cpal::SampleFormat::U32,
        SampleFormat::I32 => cpal::SampleFormat::I32,
        SampleFormat::F32 => cpal::SampleFormat::F32,
    }
}

fn wanted(cfg: &AudioConfig) -> Wanted {
    let format = SampleFormat::parse(&cfg.sample_format).unwrap_or_else(|| {
        logw!("AUDIO", "unknown sample_format {:?}; requesting f32", cfg.sample_format);
        SampleFormat::F32
    });
    Wanted {
        channels: cfg.channels.max(1),
        rate: cfg.sample_rate.max(1),
        format: to_cpal_format(format),
    }
}

fn select_device(host: &cpal::Host, prefer: &[String]) -> Result<cpal::Device, AudioError> {
    let devices: Vec<cpal::Device> = match host.input_devices() {
        Ok(it) => it.collect(),
        Err(e) => {
            logw!("AUDIO", "cannot enumerate input devices: {e}");
            Vec::new()
        }
    };
    let names: Vec<String> = devices
        .iter()
        .map(|d| d.name().unwrap_or_else(|_| "<unnamed>".to_string()))
        .collect();
    for n in &names {
        logi!("AUDIO", "input device: {n}");
    }

    match pick_device(&names, prefer) {
        Some(i) => devices.into_iter().nth(i).ok_or(AudioError::NoDevice),
        None => host.default_input_device().ok_or(AudioError::NoDevice),
    }
}

fn select_config(device: &cpal::Device, want: Wanted) -> Result<SupportedStreamConfig, AudioError> {
    let supported: Vec<cpal::SupportedStreamConfigRange> = device
        .supported_input_configs()
        .map_err(|e| AudioError::NoConfig(e.to_string()))?
        .collect();
    let ranges: Vec<ConfigRange> = supported
        .iter()
        .map(|r| ConfigRange {
            channels: r.channels(),
            min_rate: r.min_sample_rate().0,
            max_rate: r.max_sample_rate().0,
            format: r.sample_format(),
        })
        .collect();

    match nearest_config(&ranges, want) {
        Some((i, rate)) => Ok(supported[i].clone().with_sample_rate(SampleRate(rate))),
        None => device
            .default_input_config()
            .map_err(|e| AudioError::NoConfig(e.to_string())),
    }
}

fn build<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    kind: SampleKind,
    slot: FrameSlot,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + bytemuck::Pod,
{
    let channels = config.channels;
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                slot.publish(AudioFrame::from_samples(kind, channels, data));
            },
            |e| logw!("AUDIO", "stream error: {e}"),
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))
}

/// Open the capture stream described by `cfg` and start it.
pub fn start(cfg: &AudioConfig, slot: FrameSlot) -> Result<AudioCapture, AudioError> {
    let host = cpal::default_host();
    let device = select_device(&host, &cfg.prefer_device_contains)?;
    let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

    let supported = select_config(&device, wanted(cfg))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    use cpal::SampleFormat as F;
    let stream = match sample_format {
        F::U8 => build::<u8>(&device, &config, SampleKind::Unsigned, slot)?,
        F::I8 => build::<i8>(&device, &config, SampleKind::Signed, slot)?,
        F::U16 => build::<u16>(&device, &config, SampleKind::Unsigned, slot)?,
        F::I16 => build::<i16>(&device, &config, SampleKind::Signed, slot)?,
        F::U32 => build::<u32>(&device, &config, SampleKind::Unsigned, slot)?,
        F::I32 => build::<i32>(&device, &config, SampleKind::Signed, slot)?,
        F::F32 => build::<f32>(&device, &config, SampleKind::Float, slot)?,
        // The engine drops these after reporting the format once.
        F::U64 => build::<u64>(&device, &config, SampleKind::Unsigned, slot)?,
        F::I64 => build::<i64>(&device, &config, SampleKind::Signed, slot)?,
        F::F64 => build::<f64>(&device, &config, SampleKind::Float, slot)?,
        other => return Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
    };

    stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;
    logi!(
        "AUDIO",
        "capturing from {name}: {} ch, {} Hz, {sample_format:?}",
        config.channels,
        config.sample_rate.0
    );

    Ok(AudioCapture { _stream: stream })
}
