use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde_json::Value;

use crate::assets::{read_to_string, AssetsRoot};
use crate::error::EngineError;

/// How strictly to interpret `sandbox.json`.
///
/// - `Lenient` ignores unknown fields; missing keys fall back to defaults.
/// - `Strict` rejects unknown fields and unsupported versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Lenient,
    Strict,
}

/// Raw shape of `assets/sandbox(.<os>).json`.
///
/// Unknown keys land in `extra` so strict mode can name them.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SandboxJson {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub vertex: Option<String>,
    #[serde(default)]
    pub fragment: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub model_offset: Option<[f32; 3]>,
    #[serde(default)]
    pub model_scale: Option<[f32; 3]>,
    #[serde(default)]
    pub model_rotation: Option<[f32; 3]>,
    #[serde(default)]
    pub smooth_normals: bool,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "glsandbox".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub channels: u16,
    pub sample_rate: u32,
    /// One of `u8`, `i8`, `u16`, `i16`, `u32`, `i32`, `f32`.
    pub sample_format: String,
    /// Case-insensitive substrings that mark a preferred input device.
    pub prefer_device_contains: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: 2,
            sample_rate: 8000,
            sample_format: "f32".to_string(),
            prefer_device_contains: vec!["output".to_string()],
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// World units per second.
    pub move_speed: f32,
    /// Degrees per second for the arrow keys.
    pub look_speed: f32,
    /// Degrees per dragged pixel.
    pub drag_sensitivity: f32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            move_speed: 2.0,
            look_speed: 90.0,
            drag_sensitivity: 0.25,
            extra: BTreeMap::new(),
        }
    }
}

/// A model to load together with its placement.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub path: PathBuf,
    pub offset: Vec3,
    pub scale: Vec3,
    /// Degrees around X, Y, Z.
    pub rotation: Vec3,
}

impl ModelRequest {
    pub fn at_origin(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

/// Resolved configuration with paths made absolute against the assets directory.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub source: Option<PathBuf>,
    pub vertex: PathBuf,
    pub fragment: PathBuf,
    pub model: Option<ModelRequest>,
    pub smooth_normals: bool,
    pub window: WindowConfig,
    pub audio: AudioConfig,
    pub camera: CameraConfig,
}

impl SandboxConfig {
    /// Defaults used when no `sandbox.json` exists.
    pub fn defaults_for(assets: &AssetsRoot) -> Self {
        Self {
            source: None,
            vertex: assets.join("shaders").join("sandbox.vert"),
            fragment: assets.join("shaders").join("sandbox.frag"),
            model: None,
            smooth_normals: false,
            window: WindowConfig::default(),
            audio: AudioConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

/// Load `sandbox(.<os>).json`, or defaults when it does not exist.
pub fn load_sandbox_config(assets: &AssetsRoot, mode: ConfigMode) -> Result<SandboxConfig, EngineError> {
    let path = assets.pick_platform_json("sandbox");
    if !path.exists() {
        return Ok(SandboxConfig::defaults_for(assets));
    }
    let text = read_to_string(&path)?;
    parse_sandbox_config(assets, &path, &text, mode)
}

pub fn parse_sandbox_config(
    assets: &AssetsRoot,
    path: &Path,
    text: &str,
    mode: ConfigMode,
) -> Result<SandboxConfig, EngineError> {
    let raw: SandboxJson = serde_json::from_str(text).map_err(|e| EngineError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    if mode == ConfigMode::Strict {
        if raw.version != 1 {
            return Err(EngineError::InvalidConfig {
                path: path.to_path_buf(),
                msg: format!("unsupported sandbox.json version {} (expected 1)", raw.version),
            });
        }
        let unknown = unknown_keys(&raw);
        if !unknown.is_empty() {
            return Err(EngineError::InvalidConfig {
                path: path.to_path_buf(),
                msg: format!("unknown field(s): {}", unknown.join(", ")),
            });
        }
    }

    let defaults = SandboxConfig::defaults_for(assets);
    let model = raw.model.as_deref().map(|m| ModelRequest {
        path: assets.resolve(m),
        offset: raw.model_offset.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
        scale: raw.model_scale.map(Vec3::from_array).unwrap_or(Vec3::ONE),
        rotation: raw.model_rotation.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
    });

    Ok(SandboxConfig {
        source: Some(path.to_path_buf()),
        vertex: raw.vertex.as_deref().map(|s| assets.resolve(s)).unwrap_or(defaults.vertex),
        fragment: raw.fragment.as_deref().map(|s| assets.resolve(s)).unwrap_or(defaults.fragment),
        model,
        smooth_normals: raw.smooth_normals,
        window: raw.window,
        audio: raw.audio,
        camera: raw.camera,
    })
}

/// JSON-pointer-ish names of every field the schema does not know.
pub fn unknown_keys(raw: &SandboxJson) -> Vec<String> {
    let sections: [(&str, &BTreeMap<String, Value>); 4] = [
        ("", &raw.extra),
        ("window.", &raw.window.extra),
        ("audio.", &raw.audio.extra),
        ("camera.", &raw.camera.extra),
    ];
    sections
        .iter()
        .flat_map(|(prefix, extra)| extra.keys().map(move |k| format!("{prefix}{k}")))
        .collect()
}
