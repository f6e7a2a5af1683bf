//! glsandbox engine crate.
//!
//! Owns everything between "here is some GLSL, a mesh and a stream of PCM" and "a frame was
//! drawn": directive handling, compile/link with line-accurate diagnostics, hot swapping under
//! a single lock, the audio textures, OBJ loading and the per-frame uniforms. Window and
//! device plumbing stay in the binary.

pub mod assets;
pub mod audio;
pub mod camera;
pub mod compiler;
pub mod config;
pub mod coordinator;
pub mod defaults;
pub mod diagnostic;
pub mod directive;
pub mod error;
pub mod events;
pub mod gl;
pub mod gpu;
pub mod mesh;
pub mod monitor;
pub mod program;
pub mod render;
pub mod runtime;

#[cfg(test)]
pub(crate) mod fake;

pub use assets::AssetsRoot;
pub use compiler::ShaderSource;
pub use config::{load_sandbox_config, ConfigMode, ModelRequest, SandboxConfig};
pub use coordinator::{RecompileOutcome, RenderState};
pub use error::{AudioError, EngineError, MeshError, ShaderError};
pub use events::{EngineEvent, EventSink, LogLevel};
pub use render::RenderLoop;
pub use runtime::{NullRuntime, Runtime};
