//! Single owner of the GPU and every object that outlives a frame.
//!
//! The active program, its directive textures, the two audio textures and the mesh buffers
//! all sit behind one mutex together with the `Gpu` itself, so a swap, an audio upload and a
//! render pass can never interleave. The lock is not reentrant: no method calls back out
//! while holding it.

use std::sync::{Mutex, MutexGuard};

use glam::Vec2;

use crate::audio::AudioPayload;
use crate::camera::Matrices;
use crate::error::MeshError;
use crate::gpu::{Gpu, TextureKind};
use crate::mesh::Mesh;
use crate::program::{ShaderProgram, AUDIO_LEFT_UNIT, AUDIO_RIGHT_UNIT};

/// Values pushed to the active program every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub matrices: Matrices,
    /// Milliseconds since the renderer started.
    pub time_ms: f32,
    /// Cursor position divided by the window size.
    pub mouse: Vec2,
    pub aspect: f32,
    pub viewport: (u32, u32),
}

struct AudioTextures<T> {
    left: T,
    right: T,
}

struct GpuState<G: Gpu> {
    gpu: G,
    active: Option<ShaderProgram<G>>,
    audio: Option<AudioTextures<G::Texture>>,
    mesh: Option<G::MeshBuffers>,
    quad: Option<G::MeshBuffers>,
}

pub struct ProgramMonitor<G: Gpu> {
    state: Mutex<GpuState<G>>,
}

impl<G: Gpu> ProgramMonitor<G> {
    pub fn new(gpu: G) -> Self {
        Self {
            state: Mutex::new(GpuState {
                gpu,
                active: None,
                audio: None,
                mesh: None,
                quad: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GpuState<G>> {
        // A panic mid-frame leaves GL state no worse than a skipped frame.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Run `f` with exclusive access to the GPU (compiling, tests).
    pub fn with_gpu<R>(&self, f: impl FnOnce(&mut G) -> R) -> R {
        f(&mut self.lock().gpu)
    }

    pub fn has_program(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn active_description(&self) -> Option<String> {
        self.lock().active.as_ref().map(|p| p.description.clone())
    }

    pub fn active_handle(&self) -> Option<G::Program> {
        self.lock().active.as_ref().map(|p| p.handle)
    }

    /// Make `program` active, then tear down the one it replaces.
    pub fn swap(&self, program: ShaderProgram<G>) {
        let mut guard = self.lock();
        let GpuState { gpu, active, .. } = &mut *guard;

        gpu.use_program(Some(program.handle));
        program.assign_sampler_units(gpu);
        gpu.use_program(None);

        if let Some(old) = active.replace(program) {
            old.destroy(gpu);
        }
    }

    /// Replace both audio textures' contents, creating them on first use.
    pub fn upload_audio(&self, payload: &AudioPayload) -> Result<(), String> {
        let mut guard = self.lock();
        let GpuState { gpu, audio, .. } = &mut *guard;

        if audio.is_none() {
            let left = gpu.create_audio_texture()?;
            let right = match gpu.create_audio_texture() {
                Ok(t) => t,
                Err(e) => {
                    gpu.delete_texture(left);
                    return Err(e);
                }
            };
            *audio = Some(AudioTextures { left, right });
        }
        let Some(textures) = audio.as_ref() else {
            return Ok(());
        };

        let samples = payload.samples_per_channel();
        gpu.upload_audio_texture(textures.left, payload.format, samples, payload.channels.left());
        gpu.upload_audio_texture(textures.right, payload.format, samples, payload.channels.right());
        Ok(())
    }

    /// Upload `mesh` and release the previous buffers once the upload succeeded.
    pub fn replace_mesh(&self, mesh: &Mesh) -> Result<(), MeshError> {
        let mut guard = self.lock();
        let GpuState { gpu, mesh: slot, .. } = &mut *guard;
        let buffers = gpu.upload_mesh(mesh).map_err(MeshError::Upload)?;
        if let Some(old) = slot.replace(buffers) {
            gpu.delete_mesh(old);
        }
        Ok(())
    }

    /// One frame. Returns `false` when there was no program to draw with.
    pub fn render(&self, frame: &FrameUniforms) -> bool {
        let mut guard = self.lock();
        let GpuState {
            gpu,
            active,
            audio,
            mesh,
            quad,
        } = &mut *guard;

        gpu.viewport(frame.viewport.0, frame.viewport.1);
        gpu.clear();

        let Some(program) = active.as_ref() else {
            return false;
        };

        if mesh.is_none() && quad.is_none() {
            *quad = gpu.upload_mesh(&Mesh::quad()).ok();
        }
        let Some(buffers) = mesh.as_ref().or(quad.as_ref()) else {
            return false;
        };

        gpu.use_program(Some(program.handle));

        let u = &program.uniforms;
        let m = &frame.matrices;
        for (loc, value) in [
            (&u.view, &m.view),
            (&u.projection, &m.projection),
            (&u.model, &m.model),
            (&u.model_view, &m.model_view),
            (&u.mvp, &m.mvp),
        ] {
            if let Some(loc) = loc {
                gpu.set_uniform_mat4(loc, value);
            }
        }
        if let Some(loc) = &u.time {
            gpu.set_uniform_f32(loc, frame.time_ms);
        }
        if let Some(loc) = &u.mouse {
            gpu.set_uniform_vec2(loc, frame.mouse);
        }
        if let Some(loc) = &u.aspect {
            gpu.set_uniform_f32(loc, frame.aspect);
        }

        if let Some(a) = audio.as_ref() {
            gpu.bind_texture(AUDIO_LEFT_UNIT, TextureKind::Audio, Some(a.left));
            gpu.bind_texture(AUDIO_RIGHT_UNIT, TextureKind::Audio, Some(a.right));
        }
        for t in &program.textures {
            gpu.bind_texture(t.unit, TextureKind::Image, Some(t.texture));
        }

        gpu.draw_mesh(buffers, &program.attribs);

        for t in &program.textures {
            gpu.bind_texture(t.unit, TextureKind::Image, None);
        }
        if audio.is_some() {
            gpu.bind_texture(AUDIO_LEFT_UNIT, TextureKind::Audio, None);
            gpu.bind_texture(AUDIO_RIGHT_UNIT, TextureKind::Audio, None);
        }
        gpu.use_program(None);
        true
    }

    /// Release everything. The monitor stays usable but empty.
    pub fn shutdown(&self) {
        let mut guard = self.lock();
        let GpuState {
            gpu,
            active,
            audio,
            mesh,
            quad,
        } = &mut *guard;

        if let Some(p) = active.take() {
            p.destroy(gpu);
        }
        if let Some(a) = audio.take() {
            gpu.delete_texture(a.left);
            gpu.delete_texture(a.right);
        }
        for buffers in [mesh.take(), quad.take()].into_iter().flatten() {
            gpu.delete_mesh(buffers);
        }
    }
}
